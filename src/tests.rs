use super::*;
use std::cell::RefCell;
use std::rc::Rc;

fn ready_page(html: &str) -> Result<Page> {
    let mut page = Page::from_html(html)?;
    PopupToggler::default().install(&mut page);
    page.fire_ready()?;
    Ok(page)
}

#[test]
fn click_inside_popup_toggles_shown() -> Result<()> {
    let html = r#"
        <div class="popup"><span id="inner">x</span></div>
        <p id="sibling">elsewhere</p>
        "#;

    let mut page = ready_page(html)?;
    page.assert_class("div", "shown", false)?;
    page.click("#inner")?;
    page.assert_class("div", "shown", true)?;
    page.click("#inner")?;
    page.assert_class("div", "shown", false)?;
    page.click("#sibling")?;
    page.assert_class("div", "shown", false)?;
    assert_eq!(page.dump_dom("div")?, r#"<div class="popup"><span id="inner">x</span></div>"#);
    Ok(())
}

#[test]
fn clicking_the_popup_itself_toggles_it() -> Result<()> {
    let mut page = ready_page("<div id='p' class='popup'>menu</div>")?;
    page.click("#p")?;
    page.assert_class("#p", "shown", true)?;
    Ok(())
}

#[test]
fn click_on_text_node_walks_through_it() -> Result<()> {
    let mut page = ready_page("<div id='p' class='popup'><b id='b'>bold</b></div>")?;
    let b = page.select_one("#b")?;
    let text = page.children(b)[0];
    assert_eq!(page.tag_name(text), None);
    page.click_node(text)?;
    page.assert_class("#p", "shown", true)?;
    Ok(())
}

#[test]
fn deep_descendant_toggles_nearest_popup_not_descendant() -> Result<()> {
    let html = r#"
        <div id="p" class="popup">
          <ul><li><a href='#top'><em id="deep">go</em></a></li></ul>
        </div>
        "#;

    let mut page = ready_page(html)?;
    page.click("#deep")?;
    page.assert_class("#p", "shown", true)?;
    page.assert_class("#deep", "shown", false)?;
    assert_eq!(page.select_all(".shown")?.len(), 1);
    Ok(())
}

#[test]
fn sibling_popups_do_not_interact() -> Result<()> {
    let html = r#"
        <div id="a" class="popup"><span id="in-a">a</span></div>
        <div id="b" class="popup"><span id="in-b">b</span></div>
        "#;

    let mut page = ready_page(html)?;
    page.click("#in-a")?;
    page.assert_class("#a", "shown", true)?;
    page.assert_class("#b", "shown", false)?;
    page.click("#in-b")?;
    page.click("#in-b")?;
    page.assert_class("#a", "shown", true)?;
    page.assert_class("#b", "shown", false)?;
    Ok(())
}

#[test]
fn nested_popup_click_toggles_only_the_innermost() -> Result<()> {
    let html = r#"
        <div id="outer" class="popup">
          <span id="outer-text">outer</span>
          <div id="inner" class="popup"><span id="leaf">leaf</span></div>
        </div>
        "#;

    let mut page = ready_page(html)?;
    page.click("#leaf")?;
    page.assert_class("#inner", "shown", true)?;
    page.assert_class("#outer", "shown", false)?;

    page.click("#outer-text")?;
    page.assert_class("#inner", "shown", true)?;
    page.assert_class("#outer", "shown", true)?;
    Ok(())
}

#[test]
fn existing_classes_are_preserved_around_the_toggle() -> Result<()> {
    let mut page = ready_page("<div id='p' class='card popup  wide'>x</div>")?;
    page.click("#p")?;
    assert_eq!(
        page.class_tokens(page.select_one("#p")?)?,
        vec!["card", "popup", "wide", "shown"]
    );
    page.click("#p")?;
    assert_eq!(
        page.class_tokens(page.select_one("#p")?)?,
        vec!["card", "popup", "wide"]
    );
    Ok(())
}

#[test]
fn markup_with_shown_already_present_starts_open() -> Result<()> {
    let mut page = ready_page("<div id='p' class='popup shown'>x</div>")?;
    page.click("#p")?;
    page.assert_class("#p", "shown", false)?;
    Ok(())
}

#[test]
fn nothing_is_bound_before_ready() -> Result<()> {
    let mut page = Page::from_html("<div id='p' class='popup'>x</div>")?;
    PopupToggler::default().install(&mut page);
    assert!(!page.is_ready());
    page.click("#p")?;
    page.assert_class("#p", "shown", false)?;

    page.fire_ready()?;
    assert!(page.is_ready());
    page.click("#p")?;
    page.assert_class("#p", "shown", true)?;
    Ok(())
}

#[test]
fn ready_signal_fires_once() -> Result<()> {
    let mut page = ready_page("<div class='popup'></div>")?;
    assert!(matches!(page.fire_ready(), Err(Error::Lifecycle(_))));
    Ok(())
}

#[test]
fn init_binds_popups_in_document_order() -> Result<()> {
    let html = r#"
        <div id="first" class="popup"></div>
        <section><div id="second" class="popup"></div></section>
        <p class="not-a-popup"></p>
        "#;

    let mut page = Page::from_html(html)?;
    let toggler = PopupToggler::default();
    assert_eq!(toggler.init(&mut page)?, 2);

    let ids: Vec<_> = page
        .elements_by_class_name("popup")
        .into_iter()
        .filter_map(|node| page.id_of(node).map(ToOwned::to_owned))
        .collect();
    assert_eq!(ids, vec!["first", "second"]);
    for id in ["#first", "#second"] {
        assert_eq!(page.listener_count(page.select_one(id)?, "click"), 1);
    }
    Ok(())
}

#[test]
fn second_init_is_rejected_and_does_not_double_bind() -> Result<()> {
    let mut page = Page::from_html("<div id='p' class='popup'><i id='i'>x</i></div>")?;
    let toggler = PopupToggler::default();
    assert_eq!(toggler.init(&mut page)?, 1);

    let err = toggler.init(&mut page);
    assert_eq!(
        err,
        Err(Error::AlreadyInitialized("popup-toggler:popup".into()))
    );
    assert_eq!(page.listener_count(page.select_one("#p")?, "click"), 1);

    page.click("#i")?;
    page.assert_class("#p", "shown", true)?;
    Ok(())
}

#[test]
fn install_after_manual_init_surfaces_error_from_ready() -> Result<()> {
    let mut page = Page::from_html("<div class='popup'></div>")?;
    let toggler = PopupToggler::default();
    toggler.init(&mut page)?;
    toggler.install(&mut page);
    assert!(matches!(
        page.fire_ready(),
        Err(Error::AlreadyInitialized(_))
    ));
    Ok(())
}

#[test]
fn popups_added_after_ready_are_not_bound() -> Result<()> {
    let mut page = ready_page("<main id='main'></main>")?;
    page.append_html("#main", "<div id='late' class='popup'><span id='s'>x</span></div>")?;
    page.click("#s")?;
    page.assert_class("#late", "shown", false)?;
    assert_eq!(page.listener_count(page.select_one("#late")?, "click"), 0);
    Ok(())
}

#[test]
fn unbound_popup_inside_bound_popup_toggles_as_nearest() -> Result<()> {
    let mut page = ready_page("<div id='outer' class='popup'><main id='m'></main></div>")?;
    page.append_html("#m", "<div id='late' class='popup'><span id='s'>x</span></div>")?;
    page.click("#s")?;
    page.assert_class("#late", "shown", true)?;
    page.assert_class("#outer", "shown", false)?;

    page.click("#m")?;
    page.assert_class("#outer", "shown", true)?;
    page.assert_class("#late", "shown", true)?;
    Ok(())
}

#[test]
fn marker_added_after_ready_inside_bound_popup_is_toggled() -> Result<()> {
    let mut page =
        ready_page("<div id='outer' class='popup'><section id='b'><i id='leaf'>x</i></section></div>")?;
    let b = page.select_one("#b")?;
    page.class_add(b, "popup")?;
    page.click("#leaf")?;
    page.assert_class("#b", "shown", true)?;
    page.assert_class("#outer", "shown", false)?;
    assert_eq!(page.listener_count(b, "click"), 0);
    Ok(())
}

#[test]
fn handle_click_outside_any_popup_is_a_no_op() -> Result<()> {
    let mut page = Page::from_html("<div class='popup'></div><p id='out'>x</p>")?;
    let toggler = PopupToggler::default();
    let out = page.select_one("#out")?;
    let before = page.dump_dom("div")?;
    assert_eq!(toggler.handle_click(&mut page, out)?, None);
    assert_eq!(page.dump_dom("div")?, before);
    assert!(page.select_all(".shown")?.is_empty());

    let document = page.document();
    assert_eq!(toggler.handle_click(&mut page, document)?, None);
    Ok(())
}

#[test]
fn handle_click_toggles_without_binding() -> Result<()> {
    let mut page = Page::from_html("<div id='p' class='popup'><a id='a'>x</a></div>")?;
    let toggler = PopupToggler::default();
    let a = page.select_one("#a")?;
    let p = page.select_one("#p")?;
    assert_eq!(toggler.handle_click(&mut page, a)?, Some(p));
    assert!(toggler.is_shown(&page, p)?);
    assert_eq!(toggler.handle_click(&mut page, p)?, Some(p));
    assert!(!toggler.is_shown(&page, p)?);
    Ok(())
}

#[test]
fn custom_class_names_are_honored() -> Result<()> {
    let html = r#"
        <div id="d" class="dropdown"><span id="s">x</span></div>
        <div id="p" class="popup"></div>
        "#;

    let mut page = Page::from_html(html)?;
    let config = PopupConfig::new("dropdown", "open")?;
    PopupToggler::new(config).install(&mut page);
    page.fire_ready()?;

    page.click("#s")?;
    page.assert_class("#d", "open", true)?;
    page.assert_class("#d", "shown", false)?;
    page.click("#p")?;
    page.assert_class("#p", "open", false)?;
    Ok(())
}

#[test]
fn distinct_markers_initialize_independently() -> Result<()> {
    let mut page = Page::from_html("<div id='a' class='popup'></div><div id='b' class='menu'></div>")?;
    assert_eq!(PopupToggler::default().init(&mut page)?, 1);
    let menu = PopupToggler::new(PopupConfig::new("menu", "shown")?);
    assert_eq!(menu.init(&mut page)?, 1);
    page.click("#b")?;
    page.assert_class("#b", "shown", true)?;
    Ok(())
}

#[test]
fn config_rejects_bad_class_names() {
    for (marker, shown) in [("", "shown"), ("popup", "sh own"), ("pop\tup", "x"), ("same", "same")] {
        assert!(
            matches!(
                PopupConfig::new(marker, shown),
                Err(Error::InvalidClassName(_))
            ),
            "{marker:?} {shown:?}"
        );
    }
    let config = PopupConfig::default();
    assert_eq!(config.marker_class(), "popup");
    assert_eq!(config.shown_class(), "shown");
}

#[test]
fn popup_listener_does_not_stop_propagation_or_prevent_default() -> Result<()> {
    let html = r#"
        <body id="body">
          <div id="p" class="popup"><span id="s">x</span></div>
        </body>
        "#;

    let mut page = ready_page(html)?;
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let body = page.select_one("#body")?;
    page.add_event_listener(body, "click", false, move |page, event| {
        let popup = page.select_one("#p")?;
        let shown = page.has_class(popup, "shown")?;
        sink.borrow_mut().push((event.default_prevented(), shown));
        Ok(())
    });

    let s = page.select_one("#s")?;
    let event = page.dispatch_event(s, "click")?;
    assert!(!event.default_prevented());
    assert!(!event.propagation_stopped());
    assert_eq!(*seen.borrow(), vec![(false, true)]);
    Ok(())
}

#[test]
fn prevent_default_is_reported_but_does_not_block_the_toggle() -> Result<()> {
    let mut page = ready_page("<div id='p' class='popup'><a id='link' href='#top'>x</a></div>")?;
    let link = page.select_one("#link")?;
    page.add_event_listener(link, "click", false, |_page, event| {
        event.prevent_default();
        Ok(())
    });
    let event = page.dispatch_event(link, "click")?;
    assert!(event.default_prevented());
    assert!(!event.propagation_stopped());
    page.assert_class("#p", "shown", true)?;
    Ok(())
}

#[test]
fn stop_propagation_below_popup_prevents_toggle() -> Result<()> {
    let mut page = ready_page("<div id='p' class='popup'><button id='btn'>x</button></div>")?;
    let btn = page.select_one("#btn")?;
    let id = page.add_event_listener(btn, "click", false, |_page, event| {
        event.stop_propagation();
        Ok(())
    });
    page.click("#btn")?;
    page.assert_class("#p", "shown", false)?;

    assert!(page.remove_event_listener(id));
    assert!(!page.remove_event_listener(id));
    page.click("#btn")?;
    page.assert_class("#p", "shown", true)?;
    Ok(())
}

#[test]
fn dispatch_visits_capture_target_and_bubble_phases_in_order() -> Result<()> {
    let mut page = Page::from_html("<div id='outer'><span id='inner'>x</span></div>")?;
    let order = Rc::new(RefCell::new(Vec::new()));
    let outer = page.select_one("#outer")?;
    let inner = page.select_one("#inner")?;

    for (node, capture, name) in [
        (outer, true, "outer-capture"),
        (outer, false, "outer-bubble"),
        (inner, false, "inner-bubble"),
        (inner, true, "inner-capture"),
    ] {
        let log = Rc::clone(&order);
        page.add_event_listener(node, "click", capture, move |_page, event| {
            log.borrow_mut().push(format!("{name}:{:?}", event.phase));
            Ok(())
        });
    }

    page.click("#inner")?;
    assert_eq!(
        *order.borrow(),
        vec![
            "outer-capture:Capturing",
            "inner-capture:AtTarget",
            "inner-bubble:AtTarget",
            "outer-bubble:Bubbling",
        ]
    );
    Ok(())
}

#[test]
fn handler_errors_propagate_to_the_caller() -> Result<()> {
    let mut page = Page::from_html("<div id='p'></div>")?;
    let p = page.select_one("#p")?;
    page.add_event_listener(p, "click", false, |_page, _event| {
        Err(Error::Runtime("boom".into()))
    });
    assert_eq!(page.click("#p"), Err(Error::Runtime("boom".into())));
    Ok(())
}

#[test]
fn class_list_mutations_validate_tokens() -> Result<()> {
    let mut page = Page::from_html("<div id='p'>x</div>")?;
    let p = page.select_one("#p")?;
    assert!(matches!(
        page.class_add(p, "two words"),
        Err(Error::InvalidClassName(_))
    ));
    assert!(matches!(page.class_toggle(p, ""), Err(Error::InvalidClassName(_))));
    page.class_add(p, "a")?;
    page.class_add(p, "a")?;
    assert_eq!(page.class_tokens(p)?, vec!["a"]);
    page.class_remove(p, "a")?;
    assert_eq!(page.dump_dom("#p")?, "<div id=\"p\">x</div>");

    let document = page.document();
    assert!(matches!(page.has_class(document, "a"), Err(Error::Runtime(_))));
    Ok(())
}

#[test]
fn selector_errors_surface_from_page_actions() -> Result<()> {
    let mut page = ready_page("<div class='popup'></div>")?;
    assert_eq!(
        page.click("#missing"),
        Err(Error::SelectorNotFound("#missing".into()))
    );
    assert!(matches!(
        page.click("div:hover"),
        Err(Error::UnsupportedSelector(_))
    ));
    assert!(matches!(
        page.click_node(NodeId(999)),
        Err(Error::Runtime(_))
    ));
    Ok(())
}

#[test]
fn assertion_failure_reports_snippet() -> Result<()> {
    let page = ready_page("<div id='p' class='popup'>hello</div>")?;
    match page.assert_class("#p", "shown", true) {
        Err(Error::AssertionFailed {
            selector,
            dom_snippet,
            ..
        }) => {
            assert_eq!(selector, "#p");
            assert!(dom_snippet.contains("class=\"popup\""));
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(page.assert_text("#p", "bye").is_err());
    page.assert_text("#p", "hello")?;
    page.assert_exists("#p")?;
    Ok(())
}

#[test]
fn trace_logs_capture_binding_and_toggles_when_enabled() -> Result<()> {
    let mut page = Page::from_html("<div id='p' class='popup'><i id='i'>x</i></div><p id='out'></p>")?;
    page.enable_trace(true);
    page.set_trace_stderr(false);
    PopupToggler::default().install(&mut page);
    page.fire_ready()?;
    page.click("#i")?;

    let logs = page.take_trace_logs();
    assert!(logs.iter().any(|line| line == "[popup] bound 1 elements marker=popup"));
    assert!(
        logs.iter()
            .any(|line| line == "[event] click target=#i current=#p phase=bubble")
    );
    assert!(logs.iter().any(|line| line == "[popup] toggle #p shown=true"));
    assert!(logs.iter().any(|line| line.starts_with("[event] done click target=#i")));
    assert!(page.take_trace_logs().is_empty());

    let out = page.select_one("#out")?;
    PopupToggler::default().handle_click(&mut page, out)?;
    assert_eq!(
        page.take_trace_logs(),
        vec!["[popup] no popup ancestor for #out".to_string()]
    );
    Ok(())
}

#[test]
fn trace_event_category_can_be_disabled() -> Result<()> {
    let mut page = ready_page("<div id='p' class='popup'></div>")?;
    page.enable_trace(true);
    page.set_trace_stderr(false);
    page.set_trace_events(false);
    page.click("#p")?;
    assert_eq!(page.take_trace_logs(), vec!["[popup] toggle #p shown=true".to_string()]);
    Ok(())
}

#[test]
fn trace_logs_are_empty_when_trace_is_disabled() -> Result<()> {
    let mut page = ready_page("<div id='p' class='popup'></div>")?;
    page.click("#p")?;
    assert!(page.take_trace_logs().is_empty());
    Ok(())
}

#[test]
fn trace_log_limit_keeps_latest_entries() -> Result<()> {
    let mut page = ready_page("<div id='p' class='popup'></div>")?;
    assert!(page.set_trace_log_limit(0).is_err());
    page.enable_trace(true);
    page.set_trace_stderr(false);
    page.set_trace_events(false);
    page.set_trace_log_limit(2)?;
    for _ in 0..3 {
        page.click("#p")?;
    }
    assert_eq!(
        page.take_trace_logs(),
        vec![
            "[popup] toggle #p shown=false".to_string(),
            "[popup] toggle #p shown=true".to_string(),
        ]
    );
    Ok(())
}

#[test]
fn deep_trees_dispatch_and_serialize() -> Result<()> {
    let depth = 5_000;
    let mut html = String::from("<div id='p' class='popup'>");
    for _ in 0..depth {
        html.push_str("<span>");
    }
    html.push_str("<b id='leaf'>x</b>");
    for _ in 0..depth {
        html.push_str("</span>");
    }
    html.push_str("</div>");

    let mut page = ready_page(&html)?;
    page.click("#leaf")?;
    page.assert_class("#p", "shown", true)?;
    assert_eq!(page.text_content(page.select_one("#p")?), "x");
    assert!(page.dump_dom("#p")?.ends_with("</span></div>"));
    Ok(())
}

#[test]
fn contains_node_is_inclusive() -> Result<()> {
    let page = Page::from_html("<div id='p'><i id='i'></i></div><b id='b'></b>")?;
    let p = page.select_one("#p")?;
    let i = page.select_one("#i")?;
    let b = page.select_one("#b")?;
    assert!(page.contains_node(p, p));
    assert!(page.contains_node(p, i));
    assert!(!page.contains_node(p, b));
    assert!(page.contains_node(page.document(), b));
    assert_eq!(i.index(), p.index() + 1);
    Ok(())
}

#[test]
fn only_click_events_toggle() -> Result<()> {
    let mut page = ready_page("<div id='p' class='popup'><i id='i'>x</i></div>")?;
    page.dispatch("#i", "mouseover")?;
    page.dispatch("#i", "focus")?;
    page.assert_class("#p", "shown", false)?;
    page.dispatch("#i", "click")?;
    page.assert_class("#p", "shown", true)?;
    Ok(())
}
