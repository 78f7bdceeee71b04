use super::*;
use std::rc::Rc;

const READY_EVENT: &str = "DOMContentLoaded";
const STACK_RED_ZONE: usize = 256 * 1024;
const STACK_GROW_SIZE: usize = 8 * 1024 * 1024;

/// A loaded document plus the event plumbing of the shell that hosts it.
///
/// The page starts in the loading state. Behaviors register with
/// [`Page::on_ready`] and run when [`Page::fire_ready`] dispatches the
/// ready signal, which happens at most once.
pub struct Page {
    dom: Dom,
    listeners: ListenerStore,
    ready: bool,
    initialized: HashSet<String>,
    trace: bool,
    trace_events: bool,
    trace_logs: Vec<String>,
    trace_log_limit: usize,
    trace_to_stderr: bool,
}

impl Page {
    pub fn from_html(html: &str) -> Result<Self> {
        let dom = html::parse_html(html)?;
        Ok(Self {
            dom,
            listeners: ListenerStore::default(),
            ready: false,
            initialized: HashSet::new(),
            trace: false,
            trace_events: true,
            trace_logs: Vec::new(),
            trace_log_limit: 10_000,
            trace_to_stderr: true,
        })
    }

    pub fn enable_trace(&mut self, enabled: bool) {
        self.trace = enabled;
    }

    pub fn take_trace_logs(&mut self) -> Vec<String> {
        std::mem::take(&mut self.trace_logs)
    }

    pub fn set_trace_stderr(&mut self, enabled: bool) {
        self.trace_to_stderr = enabled;
    }

    pub fn set_trace_events(&mut self, enabled: bool) {
        self.trace_events = enabled;
    }

    pub fn set_trace_log_limit(&mut self, max_entries: usize) -> Result<()> {
        if max_entries == 0 {
            return Err(Error::Runtime(
                "set_trace_log_limit requires at least 1 entry".into(),
            ));
        }
        self.trace_log_limit = max_entries;
        if self.trace_logs.len() > max_entries {
            let excess = self.trace_logs.len() - max_entries;
            self.trace_logs.drain(..excess);
        }
        Ok(())
    }

    pub fn document(&self) -> NodeId {
        self.dom.root
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Registers a hook for the ready signal.
    pub fn on_ready<F>(&mut self, hook: F) -> ListenerId
    where
        F: Fn(&mut Page) -> Result<()> + 'static,
    {
        let root = self.dom.root;
        self.add_event_listener(root, READY_EVENT, false, move |page, _event| hook(page))
    }

    /// Dispatches the ready signal. Hooks registered afterwards never run.
    pub fn fire_ready(&mut self) -> Result<()> {
        if self.ready {
            return Err(Error::Lifecycle("ready signal already fired".into()));
        }
        self.ready = true;
        let root = self.dom.root;
        self.dispatch_event(root, READY_EVENT)?;
        Ok(())
    }

    /// Claims a run-once key. Returns false when the key was already claimed.
    pub fn claim_init(&mut self, key: &str) -> bool {
        self.initialized.insert(key.to_string())
    }

    pub fn add_event_listener<F>(
        &mut self,
        node: NodeId,
        event: &str,
        capture: bool,
        handler: F,
    ) -> ListenerId
    where
        F: Fn(&mut Page, &mut EventState) -> Result<()> + 'static,
    {
        let handler: EventHandler = Rc::new(handler);
        self.listeners.add(node, event.to_string(), capture, handler)
    }

    pub fn remove_event_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    pub fn listener_count(&self, node: NodeId, event: &str) -> usize {
        self.listeners.count(node, event)
    }

    pub fn click(&mut self, selector: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        self.click_node(target)
    }

    /// Clicks an arbitrary node, text nodes included.
    pub fn click_node(&mut self, target: NodeId) -> Result<()> {
        self.dispatch_event(target, "click")?;
        Ok(())
    }

    pub fn dispatch(&mut self, selector: &str, event: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        self.dispatch_event(target, event)?;
        Ok(())
    }

    pub fn dispatch_event(&mut self, target: NodeId, event_type: &str) -> Result<EventState> {
        if !self.dom.contains(target) {
            return Err(Error::Runtime(format!(
                "dispatch target node-{} does not exist",
                target.index()
            )));
        }
        let mut event = EventState::new(event_type, target);

        let mut path = Vec::new();
        let mut cursor = self.dom.parent(target);
        while let Some(node) = cursor {
            path.push(node);
            cursor = self.dom.parent(node);
        }
        path.reverse();

        event.phase = EventPhase::Capturing;
        for node in &path {
            event.current_target = *node;
            self.invoke_listeners(*node, &mut event, true)?;
            if event.propagation_stopped {
                self.trace_event_done(&event, "propagation_stopped");
                return Ok(event);
            }
        }

        // Target phase: capture listeners first.
        event.phase = EventPhase::AtTarget;
        event.current_target = target;
        self.invoke_listeners(target, &mut event, true)?;
        if !event.propagation_stopped {
            self.invoke_listeners(target, &mut event, false)?;
        }
        if event.propagation_stopped {
            self.trace_event_done(&event, "propagation_stopped");
            return Ok(event);
        }

        event.phase = EventPhase::Bubbling;
        for node in path.iter().rev() {
            event.current_target = *node;
            self.invoke_listeners(*node, &mut event, false)?;
            if event.propagation_stopped {
                self.trace_event_done(&event, "propagation_stopped");
                return Ok(event);
            }
        }

        self.trace_event_done(&event, "completed");
        Ok(event)
    }

    fn invoke_listeners(
        &mut self,
        node_id: NodeId,
        event: &mut EventState,
        capture: bool,
    ) -> Result<()> {
        let listeners = self.listeners.get(node_id, &event.event_type, capture);
        for listener in listeners {
            if self.trace && self.trace_events {
                let target_label = self.trace_node_label(event.target);
                let current_label = self.trace_node_label(event.current_target);
                self.trace_event_line(format!(
                    "[event] {} target={} current={} phase={}",
                    event.event_type,
                    target_label,
                    current_label,
                    event.phase.label()
                ));
            }
            // Handlers may dispatch nested events.
            stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
                (listener.handler)(self, event)
            })?;
        }
        Ok(())
    }

    pub fn select_one(&self, selector: &str) -> Result<NodeId> {
        self.dom
            .query_selector(selector)?
            .ok_or_else(|| Error::SelectorNotFound(selector.to_string()))
    }

    pub fn select_all(&self, selector: &str) -> Result<Vec<NodeId>> {
        self.dom.query_selector_all(selector)
    }

    /// Elements carrying `class_name`, in document order.
    pub fn elements_by_class_name(&self, class_name: &str) -> Vec<NodeId> {
        self.dom.elements_by_class_name(class_name)
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.dom.parent(node)
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.dom.children(node)
    }

    pub fn contains_node(&self, ancestor: NodeId, node: NodeId) -> bool {
        ancestor == node || self.dom.is_descendant_of(node, ancestor)
    }

    pub fn closest_with_class(&self, node: NodeId, class_name: &str) -> Option<NodeId> {
        self.dom.closest_with_class(node, class_name)
    }

    pub fn tag_name(&self, node: NodeId) -> Option<&str> {
        self.dom.tag_name(node)
    }

    pub fn id_of(&self, node: NodeId) -> Option<&str> {
        self.dom.attr(node, "id")
    }

    pub fn text_content(&self, node: NodeId) -> String {
        self.dom.text_content(node)
    }

    pub fn has_class(&self, node: NodeId, class_name: &str) -> Result<bool> {
        self.dom.class_contains(node, class_name)
    }

    pub fn class_tokens(&self, node: NodeId) -> Result<Vec<String>> {
        self.dom.class_list(node)
    }

    pub fn class_add(&mut self, node: NodeId, class_name: &str) -> Result<()> {
        check_class_token(class_name)?;
        self.dom.class_add(node, class_name)
    }

    pub fn class_remove(&mut self, node: NodeId, class_name: &str) -> Result<()> {
        check_class_token(class_name)?;
        self.dom.class_remove(node, class_name)
    }

    /// Flips `class_name` and returns whether it is now present.
    pub fn class_toggle(&mut self, node: NodeId, class_name: &str) -> Result<bool> {
        check_class_token(class_name)?;
        self.dom.class_toggle(node, class_name)
    }

    /// Parses `html` and appends its nodes to the element matching `selector`.
    /// Listeners are not attached to the new nodes.
    pub fn append_html(&mut self, selector: &str, html: &str) -> Result<Vec<NodeId>> {
        let parent = self.select_one(selector)?;
        let fragment = html::parse_html(html)?;
        self.dom.append_fragment(parent, &fragment)
    }

    pub fn assert_class(&self, selector: &str, class_name: &str, expected: bool) -> Result<()> {
        let target = self.select_one(selector)?;
        let actual = self.dom.class_contains(target, class_name)?;
        if actual != expected {
            return Err(Error::AssertionFailed {
                selector: selector.to_string(),
                expected: format!("class {class_name} present={expected}"),
                actual: format!("class {class_name} present={actual}"),
                dom_snippet: self.node_snippet(target),
            });
        }
        Ok(())
    }

    pub fn assert_text(&self, selector: &str, expected: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        let actual = self.dom.text_content(target);
        if actual != expected {
            return Err(Error::AssertionFailed {
                selector: selector.to_string(),
                expected: expected.to_string(),
                actual,
                dom_snippet: self.node_snippet(target),
            });
        }
        Ok(())
    }

    pub fn assert_exists(&self, selector: &str) -> Result<()> {
        let _ = self.select_one(selector)?;
        Ok(())
    }

    pub fn dump_dom(&self, selector: &str) -> Result<String> {
        let target = self.select_one(selector)?;
        Ok(self.dom.dump_node(target))
    }

    fn node_snippet(&self, node_id: NodeId) -> String {
        truncate_chars(&self.dom.dump_node(node_id), 200)
    }

    pub(crate) fn trace_node_label(&self, node: NodeId) -> String {
        if let Some(id) = self.dom.attr(node, "id") {
            if !id.is_empty() {
                return format!("#{id}");
            }
        }
        if node == self.dom.root {
            return "document".to_string();
        }
        self.dom
            .tag_name(node)
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| format!("node-{}", node.index()))
    }

    fn trace_event_done(&mut self, event: &EventState, outcome: &str) {
        if !(self.trace && self.trace_events) {
            return;
        }
        let target_label = self.trace_node_label(event.target);
        let current_label = self.trace_node_label(event.current_target);
        self.trace_event_line(format!(
            "[event] done {} target={} current={} outcome={} default_prevented={} propagation_stopped={}",
            event.event_type,
            target_label,
            current_label,
            outcome,
            event.default_prevented,
            event.propagation_stopped
        ));
    }

    fn trace_event_line(&mut self, line: String) {
        if self.trace && self.trace_events {
            self.trace_line(line);
        }
    }

    pub(crate) fn trace_line(&mut self, line: String) {
        if self.trace {
            if self.trace_to_stderr {
                eprintln!("{line}");
            }
            if self.trace_logs.len() >= self.trace_log_limit {
                self.trace_logs.remove(0);
            }
            self.trace_logs.push(line);
        }
    }

    pub(crate) fn trace_enabled(&self) -> bool {
        self.trace
    }
}

fn check_class_token(class_name: &str) -> Result<()> {
    if is_valid_class_token(class_name) {
        Ok(())
    } else {
        Err(Error::InvalidClassName(class_name.to_string()))
    }
}
