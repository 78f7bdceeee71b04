//! Click-to-toggle behavior for popup containers.
//!
//! Every element carrying the marker class gets a click listener when the
//! page becomes ready. A click walks from the event target up through its
//! parents to the nearest marked element and flips the visibility class on
//! it. Visibility lives only in the element's `class` attribute.

use super::*;
use std::rc::Rc;

pub const DEFAULT_MARKER_CLASS: &str = "popup";
pub const DEFAULT_SHOWN_CLASS: &str = "shown";

/// Class names the toggler reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupConfig {
    marker_class: String,
    shown_class: String,
}

impl PopupConfig {
    pub fn new(marker_class: &str, shown_class: &str) -> Result<Self> {
        for name in [marker_class, shown_class] {
            if !is_valid_class_token(name) {
                return Err(Error::InvalidClassName(name.to_string()));
            }
        }
        if marker_class == shown_class {
            return Err(Error::InvalidClassName(format!(
                "{shown_class} is also the marker class"
            )));
        }
        Ok(Self {
            marker_class: marker_class.to_string(),
            shown_class: shown_class.to_string(),
        })
    }

    pub fn marker_class(&self) -> &str {
        &self.marker_class
    }

    pub fn shown_class(&self) -> &str {
        &self.shown_class
    }
}

impl Default for PopupConfig {
    fn default() -> Self {
        Self {
            marker_class: DEFAULT_MARKER_CLASS.to_string(),
            shown_class: DEFAULT_SHOWN_CLASS.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PopupToggler {
    config: PopupConfig,
}

impl PopupToggler {
    pub fn new(config: PopupConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PopupConfig {
        &self.config
    }

    /// Runs [`PopupToggler::init`] when the page fires its ready signal.
    pub fn install(self, page: &mut Page) -> ListenerId {
        page.on_ready(move |page| self.init(page).map(|_| ()))
    }

    /// Binds a click listener to every popup currently in the document, in
    /// document order, and returns how many were bound.
    ///
    /// Binding happens once per page and marker class; a repeated call
    /// registers nothing and fails with [`Error::AlreadyInitialized`].
    pub fn init(&self, page: &mut Page) -> Result<usize> {
        let key = format!("popup-toggler:{}", self.config.marker_class);
        if !page.claim_init(&key) {
            return Err(Error::AlreadyInitialized(key));
        }

        let popups = page.elements_by_class_name(&self.config.marker_class);
        let shared = Rc::new(BoundPopups {
            toggler: self.clone(),
            nodes: popups.iter().copied().collect(),
        });
        for popup in &popups {
            let bound_popups = Rc::clone(&shared);
            let bound = *popup;
            page.add_event_listener(bound, "click", false, move |page, event| {
                bound_popups.on_click(page, bound, event)
            });
        }

        if page.trace_enabled() {
            page.trace_line(format!(
                "[popup] bound {} elements marker={}",
                popups.len(),
                self.config.marker_class
            ));
        }
        Ok(popups.len())
    }

    /// Toggles the visibility class on the nearest popup at or above
    /// `target`. Returns the toggled popup, or `None` when no ancestor
    /// carries the marker.
    pub fn handle_click(&self, page: &mut Page, target: NodeId) -> Result<Option<NodeId>> {
        match page.closest_with_class(target, &self.config.marker_class) {
            Some(popup) => {
                self.toggle(page, popup)?;
                Ok(Some(popup))
            }
            None => {
                if page.trace_enabled() {
                    let label = page.trace_node_label(target);
                    page.trace_line(format!("[popup] no popup ancestor for {label}"));
                }
                Ok(None)
            }
        }
    }

    pub fn is_shown(&self, page: &Page, popup: NodeId) -> Result<bool> {
        page.has_class(popup, &self.config.shown_class)
    }

    fn toggle(&self, page: &mut Page, popup: NodeId) -> Result<bool> {
        let shown = page.class_toggle(popup, &self.config.shown_class)?;
        if page.trace_enabled() {
            let label = page.trace_node_label(popup);
            page.trace_line(format!("[popup] toggle {label} shown={shown}"));
        }
        Ok(shown)
    }
}

/// Popups bound by one `init` call, shared by their listeners.
struct BoundPopups {
    toggler: PopupToggler,
    nodes: HashSet<NodeId>,
}

impl BoundPopups {
    // A click bubbles through every enclosing bound popup. Only the nearest
    // listener acts, toggling the nearest marked popup whether bound or not.
    fn on_click(&self, page: &mut Page, bound: NodeId, event: &EventState) -> Result<()> {
        if self.nearest_bound(page, event.target) != Some(bound) {
            return Ok(());
        }
        self.toggler.handle_click(page, event.target)?;
        Ok(())
    }

    fn nearest_bound(&self, page: &Page, node: NodeId) -> Option<NodeId> {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if self.nodes.contains(&current) {
                return Some(current);
            }
            cursor = page.parent(current);
        }
        None
    }
}
