use super::*;
use std::rc::Rc;

/// Listener callback. Receives the page so handlers can read and mutate the DOM.
pub(crate) type EventHandler = Rc<dyn Fn(&mut Page, &mut EventState) -> Result<()>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventPhase {
    Capturing,
    AtTarget,
    Bubbling,
}

impl EventPhase {
    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::Capturing => "capture",
            Self::AtTarget => "target",
            Self::Bubbling => "bubble",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventState {
    pub event_type: String,
    pub target: NodeId,
    pub current_target: NodeId,
    pub phase: EventPhase,
    pub(crate) default_prevented: bool,
    pub(crate) propagation_stopped: bool,
}

impl EventState {
    pub(crate) fn new(event_type: &str, target: NodeId) -> Self {
        Self {
            event_type: event_type.to_string(),
            target,
            current_target: target,
            phase: EventPhase::AtTarget,
            default_prevented: false,
            propagation_stopped: false,
        }
    }

    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }

    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }
}

#[derive(Clone)]
pub(crate) struct Listener {
    pub(crate) id: ListenerId,
    pub(crate) capture: bool,
    pub(crate) handler: EventHandler,
}

#[derive(Default)]
pub(crate) struct ListenerStore {
    map: HashMap<NodeId, HashMap<String, Vec<Listener>>>,
    next_id: u64,
}

impl ListenerStore {
    pub(crate) fn add(
        &mut self,
        node_id: NodeId,
        event: String,
        capture: bool,
        handler: EventHandler,
    ) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.map
            .entry(node_id)
            .or_default()
            .entry(event)
            .or_default()
            .push(Listener {
                id,
                capture,
                handler,
            });
        id
    }

    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        let mut removed = false;
        for events in self.map.values_mut() {
            for listeners in events.values_mut() {
                let before = listeners.len();
                listeners.retain(|listener| listener.id != id);
                removed |= listeners.len() != before;
            }
            events.retain(|_, listeners| !listeners.is_empty());
        }
        self.map.retain(|_, events| !events.is_empty());
        removed
    }

    /// Listeners in registration order. Cloned so handlers may mutate the store.
    pub(crate) fn get(&self, node_id: NodeId, event: &str, capture: bool) -> Vec<Listener> {
        self.map
            .get(&node_id)
            .and_then(|events| events.get(event))
            .map(|listeners| {
                listeners
                    .iter()
                    .filter(|listener| listener.capture == capture)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn count(&self, node_id: NodeId, event: &str) -> usize {
        self.map
            .get(&node_id)
            .and_then(|events| events.get(event))
            .map(Vec::len)
            .unwrap_or(0)
    }
}
