use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use serde_json::Value;
use tracing::{debug, error};

use super::error::BridgeError;

/// Callback installed for one event name.
pub type EventHandler = Rc<dyn Fn(Value) -> anyhow::Result<()>>;

/// What happened to an inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The handler ran immediately.
    Dispatched,
    /// The event is waiting in the pending queue at the given depth.
    Queued { depth: usize },
}

#[derive(Default)]
struct ChannelState {
    handlers: HashMap<String, EventHandler>,
    pending: VecDeque<(String, Value)>,
}

impl ChannelState {
    /// Pop the head entry if its handler is installed.
    fn pop_ready(&mut self) -> Option<(String, EventHandler, Value)> {
        let handler = {
            let (name, _) = self.pending.front()?;
            Rc::clone(self.handlers.get(name)?)
        };
        let (name, payload) = self.pending.pop_front()?;
        Some((name, handler, payload))
    }
}

/// Single-handler-per-name event table with a globally ordered pending queue.
///
/// Entries leave the queue only from the head, and only once a handler for the
/// head's name exists. An unhandled name at the head blocks everything behind
/// it, which keeps delivery in arrival order across all names.
///
/// No borrow is held while a handler runs, so handlers may register further
/// handlers or deliver events re-entrantly.
#[derive(Default)]
pub struct EventChannel {
    state: RefCell<ChannelState>,
}

impl EventChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the handler for `name` and drain whatever it unblocks.
    pub fn register<F>(&self, name: &str, handler: F) -> Result<(), BridgeError>
    where
        F: Fn(Value) -> anyhow::Result<()> + 'static,
    {
        {
            let mut state = self.state.borrow_mut();
            if state.handlers.contains_key(name) {
                return Err(BridgeError::DuplicateHandler(name.to_string()));
            }
            state.handlers.insert(name.to_string(), Rc::new(handler));
        }
        debug!(target: "bridge", event = %name, "registered event handler");
        self.drain();
        Ok(())
    }

    /// Route an inbound event through the fast path or onto the queue.
    pub fn deliver(&self, name: String, payload: Value) -> Delivery {
        let mut state = self.state.borrow_mut();
        let fast = if state.pending.is_empty() {
            state.handlers.get(&name).cloned()
        } else {
            None
        };

        match fast {
            Some(handler) => {
                drop(state);
                invoke(&name, &handler, payload);
                Delivery::Dispatched
            }
            None => {
                let depth = state.pending.len() + 1;
                debug!(target: "bridge", event = %name, depth, "queued inbound event");
                state.pending.push_back((name, payload));
                Delivery::Queued { depth }
            }
        }
    }

    pub fn pending_len(&self) -> usize {
        self.state.borrow().pending.len()
    }

    fn drain(&self) {
        loop {
            let next = self.state.borrow_mut().pop_ready();
            let Some((name, handler, payload)) = next else {
                break;
            };
            invoke(&name, &handler, payload);
        }
    }
}

fn invoke(name: &str, handler: &EventHandler, payload: Value) {
    if let Err(err) = handler(payload) {
        error!(target: "bridge", event = %name, error = %err, "event handler failed");
    }
}
