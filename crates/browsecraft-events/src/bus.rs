//! A synchronous typed pub/sub bus: one channel per event name plus a
//! global "any" channel. `emit` snapshots the listener list, drops the
//! lock, then calls each handler with `catch_unwind` isolation — the
//! same panic-isolation idiom the agent runtime's `Agent::emit` uses
//! for its synchronous subscriber list.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub type Handler = Arc<dyn Fn(&Value) + Send + Sync>;

#[derive(Clone)]
struct Listener {
    id: u64,
    once: bool,
    handler: Handler,
}

#[derive(Clone)]
pub struct HistoryEntry {
    pub name: String,
    pub payload: Value,
}

#[derive(Clone, Copy)]
enum Target<'a> {
    Named(&'a str),
    Any,
}

struct Inner {
    channels: HashMap<String, Vec<Listener>>,
    any_channel: Vec<Listener>,
    next_id: u64,
    history_enabled: bool,
    history: Vec<HistoryEntry>,
}

impl Inner {
    fn remove(&mut self, target: Target<'_>, id: u64) {
        match target {
            Target::Named(name) => {
                if let Some(listeners) = self.channels.get_mut(name) {
                    listeners.retain(|l| l.id != id);
                    if listeners.is_empty() {
                        self.channels.remove(name);
                    }
                }
            }
            Target::Any => self.any_channel.retain(|l| l.id != id),
        }
    }
}

/// A handle returned from `on`/`once` that removes that one listener.
/// Dropping it without calling `unsubscribe` leaves the listener
/// registered — unsubscription here is explicit, not RAII.
pub struct Unsubscribe {
    inner: Arc<Mutex<Inner>>,
    name: Option<String>,
    id: u64,
}

impl Unsubscribe {
    pub fn unsubscribe(self) {
        let mut inner = self.inner.lock().expect("event bus mutex poisoned");
        let target = match &self.name {
            Some(name) => Target::Named(name),
            None => Target::Any,
        };
        inner.remove(target, self.id);
    }
}

#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Mutex<Inner>>,
}

impl Default for EventBus {
    fn default() -> Self {
        EventBus {
            inner: Arc::new(Mutex::new(Inner {
                channels: HashMap::new(),
                any_channel: Vec::new(),
                next_id: 0,
                history_enabled: false,
                history: Vec::new(),
            })),
        }
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to `name`, or to every event if `name` is `None`.
    pub fn on(&self, name: Option<&str>, handler: Handler) -> Unsubscribe {
        self.add_listener(name, handler, false)
    }

    /// Like `on`, but the handler is removed before its body runs on
    /// the first matching `emit`.
    pub fn once(&self, name: Option<&str>, handler: Handler) -> Unsubscribe {
        self.add_listener(name, handler, true)
    }

    fn add_listener(&self, name: Option<&str>, handler: Handler, once: bool) -> Unsubscribe {
        let mut inner = self.inner.lock().expect("event bus mutex poisoned");
        let id = inner.next_id;
        inner.next_id += 1;
        let listener = Listener { id, once, handler };
        match name {
            Some(name) => inner.channels.entry(name.to_string()).or_default().push(listener),
            None => inner.any_channel.push(listener),
        }
        Unsubscribe { inner: Arc::clone(&self.inner), name: name.map(str::to_string), id }
    }

    pub fn emit(&self, name: &str, payload: Value) {
        let (named_snapshot, any_snapshot) = {
            let mut inner = self.inner.lock().expect("event bus mutex poisoned");
            if inner.history_enabled {
                inner.history.push(HistoryEntry { name: name.to_string(), payload: payload.clone() });
            }
            let named = inner.channels.get(name).cloned().unwrap_or_default();
            let any = inner.any_channel.clone();
            (named, any)
        };

        self.dispatch(Target::Named(name), &payload, named_snapshot);
        self.dispatch(Target::Any, &payload, any_snapshot);
    }

    fn dispatch(&self, target: Target<'_>, payload: &Value, snapshot: Vec<Listener>) {
        for listener in snapshot {
            if listener.once {
                let mut inner = self.inner.lock().expect("event bus mutex poisoned");
                inner.remove(target, listener.id);
            }
            let handler = Arc::clone(&listener.handler);
            let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| handler(payload)));
        }
    }

    /// Removes every listener of `name`, or every listener on the bus
    /// (named channels and the "any" channel) if `name` is `None`.
    pub fn off(&self, name: Option<&str>) {
        let mut inner = self.inner.lock().expect("event bus mutex poisoned");
        match name {
            Some(name) => {
                inner.channels.remove(name);
            }
            None => {
                inner.channels.clear();
                inner.any_channel.clear();
            }
        }
    }

    /// Listener count for `name`, or the total across every named
    /// channel plus the "any" channel if `name` is `None`.
    pub fn listener_count(&self, name: Option<&str>) -> usize {
        let inner = self.inner.lock().expect("event bus mutex poisoned");
        match name {
            Some(name) => inner.channels.get(name).map_or(0, Vec::len),
            None => inner.channels.values().map(Vec::len).sum::<usize>() + inner.any_channel.len(),
        }
    }

    pub fn event_names(&self) -> Vec<String> {
        let inner = self.inner.lock().expect("event bus mutex poisoned");
        inner.channels.keys().cloned().collect()
    }

    pub fn enable_history(&self) {
        self.inner.lock().expect("event bus mutex poisoned").history_enabled = true;
    }

    pub fn disable_history(&self) {
        self.inner.lock().expect("event bus mutex poisoned").history_enabled = false;
    }

    pub fn get_history(&self) -> Vec<HistoryEntry> {
        self.inner.lock().expect("event bus mutex poisoned").history.clone()
    }

    pub fn get_events_of_type(&self, name: &str) -> Vec<HistoryEntry> {
        self.inner
            .lock()
            .expect("event bus mutex poisoned")
            .history
            .iter()
            .filter(|entry| entry.name == name)
            .cloned()
            .collect()
    }

    pub fn clear_history(&self) {
        self.inner.lock().expect("event bus mutex poisoned").history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn emit_with_no_listeners_is_a_no_op() {
        let bus = EventBus::new();
        bus.emit("nothing:happens", json!({}));
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let a = Arc::clone(&order);
        bus.on(Some("x"), Arc::new(move |_| a.lock().unwrap().push(1)));
        let b = Arc::clone(&order);
        bus.on(Some("x"), Arc::new(move |_| b.lock().unwrap().push(2)));
        bus.emit("x", json!(null));
        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn panicking_handler_does_not_stop_later_handlers() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        bus.on(Some("x"), Arc::new(|_| panic!("boom")));
        let count_clone = Arc::clone(&count);
        bus.on(Some("x"), Arc::new(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        }));
        bus.emit("x", json!(null));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn once_handler_fires_exactly_one_time() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        bus.once(Some("x"), Arc::new(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        }));
        bus.emit("x", json!(null));
        bus.emit("x", json!(null));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(bus.listener_count(Some("x")), 0);
    }

    #[test]
    fn any_channel_receives_every_event() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        bus.on(None, Arc::new(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        }));
        bus.emit("a", json!(null));
        bus.emit("b", json!(null));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unsubscribe_removes_only_that_listener() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        let handle = bus.on(Some("x"), Arc::new(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        }));
        bus.on(Some("x"), Arc::new(|_| {}));
        handle.unsubscribe();
        bus.emit("x", json!(null));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(bus.listener_count(Some("x")), 1);
    }

    #[test]
    fn history_records_only_while_enabled() {
        let bus = EventBus::new();
        bus.emit("a", json!(1));
        assert!(bus.get_history().is_empty());
        bus.enable_history();
        bus.emit("a", json!(2));
        bus.emit("b", json!(3));
        assert_eq!(bus.get_history().len(), 2);
        assert_eq!(bus.get_events_of_type("a").len(), 1);
        bus.clear_history();
        assert!(bus.get_history().is_empty());
    }

    #[test]
    fn off_without_name_clears_everything() {
        let bus = EventBus::new();
        bus.on(Some("x"), Arc::new(|_| {}));
        bus.on(None, Arc::new(|_| {}));
        bus.off(None);
        assert_eq!(bus.listener_count(None), 0);
        assert!(bus.event_names().is_empty());
    }
}
