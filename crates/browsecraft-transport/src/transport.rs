//! Command/response correlation, event dispatch, and timeout handling over a
//! [`ChannelHalves`] duplex channel.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use browsecraft_core::{redact, Command, ErrCode, InboundMessage, JsonMap, ProtocolError};
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::channel::{ChannelHalves, Direction, OutboundSink};
use crate::error::TransportError;

/// Default command deadline, per §4.A.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Options a Transport is constructed with. Every tunable is an explicit
/// field with a documented default rather than a buried constant.
#[derive(Clone)]
pub struct TransportOptions {
    pub default_timeout: Duration,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

pub type EventHandler = Arc<dyn Fn(JsonMap) + Send + Sync>;
pub type RawMessageHook = Arc<dyn Fn(Direction, &Value) + Send + Sync>;

struct PendingCommand {
    resolver: oneshot::Sender<Result<JsonMap, TransportError>>,
    timer: JoinHandle<()>,
}

struct Subscriber {
    id: u64,
    handler: EventHandler,
}

struct Inner {
    next_id: AtomicU64,
    next_sub_id: AtomicU64,
    pending: Mutex<HashMap<u64, PendingCommand>>,
    subscribers: Mutex<HashMap<String, Vec<Subscriber>>>,
    any_subscribers: Mutex<Vec<Subscriber>>,
    outbound: Box<dyn OutboundSink>,
    closed: AtomicBool,
    default_timeout: Duration,
    raw_hook: Mutex<Option<RawMessageHook>>,
}

/// A BiDi transport sitting on top of either a real or virtual duplex
/// channel. Construct with [`Transport::spawn`]; the returned value is
/// already wrapped in `Arc` since the inbound loop holds a clone.
pub struct Transport {
    inner: Arc<Inner>,
    inbound_task: Mutex<Option<JoinHandle<()>>>,
}

/// Handle returned by `subscribe`/`subscribe_any`; call `.unsubscribe()` to
/// stop receiving events. Dropping it without calling `.unsubscribe()`
/// leaves the subscription active (explicit over Drop-based removal).
pub struct Unsubscribe {
    inner: Arc<Inner>,
    target: UnsubTarget,
}

enum UnsubTarget {
    Named(String, u64),
    Any(u64),
}

impl Unsubscribe {
    pub fn unsubscribe(self) {
        match self.target {
            UnsubTarget::Named(name, id) => {
                if let Some(list) = self.inner.subscribers.lock().unwrap().get_mut(&name) {
                    list.retain(|s| s.id != id);
                }
            }
            UnsubTarget::Any(id) => {
                self.inner
                    .any_subscribers
                    .lock()
                    .unwrap()
                    .retain(|s| s.id != id);
            }
        }
    }
}

impl Transport {
    /// Takes ownership of a constructed channel and starts the inbound
    /// dispatch loop.
    pub fn spawn(halves: ChannelHalves, options: TransportOptions) -> Arc<Transport> {
        let inner = Arc::new(Inner {
            next_id: AtomicU64::new(0),
            next_sub_id: AtomicU64::new(0),
            pending: Mutex::new(HashMap::new()),
            subscribers: Mutex::new(HashMap::new()),
            any_subscribers: Mutex::new(Vec::new()),
            outbound: halves.outbound,
            closed: AtomicBool::new(false),
            default_timeout: options.default_timeout,
            raw_hook: Mutex::new(None),
        });

        let loop_inner = Arc::clone(&inner);
        let mut inbound = halves.inbound;
        let inbound_task = tokio::spawn(async move {
            while let Some(raw) = inbound.recv().await {
                handle_inbound_message(&loop_inner, raw);
            }
            close_inner(&loop_inner);
        });

        Arc::new(Transport {
            inner,
            inbound_task: Mutex::new(Some(inbound_task)),
        })
    }

    /// Registers a hook invoked with every raw frame (after redaction),
    /// tagged with its direction. Intended for tracing.
    pub fn on_raw_message(&self, hook: RawMessageHook) {
        *self.inner.raw_hook.lock().unwrap() = Some(hook);
    }

    /// Sends a command and awaits its matching response, or `Timeout`/
    /// `ConnectionClosed` if the deadline elapses or the channel drops
    /// first.
    pub async fn send(
        &self,
        method: impl Into<String>,
        params: JsonMap,
    ) -> Result<JsonMap, TransportError> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionClosed);
        }

        let method = method.into();
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let command = Command {
            id,
            method: method.clone(),
            params,
        };

        emit_raw(&self.inner, Direction::Outbound, &command);
        let payload = serde_json::to_string(&command).map_err(|err| {
            TransportError::Protocol(ProtocolError::new(ErrCode::UnknownError, err.to_string()))
        })?;

        let (tx, rx) = oneshot::channel();
        let timer_inner = Arc::clone(&self.inner);
        let timeout_duration = self.inner.default_timeout;
        let started = Instant::now();
        let timer_method = method.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout_duration).await;
            if let Some(pending) = timer_inner.pending.lock().unwrap().remove(&id) {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                let _ = pending.resolver.send(Err(TransportError::Timeout {
                    operation: timer_method,
                    elapsed_ms,
                }));
            }
        });

        self.inner
            .pending
            .lock()
            .unwrap()
            .insert(id, PendingCommand { resolver: tx, timer });

        if let Err(err) = self.inner.outbound.send_text(payload).await {
            if let Some(pending) = self.inner.pending.lock().unwrap().remove(&id) {
                pending.timer.abort();
            }
            self.inner.closed.store(true, Ordering::SeqCst);
            return Err(err);
        }

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(TransportError::ConnectionClosed),
        }
    }

    /// Subscribes to one named event. Fires for every `Event{method, ..}`
    /// whose method matches `name`.
    pub fn subscribe(&self, name: impl Into<String>, handler: EventHandler) -> Unsubscribe {
        let name = name.into();
        let id = self.inner.next_sub_id.fetch_add(1, Ordering::SeqCst);
        self.inner
            .subscribers
            .lock()
            .unwrap()
            .entry(name.clone())
            .or_default()
            .push(Subscriber { id, handler });
        Unsubscribe {
            inner: Arc::clone(&self.inner),
            target: UnsubTarget::Named(name, id),
        }
    }

    /// Subscribes to every event, regardless of method name.
    pub fn subscribe_any(&self, handler: EventHandler) -> Unsubscribe {
        let id = self.inner.next_sub_id.fetch_add(1, Ordering::SeqCst);
        self.inner
            .any_subscribers
            .lock()
            .unwrap()
            .push(Subscriber { id, handler });
        Unsubscribe {
            inner: Arc::clone(&self.inner),
            target: UnsubTarget::Any(id),
        }
    }

    /// Awaits the next event named `name` satisfying `predicate`, or times
    /// out after `timeout` (default 30s, matching the command deadline).
    pub async fn wait_for_event(
        &self,
        name: impl Into<String>,
        predicate: impl Fn(&JsonMap) -> bool + Send + Sync + 'static,
        timeout: Option<Duration>,
    ) -> Result<JsonMap, TransportError> {
        let name = name.into();
        let (tx, rx) = oneshot::channel();
        let tx = Mutex::new(Some(tx));
        let unsub = self.subscribe(
            name.clone(),
            Arc::new(move |params: JsonMap| {
                if predicate(&params) {
                    if let Some(tx) = tx.lock().unwrap().take() {
                        let _ = tx.send(params);
                    }
                }
            }),
        );

        let wait = timeout.unwrap_or(self.inner.default_timeout);
        let result = tokio::time::timeout(wait, rx).await;
        unsub.unsubscribe();

        match result {
            Ok(Ok(params)) => Ok(params),
            Ok(Err(_)) => Err(TransportError::ConnectionClosed),
            Err(_) => Err(TransportError::Timeout {
                operation: format!("wait_for_event({name})"),
                elapsed_ms: wait.as_millis() as u64,
            }),
        }
    }

    /// Closes the channel: stops accepting new commands, resolves every
    /// outstanding pending command with `ConnectionClosed`, and tears down
    /// the inbound loop.
    pub async fn close(&self) {
        close_inner(&self.inner);
        let _ = self.inner.outbound.close().await;
        if let Some(task) = self.inbound_task.lock().unwrap().take() {
            task.abort();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }
}

fn close_inner(inner: &Arc<Inner>) {
    if inner.closed.swap(true, Ordering::SeqCst) {
        return;
    }
    let pending: Vec<(u64, PendingCommand)> = inner.pending.lock().unwrap().drain().collect();
    for (_, pending) in pending {
        pending.timer.abort();
        let _ = pending.resolver.send(Err(TransportError::ConnectionClosed));
    }
}

fn handle_inbound_message(inner: &Arc<Inner>, raw: String) {
    let value: Value = match serde_json::from_str(&raw) {
        Ok(v) => v,
        Err(_) => {
            tracing::warn!("dropping malformed inbound frame");
            return;
        }
    };
    emit_raw(inner, Direction::Inbound, &value);

    let message: InboundMessage = match serde_json::from_value(value) {
        Ok(m) => m,
        Err(_) => {
            tracing::warn!("dropping unrecognized inbound message shape");
            return;
        }
    };

    match message {
        InboundMessage::Success { id, result } => resolve_pending(inner, id, Ok(result)),
        InboundMessage::Error {
            id,
            error,
            message,
            stacktrace,
        } => resolve_pending(
            inner,
            id,
            Err(TransportError::Protocol(ProtocolError {
                code: error,
                message,
                stacktrace,
            })),
        ),
        InboundMessage::Event { method, params } => dispatch_event(inner, &method, params),
    }
}

fn resolve_pending(inner: &Arc<Inner>, id: u64, result: Result<JsonMap, TransportError>) {
    let pending = inner.pending.lock().unwrap().remove(&id);
    match pending {
        Some(pending) => {
            pending.timer.abort();
            let _ = pending.resolver.send(result);
        }
        None => {
            tracing::debug!(id, "discarding response with no pending entry");
        }
    }
}

fn dispatch_event(inner: &Arc<Inner>, method: &str, params: JsonMap) {
    let named: Vec<EventHandler> = inner
        .subscribers
        .lock()
        .unwrap()
        .get(method)
        .map(|subs| subs.iter().map(|s| s.handler.clone()).collect())
        .unwrap_or_default();
    let any: Vec<EventHandler> = inner
        .any_subscribers
        .lock()
        .unwrap()
        .iter()
        .map(|s| s.handler.clone())
        .collect();

    for handler in named.into_iter().chain(any) {
        let params = params.clone();
        // One handler's panic must never stop delivery to the rest.
        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| handler(params)));
        if outcome.is_err() {
            tracing::warn!(method, "event handler panicked; isolated");
        }
    }
}

fn emit_raw(inner: &Arc<Inner>, direction: Direction, command_or_value: &impl serde::Serialize) {
    let hook = inner.raw_hook.lock().unwrap().clone();
    if let Some(hook) = hook {
        if let Ok(value) = serde_json::to_value(command_or_value) {
            hook(direction, &redact(value));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::channel::virtual_channel;

    fn spawn_echo_transport() -> (Arc<Transport>, crate::channel::VirtualInboundFeed) {
        let (halves, feed) = virtual_channel(move |_payload| {});
        let transport = Transport::spawn(halves, TransportOptions::default());
        (transport, feed)
    }

    #[tokio::test]
    async fn correlates_response_by_id_regardless_of_arrival_order() {
        let sent_ids = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sent_ids_for_cb = Arc::clone(&sent_ids);
        let (halves, feed) = virtual_channel(move |payload| {
            let command: Command = serde_json::from_str(&payload).unwrap();
            sent_ids_for_cb.lock().unwrap().push(command.id);
        });
        let transport = Transport::spawn(halves, TransportOptions::default());

        let t1 = Arc::clone(&transport);
        let fut1 = tokio::spawn(async move { t1.send("a.one", JsonMap::new()).await });
        let t2 = Arc::clone(&transport);
        let fut2 = tokio::spawn(async move { t2.send("a.two", JsonMap::new()).await });

        // Give both sends a chance to register before we reply out of order.
        tokio::time::sleep(Duration::from_millis(20)).await;
        feed.push(r#"{"type":"success","id":1,"result":{"who":"two"}}"#)
            .unwrap();
        feed.push(r#"{"type":"success","id":0,"result":{"who":"one"}}"#)
            .unwrap();

        let r1 = fut1.await.unwrap().unwrap();
        let r2 = fut2.await.unwrap().unwrap();
        assert_eq!(r1["who"], "one");
        assert_eq!(r2["who"], "two");
    }

    #[tokio::test]
    async fn unmatched_response_id_is_discarded_silently() {
        let (transport, feed) = spawn_echo_transport();
        feed.push(r#"{"type":"success","id":999,"result":{}}"#)
            .unwrap();
        // No pending command was registered for id 999; nothing should panic
        // and the transport should remain usable.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!transport.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn command_times_out_when_no_response_arrives() {
        let (halves, _feed) = virtual_channel(|_payload| {});
        let transport = Transport::spawn(
            halves,
            TransportOptions {
                default_timeout: Duration::from_millis(50),
            },
        );

        let result = transport.send("a.never", JsonMap::new()).await;
        match result {
            Err(TransportError::Timeout { operation, .. }) => assert_eq!(operation, "a.never"),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn response_arriving_after_timeout_is_orphaned() {
        let (halves, feed) = virtual_channel(|_payload| {});
        let transport = Transport::spawn(
            halves,
            TransportOptions {
                default_timeout: Duration::from_millis(20),
            },
        );

        let result = transport.send("a.slow", JsonMap::new()).await;
        assert!(matches!(result, Err(TransportError::Timeout { .. })));

        // A response with the same id arriving after the deadline must be
        // discarded, not crash or resolve a second time.
        feed.push(r#"{"type":"success","id":0,"result":{}}"#).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test]
    async fn close_resolves_every_outstanding_command_with_connection_closed() {
        let (halves, _feed) = virtual_channel(|_payload| {});
        let transport = Transport::spawn(
            halves,
            TransportOptions {
                default_timeout: Duration::from_secs(30),
            },
        );
        let t = Arc::clone(&transport);
        let pending = tokio::spawn(async move { t.send("a.forever", JsonMap::new()).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        transport.close().await;

        let result = pending.await.unwrap();
        assert!(matches!(result, Err(TransportError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn events_fan_out_to_named_and_any_subscribers_with_handler_isolation() {
        let (halves, feed) = virtual_channel(|_payload| {});
        let transport = Transport::spawn(halves, TransportOptions::default());

        let named_calls = Arc::new(AtomicUsize::new(0));
        let any_calls = Arc::new(AtomicUsize::new(0));
        let named_calls_cb = Arc::clone(&named_calls);
        let any_calls_cb = Arc::clone(&any_calls);

        transport.subscribe(
            "log.entryAdded",
            Arc::new(move |_params| {
                named_calls_cb.fetch_add(1, AtomicOrdering::SeqCst);
                panic!("this subscriber misbehaves but must not block the next one");
            }),
        );
        transport.subscribe_any(Arc::new(move |_params| {
            any_calls_cb.fetch_add(1, AtomicOrdering::SeqCst);
        }));

        feed.push(r#"{"type":"event","method":"log.entryAdded","params":{}}"#)
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(named_calls.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(any_calls.load(AtomicOrdering::SeqCst), 1);
    }

    #[tokio::test]
    async fn wait_for_event_resolves_on_first_matching_event() {
        let (halves, feed) = virtual_channel(|_payload| {});
        let transport = Transport::spawn(halves, TransportOptions::default());

        let t = Arc::clone(&transport);
        let waiter = tokio::spawn(async move {
            t.wait_for_event(
                "browsingContext.load",
                |params| params.get("context").and_then(|v| v.as_str()) == Some("ctx-1"),
                Some(Duration::from_secs(1)),
            )
            .await
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        feed.push(r#"{"type":"event","method":"browsingContext.load","params":{"context":"ctx-0"}}"#)
            .unwrap();
        feed.push(r#"{"type":"event","method":"browsingContext.load","params":{"context":"ctx-1"}}"#)
            .unwrap();

        let result = waiter.await.unwrap().unwrap();
        assert_eq!(result["context"], "ctx-1");
    }

    #[test]
    fn transport_options_default_matches_spec_timeout() {
        assert_eq!(TransportOptions::default().default_timeout, DEFAULT_COMMAND_TIMEOUT);
        assert_eq!(DEFAULT_COMMAND_TIMEOUT, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn malformed_json_is_dropped_without_affecting_later_commands() {
        let (halves, feed) = virtual_channel(|_payload| {});
        let transport = Transport::spawn(halves, TransportOptions::default());

        feed.push("{not json").unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let t = Arc::clone(&transport);
        let fut = tokio::spawn(async move { t.send("a.ping", JsonMap::new()).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        feed.push(r#"{"type":"success","id":0,"result":{"ok":true}}"#)
            .unwrap();
        let result = fut.await.unwrap().unwrap();
        assert_eq!(result["ok"], true);
    }
}
