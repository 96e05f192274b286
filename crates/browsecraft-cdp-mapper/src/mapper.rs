//! Wires the translation table in [`crate::translate`] into a real CDP
//! duplex channel, presenting a BiDi virtual channel to `Transport` above
//! it. The mapper's lifetime is tied to whatever Session holds the
//! resulting BiDi `ChannelHalves`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use browsecraft_core::{Command, ErrCode, InboundMessage, JsonMap, ProtocolError};
use browsecraft_transport::channel::{virtual_channel, ChannelHalves, VirtualInboundFeed};
use once_cell::sync::OnceCell;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::translate::{bidi_command_to_cdp, cdp_event_to_bidi, cdp_result_to_bidi};

struct Inner {
    cdp_outbound: Box<dyn browsecraft_transport::channel::OutboundSink>,
    next_cdp_id: AtomicU64,
    pending_raw: Mutex<HashMap<u64, oneshot::Sender<Result<JsonMap, ProtocolError>>>>,
    pending_translated: Mutex<HashMap<u64, (u64, String)>>,
    bidi_feed: OnceCell<VirtualInboundFeed>,
    closed: AtomicBool,
}

impl Inner {
    fn feed(&self) -> &VirtualInboundFeed {
        self.bidi_feed
            .get()
            .expect("bidi_feed set before any dispatch can run")
    }
}

/// A running BiDi-over-CDP mapper. Dropping this does not close the
/// underlying CDP connection; call [`CdpBidiMapper::close`] explicitly.
pub struct CdpBidiMapper {
    inner: Arc<Inner>,
}

impl CdpBidiMapper {
    /// Starts the mapper over an already-opened CDP duplex channel and
    /// returns it alongside the BiDi-side `ChannelHalves` to hand to
    /// `Transport::spawn`.
    pub fn start(cdp_halves: ChannelHalves) -> (CdpBidiMapper, ChannelHalves) {
        let inner = Arc::new(Inner {
            cdp_outbound: cdp_halves.outbound,
            next_cdp_id: AtomicU64::new(0),
            pending_raw: Mutex::new(HashMap::new()),
            pending_translated: Mutex::new(HashMap::new()),
            bidi_feed: OnceCell::new(),
            closed: AtomicBool::new(false),
        });

        let dispatch_inner = Arc::clone(&inner);
        let (bidi_halves, bidi_feed) = virtual_channel(move |bidi_text: String| {
            let inner = Arc::clone(&dispatch_inner);
            tokio::spawn(async move {
                dispatch_bidi_command(&inner, bidi_text).await;
            });
        });
        let _ = inner.bidi_feed.set(bidi_feed);

        let cdp_loop_inner = Arc::clone(&inner);
        let mut cdp_inbound = cdp_halves.inbound;
        tokio::spawn(async move {
            while let Some(raw) = cdp_inbound.recv().await {
                handle_cdp_frame(&cdp_loop_inner, raw);
            }
        });

        (CdpBidiMapper { inner }, bidi_halves)
    }

    /// Issues a raw CDP command directly, for the rare case a higher layer
    /// needs CDP coverage BiDi lacks (e.g. window bounds).
    pub async fn send_raw_cdp(
        &self,
        method: impl Into<String>,
        params: JsonMap,
    ) -> Result<JsonMap, ProtocolError> {
        send_raw_cdp_impl(&self.inner, method.into(), params).await
    }

    pub async fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        let _ = self.inner.cdp_outbound.close().await;
    }
}

async fn send_raw_cdp_impl(
    inner: &Arc<Inner>,
    method: String,
    params: JsonMap,
) -> Result<JsonMap, ProtocolError> {
    if inner.closed.load(Ordering::SeqCst) {
        return Err(ProtocolError::new(ErrCode::UnsupportedOperation, "cdp channel closed"));
    }
    let id = inner.next_cdp_id.fetch_add(1, Ordering::SeqCst);
    let command = Command { id, method, params };
    let payload = serde_json::to_string(&command)
        .map_err(|err| ProtocolError::new(ErrCode::UnknownError, err.to_string()))?;

    let (tx, rx) = oneshot::channel();
    inner.pending_raw.lock().unwrap().insert(id, tx);

    inner
        .cdp_outbound
        .send_text(payload)
        .await
        .map_err(|_| ProtocolError::new(ErrCode::UnsupportedOperation, "cdp channel closed"))?;

    rx.await
        .map_err(|_| ProtocolError::new(ErrCode::UnsupportedOperation, "cdp channel closed"))?
}

async fn dispatch_bidi_command(inner: &Arc<Inner>, bidi_text: String) {
    if inner.closed.load(Ordering::SeqCst) {
        return;
    }
    let command: Command = match serde_json::from_str(&bidi_text) {
        Ok(c) => c,
        Err(_) => return,
    };

    let Some(request) = bidi_command_to_cdp(&command.method, &command.params) else {
        push_bidi_error(
            inner,
            command.id,
            ErrCode::UnknownCommand,
            format!("no CDP mapping for '{}'", command.method),
        );
        return;
    };

    let cdp_id = inner.next_cdp_id.fetch_add(1, Ordering::SeqCst);
    inner
        .pending_translated
        .lock()
        .unwrap()
        .insert(cdp_id, (command.id, command.method.clone()));

    let cdp_command = Command {
        id: cdp_id,
        method: request.method,
        params: request.params,
    };
    let payload = match serde_json::to_string(&cdp_command) {
        Ok(p) => p,
        Err(_) => {
            push_bidi_error(inner, command.id, ErrCode::UnknownError, "encode failure");
            return;
        }
    };

    if inner.cdp_outbound.send_text(payload).await.is_err() {
        inner.pending_translated.lock().unwrap().remove(&cdp_id);
        push_bidi_error(inner, command.id, ErrCode::UnsupportedOperation, "cdp channel closed");
    }
}

fn handle_cdp_frame(inner: &Arc<Inner>, raw: String) {
    let value: Value = match serde_json::from_str(&raw) {
        Ok(v) => v,
        Err(_) => {
            tracing::warn!("dropping malformed CDP frame");
            return;
        }
    };

    if let Some(id) = value.get("id").and_then(Value::as_u64) {
        if let Some(tx) = inner.pending_raw.lock().unwrap().remove(&id) {
            let result = cdp_frame_result(&value);
            let _ = tx.send(result);
            return;
        }
        if let Some((bidi_id, bidi_method)) = inner.pending_translated.lock().unwrap().remove(&id) {
            match cdp_frame_result(&value) {
                Ok(cdp_result) => {
                    let bidi_result = cdp_result_to_bidi(&bidi_method, &cdp_result);
                    push_bidi_success(inner, bidi_id, bidi_result);
                }
                Err(err) => push_bidi_error(inner, bidi_id, err.code, err.message),
            }
        }
        return;
    }

    if let Some(method) = value.get("method").and_then(Value::as_str) {
        let params = value
            .get("params")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        if let Some((bidi_method, bidi_params)) = cdp_event_to_bidi(method, &params) {
            push_bidi_event(inner, bidi_method, bidi_params);
        }
    }
}

fn cdp_frame_result(value: &Value) -> Result<JsonMap, ProtocolError> {
    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("cdp error")
            .to_string();
        return Err(ProtocolError::new(ErrCode::UnknownError, message));
    }
    Ok(value
        .get("result")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default())
}

fn push_bidi_success(inner: &Arc<Inner>, id: u64, result: JsonMap) {
    let frame = InboundMessage::Success { id, result };
    let _ = inner
        .feed()
        .push(serde_json::to_string(&frame).unwrap_or_default());
}

fn push_bidi_error(inner: &Arc<Inner>, id: u64, code: ErrCode, message: impl Into<String>) {
    let frame = InboundMessage::Error {
        id,
        error: code,
        message: message.into(),
        stacktrace: None,
    };
    let _ = inner
        .feed()
        .push(serde_json::to_string(&frame).unwrap_or_default());
}

fn push_bidi_event(inner: &Arc<Inner>, method: String, params: JsonMap) {
    let frame = InboundMessage::Event { method, params };
    let _ = inner
        .feed()
        .push(serde_json::to_string(&frame).unwrap_or_default());
}

#[cfg(test)]
mod tests {
    use super::*;
    use browsecraft_transport::channel::virtual_channel;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    fn fake_cdp_channel() -> (ChannelHalves, VirtualInboundFeed) {
        virtual_channel(|_payload| {})
    }

    #[tokio::test]
    async fn unmapped_bidi_command_gets_unknown_command_error() {
        let (cdp_halves, _cdp_feed) = fake_cdp_channel();
        let (_mapper, mut bidi_halves) = CdpBidiMapper::start(cdp_halves);

        // Drive the mapper's BiDi-side outbound (what Transport::send would
        // call) with an unmapped command.
        bidi_halves
            .outbound
            .send_text(r#"{"id":0,"method":"network.addIntercept","params":{}}"#.to_string())
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        let frame = bidi_halves.inbound.recv().await.unwrap();
        assert!(frame.contains("unknown command"));
    }

    #[tokio::test]
    async fn browsing_context_create_round_trips_through_cdp() {
        let sent_cdp = Arc::new(StdMutex::new(Vec::new()));
        let sent_cdp_cb = Arc::clone(&sent_cdp);
        let (cdp_halves, cdp_feed) = virtual_channel(move |payload| {
            sent_cdp_cb.lock().unwrap().push(payload);
        });
        let (_mapper, mut bidi_halves) = CdpBidiMapper::start(cdp_halves);

        bidi_halves
            .outbound
            .send_text(r#"{"id":5,"method":"browsingContext.create","params":{"type":"tab"}}"#.to_string())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let cdp_request: Command =
            serde_json::from_str(&sent_cdp.lock().unwrap()[0]).unwrap();
        assert_eq!(cdp_request.method, "Target.createTarget");

        cdp_feed
            .push(format!(
                r#"{{"id":{},"result":{{"targetId":"T-1"}}}}"#,
                cdp_request.id
            ))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let bidi_frame = bidi_halves.inbound.recv().await.unwrap();
        assert!(bidi_frame.contains("\"context\":\"T-1\""));
    }

    #[tokio::test]
    async fn target_created_event_translates_to_bidi_context_created() {
        let (cdp_halves, cdp_feed) = fake_cdp_channel();
        let (_mapper, mut bidi_halves) = CdpBidiMapper::start(cdp_halves);

        cdp_feed
            .push(r#"{"method":"Target.targetCreated","params":{"targetInfo":{"targetId":"T-9"}}}"#)
            .unwrap();

        let bidi_frame = bidi_halves.inbound.recv().await.unwrap();
        assert!(bidi_frame.contains("browsingContext.contextCreated"));
        assert!(bidi_frame.contains("T-9"));
    }
}
