//! The session object DOM-facing code talks to.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::{select, spawn};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::{SessionError, SessionErrorKind};
use crate::events::SessionEvent;
use crate::ids::SessionId;
use crate::metrics;
use crate::transport::{CdpTransport, ChromiumTransport, CommandTarget};
use crate::util::strip_nulls;

/// Minimal request/response seam used by the input and DOM layers.
#[async_trait]
pub trait CommandSender: Send + Sync {
    async fn send_command(&self, method: &str, params: Value) -> Result<Value, SessionError>;
}

type EventPredicate = Box<dyn Fn(&SessionEvent) -> bool + Send + Sync>;

/// One multiplexed DevTools channel. Calls from independent callers interleave
/// at the transport; no ordering is imposed beyond what callers await.
pub struct DevToolsSession {
    id: SessionId,
    transport: Arc<dyn CdpTransport>,
    target: RwLock<CommandTarget>,
    events: broadcast::Sender<SessionEvent>,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl DevToolsSession {
    /// Launch or connect to a browser per `cfg` and start the event pump.
    pub async fn connect(cfg: SessionConfig) -> Result<Arc<Self>, SessionError> {
        let transport: Arc<dyn CdpTransport> = Arc::new(ChromiumTransport::new(cfg.clone()));
        let session = Self::with_transport(&cfg, transport);
        session.start().await?;
        Ok(session)
    }

    pub fn with_transport(cfg: &SessionConfig, transport: Arc<dyn CdpTransport>) -> Arc<Self> {
        let (events, _) = broadcast::channel(cfg.event_buffer.max(1));
        Arc::new(Self {
            id: SessionId::new(),
            transport,
            target: RwLock::new(CommandTarget::Browser),
            events,
            shutdown: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Target new commands are routed to.
    pub fn target(&self) -> CommandTarget {
        self.target.read().clone()
    }

    /// Start the transport and the event pump. Calling it again is a no-op.
    pub async fn start(self: &Arc<Self>) -> Result<(), SessionError> {
        let mut tasks = self.tasks.lock().await;
        if !tasks.is_empty() {
            return Ok(());
        }

        self.transport.start().await?;
        tasks.push(spawn(Self::event_pump(
            self.id,
            Arc::clone(&self.transport),
            self.events.clone(),
            self.shutdown.clone(),
        )));
        info!(target: "devtools-session", session = ?self.id, "session started");
        Ok(())
    }

    /// Stop the event pump and close the transport. Pending waiters fail
    /// with [`SessionErrorKind::Closed`].
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let mut handles = self.tasks.lock().await;
        while let Some(handle) = handles.pop() {
            let _ = handle.await;
        }
        self.transport.close().await;
        debug!(target: "devtools-session", session = ?self.id, "session shut down");
    }

    /// Fans transport events out to subscribers until shutdown or until the
    /// transport's stream ends. Either way the token ends up cancelled so
    /// outstanding waiters stop.
    async fn event_pump(
        id: SessionId,
        transport: Arc<dyn CdpTransport>,
        events: broadcast::Sender<SessionEvent>,
        shutdown: CancellationToken,
    ) {
        loop {
            select! {
                _ = shutdown.cancelled() => break,
                event = transport.next_event() => match event {
                    Some(event) => {
                        metrics::record_event(&event.method);
                        // no subscribers is fine
                        let _ = events.send(SessionEvent::from(event));
                    }
                    None => {
                        warn!(target: "devtools-session", session = ?id, "event stream ended");
                        shutdown.cancel();
                        break;
                    }
                },
            }
        }
        debug!(target: "devtools-session", session = ?id, "event pump exiting");
    }

    /// Send a protocol command to the current target and return its raw result.
    pub async fn send(&self, method: &str, params: Value) -> Result<Value, SessionError> {
        let target = self.target();
        let start = Instant::now();
        metrics::record_command(method);
        debug!(target: "devtools-session", method, ?target, "sending command");
        match self.transport.send_command(target, method, params).await {
            Ok(value) => {
                metrics::record_command_success(method, start.elapsed());
                Ok(value)
            }
            Err(err) => {
                metrics::record_command_failure(method, err.kind.as_str());
                debug!(target: "devtools-session", method, %err, "command failed");
                Err(err)
            }
        }
    }

    /// Typed request. `params` should serialize with the protocol's camelCase
    /// names; null members are omitted before sending.
    pub async fn call<P, R>(&self, method: &str, params: &P) -> Result<R, SessionError>
    where
        P: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let mut payload = serde_json::to_value(params)?;
        strip_nulls(&mut payload);
        let result = self.send(method, payload).await?;
        serde_json::from_value(result).map_err(|err| {
            SessionError::new(SessionErrorKind::Decode)
                .with_hint(format!("{method} result: {err}"))
        })
    }

    /// Raw passthrough: JSON text in, JSON text out. An empty string means `{}`.
    pub async fn call_raw(&self, method: &str, params_json: &str) -> Result<String, SessionError> {
        let params = if params_json.trim().is_empty() {
            json!({})
        } else {
            serde_json::from_str(params_json).map_err(|err| {
                SessionError::new(SessionErrorKind::Decode)
                    .with_hint(format!("invalid params for {method}: {err}"))
            })?
        };
        let result = self.send(method, params).await?;
        Ok(result.to_string())
    }

    /// Attach to a target with a flattened session and route later commands to it.
    pub async fn attach(&self, target_id: &str) -> Result<String, SessionError> {
        let response = self
            .send(
                "Target.attachToTarget",
                json!({ "targetId": target_id, "flatten": true }),
            )
            .await?;
        let session_id = response
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                SessionError::new(SessionErrorKind::Decode)
                    .with_hint("attachToTarget missing sessionId")
            })?
            .to_string();

        *self.target.write() = CommandTarget::Session(session_id.clone());
        info!(target: "devtools-session", target_id, cdp_session = %session_id, "attached to target");
        Ok(session_id)
    }

    /// Attach to the first open page, creating a blank one when none exists.
    pub async fn attach_first_page(&self) -> Result<String, SessionError> {
        let targets = self.send("Target.getTargets", json!({})).await?;
        let existing = targets
            .get("targetInfos")
            .and_then(Value::as_array)
            .and_then(|infos| {
                infos.iter().find(|info| {
                    info.get("type").and_then(Value::as_str) == Some("page")
                })
            })
            .and_then(|info| info.get("targetId"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let target_id = match existing {
            Some(id) => id,
            None => {
                let created = self
                    .send("Target.createTarget", json!({ "url": "about:blank" }))
                    .await?;
                created
                    .get("targetId")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        SessionError::new(SessionErrorKind::Decode)
                            .with_hint("createTarget missing targetId")
                    })?
                    .to_string()
            }
        };

        self.attach(&target_id).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Subscribe now, resolve later: create the waiter before issuing the call
    /// that triggers the event, then await [`EventWaiter::wait`]. Only events of
    /// the currently attached target session are considered.
    pub fn wait_for_event<F>(&self, method: &str, predicate: F) -> EventWaiter
    where
        F: Fn(&SessionEvent) -> bool + Send + Sync + 'static,
    {
        let session_filter = match self.target() {
            CommandTarget::Browser => None,
            CommandTarget::Session(id) => Some(id),
        };
        EventWaiter {
            method: method.to_string(),
            session_filter,
            predicate: Box::new(predicate),
            rx: self.events.subscribe(),
            closed: self.shutdown.clone(),
        }
    }
}

#[async_trait]
impl CommandSender for DevToolsSession {
    async fn send_command(&self, method: &str, params: Value) -> Result<Value, SessionError> {
        self.send(method, params).await
    }
}

/// One-shot future over the session's event stream. Consuming it drops the
/// subscription, so nothing lingers once it resolves or is abandoned.
pub struct EventWaiter {
    method: String,
    session_filter: Option<String>,
    predicate: EventPredicate,
    rx: broadcast::Receiver<SessionEvent>,
    closed: CancellationToken,
}

impl EventWaiter {
    fn accepts(&self, event: &SessionEvent) -> bool {
        if event.method != self.method {
            return false;
        }
        if let Some(expected) = &self.session_filter {
            if event.session_id.as_deref() != Some(expected.as_str()) {
                return false;
            }
        }
        (self.predicate)(event)
    }

    pub async fn wait(mut self) -> Result<SessionEvent, SessionError> {
        loop {
            // Buffered events still win over a close that raced them.
            let received = select! {
                biased;
                received = self.rx.recv() => received,
                _ = self.closed.cancelled() => return Err(closed_error(&self.method)),
            };
            match received {
                Ok(event) if self.accepts(&event) => return Ok(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(target: "devtools-session", method = %self.method, skipped, "event waiter lagged");
                }
                Err(RecvError::Closed) => return Err(closed_error(&self.method)),
            }
        }
    }
}

fn closed_error(method: &str) -> SessionError {
    SessionError::new(SessionErrorKind::Closed)
        .with_hint(format!("event stream closed while waiting for {method}"))
}
