//! The wire side of a session: the [`CdpTransport`] seam and the
//! chromiumoxide-backed implementation.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::target::SessionId as CdpSessionId;
use chromiumoxide::cdp::events::CdpEventMessage;
use chromiumoxide::conn::Connection;
use chromiumoxide::error::CdpError;
use chromiumoxide_types::{CallId, CdpJsonEventMessage, Message, MethodId, Response};
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot, Mutex, OnceCell};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::browser::{self, BrowserProcess};
use crate::config::SessionConfig;
use crate::error::{SessionError, SessionErrorKind};

/// How often the connection loop looks for calls past their deadline.
const SWEEP_INTERVAL: Duration = Duration::from_millis(50);

/// Raw protocol event as it came off the wire.
#[derive(Clone, Debug)]
pub struct TransportEvent {
    pub method: String,
    pub params: Value,
    pub session_id: Option<String>,
}

/// Where a command is routed: the browser endpoint or a flattened target session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandTarget {
    Browser,
    Session(String),
}

#[async_trait]
pub trait CdpTransport: Send + Sync {
    async fn start(&self) -> Result<(), SessionError>;

    /// `None` once the event stream has ended for good.
    async fn next_event(&self) -> Option<TransportEvent>;

    async fn send_command(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
    ) -> Result<Value, SessionError>;

    /// Release the connection and anything launched for it.
    async fn close(&self) {}
}

/// Transport used when no browser is available; every command is rejected.
#[derive(Default)]
pub struct NoopTransport;

#[async_trait]
impl CdpTransport for NoopTransport {
    async fn start(&self) -> Result<(), SessionError> {
        Ok(())
    }

    async fn next_event(&self) -> Option<TransportEvent> {
        None
    }

    async fn send_command(
        &self,
        _target: CommandTarget,
        method: &str,
        _params: Value,
    ) -> Result<Value, SessionError> {
        Err(SessionError::new(SessionErrorKind::Closed)
            .with_hint(format!("transport not available for method {method}")))
    }
}

/// One websocket connection, opened on first use. Connects to
/// `websocket_url` when set, otherwise launches `executable`.
pub struct ChromiumTransport {
    cfg: SessionConfig,
    link: OnceCell<Link>,
}

struct Link {
    requests: mpsc::Sender<Request>,
    events: Mutex<mpsc::Receiver<TransportEvent>>,
    pump: JoinHandle<()>,
    browser: Mutex<Option<BrowserProcess>>,
}

type Reply = oneshot::Sender<Result<Value, SessionError>>;

struct Request {
    target: CommandTarget,
    method: String,
    params: Value,
    expires: Instant,
    reply: Reply,
}

struct Pending {
    method: String,
    expires: Instant,
    reply: Option<Reply>,
}

impl ChromiumTransport {
    pub fn new(cfg: SessionConfig) -> Self {
        Self {
            cfg,
            link: OnceCell::new(),
        }
    }

    async fn link(&self) -> Result<&Link, SessionError> {
        self.link.get_or_try_init(|| Link::open(&self.cfg)).await
    }
}

#[async_trait]
impl CdpTransport for ChromiumTransport {
    async fn start(&self) -> Result<(), SessionError> {
        self.link().await?;
        Ok(())
    }

    async fn next_event(&self) -> Option<TransportEvent> {
        let link = self.link.get()?;
        link.events.lock().await.recv().await
    }

    async fn send_command(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
    ) -> Result<Value, SessionError> {
        let link = self.link().await?;
        let (reply, answer) = oneshot::channel();
        let request = Request {
            target,
            method: method.to_string(),
            params,
            expires: Instant::now() + Duration::from_millis(self.cfg.command_deadline_ms),
            reply,
        };
        link.requests.send(request).await.map_err(|_| {
            SessionError::new(SessionErrorKind::Closed)
                .with_hint(format!("connection closed before sending {method}"))
        })?;
        answer.await.unwrap_or_else(|_| {
            Err(SessionError::new(SessionErrorKind::Closed)
                .with_hint(format!("connection dropped while waiting for {method}")))
        })
    }

    async fn close(&self) {
        let Some(link) = self.link.get() else {
            return;
        };
        link.pump.abort();
        if let Some(process) = link.browser.lock().await.take() {
            process.kill().await;
        }
    }
}

impl Link {
    async fn open(cfg: &SessionConfig) -> Result<Self, SessionError> {
        let (process, ws_url) = match &cfg.websocket_url {
            Some(url) => (None, url.clone()),
            None => {
                let process = browser::launch(cfg).await?;
                let url = process.ws_url().to_string();
                (Some(process), url)
            }
        };

        let conn = match Connection::<CdpEventMessage>::connect(&ws_url).await {
            Ok(conn) => conn,
            Err(err) => {
                if let Some(process) = process {
                    process.kill().await;
                }
                return Err(SessionError::new(SessionErrorKind::CdpIo)
                    .with_hint(format!("connect {ws_url}: {err}")));
            }
        };

        let (requests, request_rx) = mpsc::channel(128);
        let (event_tx, events) = mpsc::channel(cfg.event_buffer.max(1));
        let pump = tokio::spawn(async move {
            match drive(conn, request_rx, event_tx).await {
                Ok(()) => debug!(target: "devtools-session", "connection loop finished"),
                Err(err) => warn!(target: "devtools-session", %err, "connection loop failed"),
            }
        });

        info!(target: "devtools-session", url = %ws_url, "connected");
        Ok(Self {
            requests,
            events: Mutex::new(events),
            pump,
            browser: Mutex::new(process),
        })
    }
}

/// Owns the connection: submits requests, settles replies, forwards events
/// and fails calls whose deadline passed. Whatever is still pending when the
/// connection ends fails with the reason it ended.
async fn drive(
    mut conn: Connection<CdpEventMessage>,
    mut requests: mpsc::Receiver<Request>,
    events: mpsc::Sender<TransportEvent>,
) -> Result<(), SessionError> {
    let mut pending: HashMap<CallId, Pending> = HashMap::new();
    let mut sweep = interval(SWEEP_INTERVAL);
    sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let outcome = loop {
        tokio::select! {
            request = requests.recv() => match request {
                Some(request) => submit(&mut conn, request, &mut pending),
                None => break Ok(()),
            },
            message = conn.next() => match message {
                Some(Ok(Message::Response(response))) => settle(response, &mut pending),
                Some(Ok(Message::Event(event))) => forward(event, &events).await,
                Some(Err(err)) => break Err(connection_error(err)),
                None => break Ok(()),
            },
            _ = sweep.tick() => expire(&mut pending, Instant::now()),
        }
    };

    let reason = match &outcome {
        Ok(()) => {
            SessionError::new(SessionErrorKind::Closed).with_hint("devtools connection closed")
        }
        Err(err) => err.clone(),
    };
    for (_, call) in pending.drain() {
        if let Some(reply) = call.reply {
            let _ = reply.send(Err(reason.clone()));
        }
    }
    outcome
}

fn submit(
    conn: &mut Connection<CdpEventMessage>,
    request: Request,
    pending: &mut HashMap<CallId, Pending>,
) {
    let session = match request.target {
        CommandTarget::Browser => None,
        CommandTarget::Session(id) => Some(CdpSessionId::from(id)),
    };
    let method: MethodId = request.method.clone().into();
    match conn.submit_command(method, session, request.params) {
        Ok(id) => {
            pending.insert(
                id,
                Pending {
                    method: request.method,
                    expires: request.expires,
                    reply: Some(request.reply),
                },
            );
        }
        Err(err) => {
            let _ = request.reply.send(Err(SessionError::new(SessionErrorKind::Decode)
                .with_hint(format!("{}: {err}", request.method))));
        }
    }
}

fn settle(response: Response, pending: &mut HashMap<CallId, Pending>) {
    let Some(call) = pending.remove(&response.id) else {
        debug!(target: "devtools-session", id = ?response.id, "reply for an expired call dropped");
        return;
    };
    if let Some(reply) = call.reply {
        let _ = reply.send(reply_payload(&call.method, response));
    }
}

async fn forward(event: CdpEventMessage, events: &mpsc::Sender<TransportEvent>) {
    let raw: CdpJsonEventMessage = match event.try_into() {
        Ok(raw) => raw,
        Err(err) => {
            warn!(target: "devtools-session", %err, "undecodable event skipped");
            return;
        }
    };
    let event = TransportEvent {
        method: raw.method.into_owned(),
        params: raw.params,
        session_id: raw.session_id,
    };
    if events.send(event).await.is_err() {
        debug!(target: "devtools-session", "event receiver gone");
    }
}

/// Fails every call whose deadline is at or before `now`.
fn expire<K: Eq + Hash>(pending: &mut HashMap<K, Pending>, now: Instant) {
    pending.retain(|_, call| {
        if call.expires > now {
            return true;
        }
        warn!(target: "devtools-session", method = %call.method, "call deadline passed");
        if let Some(reply) = call.reply.take() {
            let _ = reply.send(Err(SessionError::new(SessionErrorKind::Timeout)
                .with_hint(format!("{} got no reply before its deadline", call.method))
                .retriable(true)));
        }
        false
    });
}

fn reply_payload(method: &str, response: Response) -> Result<Value, SessionError> {
    match (response.result, response.error) {
        (Some(result), _) => Ok(result),
        (None, Some(error)) => Err(SessionError::new(SessionErrorKind::Protocol)
            .with_hint(format!("{method}: {} ({})", error.message, error.code))
            .with_data(json!({ "code": error.code, "message": error.message }))),
        (None, None) => Err(SessionError::new(SessionErrorKind::Decode)
            .with_hint(format!("{method}: reply carries neither result nor error"))),
    }
}

fn connection_error(err: CdpError) -> SessionError {
    let kind = match &err {
        CdpError::Timeout => SessionErrorKind::Timeout,
        CdpError::Serde(_) => SessionErrorKind::Decode,
        _ => SessionErrorKind::CdpIo,
    };
    SessionError::new(kind).with_hint(err.to_string())
}
