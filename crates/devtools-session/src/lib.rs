//! DevTools Protocol session layer.
//!
//! One multiplexed CDP channel per automated browser. The crate exposes the
//! transport seam, a [`DevToolsSession`] with typed and raw calls, and one-shot
//! event waiters the DOM layers use to turn protocol events into awaitable
//! futures.

use std::{env, path::PathBuf};
use which::which;

pub mod ids {
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;

    /// Identifier of a [`DevToolsSession`](crate::DevToolsSession), used in log fields.
    #[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
    pub struct SessionId(pub Uuid);

    /// Identifier of a page facade bound to a session.
    #[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
    pub struct PageId(pub Uuid);

    impl SessionId {
        pub fn new() -> Self {
            Self(Uuid::new_v4())
        }
    }

    impl PageId {
        pub fn new() -> Self {
            Self(Uuid::new_v4())
        }
    }

    impl Default for SessionId {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Default for PageId {
        fn default() -> Self {
            Self::new()
        }
    }
}

pub mod error {
    use serde::{Deserialize, Serialize};
    use std::fmt;
    use thiserror::Error;

    /// High-level error categories surfaced by the session.
    #[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
    pub enum SessionErrorKind {
        #[error("cdp i/o failure")]
        CdpIo,
        #[error("protocol call rejected")]
        Protocol,
        #[error("command timed out")]
        Timeout,
        #[error("payload decode failure")]
        Decode,
        #[error("session closed")]
        Closed,
        #[error("internal error")]
        Internal,
    }

    impl SessionErrorKind {
        /// Stable label used in metrics.
        pub fn as_str(&self) -> &'static str {
            match self {
                SessionErrorKind::CdpIo => "cdp_io",
                SessionErrorKind::Protocol => "protocol",
                SessionErrorKind::Timeout => "timeout",
                SessionErrorKind::Decode => "decode",
                SessionErrorKind::Closed => "closed",
                SessionErrorKind::Internal => "internal",
            }
        }
    }

    /// Error returned by every session call. Protocol rejections keep the
    /// browser's `code`/`message` in `data`.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct SessionError {
        pub kind: SessionErrorKind,
        pub hint: Option<String>,
        pub retriable: bool,
        pub data: Option<serde_json::Value>,
    }

    impl fmt::Display for SessionError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.kind)?;
            if let Some(hint) = &self.hint {
                write!(f, ": {}", hint)?;
            }
            Ok(())
        }
    }

    impl std::error::Error for SessionError {}

    impl SessionError {
        pub fn new(kind: SessionErrorKind) -> Self {
            Self {
                kind,
                hint: None,
                retriable: false,
                data: None,
            }
        }

        pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
            self.hint = Some(hint.into());
            self
        }

        pub fn retriable(mut self, flag: bool) -> Self {
            self.retriable = flag;
            self
        }

        pub fn with_data(mut self, data: serde_json::Value) -> Self {
            self.data = Some(data);
            self
        }

        pub fn is_protocol(&self) -> bool {
            self.kind == SessionErrorKind::Protocol
        }
    }

    impl From<serde_json::Error> for SessionError {
        fn from(err: serde_json::Error) -> Self {
            SessionError::new(SessionErrorKind::Decode).with_hint(err.to_string())
        }
    }
}

pub mod events {
    use serde::{Deserialize, Serialize};
    use serde_json::Value;

    use crate::transport::TransportEvent;

    /// Protocol event fanned out to subscribers of a session.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct SessionEvent {
        pub method: String,
        pub params: Value,
        pub session_id: Option<String>,
    }

    impl SessionEvent {
        pub fn is(&self, method: &str) -> bool {
            self.method == method
        }
    }

    impl From<TransportEvent> for SessionEvent {
        fn from(event: TransportEvent) -> Self {
            Self {
                method: event.method,
                params: event.params,
                session_id: event.session_id,
            }
        }
    }
}

pub mod config {
    use crate::detect_chrome_executable;
    use serde::{Deserialize, Serialize};
    use std::{env, path::PathBuf};

    /// Where the browser comes from and how long calls may take.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    #[serde(default)]
    pub struct SessionConfig {
        pub executable: PathBuf,
        pub user_data_dir: PathBuf,
        pub headless: bool,
        /// Connect here instead of launching `executable`.
        pub websocket_url: Option<String>,
        /// Per-call deadline enforced by the connection loop.
        pub command_deadline_ms: u64,
        pub event_buffer: usize,
    }

    impl Default for SessionConfig {
        fn default() -> Self {
            Self {
                executable: detect_chrome_executable().unwrap_or_default(),
                user_data_dir: env::var_os("DEVTOOLS_DOM_PROFILE")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("./.devtools-dom-profile")),
                headless: env_flag("DEVTOOLS_DOM_HEADLESS").unwrap_or(true),
                websocket_url: env::var("DEVTOOLS_DOM_WS_URL")
                    .ok()
                    .map(|url| url.trim().to_string())
                    .filter(|url| !url.is_empty()),
                command_deadline_ms: 30_000,
                event_buffer: 512,
            }
        }
    }

    fn env_flag(name: &str) -> Option<bool> {
        let value = env::var(name).ok()?;
        Some(!matches!(
            value.to_ascii_lowercase().as_str(),
            "0" | "false" | "no" | "off"
        ))
    }
}

const BROWSER_NAMES: &[&str] = &[
    "google-chrome-stable",
    "google-chrome",
    "chromium",
    "chromium-browser",
    "microsoft-edge",
    "chrome",
    "msedge",
];

/// `DEVTOOLS_DOM_CHROME` when it names an existing file, otherwise the first
/// Chromium-family binary on `PATH`.
pub fn detect_chrome_executable() -> Option<PathBuf> {
    env::var_os("DEVTOOLS_DOM_CHROME")
        .map(PathBuf::from)
        .filter(|path| path.is_file())
        .or_else(|| BROWSER_NAMES.iter().find_map(|name| which(name).ok()))
}


mod browser;
pub mod metrics;
pub mod session;
pub mod transport;
mod util;

pub use config::SessionConfig;
pub use error::{SessionError, SessionErrorKind};
pub use events::SessionEvent;
pub use ids::{PageId, SessionId};
pub use session::{CommandSender, DevToolsSession, EventWaiter};
pub use transport::{
    CdpTransport, ChromiumTransport, CommandTarget, NoopTransport, TransportEvent,
};
