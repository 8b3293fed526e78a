//! Launching a local browser when no websocket URL is configured.

use std::collections::VecDeque;
use std::env;
use std::time::Duration;

use chromiumoxide::async_process::Child;
use chromiumoxide::browser::BrowserConfig;
use futures::io::{AsyncBufReadExt, AsyncRead, BufReader};
use futures::StreamExt;
use serde_json::json;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::config::SessionConfig;
use crate::error::{SessionError, SessionErrorKind};

const BANNER_WAIT: Duration = Duration::from_secs(20);
const STDERR_TAIL: usize = 8;

/// A browser child process and the endpoint it announced.
pub struct BrowserProcess {
    child: Child,
    ws_url: String,
}

impl BrowserProcess {
    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    pub async fn kill(mut self) {
        if let Err(err) = self.child.kill().await {
            warn!(target: "devtools-session", %err, "failed to stop browser");
        }
    }
}

pub async fn launch(cfg: &SessionConfig) -> Result<BrowserProcess, SessionError> {
    let mut child = launch_config(cfg)?.launch().map_err(|err| {
        SessionError::new(SessionErrorKind::CdpIo)
            .with_hint(format!("spawn {}: {err}", cfg.executable.display()))
    })?;

    let stderr = child.stderr.take().ok_or_else(|| {
        SessionError::new(SessionErrorKind::CdpIo).with_hint("browser stderr is not piped")
    })?;
    let ws_url = match timeout(BANNER_WAIT, read_banner(stderr)).await {
        Ok(Ok(url)) => url,
        Ok(Err(err)) => {
            let _ = child.kill().await;
            return Err(err);
        }
        Err(_) => {
            let _ = child.kill().await;
            return Err(SessionError::new(SessionErrorKind::Timeout)
                .with_hint("browser did not announce a devtools endpoint"));
        }
    };

    info!(target: "devtools-session", executable = %cfg.executable.display(), %ws_url, "browser launched");
    Ok(BrowserProcess { child, ws_url })
}

fn launch_config(cfg: &SessionConfig) -> Result<BrowserConfig, SessionError> {
    if cfg.executable.as_os_str().is_empty() {
        return Err(SessionError::new(SessionErrorKind::CdpIo)
            .with_hint("no browser found; set DEVTOOLS_DOM_CHROME or DEVTOOLS_DOM_WS_URL"));
    }
    std::fs::create_dir_all(&cfg.user_data_dir).map_err(|err| {
        SessionError::new(SessionErrorKind::CdpIo)
            .with_hint(format!("profile dir {}: {err}", cfg.user_data_dir.display()))
    })?;

    let mut builder = BrowserConfig::builder()
        .chrome_executable(&cfg.executable)
        .user_data_dir(&cfg.user_data_dir)
        .request_timeout(Duration::from_millis(cfg.command_deadline_ms))
        .args(launch_args(cfg.headless));
    if !cfg.headless {
        builder = builder.with_head();
    }
    if sandbox_disabled() {
        builder = builder.no_sandbox();
    }
    builder
        .build()
        .map_err(|err| SessionError::new(SessionErrorKind::Internal).with_hint(err))
}

fn launch_args(headless: bool) -> Vec<&'static str> {
    let mut args = vec![
        "--no-first-run",
        "--no-default-browser-check",
        "--remote-allow-origins=*",
        "--disable-background-timer-throttling",
        "--disable-renderer-backgrounding",
    ];
    if headless {
        args.extend(["--hide-scrollbars", "--mute-audio"]);
    }
    args
}

// Containers without user namespaces need this.
fn sandbox_disabled() -> bool {
    env::var("DEVTOOLS_DOM_DISABLE_SANDBOX")
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

/// Scan stderr for the `DevTools listening on ...` banner. Keeps the last few
/// lines so a crashing browser still explains itself.
async fn read_banner<R: AsyncRead + Unpin>(stderr: R) -> Result<String, SessionError> {
    let mut lines = BufReader::new(stderr).lines();
    let mut tail = VecDeque::with_capacity(STDERR_TAIL);
    while let Some(line) = lines.next().await {
        let line = line.map_err(|err| {
            SessionError::new(SessionErrorKind::CdpIo).with_hint(format!("browser stderr: {err}"))
        })?;
        if let Some(url) = parse_banner(&line) {
            return Ok(url);
        }
        if tail.len() == STDERR_TAIL {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    Err(SessionError::new(SessionErrorKind::CdpIo)
        .with_hint("browser exited before announcing a devtools endpoint")
        .with_data(json!({ "stderr": tail })))
}

fn parse_banner(line: &str) -> Option<String> {
    let (_, url) = line.rsplit_once("listening on ")?;
    let url = url.trim();
    (url.starts_with("ws") && url.contains("/devtools/browser/")).then(|| url.to_string())
}
