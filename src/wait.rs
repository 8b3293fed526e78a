//! Polling wait task behind [`Page::wait_for_selector`](crate::Page::wait_for_selector).

use std::time::Duration;

use remote_object::RemoteObject;
use serde_json::json;
use tokio::time::{sleep, Instant};
use tracing::{debug, trace};

use crate::element::ElementHandle;
use crate::error::DomError;
use crate::page::Page;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaitForSelectorOptions {
    /// Also require a non-empty box and `visibility != hidden`.
    pub visible: bool,
    /// Wait for the element to be missing or invisible.
    pub hidden: bool,
    pub timeout: Duration,
    pub polling_interval: Duration,
}

impl Default for WaitForSelectorOptions {
    fn default() -> Self {
        Self {
            visible: false,
            hidden: false,
            timeout: Duration::from_secs(30),
            polling_interval: Duration::from_millis(100),
        }
    }
}

const PREDICATE: &str = r#"(selector, waitForVisible, waitForHidden) => {
  const node = document.querySelector(selector);
  if (!node) return waitForHidden;
  if (!waitForVisible && !waitForHidden) return node;
  const style = window.getComputedStyle(node);
  const rect = node.getBoundingClientRect();
  const isVisible = !!style && style.visibility !== 'hidden'
    && !!(rect.top || rect.bottom || rect.width || rect.height);
  const success = waitForVisible === isVisible || waitForHidden === !isVisible;
  return success ? node : null;
}"#;

pub(crate) fn predicate_expression(selector: &str, visible: bool, hidden: bool) -> String {
    format!(
        "({PREDICATE})({}, {}, {})",
        json!(selector),
        visible,
        hidden
    )
}

enum Poll {
    Element,
    Satisfied,
    Pending,
}

fn classify(remote: &RemoteObject) -> Poll {
    if remote.object_id.is_some() && remote.is_node() {
        return Poll::Element;
    }
    match &remote.value {
        Some(value) if value.as_bool() == Some(true) => Poll::Satisfied,
        _ => Poll::Pending,
    }
}

/// Poll the page until the selector condition holds or `options.timeout`
/// elapses. With `hidden`, success yields `None`.
pub async fn wait_for_selector(
    page: &Page,
    selector: &str,
    options: WaitForSelectorOptions,
) -> Result<Option<ElementHandle>, DomError> {
    let expression = predicate_expression(selector, options.visible, options.hidden);
    let deadline = Instant::now() + options.timeout;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let remote = page.evaluate_handle(&expression).await?;
        match classify(&remote) {
            Poll::Element => {
                debug!(target: "devtools-dom", selector, attempts, "selector condition met");
                let handle = ElementHandle::from_remote(page.clone(), remote);
                if options.hidden {
                    if let Some(handle) = handle {
                        handle.dispose().await?;
                    }
                    return Ok(None);
                }
                return Ok(handle);
            }
            Poll::Satisfied => {
                debug!(target: "devtools-dom", selector, attempts, "selector absent as requested");
                return Ok(None);
            }
            Poll::Pending => trace!(target: "devtools-dom", selector, attempts, "selector pending"),
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(DomError::Timeout(format!(
                "waiting for selector `{selector}` failed: {}ms exceeded",
                options.timeout.as_millis()
            )));
        }
        sleep(options.polling_interval.min(deadline - now)).await;
    }
}
