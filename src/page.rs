use std::sync::Arc;
use std::time::Duration;

use devtools_session::{CommandSender, DevToolsSession, PageId, SessionEvent};
use input_replay::{Keyboard, Mouse, Touchscreen};
use remote_object::{value_from_remote_object, EvaluateResponse, FromRemoteObject, RemoteObject};
use serde_json::{json, Value};
use tokio::time::timeout;
use tracing::{debug, info};

use crate::element::ElementHandle;
use crate::error::DomError;
use crate::wait::{self, WaitForSelectorOptions};

/// A page attached to a [`DevToolsSession`].
///
/// Cheap to clone; clones share the session and input devices.
#[derive(Clone)]
pub struct Page {
    id: PageId,
    session: Arc<DevToolsSession>,
    keyboard: Arc<Keyboard>,
    mouse: Arc<Mouse>,
    touchscreen: Arc<Touchscreen>,
}

impl Page {
    /// Wrap an already attached session. Input devices share one keyboard so
    /// held modifiers apply to mouse and touch events too.
    pub fn new(session: Arc<DevToolsSession>) -> Self {
        let sender: Arc<dyn CommandSender> = session.clone();
        let keyboard = Arc::new(Keyboard::new(Arc::clone(&sender)));
        let mouse = Arc::new(Mouse::new(Arc::clone(&sender), Arc::clone(&keyboard)));
        let touchscreen = Arc::new(Touchscreen::new(sender, Arc::clone(&keyboard)));
        Self {
            id: PageId::new(),
            session,
            keyboard,
            mouse,
            touchscreen,
        }
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    pub fn session(&self) -> &Arc<DevToolsSession> {
        &self.session
    }

    pub fn keyboard(&self) -> &Keyboard {
        &self.keyboard
    }

    pub fn mouse(&self) -> &Mouse {
        &self.mouse
    }

    pub fn touchscreen(&self) -> &Touchscreen {
        &self.touchscreen
    }

    /// Enable the domains whose events the page waits on.
    pub async fn enable(&self) -> Result<(), DomError> {
        self.session.send("Page.enable", json!({})).await?;
        self.session.send("Runtime.enable", json!({})).await?;
        Ok(())
    }

    /// Navigate and wait for the load event.
    pub async fn goto(&self, url: &str, wait: Duration) -> Result<(), DomError> {
        let loaded = self
            .session
            .wait_for_event("Page.loadEventFired", |_| true);

        let reply = self
            .session
            .send("Page.navigate", json!({ "url": url }))
            .await?;
        if let Some(reason) = reply
            .get("errorText")
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
        {
            return Err(DomError::Navigation {
                url: url.to_string(),
                reason: reason.to_string(),
            });
        }

        timeout(wait, loaded.wait())
            .await
            .map_err(|_| {
                DomError::Timeout(format!(
                    "navigation to {url} exceeded {}ms",
                    wait.as_millis()
                ))
            })??;
        info!(target: "devtools-dom", page = ?self.id, url, "navigation complete");
        Ok(())
    }

    /// Resolve on the next main-frame navigation and return its URL.
    pub async fn wait_for_navigation(&self, wait: Duration) -> Result<String, DomError> {
        let navigated = self
            .session
            .wait_for_event("Page.frameNavigated", is_main_frame_navigation);
        let event = timeout(wait, navigated.wait()).await.map_err(|_| {
            DomError::Timeout(format!("navigation exceeded {}ms", wait.as_millis()))
        })??;
        Ok(event.params["frame"]["url"]
            .as_str()
            .unwrap_or_default()
            .to_string())
    }

    pub async fn evaluate_expression<T: FromRemoteObject>(
        &self,
        expression: &str,
    ) -> Result<T, DomError> {
        let remote = self.evaluate_remote(expression, true).await?;
        Ok(value_from_remote_object(&remote, false)?)
    }

    /// Call `function` (JavaScript source) with JSON `args` in the page.
    pub async fn evaluate_function<T: FromRemoteObject>(
        &self,
        function: &str,
        args: &[Value],
    ) -> Result<T, DomError> {
        let args = args
            .iter()
            .map(Value::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        self.evaluate_expression(&format!("({function})({args})"))
            .await
    }

    /// Evaluate without `returnByValue`, keeping a remote handle.
    pub async fn evaluate_handle(&self, expression: &str) -> Result<RemoteObject, DomError> {
        self.evaluate_remote(expression, false).await
    }

    async fn evaluate_remote(
        &self,
        expression: &str,
        by_value: bool,
    ) -> Result<RemoteObject, DomError> {
        debug!(target: "devtools-dom", by_value, "evaluate");
        let response: EvaluateResponse = self
            .session
            .call(
                "Runtime.evaluate",
                &json!({
                    "expression": expression,
                    "returnByValue": by_value,
                    "awaitPromise": true,
                }),
            )
            .await?;
        Ok(response.into_result()?)
    }

    pub async fn query_selector(&self, selector: &str) -> Result<Option<ElementHandle>, DomError> {
        let expression = format!("document.querySelector({})", json!(selector));
        let remote = self.evaluate_handle(&expression).await?;
        Ok(ElementHandle::from_remote(self.clone(), remote))
    }

    pub async fn wait_for_selector(
        &self,
        selector: &str,
        options: WaitForSelectorOptions,
    ) -> Result<Option<ElementHandle>, DomError> {
        wait::wait_for_selector(self, selector, options).await
    }
}

fn is_main_frame_navigation(event: &SessionEvent) -> bool {
    event.params["frame"]["parentId"].is_null()
}
