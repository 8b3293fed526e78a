use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use devtools_dom::{ClickOptions, DomError, Page, WaitForSelectorOptions};
use devtools_session::{
    CdpTransport, CommandTarget, DevToolsSession, SessionConfig, SessionError, TransportEvent,
};
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};

type Script = Box<dyn Fn(&str, &Value) -> Value + Send + Sync>;

/// Answers commands from a script and lets the script push events back.
struct ScriptedTransport {
    script: Script,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    events_rx: Mutex<mpsc::UnboundedReceiver<TransportEvent>>,
    commands: std::sync::Mutex<Vec<(CommandTarget, String, Value)>>,
}

impl ScriptedTransport {
    fn new(script: Script) -> Arc<Self> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            script,
            events_tx,
            events_rx: Mutex::new(events_rx),
            commands: std::sync::Mutex::new(Vec::new()),
        })
    }

    fn methods(&self) -> Vec<String> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .map(|(_, method, _)| method.clone())
            .collect()
    }

    fn params_of(&self, method: &str) -> Vec<Value> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, m, _)| m == method)
            .map(|(_, _, params)| params.clone())
            .collect()
    }
}

#[async_trait]
impl CdpTransport for ScriptedTransport {
    async fn start(&self) -> Result<(), SessionError> {
        Ok(())
    }

    async fn next_event(&self) -> Option<TransportEvent> {
        self.events_rx.lock().await.recv().await
    }

    async fn send_command(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
    ) -> Result<Value, SessionError> {
        let reply = (self.script)(method, &params);
        if method == "Page.navigate" && reply.get("errorText").is_none() {
            let _ = self.events_tx.send(TransportEvent {
                method: "Page.loadEventFired".into(),
                params: json!({ "timestamp": 1.0 }),
                session_id: Some("S1".into()),
            });
        }
        self.commands
            .lock()
            .unwrap()
            .push((target, method.to_string(), params));
        Ok(reply)
    }
}

fn browser_replies(method: &str) -> Option<Value> {
    match method {
        "Target.getTargets" => Some(json!({
            "targetInfos": [
                { "targetId": "T0", "type": "service_worker" },
                { "targetId": "T1", "type": "page" }
            ]
        })),
        "Target.attachToTarget" => Some(json!({ "sessionId": "S1" })),
        _ => None,
    }
}

async fn attached_page(transport: Arc<ScriptedTransport>) -> Page {
    let session =
        DevToolsSession::with_transport(&SessionConfig::default(), transport as Arc<dyn CdpTransport>);
    session.start().await.unwrap();
    session.attach_first_page().await.unwrap();
    let page = Page::new(session);
    page.enable().await.unwrap();
    page
}

#[tokio::test]
async fn goto_resolves_on_load_event() {
    let transport = ScriptedTransport::new(Box::new(|method, _| {
        browser_replies(method).unwrap_or_else(|| match method {
            "Page.navigate" => json!({ "frameId": "F1", "loaderId": "L1" }),
            _ => json!({}),
        })
    }));
    let page = attached_page(transport.clone()).await;

    page.goto("https://example.com/", Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(
        transport.methods(),
        vec![
            "Target.getTargets",
            "Target.attachToTarget",
            "Page.enable",
            "Runtime.enable",
            "Page.navigate",
        ]
    );
    assert_eq!(
        transport.params_of("Page.navigate")[0]["url"],
        "https://example.com/"
    );
    let routed = transport.commands.lock().unwrap()[4].0.clone();
    assert_eq!(routed, CommandTarget::Session("S1".into()));
}

#[tokio::test]
async fn goto_surfaces_error_text() {
    let transport = ScriptedTransport::new(Box::new(|method, _| {
        browser_replies(method).unwrap_or_else(|| match method {
            "Page.navigate" => json!({ "frameId": "F1", "errorText": "net::ERR_NAME_NOT_RESOLVED" }),
            _ => json!({}),
        })
    }));
    let page = attached_page(transport).await;

    let err = page
        .goto("https://nowhere.invalid/", Duration::from_secs(5))
        .await
        .unwrap_err();
    match err {
        DomError::Navigation { url, reason } => {
            assert_eq!(url, "https://nowhere.invalid/");
            assert_eq!(reason, "net::ERR_NAME_NOT_RESOLVED");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn evaluate_expression_coerces_result() {
    let transport = ScriptedTransport::new(Box::new(|method, params| {
        browser_replies(method).unwrap_or_else(|| match method {
            "Runtime.evaluate" => {
                assert_eq!(params["returnByValue"], true);
                json!({ "result": { "type": "number", "value": 42 } })
            }
            _ => json!({}),
        })
    }));
    let page = attached_page(transport).await;

    let answer: i64 = page.evaluate_expression("6 * 7").await.unwrap();
    assert_eq!(answer, 42);
    let as_text: String = page.evaluate_expression("6 * 7").await.unwrap();
    assert_eq!(as_text, "42");
}

#[tokio::test]
async fn evaluation_exception_becomes_error() {
    let transport = ScriptedTransport::new(Box::new(|method, _| {
        browser_replies(method).unwrap_or_else(|| match method {
            "Runtime.evaluate" => json!({
                "result": { "type": "object", "subtype": "error" },
                "exceptionDetails": {
                    "exceptionId": 1,
                    "text": "Uncaught",
                    "lineNumber": 0,
                    "columnNumber": 0,
                    "exception": {
                        "type": "object",
                        "subtype": "error",
                        "description": "ReferenceError: missing is not defined"
                    }
                }
            }),
            _ => json!({}),
        })
    }));
    let page = attached_page(transport).await;

    let err = page
        .evaluate_expression::<i64>("missing")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("ReferenceError"), "{err}");
}

#[tokio::test]
async fn query_selector_then_click_dispatches_mouse_events() {
    let transport = ScriptedTransport::new(Box::new(|method, _| {
        browser_replies(method).unwrap_or_else(|| match method {
            "Runtime.evaluate" => json!({
                "result": {
                    "type": "object",
                    "subtype": "node",
                    "className": "HTMLButtonElement",
                    "objectId": "el-1"
                }
            }),
            "DOM.getBoxModel" => json!({
                "model": { "border": [10.0, 20.0, 110.0, 20.0, 110.0, 60.0, 10.0, 60.0] }
            }),
            _ => json!({}),
        })
    }));
    let page = attached_page(transport.clone()).await;

    let button = page.query_selector("#submit").await.unwrap().expect("element");
    let bounds = button.bounding_box().await.unwrap().unwrap();
    assert_eq!((bounds.width, bounds.height), (100.0, 40.0));

    button.click(ClickOptions::default()).await.unwrap();
    button.dispose().await.unwrap();

    let mouse = transport.params_of("Input.dispatchMouseEvent");
    let kinds: Vec<&str> = mouse.iter().map(|p| p["type"].as_str().unwrap()).collect();
    assert_eq!(kinds, vec!["mouseMoved", "mousePressed", "mouseReleased"]);
    for event in &mouse {
        assert_eq!(event["x"], 60.0);
        assert_eq!(event["y"], 40.0);
    }
    assert_eq!(mouse[1]["button"], "left");
    assert_eq!(mouse[1]["clickCount"], 1);

    let evaluated = transport.params_of("Runtime.evaluate");
    assert_eq!(
        evaluated[0]["expression"],
        "document.querySelector(\"#submit\")"
    );
    assert_eq!(evaluated[0]["returnByValue"], false);
    assert_eq!(
        transport.params_of("Runtime.releaseObject")[0]["objectId"],
        "el-1"
    );
}

#[tokio::test]
async fn query_selector_without_match_is_none() {
    let transport = ScriptedTransport::new(Box::new(|method, _| {
        browser_replies(method).unwrap_or_else(|| match method {
            "Runtime.evaluate" => json!({
                "result": { "type": "object", "subtype": "null", "value": null }
            }),
            _ => json!({}),
        })
    }));
    let page = attached_page(transport).await;

    assert!(page.query_selector(".missing").await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn wait_for_selector_times_out() {
    let transport = ScriptedTransport::new(Box::new(|method, _| {
        browser_replies(method).unwrap_or_else(|| match method {
            "Runtime.evaluate" => json!({
                "result": { "type": "object", "subtype": "null", "value": null }
            }),
            _ => json!({}),
        })
    }));
    let page = attached_page(transport.clone()).await;

    let options = WaitForSelectorOptions {
        timeout: Duration::from_millis(500),
        polling_interval: Duration::from_millis(100),
        ..Default::default()
    };
    let err = page
        .wait_for_selector("#late", options)
        .await
        .err()
        .expect("timeout");
    assert!(err.is_timeout());
    assert!(err.to_string().contains("#late"));

    let polls = transport.params_of("Runtime.evaluate").len();
    assert!((5..=7).contains(&polls), "polled {polls} times");
}

#[tokio::test]
async fn wait_for_hidden_resolves_when_absent() {
    let transport = ScriptedTransport::new(Box::new(|method, _| {
        browser_replies(method).unwrap_or_else(|| match method {
            "Runtime.evaluate" => json!({ "result": { "type": "boolean", "value": true } }),
            _ => json!({}),
        })
    }));
    let page = attached_page(transport).await;

    let options = WaitForSelectorOptions {
        hidden: true,
        ..Default::default()
    };
    assert!(page
        .wait_for_selector(".spinner", options)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn wait_for_navigation_ignores_child_frames() {
    let transport = ScriptedTransport::new(Box::new(|method, _| {
        browser_replies(method).unwrap_or_else(|| json!({}))
    }));
    let page = attached_page(transport.clone()).await;

    let frame_event = |url: &str, parent: Option<&str>| TransportEvent {
        method: "Page.frameNavigated".into(),
        params: json!({ "frame": { "id": "F", "url": url, "parentId": parent } }),
        session_id: Some("S1".into()),
    };
    let emit = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        transport
            .events_tx
            .send(frame_event("https://ads.example/frame", Some("F0")))
            .unwrap();
        transport
            .events_tx
            .send(frame_event("https://example.com/next", None))
            .unwrap();
    };

    let (url, ()) = tokio::join!(page.wait_for_navigation(Duration::from_secs(5)), emit);
    assert_eq!(url.unwrap(), "https://example.com/next");
}
