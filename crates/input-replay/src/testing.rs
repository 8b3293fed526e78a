use std::sync::Arc;

use async_trait::async_trait;
use devtools_session::{CommandSender, SessionError, SessionErrorKind};
use parking_lot::Mutex;
use serde_json::{json, Value};

/// Records every command in dispatch order and answers with `{}`.
pub(crate) struct RecordingSender {
    calls: Mutex<Vec<(String, Value)>>,
    fail: bool,
}

impl RecordingSender {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            fail: false,
        })
    }

    pub(crate) fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            fail: true,
        })
    }

    pub(crate) fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().clone()
    }

    pub(crate) fn params_for(&self, method: &str) -> Vec<Value> {
        self.calls
            .lock()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, params)| params.clone())
            .collect()
    }
}

#[async_trait]
impl CommandSender for RecordingSender {
    async fn send_command(&self, method: &str, params: Value) -> Result<Value, SessionError> {
        self.calls.lock().push((method.to_string(), params));
        if self.fail {
            return Err(SessionError::new(SessionErrorKind::Protocol)
                .with_hint(format!("{method} rejected")));
        }
        Ok(json!({}))
    }
}
