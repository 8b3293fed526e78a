use std::sync::Arc;

use devtools_session::CommandSender;
use serde_json::json;
use tracing::debug;

use crate::error::InputError;
use crate::keyboard::Keyboard;

const NEXT_FRAME: &str =
    "new Promise(resolve => requestAnimationFrame(() => requestAnimationFrame(resolve)))";

pub struct Touchscreen {
    sender: Arc<dyn CommandSender>,
    keyboard: Arc<Keyboard>,
}

impl Touchscreen {
    pub fn new(sender: Arc<dyn CommandSender>, keyboard: Arc<Keyboard>) -> Self {
        Self { sender, keyboard }
    }

    /// Single-finger tap. Waits for a rendered frame first; touches sent
    /// right after a navigation are otherwise dropped by the renderer.
    pub async fn tap(&self, x: f64, y: f64) -> Result<(), InputError> {
        self.sender
            .send_command(
                "Runtime.evaluate",
                json!({ "expression": NEXT_FRAME, "awaitPromise": true }),
            )
            .await?;

        let modifiers = self.keyboard.modifiers().bits();
        let point = json!({ "x": x.round(), "y": y.round() });
        debug!(target: "input-replay", x, y, "tap");

        self.sender
            .send_command(
                "Input.dispatchTouchEvent",
                json!({ "type": "touchStart", "touchPoints": [point], "modifiers": modifiers }),
            )
            .await?;
        self.sender
            .send_command(
                "Input.dispatchTouchEvent",
                json!({ "type": "touchEnd", "touchPoints": [], "modifiers": modifiers }),
            )
            .await?;
        Ok(())
    }
}
