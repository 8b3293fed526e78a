use std::sync::Arc;

use devtools_session::CommandSender;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::time::sleep;
use tracing::debug;

use crate::error::InputError;
use crate::keyboard::Keyboard;
use crate::model::{ClickOptions, MouseButton, MouseOptions, Point};

#[derive(Debug)]
struct PointerState {
    position: Point,
    button: MouseButton,
}

/// Mouse bound to one session.
///
/// State changes happen synchronously before the first await of each call,
/// so futures joined in `move, down, up` order observe each other's effects.
/// Concurrent callers on one mouse still race; serialize interaction per page.
pub struct Mouse {
    sender: Arc<dyn CommandSender>,
    keyboard: Arc<Keyboard>,
    state: Mutex<PointerState>,
}

impl Mouse {
    pub fn new(sender: Arc<dyn CommandSender>, keyboard: Arc<Keyboard>) -> Self {
        Self {
            sender,
            keyboard,
            state: Mutex::new(PointerState {
                position: Point::new(0.0, 0.0),
                button: MouseButton::None,
            }),
        }
    }

    pub fn position(&self) -> Point {
        self.state.lock().position
    }

    pub fn button(&self) -> MouseButton {
        self.state.lock().button
    }

    /// Move to `(x, y)`. With `steps > 1` the path is split into `steps`
    /// equal segments and one event is sent per segment end, target included.
    pub async fn move_to(&self, x: f64, y: f64, steps: u32) -> Result<(), InputError> {
        let steps = steps.max(1);
        let (path, button) = {
            let mut state = self.state.lock();
            let from = state.position;
            state.position = Point::new(x, y);
            (interpolate(from, Point::new(x, y), steps), state.button)
        };

        for point in path {
            let payload = self.mouse_event("mouseMoved", point, button, None);
            self.dispatch(payload).await?;
        }
        Ok(())
    }

    pub async fn down(&self, options: MouseOptions) -> Result<(), InputError> {
        let position = {
            let mut state = self.state.lock();
            state.button = options.button;
            state.position
        };
        let payload = self.mouse_event(
            "mousePressed",
            position,
            options.button,
            Some(options.click_count),
        );
        self.dispatch(payload).await
    }

    pub async fn up(&self, options: MouseOptions) -> Result<(), InputError> {
        let position = {
            let mut state = self.state.lock();
            state.button = MouseButton::None;
            state.position
        };
        let payload = self.mouse_event(
            "mouseReleased",
            position,
            options.button,
            Some(options.click_count),
        );
        self.dispatch(payload).await
    }

    /// Move, press and release. Without a delay the three calls are in
    /// flight together; with one, release waits for it after press lands.
    pub async fn click(&self, x: f64, y: f64, options: ClickOptions) -> Result<(), InputError> {
        let mouse_options = options.mouse_options();
        match options.delay {
            Some(delay) => {
                tokio::try_join!(self.move_to(x, y, 1), self.down(mouse_options))?;
                sleep(delay).await;
                self.up(mouse_options).await
            }
            None => {
                tokio::try_join!(
                    self.move_to(x, y, 1),
                    self.down(mouse_options),
                    self.up(mouse_options)
                )?;
                Ok(())
            }
        }
    }

    /// Two press/release pairs, the second with `clickCount = 2`.
    pub async fn dblclick(&self, x: f64, y: f64, options: ClickOptions) -> Result<(), InputError> {
        let first = MouseOptions {
            button: options.button,
            click_count: 1,
        };
        let second = MouseOptions {
            button: options.button,
            click_count: 2,
        };

        self.move_to(x, y, 1).await?;
        self.down(first).await?;
        self.up(first).await?;
        if let Some(delay) = options.delay {
            sleep(delay).await;
        }
        self.down(second).await?;
        if let Some(delay) = options.delay {
            sleep(delay).await;
        }
        self.up(second).await
    }

    pub async fn wheel(&self, delta_x: f64, delta_y: f64) -> Result<(), InputError> {
        let position = self.position();
        let payload = json!({
            "type": "mouseWheel",
            "x": position.x,
            "y": position.y,
            "deltaX": delta_x,
            "deltaY": delta_y,
            "modifiers": self.keyboard.modifiers().bits(),
            "pointerType": "mouse",
        });
        self.dispatch(payload).await
    }

    fn mouse_event(
        &self,
        kind: &str,
        at: Point,
        button: MouseButton,
        click_count: Option<u32>,
    ) -> Value {
        let mut payload = json!({
            "type": kind,
            "x": at.x,
            "y": at.y,
            "button": button,
            "buttons": button.buttons_mask(),
            "modifiers": self.keyboard.modifiers().bits(),
            "pointerType": "mouse",
        });
        if let (Some(count), Some(map)) = (click_count, payload.as_object_mut()) {
            map.insert("clickCount".into(), json!(count));
        }
        payload
    }

    async fn dispatch(&self, payload: Value) -> Result<(), InputError> {
        debug!(target: "input-replay", kind = %payload["type"], x = %payload["x"], y = %payload["y"], "mouse event");
        self.sender
            .send_command("Input.dispatchMouseEvent", payload)
            .await?;
        Ok(())
    }
}

/// Points `from + (to - from) * i / steps` for `i = 1..=steps`.
pub fn interpolate(from: Point, to: Point, steps: u32) -> Vec<Point> {
    let steps = steps.max(1);
    (1..=steps)
        .map(|i| {
            let i = f64::from(i);
            let n = f64::from(steps);
            Point::new(
                from.x + ((to.x - from.x) * i) / n,
                from.y + ((to.y - from.y) * i) / n,
            )
        })
        .collect()
}
