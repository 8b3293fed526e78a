use std::time::Duration;

use input_replay::{ClickOptions, Point, TypeOptions};
use remote_object::{value_from_remote_object, EvaluateResponse, FromRemoteObject, RemoteObject};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::error::DomError;
use crate::page::Page;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    /// Axis-aligned box around a protocol quad `[x1, y1, ..., x4, y4]`.
    pub fn from_quad(quad: &[f64]) -> Option<Self> {
        if quad.len() < 8 {
            return None;
        }
        let xs = [quad[0], quad[2], quad[4], quad[6]];
        let ys = [quad[1], quad[3], quad[5], quad[7]];
        let min = |values: [f64; 4]| values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = |values: [f64; 4]| values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let (x, y) = (min(xs), min(ys));
        Some(Self {
            x,
            y,
            width: max(xs) - x,
            height: max(ys) - y,
        })
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

#[derive(Deserialize)]
struct BoxModelReply {
    model: BoxModel,
}

#[derive(Deserialize)]
struct BoxModel {
    border: Vec<f64>,
}

/// Handle to a DOM element living in the page.
pub struct ElementHandle {
    page: Page,
    remote: RemoteObject,
}

impl ElementHandle {
    /// `None` for `null` results, which carry no object id.
    pub(crate) fn from_remote(page: Page, remote: RemoteObject) -> Option<Self> {
        remote.object_id.as_ref()?;
        Some(Self { page, remote })
    }

    pub fn remote_object(&self) -> &RemoteObject {
        &self.remote
    }

    fn object_id(&self) -> Result<&str, DomError> {
        self.remote.object_id().ok_or(DomError::Detached)
    }

    /// Border box in CSS pixels, or `None` when the element is not rendered.
    pub async fn bounding_box(&self) -> Result<Option<BoundingBox>, DomError> {
        let reply = self
            .page
            .session()
            .call::<_, BoxModelReply>(
                "DOM.getBoxModel",
                &json!({ "objectId": self.object_id()? }),
            )
            .await;
        match reply {
            Ok(reply) => Ok(BoundingBox::from_quad(&reply.model.border)),
            Err(err) if err.is_protocol() => {
                debug!(target: "devtools-dom", %err, "no box model");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn clickable_point(&self) -> Result<Point, DomError> {
        match self.bounding_box().await? {
            Some(bbox) if bbox.width > 0.0 && bbox.height > 0.0 => Ok(bbox.center()),
            _ => Err(DomError::NotVisible),
        }
    }

    pub async fn scroll_into_view(&self) -> Result<(), DomError> {
        self.page
            .session()
            .send(
                "DOM.scrollIntoViewIfNeeded",
                json!({ "objectId": self.object_id()? }),
            )
            .await?;
        Ok(())
    }

    pub async fn hover(&self) -> Result<(), DomError> {
        self.scroll_into_view().await?;
        let point = self.clickable_point().await?;
        self.page.mouse().move_to(point.x, point.y, 1).await?;
        Ok(())
    }

    pub async fn click(&self, options: ClickOptions) -> Result<(), DomError> {
        self.scroll_into_view().await?;
        let point = self.clickable_point().await?;
        self.page.mouse().click(point.x, point.y, options).await?;
        Ok(())
    }

    pub async fn tap(&self) -> Result<(), DomError> {
        self.scroll_into_view().await?;
        let point = self.clickable_point().await?;
        self.page.touchscreen().tap(point.x, point.y).await?;
        Ok(())
    }

    pub async fn focus(&self) -> Result<(), DomError> {
        self.evaluate_function::<()>("function() { this.focus(); }")
            .await
    }

    /// Focus the element, then type `text` through the keyboard.
    pub async fn type_text(&self, text: &str, options: TypeOptions) -> Result<(), DomError> {
        self.focus().await?;
        self.page.keyboard().type_text(text, options).await?;
        Ok(())
    }

    pub async fn press(&self, key: &str, delay: Option<Duration>) -> Result<(), DomError> {
        self.focus().await?;
        self.page.keyboard().press(key, delay).await?;
        Ok(())
    }

    /// Run `function` with the element bound to `this`.
    pub async fn evaluate_function<T: FromRemoteObject>(&self, function: &str) -> Result<T, DomError> {
        let response: EvaluateResponse = self
            .page
            .session()
            .call(
                "Runtime.callFunctionOn",
                &json!({
                    "functionDeclaration": function,
                    "objectId": self.object_id()?,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;
        let remote = response.into_result()?;
        Ok(value_from_remote_object(&remote, false)?)
    }

    /// Release the remote object.
    pub async fn dispose(self) -> Result<(), DomError> {
        self.page
            .session()
            .send(
                "Runtime.releaseObject",
                json!({ "objectId": self.object_id()? }),
            )
            .await?;
        Ok(())
    }
}
