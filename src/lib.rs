//! devtools-dom
//!
//! Puppeteer-style element handles, input replay and wait tasks over a
//! Chromium DevTools session. The building blocks live in the workspace
//! crates and are re-exported here.

pub mod cli;
pub mod config;
pub mod element;
pub mod error;
pub mod page;
pub mod wait;

pub use config::AppConfig;
pub use element::{BoundingBox, ElementHandle};
pub use error::DomError;
pub use page::Page;
pub use wait::WaitForSelectorOptions;

pub use devtools_session::{DevToolsSession, SessionConfig, SessionError, SessionErrorKind};
pub use input_replay::{ClickOptions, Modifiers, MouseButton, MouseOptions, TypeOptions};
pub use remote_object::{CoercionError, JsValue, RemoteObject};
