//! Coercion of DevTools `Runtime.RemoteObject` envelopes into Rust values.
//!
//! ```ignore
//! let remote: RemoteObject = serde_json::from_value(reply["result"].clone())?;
//! let width: i32 = value_from_remote_object(&remote, false)?;
//! ```

pub mod coerce;
pub mod error;
pub mod model;
pub mod structural;
pub mod value;

pub use coerce::{
    value_from_remote_object, value_from_remote_object_lenient, Coerced, FromRemoteObject,
    Ordinal, Structural,
};
pub use error::CoercionError;
pub use model::{
    EvaluateResponse, ExceptionDetails, RemoteObject, RemoteObjectType, UnserializableValue,
};
pub use structural::from_json_case_insensitive;
pub use value::JsValue;

pub use rust_decimal::Decimal;
