//! Serde model of the `Runtime` domain payloads the coercion layer consumes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoercionError;
use crate::value::JsValue;

/// A `Runtime.RemoteObject` as returned by `Runtime.evaluate` and friends.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteObject {
    /// Raw protocol type tag; see [`RemoteObject::object_type`].
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unserializable_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
}

impl RemoteObject {
    pub fn object_type(&self) -> Result<RemoteObjectType, CoercionError> {
        self.kind.parse()
    }

    pub fn object_id(&self) -> Option<&str> {
        self.object_id.as_deref()
    }

    /// DOM nodes come back as `object` with subtype `node`.
    pub fn is_node(&self) -> bool {
        self.subtype.as_deref() == Some("node")
    }

    /// Human-readable rendering used for console output.
    pub fn description_or_value(&self) -> String {
        if let Some(literal) = &self.unserializable_value {
            return literal.clone();
        }
        match &self.value {
            Some(value) if !value.is_null() => JsValue::from(value.clone()).to_string(),
            _ => self
                .description
                .clone()
                .unwrap_or_else(|| self.kind.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteObjectType {
    Object,
    Function,
    Undefined,
    String,
    Number,
    Boolean,
    Symbol,
    Bigint,
}

impl RemoteObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteObjectType::Object => "object",
            RemoteObjectType::Function => "function",
            RemoteObjectType::Undefined => "undefined",
            RemoteObjectType::String => "string",
            RemoteObjectType::Number => "number",
            RemoteObjectType::Boolean => "boolean",
            RemoteObjectType::Symbol => "symbol",
            RemoteObjectType::Bigint => "bigint",
        }
    }
}

impl FromStr for RemoteObjectType {
    type Err = CoercionError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        let kind = match tag {
            "object" => RemoteObjectType::Object,
            "function" => RemoteObjectType::Function,
            "undefined" => RemoteObjectType::Undefined,
            "string" => RemoteObjectType::String,
            "number" => RemoteObjectType::Number,
            "boolean" => RemoteObjectType::Boolean,
            "symbol" => RemoteObjectType::Symbol,
            "bigint" => RemoteObjectType::Bigint,
            other => return Err(CoercionError::UnknownType(other.to_string())),
        };
        Ok(kind)
    }
}

impl fmt::Display for RemoteObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Values JSON cannot carry, sent as `unserializableValue` literals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnserializableValue {
    NaN,
    Infinity,
    NegativeInfinity,
    NegativeZero,
    BigInt(i128),
}

impl UnserializableValue {
    pub fn parse(literal: &str) -> Result<Self, CoercionError> {
        match literal {
            "NaN" => Ok(UnserializableValue::NaN),
            "Infinity" => Ok(UnserializableValue::Infinity),
            "-Infinity" => Ok(UnserializableValue::NegativeInfinity),
            "-0" => Ok(UnserializableValue::NegativeZero),
            other => other
                .strip_suffix('n')
                .and_then(parse_bigint)
                .map(UnserializableValue::BigInt)
                .ok_or_else(|| CoercionError::UnsupportedValue(other.to_string())),
        }
    }

    pub fn into_js(self) -> JsValue {
        match self {
            UnserializableValue::NaN => JsValue::Number(f64::NAN),
            UnserializableValue::Infinity => JsValue::Number(f64::INFINITY),
            UnserializableValue::NegativeInfinity => JsValue::Number(f64::NEG_INFINITY),
            UnserializableValue::NegativeZero => JsValue::Number(-0.0),
            UnserializableValue::BigInt(n) => JsValue::BigInt(n),
        }
    }
}

/// Decimal digits with an optional leading minus; anything else is rejected.
pub(crate) fn parse_bigint(digits: &str) -> Option<i128> {
    let unsigned = digits.strip_prefix('-').unwrap_or(digits);
    if unsigned.is_empty() || !unsigned.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionDetails {
    #[serde(default)]
    pub exception_id: i64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub line_number: i64,
    #[serde(default)]
    pub column_number: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<RemoteObject>,
}

impl ExceptionDetails {
    pub fn message(&self) -> String {
        match self.exception.as_ref().and_then(|e| e.description.as_deref()) {
            Some(description) => description.to_string(),
            None => format!(
                "{} at {}:{}",
                self.text, self.line_number, self.column_number
            ),
        }
    }
}

/// Reply of `Runtime.evaluate` / `Runtime.callFunctionOn`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResponse {
    pub result: RemoteObject,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception_details: Option<ExceptionDetails>,
}

impl EvaluateResponse {
    pub fn into_result(self) -> Result<RemoteObject, CoercionError> {
        match self.exception_details {
            Some(details) => Err(CoercionError::Evaluation(details.message())),
            None => Ok(self.result),
        }
    }
}
