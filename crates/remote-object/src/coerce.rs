//! Typed conversion of remote objects.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::trace;

use crate::error::CoercionError;
use crate::model::{parse_bigint, RemoteObject, RemoteObjectType, UnserializableValue};
use crate::structural::from_json_case_insensitive;
use crate::value::JsValue;

/// A Rust type a remote object can be coerced into.
pub trait FromRemoteObject: Sized {
    /// Name used in [`CoercionError::Incompatible`].
    const EXPECTED: &'static str;

    /// Value produced for `undefined` and `null`. `None` means the type has
    /// no sensible default and coercion fails instead.
    fn default_value() -> Option<Self>;

    /// Placeholder text accepted under `stringify` (`"undefined"` or
    /// `"null"`). Only string-like targets accept it.
    fn from_literal(_literal: &str) -> Option<Self> {
        None
    }

    fn from_js(value: JsValue) -> Result<Self, CoercionError>;
}

/// Outcome of [`value_from_remote_object_lenient`].
#[derive(Debug, Clone, PartialEq)]
pub enum Coerced<T> {
    Typed(T),
    /// The requested conversion does not exist; the decoded value is
    /// returned as-is.
    Unconverted(JsValue),
}

enum Resolved {
    Placeholder { literal: String, found: &'static str },
    Value(JsValue),
}

/// Coerce `remote` into `T`.
///
/// Sentinels win, then `undefined`, then null/absent payloads, then the
/// declared type decides how the payload is read. With `stringify`,
/// placeholders become their literal text when `T` is string-like.
pub fn value_from_remote_object<T: FromRemoteObject>(
    remote: &RemoteObject,
    stringify: bool,
) -> Result<T, CoercionError> {
    match resolve(remote)? {
        Resolved::Placeholder { literal, found } => placeholder(&literal, found, stringify),
        Resolved::Value(value) => T::from_js(value),
    }
}

/// Like [`value_from_remote_object`], but an unconvertible pair yields the
/// intermediate value instead of [`CoercionError::Incompatible`].
pub fn value_from_remote_object_lenient<T: FromRemoteObject>(
    remote: &RemoteObject,
    stringify: bool,
) -> Result<Coerced<T>, CoercionError> {
    let value = match resolve(remote)? {
        Resolved::Placeholder { literal, found } => {
            return match placeholder::<T>(&literal, found, stringify) {
                Ok(typed) => Ok(Coerced::Typed(typed)),
                Err(CoercionError::Incompatible { .. }) => Ok(Coerced::Unconverted(JsValue::Null)),
                Err(err) => Err(err),
            };
        }
        Resolved::Value(value) => value,
    };

    match T::from_js(value.clone()) {
        Ok(typed) => Ok(Coerced::Typed(typed)),
        Err(CoercionError::Incompatible { expected, found }) => {
            trace!(target: "remote-object", expected, found, "returning unconverted value");
            Ok(Coerced::Unconverted(value))
        }
        Err(err) => Err(err),
    }
}

fn resolve(remote: &RemoteObject) -> Result<Resolved, CoercionError> {
    if let Some(literal) = remote.unserializable_value.as_deref() {
        return Ok(Resolved::Value(UnserializableValue::parse(literal)?.into_js()));
    }

    let kind = remote.object_type()?;
    if kind == RemoteObjectType::Undefined {
        return Ok(Resolved::Placeholder {
            literal: "undefined".into(),
            found: "undefined",
        });
    }

    let value = match &remote.value {
        Some(value) if !value.is_null() => value,
        _ => {
            return Ok(Resolved::Placeholder {
                literal: "null".into(),
                found: "null",
            });
        }
    };

    let intermediate = match (kind, value) {
        (RemoteObjectType::String, Value::String(s)) => JsValue::String(s.clone()),
        (RemoteObjectType::Number, Value::Number(n)) => {
            JsValue::Number(n.as_f64().unwrap_or(f64::NAN))
        }
        (RemoteObjectType::Boolean, Value::Bool(b)) => JsValue::Bool(*b),
        (RemoteObjectType::Bigint, Value::String(s)) => {
            let digits = s.strip_suffix('n').unwrap_or(s.as_str());
            JsValue::BigInt(
                parse_bigint(digits).ok_or_else(|| CoercionError::UnsupportedValue(s.clone()))?,
            )
        }
        (RemoteObjectType::Object | RemoteObjectType::Function | RemoteObjectType::Symbol, _) => {
            JsValue::from(value.clone())
        }
        (declared, other) => {
            return Err(CoercionError::incompatible(
                declared.as_str(),
                JsValue::from(other.clone()).kind(),
            ))
        }
    };
    Ok(Resolved::Value(intermediate))
}

fn placeholder<T: FromRemoteObject>(
    literal: &str,
    found: &'static str,
    stringify: bool,
) -> Result<T, CoercionError> {
    if stringify {
        if let Some(value) = T::from_literal(literal) {
            return Ok(value);
        }
    }
    T::default_value().ok_or_else(|| CoercionError::incompatible(T::EXPECTED, found))
}

/// Round to nearest, ties to even.
fn round_half_even(x: f64) -> f64 {
    if (x - x.trunc()).abs() == 0.5 {
        2.0 * (x / 2.0).round()
    } else {
        x.round()
    }
}

macro_rules! impl_integer {
    ($($ty:ty),* $(,)?) => {$(
        impl FromRemoteObject for $ty {
            const EXPECTED: &'static str = stringify!($ty);

            fn default_value() -> Option<Self> {
                Some(0)
            }

            fn from_js(value: JsValue) -> Result<Self, CoercionError> {
                match value {
                    JsValue::Number(n) if n.is_finite() => {
                        let rounded = round_half_even(n);
                        if rounded >= <$ty>::MIN as f64 && rounded < (<$ty>::MAX as f64) + 1.0 {
                            Ok(rounded as $ty)
                        } else {
                            Err(CoercionError::incompatible(Self::EXPECTED, "number"))
                        }
                    }
                    JsValue::BigInt(n) => <$ty>::try_from(n)
                        .map_err(|_| CoercionError::incompatible(Self::EXPECTED, "bigint")),
                    other => Err(CoercionError::incompatible(Self::EXPECTED, other.kind())),
                }
            }
        }
    )*};
}

impl_integer!(i32, u32, i64, u64, i128);

impl FromRemoteObject for f64 {
    const EXPECTED: &'static str = "f64";

    fn default_value() -> Option<Self> {
        Some(0.0)
    }

    fn from_js(value: JsValue) -> Result<Self, CoercionError> {
        match value {
            JsValue::Number(n) => Ok(n),
            JsValue::BigInt(n) => Ok(n as f64),
            other => Err(CoercionError::incompatible(Self::EXPECTED, other.kind())),
        }
    }
}

/// Exact within the 96-bit mantissa; larger bigints and non-finite
/// numbers are incompatible.
impl FromRemoteObject for Decimal {
    const EXPECTED: &'static str = "decimal";

    fn default_value() -> Option<Self> {
        Some(Decimal::ZERO)
    }

    fn from_js(value: JsValue) -> Result<Self, CoercionError> {
        match value {
            JsValue::Number(n) => Decimal::from_f64(n)
                .ok_or_else(|| CoercionError::incompatible(Self::EXPECTED, "number")),
            JsValue::BigInt(n) => Decimal::from_i128(n)
                .ok_or_else(|| CoercionError::incompatible(Self::EXPECTED, "bigint")),
            other => Err(CoercionError::incompatible(Self::EXPECTED, other.kind())),
        }
    }
}

impl FromRemoteObject for f32 {
    const EXPECTED: &'static str = "f32";

    fn default_value() -> Option<Self> {
        Some(0.0)
    }

    fn from_js(value: JsValue) -> Result<Self, CoercionError> {
        f64::from_js(value)
            .map(|n| n as f32)
            .map_err(|err| match err {
                CoercionError::Incompatible { found, .. } => {
                    CoercionError::incompatible(Self::EXPECTED, found)
                }
                other => other,
            })
    }
}

impl FromRemoteObject for bool {
    const EXPECTED: &'static str = "bool";

    fn default_value() -> Option<Self> {
        Some(false)
    }

    fn from_js(value: JsValue) -> Result<Self, CoercionError> {
        match value {
            JsValue::Bool(b) => Ok(b),
            other => Err(CoercionError::incompatible(Self::EXPECTED, other.kind())),
        }
    }
}

impl FromRemoteObject for String {
    const EXPECTED: &'static str = "String";

    fn default_value() -> Option<Self> {
        Some(String::new())
    }

    fn from_literal(literal: &str) -> Option<Self> {
        Some(literal.to_string())
    }

    fn from_js(value: JsValue) -> Result<Self, CoercionError> {
        match value {
            JsValue::String(s) => Ok(s),
            scalar @ (JsValue::Number(_) | JsValue::BigInt(_) | JsValue::Bool(_)) => {
                Ok(scalar.to_string())
            }
            other => Err(CoercionError::incompatible(Self::EXPECTED, other.kind())),
        }
    }
}

impl FromRemoteObject for JsValue {
    const EXPECTED: &'static str = "JsValue";

    fn default_value() -> Option<Self> {
        Some(JsValue::Null)
    }

    fn from_literal(literal: &str) -> Option<Self> {
        Some(JsValue::String(literal.to_string()))
    }

    fn from_js(value: JsValue) -> Result<Self, CoercionError> {
        Ok(value)
    }
}

impl FromRemoteObject for Value {
    const EXPECTED: &'static str = "serde_json::Value";

    fn default_value() -> Option<Self> {
        Some(Value::Null)
    }

    fn from_literal(literal: &str) -> Option<Self> {
        Some(Value::String(literal.to_string()))
    }

    fn from_js(value: JsValue) -> Result<Self, CoercionError> {
        Ok(value.to_json())
    }
}

/// Discards the value; for calls made only for their side effects.
impl FromRemoteObject for () {
    const EXPECTED: &'static str = "()";

    fn default_value() -> Option<Self> {
        Some(())
    }

    fn from_js(_value: JsValue) -> Result<Self, CoercionError> {
        Ok(())
    }
}

impl<T: FromRemoteObject> FromRemoteObject for Option<T> {
    const EXPECTED: &'static str = T::EXPECTED;

    fn default_value() -> Option<Self> {
        Some(None)
    }

    fn from_literal(literal: &str) -> Option<Self> {
        T::from_literal(literal).map(Some)
    }

    fn from_js(value: JsValue) -> Result<Self, CoercionError> {
        match value {
            JsValue::Null => Ok(None),
            other => T::from_js(other).map(Some),
        }
    }
}

/// Object payload decoded into `T` with case-insensitive field matching.
#[derive(Debug, Clone, PartialEq)]
pub struct Structural<T>(pub T);

impl<T> Structural<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T: DeserializeOwned> FromRemoteObject for Structural<T> {
    const EXPECTED: &'static str = "struct";

    fn default_value() -> Option<Self> {
        serde_json::from_value(Value::Null).ok().map(Structural)
    }

    fn from_js(value: JsValue) -> Result<Self, CoercionError> {
        match value {
            JsValue::Object(_) | JsValue::Array(_) => {
                from_json_case_insensitive(value.to_json()).map(Structural)
            }
            other => Err(CoercionError::incompatible(Self::EXPECTED, other.kind())),
        }
    }
}

/// Enum decoded from its numeric ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ordinal<E>(pub E);

impl<E> Ordinal<E> {
    pub fn into_inner(self) -> E {
        self.0
    }
}

impl<E: TryFrom<i64>> FromRemoteObject for Ordinal<E> {
    const EXPECTED: &'static str = "enum ordinal";

    fn default_value() -> Option<Self> {
        E::try_from(0).ok().map(Ordinal)
    }

    fn from_js(value: JsValue) -> Result<Self, CoercionError> {
        let found = value.kind();
        let ordinal = i64::from_js(value)
            .map_err(|_| CoercionError::incompatible(Self::EXPECTED, found))?;
        E::try_from(ordinal)
            .map(Ordinal)
            .map_err(|_| CoercionError::incompatible(Self::EXPECTED, found))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    fn remote(kind: &str, value: Option<Value>) -> RemoteObject {
        RemoteObject {
            kind: kind.into(),
            value,
            ..Default::default()
        }
    }

    fn sentinel(literal: &str) -> RemoteObject {
        RemoteObject {
            kind: "number".into(),
            unserializable_value: Some(literal.into()),
            ..Default::default()
        }
    }

    #[test]
    fn undefined_yields_default_or_literal() {
        let undefined = remote("undefined", None);
        assert_eq!(value_from_remote_object::<i32>(&undefined, false).unwrap(), 0);
        assert_eq!(value_from_remote_object::<i32>(&undefined, true).unwrap(), 0);
        assert_eq!(value_from_remote_object::<String>(&undefined, false).unwrap(), "");
        assert_eq!(
            value_from_remote_object::<String>(&undefined, true).unwrap(),
            "undefined"
        );
        assert_eq!(
            value_from_remote_object::<JsValue>(&undefined, false).unwrap(),
            JsValue::Null
        );
        assert_eq!(
            value_from_remote_object::<Option<f64>>(&undefined, false).unwrap(),
            None
        );
    }

    #[test]
    fn null_yields_default_or_literal() {
        for payload in [None, Some(Value::Null)] {
            let null = RemoteObject {
                subtype: Some("null".into()),
                ..remote("object", payload)
            };
            assert!(!value_from_remote_object::<bool>(&null, false).unwrap());
            assert_eq!(value_from_remote_object::<String>(&null, true).unwrap(), "null");
            assert_eq!(
                value_from_remote_object::<Value>(&null, true).unwrap(),
                json!("null")
            );
            assert_eq!(value_from_remote_object::<Value>(&null, false).unwrap(), Value::Null);
        }
    }

    #[test]
    fn valueless_handles_stringify_to_null() {
        let func = RemoteObject {
            description: Some("() => 1".into()),
            object_id: Some("fn-1".into()),
            ..remote("function", None)
        };
        assert_eq!(value_from_remote_object::<String>(&func, true).unwrap(), "null");
        assert_eq!(value_from_remote_object::<String>(&func, false).unwrap(), "");
        assert_eq!(func.description_or_value(), "() => 1");

        let symbol = RemoteObject {
            description: Some("Symbol(tag)".into()),
            ..remote("symbol", None)
        };
        assert_eq!(value_from_remote_object::<String>(&symbol, true).unwrap(), "null");
    }

    #[test]
    fn sentinels_map_to_ieee_specials() {
        assert!(value_from_remote_object::<f64>(&sentinel("NaN"), false)
            .unwrap()
            .is_nan());
        assert_eq!(
            value_from_remote_object::<f64>(&sentinel("Infinity"), false).unwrap(),
            f64::INFINITY
        );
        assert_eq!(
            value_from_remote_object::<f64>(&sentinel("-Infinity"), false).unwrap(),
            f64::NEG_INFINITY
        );
        let negative_zero = value_from_remote_object::<f64>(&sentinel("-0"), false).unwrap();
        assert_eq!(negative_zero, 0.0);
        assert!(negative_zero.is_sign_negative());
    }

    #[test]
    fn sentinel_is_checked_before_declared_type() {
        let odd = RemoteObject {
            kind: "undefined".into(),
            unserializable_value: Some("Infinity".into()),
            ..Default::default()
        };
        assert_eq!(
            value_from_remote_object::<f64>(&odd, false).unwrap(),
            f64::INFINITY
        );
        assert_eq!(
            value_from_remote_object::<f64>(&sentinel("Infinityy"), false),
            Err(CoercionError::UnsupportedValue("Infinityy".into()))
        );
    }

    #[test]
    fn bigint_literals_become_wide_integers() {
        let big = RemoteObject {
            kind: "bigint".into(),
            unserializable_value: Some("170141183460469231731687303715884105727n".into()),
            ..Default::default()
        };
        assert_eq!(value_from_remote_object::<i128>(&big, false).unwrap(), i128::MAX);
        assert_eq!(
            value_from_remote_object::<i64>(&big, false),
            Err(CoercionError::Incompatible {
                expected: "i64",
                found: "bigint"
            })
        );
        let small = RemoteObject {
            unserializable_value: Some("-42n".into()),
            ..big
        };
        assert_eq!(value_from_remote_object::<i32>(&small, false).unwrap(), -42);
        assert_eq!(value_from_remote_object::<String>(&small, false).unwrap(), "-42");
    }

    #[test]
    fn numbers_convert_to_requested_width() {
        let n = remote("number", Some(json!(2.5)));
        assert_eq!(value_from_remote_object::<f64>(&n, false).unwrap(), 2.5);
        assert_eq!(value_from_remote_object::<i32>(&n, false).unwrap(), 2);
        assert_eq!(value_from_remote_object::<f32>(&n, false).unwrap(), 2.5f32);
        assert_eq!(
            value_from_remote_object::<u32>(&remote("number", Some(json!(3.5))), false).unwrap(),
            4
        );
        assert_eq!(
            value_from_remote_object::<u32>(&remote("number", Some(json!(-1))), false),
            Err(CoercionError::Incompatible {
                expected: "u32",
                found: "number"
            })
        );
        assert_eq!(
            value_from_remote_object::<i32>(&sentinel("NaN"), false),
            Err(CoercionError::Incompatible {
                expected: "i32",
                found: "number"
            })
        );
        assert_eq!(
            value_from_remote_object::<String>(&n, false).unwrap(),
            "2.5"
        );
    }

    #[test]
    fn decimals_accept_numbers_and_bigints() {
        let n = remote("number", Some(json!(2.5)));
        assert_eq!(
            value_from_remote_object::<Decimal>(&n, false).unwrap(),
            Decimal::new(25, 1)
        );

        let big = RemoteObject {
            kind: "bigint".into(),
            unserializable_value: Some("123456789012345678901234567n".into()),
            ..Default::default()
        };
        assert_eq!(
            value_from_remote_object::<Decimal>(&big, false)
                .unwrap()
                .to_string(),
            "123456789012345678901234567"
        );

        let too_big = RemoteObject {
            unserializable_value: Some("1267650600228229401496703205376n".into()),
            ..big
        };
        assert_eq!(
            value_from_remote_object::<Decimal>(&too_big, false),
            Err(CoercionError::Incompatible {
                expected: "decimal",
                found: "bigint"
            })
        );
        assert_eq!(
            value_from_remote_object::<Decimal>(&sentinel("NaN"), false),
            Err(CoercionError::Incompatible {
                expected: "decimal",
                found: "number"
            })
        );
        assert_eq!(
            value_from_remote_object::<Decimal>(&remote("object", None), false).unwrap(),
            Decimal::ZERO
        );
    }

    #[test]
    fn strings_and_booleans_pass_through() {
        assert_eq!(
            value_from_remote_object::<String>(&remote("string", Some(json!("hi"))), false)
                .unwrap(),
            "hi"
        );
        assert!(
            value_from_remote_object::<bool>(&remote("boolean", Some(json!(true))), false)
                .unwrap()
        );
        assert_eq!(
            value_from_remote_object::<bool>(&remote("string", Some(json!("true"))), false),
            Err(CoercionError::Incompatible {
                expected: "bool",
                found: "string"
            })
        );
    }

    #[test]
    fn declared_type_must_match_payload() {
        assert_eq!(
            value_from_remote_object::<JsValue>(&remote("number", Some(json!("7"))), false),
            Err(CoercionError::Incompatible {
                expected: "number",
                found: "string"
            })
        );
        assert_eq!(
            value_from_remote_object::<JsValue>(&remote("promise", Some(json!(1))), false),
            Err(CoercionError::UnknownType("promise".into()))
        );
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Rect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    }

    #[test]
    fn objects_decode_structurally_or_to_maps() {
        let rect = remote(
            "object",
            Some(json!({ "X": 1, "Y": 2.5, "Width": 10, "Height": 20 })),
        );
        let Structural(decoded) = value_from_remote_object::<Structural<Rect>>(&rect, false).unwrap();
        assert_eq!(
            decoded,
            Rect {
                x: 1.0,
                y: 2.5,
                width: 10.0,
                height: 20.0
            }
        );

        let map = value_from_remote_object::<JsValue>(&rect, false).unwrap();
        assert_eq!(map.get("Width"), Some(&JsValue::Number(10.0)));

        let missing = value_from_remote_object::<Structural<Rect>>(
            &remote("undefined", None),
            false,
        );
        assert_eq!(
            missing,
            Err(CoercionError::Incompatible {
                expected: "struct",
                found: "undefined"
            })
        );
        assert_eq!(
            value_from_remote_object::<Option<Structural<Rect>>>(&remote("undefined", None), false)
                .unwrap(),
            None
        );
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Phase {
        Idle,
        Busy,
    }

    impl TryFrom<i64> for Phase {
        type Error = ();

        fn try_from(ordinal: i64) -> Result<Self, ()> {
            match ordinal {
                0 => Ok(Phase::Idle),
                1 => Ok(Phase::Busy),
                _ => Err(()),
            }
        }
    }

    #[test]
    fn enums_accept_numeric_ordinals() {
        let busy = remote("number", Some(json!(1)));
        assert_eq!(
            value_from_remote_object::<Ordinal<Phase>>(&busy, false)
                .unwrap()
                .into_inner(),
            Phase::Busy
        );
        assert_eq!(
            value_from_remote_object::<Ordinal<Phase>>(&remote("undefined", None), false)
                .unwrap()
                .into_inner(),
            Phase::Idle
        );
        assert!(value_from_remote_object::<Ordinal<Phase>>(
            &remote("number", Some(json!(9))),
            false
        )
        .is_err());
    }

    #[test]
    fn lenient_coercion_returns_intermediate_value() {
        let text = remote("string", Some(json!("abc")));
        assert_eq!(
            value_from_remote_object_lenient::<f64>(&text, false).unwrap(),
            Coerced::Unconverted(JsValue::String("abc".into()))
        );
        assert_eq!(
            value_from_remote_object_lenient::<String>(&text, false).unwrap(),
            Coerced::Typed("abc".to_string())
        );
        assert_eq!(
            value_from_remote_object_lenient::<f64>(&sentinel("bogus"), false),
            Err(CoercionError::UnsupportedValue("bogus".into()))
        );
    }
}
