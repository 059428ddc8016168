//! Text form of interpreted values.
//!
//! Scalars print the way Java's `toString` prints them; everything else is
//! pretty-printed JSON.

use num_bigint::{BigInt, Sign};
use serde_json::{Map, Number, Value as Json};

use crate::context::error::RenderError;
use crate::context::interpret::{interpret, ContextValue};
use crate::context::stream::{Graph, Value};

/// Stands in for a value that cannot be rendered.
pub const UNSERIALIZABLE: &str = "<can not serialize object>";

impl ContextValue {
    pub fn is_scalar(&self) -> bool {
        match self {
            ContextValue::Null
            | ContextValue::Bool(_)
            | ContextValue::Byte(_)
            | ContextValue::Short(_)
            | ContextValue::Int(_)
            | ContextValue::Long(_)
            | ContextValue::Float(_)
            | ContextValue::Double(_)
            | ContextValue::Char(_)
            | ContextValue::Integer(_)
            | ContextValue::Decimal { .. }
            | ContextValue::Str(_)
            | ContextValue::Enum(_) => true,
            ContextValue::Time(t) => t.is_scalar(),
            ContextValue::EpochMillis(_)
            | ContextValue::Text(_)
            | ContextValue::List(_)
            | ContextValue::Map(_)
            | ContextValue::Object(_) => false,
        }
    }
}

pub fn render(graph: &Graph, value: &Value) -> Result<String, RenderError> {
    let value = interpret(graph, value)?;
    if value.is_scalar() {
        Ok(scalar_text(&value))
    } else {
        Ok(serde_json::to_string_pretty(&to_json(&value)?)?)
    }
}

/// Map keys as text: scalars verbatim, anything else as compact JSON.
pub fn key_text(value: &ContextValue) -> Result<String, RenderError> {
    if value.is_scalar() {
        Ok(scalar_text(value))
    } else {
        Ok(serde_json::to_string(&to_json(value)?)?)
    }
}

fn scalar_text(value: &ContextValue) -> String {
    match value {
        ContextValue::Null => "null".to_string(),
        ContextValue::Bool(b) => b.to_string(),
        ContextValue::Byte(n) => n.to_string(),
        ContextValue::Short(n) => n.to_string(),
        ContextValue::Int(n) => n.to_string(),
        ContextValue::Long(n) => n.to_string(),
        ContextValue::Float(f) => java_float(*f),
        ContextValue::Double(d) => java_double(*d),
        ContextValue::Char(c) => char_of(*c).to_string(),
        ContextValue::Integer(n) => n.to_string(),
        ContextValue::Decimal { unscaled, scale } => java_big_decimal(unscaled, *scale),
        ContextValue::Str(s) | ContextValue::Enum(s) | ContextValue::Text(s) => s.clone(),
        ContextValue::Time(t) => t.to_string(),
        ContextValue::EpochMillis(ms) => ms.to_string(),
        ContextValue::List(_) | ContextValue::Map(_) | ContextValue::Object(_) => String::new(),
    }
}

fn char_of(unit: u16) -> char {
    char::from_u32(unit as u32).unwrap_or(char::REPLACEMENT_CHARACTER)
}

fn json_number(value: f64) -> Json {
    Number::from_f64(value)
        .map(Json::Number)
        .unwrap_or_else(|| Json::String(java_double(value)))
}

pub fn to_json(value: &ContextValue) -> Result<Json, RenderError> {
    Ok(match value {
        ContextValue::Null => Json::Null,
        ContextValue::Bool(b) => Json::Bool(*b),
        ContextValue::Byte(n) => Json::from(*n),
        ContextValue::Short(n) => Json::from(*n),
        ContextValue::Int(n) => Json::from(*n),
        ContextValue::Long(n) => Json::from(*n),
        ContextValue::EpochMillis(ms) => Json::from(*ms),
        // through the shortest f32 text so 0.1f stays 0.1
        ContextValue::Float(f) => match f.to_string().parse::<f64>() {
            Ok(d) if f.is_finite() => json_number(d),
            _ => Json::String(java_float(*f)),
        },
        ContextValue::Double(d) => json_number(*d),
        ContextValue::Char(c) => Json::String(char_of(*c).to_string()),
        // exact text once past the range JSON numbers hold without loss
        ContextValue::Integer(n) => match (i64::try_from(n), u64::try_from(n)) {
            (Ok(v), _) => Json::from(v),
            (_, Ok(v)) => Json::from(v),
            _ => Json::String(n.to_string()),
        },
        ContextValue::Decimal { unscaled, scale } => {
            Json::String(java_big_decimal(unscaled, *scale))
        }
        ContextValue::Str(s) | ContextValue::Enum(s) | ContextValue::Text(s) => {
            Json::String(s.clone())
        }
        ContextValue::Time(t) => Json::String(t.to_string()),
        ContextValue::List(items) => {
            Json::Array(items.iter().map(to_json).collect::<Result<_, _>>()?)
        }
        ContextValue::Map(entries) => {
            let mut map = Map::with_capacity(entries.len());
            for (k, v) in entries {
                map.insert(key_text(k)?, to_json(v)?);
            }
            Json::Object(map)
        }
        ContextValue::Object(fields) => {
            let mut map = Map::with_capacity(fields.len());
            for (k, v) in fields {
                map.insert(k.clone(), to_json(v)?);
            }
            Json::Object(map)
        }
    })
}

/// `Double.toString`: plain notation for magnitudes in `[1e-3, 1e7)`,
/// `d.dddE±n` outside it, always at least one fraction digit.
pub fn java_double(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0.0" } else { "0.0" }.to_string();
    }
    if (1e-3..1e7).contains(&value.abs()) {
        with_fraction(value.to_string())
    } else {
        scientific(&format!("{value:e}"))
    }
}

/// `Float.toString`, same layout as [`java_double`] on the shortest f32 digits.
pub fn java_float(value: f32) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0.0" } else { "0.0" }.to_string();
    }
    if (1e-3..1e7).contains(&value.abs()) {
        with_fraction(value.to_string())
    } else {
        scientific(&format!("{value:e}"))
    }
}

/// `BigDecimal.toString`: plain notation unless the scale is negative or
/// the adjusted exponent is below -6.
pub fn java_big_decimal(unscaled: &BigInt, scale: i32) -> String {
    let sign = if unscaled.sign() == Sign::Minus { "-" } else { "" };
    let digits = unscaled.magnitude().to_string();
    if scale == 0 {
        return format!("{sign}{digits}");
    }

    let adjusted = digits.len() as i64 - 1 - i64::from(scale);
    if scale > 0 && adjusted >= -6 {
        let scale = scale as usize;
        return if digits.len() > scale {
            let (whole, fraction) = digits.split_at(digits.len() - scale);
            format!("{sign}{whole}.{fraction}")
        } else {
            format!("{sign}0.{}{digits}", "0".repeat(scale - digits.len()))
        };
    }

    let (first, rest) = digits.split_at(1);
    let point = if rest.is_empty() { "" } else { "." };
    let plus = if adjusted > 0 { "+" } else { "" };
    format!("{sign}{first}{point}{rest}E{plus}{adjusted}")
}

fn with_fraction(s: String) -> String {
    if s.contains('.') {
        s
    } else {
        format!("{s}.0")
    }
}

fn scientific(s: &str) -> String {
    match s.split_once('e') {
        Some((mantissa, exponent)) => {
            format!("{}E{exponent}", with_fraction(mantissa.to_string()))
        }
        None => s.to_string(),
    }
}
