//! Classification of single unquoted text segments into values.
//!
//! The grammar only splits the text form into segments; what a segment
//! means (a number, a quoted string, a time) is decided here by ordered
//! regular expression matchers.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bigdecimal::{BigDecimal, ToPrimitive};
use chrono::{NaiveDate, TimeZone, Utc};
use data_encoding::BASE32_NOPAD;
use lazy_static::lazy_static;
use regex::Regex;
use std::str::FromStr;

use crate::ari::{IdSeg, StructType, Value, td_from_micros, tp_from_micros, tp_to_micros};
use crate::cbor;
use crate::error::{AriError, Result};

lazy_static! {
    static ref INTEGER: Regex = Regex::new(r"^([+-])?(0[bB][01]+|0[xX][0-9a-fA-F]+|\d+)$").unwrap();
    static ref DECIMAL: Regex =
        Regex::new(r"^[+-]?(\d+(\.\d*)?[eE][+-]?\d+|\d*\.\d+([eE][+-]?\d+)?|\d+\.\d*|Infinity)$|^NaN$").unwrap();
    static ref FLOAT_HEX: Regex = Regex::new(r"^([+-])?0fx([0-9a-fA-F]+)$").unwrap();
    static ref DECFRAC: Regex = Regex::new(r"^[+-]?(\d+\.\d*|\d*\.\d+)$").unwrap();
    static ref TEXT: Regex = Regex::new(r#"(?s)^"((?:[^"\\]|\\.)*)"$"#).unwrap();
    static ref BYTES: Regex = Regex::new(r"(?s)^(h|b32|h32|b64)?'((?:[^'\\]|\\.)*)'$").unwrap();
    static ref IDENTITY: Regex = Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_\-\.]*$").unwrap();
    static ref NAMESPACE: Regex = Regex::new(r"^!?[a-zA-Z_][a-zA-Z0-9_\-\.]*$").unwrap();
    static ref TIMEPOINT: Regex =
        Regex::new(r"^(\d{4})-?(\d{2})-?(\d{2})T(\d{2}):?(\d{2}):?(\d{2})(?:\.(\d{1,6}))?Z$").unwrap();
    static ref TIMEPERIOD: Regex =
        Regex::new(r"^([+-])?P(?:(\d+)D)?T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)(?:\.(\d{1,6}))?S)?$").unwrap();
}

const MICROS: i128 = 1_000_000;

/// Classify a segment with no type tag, in fixed priority order.
pub fn primitive(text: &str) -> Result<Value> {
    if let Some(val) = keyword(text) {
        return Ok(val);
    }
    if INTEGER.is_match(text) {
        return integer(text).map(Value::Int);
    }
    if DECIMAL.is_match(text) || FLOAT_HEX.is_match(text) {
        return float(text).map(Value::Float);
    }
    if TEXT.is_match(text) {
        return quoted_text(text).map(Value::Text);
    }
    if BYTES.is_match(text) {
        return quoted_bytes(text).map(Value::Bytes);
    }
    if IDENTITY.is_match(text) {
        return Ok(Value::Text(text.to_string()));
    }
    Err(AriError::parse(format!("no possible type matched text: {text}")))
}

fn keyword(text: &str) -> Option<Value> {
    match text {
        "undefined" => Some(Value::Undefined),
        "null" => Some(Value::Null),
        "true" => Some(Value::Bool(true)),
        "false" => Some(Value::Bool(false)),
        _ => None,
    }
}

/// True when bare identity text would be read back as the same text.
pub fn is_bare_text(text: &str) -> bool {
    IDENTITY.is_match(text)
        && keyword(text).is_none()
        && !INTEGER.is_match(text)
        && !DECIMAL.is_match(text)
        && !FLOAT_HEX.is_match(text)
}

pub fn is_identity(text: &str) -> bool {
    IDENTITY.is_match(text)
}

/// Decimal, binary or hexadecimal integer text, limited to the CBOR range.
pub fn integer(text: &str) -> Result<i128> {
    let caps = INTEGER
        .captures(text)
        .ok_or_else(|| AriError::parse(format!("not an integer: {text}")))?;
    let digits = &caps[2];
    let magnitude = match digits.get(..2) {
        Some("0b" | "0B") => i128::from_str_radix(&digits[2..], 2),
        Some("0x" | "0X") => i128::from_str_radix(&digits[2..], 16),
        _ => digits.parse::<i128>(),
    }
    .map_err(|err| AriError::parse(format!("bad integer {text}: {err}")))?;
    let val = if caps.get(1).is_some_and(|sign| sign.as_str() == "-") { -magnitude } else { magnitude };
    if val < -(1i128 << 64) || val > u64::MAX as i128 {
        return Err(AriError::parse(format!("integer {text} is out of range")));
    }
    Ok(val)
}

pub fn float(text: &str) -> Result<f64> {
    if let Some(caps) = FLOAT_HEX.captures(text) {
        let body = hex::decode(&caps[2]).map_err(|err| AriError::parse(format!("bad float hex {text}: {err}")))?;
        let val = cbor::float_from_body(&body)?;
        return Ok(if caps.get(1).is_some_and(|sign| sign.as_str() == "-") { -val } else { val });
    }
    match text {
        "NaN" => return Ok(f64::NAN),
        "Infinity" | "+Infinity" => return Ok(f64::INFINITY),
        "-Infinity" => return Ok(f64::NEG_INFINITY),
        _ => {}
    }
    if !DECIMAL.is_match(text) {
        return Err(AriError::parse(format!("not a float: {text}")));
    }
    text.parse::<f64>()
        .map_err(|err| AriError::parse(format!("bad float {text}: {err}")))
}

fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

pub fn quoted_text(text: &str) -> Result<String> {
    let caps = TEXT
        .captures(text)
        .ok_or_else(|| AriError::parse(format!("not a quoted text string: {text}")))?;
    Ok(unescape(&caps[1]))
}

pub fn quoted_bytes(text: &str) -> Result<Vec<u8>> {
    let caps = BYTES
        .captures(text)
        .ok_or_else(|| AriError::parse(format!("not a quoted byte string: {text}")))?;
    let body = unescape(&caps[2]);
    match caps.get(1).map(|enc| enc.as_str()) {
        None => Ok(body.into_bytes()),
        Some("h") => {
            let compact: String = body.chars().filter(|ch| !ch.is_whitespace()).collect();
            hex::decode(compact).map_err(|err| AriError::parse(format!("bad hex byte string: {err}")))
        }
        Some("b64") => {
            let mut padded = body.trim_end_matches('=').to_string();
            while padded.len() % 4 != 0 {
                padded.push('=');
            }
            STANDARD
                .decode(padded)
                .map_err(|err| AriError::parse(format!("bad base64 byte string: {err}")))
        }
        Some("b32") => BASE32_NOPAD
            .decode(body.trim_end_matches('=').to_ascii_uppercase().as_bytes())
            .map_err(|err| AriError::parse(format!("bad base32 byte string: {err}"))),
        Some(other) => Err(AriError::parse(format!("unsupported byte string encoding: {other}"))),
    }
}

/// Decimal fraction seconds as exact microseconds.
fn decfrac_micros(text: &str) -> Result<i128> {
    let secs = BigDecimal::from_str(text).map_err(|err| AriError::parse(format!("bad decimal {text}: {err}")))?;
    (secs * BigDecimal::from(1_000_000))
        .round(0)
        .to_i128()
        .ok_or_else(|| AriError::parse(format!("decimal {text} is out of range")))
}

fn fraction_micros(frac: Option<regex::Match<'_>>) -> i128 {
    frac.map(|digits| format!("{:0<6}", digits.as_str()))
        .and_then(|padded| padded.parse::<i128>().ok())
        .unwrap_or(0)
}

fn capture_num(caps: &regex::Captures<'_>, ix: usize) -> Result<i128> {
    match caps.get(ix) {
        Some(digits) => digits
            .as_str()
            .parse::<i128>()
            .map_err(|err| AriError::parse(format!("bad number {}: {err}", digits.as_str()))),
        None => Ok(0),
    }
}

/// Microseconds since the DTN epoch from a UTC timestamp, decimal seconds
/// or integer seconds.
pub fn timepoint_micros(text: &str) -> Result<i128> {
    if let Some(caps) = TIMEPOINT.captures(text) {
        let year = capture_num(&caps, 1)? as i32;
        let month = capture_num(&caps, 2)? as u32;
        let day = capture_num(&caps, 3)? as u32;
        let hour = capture_num(&caps, 4)? as u32;
        let minute = capture_num(&caps, 5)? as u32;
        let second = capture_num(&caps, 6)? as u32;
        let micro = fraction_micros(caps.get(7)) as u32;
        let naive = NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|date| date.and_hms_micro_opt(hour, minute, second, micro))
            .ok_or_else(|| AriError::parse(format!("invalid time point: {text}")))?;
        return Ok(tp_to_micros(&Utc.from_utc_datetime(&naive)));
    }
    seconds_micros(text)
}

pub fn timeperiod_micros(text: &str) -> Result<i128> {
    if let Some(caps) = TIMEPERIOD.captures(text) {
        let days = capture_num(&caps, 2)?;
        let hours = capture_num(&caps, 3)?;
        let minutes = capture_num(&caps, 4)?;
        let seconds = capture_num(&caps, 5)?;
        let total = days
            .checked_mul(24)
            .and_then(|val| val.checked_add(hours)?.checked_mul(60))
            .and_then(|val| val.checked_add(minutes)?.checked_mul(60))
            .and_then(|val| val.checked_add(seconds)?.checked_mul(MICROS))
            .and_then(|val| val.checked_add(fraction_micros(caps.get(6))))
            .ok_or_else(|| AriError::parse(format!("time period {text} is out of range")))?;
        let negative = caps.get(1).is_some_and(|sign| sign.as_str() == "-");
        return Ok(if negative { -total } else { total });
    }
    seconds_micros(text)
}

fn seconds_micros(text: &str) -> Result<i128> {
    if DECFRAC.is_match(text) {
        return decfrac_micros(text);
    }
    if INTEGER.is_match(text) {
        return integer(text)?
            .checked_mul(MICROS)
            .ok_or_else(|| AriError::parse(format!("seconds {text} are out of range")));
    }
    Err(AriError::parse(format!("not a time value: {text}")))
}

/// A namespace segment with an optional `@revision` suffix.
pub fn namespace(text: &str) -> Result<(IdSeg, Option<String>)> {
    let (ns, rev) = match text.split_once('@') {
        Some((ns, rev)) => (ns, Some(rev.to_string())),
        None => (text, None),
    };
    if let Ok(id) = ns.parse::<i64>() {
        return Ok((IdSeg::Int(id), rev));
    }
    if NAMESPACE.is_match(ns) {
        return Ok((IdSeg::Text(ns.to_string()), rev));
    }
    Err(AriError::parse(format!("invalid namespace: {text}")))
}

/// An object name or enumeration.
pub fn object_id(text: &str) -> Result<IdSeg> {
    if let Ok(id) = text.parse::<i64>() {
        return Ok(IdSeg::Int(id));
    }
    if IDENTITY.is_match(text) {
        return Ok(IdSeg::Text(text.to_string()));
    }
    Err(AriError::parse(format!("invalid object name: {text}")))
}

/// The value of a single-segment typed literal, before domain checks.
pub fn typed_value(typ: StructType, text: &str) -> Result<Value> {
    use StructType as S;
    let val = match typ {
        S::Null => match text {
            "null" => Value::Null,
            _ => return Err(AriError::parse(format!("not a null: {text}"))),
        },
        S::Bool => match text {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => return Err(AriError::parse(format!("not a boolean: {text}"))),
        },
        S::Byte | S::Int | S::Uint | S::Vast | S::Uvast => Value::Int(integer(text)?),
        S::Real32 | S::Real64 => {
            if INTEGER.is_match(text) {
                Value::Int(integer(text)?)
            } else {
                Value::Float(float(text)?)
            }
        }
        S::TextStr => {
            if TEXT.is_match(text) {
                Value::Text(quoted_text(text)?)
            } else if IDENTITY.is_match(text) {
                Value::Text(text.to_string())
            } else {
                return Err(AriError::parse(format!("not a text string: {text}")));
            }
        }
        S::ByteStr => Value::Bytes(quoted_bytes(text)?),
        S::Label => {
            if IDENTITY.is_match(text) {
                Value::Text(text.to_string())
            } else {
                return Err(AriError::parse(format!("not a label: {text}")));
            }
        }
        S::Cbor => match text.strip_prefix("<<").and_then(|rest| rest.strip_suffix(">>")) {
            Some(diag) => Value::Bytes(cbor::to_vec(&super::parse::parse_diag(diag)?)?),
            None => Value::Bytes(quoted_bytes(text)?),
        },
        S::AriType => {
            let found: StructType = text.parse()?;
            Value::AriType(found)
        }
        S::Tp => Value::Tp(
            tp_from_micros(timepoint_micros(text)?)
                .ok_or_else(|| AriError::parse(format!("time point {text} is out of range")))?,
        ),
        S::Td => Value::Td(
            td_from_micros(timeperiod_micros(text)?)
                .ok_or_else(|| AriError::parse(format!("time period {text} is out of range")))?,
        ),
        other => return Err(AriError::parse(format!("{other} has no single-segment literal form"))),
    };
    Ok(val)
}
