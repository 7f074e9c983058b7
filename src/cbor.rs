//! A small CBOR item tree on top of the `ciborium-ll` header codec.
//!
//! The ARI binary form relies on distinctions a serde data model blurs
//! (undefined versus null, exact integer widths, shortest float forms),
//! so items are read and written header by header.

use std::fmt;

use ciborium_ll::{simple, Decoder, Encoder, Header};

use crate::error::{AriError, Result};

// nesting limit for untrusted input
const MAX_DEPTH: usize = 256;
// never trust a declared length for preallocation
const MAX_PREALLOC: usize = 1024;

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Undefined,
    Null,
    Bool(bool),
    /// Covers the full CBOR range from -2^64 to 2^64-1.
    Int(i128),
    Float(f64),
    Bytes(Vec<u8>),
    Text(String),
    Array(Vec<Item>),
    Map(Vec<(Item, Item)>),
    Tag(u64, Box<Item>),
    Simple(u8),
}

fn cbor_err<E: fmt::Debug>(err: E) -> AriError {
    AriError::parse(format!("invalid CBOR: {err:?}"))
}

/// Decode one item from the front of `data`, returning it with the number
/// of octets it used.
pub fn from_slice(data: &[u8]) -> Result<(Item, usize)> {
    let mut decoder = Decoder::from(data);
    let item = read_item(&mut decoder, 0)?;
    Ok((item, decoder.offset()))
}

fn read_item(decoder: &mut Decoder<&[u8]>, depth: usize) -> Result<Item> {
    if depth > MAX_DEPTH {
        return Err(AriError::parse("CBOR nesting is too deep"));
    }
    let header = decoder.pull().map_err(cbor_err)?;
    let item = match header {
        Header::Positive(val) => Item::Int(i128::from(val)),
        Header::Negative(val) => Item::Int(-1 - i128::from(val)),
        Header::Float(val) => Item::Float(val),
        Header::Simple(simple::FALSE) => Item::Bool(false),
        Header::Simple(simple::TRUE) => Item::Bool(true),
        Header::Simple(simple::NULL) => Item::Null,
        Header::Simple(simple::UNDEFINED) => Item::Undefined,
        Header::Simple(other) => Item::Simple(other),
        Header::Bytes(len) => {
            let mut buffer = Vec::new();
            let mut scratch = [0u8; 1024];
            let mut segments = decoder.bytes(len);
            while let Some(mut segment) = segments.pull().map_err(cbor_err)? {
                while let Some(chunk) = segment.pull(&mut scratch).map_err(cbor_err)? {
                    buffer.extend_from_slice(chunk);
                }
            }
            Item::Bytes(buffer)
        }
        Header::Text(len) => {
            let mut buffer = String::new();
            let mut scratch = [0u8; 1024];
            let mut segments = decoder.text(len);
            while let Some(mut segment) = segments.pull().map_err(cbor_err)? {
                while let Some(chunk) = segment.pull(&mut scratch).map_err(cbor_err)? {
                    buffer.push_str(chunk);
                }
            }
            Item::Text(buffer)
        }
        Header::Array(Some(len)) => {
            let mut items = Vec::with_capacity(len.min(MAX_PREALLOC));
            for _ in 0..len {
                items.push(read_item(decoder, depth + 1)?);
            }
            Item::Array(items)
        }
        Header::Array(None) => {
            let mut items = Vec::new();
            while !at_break(decoder)? {
                items.push(read_item(decoder, depth + 1)?);
            }
            Item::Array(items)
        }
        Header::Map(Some(len)) => {
            let mut entries = Vec::with_capacity(len.min(MAX_PREALLOC));
            for _ in 0..len {
                let key = read_item(decoder, depth + 1)?;
                let val = read_item(decoder, depth + 1)?;
                entries.push((key, val));
            }
            Item::Map(entries)
        }
        Header::Map(None) => {
            let mut entries = Vec::new();
            while !at_break(decoder)? {
                let key = read_item(decoder, depth + 1)?;
                let val = read_item(decoder, depth + 1)?;
                entries.push((key, val));
            }
            Item::Map(entries)
        }
        Header::Tag(tag) => Item::Tag(tag, Box::new(read_item(decoder, depth + 1)?)),
        Header::Break => return Err(AriError::parse("unexpected CBOR break")),
    };
    Ok(item)
}

// consumes a break header, or pushes back anything else
fn at_break(decoder: &mut Decoder<&[u8]>) -> Result<bool> {
    match decoder.pull().map_err(cbor_err)? {
        Header::Break => Ok(true),
        other => {
            decoder.push(other);
            Ok(false)
        }
    }
}

pub fn to_vec(item: &Item) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut encoder = Encoder::from(&mut out);
    write_item(&mut encoder, item)?;
    Ok(out)
}

fn write_item(encoder: &mut Encoder<&mut Vec<u8>>, item: &Item) -> Result<()> {
    match item {
        Item::Undefined => encoder.push(Header::Simple(simple::UNDEFINED)).map_err(cbor_err)?,
        Item::Null => encoder.push(Header::Simple(simple::NULL)).map_err(cbor_err)?,
        Item::Bool(true) => encoder.push(Header::Simple(simple::TRUE)).map_err(cbor_err)?,
        Item::Bool(false) => encoder.push(Header::Simple(simple::FALSE)).map_err(cbor_err)?,
        Item::Simple(val) => encoder.push(Header::Simple(*val)).map_err(cbor_err)?,
        Item::Int(val) => encoder.push(int_header(*val)?).map_err(cbor_err)?,
        // the header picks the shortest lossless width
        Item::Float(val) => encoder.push(Header::Float(*val)).map_err(cbor_err)?,
        Item::Bytes(val) => encoder.bytes(val, None).map_err(cbor_err)?,
        Item::Text(val) => encoder.text(val, None).map_err(cbor_err)?,
        Item::Array(items) => {
            encoder.push(Header::Array(Some(items.len()))).map_err(cbor_err)?;
            for sub in items {
                write_item(encoder, sub)?;
            }
        }
        Item::Map(entries) => {
            encoder.push(Header::Map(Some(entries.len()))).map_err(cbor_err)?;
            for (key, val) in entries {
                write_item(encoder, key)?;
                write_item(encoder, val)?;
            }
        }
        Item::Tag(tag, sub) => {
            encoder.push(Header::Tag(*tag)).map_err(cbor_err)?;
            write_item(encoder, sub)?;
        }
    }
    Ok(())
}

fn int_header(val: i128) -> Result<Header> {
    let header = if val >= 0 {
        u64::try_from(val).map(Header::Positive)
    } else {
        u64::try_from(-1 - val).map(Header::Negative)
    };
    header.map_err(|_| AriError::parse(format!("integer {val} is outside the CBOR range")))
}

/// The body of the shortest lossless CBOR float encoding, without the head octet.
pub fn float_body(val: f64) -> Result<Vec<u8>> {
    let mut encoded = to_vec(&Item::Float(val))?;
    encoded.remove(0);
    Ok(encoded)
}

/// Interpret a half, single or double precision float body.
pub fn float_from_body(body: &[u8]) -> Result<f64> {
    let head = match body.len() {
        2 => 0xF9,
        4 => 0xFA,
        8 => 0xFB,
        other => return Err(AriError::parse(format!("a float body cannot have {other} octets"))),
    };
    let mut encoded = Vec::with_capacity(body.len() + 1);
    encoded.push(head);
    encoded.extend_from_slice(body);
    match from_slice(&encoded)? {
        (Item::Float(val), _) => Ok(val),
        (other, _) => Err(AriError::parse(format!("not a float: {}", other.to_diag()))),
    }
}

/// Shortest round-trip decimal text, with an exponent outside [1e-4, 1e16).
pub fn float_repr(val: f64) -> String {
    if val.is_nan() {
        return "NaN".to_string();
    }
    if val.is_infinite() {
        return if val < 0.0 { "-Infinity" } else { "Infinity" }.to_string();
    }
    let text = format!("{val:?}");
    match text.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exp),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => text,
    }
}

impl Item {
    /// Render in CBOR diagnostic notation.
    pub fn to_diag(&self) -> String {
        match self {
            Item::Undefined => "undefined".to_string(),
            Item::Null => "null".to_string(),
            Item::Bool(val) => val.to_string(),
            Item::Int(val) => val.to_string(),
            Item::Float(val) => float_repr(*val),
            Item::Bytes(val) => format!("h'{}'", hex::encode(val)),
            Item::Text(val) => format!("\"{}\"", val.replace('\\', "\\\\").replace('"', "\\\"")),
            Item::Array(items) => {
                let parts: Vec<String> = items.iter().map(Item::to_diag).collect();
                format!("[{}]", parts.join(","))
            }
            Item::Map(entries) => {
                let parts: Vec<String> = entries
                    .iter()
                    .map(|(key, val)| format!("{}:{}", key.to_diag(), val.to_diag()))
                    .collect();
                format!("{{{}}}", parts.join(","))
            }
            Item::Tag(tag, sub) => format!("{}({})", tag, sub.to_diag()),
            Item::Simple(val) => format!("simple({val})"),
        }
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_diag())
    }
}
