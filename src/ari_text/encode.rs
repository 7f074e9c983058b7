use std::fmt::{self, Write};

use chrono::{DateTime, TimeDelta, Utc};

use super::{EncodeOptions, FloatForm, lex, quote};
use crate::ari::{
    Ari, AriMap, ExecutionSet, IdSeg, LiteralAri, ReferenceAri, ReportSet, StructType, Table, Value, is_valid_nonce,
    td_to_micros, tp_to_micros,
};
use crate::cbor::{self, float_repr};
use crate::error::{AriError, Result};

fn fmt_err(_: fmt::Error) -> AriError {
    AriError::parse("text formatting failed")
}

pub(crate) fn write_ari(buf: &mut String, ari: &Ari, options: &EncodeOptions, prefix: bool) -> Result<()> {
    if prefix {
        buf.push_str("ari:");
    }
    match ari {
        Ari::Literal(lit) => write_literal(buf, lit, options),
        Ari::Reference(objref) => write_reference(buf, objref, options),
    }
}

fn write_list(buf: &mut String, items: &[Ari], options: &EncodeOptions) -> Result<()> {
    buf.push('(');
    for (ix, item) in items.iter().enumerate() {
        if ix > 0 {
            buf.push(',');
        }
        write_ari(buf, item, options, false)?;
    }
    buf.push(')');
    Ok(())
}

fn write_map(buf: &mut String, map: &AriMap, options: &EncodeOptions) -> Result<()> {
    buf.push('(');
    for (ix, (key, val)) in map.iter().enumerate() {
        if ix > 0 {
            buf.push(',');
        }
        write_ari(buf, key, options, false)?;
        buf.push('=');
        write_ari(buf, val, options, false)?;
    }
    buf.push(')');
    Ok(())
}

fn write_reference(buf: &mut String, objref: &ReferenceAri, options: &EncodeOptions) -> Result<()> {
    let ident = &objref.ident;
    match &ident.ns_id {
        Some(ns) => {
            buf.push_str("//");
            if let Some(org) = &ident.org_id {
                buf.push_str(&quote(&org.to_string()));
                buf.push('/');
            }
            buf.push_str(&quote(&ns.to_string()));
            if let Some(rev) = &ident.ns_rev {
                buf.push('@');
                buf.push_str(&quote(rev));
            }
        }
        None if ident.org_id.is_some() || ident.ns_rev.is_some() => {
            return Err(AriError::parse("a relative reference cannot carry an organization or revision"));
        }
        None => buf.push('.'),
    }
    buf.push('/');
    buf.push_str(ident.type_id.name());
    buf.push('/');
    match &ident.obj_id {
        IdSeg::Int(id) => write!(buf, "{id}").map_err(fmt_err)?,
        IdSeg::Text(name) => buf.push_str(&quote(name)),
    }
    if let Some(params) = &objref.params {
        write_list(buf, params, options)?;
    }
    Ok(())
}

fn write_literal(buf: &mut String, lit: &LiteralAri, options: &EncodeOptions) -> Result<()> {
    if let Some(typ) = lit.type_id {
        buf.push('/');
        buf.push_str(typ.name());
        buf.push('/');
    }
    match &lit.value {
        Value::List(items) => write_list(buf, items, options)?,
        Value::Map(map) => write_map(buf, map, options)?,
        Value::Table(table) => write_table(buf, table, options)?,
        Value::ExecSet(execset) => write_execset(buf, execset, options)?,
        Value::RptSet(rptset) => write_rptset(buf, rptset, options)?,
        Value::Tp(tp) => buf.push_str(&timepoint_text(tp, options)),
        Value::Td(td) => buf.push_str(&timeperiod_text(td, options)),
        Value::AriType(typ) => buf.push_str(typ.name()),
        Value::Text(text) if lit.type_id == Some(StructType::Label) => buf.push_str(&quote(text)),
        Value::Bytes(data) if lit.type_id == Some(StructType::Cbor) => write_cbor(buf, data, options)?,
        other => write_primitive(buf, other, options)?,
    }
    Ok(())
}

fn write_primitive(buf: &mut String, value: &Value, options: &EncodeOptions) -> Result<()> {
    match value {
        Value::Undefined => buf.push_str("undefined"),
        Value::Null => buf.push_str("null"),
        Value::Bool(val) => buf.push_str(if *val { "true" } else { "false" }),
        Value::Int(val) => buf.push_str(&int_text(*val, options.int_base)),
        Value::Float(val) => buf.push_str(&float_text(*val, options.float_form)?),
        Value::Text(text) => {
            if options.text_identity && lex::is_bare_text(text) {
                buf.push_str(text);
            } else {
                buf.push_str(&quote(&quoted_text(text)));
            }
        }
        Value::Bytes(data) => buf.push_str(&quote(&format!("h'{}'", hex::encode(data)))),
        other => return Err(AriError::parse(format!("cannot encode an untagged {} value", other.kind()))),
    }
    Ok(())
}

fn quoted_text(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

fn write_cbor(buf: &mut String, data: &[u8], options: &EncodeOptions) -> Result<()> {
    if options.cbor_diag {
        if let Ok((item, used)) = cbor::from_slice(data) {
            if used == data.len() {
                buf.push_str(&quote(&format!("<<{}>>", item.to_diag())));
                return Ok(());
            }
        }
    }
    buf.push_str(&quote(&format!("h'{}'", hex::encode(data))));
    Ok(())
}

fn write_table(buf: &mut String, table: &Table, options: &EncodeOptions) -> Result<()> {
    write!(buf, "c={};", table.ncols()).map_err(fmt_err)?;
    for row in table.rows() {
        write_list(buf, row, options)?;
    }
    Ok(())
}

fn write_nonce(buf: &mut String, nonce: &LiteralAri, options: &EncodeOptions) -> Result<()> {
    if !is_valid_nonce(nonce) {
        return Err(AriError::parse("a nonce must be an untyped null, unsigned integer or byte string"));
    }
    buf.push_str("n=");
    write_literal(buf, nonce, options)?;
    buf.push(';');
    Ok(())
}

fn write_execset(buf: &mut String, execset: &ExecutionSet, options: &EncodeOptions) -> Result<()> {
    write_nonce(buf, &execset.nonce, options)?;
    write_list(buf, &execset.targets, options)
}

fn write_rptset(buf: &mut String, rptset: &ReportSet, options: &EncodeOptions) -> Result<()> {
    write_nonce(buf, &rptset.nonce, options)?;
    buf.push_str("r=");
    buf.push_str(&timepoint_text(&rptset.ref_time, options));
    buf.push(';');
    for rpt in &rptset.reports {
        buf.push_str("(t=");
        buf.push_str(&timeperiod_text(&rpt.rel_time, options));
        buf.push_str(";s=");
        write_ari(buf, &rpt.source, options, false)?;
        buf.push(';');
        write_list(buf, &rpt.items, options)?;
        buf.push(')');
    }
    Ok(())
}

fn int_text(val: i128, base: u32) -> String {
    let sign = if val < 0 { "-" } else { "" };
    let magnitude = val.unsigned_abs();
    match base {
        2 => format!("{sign}0b{magnitude:b}"),
        16 => format!("{sign}0x{magnitude:x}"),
        _ => val.to_string(),
    }
}

fn fix_exponent(text: String) -> String {
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

fn float_text(val: f64, form: FloatForm) -> Result<String> {
    if form == FloatForm::RawHex {
        return Ok(format!("0fx{}", hex::encode(cbor::float_body(val)?)));
    }
    if !val.is_finite() || form == FloatForm::General {
        return Ok(float_repr(val));
    }
    Ok(match form {
        FloatForm::Fixed => format!("{val:.6}"),
        _ => fix_exponent(format!("{val:.6e}")),
    })
}

/// Seconds with six decimals, exact in microseconds.
fn seconds_text(micros: i128) -> String {
    let sign = if micros < 0 { "-" } else { "" };
    let magnitude = micros.unsigned_abs();
    format!("{sign}{}.{:06}", magnitude / 1_000_000, magnitude % 1_000_000)
}

fn timepoint_text(tp: &DateTime<Utc>, options: &EncodeOptions) -> String {
    if !options.time_text {
        return seconds_text(tp_to_micros(tp));
    }
    let micros = tp.timestamp_subsec_micros();
    let frac = if micros > 0 { format!(".{micros:06}") } else { String::new() };
    format!("{}{}Z", tp.format("%Y%m%dT%H%M%S"), frac)
}

fn timeperiod_text(td: &TimeDelta, options: &EncodeOptions) -> String {
    let micros = td_to_micros(td);
    if !options.time_text {
        return seconds_text(micros);
    }
    let sign = if micros < 0 { "-" } else { "" };
    let magnitude = micros.unsigned_abs();
    let mut usec = magnitude % 1_000_000;
    let total_secs = magnitude / 1_000_000;
    let days = total_secs / 86_400;
    let hours = total_secs % 86_400 / 3_600;
    let minutes = total_secs % 3_600 / 60;
    let secs = total_secs % 60;

    let mut text = format!("{sign}P");
    if days > 0 {
        text.push_str(&format!("{days}D"));
    }
    text.push('T');
    if hours > 0 {
        text.push_str(&format!("{hours}H"));
    }
    if minutes > 0 {
        text.push_str(&format!("{minutes}M"));
    }
    if usec > 0 {
        let mut width = 6;
        while usec % 10 == 0 {
            usec /= 10;
            width -= 1;
        }
        text.push_str(&format!("{secs}.{usec:0width$}S"));
    } else if secs > 0 {
        text.push_str(&format!("{secs}S"));
    }
    text
}

impl fmt::Display for Ari {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = String::new();
        write_ari(&mut buf, self, &EncodeOptions::default(), true).map_err(|_| fmt::Error)?;
        f.write_str(&buf)
    }
}
