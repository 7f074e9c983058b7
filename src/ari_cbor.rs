//! The compact binary (CBOR) form of ARIs.
//!
//! Items are read positionally: an array of three or more elements is an
//! object reference, an array of two is a typed literal, anything else an
//! untyped literal.

use tracing::{debug, warn};

use crate::ari::{
    Ari, AriMap, ExecutionSet, IdSeg, Identity, LiteralAri, ReferenceAri, Report, ReportSet, StructType, Table,
    Value, is_valid_nonce, td_from_micros, td_to_micros, tp_from_micros, tp_to_micros,
};
use crate::cbor::{self, Item};
use crate::error::{AriError, Result};

/// CBOR to [`Ari`] decoder.
#[derive(Debug, Default, Clone)]
pub struct Decoder {}

impl Decoder {
    pub fn new() -> Self {
        Self {}
    }

    pub fn decode(&self, data: &[u8]) -> Result<Ari> {
        if data.is_empty() {
            return Err(AriError::parse("no CBOR data to decode"));
        }
        let (item, used) = cbor::from_slice(data)?;
        if used < data.len() {
            warn!("ignoring {} octets after the ARI item", data.len() - used);
        }
        debug!("decoded CBOR item {}", item);
        item_to_ari(item)
    }
}

fn item_to_ari(item: Item) -> Result<Ari> {
    match item {
        Item::Array(items) if items.len() >= 3 => reference(items).map(Ari::Reference),
        Item::Array(items) if items.len() == 2 => {
            let mut items = items.into_iter();
            let (Some(code), Some(val)) = (items.next(), items.next()) else {
                return Err(AriError::parse("typed literal needs a type and a value"));
            };
            typed_literal(code, val).map(Ari::Literal)
        }
        Item::Array(_) => Err(AriError::parse("an array of fewer than two items is not an ARI")),
        Item::Map(_) => Err(AriError::parse("an untyped map is not an ARI")),
        other => primitive(other).map(|val| Ari::Literal(LiteralAri::new(val))),
    }
}

fn primitive(item: Item) -> Result<Value> {
    let val = match item {
        Item::Undefined => Value::Undefined,
        Item::Null => Value::Null,
        Item::Bool(val) => Value::Bool(val),
        Item::Int(val) => Value::Int(val),
        Item::Float(val) => Value::Float(val),
        Item::Text(val) => Value::Text(val),
        Item::Bytes(val) => Value::Bytes(val),
        other => return Err(AriError::parse(format!("not a primitive ARI value: {other}"))),
    };
    Ok(val)
}

fn code_of(item: &Item) -> Result<StructType> {
    match item {
        Item::Int(code) => i64::try_from(*code)
            .ok()
            .and_then(StructType::from_code)
            .ok_or_else(|| AriError::parse(format!("unknown struct type code {code}"))),
        other => Err(AriError::parse(format!("struct type must be an integer, not {other}"))),
    }
}

/// A leading organization shifts the path by one, which shows as a
/// non-array fourth item.
fn reference(items: Vec<Item>) -> Result<ReferenceAri> {
    let has_org = matches!(items.get(3), Some(item) if !matches!(item, Item::Array(_)));
    if items.len() > if has_org { 5 } else { 4 } {
        return Err(AriError::parse("object reference has too many items"));
    }
    let mut items = items.into_iter();
    let org = if has_org { items.next() } else { None };
    let (Some(ns), Some(typ), Some(obj)) = (items.next(), items.next(), items.next()) else {
        return Err(AriError::parse("object reference is too short"));
    };
    let type_id = code_of(&typ)?;
    if !type_id.is_object() {
        return Err(AriError::parse(format!("{type_id} is a literal type, not an object type")));
    }
    let obj_id = match obj {
        Item::Int(id) => IdSeg::Int(i64::try_from(id).map_err(|_| AriError::parse("object enumeration is out of range"))?),
        Item::Text(name) => IdSeg::Text(name),
        other => return Err(AriError::parse(format!("invalid object id {other}"))),
    };
    let mut ident = Identity::relative(type_id, obj_id);
    match ns {
        Item::Null => {}
        Item::Int(id) => {
            ident.ns_id = Some(IdSeg::Int(
                i64::try_from(id).map_err(|_| AriError::parse("namespace enumeration is out of range"))?,
            ))
        }
        Item::Text(text) => match text.split_once('@') {
            Some((ns, rev)) => {
                ident.ns_id = Some(IdSeg::Text(ns.to_string()));
                ident.ns_rev = Some(rev.to_string());
            }
            None => ident.ns_id = Some(IdSeg::Text(text)),
        },
        other => return Err(AriError::parse(format!("invalid namespace {other}"))),
    }
    ident.org_id = match org {
        None => None,
        Some(_) if ident.ns_id.is_none() => {
            return Err(AriError::parse("a relative reference cannot carry an organization"));
        }
        Some(Item::Int(id)) => Some(IdSeg::Int(
            i64::try_from(id).map_err(|_| AriError::parse("organization enumeration is out of range"))?,
        )),
        Some(Item::Text(name)) => Some(IdSeg::Text(name)),
        Some(other) => return Err(AriError::parse(format!("invalid organization {other}"))),
    };
    let params = match items.next() {
        None => None,
        Some(Item::Array(params)) => Some(params.into_iter().map(item_to_ari).collect::<Result<Vec<_>>>()?),
        Some(other) => return Err(AriError::parse(format!("parameters must be an array, not {other}"))),
    };
    Ok(ReferenceAri { ident, params })
}

/// Microseconds from either integer seconds or a `[mantissa, exponent]`
/// decimal fraction.
fn decfrac_micros(item: Item) -> Result<i128> {
    let (mantissa, exp) = match item {
        Item::Int(secs) => (secs, 0),
        Item::Array(parts) => match parts.as_slice() {
            [Item::Int(mantissa), Item::Int(exp)] => (*mantissa, *exp),
            _ => return Err(AriError::parse("decimal fraction must be [mantissa, exponent]")),
        },
        other => return Err(AriError::parse(format!("invalid time value {other}"))),
    };
    let shift = exp + 6;
    let scale = 10i128
        .checked_pow(u32::try_from(shift.abs()).map_err(|_| AriError::parse("time exponent is out of range"))?)
        .ok_or_else(|| AriError::parse("time exponent is out of range"))?;
    let micros = if shift >= 0 {
        mantissa.checked_mul(scale)
    } else {
        Some(mantissa / scale)
    };
    micros.ok_or_else(|| AriError::parse("time value is out of range"))
}

fn nonce(item: Item) -> Result<LiteralAri> {
    let nonce = LiteralAri::new(primitive(item)?);
    if !is_valid_nonce(&nonce) {
        return Err(AriError::parse("a nonce must be null, an unsigned integer or a byte string"));
    }
    Ok(nonce)
}

fn array_of(item: Item, what: &str) -> Result<Vec<Item>> {
    match item {
        Item::Array(items) => Ok(items),
        other => Err(AriError::parse(format!("{what} must be an array, not {other}"))),
    }
}

fn typed_literal(code: Item, item: Item) -> Result<LiteralAri> {
    let type_id = code_of(&code)?;
    if !type_id.is_literal() {
        return Err(AriError::parse(format!("{type_id} is not a literal type")));
    }
    use StructType as S;
    let value = match type_id {
        S::Tp => Value::Tp(
            tp_from_micros(decfrac_micros(item)?).ok_or_else(|| AriError::parse("time point is out of range"))?,
        ),
        S::Td => Value::Td(
            td_from_micros(decfrac_micros(item)?).ok_or_else(|| AriError::parse("time delta is out of range"))?,
        ),
        S::Ac => Value::List(
            array_of(item, "AC")?
                .into_iter()
                .map(item_to_ari)
                .collect::<Result<Vec<_>>>()?,
        ),
        S::Am => {
            let Item::Map(entries) = item else {
                return Err(AriError::parse("AM must be a map"));
            };
            let mut map = AriMap::with_capacity(entries.len());
            for (key, val) in entries {
                let key = item_to_ari(key)?;
                if !matches!(&key, Ari::Literal(lit) if lit.type_id.is_none()) {
                    return Err(AriError::parse("AM keys must be untyped literals"));
                }
                map.insert(key, item_to_ari(val)?);
            }
            Value::Map(map)
        }
        S::Tbl => {
            let mut items = array_of(item, "TBL")?.into_iter();
            let ncols = match items.next() {
                Some(Item::Int(ncols)) => {
                    usize::try_from(ncols).map_err(|_| AriError::parse("invalid table column count"))?
                }
                _ => return Err(AriError::parse("table must start with its column count")),
            };
            let cells = items.map(item_to_ari).collect::<Result<Vec<_>>>()?;
            Value::Table(Table::from_cells(ncols, cells).map_err(AriError::invalid)?)
        }
        S::ExecSet => {
            let mut items = array_of(item, "EXECSET")?.into_iter();
            let nonce = nonce(items.next().ok_or_else(|| AriError::parse("execution set needs a nonce"))?)?;
            let targets = items.map(item_to_ari).collect::<Result<Vec<_>>>()?;
            Value::ExecSet(Box::new(ExecutionSet { nonce, targets }))
        }
        S::RptSet => {
            let mut items = array_of(item, "RPTSET")?.into_iter();
            let (Some(nonce_item), Some(ref_item)) = (items.next(), items.next()) else {
                return Err(AriError::parse("report set needs a nonce and a reference time"));
            };
            let nonce = nonce(nonce_item)?;
            let ref_time = tp_from_micros(decfrac_micros(ref_item)?)
                .ok_or_else(|| AriError::parse("reference time is out of range"))?;
            let reports = items.map(report).collect::<Result<Vec<_>>>()?;
            Value::RptSet(Box::new(ReportSet { nonce, ref_time, reports }))
        }
        _ => primitive(item)?,
    };
    LiteralAri::coerce(value, type_id).map_err(AriError::invalid)
}

fn report(item: Item) -> Result<Report> {
    let mut items = array_of(item, "report")?.into_iter();
    let (Some(rel), Some(source)) = (items.next(), items.next()) else {
        return Err(AriError::parse("report needs a relative time and a source"));
    };
    let rel_time =
        td_from_micros(decfrac_micros(rel)?).ok_or_else(|| AriError::parse("report time is out of range"))?;
    let source = item_to_ari(source)?;
    let items = items.map(item_to_ari).collect::<Result<Vec<_>>>()?;
    Ok(Report { rel_time, source, items })
}

/// [`Ari`] to CBOR encoder.
#[derive(Debug, Default, Clone)]
pub struct Encoder {}

impl Encoder {
    pub fn new() -> Self {
        Self {}
    }

    pub fn encode(&self, ari: &Ari) -> Result<Vec<u8>> {
        let item = ari_to_item(ari)?;
        debug!("encoding CBOR item {}", item);
        cbor::to_vec(&item)
    }
}

fn ari_to_item(ari: &Ari) -> Result<Item> {
    match ari {
        Ari::Literal(lit) => literal_item(lit),
        Ari::Reference(objref) => reference_item(objref),
    }
}

fn reference_item(objref: &ReferenceAri) -> Result<Item> {
    let ident = &objref.ident;
    let ns = match (&ident.ns_id, &ident.ns_rev) {
        (None, None) if ident.org_id.is_none() => Item::Null,
        (None, _) => return Err(AriError::parse("a relative reference cannot carry an organization or revision")),
        (Some(IdSeg::Int(id)), None) => Item::Int((*id).into()),
        (Some(ns), Some(rev)) => Item::Text(format!("{ns}@{rev}")),
        (Some(IdSeg::Text(name)), None) => Item::Text(name.clone()),
    };
    let obj = match &ident.obj_id {
        IdSeg::Int(id) => Item::Int((*id).into()),
        IdSeg::Text(name) => Item::Text(name.clone()),
    };
    let mut items = Vec::with_capacity(5);
    match &ident.org_id {
        Some(IdSeg::Int(id)) => items.push(Item::Int((*id).into())),
        Some(IdSeg::Text(name)) => items.push(Item::Text(name.clone())),
        None => {}
    }
    items.extend([ns, Item::Int(ident.type_id.code().into()), obj]);
    if let Some(params) = &objref.params {
        items.push(Item::Array(params.iter().map(ari_to_item).collect::<Result<Vec<_>>>()?));
    }
    Ok(Item::Array(items))
}

/// Strip trailing decimal zeros of a microsecond count.
fn decfrac_item(micros: i128) -> Item {
    let mut mantissa = micros;
    let mut exp = -6i128;
    while mantissa != 0 && exp < 0 && mantissa % 10 == 0 {
        mantissa /= 10;
        exp += 1;
    }
    if mantissa == 0 || exp == 0 {
        Item::Int(mantissa)
    } else {
        Item::Array(vec![Item::Int(mantissa), Item::Int(exp)])
    }
}

fn primitive_item(value: &Value) -> Result<Item> {
    let item = match value {
        Value::Undefined => Item::Undefined,
        Value::Null => Item::Null,
        Value::Bool(val) => Item::Bool(*val),
        Value::Int(val) => Item::Int(*val),
        Value::Float(val) => Item::Float(*val),
        Value::Text(val) => Item::Text(val.clone()),
        Value::Bytes(val) => Item::Bytes(val.clone()),
        other => return Err(AriError::parse(format!("a {} value needs a type to be encoded", other.kind()))),
    };
    Ok(item)
}

fn nonce_item(nonce: &LiteralAri) -> Result<Item> {
    if !is_valid_nonce(nonce) {
        return Err(AriError::parse("a nonce must be an untyped null, unsigned integer or byte string"));
    }
    primitive_item(&nonce.value)
}

fn items_of(items: &[Ari]) -> Result<Vec<Item>> {
    items.iter().map(ari_to_item).collect()
}

fn literal_item(lit: &LiteralAri) -> Result<Item> {
    let Some(type_id) = lit.type_id else {
        return primitive_item(&lit.value);
    };
    let value = match &lit.value {
        Value::AriType(typ) => Item::Int(typ.code().into()),
        Value::Tp(tp) => decfrac_item(tp_to_micros(tp)),
        Value::Td(td) => decfrac_item(td_to_micros(td)),
        Value::List(items) => Item::Array(items_of(items)?),
        Value::Map(map) => Item::Map(
            map.iter()
                .map(|(key, val)| Ok((ari_to_item(key)?, ari_to_item(val)?)))
                .collect::<Result<Vec<_>>>()?,
        ),
        Value::Table(table) => {
            let mut items = Vec::with_capacity(table.cells().len() + 1);
            items.push(Item::Int(table.ncols() as i128));
            items.extend(items_of(table.cells())?);
            Item::Array(items)
        }
        Value::ExecSet(execset) => {
            let mut items = vec![nonce_item(&execset.nonce)?];
            items.extend(items_of(&execset.targets)?);
            Item::Array(items)
        }
        Value::RptSet(rptset) => {
            let mut items = vec![nonce_item(&rptset.nonce)?, decfrac_item(tp_to_micros(&rptset.ref_time))];
            for rpt in &rptset.reports {
                let mut rpt_items = vec![decfrac_item(td_to_micros(&rpt.rel_time)), ari_to_item(&rpt.source)?];
                rpt_items.extend(items_of(&rpt.items)?);
                items.push(Item::Array(rpt_items));
            }
            Item::Array(items)
        }
        other => primitive_item(other)?,
    };
    Ok(Item::Array(vec![Item::Int(type_id.code().into()), value]))
}
