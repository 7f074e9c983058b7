//! Assemble the pest parse tree of the text form into ARI values.

use indexmap::IndexMap;
use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;

use super::{lex, unquote};
use crate::ari::{
    Ari, AriMap, ExecutionSet, Identity, LiteralAri, ReferenceAri, Report, ReportSet, StructType, Table, Value,
    is_valid_nonce,
};
use crate::cbor::Item;
use crate::error::{AriError, Result};

#[derive(Parser)]
#[grammar = "ari_text/ari.pest"]
pub struct AriParser;

fn unexpected(pair: &Pair<'_, Rule>) -> AriError {
    AriError::parse(format!("unexpected {:?} at \"{}\"", pair.as_rule(), pair.as_str()))
}

/// Parse one complete ARI text.
pub fn parse_ari(text: &str) -> Result<Ari> {
    let top = AriParser::parse(Rule::ari, text)?
        .next()
        .ok_or_else(|| AriError::parse("empty ARI text"))?;
    for pair in top.into_inner() {
        match pair.as_rule() {
            Rule::scheme | Rule::EOI => continue,
            _ => return ssp(pair),
        }
    }
    Err(AriError::parse("empty ARI text"))
}

fn ssp(pair: Pair<'_, Rule>) -> Result<Ari> {
    match pair.as_rule() {
        Rule::objref => objref(pair).map(Ari::Reference),
        Rule::typedlit => typedlit(pair).map(Ari::Literal),
        Rule::primitive => {
            let seg = pair.into_inner().next().ok_or_else(|| AriError::parse("empty primitive"))?;
            let value = lex::primitive(&unquote(seg.as_str())?)?;
            Ok(Ari::Literal(LiteralAri::new(value)))
        }
        _ => Err(unexpected(&pair)),
    }
}

fn element(pair: Pair<'_, Rule>) -> Result<Ari> {
    for inner in pair.into_inner() {
        if inner.as_rule() != Rule::scheme {
            return ssp(inner);
        }
    }
    Err(AriError::parse("empty element"))
}

fn items(pair: Pair<'_, Rule>) -> Result<Vec<Ari>> {
    pair.into_inner().map(element).collect()
}

fn objref(pair: Pair<'_, Rule>) -> Result<ReferenceAri> {
    let mut inner = pair.into_inner();
    let path = inner.next().ok_or_else(|| AriError::parse("missing object path"))?;
    let relative = path.as_rule() == Rule::relpath;
    let segs = path
        .into_inner()
        .map(|seg| unquote(seg.as_str()).map(|text| text.into_owned()))
        .collect::<Result<Vec<String>>>()?;
    let (org, ns, typ, obj) = match (relative, segs.as_slice()) {
        (false, [org, ns, typ, obj]) => (Some(org), Some(ns), typ, obj),
        (false, [ns, typ, obj]) => (None, Some(ns), typ, obj),
        (true, [typ, obj]) => (None, None, typ, obj),
        _ => return Err(AriError::parse("malformed object path")),
    };

    let type_id: StructType = typ.parse()?;
    if !type_id.is_object() {
        return Err(AriError::parse(format!("{type_id} is not an object type")));
    }
    let mut ident = Identity::relative(type_id, lex::object_id(obj)?);
    if let Some(ns) = ns {
        let (ns_id, ns_rev) = lex::namespace(ns)?;
        ident.ns_id = Some(ns_id);
        ident.ns_rev = ns_rev;
    }
    if let Some(org) = org {
        ident.org_id = Some(lex::object_id(org)?);
    }

    let params = match inner.next() {
        Some(params) => Some(match params.into_inner().next() {
            Some(list) => items(list)?,
            None => Vec::new(),
        }),
        None => None,
    };
    Ok(ReferenceAri { ident, params })
}

/// The value of one `key=value;` pair before interpretation.
enum StructVal {
    Nested(Ari),
    Raw(String),
}

fn struct_pairs<'a>(pairs: impl Iterator<Item = Pair<'a, Rule>>) -> Result<IndexMap<String, StructVal>> {
    let mut out = IndexMap::new();
    for pair in pairs {
        let mut inner = pair.into_inner();
        let (Some(key), Some(val)) = (inner.next(), inner.next()) else {
            return Err(AriError::parse("malformed structure pair"));
        };
        let val = match val.as_rule() {
            Rule::seg => StructVal::Raw(unquote(val.as_str())?.into_owned()),
            _ => StructVal::Nested(ssp(val)?),
        };
        out.insert(unquote(key.as_str())?.to_lowercase(), val);
    }
    Ok(out)
}

fn typedlit(pair: Pair<'_, Rule>) -> Result<LiteralAri> {
    let mut inner = pair.into_inner();
    let (Some(typ), Some(body)) = (inner.next(), inner.next()) else {
        return Err(AriError::parse("malformed typed literal"));
    };
    let type_id: StructType = unquote(typ.as_str())?.parse()?;
    if !type_id.is_literal() {
        return Err(AriError::parse(format!("{type_id} is not a literal type")));
    }

    use StructType as S;
    let value = match (type_id, body.as_rule()) {
        (S::Ac, Rule::bracket) => Value::List(match body.into_inner().next() {
            None => Vec::new(),
            Some(list) if list.as_rule() == Rule::items => items(list)?,
            Some(other) => return Err(unexpected(&other)),
        }),
        (S::Am, Rule::bracket) => Value::Map(match body.into_inner().next() {
            None => AriMap::new(),
            Some(list) if list.as_rule() == Rule::pairs => map_pairs(list)?,
            Some(other) => return Err(unexpected(&other)),
        }),
        (S::Tbl, Rule::structbody) => Value::Table(table(body)?),
        (S::ExecSet, Rule::structbody) => Value::ExecSet(Box::new(execset(body)?)),
        (S::RptSet, Rule::structbody) => Value::RptSet(Box::new(rptset(body)?)),
        (typ, Rule::seg) => lex::typed_value(typ, &unquote(body.as_str())?)?,
        _ => return Err(AriError::parse(format!("bad {type_id} literal form: {}", body.as_str()))),
    };
    LiteralAri::coerce(value, type_id).map_err(AriError::invalid)
}

fn map_pairs(pair: Pair<'_, Rule>) -> Result<AriMap> {
    let mut map = AriMap::new();
    for entry in pair.into_inner() {
        let mut inner = entry.into_inner();
        let (Some(key), Some(val)) = (inner.next(), inner.next()) else {
            return Err(AriError::parse("malformed map pair"));
        };
        let key = element(key)?;
        if !matches!(&key, Ari::Literal(lit) if lit.type_id.is_none()) {
            return Err(AriError::parse("AM keys must be untyped literals"));
        }
        map.insert(key, element(val)?);
    }
    Ok(map)
}

fn table(body: Pair<'_, Rule>) -> Result<Table> {
    let (header, groups): (Vec<_>, Vec<_>) = body.into_inner().partition(|pair| pair.as_rule() == Rule::structpair);
    let header = struct_pairs(header.into_iter())?;
    let ncols = match header.get("c") {
        Some(StructVal::Raw(text)) => usize::try_from(lex::integer(text)?)
            .map_err(|_| AriError::parse(format!("invalid column count: {text}")))?,
        Some(StructVal::Nested(Ari::Literal(LiteralAri { value: Value::Int(count), .. }))) => {
            usize::try_from(*count).map_err(|_| AriError::parse(format!("invalid column count: {count}")))?
        }
        _ => return Err(AriError::parse("table is missing its column count")),
    };
    let mut table = Table::new(ncols);
    for group in groups {
        let row = match group.into_inner().next() {
            None => Vec::new(),
            Some(list) if list.as_rule() == Rule::items => items(list)?,
            Some(other) => return Err(unexpected(&other)),
        };
        table.push_row(row).map_err(AriError::invalid)?;
    }
    Ok(table)
}

fn nonce(header: &IndexMap<String, StructVal>) -> Result<LiteralAri> {
    let nonce = match header.get("n") {
        None => LiteralAri::new(Value::Null),
        Some(StructVal::Raw(text)) => LiteralAri::new(lex::primitive(text)?),
        Some(StructVal::Nested(Ari::Literal(lit))) => lit.clone(),
        Some(StructVal::Nested(Ari::Reference(_))) => return Err(AriError::parse("a nonce cannot be a reference")),
    };
    if !is_valid_nonce(&nonce) {
        return Err(AriError::parse("a nonce must be an untyped null, unsigned integer or byte string"));
    }
    Ok(nonce)
}

fn execset(body: Pair<'_, Rule>) -> Result<ExecutionSet> {
    let (header, groups): (Vec<_>, Vec<_>) = body.into_inner().partition(|pair| pair.as_rule() == Rule::structpair);
    let header = struct_pairs(header.into_iter())?;
    let mut targets = Vec::new();
    for group in groups {
        match group.into_inner().next() {
            None => {}
            Some(list) if list.as_rule() == Rule::items => targets.extend(items(list)?),
            Some(other) => return Err(unexpected(&other)),
        }
    }
    Ok(ExecutionSet { nonce: nonce(&header)?, targets })
}

fn time_value(val: Option<&StructVal>, type_id: StructType) -> Result<Value> {
    match val {
        Some(StructVal::Raw(text)) => lex::typed_value(type_id, text),
        Some(StructVal::Nested(Ari::Literal(lit))) => LiteralAri::coerce(lit.value.clone(), type_id)
            .map(|lit| lit.value)
            .map_err(AriError::invalid),
        _ => Err(AriError::parse(format!("missing or invalid {type_id} attribute"))),
    }
}

fn rptset(body: Pair<'_, Rule>) -> Result<ReportSet> {
    let (header, groups): (Vec<_>, Vec<_>) = body.into_inner().partition(|pair| pair.as_rule() == Rule::structpair);
    let header = struct_pairs(header.into_iter())?;
    let ref_time = match time_value(header.get("r"), StructType::Tp)? {
        Value::Tp(tp) => tp,
        _ => return Err(AriError::parse("invalid report set reference time")),
    };
    let mut reports = Vec::new();
    for group in groups {
        match group.into_inner().next() {
            None => {}
            Some(rpt) if rpt.as_rule() == Rule::report => reports.push(report(rpt)?),
            Some(other) => return Err(unexpected(&other)),
        }
    }
    Ok(ReportSet { nonce: nonce(&header)?, ref_time, reports })
}

fn report(pair: Pair<'_, Rule>) -> Result<Report> {
    let (header, rest): (Vec<_>, Vec<_>) = pair.into_inner().partition(|pair| pair.as_rule() == Rule::structpair);
    let header = struct_pairs(header.into_iter())?;
    let rel_time = match time_value(header.get("t"), StructType::Td)? {
        Value::Td(td) => td,
        _ => return Err(AriError::parse("invalid report relative time")),
    };
    let source = match header.get("s") {
        Some(StructVal::Nested(ari)) => ari.clone(),
        Some(StructVal::Raw(text)) => Ari::Literal(LiteralAri::new(lex::primitive(text)?)),
        None => return Err(AriError::parse("report is missing its source")),
    };
    let mut items_out = Vec::new();
    for bracket in rest {
        match bracket.into_inner().next() {
            None => {}
            Some(list) if list.as_rule() == Rule::items => items_out.extend(items(list)?),
            Some(other) => return Err(unexpected(&other)),
        }
    }
    Ok(Report { rel_time, source, items: items_out })
}

/// Parse CBOR diagnostic notation into an item tree.
pub fn parse_diag(text: &str) -> Result<Item> {
    let top = AriParser::parse(Rule::diag_doc, text)?
        .next()
        .ok_or_else(|| AriError::parse("empty diagnostic text"))?;
    for pair in top.into_inner() {
        if pair.as_rule() != Rule::EOI {
            return diag_item(pair);
        }
    }
    Err(AriError::parse("empty diagnostic text"))
}

fn diag_item(pair: Pair<'_, Rule>) -> Result<Item> {
    let text = pair.as_str();
    let item = match pair.as_rule() {
        Rule::diag_array => Item::Array(pair.into_inner().map(diag_item).collect::<Result<_>>()?),
        Rule::diag_map => {
            let mut entries = Vec::new();
            for entry in pair.into_inner() {
                let mut inner = entry.into_inner();
                let (Some(key), Some(val)) = (inner.next(), inner.next()) else {
                    return Err(AriError::parse("malformed diagnostic map entry"));
                };
                entries.push((diag_item(key)?, diag_item(val)?));
            }
            Item::Map(entries)
        }
        Rule::diag_tstr => Item::Text(lex::quoted_text(text)?),
        Rule::diag_bstr => Item::Bytes(lex::quoted_bytes(text)?),
        Rule::diag_float => Item::Float(lex::float(text)?),
        Rule::diag_int => Item::Int(lex::integer(text)?),
        Rule::diag_simple => match text {
            "true" => Item::Bool(true),
            "false" => Item::Bool(false),
            "null" => Item::Null,
            _ => Item::Undefined,
        },
        _ => return Err(unexpected(&pair)),
    };
    Ok(item)
}
