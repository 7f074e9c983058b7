//! The fixed table of built-in types that type names can bind to.

use std::collections::BTreeSet;

use crate::ari::{Ari, LiteralAri, NumericDomain, StructType, TRUE, Value};
use crate::error::ConversionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinType {
    /// Values of exactly one literal struct type.
    Literal(StructType),
    /// References to objects of one type, or of any type.
    ObjRef(Option<StructType>),
    /// Any literal value.
    AnyLiteral,
}

const BUILTINS: [(&str, BuiltinType); 34] = [
    ("null", BuiltinType::Literal(StructType::Null)),
    ("bool", BuiltinType::Literal(StructType::Bool)),
    ("byte", BuiltinType::Literal(StructType::Byte)),
    ("int", BuiltinType::Literal(StructType::Int)),
    ("uint", BuiltinType::Literal(StructType::Uint)),
    ("vast", BuiltinType::Literal(StructType::Vast)),
    ("uvast", BuiltinType::Literal(StructType::Uvast)),
    ("real32", BuiltinType::Literal(StructType::Real32)),
    ("real64", BuiltinType::Literal(StructType::Real64)),
    ("textstr", BuiltinType::Literal(StructType::TextStr)),
    ("bytestr", BuiltinType::Literal(StructType::ByteStr)),
    ("tp", BuiltinType::Literal(StructType::Tp)),
    ("td", BuiltinType::Literal(StructType::Td)),
    ("label", BuiltinType::Literal(StructType::Label)),
    ("cbor", BuiltinType::Literal(StructType::Cbor)),
    ("aritype", BuiltinType::Literal(StructType::AriType)),
    ("ac", BuiltinType::Literal(StructType::Ac)),
    ("am", BuiltinType::Literal(StructType::Am)),
    ("tbl", BuiltinType::Literal(StructType::Tbl)),
    ("execset", BuiltinType::Literal(StructType::ExecSet)),
    ("rptset", BuiltinType::Literal(StructType::RptSet)),
    ("typedef", BuiltinType::ObjRef(Some(StructType::Typedef))),
    ("const", BuiltinType::ObjRef(Some(StructType::Const))),
    ("edd", BuiltinType::ObjRef(Some(StructType::Edd))),
    ("var", BuiltinType::ObjRef(Some(StructType::Var))),
    ("ctrl", BuiltinType::ObjRef(Some(StructType::Ctrl))),
    ("oper", BuiltinType::ObjRef(Some(StructType::Oper))),
    ("ident", BuiltinType::ObjRef(Some(StructType::Ident))),
    ("sbr", BuiltinType::ObjRef(Some(StructType::Sbr))),
    ("tbr", BuiltinType::ObjRef(Some(StructType::Tbr))),
    ("lit", BuiltinType::AnyLiteral),
    ("obj-ref", BuiltinType::ObjRef(None)),
    // older spellings
    ("littype", BuiltinType::Literal(StructType::AriType)),
    ("object", BuiltinType::ObjRef(None)),
];

impl BuiltinType {
    /// Case-insensitive lookup of a built-in type name.
    pub fn from_name(name: &str) -> Option<Self> {
        BUILTINS
            .iter()
            .find(|(builtin, _)| builtin.eq_ignore_ascii_case(name))
            .map(|(_, typ)| *typ)
    }

    pub fn name(&self) -> &'static str {
        BUILTINS
            .iter()
            .find(|(_, typ)| typ == self)
            .map(|(name, _)| *name)
            .unwrap_or("unknown")
    }

    pub fn type_ids(&self) -> BTreeSet<StructType> {
        match self {
            BuiltinType::Literal(typ) => [*typ].into(),
            BuiltinType::ObjRef(Some(typ)) => [*typ].into(),
            BuiltinType::ObjRef(None) => StructType::ALL.iter().copied().filter(|typ| typ.is_object()).collect(),
            BuiltinType::AnyLiteral => StructType::ALL.iter().copied().filter(|typ| typ.is_literal()).collect(),
        }
    }

    /// The value when it already is of this type, normalized to carry the
    /// type's tag.
    pub fn get(&self, ari: &Ari) -> Option<Ari> {
        if ari.is_undefined() {
            return Some(ari.clone());
        }
        match (self, ari) {
            (BuiltinType::Literal(typ), Ari::Literal(lit)) => {
                if lit.type_id.is_some_and(|tag| tag != *typ) {
                    return None;
                }
                if !accepts_kind(*typ, &lit.value, false) {
                    return None;
                }
                LiteralAri::coerce(lit.value.clone(), *typ).ok().map(Ari::Literal)
            }
            (BuiltinType::ObjRef(want), Ari::Reference(objref)) => match want {
                Some(typ) if objref.ident.type_id != *typ => None,
                _ => Some(ari.clone()),
            },
            (BuiltinType::AnyLiteral, Ari::Literal(_)) => Some(ari.clone()),
            _ => None,
        }
    }

    pub fn convert(&self, ari: &Ari) -> Result<Ari, ConversionError> {
        if ari.is_undefined() {
            return Ok(ari.clone());
        }
        match (self, ari) {
            (BuiltinType::Literal(StructType::Null), _) => Ok(Ari::Literal(LiteralAri::typed(Value::Null, StructType::Null))),
            // any object reference is truthy
            (BuiltinType::Literal(StructType::Bool), Ari::Reference(_)) => Ok(TRUE),
            (BuiltinType::Literal(StructType::Bool), Ari::Literal(lit)) => {
                Ok(Ari::Literal(LiteralAri::typed(lit.value.truthy(), StructType::Bool)))
            }
            (BuiltinType::Literal(typ), Ari::Reference(_)) => {
                Err(ConversionError::mismatch(format!("cannot convert an object reference to {typ}")))
            }
            (BuiltinType::Literal(typ), Ari::Literal(lit)) if typ.domain().is_some() => {
                convert_numeric(*typ, &lit.value).map(Ari::Literal)
            }
            (BuiltinType::Literal(typ), Ari::Literal(lit)) => {
                if lit.type_id.is_some_and(|tag| tag != *typ) {
                    return Err(ConversionError::mismatch(format!(
                        "cannot convert a {} value to {typ}",
                        lit.type_id.map(StructType::name).unwrap_or("untyped")
                    )));
                }
                if !accepts_kind(*typ, &lit.value, true) {
                    return Err(ConversionError::mismatch(format!("cannot convert a {} to {typ}", lit.value.kind())));
                }
                LiteralAri::coerce(lit.value.clone(), *typ).map(Ari::Literal)
            }
            (BuiltinType::ObjRef(want), Ari::Reference(objref)) => match want {
                Some(typ) if objref.ident.type_id != *typ => Err(ConversionError::value(format!(
                    "reference to a {} is not a {typ}",
                    objref.ident.type_id
                ))),
                _ => Ok(ari.clone()),
            },
            (BuiltinType::ObjRef(_), Ari::Literal(_)) => {
                Err(ConversionError::mismatch("cannot convert a literal to an object reference"))
            }
            (BuiltinType::AnyLiteral, Ari::Literal(_)) => Ok(ari.clone()),
            (BuiltinType::AnyLiteral, Ari::Reference(_)) => {
                Err(ConversionError::mismatch("cannot convert an object reference to a literal"))
            }
        }
    }
}

/// Value kinds a literal type takes, `seconds` also admits numeric seconds
/// for the time types.
fn accepts_kind(typ: StructType, value: &Value, seconds: bool) -> bool {
    use StructType as S;
    match typ {
        S::Null => matches!(value, Value::Null),
        S::Bool => matches!(value, Value::Bool(_)),
        S::Byte | S::Int | S::Uint | S::Vast | S::Uvast => matches!(value, Value::Int(_)),
        S::Real32 | S::Real64 => matches!(value, Value::Int(_) | Value::Float(_)),
        S::TextStr => matches!(value, Value::Text(_)),
        S::ByteStr | S::Cbor => matches!(value, Value::Bytes(_)),
        S::Label => matches!(value, Value::Text(_) | Value::Int(_)),
        S::Tp => matches!(value, Value::Tp(_)) || seconds && matches!(value, Value::Int(_) | Value::Float(_)),
        S::Td => matches!(value, Value::Td(_)) || seconds && matches!(value, Value::Int(_) | Value::Float(_)),
        S::AriType => matches!(value, Value::AriType(_)),
        S::Ac => matches!(value, Value::List(_)),
        S::Am => matches!(value, Value::Map(_)),
        S::Tbl => matches!(value, Value::Table(_)),
        S::ExecSet => matches!(value, Value::ExecSet(_)),
        S::RptSet => matches!(value, Value::RptSet(_)),
        _ => false,
    }
}

fn convert_numeric(typ: StructType, value: &Value) -> Result<LiteralAri, ConversionError> {
    let value = match value {
        Value::Null | Value::Bool(false) => Value::Int(0),
        Value::Bool(true) => Value::Int(1),
        Value::Float(val) if matches!(typ.domain(), Some(NumericDomain::Integer { .. })) => {
            if !val.is_finite() || val.fract() != 0.0 {
                return Err(ConversionError::value(format!("{val} is not an integer")));
            }
            if !typ.domain().is_some_and(|dom| dom.contains_float(*val)) {
                return Err(ConversionError::value(format!("{val} is outside the {typ} domain")));
            }
            Value::Int(*val as i128)
        }
        val @ (Value::Int(_) | Value::Float(_)) => val.clone(),
        other => return Err(ConversionError::value(format!("a {} is not numeric", other.kind()))),
    };
    LiteralAri::coerce(value, typ)
}
