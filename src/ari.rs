//! The logical data model of an ARI, independent of any encoding.
//!
//! An [`Ari`] is either a [`LiteralAri`] (a value with an optional
//! [`StructType`] tag) or a [`ReferenceAri`] (an [`Identity`] naming a
//! managed object plus optional parameters). Values are immutable once
//! built, so they are freely cloned and shared.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use bigdecimal::{BigDecimal, FromPrimitive, ToPrimitive};
use chrono::{DateTime, TimeDelta, Utc};
use indexmap::IndexMap;

use crate::error::ConversionError;

/// Seconds from the Unix epoch to the DTN epoch 2000-01-01T00:00:00Z.
pub const DTN_EPOCH_SECONDS: i64 = 946_684_800;

const MICROS: i128 = 1_000_000;

// ------------- StructType -------------
/// Wire-level tag of every literal and object-reference kind.
/// Literal types are non-negative, object types are negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(i64)]
pub enum StructType {
    Null = 0,
    Bool = 1,
    Byte = 2,
    Int = 4,
    Uint = 5,
    Vast = 6,
    Uvast = 7,
    Real32 = 8,
    Real64 = 9,
    TextStr = 10,
    ByteStr = 11,
    Tp = 12,
    Td = 13,
    Label = 14,
    Cbor = 15,
    AriType = 16,
    Ac = 17,
    Am = 18,
    Tbl = 19,
    ExecSet = 20,
    RptSet = 21,
    Ident = -1,
    Const = -2,
    Ctrl = -3,
    Edd = -4,
    Oper = -6,
    Sbr = -8,
    Tbr = -10,
    Var = -11,
    Typedef = -12,
}

impl StructType {
    pub const ALL: [StructType; 30] = [
        StructType::Null,
        StructType::Bool,
        StructType::Byte,
        StructType::Int,
        StructType::Uint,
        StructType::Vast,
        StructType::Uvast,
        StructType::Real32,
        StructType::Real64,
        StructType::TextStr,
        StructType::ByteStr,
        StructType::Tp,
        StructType::Td,
        StructType::Label,
        StructType::Cbor,
        StructType::AriType,
        StructType::Ac,
        StructType::Am,
        StructType::Tbl,
        StructType::ExecSet,
        StructType::RptSet,
        StructType::Ident,
        StructType::Const,
        StructType::Ctrl,
        StructType::Edd,
        StructType::Oper,
        StructType::Sbr,
        StructType::Tbr,
        StructType::Var,
        StructType::Typedef,
    ];

    pub fn code(self) -> i64 {
        self as i64
    }
    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.iter().copied().find(|typ| typ.code() == code)
    }
    pub fn name(self) -> &'static str {
        match self {
            StructType::Null => "NULL",
            StructType::Bool => "BOOL",
            StructType::Byte => "BYTE",
            StructType::Int => "INT",
            StructType::Uint => "UINT",
            StructType::Vast => "VAST",
            StructType::Uvast => "UVAST",
            StructType::Real32 => "REAL32",
            StructType::Real64 => "REAL64",
            StructType::TextStr => "TEXTSTR",
            StructType::ByteStr => "BYTESTR",
            StructType::Tp => "TP",
            StructType::Td => "TD",
            StructType::Label => "LABEL",
            StructType::Cbor => "CBOR",
            StructType::AriType => "ARITYPE",
            StructType::Ac => "AC",
            StructType::Am => "AM",
            StructType::Tbl => "TBL",
            StructType::ExecSet => "EXECSET",
            StructType::RptSet => "RPTSET",
            StructType::Ident => "IDENT",
            StructType::Const => "CONST",
            StructType::Ctrl => "CTRL",
            StructType::Edd => "EDD",
            StructType::Oper => "OPER",
            StructType::Sbr => "SBR",
            StructType::Tbr => "TBR",
            StructType::Var => "VAR",
            StructType::Typedef => "TYPEDEF",
        }
    }
    /// Case-insensitive lookup by name.
    pub fn from_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("LITTYPE") {
            return Some(StructType::AriType);
        }
        Self::ALL.iter().copied().find(|typ| typ.name().eq_ignore_ascii_case(name))
    }
    pub fn is_literal(self) -> bool {
        self.code() >= 0
    }
    pub fn is_object(self) -> bool {
        self.code() < 0
    }
    /// The fixed numeric domain of the numeric literal types.
    pub fn domain(self) -> Option<NumericDomain> {
        match self {
            StructType::Byte => Some(NumericDomain::Integer { min: 0, max: u8::MAX as i128 }),
            StructType::Int => Some(NumericDomain::Integer { min: i32::MIN as i128, max: i32::MAX as i128 }),
            StructType::Uint => Some(NumericDomain::Integer { min: 0, max: u32::MAX as i128 }),
            StructType::Vast => Some(NumericDomain::Integer { min: i64::MIN as i128, max: i64::MAX as i128 }),
            StructType::Uvast => Some(NumericDomain::Integer { min: 0, max: u64::MAX as i128 }),
            StructType::Real32 => Some(NumericDomain::Real { max: f32::MAX as f64 }),
            StructType::Real64 => Some(NumericDomain::Real { max: f64::MAX }),
            _ => None,
        }
    }
}

impl fmt::Display for StructType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StructType {
    type Err = ConversionError;
    /// Either the enumerated name or its integer code.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let found = match s.parse::<i64>() {
            Ok(code) => StructType::from_code(code),
            Err(_) => StructType::from_name(s),
        };
        found.ok_or_else(|| ConversionError::value(format!("unknown struct type: {s}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumericDomain {
    Integer { min: i128, max: i128 },
    /// Symmetric about zero, non-finite values are always inside.
    Real { max: f64 },
}

impl NumericDomain {
    pub fn contains_int(&self, value: i128) -> bool {
        match *self {
            NumericDomain::Integer { min, max } => min <= value && value <= max,
            NumericDomain::Real { max } => (value as f64).abs() <= max,
        }
    }
    pub fn contains_float(&self, value: f64) -> bool {
        match *self {
            NumericDomain::Integer { min, max } => {
                value.is_finite() && value.fract() == 0.0 && (min as f64) <= value && value <= (max as f64)
            }
            NumericDomain::Real { max } => !value.is_finite() || value.abs() <= max,
        }
    }
}

// ------------- Identity -------------
/// Identifier text is compared case-folded.
pub fn normalize_ident(text: &str) -> String {
    text.to_lowercase()
}

/// One segment of an object path, either an enumeration or a name.
#[derive(Debug, Clone)]
pub enum IdSeg {
    Int(i64),
    Text(String),
}

impl PartialEq for IdSeg {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (IdSeg::Int(a), IdSeg::Int(b)) => a == b,
            (IdSeg::Text(a), IdSeg::Text(b)) => normalize_ident(a) == normalize_ident(b),
            _ => false,
        }
    }
}
impl Eq for IdSeg {}
impl Hash for IdSeg {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            IdSeg::Int(id) => {
                0u8.hash(state);
                id.hash(state);
            }
            IdSeg::Text(name) => {
                1u8.hash(state);
                normalize_ident(name).hash(state);
            }
        }
    }
}
impl fmt::Display for IdSeg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdSeg::Int(id) => write!(f, "{id}"),
            IdSeg::Text(name) => f.write_str(name),
        }
    }
}
impl From<i64> for IdSeg {
    fn from(id: i64) -> Self {
        IdSeg::Int(id)
    }
}
impl From<&str> for IdSeg {
    fn from(name: &str) -> Self {
        IdSeg::Text(name.to_string())
    }
}
impl From<String> for IdSeg {
    fn from(name: String) -> Self {
        IdSeg::Text(name)
    }
}

/// The identity of a referenced object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    /// The organization owning the namespace, from `//org/model/...` paths.
    pub org_id: Option<IdSeg>,
    /// `None` indicates a module-relative reference.
    pub ns_id: Option<IdSeg>,
    /// A specific module revision date.
    pub ns_rev: Option<String>,
    pub type_id: StructType,
    pub obj_id: IdSeg,
}

impl Identity {
    pub fn new(ns_id: impl Into<IdSeg>, type_id: StructType, obj_id: impl Into<IdSeg>) -> Self {
        Self { org_id: None, ns_id: Some(ns_id.into()), ns_rev: None, type_id, obj_id: obj_id.into() }
    }
    pub fn relative(type_id: StructType, obj_id: impl Into<IdSeg>) -> Self {
        Self { org_id: None, ns_id: None, ns_rev: None, type_id, obj_id: obj_id.into() }
    }
    pub fn with_org(mut self, org: impl Into<IdSeg>) -> Self {
        self.org_id = Some(org.into());
        self
    }
    pub fn with_rev(mut self, rev: impl Into<String>) -> Self {
        self.ns_rev = Some(rev.into());
        self
    }
}

// ------------- Containers -------------
pub type AriMap = IndexMap<Ari, Ari>;

/// A two-dimensional matrix of ARIs kept in row-major order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Table {
    nrows: usize,
    ncols: usize,
    cells: Vec<Ari>,
}

impl Table {
    pub fn new(ncols: usize) -> Self {
        Self { nrows: 0, ncols, cells: Vec::new() }
    }
    pub fn from_rows(ncols: usize, rows: Vec<Vec<Ari>>) -> Result<Self, ConversionError> {
        let mut table = Table::new(ncols);
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }
    /// Cells are row-major, their count must be a multiple of the column count.
    pub fn from_cells(ncols: usize, cells: Vec<Ari>) -> Result<Self, ConversionError> {
        if ncols == 0 {
            if !cells.is_empty() {
                return Err(ConversionError::value("a table without columns cannot hold cells"));
            }
            return Ok(Table::new(0));
        }
        if cells.len() % ncols != 0 {
            return Err(ConversionError::value(format!(
                "{} cells do not fill rows of {} columns",
                cells.len(),
                ncols
            )));
        }
        Ok(Self { nrows: cells.len() / ncols, ncols, cells })
    }
    /// A table without columns holds no rows, since none could be told apart.
    pub fn push_row(&mut self, row: Vec<Ari>) -> Result<(), ConversionError> {
        if self.ncols == 0 {
            return Err(ConversionError::value("a table without columns cannot hold rows"));
        }
        if row.len() != self.ncols {
            return Err(ConversionError::value(format!(
                "table row has {} cells but there are {} columns",
                row.len(),
                self.ncols
            )));
        }
        self.cells.extend(row);
        self.nrows += 1;
        Ok(())
    }
    pub fn nrows(&self) -> usize {
        self.nrows
    }
    pub fn ncols(&self) -> usize {
        self.ncols
    }
    pub fn cells(&self) -> &[Ari] {
        &self.cells
    }
    pub fn get(&self, row: usize, col: usize) -> Option<&Ari> {
        if row < self.nrows && col < self.ncols {
            self.cells.get(row * self.ncols + col)
        } else {
            None
        }
    }
    pub fn row(&self, row: usize) -> Option<&[Ari]> {
        if row < self.nrows {
            Some(&self.cells[row * self.ncols..(row + 1) * self.ncols])
        } else {
            None
        }
    }
    pub fn rows(&self) -> impl Iterator<Item = &[Ari]> + '_ {
        (0..self.nrows).map(move |ix| &self.cells[ix * self.ncols..(ix + 1) * self.ncols])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExecutionSet {
    pub nonce: LiteralAri,
    pub targets: Vec<Ari>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Report {
    /// Relative to the reference time of the containing set.
    pub rel_time: TimeDelta,
    pub source: Ari,
    pub items: Vec<Ari>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReportSet {
    pub nonce: LiteralAri,
    pub ref_time: DateTime<Utc>,
    pub reports: Vec<Report>,
}

/// Nonces are an untyped null, non-negative integer, or byte string.
pub fn is_valid_nonce(nonce: &LiteralAri) -> bool {
    if nonce.type_id.is_some() {
        return false;
    }
    match &nonce.value {
        Value::Null => true,
        Value::Int(val) => *val >= 0 && *val <= u64::MAX as i128,
        Value::Bytes(_) => true,
        _ => false,
    }
}

// ------------- Value -------------
#[derive(Debug, Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Int(i128),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    AriType(StructType),
    Tp(DateTime<Utc>),
    Td(TimeDelta),
    List(Vec<Ari>),
    Map(AriMap),
    Table(Table),
    ExecSet(Box<ExecutionSet>),
    RptSet(Box<ReportSet>),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::AriType(_) => "struct type",
            Value::Tp(_) => "time point",
            Value::Td(_) => "time delta",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Table(_) => "table",
            Value::ExecSet(_) => "execution set",
            Value::RptSet(_) => "report set",
        }
    }
    /// Empty, zero, null and false values are falsy.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(val) => *val,
            Value::Int(val) => *val != 0,
            Value::Float(val) => *val != 0.0,
            Value::Text(val) => !val.is_empty(),
            Value::Bytes(val) => !val.is_empty(),
            Value::Td(val) => *val != TimeDelta::zero(),
            Value::List(val) => !val.is_empty(),
            Value::Map(val) => !val.is_empty(),
            Value::Table(val) => val.nrows() > 0,
            Value::AriType(_) | Value::Tp(_) | Value::ExecSet(_) | Value::RptSet(_) => true,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            // bitwise so that equality stays reflexive for NaN
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::AriType(a), Value::AriType(b)) => a == b,
            (Value::Tp(a), Value::Tp(b)) => a == b,
            (Value::Td(a), Value::Td(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Table(a), Value::Table(b)) => a == b,
            (Value::ExecSet(a), Value::ExecSet(b)) => a == b,
            (Value::RptSet(a), Value::RptSet(b)) => a == b,
            _ => false,
        }
    }
}
impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Undefined | Value::Null => {}
            Value::Bool(val) => val.hash(state),
            Value::Int(val) => val.hash(state),
            Value::Float(val) => val.to_bits().hash(state),
            Value::Text(val) => val.hash(state),
            Value::Bytes(val) => val.hash(state),
            Value::AriType(val) => val.hash(state),
            Value::Tp(val) => val.hash(state),
            Value::Td(val) => val.hash(state),
            Value::List(val) => val.hash(state),
            // map equality ignores order
            Value::Map(val) => val.len().hash(state),
            Value::Table(val) => val.hash(state),
            Value::ExecSet(val) => val.hash(state),
            Value::RptSet(val) => val.hash(state),
        }
    }
}

impl From<bool> for Value {
    fn from(val: bool) -> Self {
        Value::Bool(val)
    }
}
impl From<i32> for Value {
    fn from(val: i32) -> Self {
        Value::Int(val.into())
    }
}
impl From<i64> for Value {
    fn from(val: i64) -> Self {
        Value::Int(val.into())
    }
}
impl From<u64> for Value {
    fn from(val: u64) -> Self {
        Value::Int(val.into())
    }
}
impl From<f64> for Value {
    fn from(val: f64) -> Self {
        Value::Float(val)
    }
}
impl From<&str> for Value {
    fn from(val: &str) -> Self {
        Value::Text(val.to_string())
    }
}
impl From<String> for Value {
    fn from(val: String) -> Self {
        Value::Text(val)
    }
}
impl From<Vec<u8>> for Value {
    fn from(val: Vec<u8>) -> Self {
        Value::Bytes(val)
    }
}
impl From<&[u8]> for Value {
    fn from(val: &[u8]) -> Self {
        Value::Bytes(val.to_vec())
    }
}

// ------------- Time -------------
pub fn tp_from_micros(micros: i128) -> Option<DateTime<Utc>> {
    let total = micros.checked_add(i128::from(DTN_EPOCH_SECONDS) * MICROS)?;
    let secs = i64::try_from(total.div_euclid(MICROS)).ok()?;
    let nanos = u32::try_from(total.rem_euclid(MICROS) * 1000).ok()?;
    DateTime::from_timestamp(secs, nanos)
}

/// Microseconds since the DTN epoch.
pub fn tp_to_micros(tp: &DateTime<Utc>) -> i128 {
    (i128::from(tp.timestamp()) - i128::from(DTN_EPOCH_SECONDS)) * MICROS + i128::from(tp.timestamp_subsec_micros())
}

pub fn td_from_micros(micros: i128) -> Option<TimeDelta> {
    i64::try_from(micros).ok().map(TimeDelta::microseconds)
}

pub fn td_to_micros(td: &TimeDelta) -> i128 {
    td.num_microseconds()
        .map(i128::from)
        .unwrap_or_else(|| i128::from(td.num_seconds()) * MICROS)
}

pub fn dtn_epoch() -> DateTime<Utc> {
    DateTime::from_timestamp(DTN_EPOCH_SECONDS, 0).unwrap_or_default()
}

fn seconds_to_micros(value: &Value) -> Option<i128> {
    match value {
        Value::Int(secs) => secs.checked_mul(MICROS),
        // exact decimal expansion of the float, rounded to whole microseconds
        Value::Float(secs) => BigDecimal::from_f64(*secs)
            .map(|secs| (secs * BigDecimal::from(1_000_000)).round(0))
            .and_then(|micros| micros.to_i128()),
        _ => None,
    }
}

// ------------- LiteralAri -------------
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LiteralAri {
    pub value: Value,
    pub type_id: Option<StructType>,
}

impl LiteralAri {
    pub fn new(value: impl Into<Value>) -> Self {
        Self { value: value.into(), type_id: None }
    }
    pub fn typed(value: impl Into<Value>, type_id: StructType) -> Self {
        Self { value: value.into(), type_id: Some(type_id) }
    }
    pub fn is_undefined(&self) -> bool {
        self.type_id.is_none() && matches!(self.value, Value::Undefined)
    }

    /// Give a value the `type_id` tag, checking it against the domain of that
    /// tag and normalizing the value into its canonical kind.
    pub fn coerce(value: Value, type_id: StructType) -> Result<LiteralAri, ConversionError> {
        use StructType as S;
        let out = match (type_id, value) {
            (S::Null, Value::Null) => Value::Null,
            (S::Bool, val @ Value::Bool(_)) => val,
            (S::Byte | S::Int | S::Uint | S::Vast | S::Uvast, Value::Int(val)) => {
                if !type_id.domain().is_some_and(|dom| dom.contains_int(val)) {
                    return Err(ConversionError::value(format!("{val} is outside the {type_id} domain")));
                }
                Value::Int(val)
            }
            (S::Real32 | S::Real64, Value::Float(val)) => {
                if !type_id.domain().is_some_and(|dom| dom.contains_float(val)) {
                    return Err(ConversionError::value(format!("{val} is outside the {type_id} domain")));
                }
                Value::Float(val)
            }
            (S::Real32 | S::Real64, Value::Int(val)) => {
                if !type_id.domain().is_some_and(|dom| dom.contains_int(val)) {
                    return Err(ConversionError::value(format!("{val} is outside the {type_id} domain")));
                }
                Value::Float(val as f64)
            }
            (S::TextStr, val @ Value::Text(_)) => val,
            (S::ByteStr | S::Cbor, val @ Value::Bytes(_)) => val,
            (S::Label, val @ (Value::Text(_) | Value::Int(_))) => val,
            (S::AriType, val @ Value::AriType(_)) => val,
            (S::AriType, Value::Int(code)) => i64::try_from(code)
                .ok()
                .and_then(StructType::from_code)
                .map(Value::AriType)
                .ok_or_else(|| ConversionError::value(format!("unknown struct type code {code}")))?,
            (S::AriType, Value::Text(name)) => StructType::from_name(&name)
                .map(Value::AriType)
                .ok_or_else(|| ConversionError::value(format!("unknown struct type name {name}")))?,
            (S::Tp, val @ Value::Tp(_)) => val,
            (S::Tp, val @ (Value::Int(_) | Value::Float(_))) => seconds_to_micros(&val)
                .and_then(tp_from_micros)
                .map(Value::Tp)
                .ok_or_else(|| ConversionError::value("time point is out of range"))?,
            (S::Td, val @ Value::Td(_)) => val,
            (S::Td, val @ (Value::Int(_) | Value::Float(_))) => seconds_to_micros(&val)
                .and_then(td_from_micros)
                .map(Value::Td)
                .ok_or_else(|| ConversionError::value("time delta is out of range"))?,
            (S::Ac, val @ Value::List(_)) => val,
            (S::Am, val @ Value::Map(_)) => val,
            (S::Tbl, val @ Value::Table(_)) => val,
            (S::ExecSet, val @ Value::ExecSet(_)) => val,
            (S::RptSet, val @ Value::RptSet(_)) => val,
            (typ, _) if typ.is_object() => {
                return Err(ConversionError::mismatch(format!("{typ} is not a literal type")));
            }
            (typ, val) => {
                return Err(ConversionError::mismatch(format!("a {} value cannot be a {typ}", val.kind())));
            }
        };
        Ok(LiteralAri { value: out, type_id: Some(type_id) })
    }
}

// ------------- ReferenceAri -------------
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReferenceAri {
    pub ident: Identity,
    /// An absent parameter list differs from an empty one.
    pub params: Option<Vec<Ari>>,
}

impl ReferenceAri {
    pub fn new(ident: Identity) -> Self {
        Self { ident, params: None }
    }
    pub fn with_params(ident: Identity, params: Vec<Ari>) -> Self {
        Self { ident, params: Some(params) }
    }
}

// ------------- Ari -------------
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Ari {
    Literal(LiteralAri),
    Reference(ReferenceAri),
}

/// The undefined value.
pub const UNDEFINED: Ari = Ari::Literal(LiteralAri { value: Value::Undefined, type_id: None });
/// The null value.
pub const NULL: Ari = Ari::Literal(LiteralAri { value: Value::Null, type_id: Some(StructType::Null) });
pub const TRUE: Ari = Ari::Literal(LiteralAri { value: Value::Bool(true), type_id: Some(StructType::Bool) });
pub const FALSE: Ari = Ari::Literal(LiteralAri { value: Value::Bool(false), type_id: Some(StructType::Bool) });

impl Ari {
    pub fn is_undefined(&self) -> bool {
        matches!(self, Ari::Literal(lit) if lit.is_undefined())
    }
    pub fn as_literal(&self) -> Option<&LiteralAri> {
        match self {
            Ari::Literal(lit) => Some(lit),
            Ari::Reference(_) => None,
        }
    }
    pub fn as_reference(&self) -> Option<&ReferenceAri> {
        match self {
            Ari::Literal(_) => None,
            Ari::Reference(objref) => Some(objref),
        }
    }
    pub fn type_id(&self) -> Option<StructType> {
        match self {
            Ari::Literal(lit) => lit.type_id,
            Ari::Reference(objref) => Some(objref.ident.type_id),
        }
    }

    /// Call `visitor` on every contained ARI depth-first and then on this one.
    pub fn visit<F: FnMut(&Ari)>(&self, visitor: &mut F) {
        match self {
            Ari::Literal(lit) => match &lit.value {
                Value::List(items) => items.iter().for_each(|item| item.visit(visitor)),
                Value::Map(map) => {
                    for (key, item) in map {
                        key.visit(visitor);
                        item.visit(visitor);
                    }
                }
                Value::Table(table) => table.cells().iter().for_each(|item| item.visit(visitor)),
                Value::ExecSet(execset) => execset.targets.iter().for_each(|item| item.visit(visitor)),
                Value::RptSet(rptset) => {
                    for rpt in &rptset.reports {
                        rpt.source.visit(visitor);
                        rpt.items.iter().for_each(|item| item.visit(visitor));
                    }
                }
                _ => {}
            },
            Ari::Reference(objref) => {
                if let Some(params) = &objref.params {
                    params.iter().for_each(|item| item.visit(visitor));
                }
            }
        }
        visitor(self);
    }

    /// Rebuild this ARI bottom-up, passing every ARI through `func`.
    pub fn map<F: FnMut(Ari) -> Ari>(&self, func: &mut F) -> Ari {
        let rebuilt = match self {
            Ari::Literal(lit) => {
                let value = match &lit.value {
                    Value::List(items) => Value::List(items.iter().map(|item| item.map(func)).collect()),
                    Value::Map(map) => Value::Map(map.iter().map(|(key, item)| (key.map(func), item.map(func))).collect()),
                    Value::Table(table) => {
                        let cells = table.cells().iter().map(|item| item.map(func)).collect();
                        Value::Table(Table { nrows: table.nrows(), ncols: table.ncols(), cells })
                    }
                    Value::ExecSet(execset) => Value::ExecSet(Box::new(ExecutionSet {
                        nonce: execset.nonce.clone(),
                        targets: execset.targets.iter().map(|item| item.map(func)).collect(),
                    })),
                    Value::RptSet(rptset) => Value::RptSet(Box::new(ReportSet {
                        nonce: rptset.nonce.clone(),
                        ref_time: rptset.ref_time,
                        reports: rptset
                            .reports
                            .iter()
                            .map(|rpt| Report {
                                rel_time: rpt.rel_time,
                                source: rpt.source.map(func),
                                items: rpt.items.iter().map(|item| item.map(func)).collect(),
                            })
                            .collect(),
                    })),
                    other => other.clone(),
                };
                Ari::Literal(LiteralAri { value, type_id: lit.type_id })
            }
            Ari::Reference(objref) => Ari::Reference(ReferenceAri {
                ident: objref.ident.clone(),
                params: objref.params.as_ref().map(|params| params.iter().map(|item| item.map(func)).collect()),
            }),
        };
        func(rebuilt)
    }
}

impl From<LiteralAri> for Ari {
    fn from(lit: LiteralAri) -> Self {
        Ari::Literal(lit)
    }
}
impl From<ReferenceAri> for Ari {
    fn from(objref: ReferenceAri) -> Self {
        Ari::Reference(objref)
    }
}
impl From<bool> for Ari {
    fn from(val: bool) -> Self {
        Ari::Literal(LiteralAri::new(val))
    }
}
impl From<i32> for Ari {
    fn from(val: i32) -> Self {
        Ari::Literal(LiteralAri::new(val))
    }
}
impl From<i64> for Ari {
    fn from(val: i64) -> Self {
        Ari::Literal(LiteralAri::new(val))
    }
}
impl From<f64> for Ari {
    fn from(val: f64) -> Self {
        Ari::Literal(LiteralAri::new(val))
    }
}
impl From<&str> for Ari {
    fn from(val: &str) -> Self {
        Ari::Literal(LiteralAri::new(val))
    }
}
impl From<Vec<u8>> for Ari {
    fn from(val: Vec<u8>) -> Self {
        Ari::Literal(LiteralAri::new(val))
    }
}
