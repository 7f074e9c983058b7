//! Value constraints layered onto a type use.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use regex::Regex;

use super::{Bound, Phase};
use crate::ari::{Ari, Identity, StructType, Value, normalize_ident};
use crate::cbor;
use crate::error::AriError;
use crate::lookup::{ModuleDirectory, OtherHasher, Target, dereference};

const INTEGER_TYPES: [StructType; 5] =
    [StructType::Byte, StructType::Int, StructType::Uint, StructType::Vast, StructType::Uvast];

/// One end of an interval, integers kept exact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i128),
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Int(val) => val as f64,
            Number::Float(val) => val,
        }
    }
    fn le(self, other: Number) -> bool {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a <= b,
            (a, b) => a.as_f64() <= b.as_f64(),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(val) => write!(f, "{val}"),
            Number::Float(val) => write!(f, "{}", cbor::float_repr(*val)),
        }
    }
}

impl FromStr for Number {
    type Err = AriError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(val) = s.parse::<i128>() {
            return Ok(Number::Int(val));
        }
        s.parse::<f64>()
            .map(Number::Float)
            .map_err(|_| AriError::Schema(format!("invalid range limit: {s}")))
    }
}

/// A closed interval, `None` ends are unbounded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub lower: Option<Number>,
    pub upper: Option<Number>,
}

impl Interval {
    pub fn closed(lower: Number, upper: Number) -> Self {
        Self { lower: Some(lower), upper: Some(upper) }
    }
    pub fn singleton(val: Number) -> Self {
        Self { lower: Some(val), upper: Some(val) }
    }
    pub fn contains(&self, val: Number) -> bool {
        self.lower.is_none_or(|lower| lower.le(val)) && self.upper.is_none_or(|upper| val.le(upper))
    }
}

/// A union of intervals in the `a..b | c` form.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IntervalSet {
    pub intervals: Vec<Interval>,
}

impl IntervalSet {
    pub fn new(intervals: Vec<Interval>) -> Self {
        Self { intervals }
    }
    pub fn contains(&self, val: Number) -> bool {
        self.intervals.iter().any(|interval| interval.contains(val))
    }
    pub fn contains_int(&self, val: i128) -> bool {
        self.contains(Number::Int(val))
    }
    pub fn contains_float(&self, val: f64) -> bool {
        self.contains(Number::Float(val))
    }
}

impl FromStr for IntervalSet {
    type Err = AriError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut intervals = Vec::new();
        for part in s.split('|').map(str::trim) {
            let interval = match part.split_once("..") {
                Some((lower, upper)) => {
                    let lower = lower.trim();
                    let upper = upper.trim();
                    Interval {
                        lower: if lower == "min" { None } else { Some(lower.parse()?) },
                        upper: if upper == "max" { None } else { Some(upper.parse()?) },
                    }
                }
                None => Interval::singleton(part.parse()?),
            };
            intervals.push(interval);
        }
        Ok(Self { intervals })
    }
}

impl fmt::Display for IntervalSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (ix, interval) in self.intervals.iter().enumerate() {
            if ix > 0 {
                f.write_str(" | ")?;
            }
            match (interval.lower, interval.upper) {
                (Some(lower), Some(upper)) if lower == upper => write!(f, "{lower}")?,
                (lower, upper) => {
                    match lower {
                        Some(lower) => write!(f, "{lower}")?,
                        None => f.write_str("min")?,
                    }
                    f.write_str("..")?;
                    match upper {
                        Some(upper) => write!(f, "{upper}")?,
                        None => f.write_str("max")?,
                    }
                }
            }
        }
        Ok(())
    }
}

/// Text must fully match a regular expression.
#[derive(Debug, Clone)]
pub struct TextPattern {
    pub pattern: String,
    regex: Regex,
}

impl TextPattern {
    pub fn new(pattern: &str) -> Result<Self, AriError> {
        let regex = Regex::new(&format!("^(?:{pattern})$"))
            .map_err(|err| AriError::Schema(format!("invalid pattern {pattern}: {err}")))?;
        Ok(Self { pattern: pattern.to_string(), regex })
    }
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// Named integer values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IntegerEnums {
    pub values: BTreeMap<i128, String>,
}

impl IntegerEnums {
    pub fn label(&self, val: i128) -> Option<&str> {
        self.values.get(&val).map(String::as_str)
    }
    /// The valid values, ignoring their names.
    pub fn as_value_range(&self) -> IntervalSet {
        IntervalSet::new(self.values.keys().map(|val| Interval::singleton(Number::Int(*val))).collect())
    }
}

/// Named bit positions, other bits must be clear.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IntegerBits {
    pub positions: BTreeMap<u32, String>,
    pub mask: i128,
}

impl IntegerBits {
    pub fn new(positions: BTreeMap<u32, String>) -> Self {
        let mask = positions.keys().filter(|pos| **pos < 127).fold(0i128, |mask, pos| mask | (1i128 << pos));
        Self { positions, mask }
    }
    /// Names of the set bits, in position order.
    pub fn labels(&self, val: i128) -> Vec<&str> {
        self.positions
            .iter()
            .filter(|(pos, _)| **pos < 127 && val & (1i128 << **pos) != 0)
            .map(|(_, name)| name.as_str())
            .collect()
    }
}

/// The base an IDENT reference must derive from, once bound to a module
/// directory.
#[derive(Debug, Clone)]
pub struct BoundIdent {
    pub ident: Identity,
    key: (String, String),
    directory: Arc<dyn ModuleDirectory>,
}

// nesting limit when walking ident bases
const MAX_BASE_DEPTH: usize = 64;

impl BoundIdent {
    /// Fails when the base does not name an IDENT object in `directory`.
    pub fn bind(ident: Identity, directory: Arc<dyn ModuleDirectory>) -> Option<Self> {
        let key = match dereference(directory.as_ref(), &ident)? {
            Target::Ident(module, def) => (normalize_ident(&module.name), normalize_ident(&def.name)),
            _ => return None,
        };
        Some(Self { ident, key, directory })
    }

    /// True when `ident` is the base or derives from it through any chain
    /// of IDENT bases.
    pub fn derives(&self, ident: &Identity) -> bool {
        let mut seen: HashSet<(String, String), OtherHasher> = HashSet::default();
        self.derives_from(ident, &mut seen, 0)
    }

    fn derives_from(&self, ident: &Identity, seen: &mut HashSet<(String, String), OtherHasher>, depth: usize) -> bool {
        if depth > MAX_BASE_DEPTH {
            return false;
        }
        let Some(Target::Ident(module, def)) = dereference(self.directory.as_ref(), ident) else {
            return false;
        };
        let key = (normalize_ident(&module.name), normalize_ident(&def.name));
        if key == self.key {
            return true;
        }
        if !seen.insert(key) {
            return false;
        }
        def.bases.iter().any(|base| {
            let mut base_ident = base.ari.ident.clone();
            if base_ident.ns_id.is_none() {
                base_ident.ns_id = Some(module.name.as_str().into());
            }
            self.derives_from(&base_ident, seen, depth + 1)
        })
    }
}

#[derive(Debug, Clone)]
pub struct IdentRefBase<P: Phase> {
    /// The base as written in the module.
    pub base_text: String,
    pub base: P::IdentBase,
}

#[derive(Debug, Clone)]
pub enum Constraint<P: Phase> {
    /// Character count of text, octet count of bytes.
    Length(IntervalSet),
    Pattern(TextPattern),
    Range(IntervalSet),
    IntegerEnums(IntegerEnums),
    IntegerBits(IntegerBits),
    /// Only checks that the value is well-formed CBOR, the CDDL text is
    /// carried but not interpreted.
    CborCddl(String),
    IdentRefBase(IdentRefBase<P>),
}

impl<P: Phase> Constraint<P> {
    /// The ADM keyword of this constraint.
    pub fn kind(&self) -> &'static str {
        match self {
            Constraint::Length(_) => "length",
            Constraint::Pattern(_) => "pattern",
            Constraint::Range(_) => "range",
            Constraint::IntegerEnums(_) => "enum",
            Constraint::IntegerBits(_) => "bit",
            Constraint::CborCddl(_) => "cddl",
            Constraint::IdentRefBase(_) => "base",
        }
    }

    /// The struct types this constraint is meaningful for.
    pub fn applicable(&self) -> BTreeSet<StructType> {
        match self {
            Constraint::Length(_) => [StructType::TextStr, StructType::ByteStr, StructType::Cbor].into(),
            Constraint::Pattern(_) => [StructType::TextStr].into(),
            Constraint::Range(_) => INTEGER_TYPES
                .iter()
                .copied()
                .chain([StructType::Real32, StructType::Real64])
                .collect(),
            Constraint::IntegerEnums(_) | Constraint::IntegerBits(_) => INTEGER_TYPES.into(),
            Constraint::CborCddl(_) => [StructType::Cbor].into(),
            Constraint::IdentRefBase(_) => [StructType::Ident].into(),
        }
    }
}

impl Constraint<Bound> {
    pub fn is_valid(&self, ari: &Ari) -> bool {
        if let Constraint::IdentRefBase(refbase) = self {
            return match ari {
                Ari::Reference(objref) if objref.ident.type_id == StructType::Ident => {
                    refbase.base.derives(&objref.ident)
                }
                _ => false,
            };
        }
        let Ari::Literal(lit) = ari else {
            return false;
        };
        match (self, &lit.value) {
            (Constraint::Length(ranges), Value::Text(text)) => ranges.contains_int(text.chars().count() as i128),
            (Constraint::Length(ranges), Value::Bytes(data)) => ranges.contains_int(data.len() as i128),
            (Constraint::Pattern(pattern), Value::Text(text)) => pattern.is_match(text),
            (Constraint::Range(ranges), Value::Int(val)) => ranges.contains_int(*val),
            (Constraint::Range(ranges), Value::Float(val)) => ranges.contains_float(*val),
            (Constraint::IntegerEnums(enums), Value::Int(val)) => enums.values.contains_key(val),
            (Constraint::IntegerBits(bits), Value::Int(val)) => val & !bits.mask == 0,
            (Constraint::CborCddl(_), Value::Bytes(data)) => {
                matches!(cbor::from_slice(data), Ok((_, used)) if used == data.len())
            }
            _ => false,
        }
    }
}
