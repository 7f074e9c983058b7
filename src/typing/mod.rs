//! Semantic types: which ARI values an ADM position admits, and how other
//! values are coerced into it.
//!
//! A [`SemType`] is built in two phases. Statement decoding produces a
//! `SemType<Unbound>` whose type uses only name their base, then
//! [`crate::lookup::TypeResolver`] binds every name and yields a
//! `SemType<Bound>`. Only the bound form can check values.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::ari::{Ari, AriMap, LiteralAri, ReferenceAri, StructType, Table, Value};
use crate::error::{ConversionError, TypeName};

pub mod builtin;
pub mod constraint;

use builtin::BuiltinType;
use constraint::{BoundIdent, Constraint};

/// Marks whether a type tree has had its names bound.
pub trait Phase: Clone + fmt::Debug {
    type Base: Clone + fmt::Debug;
    type IdentBase: Clone + fmt::Debug;
}

#[derive(Debug, Clone, Copy)]
pub struct Unbound;

#[derive(Debug, Clone, Copy)]
pub struct Bound;

impl Phase for Unbound {
    type Base = TypeRef;
    type IdentBase = ReferenceAri;
}

impl Phase for Bound {
    type Base = Binding;
    type IdentBase = BoundIdent;
}

/// A possibly namespace-qualified type name as written.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeRef {
    pub ns: Option<String>,
    pub name: String,
}

impl TypeRef {
    pub fn new(ns: Option<&str>, name: &str) -> Self {
        Self { ns: ns.map(str::to_string), name: name.to_string() }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.ns {
            Some(ns) => write!(f, "{}:{}", ns, self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// What a bound type use refers to.
#[derive(Debug, Clone)]
pub enum Binding {
    Builtin(BuiltinType),
    /// A typedef, shared between every use of it within one module.
    Named { name: TypeName, target: Arc<SemType<Bound>> },
}

impl Binding {
    pub fn type_ids(&self) -> BTreeSet<StructType> {
        match self {
            Binding::Builtin(builtin) => builtin.type_ids(),
            Binding::Named { target, .. } => target.type_ids(),
        }
    }
    pub fn get(&self, ari: &Ari) -> Option<Ari> {
        match self {
            Binding::Builtin(builtin) => builtin.get(ari),
            Binding::Named { target, .. } => target.get(ari),
        }
    }
    pub fn convert(&self, ari: &Ari) -> Result<Ari, ConversionError> {
        match self {
            Binding::Builtin(builtin) => builtin.convert(ari),
            Binding::Named { target, .. } => target.convert(ari),
        }
    }
}

/// Use of a base type with optional units and constraints.
#[derive(Debug, Clone)]
pub struct TypeUse<P: Phase> {
    pub base: P::Base,
    pub units: Option<String>,
    pub constraints: Vec<Constraint<P>>,
}

/// Any one of the member types, in order of preference.
#[derive(Debug, Clone)]
pub struct TypeUnion<P: Phase> {
    pub types: Vec<SemType<P>>,
}

/// An AC whose items all share one type.
#[derive(Debug, Clone)]
pub struct UniformList<P: Phase> {
    pub base: Box<SemType<P>>,
    pub min_elements: Option<usize>,
    pub max_elements: Option<usize>,
}

/// A run of same-typed items, inline within a [`DiverseList`] or as a
/// whole AC.
#[derive(Debug, Clone)]
pub struct Sequence<P: Phase> {
    pub base: Box<SemType<P>>,
    pub min_elements: Option<usize>,
    pub max_elements: Option<usize>,
}

/// An AC with a fixed sequence of item types.
#[derive(Debug, Clone)]
pub struct DiverseList<P: Phase> {
    pub parts: Vec<SemType<P>>,
}

/// An AM with uniform key and value types, either may be unconstrained.
#[derive(Debug, Clone)]
pub struct UniformMap<P: Phase> {
    pub kbase: Option<Box<SemType<P>>>,
    pub vbase: Option<Box<SemType<P>>>,
}

#[derive(Debug, Clone)]
pub struct TableColumn<P: Phase> {
    pub name: String,
    pub base: SemType<P>,
}

/// A TBL with named, typed columns.
#[derive(Debug, Clone)]
pub struct TableTemplate<P: Phase> {
    pub columns: Vec<TableColumn<P>>,
    pub key: Option<String>,
    pub unique: Vec<Vec<String>>,
}

#[derive(Debug, Clone)]
pub enum SemType<P: Phase> {
    Use(TypeUse<P>),
    Union(TypeUnion<P>),
    UniformList(UniformList<P>),
    Sequence(Sequence<P>),
    DiverseList(DiverseList<P>),
    UniformMap(UniformMap<P>),
    TableTemplate(TableTemplate<P>),
}

impl SemType<Unbound> {
    /// An unconstrained use of a named type.
    pub fn named(ns: Option<&str>, name: &str) -> Self {
        SemType::Use(TypeUse { base: TypeRef::new(ns, name), units: None, constraints: Vec::new() })
    }
}

impl From<BuiltinType> for SemType<Bound> {
    fn from(builtin: BuiltinType) -> Self {
        SemType::Use(TypeUse { base: Binding::Builtin(builtin), units: None, constraints: Vec::new() })
    }
}

impl<P: Phase> SemType<P> {
    pub fn kind(&self) -> &'static str {
        match self {
            SemType::Use(_) => "type",
            SemType::Union(_) => "union",
            SemType::UniformList(_) => "ulist",
            SemType::Sequence(_) => "seq",
            SemType::DiverseList(_) => "dlist",
            SemType::UniformMap(_) => "umap",
            SemType::TableTemplate(_) => "tblt",
        }
    }
}

// the item operation driving a container check
type ItemOp<'a> = &'a dyn Fn(&SemType<Bound>, &Ari) -> Result<Ari, ConversionError>;

fn get_op(typ: &SemType<Bound>, ari: &Ari) -> Result<Ari, ConversionError> {
    typ.get(ari).ok_or_else(|| ConversionError::mismatch(format!("value does not match {}", typ.kind())))
}

fn convert_op(typ: &SemType<Bound>, ari: &Ari) -> Result<Ari, ConversionError> {
    typ.convert(ari)
}

impl SemType<Bound> {
    /// The struct types that values of this type can have.
    pub fn type_ids(&self) -> BTreeSet<StructType> {
        match self {
            SemType::Use(typeuse) => typeuse.base.type_ids(),
            SemType::Union(union) => union.types.iter().flat_map(SemType::type_ids).collect(),
            SemType::UniformList(_) | SemType::Sequence(_) | SemType::DiverseList(_) => [StructType::Ac].into(),
            SemType::UniformMap(_) => [StructType::Am].into(),
            SemType::TableTemplate(_) => [StructType::Tbl].into(),
        }
    }

    /// The value if it already belongs to this type.
    pub fn get(&self, ari: &Ari) -> Option<Ari> {
        if ari.is_undefined() {
            return Some(ari.clone());
        }
        match self {
            SemType::Use(typeuse) => {
                let got = typeuse.base.get(ari)?;
                typeuse.constraints.iter().all(|constraint| constraint.is_valid(&got)).then_some(got)
            }
            SemType::Union(union) => union.types.iter().find_map(|typ| typ.get(ari)),
            _ => self.apply(ari, &get_op).ok(),
        }
    }

    /// Coerce a value into this type.
    pub fn convert(&self, ari: &Ari) -> Result<Ari, ConversionError> {
        if ari.is_undefined() {
            return Ok(ari.clone());
        }
        match self {
            SemType::Use(typeuse) => {
                let out = typeuse.base.convert(ari)?;
                if let Some(failed) = typeuse.constraints.iter().find(|constraint| !constraint.is_valid(&out)) {
                    return Err(ConversionError::value(format!("{} constraint not met", failed.kind())));
                }
                Ok(out)
            }
            SemType::Union(union) => {
                if let Some(got) = self.get(ari) {
                    return Ok(got);
                }
                union
                    .types
                    .iter()
                    .find_map(|typ| typ.convert(ari).ok())
                    .ok_or_else(|| ConversionError::mismatch("value matches no member of the union"))
            }
            _ => self.apply(ari, &convert_op),
        }
    }

    // container types share this walk, `op` decides between get and convert
    fn apply(&self, ari: &Ari, op: ItemOp<'_>) -> Result<Ari, ConversionError> {
        match self {
            SemType::UniformList(ulist) => {
                let items = list_items(ari)?;
                check_count(items.len(), ulist.min_elements, ulist.max_elements)?;
                let items = items.iter().map(|item| op(&*ulist.base, item)).collect::<Result<Vec<_>, _>>()?;
                Ok(Ari::Literal(LiteralAri::typed(Value::List(items), StructType::Ac)))
            }
            SemType::Sequence(seq) => {
                let items = list_items(ari)?;
                check_count(items.len(), seq.min_elements, seq.max_elements)?;
                let items = items.iter().map(|item| op(&*seq.base, item)).collect::<Result<Vec<_>, _>>()?;
                Ok(Ari::Literal(LiteralAri::typed(Value::List(items), StructType::Ac)))
            }
            SemType::DiverseList(dlist) => {
                let items = list_items(ari)?;
                let mut out = Vec::with_capacity(items.len());
                let mut rest = items;
                for part in &dlist.parts {
                    rest = match_part(part, rest, op, &mut out)?;
                }
                if !rest.is_empty() {
                    return Err(ConversionError::value(format!("{} unmatched items at end of list", rest.len())));
                }
                Ok(Ari::Literal(LiteralAri::typed(Value::List(out), StructType::Ac)))
            }
            SemType::UniformMap(umap) => {
                let map = map_items(ari)?;
                let mut out = AriMap::with_capacity(map.len());
                for (key, val) in map {
                    let key = match &umap.kbase {
                        Some(kbase) => untyped_key(op(&**kbase, key)?),
                        None => key.clone(),
                    };
                    let val = match &umap.vbase {
                        Some(vbase) => op(&**vbase, val)?,
                        None => val.clone(),
                    };
                    out.insert(key, val);
                }
                Ok(Ari::Literal(LiteralAri::typed(Value::Map(out), StructType::Am)))
            }
            SemType::TableTemplate(tblt) => {
                let table = table_items(ari)?;
                if table.ncols() != tblt.columns.len() {
                    return Err(ConversionError::value(format!(
                        "table has {} columns, expected {}",
                        table.ncols(),
                        tblt.columns.len()
                    )));
                }
                let mut cells = Vec::with_capacity(table.cells().len());
                for (row_ix, row) in table.rows().enumerate() {
                    let mut failed = Vec::new();
                    for (column, cell) in tblt.columns.iter().zip(row) {
                        match op(&column.base, cell) {
                            Ok(cell) => cells.push(cell),
                            Err(_) => failed.push(column.name.clone()),
                        }
                    }
                    if !failed.is_empty() {
                        return Err(ConversionError::Columns { row: row_ix, columns: failed });
                    }
                }
                let table = Table::from_cells(tblt.columns.len(), cells)?;
                Ok(Ari::Literal(LiteralAri::typed(Value::Table(table), StructType::Tbl)))
            }
            SemType::Use(_) | SemType::Union(_) => op(self, ari),
        }
    }
}

/// Consume the items one diverse-list part matches, returning the rest.
fn match_part<'a>(
    part: &SemType<Bound>,
    items: &'a [Ari],
    op: ItemOp<'_>,
    out: &mut Vec<Ari>,
) -> Result<&'a [Ari], ConversionError> {
    let SemType::Sequence(seq) = part else {
        let Some((first, rest)) = items.split_first() else {
            return Err(ConversionError::value("list is shorter than its parts"));
        };
        out.push(op(part, first)?);
        return Ok(rest);
    };
    let limit = seq.max_elements.unwrap_or(usize::MAX);
    let mut count = 0;
    for item in items {
        if count >= limit {
            break;
        }
        match op(&*seq.base, item) {
            Ok(item) => out.push(item),
            Err(_) => break,
        }
        count += 1;
    }
    check_count(count, seq.min_elements, None)?;
    Ok(&items[count..])
}

fn check_count(count: usize, min: Option<usize>, max: Option<usize>) -> Result<(), ConversionError> {
    if let Some(min) = min {
        if count < min {
            return Err(ConversionError::value(format!("{count} items is fewer than {min}")));
        }
    }
    if let Some(max) = max {
        if count > max {
            return Err(ConversionError::value(format!("{count} items is more than {max}")));
        }
    }
    Ok(())
}

fn list_items(ari: &Ari) -> Result<&[Ari], ConversionError> {
    match ari {
        Ari::Literal(LiteralAri { value: Value::List(items), type_id: None | Some(StructType::Ac) }) => Ok(items),
        _ => Err(ConversionError::mismatch("value is not an AC")),
    }
}

fn map_items(ari: &Ari) -> Result<&AriMap, ConversionError> {
    match ari {
        Ari::Literal(LiteralAri { value: Value::Map(map), type_id: None | Some(StructType::Am) }) => Ok(map),
        _ => Err(ConversionError::mismatch("value is not an AM")),
    }
}

fn table_items(ari: &Ari) -> Result<&Table, ConversionError> {
    match ari {
        Ari::Literal(LiteralAri { value: Value::Table(table), type_id: None | Some(StructType::Tbl) }) => Ok(table),
        _ => Err(ConversionError::mismatch("value is not a TBL")),
    }
}

/// AM keys are always untyped primitives.
fn untyped_key(key: Ari) -> Ari {
    match key {
        Ari::Literal(lit) => Ari::Literal(LiteralAri::new(lit.value)),
        other => other,
    }
}
