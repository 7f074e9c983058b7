//! Type positions of ADM statements, to and from unbound semantic types.

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, warn};

use super::ModuleContext;
use super::statement::Statement;
use crate::ari::{Ari, LiteralAri, StructType, Value, normalize_ident};
use crate::ari_text;
use crate::error::{AriError, Result};
use crate::lookup::OtherHasher;
use crate::typing::constraint::{Constraint, IdentRefBase, IntegerBits, IntegerEnums, TextPattern};
use crate::typing::{
    DiverseList, SemType, Sequence, TableColumn, TableTemplate, TypeRef, TypeUnion, TypeUse, UniformList, UniformMap,
    Unbound,
};

/// Keywords that each introduce one semantic type.
const TYPE_KEYWORDS: [&str; 7] = ["type", "ulist", "dlist", "umap", "tblt", "union", "seq"];

fn schema(message: impl Into<String>) -> AriError {
    AriError::Schema(message.into())
}

fn parse_count(stmt: &Statement) -> Result<usize> {
    let arg = stmt.required_arg()?;
    arg.parse().map_err(|_| schema(format!("invalid {} value {arg}", stmt.keyword)))
}

// ------------- Decoding -------------
#[derive(Debug)]
pub struct TypeDecoder<'a> {
    ctx: &'a ModuleContext<'a>,
}

impl<'a> TypeDecoder<'a> {
    pub fn new(ctx: &'a ModuleContext<'a>) -> Self {
        Self { ctx }
    }

    fn type_keyword<'s>(&self, stmt: &'s Statement) -> Option<&'s str> {
        self.ctx.ext_name(&stmt.keyword).filter(|name| TYPE_KEYWORDS.contains(name))
    }

    /// The one type statement among the substatements of `parent`.
    pub fn decode(&self, parent: &Statement) -> Result<SemType<Unbound>> {
        let mut found = parent.substmts.iter().filter(|stmt| self.type_keyword(stmt).is_some());
        let Some(type_stmt) = found.next() else {
            return Err(schema(format!("no type present under {}", parent.keyword)));
        };
        if found.next().is_some() {
            return Err(schema(format!("too many types present under {}", parent.keyword)));
        }
        let typeobj = self.decode_stmt(type_stmt)?;
        debug!("got {} type under {}", typeobj.kind(), parent.keyword);
        Ok(typeobj)
    }

    fn decode_stmt(&self, stmt: &Statement) -> Result<SemType<Unbound>> {
        match self.type_keyword(stmt) {
            Some("type") => self.handle_type(stmt),
            Some("ulist") => Ok(SemType::UniformList(UniformList {
                base: Box::new(self.decode(stmt)?),
                min_elements: stmt.find_one("min-elements").map(parse_count).transpose()?,
                max_elements: stmt.find_one("max-elements").map(parse_count).transpose()?,
            })),
            Some("seq") => Ok(SemType::Sequence(Sequence {
                base: Box::new(self.decode(stmt)?),
                min_elements: stmt.find_one("min-elements").map(parse_count).transpose()?,
                max_elements: stmt.find_one("max-elements").map(parse_count).transpose()?,
            })),
            Some("dlist") => Ok(SemType::DiverseList(DiverseList { parts: self.decode_all(stmt)? })),
            Some("union") => Ok(SemType::Union(TypeUnion { types: self.decode_all(stmt)? })),
            Some("umap") => {
                let kbase = match stmt.find_one(&self.ctx.ext("keys")) {
                    Some(sub) => Some(Box::new(self.decode(sub)?)),
                    None => None,
                };
                let vbase = match stmt.find_one(&self.ctx.ext("values")) {
                    Some(sub) => Some(Box::new(self.decode(sub)?)),
                    None => None,
                };
                Ok(SemType::UniformMap(UniformMap { kbase, vbase }))
            }
            Some("tblt") => self.handle_tblt(stmt),
            _ => Err(schema(format!("{} is not a type statement", stmt.keyword))),
        }
    }

    fn decode_all(&self, stmt: &Statement) -> Result<Vec<SemType<Unbound>>> {
        stmt.substmts
            .iter()
            .filter(|sub| self.type_keyword(sub).is_some())
            .map(|sub| self.decode_stmt(sub))
            .collect()
    }

    fn handle_type(&self, stmt: &Statement) -> Result<SemType<Unbound>> {
        let mut typeuse = TypeUse { base: self.type_ref(stmt.required_arg()?)?, units: None, constraints: Vec::new() };

        // constraints keep the order of their statements
        for rfn in &stmt.substmts {
            match (rfn.keyword.as_str(), self.ctx.ext_name(&rfn.keyword)) {
                ("units", _) => typeuse.units = Some(rfn.required_arg()?.trim().to_string()),
                ("length", _) => typeuse.constraints.push(Constraint::Length(rfn.required_arg()?.parse()?)),
                ("pattern", _) => typeuse.constraints.push(Constraint::Pattern(TextPattern::new(rfn.required_arg()?)?)),
                ("range", _) => typeuse.constraints.push(Constraint::Range(rfn.required_arg()?.parse()?)),
                (_, Some("int-labels")) => typeuse.constraints.push(self.int_labels(rfn)?),
                (_, Some("cddl")) => typeuse.constraints.push(Constraint::CborCddl(rfn.required_arg()?.to_string())),
                (_, Some("base")) => {
                    let text = rfn.required_arg()?;
                    let base = match ari_text::Decoder::new().decode(text)? {
                        Ari::Reference(objref) if objref.ident.type_id == StructType::Ident => objref,
                        _ => return Err(schema(format!("base {text} is not an IDENT reference"))),
                    };
                    typeuse.constraints.push(Constraint::IdentRefBase(IdentRefBase { base_text: text.to_string(), base }));
                }
                _ => {}
            }
        }
        Ok(SemType::Use(typeuse))
    }

    /// Either enumerated values or named bits.
    fn int_labels(&self, stmt: &Statement) -> Result<Constraint<Unbound>> {
        let mut values = BTreeMap::new();
        let mut positions = BTreeMap::new();
        let mut next_value = 0i128;
        let mut next_position = 0u32;
        for sub in &stmt.substmts {
            match sub.keyword.as_str() {
                "enum" => {
                    let value = match sub.find_one("value") {
                        Some(val) => val
                            .required_arg()?
                            .parse::<i128>()
                            .map_err(|_| schema(format!("invalid enum value {}", val.arg_str())))?,
                        None => next_value,
                    };
                    values.insert(value, sub.required_arg()?.to_string());
                    next_value = value + 1;
                }
                "bit" => {
                    let position = match sub.find_one("position") {
                        Some(pos) => pos
                            .required_arg()?
                            .parse::<u32>()
                            .map_err(|_| schema(format!("invalid bit position {}", pos.arg_str())))?,
                        None => next_position,
                    };
                    positions.insert(position, sub.required_arg()?.to_string());
                    next_position = position + 1;
                }
                _ => {}
            }
        }
        match (values.is_empty(), positions.is_empty()) {
            (false, true) => Ok(Constraint::IntegerEnums(IntegerEnums { values })),
            (true, false) => Ok(Constraint::IntegerBits(IntegerBits::new(positions))),
            _ => Err(schema("int-labels needs either enum or bit statements")),
        }
    }

    fn handle_tblt(&self, stmt: &Statement) -> Result<SemType<Unbound>> {
        let mut columns = Vec::new();
        let mut names: HashSet<String, OtherHasher> = HashSet::default();
        for col_stmt in stmt.find_all(&self.ctx.ext("column")) {
            let column = TableColumn { name: col_stmt.required_arg()?.to_string(), base: self.decode(col_stmt)? };
            if matches!(column.base, SemType::TableTemplate(_)) {
                warn!("table column {} is typed to contain another table", column.name);
            }
            if !names.insert(column.name.clone()) {
                warn!("duplicate table column name {}", column.name);
            }
            columns.push(column);
        }
        let key = stmt.find_one(&self.ctx.ext("key")).map(|key| key.arg_str().to_string());
        let unique = stmt
            .find_all(&self.ctx.ext("unique"))
            .map(|uniq| uniq.arg_str().split(',').map(|name| name.trim().to_string()).collect())
            .collect();
        Ok(SemType::TableTemplate(TableTemplate { columns, key, unique }))
    }

    /// A type name as `prefix:name`, bare `name`, or in ARI form.
    pub fn type_ref(&self, text: &str) -> Result<TypeRef> {
        if text.starts_with('/') || text.starts_with('.') || text.to_ascii_lowercase().starts_with("ari:") {
            return match ari_text::Decoder::new().decode(text)? {
                Ari::Literal(LiteralAri { value: Value::AriType(typ), type_id: Some(StructType::AriType) }) => {
                    Ok(TypeRef { ns: None, name: normalize_ident(typ.name()) })
                }
                Ari::Reference(objref) if objref.ident.type_id == StructType::Typedef => Ok(TypeRef {
                    ns: objref.ident.ns_id.map(|ns| normalize_ident(&ns.to_string())),
                    name: normalize_ident(&objref.ident.obj_id.to_string()),
                }),
                _ => Err(schema(format!("{text} does not name a type"))),
            };
        }
        match text.split_once(':') {
            Some((prefix, name)) => {
                let ns = self
                    .ctx
                    .module_for_prefix(prefix)
                    .ok_or_else(|| schema(format!("unknown module prefix {prefix}")))?;
                Ok(TypeRef { ns: ns.map(normalize_ident), name: normalize_ident(name) })
            }
            None => Ok(TypeRef { ns: None, name: normalize_ident(text) }),
        }
    }
}

// ------------- Encoding -------------
#[derive(Debug)]
pub struct TypeEncoder<'a> {
    ctx: &'a ModuleContext<'a>,
}

impl<'a> TypeEncoder<'a> {
    pub fn new(ctx: &'a ModuleContext<'a>) -> Self {
        Self { ctx }
    }

    /// Add the statement for `typeobj` under `parent`.
    pub fn encode(&self, typeobj: &SemType<Unbound>, parent: &mut Statement) {
        match typeobj {
            SemType::Use(typeuse) => {
                let type_stmt = parent.add(self.ctx.ext("type"), Some(self.type_name(&typeuse.base).as_str()));
                if let Some(units) = &typeuse.units {
                    type_stmt.add("units", Some(units.as_str()));
                }
                for constraint in &typeuse.constraints {
                    self.encode_constraint(constraint, type_stmt);
                }
            }
            SemType::UniformList(ulist) => {
                let stmt = parent.add(self.ctx.ext("ulist"), None);
                self.encode(&ulist.base, stmt);
                put_counts(stmt, ulist.min_elements, ulist.max_elements);
            }
            SemType::Sequence(seq) => {
                let stmt = parent.add(self.ctx.ext("seq"), None);
                self.encode(&seq.base, stmt);
                put_counts(stmt, seq.min_elements, seq.max_elements);
            }
            SemType::DiverseList(dlist) => {
                let stmt = parent.add(self.ctx.ext("dlist"), None);
                for part in &dlist.parts {
                    self.encode(part, stmt);
                }
            }
            SemType::Union(union) => {
                let stmt = parent.add(self.ctx.ext("union"), None);
                for member in &union.types {
                    self.encode(member, stmt);
                }
            }
            SemType::UniformMap(umap) => {
                let stmt = parent.add(self.ctx.ext("umap"), None);
                if let Some(kbase) = &umap.kbase {
                    let keys = stmt.add(self.ctx.ext("keys"), None);
                    self.encode(kbase, keys);
                }
                if let Some(vbase) = &umap.vbase {
                    let values = stmt.add(self.ctx.ext("values"), None);
                    self.encode(vbase, values);
                }
            }
            SemType::TableTemplate(tblt) => {
                let stmt = parent.add(self.ctx.ext("tblt"), None);
                for column in &tblt.columns {
                    let col_stmt = stmt.add(self.ctx.ext("column"), Some(column.name.as_str()));
                    self.encode(&column.base, col_stmt);
                }
                if let Some(key) = &tblt.key {
                    stmt.add(self.ctx.ext("key"), Some(key.as_str()));
                }
                for uniq in &tblt.unique {
                    stmt.add(self.ctx.ext("unique"), Some(uniq.join(", ").as_str()));
                }
            }
        }
    }

    fn encode_constraint(&self, constraint: &Constraint<Unbound>, type_stmt: &mut Statement) {
        match constraint {
            Constraint::Length(ranges) => {
                type_stmt.add("length", Some(ranges.to_string().as_str()));
            }
            Constraint::Pattern(pattern) => {
                type_stmt.add("pattern", Some(pattern.pattern.as_str()));
            }
            Constraint::Range(ranges) => {
                type_stmt.add("range", Some(ranges.to_string().as_str()));
            }
            Constraint::IntegerEnums(enums) => {
                let labels = type_stmt.add(self.ctx.ext("int-labels"), None);
                for (value, name) in &enums.values {
                    labels.add("enum", Some(name.as_str())).add("value", Some(value.to_string().as_str()));
                }
            }
            Constraint::IntegerBits(bits) => {
                let labels = type_stmt.add(self.ctx.ext("int-labels"), None);
                for (position, name) in &bits.positions {
                    labels.add("bit", Some(name.as_str())).add("position", Some(position.to_string().as_str()));
                }
            }
            Constraint::CborCddl(cddl) => {
                type_stmt.add(self.ctx.ext("cddl"), Some(cddl.as_str()));
            }
            Constraint::IdentRefBase(refbase) => {
                type_stmt.add(self.ctx.ext("base"), Some(refbase.base_text.as_str()));
            }
        }
    }

    fn type_name(&self, typeref: &TypeRef) -> String {
        let Some(ns) = &typeref.ns else {
            return typeref.name.clone();
        };
        if normalize_ident(ns) == normalize_ident(&self.ctx.module) {
            return typeref.name.clone();
        }
        match self.ctx.prefix_for_module(ns) {
            Some(prefix) => format!("{prefix}:{}", typeref.name),
            None => format!("//{ns}/TYPEDEF/{}", typeref.name),
        }
    }
}

fn put_counts(stmt: &mut Statement, min: Option<usize>, max: Option<usize>) {
    if let Some(min) = min {
        stmt.add("min-elements", Some(min.to_string().as_str()));
    }
    if let Some(max) = max {
        stmt.add("max-elements", Some(max.to_string().as_str()));
    }
}
