//! Finding modules and their objects, and binding type names.

// the directory is shared with every bound IDENT base
use std::sync::Arc;

// caches keyed by normalized (module, name) pairs
use core::hash::BuildHasherDefault;
use seahash::SeaHasher;
use std::collections::{BTreeSet, HashMap, HashSet};

use std::fmt;

use tracing::{debug, warn};

// our own stuff that we need
use crate::adm::{AdmObject, IdentDef, Module, Typedef};
use crate::ari::{Ari, IdSeg, Identity, StructType, normalize_ident};
use crate::error::{AriError, Result, TypeName, TypeResolverError};
use crate::typing::builtin::BuiltinType;
use crate::typing::constraint::{BoundIdent, Constraint, IdentRefBase};
use crate::typing::{
    Binding, Bound, DiverseList, Sequence, SemType, TableColumn, TableTemplate, TypeRef, TypeUnion, TypeUse,
    UniformList, UniformMap, Unbound,
};

pub type OtherHasher = BuildHasherDefault<SeaHasher>;

type ModuleKey = (String, String);

// ------------- Directory -------------
/// Where modules are found by namespace, usually an [`crate::adm::AdmSet`].
pub trait ModuleDirectory: fmt::Debug + Send + Sync {
    fn find_module(&self, ns: &IdSeg) -> Option<&Module>;

    fn find_typedef(&self, module: &str, name: &str) -> Option<&Typedef> {
        self.find_module(&IdSeg::from(module))?.typedef(name)
    }
}

/// The definition a reference points at.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    Typedef(&'a Module, &'a Typedef),
    Ident(&'a Module, &'a IdentDef),
    Object(&'a Module, &'a AdmObject),
}

/// Look up the object an identity names, relative identities never match.
pub fn dereference<'a>(directory: &'a dyn ModuleDirectory, ident: &Identity) -> Option<Target<'a>> {
    let module = directory.find_module(ident.ns_id.as_ref()?)?;
    match ident.type_id {
        StructType::Typedef => module.typedef_by_id(&ident.obj_id).map(|def| Target::Typedef(module, def)),
        StructType::Ident => module.ident(&ident.obj_id).map(|def| Target::Ident(module, def)),
        typ => module.object(typ, &ident.obj_id).map(|obj| Target::Object(module, obj)),
    }
}

// ------------- RelativeResolver -------------
/// Fills in the namespace of module-relative references.
#[derive(Debug, Clone)]
pub struct RelativeResolver {
    pub ns_id: IdSeg,
}

impl RelativeResolver {
    pub fn new(ns_id: impl Into<IdSeg>) -> Self {
        Self { ns_id: ns_id.into() }
    }

    pub fn resolve(&self, ari: &Ari) -> Ari {
        ari.map(&mut |item| match item {
            Ari::Reference(mut objref) if objref.ident.ns_id.is_none() => {
                objref.ident.ns_id = Some(self.ns_id.clone());
                Ari::Reference(objref)
            }
            other => other,
        })
    }
}

// ------------- TypeResolver -------------
/// Binds the type names of an unbound type tree.
///
/// Each typedef is bound once per [`TypeResolver::resolve`] call and then
/// shared by every use of it within that call. Every name that cannot be
/// bound is collected, and reported together once the whole tree has been
/// walked. A constraint placed on a type it cannot apply to is a schema
/// error rather than a constraint that never holds.
#[derive(Debug)]
pub struct TypeResolver {
    directory: Arc<dyn ModuleDirectory>,
    cache: HashMap<ModuleKey, Arc<SemType<Bound>>, OtherHasher>,
    in_progress: HashSet<ModuleKey, OtherHasher>,
    badtypes: BTreeSet<TypeName>,
    misapplied: Vec<String>,
}

impl TypeResolver {
    pub fn new(directory: Arc<dyn ModuleDirectory>) -> Self {
        Self {
            directory,
            cache: HashMap::<ModuleKey, Arc<SemType<Bound>>, OtherHasher>::default(),
            in_progress: HashSet::<ModuleKey, OtherHasher>::default(),
            badtypes: BTreeSet::new(),
            misapplied: Vec::new(),
        }
    }

    /// Bind `typ`, which is used within `module`.
    pub fn resolve(&mut self, typ: &SemType<Unbound>, module: &Module) -> Result<SemType<Bound>> {
        self.cache.clear();
        self.in_progress.clear();
        self.badtypes.clear();
        self.misapplied.clear();

        let bound = self.bind(typ, module);
        debug!("resolved {} type in {} with {} typedefs bound", typ.kind(), module.name, self.cache.len());
        if !self.badtypes.is_empty() {
            return Err(TypeResolverError { badtypes: std::mem::take(&mut self.badtypes) }.into());
        }
        if !self.misapplied.is_empty() {
            return Err(AriError::Schema(std::mem::take(&mut self.misapplied).join("; ")));
        }
        bound.ok_or_else(|| TypeResolverError { badtypes: BTreeSet::new() }.into())
    }

    fn bind(&mut self, typ: &SemType<Unbound>, module: &Module) -> Option<SemType<Bound>> {
        match typ {
            SemType::Use(typeuse) => {
                let base = self.bind_ref(&typeuse.base, module);
                let constraints: Vec<_> =
                    typeuse.constraints.iter().map(|constraint| self.bind_constraint(constraint, module)).collect();
                let base = base?;
                let constraints = constraints.into_iter().collect::<Option<Vec<_>>>()?;
                let type_ids = base.type_ids();
                for constraint in &constraints {
                    if constraint.applicable().is_disjoint(&type_ids) {
                        let message = format!("{} constraint does not apply to type {}", constraint.kind(), typeuse.base);
                        warn!("{}", message);
                        self.misapplied.push(message);
                    }
                }
                Some(SemType::Use(TypeUse { base, units: typeuse.units.clone(), constraints }))
            }
            SemType::Union(union) => Some(SemType::Union(TypeUnion { types: self.bind_all(&union.types, module)? })),
            SemType::UniformList(ulist) => Some(SemType::UniformList(UniformList {
                base: Box::new(self.bind(&ulist.base, module)?),
                min_elements: ulist.min_elements,
                max_elements: ulist.max_elements,
            })),
            SemType::Sequence(seq) => Some(SemType::Sequence(Sequence {
                base: Box::new(self.bind(&seq.base, module)?),
                min_elements: seq.min_elements,
                max_elements: seq.max_elements,
            })),
            SemType::DiverseList(dlist) => {
                Some(SemType::DiverseList(DiverseList { parts: self.bind_all(&dlist.parts, module)? }))
            }
            SemType::UniformMap(umap) => {
                let kbase = umap.kbase.as_ref().map(|kbase| self.bind(kbase, module));
                let vbase = umap.vbase.as_ref().map(|vbase| self.bind(vbase, module));
                let kbase = match kbase {
                    Some(kbase) => Some(Box::new(kbase?)),
                    None => None,
                };
                let vbase = match vbase {
                    Some(vbase) => Some(Box::new(vbase?)),
                    None => None,
                };
                Some(SemType::UniformMap(UniformMap { kbase, vbase }))
            }
            SemType::TableTemplate(tblt) => {
                let columns: Vec<_> = tblt
                    .columns
                    .iter()
                    .map(|column| {
                        self.bind(&column.base, module).map(|base| TableColumn { name: column.name.clone(), base })
                    })
                    .collect();
                Some(SemType::TableTemplate(TableTemplate {
                    columns: columns.into_iter().collect::<Option<Vec<_>>>()?,
                    key: tblt.key.clone(),
                    unique: tblt.unique.clone(),
                }))
            }
        }
    }

    // binds every member even after a failure so all bad types are seen
    fn bind_all(&mut self, types: &[SemType<Unbound>], module: &Module) -> Option<Vec<SemType<Bound>>> {
        let bound: Vec<_> = types.iter().map(|typ| self.bind(typ, module)).collect();
        bound.into_iter().collect()
    }

    fn bind_ref(&mut self, typeref: &TypeRef, module: &Module) -> Option<Binding> {
        let local = match &typeref.ns {
            None => true,
            Some(ns) => module.matches(&IdSeg::from(ns.as_str())),
        };
        if local {
            if let Some(typedef) = module.typedef(&typeref.name) {
                return self.bind_named(module, typedef);
            }
            if let Some(builtin) = BuiltinType::from_name(&typeref.name) {
                return Some(Binding::Builtin(builtin));
            }
        } else if let Some(ns) = &typeref.ns {
            let directory = Arc::clone(&self.directory);
            if let Some(other) = directory.find_module(&IdSeg::from(ns.as_str())) {
                if let Some(typedef) = other.typedef(&typeref.name) {
                    return self.bind_named(other, typedef);
                }
            }
        }
        self.badtypes.insert(TypeName::new(typeref.ns.as_deref(), &typeref.name));
        None
    }

    fn bind_named(&mut self, module: &Module, typedef: &Typedef) -> Option<Binding> {
        let key = (normalize_ident(&module.name), normalize_ident(&typedef.name));
        let name = TypeName::new(Some(&module.name), &typedef.name);
        if let Some(target) = self.cache.get(&key) {
            debug!("reusing bound type {}", name);
            return Some(Binding::Named { name, target: Arc::clone(target) });
        }
        if !self.in_progress.insert(key.clone()) {
            warn!("type {} refers to itself", name);
            self.badtypes.insert(name);
            return None;
        }
        let bound = self.bind(&typedef.typeobj, module);
        self.in_progress.remove(&key);

        let target = Arc::new(bound?);
        self.cache.insert(key, Arc::clone(&target));
        Some(Binding::Named { name, target })
    }

    fn bind_constraint(&mut self, constraint: &Constraint<Unbound>, module: &Module) -> Option<Constraint<Bound>> {
        let bound = match constraint {
            Constraint::Length(ranges) => Constraint::Length(ranges.clone()),
            Constraint::Pattern(pattern) => Constraint::Pattern(pattern.clone()),
            Constraint::Range(ranges) => Constraint::Range(ranges.clone()),
            Constraint::IntegerEnums(enums) => Constraint::IntegerEnums(enums.clone()),
            Constraint::IntegerBits(bits) => Constraint::IntegerBits(bits.clone()),
            Constraint::CborCddl(cddl) => Constraint::CborCddl(cddl.clone()),
            Constraint::IdentRefBase(refbase) => {
                let mut ident = refbase.base.ident.clone();
                if ident.ns_id.is_none() {
                    ident.ns_id = Some(IdSeg::from(module.name.as_str()));
                }
                let ns = ident.ns_id.as_ref().map(IdSeg::to_string);
                let name = ident.obj_id.to_string();
                match BoundIdent::bind(ident, Arc::clone(&self.directory)) {
                    Some(base) => {
                        Constraint::IdentRefBase(IdentRefBase { base_text: refbase.base_text.clone(), base })
                    }
                    None => {
                        self.badtypes.insert(TypeName::new(ns.as_deref(), &name));
                        return None;
                    }
                }
            }
        };
        Some(bound)
    }
}
