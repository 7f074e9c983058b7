//! Application data models: YANG modules with `ietf-amm` extensions,
//! decoded into [`Module`] values and encoded back.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::ari::{Ari, IdSeg, ReferenceAri, StructType, normalize_ident};
use crate::ari_text;
use crate::error::{AriError, Result, TypeName, TypeResolverError};
use crate::lookup::{ModuleDirectory, TypeResolver};
use crate::typing::{Bound, SemType, Unbound};

pub mod statement;
pub mod typeobj;

use statement::Statement;
use typeobj::{TypeDecoder, TypeEncoder};

/// The module whose extension statements carry ADM content.
pub const AMM_MODULE: &str = "ietf-amm";

const AMM_KEYWORDS: [&str; 28] = [
    "enum", "type", "ulist", "dlist", "umap", "tblt", "union", "seq", "keys", "values", "column", "key", "unique",
    "int-labels", "cddl", "base", "parameter", "default", "init-value", "result", "operand", "typedef", "ident",
    "const", "ctrl", "edd", "oper", "var",
];

/// Module metadata statements kept verbatim.
const META_KEYWORDS: [&str; 5] = ["prefix", "organization", "contact", "description", "reference"];

// ------------- ExtensionRegistry -------------
/// The extension keywords a decoder understands, built once and passed to
/// every decoder and encoder.
#[derive(Debug, Clone)]
pub struct ExtensionRegistry {
    module: String,
    default_prefix: String,
    keywords: BTreeSet<String>,
}

impl Default for ExtensionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self {
            module: AMM_MODULE.to_string(),
            default_prefix: "amm".to_string(),
            keywords: AMM_KEYWORDS.iter().map(|kw| kw.to_string()).collect(),
        }
    }
    pub fn register(&mut self, keyword: &str) {
        self.keywords.insert(keyword.to_string());
    }
    pub fn is_registered(&self, keyword: &str) -> bool {
        self.keywords.contains(keyword)
    }
    pub fn module(&self) -> &str {
        &self.module
    }
}

// ------------- ModuleContext -------------
/// Names visible within the text of one module.
#[derive(Debug, Clone)]
pub struct ModuleContext<'a> {
    pub registry: &'a ExtensionRegistry,
    pub module: String,
    /// The module's own prefix.
    pub prefix: Option<String>,
    pub imports: Vec<Import>,
}

impl<'a> ModuleContext<'a> {
    pub fn new(registry: &'a ExtensionRegistry, module: &Module) -> Self {
        Self {
            registry,
            module: module.name.clone(),
            prefix: module.prefix().map(str::to_string),
            imports: module.imports.clone(),
        }
    }

    fn ext_prefix(&self) -> &str {
        self.prefix_for_module(self.registry.module()).unwrap_or(&self.registry.default_prefix)
    }

    /// The full keyword of an extension statement.
    pub fn ext(&self, name: &str) -> String {
        format!("{}:{}", self.ext_prefix(), name)
    }

    /// The extension name of a registered `prefix:name` keyword.
    pub fn ext_name<'s>(&self, keyword: &'s str) -> Option<&'s str> {
        let (prefix, name) = keyword.split_once(':')?;
        (prefix == self.ext_prefix() && self.registry.is_registered(name)).then_some(name)
    }

    /// `Some(None)` for the module's own prefix.
    pub fn module_for_prefix(&self, prefix: &str) -> Option<Option<&str>> {
        if self.prefix.as_deref() == Some(prefix) {
            return Some(None);
        }
        self.imports.iter().find(|imp| imp.prefix == prefix).map(|imp| Some(imp.module.as_str()))
    }

    pub fn prefix_for_module(&self, module: &str) -> Option<&str> {
        let module = normalize_ident(module);
        self.imports
            .iter()
            .find(|imp| normalize_ident(&imp.module) == module)
            .map(|imp| imp.prefix.as_str())
    }
}

// ------------- Module contents -------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub module: String,
    pub prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feature {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Typedef {
    pub name: String,
    pub enum_id: i64,
    pub description: Option<String>,
    pub typeobj: SemType<Unbound>,
}

#[derive(Debug, Clone)]
pub struct IdentBase {
    /// As written in the module.
    pub text: String,
    pub ari: ReferenceAri,
}

#[derive(Debug, Clone)]
pub struct IdentDef {
    pub name: String,
    pub enum_id: i64,
    pub description: Option<String>,
    pub bases: Vec<IdentBase>,
}

/// A named, typed parameter, operand or result.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub typeobj: SemType<Unbound>,
    /// ARI text of the default value.
    pub default: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Const,
    Ctrl,
    Edd,
    Oper,
    Var,
}

impl ObjectKind {
    pub const ALL: [ObjectKind; 5] = [ObjectKind::Const, ObjectKind::Ctrl, ObjectKind::Edd, ObjectKind::Oper, ObjectKind::Var];

    pub fn keyword(self) -> &'static str {
        match self {
            ObjectKind::Const => "const",
            ObjectKind::Ctrl => "ctrl",
            ObjectKind::Edd => "edd",
            ObjectKind::Oper => "oper",
            ObjectKind::Var => "var",
        }
    }
    pub fn type_id(self) -> StructType {
        match self {
            ObjectKind::Const => StructType::Const,
            ObjectKind::Ctrl => StructType::Ctrl,
            ObjectKind::Edd => StructType::Edd,
            ObjectKind::Oper => StructType::Oper,
            ObjectKind::Var => StructType::Var,
        }
    }
}

/// A managed object; which fields are used depends on its kind.
#[derive(Debug, Clone)]
pub struct AdmObject {
    pub kind: ObjectKind,
    pub name: String,
    pub enum_id: i64,
    pub description: Option<String>,
    pub if_feature: Option<String>,
    pub params: Vec<Param>,
    pub typeobj: Option<SemType<Unbound>>,
    /// ARI text of a CONST or VAR value.
    pub init_value: Option<String>,
    pub result: Option<Param>,
    pub operands: Vec<Param>,
}

impl AdmObject {
    pub fn new(kind: ObjectKind, name: &str, enum_id: i64) -> Self {
        Self {
            kind,
            name: name.to_string(),
            enum_id,
            description: None,
            if_feature: None,
            params: Vec::new(),
            typeobj: None,
            init_value: None,
            result: None,
            operands: Vec::new(),
        }
    }
}

fn seg_matches(seg: &IdSeg, name: &str, enum_id: i64) -> bool {
    match seg {
        IdSeg::Int(id) => *id == enum_id,
        IdSeg::Text(text) => normalize_ident(text) == normalize_ident(name),
    }
}

#[derive(Debug, Clone, Default)]
pub struct Module {
    pub name: String,
    pub ns_enum: Option<i64>,
    /// Keyword and argument of each metadata statement.
    pub metadata: Vec<(String, String)>,
    pub imports: Vec<Import>,
    pub revisions: Vec<Revision>,
    pub features: Vec<Feature>,
    pub typedefs: Vec<Typedef>,
    pub idents: Vec<IdentDef>,
    pub objects: Vec<AdmObject>,
}

impl Module {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), ..Default::default() }
    }

    /// True for a namespace naming this module by name or enumeration.
    pub fn matches(&self, ns: &IdSeg) -> bool {
        match ns {
            IdSeg::Int(id) => self.ns_enum == Some(*id),
            IdSeg::Text(text) => normalize_ident(text) == normalize_ident(&self.name),
        }
    }

    pub fn prefix(&self) -> Option<&str> {
        self.metadata.iter().find(|(kw, _)| kw == "prefix").map(|(_, arg)| arg.as_str())
    }

    pub fn typedef(&self, name: &str) -> Option<&Typedef> {
        let name = normalize_ident(name);
        self.typedefs.iter().find(|def| normalize_ident(&def.name) == name)
    }

    pub fn typedef_by_id(&self, id: &IdSeg) -> Option<&Typedef> {
        self.typedefs.iter().find(|def| seg_matches(id, &def.name, def.enum_id))
    }

    pub fn ident(&self, id: &IdSeg) -> Option<&IdentDef> {
        self.idents.iter().find(|def| seg_matches(id, &def.name, def.enum_id))
    }

    pub fn object(&self, type_id: StructType, id: &IdSeg) -> Option<&AdmObject> {
        self.objects
            .iter()
            .find(|obj| obj.kind.type_id() == type_id && seg_matches(id, &obj.name, obj.enum_id))
    }

    pub fn objects_of(&self, kind: ObjectKind) -> impl Iterator<Item = &AdmObject> + '_ {
        self.objects.iter().filter(move |obj| obj.kind == kind)
    }
}

// ------------- ModuleDecoder -------------
/// Statement trees to [`Module`] values.
#[derive(Debug)]
pub struct ModuleDecoder<'r> {
    registry: &'r ExtensionRegistry,
}

impl<'r> ModuleDecoder<'r> {
    pub fn new(registry: &'r ExtensionRegistry) -> Self {
        Self { registry }
    }

    /// Parse YANG text and decode its module.
    pub fn decode_text(&self, text: &str) -> Result<Module> {
        self.decode(&Statement::parse(text)?)
    }

    pub fn decode(&self, stmt: &Statement) -> Result<Module> {
        if stmt.keyword != "module" {
            return Err(AriError::Schema(format!("expected a module statement, not {}", stmt.keyword)));
        }
        let mut module = Module::new(stmt.required_arg()?);

        for imp in stmt.find_all("import") {
            let prefix = imp
                .find_one("prefix")
                .ok_or_else(|| AriError::Schema(format!("import of {} has no prefix", imp.arg_str())))?;
            module.imports.push(Import { module: imp.required_arg()?.to_string(), prefix: prefix.required_arg()?.to_string() });
        }
        for keyword in META_KEYWORDS {
            if let Some(meta) = stmt.find_one(keyword) {
                module.metadata.push((keyword.to_string(), meta.arg_str().to_string()));
            }
        }
        for rev in stmt.find_all("revision") {
            module.revisions.push(Revision { name: rev.required_arg()?.to_string(), description: description(rev) });
        }
        for feat in stmt.find_all("feature") {
            module.features.push(Feature { name: feat.required_arg()?.to_string(), description: description(feat) });
        }

        let ctx = ModuleContext::new(self.registry, &module);
        if let Some(enum_stmt) = stmt.find_one(&ctx.ext("enum")) {
            module.ns_enum = Some(parse_enum(enum_stmt)?);
        }
        for sub in &stmt.substmts {
            if let Some((prefix, name)) = sub.keyword.split_once(':') {
                if ctx.ext_name(&sub.keyword).is_none() && ctx.module_for_prefix(prefix) == Some(Some(AMM_MODULE)) {
                    warn!("ignoring unregistered extension {}", name);
                }
            }
        }

        let types = TypeDecoder::new(&ctx);
        let typedefs = section(stmt, &ctx.ext("typedef"), |sub, enum_id| {
            Ok(Typedef {
                name: sub.required_arg()?.to_string(),
                enum_id,
                description: description(sub),
                typeobj: types.decode(sub)?,
            })
        })?;
        let idents = section(stmt, &ctx.ext("ident"), |sub, enum_id| {
            let bases = sub
                .find_all(&ctx.ext("base"))
                .map(|base| {
                    let text = base.required_arg()?;
                    match ari_text::Decoder::new().decode(text)? {
                        Ari::Reference(ari) if ari.ident.type_id == StructType::Ident => {
                            Ok(IdentBase { text: text.to_string(), ari })
                        }
                        _ => Err(AriError::Schema(format!("base {text} is not an IDENT reference"))),
                    }
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(IdentDef { name: sub.required_arg()?.to_string(), enum_id, description: description(sub), bases })
        })?;
        let mut objects = Vec::new();
        for kind in ObjectKind::ALL {
            objects.extend(section(stmt, &ctx.ext(kind.keyword()), |sub, enum_id| {
                self.decode_object(&ctx, &types, kind, sub, enum_id)
            })?);
        }
        module.typedefs = typedefs;
        module.idents = idents;
        module.objects = objects;

        debug!("decoded module {} with {} objects", module.name, module.objects.len());
        Ok(module)
    }

    fn decode_object(
        &self,
        ctx: &ModuleContext<'_>,
        types: &TypeDecoder<'_>,
        kind: ObjectKind,
        stmt: &Statement,
        enum_id: i64,
    ) -> Result<AdmObject> {
        let mut obj = AdmObject::new(kind, stmt.required_arg()?, enum_id);
        obj.description = description(stmt);
        obj.if_feature = stmt.find_one("if-feature").map(|feat| feat.arg_str().to_string());

        let param = |sub: &Statement| -> Result<Param> {
            Ok(Param {
                name: sub.required_arg()?.to_string(),
                typeobj: types.decode(sub)?,
                default: sub.find_one(&ctx.ext("default")).map(|def| def.arg_str().to_string()),
            })
        };
        obj.params = stmt.find_all(&ctx.ext("parameter")).map(param).collect::<Result<_>>()?;

        match kind {
            ObjectKind::Const | ObjectKind::Var => {
                obj.typeobj = Some(types.decode(stmt)?);
                match stmt.find_one(&ctx.ext("init-value")) {
                    Some(value) => {
                        let text = value.required_arg()?;
                        check_imported(ctx, &ari_text::Decoder::new().decode(text)?)?;
                        obj.init_value = Some(text.to_string());
                    }
                    None if kind == ObjectKind::Const => warn!("const {} is missing init-value", obj.name),
                    None => {}
                }
            }
            ObjectKind::Edd => obj.typeobj = Some(types.decode(stmt)?),
            ObjectKind::Ctrl => {
                obj.result = stmt.find_one(&ctx.ext("result")).map(param).transpose()?;
            }
            ObjectKind::Oper => {
                obj.operands = stmt.find_all(&ctx.ext("operand")).map(param).collect::<Result<_>>()?;
                obj.result = stmt.find_one(&ctx.ext("result")).map(param).transpose()?;
            }
        }
        Ok(obj)
    }
}

fn description(stmt: &Statement) -> Option<String> {
    stmt.find_one("description").map(|desc| desc.arg_str().to_string())
}

fn parse_enum(stmt: &Statement) -> Result<i64> {
    let arg = stmt.required_arg()?;
    arg.parse().map_err(|_| AriError::Schema(format!("invalid enum {arg}")))
}

/// Decode every statement of one section; a missing enum is the position
/// within the section.
fn section<T>(
    stmt: &Statement,
    keyword: &str,
    mut decode: impl FnMut(&Statement, i64) -> Result<T>,
) -> Result<Vec<T>> {
    let enum_keyword = keyword.rsplit_once(':').map(|(prefix, _)| format!("{prefix}:enum"));
    stmt.find_all(keyword)
        .enumerate()
        .map(|(pos, sub)| {
            let enum_id = match enum_keyword.as_deref().and_then(|kw| sub.find_one(kw)) {
                Some(enum_stmt) => parse_enum(enum_stmt)?,
                None => pos as i64,
            };
            decode(sub, enum_id)
        })
        .collect()
}

/// References within a value may only name this module or an import.
fn check_imported(ctx: &ModuleContext<'_>, ari: &Ari) -> Result<()> {
    let mut missing = None;
    ari.visit(&mut |item| {
        if let Ari::Reference(objref) = item {
            if let Some(ns) = &objref.ident.ns_id {
                let known = match ns {
                    IdSeg::Text(name) => {
                        normalize_ident(name) == normalize_ident(&ctx.module) || ctx.prefix_for_module(name).is_some()
                    }
                    IdSeg::Int(_) => true,
                };
                if !known {
                    missing = Some(ns.to_string());
                }
            }
        }
    });
    match missing {
        Some(ns) => Err(AriError::Schema(format!("value references module {ns} that is not imported"))),
        None => Ok(()),
    }
}

// ------------- ModuleEncoder -------------
/// [`Module`] values back to statement trees.
#[derive(Debug)]
pub struct ModuleEncoder<'r> {
    registry: &'r ExtensionRegistry,
}

impl<'r> ModuleEncoder<'r> {
    pub fn new(registry: &'r ExtensionRegistry) -> Self {
        Self { registry }
    }

    /// Encode as YANG text.
    pub fn encode_text(&self, module: &Module) -> String {
        self.encode(module).to_text()
    }

    pub fn encode(&self, module: &Module) -> Statement {
        let ctx = ModuleContext::new(self.registry, module);
        let types = TypeEncoder::new(&ctx);
        let mut root = Statement::new("module", Some(module.name.as_str()));

        root.add("yang-version", Some("1.1"));
        root.add("namespace", Some(format!("ari://{}/", module.name).as_str()));
        for (keyword, arg) in &module.metadata {
            root.add(keyword.as_str(), Some(arg.as_str()));
        }
        for imp in &module.imports {
            root.add("import", Some(imp.module.as_str())).add("prefix", Some(imp.prefix.as_str()));
        }
        if let Some(ns_enum) = module.ns_enum {
            root.add(ctx.ext("enum"), Some(ns_enum.to_string().as_str()));
        }
        for rev in &module.revisions {
            put_described(root.add("revision", Some(rev.name.as_str())), rev.description.as_deref());
        }
        for feat in &module.features {
            put_described(root.add("feature", Some(feat.name.as_str())), feat.description.as_deref());
        }

        for def in &module.typedefs {
            let stmt = root.add(ctx.ext("typedef"), Some(def.name.as_str()));
            stmt.add(ctx.ext("enum"), Some(def.enum_id.to_string().as_str()));
            put_described(stmt, def.description.as_deref());
            types.encode(&def.typeobj, stmt);
        }
        for def in &module.idents {
            let stmt = root.add(ctx.ext("ident"), Some(def.name.as_str()));
            stmt.add(ctx.ext("enum"), Some(def.enum_id.to_string().as_str()));
            put_described(stmt, def.description.as_deref());
            for base in &def.bases {
                stmt.add(ctx.ext("base"), Some(base.text.as_str()));
            }
        }
        for kind in [ObjectKind::Const, ObjectKind::Edd, ObjectKind::Var, ObjectKind::Ctrl, ObjectKind::Oper] {
            for obj in module.objects_of(kind) {
                self.encode_object(&ctx, &types, obj, &mut root);
            }
        }
        root
    }

    fn encode_object(&self, ctx: &ModuleContext<'_>, types: &TypeEncoder<'_>, obj: &AdmObject, root: &mut Statement) {
        let stmt = root.add(ctx.ext(obj.kind.keyword()), Some(obj.name.as_str()));
        stmt.add(ctx.ext("enum"), Some(obj.enum_id.to_string().as_str()));
        put_described(stmt, obj.description.as_deref());
        if let Some(feature) = &obj.if_feature {
            stmt.add("if-feature", Some(feature.as_str()));
        }

        let put_param = |keyword: &str, param: &Param, parent: &mut Statement| {
            let param_stmt = parent.add(ctx.ext(keyword), Some(param.name.as_str()));
            types.encode(&param.typeobj, param_stmt);
            if let Some(default) = &param.default {
                param_stmt.add(ctx.ext("default"), Some(default.as_str()));
            }
        };
        for param in &obj.params {
            put_param("parameter", param, stmt);
        }
        if let Some(typeobj) = &obj.typeobj {
            types.encode(typeobj, stmt);
        }
        if let Some(value) = &obj.init_value {
            stmt.add(ctx.ext("init-value"), Some(value.as_str()));
        }
        for operand in &obj.operands {
            put_param("operand", operand, stmt);
        }
        if let Some(result) = &obj.result {
            put_param("result", result, stmt);
        }
    }
}

fn put_described(stmt: &mut Statement, description: Option<&str>) {
    if let Some(description) = description {
        stmt.add("description", Some(description));
    }
}

// ------------- AdmSet -------------
/// An in-memory set of modules serving as a [`ModuleDirectory`].
#[derive(Debug, Default, Clone)]
pub struct AdmSet {
    modules: Vec<Module>,
}

impl AdmSet {
    pub fn new() -> Self {
        Self { modules: Vec::new() }
    }

    /// Add a module, replacing any earlier one of the same name.
    pub fn insert(&mut self, module: Module) {
        let ns = IdSeg::from(module.name.as_str());
        self.modules.retain(|existing| !existing.matches(&ns));
        self.modules.push(module);
    }

    pub fn load_text(&mut self, registry: &ExtensionRegistry, text: &str) -> Result<()> {
        let module = ModuleDecoder::new(registry).decode_text(text)?;
        self.insert(module);
        Ok(())
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Bind a typedef of a module in this set.
    pub fn resolve_typedef(self: &Arc<Self>, module: &str, name: &str) -> Result<SemType<Bound>> {
        let missing = || TypeResolverError { badtypes: [TypeName::new(Some(module), name)].into() };
        let found = self.find_module(&IdSeg::from(module)).ok_or_else(missing)?;
        let typedef = found.typedef(name).ok_or_else(missing)?;
        let directory: Arc<dyn ModuleDirectory> = Arc::clone(self) as Arc<dyn ModuleDirectory>;
        let mut resolver = TypeResolver::new(directory);
        resolver.resolve(&typedef.typeobj, found)
    }
}

impl ModuleDirectory for AdmSet {
    fn find_module(&self, ns: &IdSeg) -> Option<&Module> {
        self.modules.iter().find(|module| module.matches(ns))
    }
}
