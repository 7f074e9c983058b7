//! Convert object references to and from their nicknames.
//!
//! A nickname replaces the text namespace and object name of a reference
//! with the integer enumerations its module assigns them, which is the
//! compact form used on the wire. [`Converter`] walks every reference
//! within an ARI, including parameters and container contents.

use tracing::debug;

use crate::ari::{Ari, IdSeg, ReferenceAri};
use crate::error::{AriError, Result};
use crate::lookup::{ModuleDirectory, Target, dereference};

/// The conversion direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Text names to integer enumerations.
    ToNickname,
    /// Integer enumerations to text names.
    FromNickname,
}

#[derive(Debug, Clone, Copy)]
pub struct Converter<'a> {
    mode: Mode,
    directory: &'a dyn ModuleDirectory,
    must_nickname: bool,
}

impl<'a> Converter<'a> {
    /// With `must_nickname` set, a reference that cannot be converted is an
    /// error, otherwise it is left as it is.
    pub fn new(mode: Mode, directory: &'a dyn ModuleDirectory, must_nickname: bool) -> Self {
        Self { mode, directory, must_nickname }
    }

    pub fn convert(&self, ari: &Ari) -> Result<Ari> {
        let mut failure = None;
        let converted = ari.map(&mut |item| match item {
            Ari::Reference(objref) if failure.is_none() => match self.convert_reference(&objref) {
                Ok(Some(converted)) => Ari::Reference(converted),
                Ok(None) => Ari::Reference(objref),
                Err(err) => {
                    failure = Some(err);
                    Ari::Reference(objref)
                }
            },
            other => other,
        });
        match failure {
            Some(err) => Err(err),
            None => Ok(converted),
        }
    }

    fn convert_reference(&self, objref: &ReferenceAri) -> Result<Option<ReferenceAri>> {
        let ident = &objref.ident;
        let wanted = match (self.mode, &ident.ns_id) {
            (Mode::ToNickname, Some(IdSeg::Text(_))) => true,
            (Mode::FromNickname, Some(IdSeg::Int(_))) => true,
            _ => false,
        };
        if !wanted {
            return Ok(None);
        }

        let Some(target) = dereference(self.directory, ident) else {
            let ns = ident.ns_id.as_ref().map(IdSeg::to_string).unwrap_or_default();
            return self.unconverted(format!("the object {ns}/{}/{} does not exist", ident.type_id, ident.obj_id));
        };
        let (module, name, enum_id) = match target {
            Target::Typedef(module, def) => (module, def.name.as_str(), def.enum_id),
            Target::Ident(module, def) => (module, def.name.as_str(), def.enum_id),
            Target::Object(module, obj) => (module, obj.name.as_str(), obj.enum_id),
        };

        let mut converted = objref.clone();
        match self.mode {
            Mode::ToNickname => {
                let Some(ns_enum) = module.ns_enum else {
                    return self.unconverted(format!("the ADM named {} does not have an enumeration", module.name));
                };
                converted.ident.ns_id = Some(IdSeg::Int(ns_enum));
                converted.ident.obj_id = IdSeg::Int(enum_id);
            }
            Mode::FromNickname => {
                converted.ident.ns_id = Some(IdSeg::Text(module.name.clone()));
                converted.ident.obj_id = IdSeg::Text(name.to_string());
            }
        }
        debug!("converted {:?} reference {:?} to {:?}", self.mode, objref.ident, converted.ident);
        Ok(Some(converted))
    }

    fn unconverted(&self, message: String) -> Result<Option<ReferenceAri>> {
        if self.must_nickname {
            return Err(AriError::Schema(message));
        }
        debug!("left reference unconverted: {}", message);
        Ok(None)
    }
}
