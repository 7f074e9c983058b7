use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AriError {
    #[error("Parse error: {message}")]
    Parse { message: String },
    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),
    #[error("Type resolver error: {0}")]
    Resolve(#[from] TypeResolverError),
    #[error("Schema error: {0}")]
    Schema(String),
    #[error("Config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, AriError>;

impl AriError {
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse { message: message.into() }
    }
    /// Decoded input that does not fit its declared type.
    pub fn invalid(err: ConversionError) -> Self {
        Self::parse(err.to_string())
    }
}

// Helper conversions
impl From<config::ConfigError> for AriError {
    fn from(e: config::ConfigError) -> Self { Self::Config(e.to_string()) }
}
impl From<pest::error::Error<crate::ari_text::parse::Rule>> for AriError {
    fn from(e: pest::error::Error<crate::ari_text::parse::Rule>) -> Self { Self::parse(e.to_string()) }
}
impl From<pest::error::Error<crate::adm::statement::Rule>> for AriError {
    fn from(e: pest::error::Error<crate::adm::statement::Rule>) -> Self { Self::Schema(e.to_string()) }
}

/// Failure to coerce a value into a semantic type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    /// Structurally the wrong kind of value, further coercion will not help.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    /// The right kind of value but outside the domain or a constraint.
    #[error("invalid value: {0}")]
    Value(String),
    /// Every column of one table row that failed to convert.
    #[error("table row {row} invalid in columns: {}", columns.join(", "))]
    Columns { row: usize, columns: Vec<String> },
}

impl ConversionError {
    pub fn mismatch(message: impl Into<String>) -> Self {
        Self::TypeMismatch(message.into())
    }
    pub fn value(message: impl Into<String>) -> Self {
        Self::Value(message.into())
    }
    pub fn is_type_mismatch(&self) -> bool {
        matches!(self, Self::TypeMismatch(_))
    }
}

/// A possibly namespace-qualified type name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeName {
    pub ns: Option<String>,
    pub name: String,
}

impl TypeName {
    pub fn new(ns: Option<&str>, name: &str) -> Self {
        Self { ns: ns.map(str::to_string), name: name.to_string() }
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.ns {
            Some(ns) => write!(f, "{}:{}", ns, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// All type references that could not be bound during one resolver pass.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("missing types to bind to: {}", badtypes.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(", "))]
pub struct TypeResolverError {
    pub badtypes: BTreeSet<TypeName>,
}
