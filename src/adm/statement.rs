//! Generic YANG statement trees and their text form.

use std::fmt::{self, Write};

use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;

use crate::error::{AriError, Result};

#[derive(Parser)]
#[grammar = "adm/yang.pest"]
pub struct YangParser;

/// One statement with its optional argument and substatements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// Either a plain keyword or a `prefix:keyword` extension.
    pub keyword: String,
    pub arg: Option<String>,
    pub substmts: Vec<Statement>,
}

impl Statement {
    pub fn new(keyword: impl Into<String>, arg: Option<&str>) -> Self {
        Self { keyword: keyword.into(), arg: arg.map(str::to_string), substmts: Vec::new() }
    }

    /// Append a substatement and return it for further filling.
    pub fn add(&mut self, keyword: impl Into<String>, arg: Option<&str>) -> &mut Statement {
        self.substmts.push(Statement::new(keyword, arg));
        let last = self.substmts.len() - 1;
        &mut self.substmts[last]
    }

    pub fn push(&mut self, stmt: Statement) {
        self.substmts.push(stmt);
    }

    pub fn arg_str(&self) -> &str {
        self.arg.as_deref().unwrap_or_default()
    }

    /// The argument, which this statement must have.
    pub fn required_arg(&self) -> Result<&str> {
        self.arg
            .as_deref()
            .ok_or_else(|| AriError::Schema(format!("{} statement is missing its argument", self.keyword)))
    }

    pub fn find_one(&self, keyword: &str) -> Option<&Statement> {
        self.substmts.iter().find(|stmt| stmt.keyword == keyword)
    }

    pub fn find_all<'a>(&'a self, keyword: &'a str) -> impl Iterator<Item = &'a Statement> + 'a {
        self.substmts.iter().filter(move |stmt| stmt.keyword == keyword)
    }

    /// Parse a single top-level statement, usually a `module`.
    pub fn parse(text: &str) -> Result<Statement> {
        let document = YangParser::parse(Rule::document, text)?
            .next()
            .ok_or_else(|| AriError::Schema("empty module text".into()))?;
        let top = document
            .into_inner()
            .find(|pair| pair.as_rule() == Rule::statement)
            .ok_or_else(|| AriError::Schema("no statement in module text".into()))?;
        statement(top)
    }

    /// Render as indented YANG text.
    pub fn to_text(&self) -> String {
        let mut buf = String::new();
        // writing into a String does not fail
        let _ = self.write_text(&mut buf, 0);
        buf
    }

    fn write_text(&self, buf: &mut String, depth: usize) -> fmt::Result {
        write!(buf, "{:indent$}{}", "", self.keyword, indent = depth * 2)?;
        if let Some(arg) = &self.arg {
            buf.push(' ');
            buf.push_str(&quote_arg(arg));
        }
        if self.substmts.is_empty() {
            buf.push_str(";\n");
            return Ok(());
        }
        buf.push_str(" {\n");
        for sub in &self.substmts {
            sub.write_text(buf, depth + 1)?;
        }
        writeln!(buf, "{:indent$}}}", "", indent = depth * 2)
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

fn statement(pair: Pair<'_, Rule>) -> Result<Statement> {
    let mut stmt = Statement::new(String::new(), None);
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::keyword => stmt.keyword = inner.as_str().to_string(),
            Rule::argument => stmt.arg = Some(argument(inner)?),
            Rule::statement => stmt.substmts.push(statement(inner)?),
            _ => {}
        }
    }
    Ok(stmt)
}

fn argument(pair: Pair<'_, Rule>) -> Result<String> {
    let mut text = String::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::unquoted => text.push_str(inner.as_str()),
            Rule::quoted => {
                let Some(part) = inner.into_inner().next() else {
                    continue;
                };
                match part.as_rule() {
                    Rule::dqtext => text.push_str(&unescape(part.as_str())?),
                    _ => text.push_str(part.as_str()),
                }
            }
            _ => {}
        }
    }
    Ok(text)
}

/// Resolve escapes of a double-quoted string, continuation lines lose
/// their leading indentation.
fn unescape(raw: &str) -> Result<String> {
    let mut out = String::with_capacity(raw.len());
    for (ix, line) in raw.split('\n').enumerate() {
        if ix > 0 {
            out.push('\n');
        }
        let line = if ix > 0 { line.trim_start() } else { line };
        let mut chars = line.chars();
        while let Some(chr) = chars.next() {
            if chr != '\\' {
                out.push(chr);
                continue;
            }
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('"') => out.push('"'),
                Some('\\') => out.push('\\'),
                other => return Err(AriError::Schema(format!("invalid escape \\{}", other.unwrap_or(' ')))),
            }
        }
    }
    Ok(out)
}

fn quote_arg(arg: &str) -> String {
    let plain = !arg.is_empty()
        && !arg.contains("//")
        && !arg.contains("/*")
        && arg.chars().all(|chr| chr.is_ascii_graphic() && !matches!(chr, ';' | '{' | '}' | '"' | '\''));
    if plain {
        return arg.to_string();
    }
    let escaped = arg.replace('\\', "\\\\").replace('"', "\\\"").replace('\t', "\\t").replace('\n', "\\n");
    format!("\"{escaped}\"")
}
