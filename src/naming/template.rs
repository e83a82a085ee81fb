//! Filename template parsing
//!
//! A template is literal text with `{Field Name}` placeholders in between.
//! There is no escaping and no nesting: every `{` opens a placeholder and
//! every `}` must close one.

use std::str::FromStr;

use thiserror::Error;

use super::{FieldMapping, ReceiptField};

/// Template parse/render errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unclosed placeholder starting at byte {0}")]
    Unclosed(usize),
    #[error("unmatched '}}' at byte {0}")]
    UnmatchedClose(usize),
    #[error("'{{' inside a placeholder at byte {0}")]
    Nested(usize),
    #[error("empty placeholder at byte {0}")]
    Empty(usize),
    #[error("unknown placeholder {{{0}}}")]
    UnknownPlaceholder(String),
}

/// Placeholder name, resolved against the recognized field set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placeholder {
    /// One of the six receipt fields; always resolvable
    Field(ReceiptField),
    /// Any other key; resolvable only if the mapping carries it
    Other(String),
}

impl Placeholder {
    fn from_name(name: &str) -> Self {
        match ReceiptField::from_key(name) {
            Some(field) => Self::Field(field),
            None => Self::Other(name.to_string()),
        }
    }

    /// Mapping key this placeholder reads
    pub fn key(&self) -> &str {
        match self {
            Self::Field(field) => field.key(),
            Self::Other(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplatePart {
    Literal(String),
    Placeholder(Placeholder),
}

/// Parsed filename template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    parts: Vec<TemplatePart>,
}

impl Template {
    /// Parse a template string
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices();

        while let Some((start, c)) = chars.next() {
            match c {
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some((_, '}')) => break,
                            Some((pos, '{')) => return Err(TemplateError::Nested(pos)),
                            Some((_, ch)) => name.push(ch),
                            None => return Err(TemplateError::Unclosed(start)),
                        }
                    }
                    if name.is_empty() {
                        return Err(TemplateError::Empty(start));
                    }
                    if !literal.is_empty() {
                        parts.push(TemplatePart::Literal(std::mem::take(&mut literal)));
                    }
                    parts.push(TemplatePart::Placeholder(Placeholder::from_name(&name)));
                }
                '}' => return Err(TemplateError::UnmatchedClose(start)),
                _ => literal.push(c),
            }
        }

        if !literal.is_empty() {
            parts.push(TemplatePart::Literal(literal));
        }

        Ok(Self { parts })
    }

    pub fn parts(&self) -> &[TemplatePart] {
        &self.parts
    }

    /// Placeholders in template order
    pub fn placeholders(&self) -> impl Iterator<Item = &Placeholder> {
        self.parts.iter().filter_map(|part| match part {
            TemplatePart::Placeholder(p) => Some(p),
            TemplatePart::Literal(_) => None,
        })
    }

    /// Substitute every placeholder with its value from `values`.
    ///
    /// Values are inserted as plain data; they are never parsed again.
    pub fn render(&self, values: &FieldMapping) -> Result<String, TemplateError> {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                TemplatePart::Literal(text) => out.push_str(text),
                TemplatePart::Placeholder(placeholder) => {
                    let value = values
                        .get(placeholder.key())
                        .ok_or_else(|| TemplateError::UnknownPlaceholder(placeholder.key().to_string()))?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

impl FromStr for Template {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
