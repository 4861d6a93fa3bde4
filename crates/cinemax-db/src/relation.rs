//! Relation name validation.
//!
//! Staging and production table names come from configuration and are
//! interpolated into SQL, so they are restricted to plain PostgreSQL
//! identifiers, optionally schema-qualified.

use std::fmt;
use std::str::FromStr;

use cinemax_core::{Error, Result};

/// PostgreSQL's identifier length limit.
const MAX_IDENTIFIER_LEN: usize = 63;

const RESERVED_KEYWORDS: &[&str] = &[
    "pg_catalog",
    "information_schema",
    "pg_toast",
    "select",
    "insert",
    "update",
    "delete",
    "drop",
    "create",
    "alter",
    "grant",
    "revoke",
    "truncate",
    "table",
    "from",
    "where",
];

/// Validate a single unquoted PostgreSQL identifier.
///
/// Identifiers must be 1..=63 ASCII alphanumerics or underscores, must not
/// start with a digit, and must not be a reserved word.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidInput(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(Error::InvalidInput(format!(
            "Identifier exceeds {} character limit: {} characters",
            MAX_IDENTIFIER_LEN,
            name.len()
        )));
    }

    if let Some(first) = name.chars().next() {
        if !first.is_ascii_alphabetic() && first != '_' {
            return Err(Error::InvalidInput(format!(
                "Identifier must start with a letter or underscore, found: '{}'",
                first
            )));
        }
    }

    if let Some(ch) = name
        .chars()
        .find(|ch| !ch.is_ascii_alphanumeric() && *ch != '_')
    {
        return Err(Error::InvalidInput(format!(
            "Identifier contains invalid character: '{}'. Only alphanumeric and underscore allowed",
            ch
        )));
    }

    if RESERVED_KEYWORDS.contains(&name.to_lowercase().as_str()) {
        return Err(Error::InvalidInput(format!(
            "Identifier '{}' is a reserved SQL keyword",
            name
        )));
    }

    Ok(())
}

/// A validated `[schema.]table` name, safe to interpolate into SQL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationName {
    schema: Option<String>,
    table: String,
}

impl RelationName {
    /// Parse and validate `table` or `schema.table`.
    pub fn parse(name: &str) -> Result<Self> {
        let mut parts = name.split('.');
        let (schema, table) = match (parts.next(), parts.next(), parts.next()) {
            (Some(table), None, None) => (None, table),
            (Some(schema), Some(table), None) => (Some(schema), table),
            _ => {
                return Err(Error::InvalidInput(format!(
                    "Relation name '{}' must be 'table' or 'schema.table'",
                    name
                )))
            }
        };

        if let Some(schema) = schema {
            validate_identifier(schema)?;
        }
        validate_identifier(table)?;

        Ok(Self {
            schema: schema.map(str::to_string),
            table: table.to_string(),
        })
    }

    /// Build from already separated parts.
    pub fn qualified(schema: &str, table: &str) -> Result<Self> {
        validate_identifier(schema)?;
        validate_identifier(table)?;
        Ok(Self {
            schema: Some(schema.to_string()),
            table: table.to_string(),
        })
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

impl fmt::Display for RelationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.table),
            None => write!(f, "{}", self.table),
        }
    }
}

impl FromStr for RelationName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
