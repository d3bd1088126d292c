//! Structural SQL identifiers.
//!
//! Only values that pass through this module may appear in query text.
//! Every identifier matches `^[A-Za-z0-9_]{1,63}$` and is rendered
//! double-quoted, so it can never close the quote or inject syntax.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static IDENTIFIER_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]{1,63}$").ok());

static CLASS_ID_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[1-9][0-9]?$").ok());

/// A validated schema or table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(String);

impl Identifier {
    /// Accept `raw` only if it matches the allow-list pattern.
    pub fn parse(raw: &str) -> Option<Self> {
        if allowed(&IDENTIFIER_PATTERN, raw) {
            Some(Self(raw.to_string()))
        } else {
            None
        }
    }

    /// Replace every character outside `[A-Za-z0-9_]` with `_`, then validate.
    ///
    /// Used for per-user tracking tables, which are named after the user's
    /// e-mail address.
    pub fn sanitized(raw: &str) -> Option<Self> {
        let cleaned: String = raw
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect();
        Self::parse(&cleaned)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Double-quoted form for query text.
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Numeric class id selecting a `class{N}_activity_info` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassId(u8);

impl ClassId {
    pub fn parse(raw: &str) -> Option<Self> {
        if !allowed(&CLASS_ID_PATTERN, raw) {
            return None;
        }
        raw.parse().ok().map(Self)
    }

    pub fn get(&self) -> u8 {
        self.0
    }

    /// Table holding this class's activity catalog.
    pub fn activity_table(&self) -> Identifier {
        Identifier(format!("class{}_activity_info", self.0))
    }
}

/// Schema holding activity catalogs; a closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivitySchema {
    MobileUser,
    TestUser,
}

impl ActivitySchema {
    /// Testers read their own catalog copy.
    pub fn for_role(role: Option<&str>) -> Self {
        match role {
            Some("tester") => ActivitySchema::TestUser,
            _ => ActivitySchema::MobileUser,
        }
    }

    pub fn identifier(&self) -> Identifier {
        match self {
            ActivitySchema::MobileUser => Identifier("mobile_user".to_string()),
            ActivitySchema::TestUser => Identifier("test_user".to_string()),
        }
    }
}

/// `schema.table` pointer stored in an activity's `asset_table_reference`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetTableRef {
    pub schema: Identifier,
    pub table: Identifier,
}

impl AssetTableRef {
    /// Split on the single `.`; both halves must be valid identifiers.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.trim().split('.');
        let schema = Identifier::parse(parts.next()?)?;
        let table = Identifier::parse(parts.next()?)?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self { schema, table })
    }
}

impl fmt::Display for AssetTableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

// An uncompiled pattern rejects everything.
fn allowed(pattern: &Option<Regex>, raw: &str) -> bool {
    pattern.as_ref().is_some_and(|re| re.is_match(raw))
}
