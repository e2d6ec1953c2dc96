//! Identifier and table-definition validation.
//!
//! Table and column names end up interpolated into SQL text, since SQLite
//! cannot bind identifiers as parameters. Every name therefore passes
//! [`validate_identifier`] before any statement is built: ASCII letters,
//! digits and underscores, not starting with a digit, at most
//! [`MAX_IDENTIFIER_LEN`] characters, and not an SQL keyword.
//!
//! # Examples
//!
//! ```
//! use dynatable_core::*;
//!
//! assert!(validate_identifier("users").is_ok());
//! assert!(validate_identifier("users; DROP TABLE x").is_err());
//! assert!(validate_identifier("select").is_err());
//! assert_eq!(quote_identifier("users").unwrap(), "\"users\"");
//! ```

use std::collections::HashSet;

use thiserror::Error;

use crate::{ColumnDefinition, ID_COLUMN};

/// Longest accepted table or column name.
pub const MAX_IDENTIFIER_LEN: usize = 64;

/// SQL keywords that may not be used as table or column names.
const RESERVED_WORDS: &[&str] = &[
    "abort", "action", "add", "after", "all", "alter", "always", "analyze", "and", "as", "asc",
    "attach", "autoincrement", "before", "begin", "between", "by", "cascade", "case", "cast",
    "check", "collate", "column", "commit", "conflict", "constraint", "create", "cross",
    "current", "current_date", "current_time", "current_timestamp", "database", "default",
    "deferrable", "deferred", "delete", "desc", "detach", "distinct", "do", "drop", "each",
    "else", "end", "escape", "except", "exclude", "exclusive", "exists", "explain", "fail",
    "filter", "first", "following", "for", "foreign", "from", "full", "generated", "glob",
    "group", "groups", "having", "if", "ignore", "immediate", "in", "index", "indexed",
    "initially", "inner", "insert", "instead", "intersect", "into", "is", "isnull", "join",
    "key", "last", "left", "like", "limit", "match", "materialized", "natural", "no", "not",
    "nothing", "notnull", "null", "nulls", "of", "offset", "on", "or", "order", "others",
    "outer", "over", "partition", "plan", "pragma", "preceding", "primary", "query", "raise",
    "range", "recursive", "references", "regexp", "reindex", "release", "rename", "replace",
    "restrict", "returning", "right", "rollback", "row", "rows", "savepoint", "select", "set",
    "table", "temp", "temporary", "then", "ties", "to", "transaction", "trigger", "unbounded",
    "union", "unique", "update", "using", "vacuum", "values", "view", "virtual", "when",
    "where", "window", "with", "without",
];

/// Identifier and table-definition validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Name is empty.
    #[error("identifier cannot be empty")]
    EmptyIdentifier,
    /// Name exceeds [`MAX_IDENTIFIER_LEN`].
    #[error("identifier '{0}' exceeds {MAX_IDENTIFIER_LEN} characters")]
    IdentifierTooLong(String),
    /// Name contains characters outside the identifier grammar.
    #[error("invalid identifier '{0}': use letters, digits and underscores, not starting with a digit")]
    InvalidIdentifier(String),
    /// Name is an SQL keyword.
    #[error("'{0}' is a reserved word")]
    ReservedWord(String),
    /// Name uses the prefix SQLite keeps for its own tables.
    #[error("'{0}' uses the reserved 'sqlite_' prefix")]
    ReservedPrefix(String),
    /// Column type token is malformed.
    #[error("invalid column type '{0}'")]
    InvalidColumnType(String),
    /// A table was declared without any user columns.
    #[error("table '{0}' must define at least one column")]
    NoColumns(String),
    /// Two columns in the same table share a name.
    #[error("duplicate column: {0}")]
    DuplicateColumn(String),
    /// A user column tried to take the managed primary-key name.
    #[error("column '{0}' is managed automatically")]
    ReservedColumn(String),
    /// Column attributes are malformed or not supported on user columns.
    #[error("invalid attribute '{attribute}' on column '{column}'")]
    InvalidAttribute { column: String, attribute: String },
}

/// Validates a table or column name.
///
/// # Errors
///
/// Returns the first rule the name breaks.
pub fn validate_identifier(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::EmptyIdentifier);
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(ValidationError::IdentifierTooLong(name.to_string()));
    }

    let mut chars = name.chars();
    let first_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !first_ok || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ValidationError::InvalidIdentifier(name.to_string()));
    }

    let lower = name.to_ascii_lowercase();
    if lower.starts_with("sqlite_") {
        return Err(ValidationError::ReservedPrefix(name.to_string()));
    }
    if RESERVED_WORDS.binary_search(&lower.as_str()).is_ok() {
        return Err(ValidationError::ReservedWord(name.to_string()));
    }
    Ok(())
}

/// Validates `name` and wraps it in double quotes for use in SQL text.
///
/// # Errors
///
/// Same as [`validate_identifier`].
pub fn quote_identifier(name: &str) -> Result<String, ValidationError> {
    validate_identifier(name)?;
    Ok(format!("\"{name}\""))
}

/// Validates a declared type token such as `String`, `Int?` or `TEXT`.
pub fn validate_column_type(token: &str) -> Result<(), ValidationError> {
    let base = token.strip_suffix('?').unwrap_or(token);
    let mut chars = base.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ValidationError::InvalidColumnType(token.to_string()))
    }
}

/// Validates the attribute text of a user column.
///
/// Accepted attributes are `@unique` and a single `@default(...)` with a
/// balanced argument. `@id` belongs to the managed primary key only.
/// Control characters are rejected outright since attributes are written
/// verbatim into the schema file.
///
/// # Examples
///
/// ```
/// use dynatable_core::*;
///
/// let ok = ColumnDefinition::new("title", "String").with_attributes("@unique @default(\"x\")");
/// assert!(validate_column_attributes(&ok).is_empty());
///
/// let bad = ColumnDefinition::new("title", "String").with_attributes("@id");
/// assert!(!validate_column_attributes(&bad).is_empty());
/// ```
pub fn validate_column_attributes(column: &ColumnDefinition) -> Vec<ValidationError> {
    let invalid = |attribute: &str| ValidationError::InvalidAttribute {
        column: column.name.clone(),
        attribute: attribute.to_string(),
    };

    if column.attributes.chars().any(char::is_control) {
        return vec![invalid(&column.attributes)];
    }
    let Some(tokens) = split_attributes(&column.attributes) else {
        return vec![invalid(&column.attributes)];
    };

    let mut errors = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    for token in tokens {
        let name = token.split('(').next().unwrap_or(token);
        let supported = match name {
            "@unique" => token == name,
            "@default" => token
                .strip_prefix("@default(")
                .and_then(|t| t.strip_suffix(')'))
                .is_some_and(|arg| !arg.trim().is_empty()),
            _ => false,
        };
        if !supported || !seen.insert(name) {
            errors.push(invalid(token));
        }
    }
    errors
}

/// Splits attribute text into `@name` or `@name(...)` tokens.
///
/// Returns `None` when the text has stray characters between tokens or an
/// unbalanced argument list.
fn split_attributes(text: &str) -> Option<Vec<&str>> {
    let mut tokens = Vec::new();
    let mut rest = text.trim_start();
    while !rest.is_empty() {
        let body = rest.strip_prefix('@')?;
        let name_len = body
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(body.len());
        if name_len == 0 {
            return None;
        }
        let mut end = 1 + name_len;
        if rest[end..].starts_with('(') {
            end += argument_len(&rest[end..])?;
        }
        let after = &rest[end..];
        if !(after.is_empty() || after.starts_with(char::is_whitespace)) {
            return None;
        }
        tokens.push(&rest[..end]);
        rest = after.trim_start();
    }
    Some(tokens)
}

/// Length of a parenthesized argument list starting at `text[0] == '('`,
/// honoring quoted strings.
fn argument_len(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (idx, ch) in text.char_indices() {
        if in_string {
            match ch {
                '\\' if !escaped => escaped = true,
                '"' if !escaped => in_string = false,
                _ => escaped = false,
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(idx + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Validates a table about to be created from user-supplied columns.
///
/// `columns` excludes the implicit primary key; a user column named `id`
/// is rejected. Column names are compared case-insensitively, as SQLite
/// does. Returns every problem found, or an empty vector when the
/// definition is valid.
///
/// # Examples
///
/// ```
/// use dynatable_core::*;
///
/// let cols = vec![ColumnDefinition::new("email", "String")];
/// assert!(validate_new_table("users", &cols).is_empty());
///
/// let dup = vec![
///     ColumnDefinition::new("email", "String"),
///     ColumnDefinition::new("EMAIL", "String"),
/// ];
/// assert_eq!(
///     validate_new_table("users", &dup),
///     vec![ValidationError::DuplicateColumn("EMAIL".into())]
/// );
/// ```
pub fn validate_new_table(name: &str, columns: &[ColumnDefinition]) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if let Err(err) = validate_identifier(name) {
        errors.push(err);
    }
    if columns.is_empty() {
        errors.push(ValidationError::NoColumns(name.to_string()));
    }

    let mut seen: HashSet<String> = HashSet::new();
    for column in columns {
        if let Err(err) = validate_identifier(&column.name) {
            errors.push(err);
        }
        if column.name.eq_ignore_ascii_case(ID_COLUMN) {
            errors.push(ValidationError::ReservedColumn(column.name.clone()));
        } else if !seen.insert(column.name.to_ascii_lowercase()) {
            errors.push(ValidationError::DuplicateColumn(column.name.clone()));
        }
        if let Err(err) = validate_column_type(&column.column_type) {
            errors.push(err);
        }
        errors.extend(validate_column_attributes(column));
    }

    errors
}
