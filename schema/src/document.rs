//! Structured, round-trip-safe model of the schema file.
//!
//! A schema file is a sequence of blocks in a Prisma-like declarative
//! syntax:
//!
//! ```text
//! datasource db {
//!   provider = "sqlite"
//! }
//!
//! model users {
//!   id    Int    @id @default(autoincrement())
//!   email String
//! }
//! ```
//!
//! `model` blocks are parsed into [`TableDefinition`]s. Every other block,
//! comment and stray line is kept verbatim. A model that has not been
//! edited is written back exactly as it was read, so serializing an
//! unmodified [`SchemaDocument`] reproduces its input byte for byte. Edited
//! models are re-rendered with aligned columns.

use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

use dynatable_core::{
    ColumnDefinition, ID_COLUMN, TableDefinition, ValidationError, validate_identifier,
    validate_new_table,
};
use regex::Regex;

use crate::error::{Result, SchemaError};

static BLOCK_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)\s+([A-Za-z_][A-Za-z0-9_]*)\s*\{\s*(\})?\s*$")
        .expect("static regex must compile")
});

static FIELD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\s+(\S+)(?:\s+(.*))?$").expect("static regex must compile")
});

/// A line inside a model block.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ModelLine {
    Column(ColumnDefinition),
    /// Comment, block attribute (`@@...`) or blank line, trimmed.
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ModelBlock {
    name: String,
    /// Blank lines that precede the block; removed together with it.
    leading: String,
    lines: Vec<ModelLine>,
    /// Original text, present until the model is edited.
    raw: Option<String>,
}

impl ModelBlock {
    fn from_definition(table: &TableDefinition, leading: impl Into<String>) -> Self {
        Self {
            name: table.name.clone(),
            leading: leading.into(),
            lines: table
                .columns
                .iter()
                .cloned()
                .map(ModelLine::Column)
                .collect(),
            raw: None,
        }
    }

    fn columns(&self) -> impl Iterator<Item = &ColumnDefinition> {
        self.lines.iter().filter_map(|line| match line {
            ModelLine::Column(column) => Some(column),
            ModelLine::Other(_) => None,
        })
    }

    fn column_mut(&mut self, name: &str) -> Option<&mut ColumnDefinition> {
        self.lines.iter_mut().find_map(|line| match line {
            ModelLine::Column(column) if column.name == name => Some(column),
            _ => None,
        })
    }

    fn has_column(&self, name: &str) -> bool {
        self.columns().any(|c| c.name == name)
    }

    /// SQLite column names are case-insensitive.
    fn has_other_column_like(&self, name: &str, except: &str) -> bool {
        self.columns()
            .any(|c| c.name != except && c.name.eq_ignore_ascii_case(name))
    }

    fn table(&self) -> TableDefinition {
        TableDefinition {
            name: self.name.clone(),
            columns: self.columns().cloned().collect(),
        }
    }

    fn render_body(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name_width = self.columns().map(|c| c.name.len()).max().unwrap_or(0);
        let type_width = self
            .columns()
            .filter(|c| !c.attributes.is_empty())
            .map(|c| c.column_type.len())
            .max()
            .unwrap_or(0);

        writeln!(f, "model {} {{", self.name)?;
        for line in &self.lines {
            match line {
                ModelLine::Column(c) if c.attributes.is_empty() => {
                    writeln!(f, "  {:<name_width$} {}", c.name, c.column_type)?;
                }
                ModelLine::Column(c) => {
                    writeln!(
                        f,
                        "  {:<name_width$} {:<type_width$} {}",
                        c.name, c.column_type, c.attributes
                    )?;
                }
                ModelLine::Other(text) if text.is_empty() => writeln!(f)?,
                ModelLine::Other(text) => writeln!(f, "  {text}")?,
            }
        }
        writeln!(f, "}}")
    }
}

impl fmt::Display for ModelBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.leading)?;
        match &self.raw {
            Some(raw) => f.write_str(raw),
            None => self.render_body(f),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Block {
    Text(String),
    Model(ModelBlock),
}

/// Parsed schema file.
///
/// # Examples
///
/// ```
/// use dynatable_core::ColumnDefinition;
/// use dynatable_schema::SchemaDocument;
///
/// let mut doc = SchemaDocument::parse("").unwrap();
/// doc.add_table("users", vec![ColumnDefinition::new("email", "String")]).unwrap();
/// doc.rename_column("users", "email", "mail").unwrap();
///
/// let users = doc.table("users").unwrap();
/// assert_eq!(users.column_names(), vec!["id", "mail"]);
///
/// let reparsed = SchemaDocument::parse(&doc.to_string()).unwrap();
/// assert_eq!(reparsed.tables(), doc.tables());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDocument {
    blocks: Vec<Block>,
}

impl SchemaDocument {
    /// Parses schema text.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::ParseError`] for an unterminated block, a
    /// model line that is not `<name> <type> [attributes]`, or a model or
    /// column declared twice.
    pub fn parse(text: &str) -> Result<Self> {
        let mut blocks = Vec::new();
        let mut text_buf = String::new();
        let mut pending_blank = String::new();
        let mut model_names: HashSet<String> = HashSet::new();

        let mut lines = text.split_inclusive('\n').enumerate();
        while let Some((idx, line)) = lines.next() {
            if line.trim().is_empty() {
                pending_blank.push_str(line);
                continue;
            }

            let Some(caps) = BLOCK_HEADER_RE.captures(line) else {
                text_buf.push_str(&std::mem::take(&mut pending_blank));
                text_buf.push_str(line);
                continue;
            };

            let header_line = idx + 1;
            let keyword = caps[1].to_string();
            let name = caps[2].to_string();
            let mut raw = line.to_string();
            let mut body: Vec<(usize, &str)> = Vec::new();

            if caps.get(3).is_none() {
                let mut closed = false;
                for (body_idx, body_line) in lines.by_ref() {
                    raw.push_str(body_line);
                    if body_line.trim() == "}" {
                        closed = true;
                        break;
                    }
                    body.push((body_idx + 1, body_line));
                }
                if !closed {
                    return Err(SchemaError::ParseError {
                        line: header_line,
                        message: format!("unterminated block '{keyword} {name}'"),
                    });
                }
            }

            if keyword != "model" {
                text_buf.push_str(&std::mem::take(&mut pending_blank));
                text_buf.push_str(&raw);
                continue;
            }

            if !model_names.insert(name.clone()) {
                return Err(SchemaError::ParseError {
                    line: header_line,
                    message: format!("model {name} is declared more than once"),
                });
            }

            if !text_buf.is_empty() {
                blocks.push(Block::Text(std::mem::take(&mut text_buf)));
            }
            let model_lines = parse_model_body(&name, &body)?;
            blocks.push(Block::Model(ModelBlock {
                name,
                leading: std::mem::take(&mut pending_blank),
                lines: model_lines,
                raw: Some(raw),
            }));
        }

        text_buf.push_str(&pending_blank);
        if !text_buf.is_empty() {
            blocks.push(Block::Text(text_buf));
        }

        Ok(Self { blocks })
    }

    /// All declared tables, in file order.
    pub fn tables(&self) -> Vec<TableDefinition> {
        self.models().map(ModelBlock::table).collect()
    }

    /// Names of all declared tables, in file order.
    pub fn table_names(&self) -> Vec<&str> {
        self.models().map(|m| m.name.as_str()).collect()
    }

    /// Looks up a declared table by exact name.
    pub fn table(&self, name: &str) -> Option<TableDefinition> {
        self.models().find(|m| m.name == name).map(ModelBlock::table)
    }

    /// Returns `true` if a table with exactly this name is declared.
    pub fn contains_table(&self, name: &str) -> bool {
        self.models().any(|m| m.name == name)
    }

    /// Appends a new table.
    ///
    /// The table gets the implicit `id` primary key followed by `columns`
    /// in the given order. Names are compared case-insensitively against
    /// existing tables because SQLite treats table names that way.
    ///
    /// # Errors
    ///
    /// [`SchemaError::DuplicateTable`] if the name is taken, or
    /// [`SchemaError::InvalidTable`] listing every problem with the name,
    /// columns or attributes.
    pub fn add_table(
        &mut self,
        name: &str,
        columns: Vec<ColumnDefinition>,
    ) -> Result<TableDefinition> {
        if self.models().any(|m| m.name.eq_ignore_ascii_case(name)) {
            return Err(SchemaError::DuplicateTable(name.to_string()));
        }
        let errors = validate_new_table(name, &columns);
        if !errors.is_empty() {
            return Err(SchemaError::InvalidTable {
                table: name.to_string(),
                errors,
            });
        }

        let mut table = TableDefinition::new(name).with_column(ColumnDefinition::primary_key());
        table.columns.extend(columns);

        let current = self.to_string();
        let leading = if current.is_empty() || current.ends_with("\n\n") {
            ""
        } else if current.ends_with('\n') {
            "\n"
        } else {
            "\n\n"
        };
        self.blocks
            .push(Block::Model(ModelBlock::from_definition(&table, leading)));
        Ok(table)
    }

    /// Removes a table's whole block, leaving every other block untouched.
    ///
    /// # Errors
    ///
    /// [`SchemaError::TableNotFound`] if no such table is declared.
    pub fn remove_table(&mut self, name: &str) -> Result<TableDefinition> {
        let idx = self
            .blocks
            .iter()
            .position(|b| matches!(b, Block::Model(m) if m.name == name))
            .ok_or_else(|| SchemaError::TableNotFound(name.to_string()))?;

        let Block::Model(removed) = self.blocks.remove(idx) else {
            return Err(SchemaError::TableNotFound(name.to_string()));
        };

        if idx == 0 {
            if let Some(Block::Model(next)) = self.blocks.first_mut() {
                next.leading.clear();
            }
        }

        Ok(removed.table())
    }

    /// Renames a column of one table, keeping its type token and attributes.
    ///
    /// Only the named table's block is searched, so a column of the same
    /// name in another table is unaffected. Renaming a column to its
    /// current name is a no-op.
    ///
    /// # Errors
    ///
    /// [`SchemaError::TableNotFound`], [`SchemaError::ColumnNotFound`], or
    /// [`SchemaError::InvalidDefinition`] when the new name is invalid,
    /// already used in the table, or either name is the managed `id`.
    pub fn rename_column(&mut self, table: &str, old_name: &str, new_name: &str) -> Result<()> {
        let model = self
            .models_mut()
            .find(|m| m.name == table)
            .ok_or_else(|| SchemaError::TableNotFound(table.to_string()))?;

        if !model.has_column(old_name) {
            return Err(SchemaError::ColumnNotFound {
                table: table.to_string(),
                column: old_name.to_string(),
            });
        }
        if old_name == new_name {
            return Ok(());
        }

        validate_identifier(new_name)?;
        if old_name.eq_ignore_ascii_case(ID_COLUMN) {
            return Err(ValidationError::ReservedColumn(old_name.to_string()).into());
        }
        if new_name.eq_ignore_ascii_case(ID_COLUMN) {
            return Err(ValidationError::ReservedColumn(new_name.to_string()).into());
        }
        if model.has_other_column_like(new_name, old_name) {
            return Err(ValidationError::DuplicateColumn(new_name.to_string()).into());
        }

        if let Some(column) = model.column_mut(old_name) {
            column.name = new_name.to_string();
        }
        model.raw = None;
        Ok(())
    }

    fn models(&self) -> impl Iterator<Item = &ModelBlock> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Model(m) => Some(m),
            Block::Text(_) => None,
        })
    }

    fn models_mut(&mut self) -> impl Iterator<Item = &mut ModelBlock> {
        self.blocks.iter_mut().filter_map(|b| match b {
            Block::Model(m) => Some(m),
            Block::Text(_) => None,
        })
    }
}

impl fmt::Display for SchemaDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for block in &self.blocks {
            match block {
                Block::Text(text) => f.write_str(text)?,
                Block::Model(model) => write!(f, "{model}")?,
            }
        }
        Ok(())
    }
}

fn parse_model_body(model: &str, body: &[(usize, &str)]) -> Result<Vec<ModelLine>> {
    let mut lines = Vec::with_capacity(body.len());
    let mut seen: HashSet<String> = HashSet::new();

    for &(line_no, raw) in body {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with("//") || trimmed.starts_with("@@") {
            lines.push(ModelLine::Other(trimmed.to_string()));
            continue;
        }

        let caps = FIELD_RE
            .captures(trimmed)
            .ok_or_else(|| SchemaError::ParseError {
                line: line_no,
                message: format!("expected '<name> <type>' in model {model}, found '{trimmed}'"),
            })?;

        let name = caps.get(1).map_or("", |m| m.as_str());
        if !seen.insert(name.to_ascii_lowercase()) {
            return Err(SchemaError::ParseError {
                line: line_no,
                message: format!("column {name} is declared more than once in model {model}"),
            });
        }

        let attributes = caps.get(3).map_or("", |m| m.as_str().trim());
        lines.push(ModelLine::Column(
            ColumnDefinition::new(name, &caps[2]).with_attributes(attributes),
        ));
    }

    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "datasource db {\n  provider = \"sqlite\"\n  url      = \"file:dev.db\"\n}\n\nmodel users {\n  id    Int    @id @default(autoincrement())\n  email String\n}\n\nmodel posts {\n  id    Int    @id @default(autoincrement())\n  title String @default(\"untitled\")\n  email String?\n}\n";

    const USERS_BLOCK: &str = "model users {\n  id    Int    @id @default(autoincrement())\n  email String\n}\n";

    #[test]
    fn test_parse_roundtrip_is_exact() {
        let doc = SchemaDocument::parse(SAMPLE).unwrap();
        assert_eq!(doc.to_string(), SAMPLE);
        assert_eq!(doc.table_names(), vec!["users", "posts"]);
    }

    #[test]
    fn test_parse_reads_columns_and_attributes() {
        let doc = SchemaDocument::parse(SAMPLE).unwrap();
        let posts = doc.table("posts").unwrap();
        assert_eq!(posts.column_names(), vec!["id", "title", "email"]);
        assert_eq!(posts.columns[1].column_type, "String");
        assert_eq!(posts.columns[1].attributes, "@default(\"untitled\")");
        assert!(posts.columns[2].is_optional());
        assert!(posts.columns[0].is_primary_key());
    }

    #[test]
    fn test_parse_preserves_comments_without_trailing_newline() {
        let text = "// header comment\nmodel a {\n  // note\n  id Int @id\n  @@map(\"a_table\")\n}";
        let doc = SchemaDocument::parse(text).unwrap();
        assert_eq!(doc.to_string(), text);
        assert_eq!(doc.table("a").unwrap().column_names(), vec!["id"]);
    }

    #[test]
    fn test_parse_inline_empty_model() {
        let doc = SchemaDocument::parse("model empty {}\n").unwrap();
        assert!(doc.table("empty").unwrap().columns.is_empty());
        assert_eq!(doc.to_string(), "model empty {}\n");
    }

    #[test]
    fn test_parse_rejects_unterminated_block() {
        let err = SchemaDocument::parse("model users {\n  id Int\n").unwrap_err();
        assert!(matches!(err, SchemaError::ParseError { line: 1, .. }));
    }

    #[test]
    fn test_parse_rejects_malformed_field() {
        let err = SchemaDocument::parse("model users {\n  id Int\n  lonely\n}\n").unwrap_err();
        assert!(matches!(err, SchemaError::ParseError { line: 3, .. }));
    }

    #[test]
    fn test_parse_rejects_duplicate_model() {
        let err = SchemaDocument::parse("model a {\n  id Int\n}\nmodel a {\n  id Int\n}\n").unwrap_err();
        assert!(matches!(err, SchemaError::ParseError { line: 4, .. }));
    }

    #[test]
    fn test_add_table_to_empty_document() {
        let mut doc = SchemaDocument::default();
        doc.add_table("users", vec![ColumnDefinition::new("email", "TEXT")])
            .unwrap();
        assert_eq!(
            doc.to_string(),
            "model users {\n  id    Int @id @default(autoincrement())\n  email TEXT\n}\n"
        );
    }

    #[test]
    fn test_add_table_appends_after_blank_line() {
        let mut doc = SchemaDocument::parse(SAMPLE).unwrap();
        doc.add_table("comments", vec![ColumnDefinition::new("body", "String")])
            .unwrap();

        let text = doc.to_string();
        assert!(text.starts_with(SAMPLE));
        assert_eq!(
            &text[SAMPLE.len()..],
            "\nmodel comments {\n  id   Int @id @default(autoincrement())\n  body String\n}\n"
        );
        assert_eq!(doc.table_names(), vec!["users", "posts", "comments"]);
    }

    #[test]
    fn test_add_table_rejects_duplicate_case_insensitively() {
        let mut doc = SchemaDocument::parse(SAMPLE).unwrap();
        let err = doc
            .add_table("Users", vec![ColumnDefinition::new("x", "String")])
            .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateTable(name) if name == "Users"));
        assert_eq!(doc.to_string(), SAMPLE);
    }

    #[test]
    fn test_add_table_rejects_invalid_columns() {
        let mut doc = SchemaDocument::default();
        let err = doc.add_table("users", vec![]).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::InvalidTable { ref errors, .. }
                if errors == &[ValidationError::NoColumns("users".to_string())]
        ));
        let err = doc
            .add_table("bad name", vec![ColumnDefinition::new("x", "String")])
            .unwrap_err();
        assert!(matches!(
            err,
            SchemaError::InvalidTable { ref errors, .. }
                if matches!(errors.as_slice(), [ValidationError::InvalidIdentifier(_)])
        ));
        assert_eq!(doc.to_string(), "");
    }

    #[test]
    fn test_add_table_rejects_attribute_lines() {
        let mut doc = SchemaDocument::parse(SAMPLE).unwrap();
        let column = ColumnDefinition::new("email", "String").with_attributes("@unique\n  lonely\n");
        let err = doc.add_table("accounts", vec![column]).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidTable { .. }));
        assert_eq!(doc.to_string(), SAMPLE);
    }

    #[test]
    fn test_add_table_reports_every_problem() {
        let mut doc = SchemaDocument::default();
        let columns = vec![
            ColumnDefinition::new("ID", "Int"),
            ColumnDefinition::new("email", "String"),
            ColumnDefinition::new("EMAIL", "String"),
        ];
        let err = doc.add_table("accounts", columns).unwrap_err();
        let SchemaError::InvalidTable { errors, .. } = err else {
            panic!("expected InvalidTable");
        };
        assert_eq!(
            errors,
            vec![
                ValidationError::ReservedColumn("ID".to_string()),
                ValidationError::DuplicateColumn("EMAIL".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_rejects_columns_differing_only_in_case() {
        let text = "model users {\n  id    Int @id\n  email String\n  EMAIL String\n}\n";
        assert!(matches!(
            SchemaDocument::parse(text),
            Err(SchemaError::ParseError { line: 4, .. })
        ));
    }

    #[test]
    fn test_remove_middle_table_keeps_neighbours() {
        let mut doc = SchemaDocument::parse(SAMPLE).unwrap();
        let removed = doc.remove_table("users").unwrap();
        assert_eq!(removed.column_names(), vec!["id", "email"]);
        assert_eq!(doc.to_string(), SAMPLE.replace(&format!("{USERS_BLOCK}\n"), ""));
    }

    #[test]
    fn test_remove_last_table() {
        let mut doc = SchemaDocument::parse(SAMPLE).unwrap();
        doc.remove_table("posts").unwrap();
        let text = doc.to_string();
        assert!(text.ends_with(USERS_BLOCK));
        assert!(!text.contains("model posts"));
    }

    #[test]
    fn test_remove_first_block_drops_leading_blank() {
        let text = "model a {\n  id Int\n}\n\nmodel b {\n  id Int\n}\n";
        let mut doc = SchemaDocument::parse(text).unwrap();
        doc.remove_table("a").unwrap();
        assert_eq!(doc.to_string(), "model b {\n  id Int\n}\n");
    }

    #[test]
    fn test_remove_missing_table() {
        let mut doc = SchemaDocument::parse(SAMPLE).unwrap();
        assert!(matches!(
            doc.remove_table("nope"),
            Err(SchemaError::TableNotFound(name)) if name == "nope"
        ));
    }

    #[test]
    fn test_rename_column_is_block_scoped() {
        let mut doc = SchemaDocument::parse(SAMPLE).unwrap();
        doc.rename_column("posts", "email", "contact").unwrap();

        let text = doc.to_string();
        assert!(text.contains(USERS_BLOCK));
        assert!(text.contains(
            "model posts {\n  id      Int    @id @default(autoincrement())\n  title   String @default(\"untitled\")\n  contact String?\n}\n"
        ));
        assert_eq!(
            doc.table("users").unwrap().column_names(),
            vec!["id", "email"]
        );
    }

    #[test]
    fn test_rename_column_keeps_default_and_injects_none() {
        let mut doc = SchemaDocument::parse(SAMPLE).unwrap();
        doc.rename_column("posts", "title", "headline").unwrap();
        doc.rename_column("users", "email", "mail").unwrap();

        let posts = doc.table("posts").unwrap();
        assert_eq!(posts.columns[1].name, "headline");
        assert_eq!(posts.columns[1].default_value(), Some("\"untitled\""));

        let users = doc.table("users").unwrap();
        assert_eq!(users.columns[1].name, "mail");
        assert!(users.columns[1].attributes.is_empty());
        assert!(!doc.to_string().contains("@default(\"null\")"));
    }

    #[test]
    fn test_rename_column_errors_leave_text_unchanged() {
        let mut doc = SchemaDocument::parse(SAMPLE).unwrap();

        assert!(matches!(
            doc.rename_column("nope", "a", "b"),
            Err(SchemaError::TableNotFound(_))
        ));
        assert!(matches!(
            doc.rename_column("users", "missing", "b"),
            Err(SchemaError::ColumnNotFound { .. })
        ));
        assert!(matches!(
            doc.rename_column("posts", "title", "email"),
            Err(SchemaError::InvalidDefinition(ValidationError::DuplicateColumn(_)))
        ));
        assert!(matches!(
            doc.rename_column("posts", "id", "key_id"),
            Err(SchemaError::InvalidDefinition(ValidationError::ReservedColumn(_)))
        ));
        assert!(matches!(
            doc.rename_column("posts", "title", "EMAIL"),
            Err(SchemaError::InvalidDefinition(ValidationError::DuplicateColumn(_)))
        ));
        assert!(matches!(
            doc.rename_column("posts", "title", "Id"),
            Err(SchemaError::InvalidDefinition(ValidationError::ReservedColumn(_)))
        ));
        assert!(matches!(
            doc.rename_column("posts", "title", "bad-name"),
            Err(SchemaError::InvalidDefinition(ValidationError::InvalidIdentifier(_)))
        ));
        assert_eq!(doc.to_string(), SAMPLE);
    }

    #[test]
    fn test_rename_column_changes_only_case() {
        let mut doc = SchemaDocument::parse(SAMPLE).unwrap();
        doc.rename_column("users", "email", "Email").unwrap();
        assert_eq!(doc.table("users").unwrap().column_names(), vec!["id", "Email"]);
    }

    #[test]
    fn test_rename_to_same_name_is_noop() {
        let mut doc = SchemaDocument::parse(SAMPLE).unwrap();
        doc.rename_column("users", "email", "email").unwrap();
        assert_eq!(doc.to_string(), SAMPLE);
    }
}
