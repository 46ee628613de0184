//! Column schemas for the two input files

use std::collections::HashMap;

/// How a cell is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Bool,
}

/// One column of an input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub required: bool,
    /// Substituted when the column or cell is absent
    pub default: Option<&'static str>,
    pub kind: FieldKind,
}

impl Field {
    pub const fn required(name: &'static str) -> Self {
        Self {
            name,
            required: true,
            default: None,
            kind: FieldKind::Text,
        }
    }

    pub const fn optional(name: &'static str) -> Self {
        Self {
            name,
            required: false,
            default: None,
            kind: FieldKind::Text,
        }
    }

    pub const fn with_default(mut self, default: &'static str) -> Self {
        self.default = Some(default);
        self
    }

    pub const fn boolean(mut self) -> Self {
        self.kind = FieldKind::Bool;
        self
    }
}

/// Column layout of one input file plus its unique key column.
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    pub key: &'static str,
    pub fields: &'static [Field],
}

pub const DEPARTMENTS: Schema = Schema {
    key: "external_id",
    fields: &[
        Field::required("external_id"),
        Field::required("name"),
        Field::optional("parent_external_id"),
        Field::optional("label"),
        Field::optional("description"),
    ],
};

pub const USERS: Schema = Schema {
    key: "nickname",
    fields: &[
        Field::required("nickname"),
        Field::required("first"),
        Field::required("last"),
        Field::required("dept_external_id"),
        Field::optional("middle"),
        Field::optional("position"),
        Field::optional("language").with_default(crate::models::DEFAULT_LANGUAGE),
        Field::optional("timezone").with_default(crate::models::DEFAULT_TIMEZONE),
        Field::optional("password"),
        Field::optional("passwordChangeRequired")
            .with_default("true")
            .boolean(),
        Field::optional("externalId"),
    ],
};

/// A validated row with defaults applied. Absent optional cells are missing
/// from the map rather than empty.
#[derive(Debug, Clone)]
pub struct Row {
    pub line: u64,
    values: HashMap<&'static str, String>,
}

impl Row {
    pub(crate) fn new(line: u64, values: HashMap<&'static str, String>) -> Self {
        Self { line, values }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Owned value of an optional cell
    pub fn opt(&self, name: &str) -> Option<String> {
        self.get(name).map(str::to_string)
    }

    /// Owned value of a required (or defaulted) cell
    pub fn text(&self, name: &str) -> String {
        self.get(name).unwrap_or_default().to_string()
    }

    pub fn flag(&self, name: &str) -> bool {
        self.get(name).and_then(parse_bool).unwrap_or(false)
    }
}

/// Lenient boolean parsing: true/false, yes/no, 1/0, any case.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_variants() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" no "), Some(false));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_schemas_key_is_required() {
        for schema in [DEPARTMENTS, USERS] {
            let key = schema.fields.iter().find(|f| f.name == schema.key).unwrap();
            assert!(key.required);
        }
    }
}
