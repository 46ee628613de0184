//! CSV loading and validation
//!
//! Both files are read through one schema-driven mapper. Every problem in
//! either file is collected before anything is returned, so a single
//! `ValidationError` describes all of the input at once.

pub mod schema;

use std::collections::{HashMap, HashSet};
use std::path::Path;

use tracing::debug;

use crate::error::{Problem, ProblemKind, ValidationError};
use crate::models::{Department, User};
use schema::{FieldKind, Row, Schema, parse_bool};

/// A record type that can be built from a validated CSV row.
pub trait FromRow: Sized {
    const SCHEMA: Schema;

    fn from_row(row: &Row) -> Self;
}

impl FromRow for Department {
    const SCHEMA: Schema = schema::DEPARTMENTS;

    fn from_row(row: &Row) -> Self {
        Self {
            external_id: row.text("external_id"),
            name: row.text("name"),
            parent_external_id: row.opt("parent_external_id"),
            label: row.opt("label"),
            description: row.opt("description"),
        }
    }
}

impl FromRow for User {
    const SCHEMA: Schema = schema::USERS;

    fn from_row(row: &Row) -> Self {
        Self {
            nickname: row.text("nickname"),
            first: row.text("first"),
            last: row.text("last"),
            middle: row.opt("middle"),
            position: row.opt("position"),
            dept_external_id: row.text("dept_external_id"),
            language: row.text("language"),
            timezone: row.text("timezone"),
            password: row.opt("password"),
            password_change_required: row.flag("passwordChangeRequired"),
            external_id: row.opt("externalId"),
        }
    }
}

/// Validated contents of both input files.
#[derive(Debug, Clone)]
pub struct Inputs {
    pub departments: Vec<Department>,
    pub users: Vec<User>,
}

/// Load and validate both files, reporting the problems of both together.
pub fn load(departments_path: &Path, users_path: &Path) -> Result<Inputs, ValidationError> {
    let (department_rows, mut problems) = read_rows(departments_path, &Department::SCHEMA);
    let (user_rows, user_problems) = read_rows(users_path, &User::SCHEMA);

    // Cross-file references only make sense against a clean department file.
    let dangling = if problems.is_empty() {
        unknown_departments(&department_rows, &user_rows, users_path)
    } else {
        Vec::new()
    };
    problems.extend(user_problems);
    problems.extend(dangling);

    if !problems.is_empty() {
        return Err(ValidationError { problems });
    }

    debug!(
        departments = department_rows.len(),
        users = user_rows.len(),
        "Loaded input files"
    );
    Ok(Inputs {
        departments: department_rows.iter().map(Department::from_row).collect(),
        users: user_rows.iter().map(User::from_row).collect(),
    })
}

/// Load and validate a single file of records.
#[cfg(test)]
fn load_file<T: FromRow>(path: &Path) -> Result<Vec<T>, ValidationError> {
    let (rows, problems) = read_rows(path, &T::SCHEMA);
    if problems.is_empty() {
        Ok(rows.iter().map(T::from_row).collect())
    } else {
        Err(ValidationError { problems })
    }
}

/// Read `path` against `schema`, applying defaults and collecting problems.
pub fn read_rows(path: &Path, schema: &Schema) -> (Vec<Row>, Vec<Problem>) {
    let problem = |line: Option<u64>, kind: ProblemKind| Problem {
        file: path.to_path_buf(),
        line,
        kind,
    };

    let mut reader = match csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
    {
        Ok(reader) => reader,
        Err(e) => return (Vec::new(), vec![problem(None, ProblemKind::Unreadable(e.to_string()))]),
    };

    let headers: HashMap<String, usize> = match reader.headers() {
        Ok(headers) => headers
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.trim_start_matches('\u{feff}').trim().to_string(), idx))
            .collect(),
        Err(e) => return (Vec::new(), vec![problem(Some(1), ProblemKind::Unreadable(e.to_string()))]),
    };

    let mut problems = Vec::new();
    let mut columns = Vec::with_capacity(schema.fields.len());
    for field in schema.fields {
        let index = headers.get(field.name).copied();
        if index.is_none() && field.required {
            problems.push(problem(Some(1), ProblemKind::MissingColumn { column: field.name }));
        }
        columns.push((field, index));
    }

    let mut rows = Vec::new();
    let mut seen_keys: HashMap<String, u64> = HashMap::new();

    for (idx, result) in reader.records().enumerate() {
        let fallback_line = idx as u64 + 2;
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                let line = e.position().map_or(fallback_line, |p| p.line());
                problems.push(problem(Some(line), ProblemKind::Malformed(e.to_string())));
                continue;
            }
        };
        let line = record.position().map_or(fallback_line, |p| p.line());

        let mut row_ok = true;
        let mut values = HashMap::new();
        for (field, index) in &columns {
            let cell = index
                .and_then(|i| record.get(i))
                .map(str::trim)
                .filter(|v| !v.is_empty());

            let value = match (cell, field.default) {
                (Some(v), _) => v.to_string(),
                (None, Some(default)) => default.to_string(),
                (None, None) => {
                    // A missing required column was already reported once.
                    if field.required && index.is_some() {
                        problems.push(problem(Some(line), ProblemKind::MissingValue { column: field.name }));
                        row_ok = false;
                    }
                    continue;
                }
            };

            if field.kind == FieldKind::Bool && parse_bool(&value).is_none() {
                problems.push(problem(
                    Some(line),
                    ProblemKind::InvalidBool {
                        column: field.name,
                        value: value.clone(),
                    },
                ));
                row_ok = false;
            }

            values.insert(field.name, value);
        }

        if let Some(key) = values.get(schema.key) {
            if let Some(&first_line) = seen_keys.get(key) {
                problems.push(problem(
                    Some(line),
                    ProblemKind::Duplicate {
                        column: schema.key,
                        value: key.clone(),
                        first_line,
                    },
                ));
                row_ok = false;
            } else {
                seen_keys.insert(key.clone(), line);
            }
        }

        if row_ok {
            rows.push(Row::new(line, values));
        }
    }

    (rows, problems)
}

fn unknown_departments(departments: &[Row], users: &[Row], file: &Path) -> Vec<Problem> {
    let known: HashSet<&str> = departments
        .iter()
        .filter_map(|row| row.get("external_id"))
        .collect();
    users
        .iter()
        .filter_map(|row| {
            let dept = row.get("dept_external_id")?;
            (!known.contains(dept)).then(|| Problem {
                file: file.to_path_buf(),
                line: Some(row.line),
                kind: ProblemKind::UnknownDepartment {
                    value: dept.to_string(),
                },
            })
        })
        .collect()
}
