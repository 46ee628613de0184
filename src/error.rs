//! Fatal error types: anything here aborts the run before the network is touched.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Missing or unusable configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("ORG_ID is not set")]
    MissingOrgId,

    #[error("ORG_ID must be a positive integer, got {0:?}")]
    InvalidOrgId(String),

    #[error("API_TOKEN (or TOKEN) is not set")]
    MissingToken,

    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid setting {key}: {reason}")]
    InvalidSetting { key: &'static str, reason: String },
}

/// What went wrong with one CSV file, row, or cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProblemKind {
    Unreadable(String),
    Malformed(String),
    MissingColumn { column: &'static str },
    MissingValue { column: &'static str },
    InvalidBool { column: &'static str, value: String },
    Duplicate { column: &'static str, value: String, first_line: u64 },
    UnknownDepartment { value: String },
}

/// A single validation finding, located by file and (when known) line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    pub file: PathBuf,
    /// 1-based; the header is line 1
    pub line: Option<u64>,
    pub kind: ProblemKind,
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file.display())?;
        if let Some(line) = self.line {
            write!(f, ":{line}")?;
        }
        match &self.kind {
            ProblemKind::Unreadable(reason) => write!(f, ": cannot read file: {reason}"),
            ProblemKind::Malformed(reason) => write!(f, ": malformed row: {reason}"),
            ProblemKind::MissingColumn { column } => {
                write!(f, ": missing required column '{column}'")
            }
            ProblemKind::MissingValue { column } => {
                write!(f, ": missing required value for '{column}'")
            }
            ProblemKind::InvalidBool { column, value } => {
                write!(f, ": '{column}' must be true or false, got '{value}'")
            }
            ProblemKind::Duplicate {
                column,
                value,
                first_line,
            } => write!(
                f,
                ": duplicate {column} '{value}' (first seen on line {first_line})"
            ),
            ProblemKind::UnknownDepartment { value } => {
                write!(f, ": dept_external_id '{value}' matches no department")
            }
        }
    }
}

/// Every problem found across the input files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub problems: Vec<Problem>,
}

impl std::error::Error for ValidationError {}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CSV validation failed with {} problem(s)", self.problems.len())?;
        for problem in &self.problems {
            write!(f, "\n  - {problem}")?;
        }
        Ok(())
    }
}

/// A parent reference that names no department.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingParent {
    pub department: String,
    pub parent: String,
}

/// The department hierarchy cannot be ordered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DependencyError {
    #[error("parent external_id not found: {}", format_dangling(.0))]
    MissingParents(Vec<DanglingParent>),

    /// `members` lie on a cycle; `blocked` descend from one.
    #[error("cycle detected among departments [{}]{}", .members.join(", "), format_blocked(.blocked))]
    Cycle {
        members: Vec<String>,
        blocked: Vec<String>,
    },
}

fn format_dangling(dangling: &[DanglingParent]) -> String {
    dangling
        .iter()
        .map(|d| format!("{} -> {}", d.department, d.parent))
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_blocked(blocked: &[String]) -> String {
    if blocked.is_empty() {
        String::new()
    } else {
        format!("; also blocked: [{}]", blocked.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_lists_every_problem() {
        let err = ValidationError {
            problems: vec![
                Problem {
                    file: PathBuf::from("departments.csv"),
                    line: None,
                    kind: ProblemKind::MissingColumn { column: "name" },
                },
                Problem {
                    file: PathBuf::from("users.csv"),
                    line: Some(4),
                    kind: ProblemKind::Duplicate {
                        column: "nickname",
                        value: "ivanov".to_string(),
                        first_line: 2,
                    },
                },
            ],
        };
        let rendered = err.to_string();
        assert!(rendered.contains("2 problem(s)"));
        assert!(rendered.contains("departments.csv: missing required column 'name'"));
        assert!(rendered.contains("users.csv:4: duplicate nickname 'ivanov' (first seen on line 2)"));
    }

    #[test]
    fn test_dependency_error_messages() {
        let missing = DependencyError::MissingParents(vec![DanglingParent {
            department: "child".to_string(),
            parent: "ghost".to_string(),
        }]);
        assert_eq!(missing.to_string(), "parent external_id not found: child -> ghost");

        let cycle = DependencyError::Cycle {
            members: vec!["a".to_string(), "b".to_string()],
            blocked: vec!["c".to_string()],
        };
        assert_eq!(
            cycle.to_string(),
            "cycle detected among departments [a, b]; also blocked: [c]"
        );
    }
}
