//! Per-entity outcomes and the run summary

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// What happened to one department or user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// `remote_id` is `None` when the create was only planned
    Created { remote_id: Option<String> },
    Updated { fields: Vec<&'static str> },
    Unchanged,
    /// The entity's own remote call failed
    Failed { error: String },
    /// Not attempted because `dependency` is unavailable
    Skipped { dependency: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub key: String,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Outcomes for one entity type, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EntityReport {
    pub counts: Counts,
    pub entries: Vec<Entry>,
}

impl EntityReport {
    pub fn record(&mut self, key: &str, outcome: Outcome) {
        let counter = match outcome {
            Outcome::Created { .. } => &mut self.counts.created,
            Outcome::Updated { .. } => &mut self.counts.updated,
            Outcome::Unchanged => &mut self.counts.unchanged,
            Outcome::Failed { .. } => &mut self.counts.failed,
            Outcome::Skipped { .. } => &mut self.counts.skipped,
        };
        *counter += 1;
        self.entries.push(Entry {
            key: key.to_string(),
            outcome,
        });
    }

    pub fn outcome(&self, key: &str) -> Option<&Outcome> {
        self.entries.iter().find(|e| e.key == key).map(|e| &e.outcome)
    }

    /// Entries that failed or were skipped
    pub fn problems(&self) -> impl Iterator<Item = &Entry> {
        self.entries
            .iter()
            .filter(|e| matches!(e.outcome, Outcome::Failed { .. } | Outcome::Skipped { .. }))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub departments: EntityReport,
    pub users: EntityReport,
}

impl RunReport {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            started_at: Utc::now(),
            finished_at: None,
            departments: EntityReport::default(),
            users: EntityReport::default(),
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Whether any entity failed or was skipped
    pub fn has_problems(&self) -> bool {
        self.departments.problems().next().is_some() || self.users.problems().next().is_some()
    }

    /// Creates plus updates, performed or planned
    pub fn changes(&self) -> usize {
        let d = self.departments.counts;
        let u = self.users.counts;
        d.created + d.updated + u.created + u.updated
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = if self.dry_run { "[dry-run] " } else { "" };
        let (created, updated) = if self.dry_run {
            ("to create", "to update")
        } else {
            ("created", "updated")
        };

        for (label, report) in [("Departments", &self.departments), ("Users", &self.users)] {
            let c = report.counts;
            writeln!(
                f,
                "{prefix}{label}: {} {created}, {} {updated}, {} unchanged, {} failed, {} skipped",
                c.created, c.updated, c.unchanged, c.failed, c.skipped
            )?;
            for entry in report.problems() {
                match &entry.outcome {
                    Outcome::Failed { error } => writeln!(f, "  ✗  {}: {error}", entry.key)?,
                    Outcome::Skipped { dependency } => writeln!(
                        f,
                        "  ·  {}: skipped, depends on unavailable department '{dependency}'",
                        entry.key
                    )?,
                    _ => {}
                }
            }
        }

        if let Some(finished) = self.finished_at {
            let elapsed = finished - self.started_at;
            write!(f, "{prefix}Finished in {:.1}s", elapsed.num_milliseconds() as f64 / 1000.0)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_updates_counts() {
        let mut report = EntityReport::default();
        report.record("a", Outcome::Created { remote_id: Some("5".into()) });
        report.record("b", Outcome::Unchanged);
        report.record("c", Outcome::Skipped { dependency: "a".into() });
        assert_eq!(
            report.counts,
            Counts {
                created: 1,
                unchanged: 1,
                skipped: 1,
                ..Default::default()
            }
        );
        assert_eq!(report.outcome("b"), Some(&Outcome::Unchanged));
        assert_eq!(report.problems().count(), 1);
    }

    #[test]
    fn test_summary_lists_failures_and_skips() {
        let mut report = RunReport::new(false);
        report.departments.record("sales", Outcome::Failed { error: "boom".into() });
        report.users.record("ivanov", Outcome::Skipped { dependency: "sales".into() });
        report.finish();

        let text = report.to_string();
        assert!(text.contains("Departments: 0 created, 0 updated, 0 unchanged, 1 failed, 0 skipped"));
        assert!(text.contains("✗  sales: boom"));
        assert!(text.contains("ivanov: skipped, depends on unavailable department 'sales'"));
        assert!(report.has_problems());
    }

    #[test]
    fn test_dry_run_summary_wording() {
        let mut report = RunReport::new(true);
        report.users.record("ivanov", Outcome::Created { remote_id: None });
        let text = report.to_string();
        assert!(text.contains("[dry-run] Users: 1 to create, 0 to update"));
        assert_eq!(report.changes(), 1);
    }

    #[test]
    fn test_outcome_json_shape() {
        let json = serde_json::to_value(Outcome::Updated { fields: vec!["name"] }).unwrap();
        assert_eq!(json, serde_json::json!({"status": "updated", "fields": ["name"]}));
    }
}
