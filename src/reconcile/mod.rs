//! Reconciliation of CSV records against the remote directory
//!
//! Departments are processed in dependency order, then users in file
//! order. Each entity is looked up before anything is written, which is
//! what makes repeated runs converge to "unchanged".

pub mod plan;
pub mod report;

use std::collections::{HashMap, HashSet};

use thiserror::Error;
use tracing::{error, info, warn};

use crate::api::{ApiError, Directory};
use crate::models::{Department, NewDepartment, NewUser, RemoteDepartment, RemoteUser, User};
pub use plan::RemoteRef;
pub use report::{Counts, EntityReport, Entry, Outcome, RunReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Apply,
    /// Perform lookups and decisions, but no creates or updates
    DryRun,
}

/// Remote location of each department reconciled so far.
///
/// `None` marks a department that failed or was skipped; its dependents
/// are skipped in turn.
type DepartmentIds = HashMap<String, Option<RemoteRef>>;

#[derive(Debug, Error)]
enum StepError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("internal ordering error: {0}")]
    Invariant(String),
}

impl StepError {
    fn planned_in_apply(what: &str) -> Self {
        StepError::Invariant(format!("{what} has no remote id outside dry-run"))
    }
}

/// Drives one reconciliation run against a [`Directory`].
pub struct Reconciler<D> {
    directory: D,
    mode: RunMode,
    root_department_id: u64,
    /// Remote departments matched, adopted or created so far in this run.
    /// Keeps two same-named rows from adopting one department in dry-run,
    /// where nothing is written back to the directory.
    claimed: HashSet<u64>,
}

impl<D: Directory> Reconciler<D> {
    /// `root_department_id` becomes the parent of top-level departments.
    pub fn new(directory: D, mode: RunMode, root_department_id: u64) -> Self {
        Self {
            directory,
            mode,
            root_department_id,
            claimed: HashSet::new(),
        }
    }

    #[cfg(test)]
    fn directory(&self) -> &D {
        &self.directory
    }

    #[cfg(test)]
    fn into_directory(self) -> D {
        self.directory
    }

    fn dry_run(&self) -> bool {
        self.mode == RunMode::DryRun
    }

    /// Reconcile `departments` (already in parent-first order), then `users`.
    ///
    /// Never fails as a whole: every entity's outcome lands in the report.
    pub async fn run(&mut self, departments: &[&Department], users: &[User]) -> RunReport {
        let mut report = RunReport::new(self.dry_run());
        let mut ids = DepartmentIds::with_capacity(departments.len());
        self.claimed.clear();

        info!(count = departments.len(), dry_run = self.dry_run(), "Reconciling departments");
        for department in departments {
            let outcome = self.reconcile_department(department, &mut ids).await;
            report.departments.record(&department.external_id, outcome);
        }

        info!(count = users.len(), dry_run = self.dry_run(), "Reconciling users");
        for user in users {
            let outcome = self.reconcile_user(user, &ids).await;
            report.users.record(&user.nickname, outcome);
        }

        report.finish();
        report
    }

    async fn reconcile_department(&mut self, department: &Department, ids: &mut DepartmentIds) -> Outcome {
        let key = department.external_id.clone();

        let parent = match department.parent_external_id.as_deref() {
            None => RemoteRef::Id(self.root_department_id),
            Some(parent) => match ids.get(parent) {
                Some(Some(remote)) => *remote,
                Some(None) => {
                    warn!(department = %key, parent, "Skipping department, parent unavailable");
                    ids.insert(key, None);
                    return Outcome::Skipped {
                        dependency: parent.to_string(),
                    };
                }
                None => {
                    error!(department = %key, parent, "Parent was not reconciled before child");
                    ids.insert(key, None);
                    return Outcome::Failed {
                        error: StepError::Invariant(format!(
                            "parent '{parent}' was not processed before '{}'",
                            department.external_id
                        ))
                        .to_string(),
                    };
                }
            },
        };

        match self.sync_department(department, parent).await {
            Ok((remote, outcome)) => {
                ids.insert(key, Some(remote));
                outcome
            }
            Err(e) => {
                warn!(department = %key, error = %e, "Department failed");
                ids.insert(key, None);
                Outcome::Failed { error: e.to_string() }
            }
        }
    }

    async fn sync_department(
        &mut self,
        department: &Department,
        parent: RemoteRef,
    ) -> Result<(RemoteRef, Outcome), StepError> {
        if let Some(remote) = self.directory.find_department(&department.external_id).await? {
            return self.update_department(department, parent, remote, false).await;
        }

        // A same-named department that was never tagged is taken over
        // instead of creating a twin next to it.
        let unclaimed = self
            .directory
            .find_unclaimed_departments(&department.name)
            .await?
            .into_iter()
            .find(|d| !self.claimed.contains(&d.id));
        if let Some(remote) = unclaimed {
            info!(
                department = %department.external_id,
                id = remote.id,
                "Adopting existing department without external id"
            );
            return self.update_department(department, parent, remote, true).await;
        }

        if self.dry_run() {
            info!(department = %department.external_id, "[dry-run] would create department");
            return Ok((RemoteRef::Planned, Outcome::Created { remote_id: None }));
        }

        let RemoteRef::Id(parent_id) = parent else {
            return Err(StepError::planned_in_apply("parent department"));
        };
        let new = NewDepartment {
            name: department.name.clone(),
            parent_id,
            external_id: department.external_id.clone(),
            label: department.label.clone(),
            description: department.description.clone(),
        };

        match self.directory.create_department(&new).await {
            Ok(created) => {
                info!(department = %department.external_id, id = created.id, "Created department");
                self.claimed.insert(created.id);
                Ok((
                    RemoteRef::Id(created.id),
                    Outcome::Created {
                        remote_id: Some(created.id.to_string()),
                    },
                ))
            }
            Err(e) if e.is_conflict() => {
                warn!(department = %department.external_id, "Create conflicted, re-reading directory");
                self.directory.invalidate();
                match self.directory.find_department(&department.external_id).await? {
                    Some(remote) => self.update_department(department, parent, remote, false).await,
                    None => Err(e.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update_department(
        &mut self,
        department: &Department,
        parent: RemoteRef,
        remote: RemoteDepartment,
        adopt: bool,
    ) -> Result<(RemoteRef, Outcome), StepError> {
        let mut changes = plan::department_changes(department, parent, &remote);
        if adopt {
            changes.patch.external_id = Some(department.external_id.clone());
            changes.fields.insert(0, "external_id");
        }

        self.claimed.insert(remote.id);
        let found = RemoteRef::Id(remote.id);
        if changes.is_empty() {
            info!(department = %department.external_id, id = remote.id, "Department unchanged");
            return Ok((found, Outcome::Unchanged));
        }

        if self.dry_run() {
            info!(
                department = %department.external_id,
                fields = ?changes.fields,
                "[dry-run] would update department"
            );
        } else {
            if parent == RemoteRef::Planned {
                return Err(StepError::planned_in_apply("parent department"));
            }
            self.directory.update_department(remote.id, &changes.patch).await?;
            info!(
                department = %department.external_id,
                fields = ?changes.fields,
                "Updated department"
            );
        }
        Ok((found, Outcome::Updated { fields: changes.fields }))
    }

    async fn reconcile_user(&mut self, user: &User, ids: &DepartmentIds) -> Outcome {
        let Some(Some(department)) = ids.get(&user.dept_external_id) else {
            warn!(
                user = %user.nickname,
                department = %user.dept_external_id,
                "Skipping user, department unavailable"
            );
            return Outcome::Skipped {
                dependency: user.dept_external_id.clone(),
            };
        };

        match self.sync_user(user, *department).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(user = %user.nickname, error = %e, "User failed");
                Outcome::Failed { error: e.to_string() }
            }
        }
    }

    async fn sync_user(&mut self, user: &User, department: RemoteRef) -> Result<Outcome, StepError> {
        if let Some(remote) = self.directory.find_user(&user.nickname).await? {
            return self.update_user(user, department, remote).await;
        }

        if self.dry_run() {
            info!(user = %user.nickname, "[dry-run] would create user");
            return Ok(Outcome::Created { remote_id: None });
        }

        let RemoteRef::Id(department_id) = department else {
            return Err(StepError::planned_in_apply("user department"));
        };

        match self.directory.create_user(&NewUser::from_user(user, department_id)).await {
            Ok(created) => {
                info!(user = %user.nickname, id = %created.id, "Created user");
                Ok(Outcome::Created {
                    remote_id: Some(created.id),
                })
            }
            Err(e) if e.is_conflict() => {
                warn!(user = %user.nickname, "Create conflicted, re-reading directory");
                self.directory.invalidate();
                match self.directory.find_user(&user.nickname).await? {
                    Some(remote) => self.update_user(user, department, remote).await,
                    None => Err(e.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update_user(
        &mut self,
        user: &User,
        department: RemoteRef,
        remote: RemoteUser,
    ) -> Result<Outcome, StepError> {
        let changes = plan::user_changes(user, department, &remote);
        if changes.is_empty() {
            info!(user = %user.nickname, id = %remote.id, "User unchanged");
            return Ok(Outcome::Unchanged);
        }

        if self.dry_run() {
            info!(user = %user.nickname, fields = ?changes.fields, "[dry-run] would update user");
        } else {
            if department == RemoteRef::Planned {
                return Err(StepError::planned_in_apply("user department"));
            }
            self.directory.update_user(&remote.id, &changes.patch).await?;
            info!(user = %user.nickname, fields = ?changes.fields, "Updated user");
        }
        Ok(Outcome::Updated { fields: changes.fields })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiResult;
    use crate::models::{DepartmentPatch, UserName, UserPatch};
    use std::collections::HashSet;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        CreateDepartment(String, u64),
        UpdateDepartment(u64, DepartmentPatch),
        CreateUser(String, u64),
        UpdateUser(String, UserPatch),
    }

    /// In-memory directory recording every mutation.
    #[derive(Default)]
    struct FakeDirectory {
        departments: Vec<RemoteDepartment>,
        users: Vec<RemoteUser>,
        next_id: u64,
        calls: Vec<Call>,
        /// Department creates that fail with a server error
        failing: HashSet<String>,
        /// Department creates that lose a race: the department appears, then 409
        racing: HashSet<String>,
        invalidations: usize,
    }

    impl FakeDirectory {
        fn new() -> Self {
            Self {
                next_id: 100,
                ..Default::default()
            }
        }

        fn with_department(mut self, id: u64, name: &str, parent_id: u64, external_id: Option<&str>) -> Self {
            self.departments.push(RemoteDepartment {
                id,
                name: name.to_string(),
                parent_id: Some(parent_id),
                external_id: external_id.map(str::to_string),
                label: None,
                description: None,
            });
            self
        }

        fn allocate(&mut self) -> u64 {
            self.next_id += 1;
            self.next_id
        }

        fn department(&self, external_id: &str) -> Option<&RemoteDepartment> {
            self.departments
                .iter()
                .find(|d| d.external_id() == Some(external_id))
        }
    }

    impl Directory for FakeDirectory {
        async fn find_department(&mut self, external_id: &str) -> ApiResult<Option<RemoteDepartment>> {
            Ok(self.department(external_id).cloned())
        }

        async fn find_unclaimed_departments(&mut self, name: &str) -> ApiResult<Vec<RemoteDepartment>> {
            Ok(self
                .departments
                .iter()
                .filter(|d| d.external_id().is_none() && d.name == name)
                .cloned()
                .collect())
        }

        async fn create_department(&mut self, department: &NewDepartment) -> ApiResult<RemoteDepartment> {
            if self.failing.contains(&department.external_id) {
                return Err(ApiError::Server {
                    status: 500,
                    body: "internal".to_string(),
                });
            }
            let id = self.allocate();
            let created = RemoteDepartment {
                id,
                name: department.name.clone(),
                parent_id: Some(department.parent_id),
                external_id: Some(department.external_id.clone()),
                label: department.label.clone(),
                description: department.description.clone(),
            };
            if self.racing.contains(&department.external_id) {
                self.departments.push(RemoteDepartment {
                    name: format!("{} (other)", department.name),
                    ..created
                });
                return Err(ApiError::Conflict("department exists".to_string()));
            }
            self.calls
                .push(Call::CreateDepartment(department.external_id.clone(), department.parent_id));
            self.departments.push(created.clone());
            Ok(created)
        }

        async fn update_department(&mut self, id: u64, patch: &DepartmentPatch) -> ApiResult<()> {
            self.calls.push(Call::UpdateDepartment(id, patch.clone()));
            match self.departments.iter_mut().find(|d| d.id == id) {
                Some(department) => {
                    department.apply(patch);
                    Ok(())
                }
                None => Err(ApiError::NotFound(format!("department {id}"))),
            }
        }

        async fn find_user(&mut self, nickname: &str) -> ApiResult<Option<RemoteUser>> {
            Ok(self.users.iter().find(|u| u.nickname == nickname).cloned())
        }

        async fn create_user(&mut self, user: &NewUser) -> ApiResult<RemoteUser> {
            self.calls
                .push(Call::CreateUser(user.nickname.clone(), user.department_id));
            let created = RemoteUser {
                id: self.allocate().to_string(),
                nickname: user.nickname.clone(),
                department_id: Some(user.department_id),
                name: user.name.clone(),
                position: Some(user.position.clone()),
                language: Some(user.language.clone()),
                timezone: Some(user.timezone.clone()),
                external_id: user.external_id.clone(),
            };
            self.users.push(created.clone());
            Ok(created)
        }

        async fn update_user(&mut self, id: &str, patch: &UserPatch) -> ApiResult<()> {
            self.calls.push(Call::UpdateUser(id.to_string(), patch.clone()));
            match self.users.iter_mut().find(|u| u.id == id) {
                Some(user) => {
                    user.apply(patch);
                    Ok(())
                }
                None => Err(ApiError::NotFound(format!("user {id}"))),
            }
        }

        fn invalidate(&mut self) {
            self.invalidations += 1;
        }
    }

    fn department(external_id: &str, name: &str, parent: Option<&str>) -> Department {
        Department {
            external_id: external_id.to_string(),
            name: name.to_string(),
            parent_external_id: parent.map(str::to_string),
            label: None,
            description: None,
        }
    }

    fn user(nickname: &str, dept: &str) -> User {
        User {
            nickname: nickname.to_string(),
            first: "Ivan".to_string(),
            last: "Ivanov".to_string(),
            middle: None,
            position: Some("Engineer".to_string()),
            dept_external_id: dept.to_string(),
            language: "ru".to_string(),
            timezone: "Europe/Moscow".to_string(),
            password: Some("changeme".to_string()),
            password_change_required: true,
            external_id: None,
        }
    }

    fn tree() -> Vec<Department> {
        vec![
            department("root", "Root", None),
            department("eng", "Engineering", Some("root")),
        ]
    }

    #[tokio::test]
    async fn test_creates_parents_before_children() {
        let departments = tree();
        let ordered: Vec<&Department> = departments.iter().collect();
        let users = vec![user("ivanov", "eng")];

        let mut reconciler = Reconciler::new(FakeDirectory::new(), RunMode::Apply, 1);
        let report = reconciler.run(&ordered, &users).await;

        assert_eq!(report.departments.counts.created, 2);
        assert_eq!(report.users.counts.created, 1);
        assert!(!report.has_problems());
        assert_eq!(
            reconciler.directory().calls,
            vec![
                Call::CreateDepartment("root".to_string(), 1),
                Call::CreateDepartment("eng".to_string(), 101),
                Call::CreateUser("ivanov".to_string(), 102),
            ]
        );
        assert_eq!(
            report.departments.outcome("root"),
            Some(&Outcome::Created {
                remote_id: Some("101".to_string())
            })
        );
    }

    #[tokio::test]
    async fn test_renamed_department_gets_name_only_patch() {
        let departments = vec![department("root", "Root", None)];
        let ordered: Vec<&Department> = departments.iter().collect();
        let directory = FakeDirectory::new().with_department(10, "Old Root", 1, Some("root"));

        let mut reconciler = Reconciler::new(directory, RunMode::Apply, 1);
        let report = reconciler.run(&ordered, &[]).await;

        assert_eq!(
            report.departments.outcome("root"),
            Some(&Outcome::Updated { fields: vec!["name"] })
        );
        assert_eq!(
            reconciler.directory().calls,
            vec![Call::UpdateDepartment(
                10,
                DepartmentPatch {
                    name: Some("Root".to_string()),
                    ..Default::default()
                }
            )]
        );
    }

    #[tokio::test]
    async fn test_second_run_is_unchanged() {
        let departments = tree();
        let ordered: Vec<&Department> = departments.iter().collect();
        let users = vec![user("ivanov", "eng")];

        let mut first = Reconciler::new(FakeDirectory::new(), RunMode::Apply, 1);
        first.run(&ordered, &users).await;
        let mut directory = first.into_directory();
        directory.calls.clear();

        let mut second = Reconciler::new(directory, RunMode::Apply, 1);
        let report = second.run(&ordered, &users).await;

        assert_eq!(report.departments.counts.unchanged, 2);
        assert_eq!(report.users.counts.unchanged, 1);
        assert_eq!(report.changes(), 0);
        assert!(second.directory().calls.is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_reports_without_mutating() {
        let departments = tree();
        let ordered: Vec<&Department> = departments.iter().collect();
        let mut renamed = user("petrov", "root");
        renamed.last = "Petrov".to_string();
        let users = vec![user("ivanov", "eng"), renamed];

        let mut directory = FakeDirectory::new().with_department(10, "Root", 1, Some("root"));
        directory.users.push(RemoteUser {
            id: "55".to_string(),
            nickname: "petrov".to_string(),
            department_id: Some(10),
            name: UserName {
                first: "Ivan".to_string(),
                last: "Petrova".to_string(),
                middle: String::new(),
            },
            position: Some("Engineer".to_string()),
            language: Some("ru".to_string()),
            timezone: Some("Europe/Moscow".to_string()),
            external_id: None,
        });

        let mut reconciler = Reconciler::new(directory, RunMode::DryRun, 1);
        let report = reconciler.run(&ordered, &users).await;

        assert!(report.dry_run);
        assert_eq!(report.departments.outcome("root"), Some(&Outcome::Unchanged));
        assert_eq!(
            report.departments.outcome("eng"),
            Some(&Outcome::Created { remote_id: None })
        );
        // The user under a planned department is still reported as a create.
        assert_eq!(
            report.users.outcome("ivanov"),
            Some(&Outcome::Created { remote_id: None })
        );
        assert_eq!(
            report.users.outcome("petrov"),
            Some(&Outcome::Updated { fields: vec!["last"] })
        );
        assert!(reconciler.directory().calls.is_empty());
    }

    #[tokio::test]
    async fn test_failed_department_skips_dependents() {
        let mut departments = tree();
        departments.push(department("qa", "QA", Some("eng")));
        let ordered: Vec<&Department> = departments.iter().collect();
        let users = vec![user("ivanov", "eng"), user("petrov", "root")];

        let mut directory = FakeDirectory::new();
        directory.failing.insert("eng".to_string());

        let mut reconciler = Reconciler::new(directory, RunMode::Apply, 1);
        let report = reconciler.run(&ordered, &users).await;

        assert!(matches!(
            report.departments.outcome("eng"),
            Some(Outcome::Failed { .. })
        ));
        assert_eq!(
            report.departments.outcome("qa"),
            Some(&Outcome::Skipped {
                dependency: "eng".to_string()
            })
        );
        assert_eq!(
            report.users.outcome("ivanov"),
            Some(&Outcome::Skipped {
                dependency: "eng".to_string()
            })
        );
        assert!(matches!(
            report.users.outcome("petrov"),
            Some(Outcome::Created { .. })
        ));
        assert!(report.has_problems());
    }

    #[tokio::test]
    async fn test_adopts_unclaimed_department_by_name() {
        let departments = vec![department("root", "Root", None)];
        let ordered: Vec<&Department> = departments.iter().collect();
        let directory = FakeDirectory::new().with_department(10, "Root", 1, None);

        let mut reconciler = Reconciler::new(directory, RunMode::Apply, 1);
        let report = reconciler.run(&ordered, &[]).await;

        assert_eq!(
            report.departments.outcome("root"),
            Some(&Outcome::Updated {
                fields: vec!["external_id"]
            })
        );
        assert_eq!(reconciler.directory().department("root").map(|d| d.id), Some(10));
        assert_eq!(reconciler.directory().departments.len(), 1);
    }

    #[tokio::test]
    async fn test_conflict_on_create_falls_back_to_update() {
        let departments = vec![department("root", "Root", None)];
        let ordered: Vec<&Department> = departments.iter().collect();
        let mut directory = FakeDirectory::new();
        directory.racing.insert("root".to_string());

        let mut reconciler = Reconciler::new(directory, RunMode::Apply, 1);
        let report = reconciler.run(&ordered, &[]).await;

        assert_eq!(
            report.departments.outcome("root"),
            Some(&Outcome::Updated { fields: vec!["name"] })
        );
        let directory = reconciler.into_directory();
        assert_eq!(directory.invalidations, 1);
        assert_eq!(directory.department("root").map(|d| d.name.as_str()), Some("Root"));
    }

    fn decision(outcome: &Outcome) -> String {
        match outcome {
            Outcome::Created { .. } => "created".to_string(),
            Outcome::Updated { fields } => format!("updated {fields:?}"),
            Outcome::Unchanged => "unchanged".to_string(),
            Outcome::Failed { .. } => "failed".to_string(),
            Outcome::Skipped { dependency } => format!("skipped {dependency}"),
        }
    }

    fn decisions(report: &EntityReport) -> Vec<(String, String)> {
        report
            .entries
            .iter()
            .map(|e| (e.key.clone(), decision(&e.outcome)))
            .collect()
    }

    #[tokio::test]
    async fn test_dry_run_matches_apply_for_same_named_departments() {
        let departments = vec![
            department("a", "A", None),
            department("sales1", "Sales", Some("a")),
            department("sales2", "Sales", Some("a")),
        ];
        let ordered: Vec<&Department> = departments.iter().collect();
        let users = vec![user("ivanov", "sales1"), user("petrov", "sales2")];
        let fake = || FakeDirectory::new().with_department(10, "Sales", 1, None);

        let mut dry = Reconciler::new(fake(), RunMode::DryRun, 1);
        let planned = dry.run(&ordered, &users).await;
        let mut apply = Reconciler::new(fake(), RunMode::Apply, 1);
        let applied = apply.run(&ordered, &users).await;

        assert_eq!(decisions(&planned.departments), decisions(&applied.departments));
        assert_eq!(decisions(&planned.users), decisions(&applied.users));
        assert_eq!(planned.departments.counts, applied.departments.counts);
        assert_eq!(
            planned.departments.outcome("sales1"),
            Some(&Outcome::Updated {
                fields: vec!["external_id", "parent"]
            })
        );
        assert_eq!(
            planned.departments.outcome("sales2"),
            Some(&Outcome::Created { remote_id: None })
        );
        assert!(dry.directory().calls.is_empty());
        assert_eq!(
            apply.directory().department("sales2").map(|d| d.parent_id),
            Some(Some(101))
        );
    }
}
