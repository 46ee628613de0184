//! Creation order for the department tree

use std::collections::{HashMap, HashSet};

use crate::error::{DanglingParent, DependencyError};
use crate::models::Department;

/// Order departments so that every parent precedes its children.
///
/// Works in passes: each pass takes, in input order, every department whose
/// parent is absent or already placed. The order is therefore stable with
/// respect to the input, and identical input always yields identical output.
pub fn resolve_order(departments: &[Department]) -> Result<Vec<&Department>, DependencyError> {
    let known: HashSet<&str> = departments.iter().map(|d| d.external_id.as_str()).collect();

    let dangling: Vec<DanglingParent> = departments
        .iter()
        .filter_map(|d| {
            let parent = d.parent_external_id.as_deref()?;
            (!known.contains(parent)).then(|| DanglingParent {
                department: d.external_id.clone(),
                parent: parent.to_string(),
            })
        })
        .collect();
    if !dangling.is_empty() {
        return Err(DependencyError::MissingParents(dangling));
    }

    let mut placed: HashSet<&str> = HashSet::with_capacity(departments.len());
    let mut ordered = Vec::with_capacity(departments.len());
    let mut pending: Vec<&Department> = departments.iter().collect();

    while !pending.is_empty() {
        let (ready, blocked): (Vec<&Department>, Vec<&Department>) =
            pending.into_iter().partition(|d| {
                d.parent_external_id
                    .as_deref()
                    .is_none_or(|parent| placed.contains(parent))
            });
        if ready.is_empty() {
            return Err(cycle_error(&blocked));
        }
        placed.extend(ready.iter().map(|d| d.external_id.as_str()));
        ordered.extend(ready);
        pending = blocked;
    }

    Ok(ordered)
}

/// Split the stuck departments into those on a cycle and those merely below one.
fn cycle_error(stuck: &[&Department]) -> DependencyError {
    let parents: HashMap<&str, &str> = stuck
        .iter()
        .filter_map(|d| Some((d.external_id.as_str(), d.parent_external_id.as_deref()?)))
        .collect();

    let on_cycle = |start: &str| {
        let mut current = start;
        for _ in 0..parents.len() {
            match parents.get(current) {
                Some(&parent) if parent == start => return true,
                Some(&parent) => current = parent,
                None => return false,
            }
        }
        false
    };

    let (members, blocked): (Vec<String>, Vec<String>) = stuck
        .iter()
        .map(|d| d.external_id.clone())
        .partition(|id| on_cycle(id.as_str()));

    DependencyError::Cycle { members, blocked }
}
