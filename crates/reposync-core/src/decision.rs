//! Reconciliation Decision Engine
//!
//! A pure function from an [`Inspection`] and a [`Policy`] to a
//! [`PlannedAction`]. The rules are evaluated top to bottom and the first
//! match wins:
//!
//! | Condition                          | Action                                  |
//! |------------------------------------|-----------------------------------------|
//! | precondition failed                | `Skip(<precondition>)`                  |
//! | dirty tree                         | `FetchOnly`                             |
//! | branch not on remote               | `PushNewBranch` or `Skip(NoRemoteBranch)` |
//! | local == remote                    | `ReportUpToDate`                        |
//! | merge base == local                | `PullFastForward`                       |
//! | merge base == remote               | `PushExisting` or `ReportAhead`         |
//! | anything else                      | `ReportDiverged`                        |
//!
//! In dry-run mode mutating actions are wrapped in `ReportDryRun`.

use crate::config::Policy;
use crate::model::{Inspection, PlannedAction, SkipReason};

/// Classify one repository.
pub fn decide(inspection: &Inspection, policy: &Policy) -> PlannedAction {
    let action = classify(inspection, policy);
    if policy.dry_run && action.is_mutating() {
        PlannedAction::ReportDryRun(Box::new(action))
    } else {
        action
    }
}

fn classify(inspection: &Inspection, policy: &Policy) -> PlannedAction {
    if let Some(precondition) = inspection.failed {
        return PlannedAction::Skip(SkipReason::Precondition(precondition));
    }

    let state = &inspection.state;
    if state.is_dirty {
        return PlannedAction::FetchOnly;
    }

    let branch = state.current_branch.clone().unwrap_or_default();

    let (Some(local), Some(remote)) = (&state.local_ref, &state.remote_ref) else {
        return if policy.push_allowed() {
            PlannedAction::PushNewBranch(branch)
        } else {
            PlannedAction::Skip(SkipReason::NoRemoteBranch)
        };
    };

    if local == remote {
        return PlannedAction::ReportUpToDate;
    }

    match &state.merge_base_ref {
        Some(base) if base == local => PlannedAction::PullFastForward(branch),
        Some(base) if base == remote => {
            if policy.push_allowed() {
                PlannedAction::PushExisting(branch)
            } else {
                PlannedAction::ReportAhead
            }
        }
        // Unrelated histories have no merge base at all
        _ => PlannedAction::ReportDiverged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Precondition, RepositoryState};
    use reposync_git::CommitId;

    fn ready(local: &str, remote: &str, base: &str) -> Inspection {
        Inspection::ready(RepositoryState {
            has_path: true,
            has_vcs_dir: true,
            has_remote: true,
            current_branch: Some("main".into()),
            remote_branch_exists: true,
            local_ref: Some(CommitId::new(local)),
            remote_ref: Some(CommitId::new(remote)),
            merge_base_ref: Some(CommitId::new(base)),
            ..RepositoryState::default()
        })
    }

    #[test]
    fn precondition_wins_over_everything() {
        let mut inspection = ready("aaa", "bbb", "aaa");
        inspection.failed = Some(Precondition::Detached);
        inspection.state.is_dirty = true;

        assert_eq!(
            decide(&inspection, &Policy::default()),
            PlannedAction::Skip(SkipReason::Precondition(Precondition::Detached))
        );
    }

    #[test]
    fn missing_merge_base_is_divergence() {
        let mut inspection = ready("aaa", "bbb", "aaa");
        inspection.state.merge_base_ref = None;

        assert_eq!(
            decide(&inspection, &Policy::default()),
            PlannedAction::ReportDiverged
        );
    }

    #[test]
    fn dry_run_leaves_non_mutating_actions_alone() {
        let policy = Policy {
            dry_run: true,
            ..Policy::default()
        };
        assert_eq!(
            decide(&ready("aaa", "aaa", "aaa"), &policy),
            PlannedAction::ReportUpToDate
        );
    }
}
