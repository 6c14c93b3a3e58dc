use crate::models::ActiveSessionSnapshot;
use serde::Serialize;

/// Progress banner for the active session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressBanner {
    pub workout_name: String,
    pub completed_sets: u32,
    pub total_sets: u32,
    pub percent: u8,
    pub elapsed_minutes: u32,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotIssue {
    CompletedExceedsTotal { completed: u32, total: u32 },
    ExerciseSumMismatch { completed: u32, exercise_sum: u32 },
}

pub fn calculate_progress(snapshot: &ActiveSessionSnapshot) -> ProgressBanner {
    let completed_sets = snapshot.completed_sets.min(snapshot.total_sets);
    let percent = if snapshot.total_sets == 0 {
        0
    } else {
        (u64::from(completed_sets) * 100 / u64::from(snapshot.total_sets)) as u8
    };

    ProgressBanner {
        workout_name: snapshot.workout_name.clone(),
        completed_sets,
        total_sets: snapshot.total_sets,
        percent,
        elapsed_minutes: snapshot.elapsed_minutes,
        label: format!("{completed_sets}/{} sets", snapshot.total_sets),
    }
}

/// Checks the snapshot counters against each other. Problems are logged and
/// returned; the snapshot is still used as-is.
pub fn validate_snapshot(snapshot: &ActiveSessionSnapshot) -> Vec<SnapshotIssue> {
    let mut issues = Vec::new();

    if snapshot.completed_sets > snapshot.total_sets {
        issues.push(SnapshotIssue::CompletedExceedsTotal {
            completed: snapshot.completed_sets,
            total: snapshot.total_sets,
        });
    }

    if !snapshot.exercises.is_empty() {
        let exercise_sum = snapshot
            .exercises
            .iter()
            .fold(0u32, |sum, exercise| sum.saturating_add(exercise.completed_sets));
        if exercise_sum != snapshot.completed_sets {
            issues.push(SnapshotIssue::ExerciseSumMismatch {
                completed: snapshot.completed_sets,
                exercise_sum,
            });
        }
    }

    for issue in &issues {
        tracing::error!(session_id = %snapshot.session_id, ?issue, "Inconsistent session snapshot");
    }
    issues
}
