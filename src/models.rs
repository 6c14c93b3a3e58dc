use serde::{Deserialize, Serialize};

/// Server-owned record of the user's in-progress session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSessionSnapshot {
    pub session_id: String,
    pub workout_id: String,
    pub workout_name: String,
    pub completed_sets: u32,
    pub total_sets: u32,
    pub elapsed_minutes: u32,
    #[serde(default)]
    pub exercises: Vec<ExerciseProgress>,
}

impl ActiveSessionSnapshot {
    pub fn exercise(&self, exercise_ref: &str) -> Option<&ExerciseProgress> {
        self.exercises
            .iter()
            .find(|exercise| exercise.exercise_ref == exercise_ref)
    }

    pub fn exercise_mut(&mut self, exercise_ref: &str) -> Option<&mut ExerciseProgress> {
        self.exercises
            .iter_mut()
            .find(|exercise| exercise.exercise_ref == exercise_ref)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseProgress {
    pub exercise_ref: String,
    pub name: String,
    pub sets: u32,
    pub reps: u32,
    pub weight: f64,
    pub rest_time_seconds: u32,
    #[serde(default)]
    pub completed_sets: u32,
}

/// Body of a set submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSet {
    pub exercise_ref: String,
    pub set_number: u32,
    pub reps: u32,
    pub weight: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rest_seconds: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedSession {
    pub session_id: String,
}

/// One past session's sets for a single exercise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseHistoryEntry {
    pub date: String,
    #[serde(default)]
    pub sets: Vec<HistorySet>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySet {
    pub set: u32,
    pub reps: u32,
    pub weight: f64,
}
