use crate::models::ActiveSessionSnapshot;

/// Server-side view of the session held for the running process.
#[derive(Debug, Default)]
pub struct RuntimeState {
    session_id: Option<String>,
    snapshot: Option<ActiveSessionSnapshot>,
}

impl RuntimeState {
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn snapshot(&self) -> Option<&ActiveSessionSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn set_session_id(&mut self, session_id: String) {
        self.session_id = Some(session_id);
    }

    pub fn set_snapshot(&mut self, snapshot: ActiveSessionSnapshot) {
        self.session_id = Some(snapshot.session_id.clone());
        self.snapshot = Some(snapshot);
    }

    pub fn clear(&mut self) {
        self.session_id = None;
        self.snapshot = None;
    }

    /// Applies a server-confirmed set to the held snapshot.
    pub fn record_completed_set(&mut self, exercise_ref: &str, completed_sets: u32) {
        let Some(snapshot) = self.snapshot.as_mut() else {
            return;
        };
        let Some(exercise) = snapshot.exercise_mut(exercise_ref) else {
            return;
        };
        let previous = exercise.completed_sets;
        exercise.completed_sets = completed_sets.max(previous);
        let added = exercise.completed_sets - previous;
        snapshot.completed_sets = snapshot.completed_sets.saturating_add(added);
    }
}
