use serde::{Deserialize, Serialize};

/// Durable mirror of the session clock, stored under a single key.
///
/// Shape on disk: `{ "isActive": bool, "startTime": epoch-ms, "activeWorkoutId": string }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedClockRecord {
    pub is_active: bool,
    #[serde(default)]
    pub start_time: Option<i64>,
    #[serde(default)]
    pub active_workout_id: Option<String>,
}

impl PersistedClockRecord {
    pub fn active(workout_id: impl Into<String>, start_time: i64) -> Self {
        Self {
            is_active: true,
            start_time: Some(start_time),
            active_workout_id: Some(workout_id.into()),
        }
    }

    /// Returns `(workout_id, start_time)` when all three fields agree on an
    /// active workout.
    pub fn resumable(&self) -> Option<(&str, i64)> {
        if !self.is_active {
            return None;
        }
        let start_time = self.start_time?;
        let workout_id = self.active_workout_id.as_deref()?;
        if workout_id.is_empty() {
            return None;
        }
        Some((workout_id, start_time))
    }
}

#[cfg(test)]
mod tests {
    use super::PersistedClockRecord;

    #[test]
    fn serializes_with_camel_case_keys() {
        let record = PersistedClockRecord::active("workout-7", 1_700_000_000_000);
        let json = serde_json::to_value(&record).expect("serialize");
        assert_eq!(json["isActive"], true);
        assert_eq!(json["startTime"], 1_700_000_000_000_i64);
        assert_eq!(json["activeWorkoutId"], "workout-7");
    }

    #[test]
    fn partial_record_is_not_resumable() {
        let record: PersistedClockRecord =
            serde_json::from_str(r#"{"isActive":true,"startTime":5}"#).expect("parse");
        assert!(record.resumable().is_none());

        let inactive: PersistedClockRecord = serde_json::from_str(
            r#"{"isActive":false,"startTime":5,"activeWorkoutId":"w"}"#,
        )
        .expect("parse");
        assert!(inactive.resumable().is_none());
    }
}
