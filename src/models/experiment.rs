use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experiment {
    pub id: String,
    pub app_user_id: String,
    pub experiment_id: String,
    pub variant: String,
    pub offering_id: Option<String>,
    pub enrolled_at_ms: i64,
    pub updated_at: i64,
}

impl Experiment {
    /// Stale enrollments never overwrite: only a different variant or a
    /// strictly newer enrollment time replaces the stored row.
    pub fn should_replace(&self, variant: &str, enrolled_at_ms: Option<i64>) -> bool {
        self.variant != variant || enrolled_at_ms.is_some_and(|t| t > self.enrolled_at_ms)
    }
}

/// An enrollment as carried by an event.
#[derive(Debug, Clone)]
pub struct EnrollExperiment {
    pub experiment_id: String,
    pub variant: String,
    pub offering_id: Option<String>,
    pub enrolled_at_ms: Option<i64>,
}
