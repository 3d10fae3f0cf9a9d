//! Typed view of the plan tool's arguments.

use serde::{Deserialize, Serialize};

/// Step status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepStatus {
    /// Not started.
    #[default]
    Pending,
    /// Being worked on.
    InProgress,
    /// Finished.
    Done,
}

/// One actionable step of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Unique step id.
    pub id: String,

    /// Step title.
    pub title: String,

    /// Longer description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Step status.
    #[serde(default)]
    pub status: StepStatus,
}

/// A plan as produced by the plan tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// Plan title.
    pub title: String,

    /// Ordered steps.
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Plan {
    /// Returns the step with the given id.
    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Number of steps marked done.
    pub fn completed(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Done)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_kebab_case() {
        assert_eq!(
            serde_json::to_value(StepStatus::InProgress).unwrap(),
            json!("in-progress")
        );
        let status: StepStatus = serde_json::from_value(json!("done")).unwrap();
        assert_eq!(status, StepStatus::Done);
    }

    #[test]
    fn test_status_defaults_to_pending() {
        let step: Step = serde_json::from_value(json!({"id": "1", "title": "File motion"})).unwrap();

        assert_eq!(step.status, StepStatus::Pending);
        assert!(step.description.is_none());
    }

    #[test]
    fn test_plan_helpers() {
        let plan: Plan = serde_json::from_value(json!({
            "title": "Launch",
            "steps": [
                {"id": "a", "title": "Draft", "status": "done"},
                {"id": "b", "title": "Review", "status": "in-progress"},
                {"id": "c", "title": "Ship", "status": "pending"}
            ]
        }))
        .unwrap();

        assert_eq!(plan.completed(), 1);
        assert_eq!(plan.step("b").map(|s| s.title.as_str()), Some("Review"));
        assert!(plan.step("z").is_none());
    }

    #[test]
    fn test_unknown_status_rejected() {
        let result: Result<Step, _> =
            serde_json::from_value(json!({"id": "1", "title": "x", "status": "blocked"}));
        assert!(result.is_err());
    }
}
