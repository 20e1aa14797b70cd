//! Core types used throughout the brandscope library.
//!
//! This module defines the analysis subject, the job and unit status
//! enums that make up the progress state machine, and the output an
//! analyzer unit produces on success.

use crate::core::error::JobError;

use serde::{Deserialize, Serialize};
use std::fmt;

/// The URL or brand under analysis.
///
/// Subjects are trimmed and must be non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Subject(String);

impl Subject {
    /// Creates a new subject, rejecting blank input.
    pub fn new(value: impl Into<String>) -> Result<Self, JobError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(JobError::InvalidSubject {
                reason: "subject must not be empty".to_string(),
            });
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(JobError::InvalidSubject {
                reason: format!("subject '{trimmed}' contains whitespace"),
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the subject as given.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the subject as an absolute URL, defaulting to `https://`.
    pub fn url(&self) -> String {
        if self.0.starts_with("http://") || self.0.starts_with("https://") {
            self.0.clone()
        } else {
            format!("https://{}", self.0)
        }
    }

    /// Returns the host portion of the subject's URL.
    pub fn host(&self) -> &str {
        let without_scheme = self
            .0
            .strip_prefix("https://")
            .or_else(|| self.0.strip_prefix("http://"))
            .unwrap_or(&self.0);
        without_scheme
            .split(['/', '?', '#'])
            .next()
            .unwrap_or(without_scheme)
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle status of an analysis job.
///
/// Status only moves forward: `Pending -> Processing -> {Completed, Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created, no unit started yet.
    Pending,
    /// At least one unit has started.
    Processing,
    /// Enough units succeeded to produce a report.
    Completed,
    /// The job could not produce a report.
    Failed,
}

impl JobStatus {
    /// Returns `true` for `Completed` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns `true` if moving from `self` to `next` is a forward transition.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Pending, Self::Failed)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Progress of a single analyzer unit within a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    /// Not launched yet.
    NotStarted,
    /// Launched and not yet reported.
    Running,
    /// Reported a result.
    Succeeded,
    /// Reported a failure, timed out, or was aborted.
    Failed,
}

impl UnitStatus {
    /// Returns `true` for `Succeeded` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not_started"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// The structured output of a successful analyzer unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitOutput {
    /// Facet score on a 0-100 scale, if the unit scores its facet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,

    /// Unit-specific payload.
    #[serde(default)]
    pub data: serde_json::Value,
}

impl UnitOutput {
    /// Creates an unscored output carrying the given data.
    pub fn new(data: serde_json::Value) -> Self {
        Self { score: None, data }
    }

    /// Creates a scored output with no data.
    pub fn scored(score: f64) -> Self {
        Self {
            score: Some(score),
            data: serde_json::Value::Null,
        }
    }

    /// Sets the score.
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    /// Sets the data payload.
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_validation() {
        assert!(Subject::new("").is_err());
        assert!(Subject::new("   ").is_err());
        assert!(Subject::new("acme .com").is_err());

        let subject = Subject::new("  acme.com ").unwrap();
        assert_eq!(subject.as_str(), "acme.com");
        assert_eq!(subject.url(), "https://acme.com");
    }

    #[test]
    fn test_subject_host() {
        let subject = Subject::new("http://acme.com/about?x=1").unwrap();
        assert_eq!(subject.host(), "acme.com");
        assert_eq!(subject.url(), "http://acme.com/about?x=1");

        assert_eq!(Subject::new("acme.com").unwrap().host(), "acme.com");
    }

    #[test]
    fn test_job_status_transitions() {
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Processing));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Completed));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Failed));
        assert!(!JobStatus::Processing.can_transition_to(JobStatus::Pending));
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Failed));
        assert!(!JobStatus::Failed.can_transition_to(JobStatus::Processing));
    }

    #[test]
    fn test_unit_status_terminal() {
        assert!(!UnitStatus::NotStarted.is_terminal());
        assert!(!UnitStatus::Running.is_terminal());
        assert!(UnitStatus::Succeeded.is_terminal());
        assert!(UnitStatus::Failed.is_terminal());
    }

    #[test]
    fn test_unit_output_serialization() {
        let output = UnitOutput::scored(72.5).with_data(serde_json::json!({"da": 41}));
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["score"], 72.5);
        assert_eq!(json["data"]["da"], 41);
    }
}
