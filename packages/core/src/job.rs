//! Job domain types for work activated by the engine.

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Job variables as a JSON object.
pub type Variables = serde_json::Map<String, serde_json::Value>;

/// Opaque engine-assigned key addressing a single job.
///
/// Newer gateways send keys as strings, older ones as 64-bit integers.
/// Both forms are accepted and kept as a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct JobKey(pub String);

impl JobKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for JobKey {
    fn from(key: i64) -> Self {
        Self(key.to_string())
    }
}

impl From<&str> for JobKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl<'de> Deserialize<'de> for JobKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawKey {
            Text(String),
            Number(i64),
        }

        Ok(match RawKey::deserialize(deserializer)? {
            RawKey::Text(key) => JobKey(key),
            RawKey::Number(key) => JobKey::from(key),
        })
    }
}

/// A job activated for this worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivatedJob {
    /// Key used to complete or fail the job.
    pub job_key: JobKey,
    /// Task type the job was activated for.
    #[serde(rename = "type")]
    pub job_type: String,
    /// Worker name the engine recorded for the activation.
    #[serde(default)]
    pub worker: String,
    /// Retries left before the engine raises an incident.
    #[serde(default)]
    pub retries: i32,
    /// Activation deadline, epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_definition_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_instance_key: Option<JobKey>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub custom_headers: HashMap<String, String>,
    /// Variables visible to the job.
    #[serde(default)]
    pub variables: Variables,
}

impl ActivatedJob {
    /// Create a job with the given key, type and variables.
    pub fn new(job_key: impl Into<JobKey>, job_type: impl Into<String>, variables: Variables) -> Self {
        Self {
            job_key: job_key.into(),
            job_type: job_type.into(),
            worker: String::new(),
            retries: 3,
            deadline: None,
            process_definition_id: None,
            element_id: None,
            process_instance_key: None,
            custom_headers: HashMap::new(),
            variables,
        }
    }

    /// Set the remaining retries.
    pub fn with_retries(mut self, retries: i32) -> Self {
        self.retries = retries;
        self
    }

    /// Deadline as a timestamp, if the engine sent one.
    pub fn deadline_at(&self) -> Option<DateTime<Utc>> {
        self.deadline
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
    }

    /// Retries to report when failing this job back to the engine.
    pub fn retries_after_failure(&self) -> i32 {
        (self.retries - 1).max(0)
    }
}
