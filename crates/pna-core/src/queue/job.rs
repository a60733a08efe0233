use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::recorder::InvocationRecord;
use crate::registry::OperationRegistry;
use crate::types::{DeviceClass, JobStatus, ParameterSet};

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// A stored invocation waiting to be run by the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: u64,
    /// `None` until the operator picks a device; such a job fails when run.
    #[serde(default)]
    pub device_class: Option<DeviceClass>,
    #[serde(default)]
    pub operation: String,
    #[serde(default)]
    pub params: ParameterSet,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Blank `ToDo` row, as created by "add job".
    pub fn placeholder(id: u64) -> Self {
        let now = Utc::now();
        Self {
            id,
            device_class: None,
            operation: String::new(),
            params: ParameterSet::new(),
            status: JobStatus::ToDo,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn from_record(id: u64, rec: &InvocationRecord) -> Self {
        Self {
            device_class: Some(rec.device_class),
            operation: rec.operation.clone(),
            params: rec.params.clone(),
            ..Self::placeholder(id)
        }
    }

    /// Case-insensitive match of `needle` (already lowercased) against the
    /// id, device class, operation and status.
    pub fn matches(&self, needle: &str) -> bool {
        if needle.is_empty() {
            return true;
        }
        let device = self.device_class.map(|d| d.as_str()).unwrap_or("");
        [
            self.id.to_string().as_str(),
            device,
            self.operation.to_lowercase().as_str(),
            self.status.as_str(),
        ]
        .iter()
        .any(|field| field.contains(needle))
    }

    /// `device.operation`, or `-` while the job is still blank.
    pub fn label(&self) -> String {
        match self.device_class {
            Some(d) if !self.operation.is_empty() => format!("{d}.{}", self.operation),
            Some(d) => format!("{d}.?"),
            None => "-".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// JobUpdate
// ---------------------------------------------------------------------------

/// Partial edit applied by `PUT /api/jobs/{id}` and `pna job update`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobUpdate {
    #[serde(default)]
    pub device_class: Option<DeviceClass>,
    #[serde(default)]
    pub operation: Option<String>,
    #[serde(default)]
    pub params: Option<ParameterSet>,
    #[serde(default)]
    pub status: Option<JobStatus>,
}

impl JobUpdate {
    pub fn is_empty(&self) -> bool {
        self.device_class.is_none()
            && self.operation.is_none()
            && self.params.is_none()
            && self.status.is_none()
    }

    pub fn apply(self, job: &mut Job) {
        if let Some(d) = self.device_class {
            job.device_class = Some(d);
        }
        if let Some(op) = self.operation {
            job.operation = op;
        }
        if let Some(p) = self.params {
            job.params = p;
        }
        if let Some(s) = self.status {
            job.status = s;
            if s == JobStatus::ToDo {
                job.error = None;
            }
        }
    }

    /// Like [`apply`](Self::apply), but picking a new device or operation
    /// without params fills in that operation's template, the way the job
    /// table does when a dropdown changes.
    pub fn apply_with_template(self, job: &mut Job, registry: &OperationRegistry) {
        let fill =
            self.params.is_none() && (self.operation.is_some() || self.device_class.is_some());
        self.apply(job);
        if !fill {
            return;
        }
        if let Some(device) = job.device_class {
            if let Ok(entry) = registry.lookup(device, &job.operation) {
                job.params = entry.defaults.clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_matches_any_field_case_insensitively() {
        let mut job = Job::placeholder(12);
        job.device_class = Some(DeviceClass::Gripper);
        job.operation = "setSpeed".into();

        assert!(job.matches("12"));
        assert!(job.matches("grip"));
        assert!(job.matches("setspeed"));
        assert!(job.matches("to_do"));
        assert!(job.matches(""));
        assert!(!job.matches("rig"));
    }

    #[test]
    fn update_touches_only_given_fields() {
        let mut job = Job::placeholder(1);
        job.status = JobStatus::Failed;
        job.error = Some("jammed".into());

        JobUpdate {
            operation: Some("close".into()),
            status: Some(JobStatus::ToDo),
            ..Default::default()
        }
        .apply(&mut job);

        assert_eq!(job.operation, "close");
        assert_eq!(job.device_class, None);
        assert_eq!(job.status, JobStatus::ToDo);
        assert_eq!(job.error, None);
    }

    #[test]
    fn picking_an_operation_fills_its_template() {
        let registry = OperationRegistry::standard().unwrap();
        let mut job = Job::placeholder(1);
        JobUpdate {
            device_class: Some(DeviceClass::Rig),
            operation: Some("goto".into()),
            ..Default::default()
        }
        .apply_with_template(&mut job, &registry);
        assert_eq!(job.params.get_f64("speed"), Some(2000.0));

        JobUpdate {
            params: Some(ParameterSet::new().with("x", 5)),
            ..Default::default()
        }
        .apply_with_template(&mut job, &registry);
        assert_eq!(job.params.len(), 1);
    }

    #[test]
    fn stored_json_without_optional_fields_loads() {
        let job: Job = serde_json::from_str(
            r#"{"id": 3, "status": "To Do",
                "created_at": "2024-05-01T00:00:00Z", "updated_at": "2024-05-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(job.status, JobStatus::ToDo);
        assert!(job.params.is_empty());
        assert_eq!(job.label(), "-");
    }
}
