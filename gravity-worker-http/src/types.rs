//! Wire shapes of the Gravity API.

use chrono::{DateTime, Datelike, Utc};
use gravity_worker::core::job::{JobRecord, JobStatus, UnknownStatus};
use gravity_worker::core::payload::Payload;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// `{status, data: Job}`
#[derive(Debug, Deserialize)]
pub(crate) struct JobEnvelope {
    pub data: WireJob,
}

/// Every field may be omitted by the service.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct WireJob {
    pub uuid: String,
    pub data: Option<Box<RawValue>>,
    pub retries: u32,
    pub priority: i32,
    pub backoff_until: Option<String>,
    pub topic: String,
    pub status: Option<String>,
    pub workflow_id: Option<String>,
    pub output: Option<Box<RawValue>>,
    pub error: Option<Box<RawValue>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
}

impl WireJob {
    /// `status` is used when the service didn't send one.
    pub fn into_record(self, status: JobStatus) -> Result<JobRecord, UnknownStatus> {
        let status = match self.status.as_deref() {
            None | Some("") => status,
            Some(s) => s.parse()?,
        };
        Ok(JobRecord {
            id: self.uuid,
            data: self.data.map(raw_to_payload),
            retries: self.retries,
            priority: self.priority,
            backoff_until: self.backoff_until.filter(|s| !s.is_empty()),
            topic: self.topic,
            status,
            workflow_id: self.workflow_id.filter(|s| !s.is_empty()),
            output: self.output.map(raw_to_payload),
            error: self.error.map(raw_to_payload),
            started_at: self.started_at.filter(is_set),
            completed_at: self.completed_at.filter(is_set),
        })
    }
}

fn raw_to_payload(raw: Box<RawValue>) -> Payload {
    Payload::from(String::from(raw.get()))
}

// The service sends `0001-01-01T00:00:00Z` for timestamps it never set.
fn is_set(ts: &DateTime<Utc>) -> bool {
    ts.year() > 1
}

/// `{status, error: {name?, statusCode, message, code?}}`
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct TopicRequest<'a> {
    pub uuid: &'a str,
}

/// Body of complete and fail calls.
#[derive(Debug, Default, Serialize)]
pub(crate) struct LifecycleRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out: Option<&'a RawValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a RawValue>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ScheduleRequest<'a> {
    pub topic: &'a str,
    pub cron: &'a str,
    pub cron_timezone: &'a str,
    pub active: bool,
    pub schedule_once: bool,
    pub delay: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_a_full_job() {
        let body = r#"{
            "status": true,
            "data": {
                "uuid": "6f1c",
                "data": {"message": "Job for read"},
                "retries": 2,
                "priority": 5,
                "backoffUntil": "2024-03-01T10:00:00Z",
                "topic": "first-topic",
                "status": "in_progress",
                "workflowId": "wf-1",
                "startedAt": "2024-03-01T09:59:00Z",
                "completedAt": "0001-01-01T00:00:00Z"
            }
        }"#;
        let envelope: JobEnvelope = serde_json::from_str(body).unwrap();
        let record = envelope.data.into_record(JobStatus::Queued).unwrap();

        assert_eq!(record.id, "6f1c");
        assert_eq!(
            record.data.unwrap().as_bytes(),
            br#"{"message": "Job for read"}"#
        );
        assert_eq!(record.retries, 2);
        assert_eq!(record.priority, 5);
        assert_eq!(record.status, JobStatus::InProgress);
        assert_eq!(record.workflow_id.as_deref(), Some("wf-1"));
        assert!(record.started_at.is_some());
        assert!(record.completed_at.is_none());
        assert!(record.output.is_none());
    }

    #[test]
    fn missing_fields_take_defaults() {
        let envelope: JobEnvelope = serde_json::from_str(r#"{"data": {"data": null}}"#).unwrap();
        let record = envelope.data.into_record(JobStatus::InProgress).unwrap();
        assert_eq!(record.id, "");
        assert!(record.data.is_none());
        assert_eq!(record.status, JobStatus::InProgress);
    }

    #[test]
    fn unknown_status_is_rejected() {
        let envelope: JobEnvelope =
            serde_json::from_str(r#"{"data": {"uuid": "a", "status": "paused"}}"#).unwrap();
        assert!(envelope.data.into_record(JobStatus::InProgress).is_err());
    }

    #[test]
    fn lifecycle_body_omits_empty_fields() {
        let out = serde_json::from_str::<&RawValue>(r#"{"rows":3}"#).unwrap();
        let body = LifecycleRequest {
            out: Some(out),
            ..Default::default()
        };
        assert_eq!(serde_json::to_string(&body).unwrap(), r#"{"out":{"rows":3}}"#);
        assert_eq!(
            serde_json::to_string(&LifecycleRequest::default()).unwrap(),
            "{}"
        );
    }
}
