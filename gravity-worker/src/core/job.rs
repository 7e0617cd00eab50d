use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::instrument;

use crate::core::error::GravityError;
use crate::core::payload::Payload;
use crate::core::transport::Transport;
use crate::core::DateTime;

/// Job status as assigned by the service. Clients only ever move a job out of `InProgress`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown job status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for JobStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "skipped" => Ok(Self::Skipped),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Terminal transitions a client may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Complete,
    Fail,
    Return,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Complete => "complete",
            Self::Fail => "fail",
            Self::Return => "return",
        })
    }
}

/// Job data as the service describes it. Every field is optional on the wire, hence the defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    pub id: String,
    pub data: Option<Payload>,
    pub retries: u32,
    pub priority: i32,
    /// Opaque server timestamp, kept as sent.
    pub backoff_until: Option<String>,
    pub topic: String,
    pub status: JobStatus,
    pub workflow_id: Option<String>,
    pub output: Option<Payload>,
    pub error: Option<Payload>,
    pub started_at: Option<DateTime>,
    pub completed_at: Option<DateTime>,
}

impl JobRecord {
    pub fn new(id: impl Into<String>, status: JobStatus) -> Self {
        Self {
            id: id.into(),
            data: None,
            retries: 0,
            priority: 0,
            backoff_until: None,
            topic: String::new(),
            status,
            workflow_id: None,
            output: None,
            error: None,
            started_at: None,
            completed_at: None,
        }
    }
}

/// One unit of work, bound to the service it came from.
///
/// The status is cached locally: lifecycle calls on a job that isn't `InProgress` fail with
/// [`GravityError::Precondition`] without touching the network, and a successful call moves the
/// cached status along. Nothing is retried.
///
/// A `Job` has a single owner and can't be cloned, so its one terminal call can't be issued
/// twice through copies of the same handle:
///
/// ```compile_fail
/// fn is_clone<T: Clone>() {}
/// is_clone::<gravity_worker::core::job::Job>();
/// ```
pub struct Job {
    record: JobRecord,
    transport: Arc<dyn Transport>,
}

impl Job {
    pub fn new(record: JobRecord, transport: Arc<dyn Transport>) -> Self {
        Self { record, transport }
    }

    pub fn id(&self) -> &str {
        &self.record.id
    }

    pub fn data(&self) -> Option<&Payload> {
        self.record.data.as_ref()
    }

    pub fn retries(&self) -> u32 {
        self.record.retries
    }

    pub fn priority(&self) -> i32 {
        self.record.priority
    }

    pub fn backoff_until(&self) -> Option<&str> {
        self.record.backoff_until.as_deref()
    }

    pub fn topic(&self) -> &str {
        &self.record.topic
    }

    pub fn status(&self) -> JobStatus {
        self.record.status
    }

    pub fn workflow_id(&self) -> Option<&str> {
        self.record.workflow_id.as_deref()
    }

    pub fn output(&self) -> Option<&Payload> {
        self.record.output.as_ref()
    }

    pub fn error(&self) -> Option<&Payload> {
        self.record.error.as_ref()
    }

    pub fn started_at(&self) -> Option<DateTime> {
        self.record.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime> {
        self.record.completed_at
    }

    pub fn record(&self) -> &JobRecord {
        &self.record
    }

    pub fn into_record(self) -> JobRecord {
        self.record
    }

    /// Mark the job as completed, optionally attaching its output.
    #[instrument(skip_all, err, fields(jid = %self.record.id))]
    pub async fn complete(&mut self, output: Option<Payload>) -> Result<(), GravityError> {
        self.check(Operation::Complete)?;
        self.transport
            .complete(&self.record.id, output.as_ref())
            .await?;
        self.record.status = JobStatus::Completed;
        self.record.output = output;
        Ok(())
    }

    /// Mark the job as failed, optionally attaching an error description.
    #[instrument(skip_all, err, fields(jid = %self.record.id))]
    pub async fn fail(&mut self, error: Option<Payload>) -> Result<(), GravityError> {
        self.check(Operation::Fail)?;
        self.transport.fail(&self.record.id, error.as_ref()).await?;
        self.record.status = JobStatus::Failed;
        self.record.error = error;
        Ok(())
    }

    /// Hand the job back to the service so it gets queued again.
    #[instrument(skip_all, err, fields(jid = %self.record.id))]
    pub async fn return_to_queue(&mut self) -> Result<(), GravityError> {
        self.check(Operation::Return)?;
        self.transport.return_job(&self.record.id).await?;
        self.record.status = JobStatus::Queued;
        Ok(())
    }

    fn check(&self, operation: Operation) -> Result<(), GravityError> {
        // A job without an id can't be addressed on the service.
        if self.record.id.is_empty() {
            return Err(GravityError::InvalidArgument(format!(
                "can't {operation} a job without an id"
            )));
        }
        if self.record.status != JobStatus::InProgress {
            return Err(GravityError::Precondition {
                operation,
                job_id: self.record.id.clone(),
                status: self.record.status,
            });
        }
        Ok(())
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("record", &self.record)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mock::{MockTransport, Reply};

    fn in_progress(id: &str, transport: &Arc<MockTransport>) -> Job {
        Job::new(
            JobRecord::new(id, JobStatus::InProgress),
            transport.clone() as Arc<dyn Transport>,
        )
    }

    #[test]
    fn status_wire_names() {
        for status in [
            JobStatus::Queued,
            JobStatus::InProgress,
            JobStatus::Completed,
            JobStatus::Failed,
            JobStatus::Skipped,
        ] {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert!("done".parse::<JobStatus>().is_err());
    }

    #[tokio::test]
    async fn lifecycle_updates_cached_status() {
        let transport = Arc::new(MockTransport::default());

        let mut job = in_progress("a", &transport);
        job.complete(Some(Payload::from("{\"ok\":true}")))
            .await
            .unwrap();
        assert_eq!(job.status(), JobStatus::Completed);
        assert_eq!(job.output(), Some(&Payload::from("{\"ok\":true}")));

        let mut job = in_progress("b", &transport);
        job.fail(None).await.unwrap();
        assert_eq!(job.status(), JobStatus::Failed);

        let mut job = in_progress("c", &transport);
        job.return_to_queue().await.unwrap();
        assert_eq!(job.status(), JobStatus::Queued);

        assert_eq!(
            transport.lifecycle_calls(),
            vec![
                (Operation::Complete, "a".to_string()),
                (Operation::Fail, "b".to_string()),
                (Operation::Return, "c".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn not_in_progress_fails_without_network() {
        let transport = Arc::new(MockTransport::default());

        for status in [
            JobStatus::Queued,
            JobStatus::Completed,
            JobStatus::Failed,
            JobStatus::Skipped,
        ] {
            let mut job = Job::new(
                JobRecord::new("j", status),
                transport.clone() as Arc<dyn Transport>,
            );
            let err = job.complete(None).await.unwrap_err();
            assert!(matches!(
                err,
                GravityError::Precondition {
                    operation: Operation::Complete,
                    ..
                }
            ));
            assert!(matches!(
                job.fail(None).await,
                Err(GravityError::Precondition { .. })
            ));
            assert!(matches!(
                job.return_to_queue().await,
                Err(GravityError::Precondition { .. })
            ));
            assert_eq!(job.status(), status);
        }

        assert_eq!(transport.total_calls(), 0);
    }

    #[tokio::test]
    async fn second_terminal_call_is_rejected_locally() {
        let transport = Arc::new(MockTransport::default());
        let mut job = in_progress("twice", &transport);

        job.complete(None).await.unwrap();
        let err = job.fail(None).await.unwrap_err();
        assert!(matches!(
            err,
            GravityError::Precondition {
                status: JobStatus::Completed,
                ..
            }
        ));
        assert_eq!(transport.total_calls(), 1);
    }

    #[tokio::test]
    async fn unaddressable_job_is_an_invalid_argument() {
        let transport = Arc::new(MockTransport::default());
        let mut job = in_progress("", &transport);

        assert!(matches!(
            job.complete(None).await,
            Err(GravityError::InvalidArgument(_))
        ));
        assert!(matches!(
            job.fail(None).await,
            Err(GravityError::InvalidArgument(_))
        ));
        assert!(matches!(
            job.return_to_queue().await,
            Err(GravityError::InvalidArgument(_))
        ));
        assert_eq!(transport.total_calls(), 0);
    }

    #[tokio::test]
    async fn rejected_call_keeps_status() {
        let transport = Arc::new(MockTransport::default());
        transport.set_lifecycle_reply(Reply::Status(500));
        let mut job = in_progress("x", &transport);

        let err = job.complete(None).await.unwrap_err();
        assert!(matches!(
            err,
            GravityError::Operation {
                operation: Operation::Complete,
                status_code: 500,
                ..
            }
        ));
        assert_eq!(job.status(), JobStatus::InProgress);
        assert!(job.output().is_none());
    }
}
