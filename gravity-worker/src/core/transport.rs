use async_trait::async_trait;

use crate::core::error::GravityError;
use crate::core::job::JobRecord;
use crate::core::payload::Payload;

/// An interface to the remote queue service. Responsible for turning every logical operation into
/// a request and every response into either a decoded value or a [`GravityError`].
///
/// Implementations must not retry: retry policy belongs to whoever calls the transport. For the
/// HTTP implementation look at `gravity-worker-http` crate.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Health check. Fails with [`GravityError::Connectivity`] when the service can't be reached
    /// or answers with an error status.
    async fn ping(&self) -> Result<(), GravityError>;

    /// Create a topic. A topic that already exists is not an error.
    async fn create_topic(&self, name: &str) -> Result<(), GravityError>;

    /// Push a payload onto a topic.
    async fn enqueue(
        &self,
        topic: &str,
        payload: &Payload,
    ) -> Result<Enqueued<JobRecord>, GravityError>;

    /// Pull the next job from a topic. An empty topic must be reported as
    /// [`GravityError::NotFound`] with status code 404, never as `Ok`.
    async fn dequeue(&self, topic: &str) -> Result<JobRecord, GravityError>;

    /// Mark the job as completed successfully.
    async fn complete(&self, job_id: &str, output: Option<&Payload>) -> Result<(), GravityError>;

    /// Mark the job as failed.
    async fn fail(&self, job_id: &str, error: Option<&Payload>) -> Result<(), GravityError>;

    /// Put the job back in the queue.
    async fn return_job(&self, job_id: &str) -> Result<(), GravityError>;

    /// Register a server-side schedule that enqueues onto a topic.
    async fn add_schedule(&self, schedule: &TopicSchedule) -> Result<(), GravityError>;
}

/// Outcome of an enqueue.
#[derive(Debug, Clone, PartialEq)]
pub enum Enqueued<T> {
    /// The service accepted the payload and created a job for it.
    Accepted(T),
    /// The service already holds this submission (HTTP 409). Nothing to retry.
    Duplicate,
}

impl<T> Enqueued<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Enqueued<U> {
        match self {
            Self::Accepted(v) => Enqueued::Accepted(f(v)),
            Self::Duplicate => Enqueued::Duplicate,
        }
    }

    /// The created job, if the submission wasn't a duplicate.
    pub fn accepted(self) -> Option<T> {
        match self {
            Self::Accepted(v) => Some(v),
            Self::Duplicate => None,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate)
    }
}

/// A schedule kept by the service itself: it enqueues onto `topic` following `cron` in
/// `timezone`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSchedule {
    pub topic: String,
    pub cron: String,
    pub timezone: String,
    pub active: bool,
    /// Fire only once, then deactivate.
    pub once: bool,
    /// Delay in seconds applied to each enqueued job.
    pub delay: i32,
}
