use std::fmt;
use std::sync::Arc;

use crate::core::error::GravityError;
use crate::core::job::{Job, JobRecord};
use crate::core::payload::Payload;
use crate::core::transport::{Enqueued, TopicSchedule, Transport};

/// Name-scoped handle to a topic. Holds no state besides the name, so it is cheap to clone and
/// safe to share.
#[derive(Clone)]
pub struct Topic {
    name: String,
    transport: Arc<dyn Transport>,
}

impl Topic {
    pub fn new(name: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            name: name.into(),
            transport,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Push a payload onto this topic.
    pub async fn enqueue(&self, payload: Payload) -> Result<Enqueued<Job>, GravityError> {
        let enqueued = self.transport.enqueue(&self.name, &payload).await?;
        Ok(enqueued.map(|record| self.bind(record)))
    }

    /// Pull the next job. An empty topic is reported as [`GravityError::NotFound`], see
    /// [`GravityError::is_empty_queue`].
    pub async fn dequeue(&self) -> Result<Job, GravityError> {
        let record = self.transport.dequeue(&self.name).await?;
        Ok(self.bind(record))
    }

    /// Start describing a server-side schedule for this topic. Active, repeating and without
    /// delay unless changed.
    pub fn schedule(&self, cron: impl Into<String>, timezone: impl Into<String>) -> TopicSchedule {
        TopicSchedule {
            topic: self.name.clone(),
            cron: cron.into(),
            timezone: timezone.into(),
            active: true,
            once: false,
            delay: 0,
        }
    }

    /// Ask the service to enqueue onto this topic following `schedule`.
    pub async fn add_schedule(&self, schedule: &TopicSchedule) -> Result<(), GravityError> {
        if schedule.topic != self.name {
            return Err(GravityError::InvalidArgument(format!(
                "schedule targets topic {}, not {}",
                schedule.topic, self.name
            )));
        }
        self.transport.add_schedule(schedule).await
    }

    fn bind(&self, record: JobRecord) -> Job {
        Job::new(record, self.transport.clone())
    }
}

impl TopicSchedule {
    pub fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn once(mut self, once: bool) -> Self {
        self.once = once;
        self
    }

    pub fn delay(mut self, seconds: i32) -> Self {
        self.delay = seconds;
        self
    }
}

impl fmt::Debug for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Topic")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
