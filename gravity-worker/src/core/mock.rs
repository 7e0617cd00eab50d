//! Scripted in-memory transport for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::error::GravityError;
use crate::core::job::{JobRecord, JobStatus, Operation};
use crate::core::payload::Payload;
use crate::core::transport::{Enqueued, TopicSchedule, Transport};

#[derive(Debug, Clone, Copy)]
pub enum Reply {
    Ok,
    Status(u16),
}

/// What `dequeue` answers once the scripted jobs ran out.
#[derive(Debug, Clone, Copy, Default)]
pub enum WhenDrained {
    #[default]
    Empty,
    /// Keep producing jobs with increasing numeric ids.
    Endless,
    Fail(u16),
}

#[derive(Default)]
pub struct MockTransport {
    scripted: Mutex<VecDeque<JobRecord>>,
    when_drained: Mutex<WhenDrained>,
    lifecycle_reply: Mutex<Option<u16>>,
    enqueued: Mutex<Vec<(String, Payload)>>,
    lifecycle: Mutex<Vec<(Operation, String)>>,
    dequeues: AtomicUsize,
    produced: AtomicUsize,
    calls: AtomicUsize,
}

impl MockTransport {
    pub fn with_jobs(ids: &[&str], when_drained: WhenDrained) -> Self {
        let transport = Self::default();
        {
            let mut scripted = transport.scripted.lock().unwrap();
            for id in ids {
                scripted.push_back(JobRecord::new(*id, JobStatus::InProgress));
            }
        }
        *transport.when_drained.lock().unwrap() = when_drained;
        transport
    }

    pub fn set_lifecycle_reply(&self, reply: Reply) {
        *self.lifecycle_reply.lock().unwrap() = match reply {
            Reply::Ok => None,
            Reply::Status(code) => Some(code),
        };
    }

    pub fn dequeue_calls(&self) -> usize {
        self.dequeues.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn lifecycle_calls(&self) -> Vec<(Operation, String)> {
        self.lifecycle.lock().unwrap().clone()
    }

    pub fn enqueued(&self) -> Vec<(String, Payload)> {
        self.enqueued.lock().unwrap().clone()
    }

    fn lifecycle_call(&self, operation: Operation, job_id: &str) -> Result<(), GravityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.lifecycle
            .lock()
            .unwrap()
            .push((operation, job_id.to_string()));
        match *self.lifecycle_reply.lock().unwrap() {
            None => Ok(()),
            Some(status_code) => Err(GravityError::Operation {
                operation,
                job_id: job_id.to_string(),
                status_code,
            }),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn ping(&self) -> Result<(), GravityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn create_topic(&self, _name: &str) -> Result<(), GravityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn enqueue(
        &self,
        topic: &str,
        payload: &Payload,
    ) -> Result<Enqueued<JobRecord>, GravityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut enqueued = self.enqueued.lock().unwrap();
        if enqueued.iter().any(|(_, p)| p == payload) {
            return Ok(Enqueued::Duplicate);
        }
        enqueued.push((topic.to_string(), payload.clone()));
        let mut record = JobRecord::new(format!("enq-{}", enqueued.len()), JobStatus::Queued);
        record.topic = topic.to_string();
        record.data = Some(payload.clone());
        self.scripted.lock().unwrap().push_back({
            let mut in_progress = record.clone();
            in_progress.status = JobStatus::InProgress;
            in_progress
        });
        Ok(Enqueued::Accepted(record))
    }

    async fn dequeue(&self, topic: &str) -> Result<JobRecord, GravityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.dequeues.fetch_add(1, Ordering::SeqCst);
        if let Some(mut record) = self.scripted.lock().unwrap().pop_front() {
            record.topic = topic.to_string();
            return Ok(record);
        }
        match *self.when_drained.lock().unwrap() {
            WhenDrained::Empty => Err(GravityError::NotFound { status_code: 404 }),
            WhenDrained::Endless => {
                let n = self.produced.fetch_add(1, Ordering::SeqCst);
                let mut record = JobRecord::new(n.to_string(), JobStatus::InProgress);
                record.topic = topic.to_string();
                Ok(record)
            }
            WhenDrained::Fail(status_code) => Err(GravityError::Service {
                status_code,
                message: "internal error".to_string(),
            }),
        }
    }

    async fn complete(&self, job_id: &str, _output: Option<&Payload>) -> Result<(), GravityError> {
        self.lifecycle_call(Operation::Complete, job_id)
    }

    async fn fail(&self, job_id: &str, _error: Option<&Payload>) -> Result<(), GravityError> {
        self.lifecycle_call(Operation::Fail, job_id)
    }

    async fn return_job(&self, job_id: &str) -> Result<(), GravityError> {
        self.lifecycle_call(Operation::Return, job_id)
    }

    async fn add_schedule(&self, _schedule: &TopicSchedule) -> Result<(), GravityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
