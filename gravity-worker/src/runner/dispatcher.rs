use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use super::job_stream::JobStream;
use crate::core::error::GravityError;
use crate::core::job::Job;
use crate::core::schedule::{CronSchedule, Schedule};
use crate::core::topic::Topic;
use crate::core::Utc;

/// Default size of the buffer between the polling task and the consumer.
pub const JOBS_BUFFER_SIZE: usize = 100;
const ERRORS_BUFFER_SIZE: usize = 16;

/// What the polling task does when a dequeue fails with anything other than an empty queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Report the error and stop polling. The job stream closes.
    #[default]
    Stop,
    /// Report the error and try again on the next tick.
    Continue,
}

#[derive(Debug, Clone, Copy)]
pub struct DispatcherConfig {
    /// How many dequeued jobs may wait for the consumer before polling blocks.
    pub buffer_capacity: usize,
    pub error_policy: ErrorPolicy,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: JOBS_BUFFER_SIZE,
            error_policy: ErrorPolicy::default(),
        }
    }
}

/// Where the polling cadence comes from. Cron expressions are only resolved on
/// [`Dispatcher::start`].
#[derive(Clone)]
pub enum ScheduleSpec {
    Cron {
        expression: String,
        timezone: String,
    },
    Custom(Arc<dyn Schedule>),
}

impl ScheduleSpec {
    pub fn cron(expression: impl Into<String>, timezone: impl Into<String>) -> Self {
        Self::Cron {
            expression: expression.into(),
            timezone: timezone.into(),
        }
    }

    pub fn custom(schedule: impl Schedule + 'static) -> Self {
        Self::Custom(Arc::new(schedule))
    }

    fn resolve(&self) -> Result<Arc<dyn Schedule>, GravityError> {
        match self {
            Self::Cron {
                expression,
                timezone,
            } => Ok(Arc::new(CronSchedule::parse(expression, timezone)?)),
            Self::Custom(schedule) => Ok(schedule.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    Idle,
    Running,
    /// Terminal. Either [`Dispatcher::stop`] was called or polling ended on its own.
    Stopped,
}

enum State {
    Idle(mpsc::Sender<Job>),
    Running(JoinHandle<()>),
    Stopped,
}

/// Turns a schedule into a stream of jobs pulled from one topic.
///
/// ## Lifecycle
///
/// `Idle -> Running -> Stopped`, no way back. [`start`](Self::start) and [`stop`](Self::stop) are
/// idempotent and serialized by a per-dispatcher lock.
///
/// ## Implementation
///
/// - `start` spawns one polling task. It runs a tick right away, then sleeps until the next fire
///   time of the schedule, so ticks never overlap and jobs reach the stream in dequeue order.
/// - An empty queue is skipped quietly. Any other dequeue error is logged and published on
///   [`errors`](Self::errors), then handled according to [`ErrorPolicy`].
/// - Dequeued jobs go into a bounded buffer. When it is full the tick waits for the consumer, so
///   a slow consumer slows polling down instead of losing jobs.
/// - `stop` cancels the task and waits for the in-flight tick to finish. The task owns the
///   sending side of the buffer, so the stream closes only once nothing can be sent anymore. A
///   job that was dequeued but couldn't be buffered before cancellation is returned to the
///   service.
///
/// Dropping the dispatcher cancels polling as well.
pub struct Dispatcher {
    topic: Topic,
    schedule: ScheduleSpec,
    config: DispatcherConfig,
    state: Mutex<State>,
    cancellation_token: CancellationToken,
    jobs: JobStream,
    errors: broadcast::Sender<Arc<GravityError>>,
}

impl Dispatcher {
    pub fn new(topic: Topic, schedule: ScheduleSpec, config: DispatcherConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.buffer_capacity.max(1));
        let (errors, _) = broadcast::channel(ERRORS_BUFFER_SIZE);
        Self {
            topic,
            schedule,
            config,
            state: Mutex::new(State::Idle(tx)),
            cancellation_token: CancellationToken::new(),
            jobs: JobStream::new(rx),
            errors,
        }
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Start polling. No-op if the dispatcher was already started, even if it stopped since.
    #[instrument(skip_all, err, fields(topic = %self.topic.name()))]
    pub async fn start(&self) -> Result<(), GravityError> {
        let mut state = self.state.lock().await;
        let State::Idle(tx) = &*state else {
            return Ok(());
        };
        let schedule = self.schedule.resolve()?;

        let poller = Poller {
            topic: self.topic.clone(),
            schedule,
            error_policy: self.config.error_policy,
            tx: tx.clone(),
            errors: self.errors.clone(),
            cancellation_token: self.cancellation_token.clone(),
        };
        // Replacing the idle state drops the last sender besides the poller's.
        *state = State::Running(tokio::spawn(poller.run()));
        tracing::info!("Dispatcher started");
        Ok(())
    }

    /// Stop polling and close the job stream. Waits for the in-flight tick. No-op if never
    /// started or already stopped.
    #[instrument(skip_all, fields(topic = %self.topic.name()))]
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        let State::Running(_) = &*state else {
            return;
        };
        self.cancellation_token.cancel();
        if let State::Running(task) = std::mem::replace(&mut *state, State::Stopped) {
            if let Err(e) = task.await {
                tracing::error!("Polling task ended abnormally: {}", e);
            }
        }
        tracing::info!("Dispatcher stopped");
    }

    pub async fn state(&self) -> DispatcherState {
        match &*self.state.lock().await {
            State::Idle(_) => DispatcherState::Idle,
            State::Running(task) if task.is_finished() => DispatcherState::Stopped,
            State::Running(_) => DispatcherState::Running,
            State::Stopped => DispatcherState::Stopped,
        }
    }

    /// Read side of the job buffer. Every handle reads from the same buffer; the stream ends once
    /// the dispatcher stopped and the buffer is drained.
    pub fn jobs(&self) -> JobStream {
        self.jobs.clone()
    }

    /// Subscribe to polling errors. Empty-queue results are never published here.
    pub fn errors(&self) -> broadcast::Receiver<Arc<GravityError>> {
        self.errors.subscribe()
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.cancellation_token.cancel();
    }
}

/// What the polling task makes of one tick.
enum Tick {
    Continue,
    Stop,
}

struct Poller {
    topic: Topic,
    schedule: Arc<dyn Schedule>,
    error_policy: ErrorPolicy,
    tx: mpsc::Sender<Job>,
    errors: broadcast::Sender<Arc<GravityError>>,
    cancellation_token: CancellationToken,
}

impl Poller {
    async fn run(self) {
        let mut last_fire = Utc::now();
        if let Tick::Stop = self.tick().await {
            return;
        }
        loop {
            // Chained from the previous fire time: an early timer wake-up must not yield the
            // same fire time again.
            let now = Utc::now();
            let next = match self.schedule.next_after(last_fire) {
                // Fire times missed during a long tick collapse into the next upcoming one.
                Some(next) if next < now => self.schedule.next_after(now),
                next => next,
            };
            let Some(next) = next else {
                tracing::warn!(topic = %self.topic.name(), "Schedule has no upcoming fire time, polling ends");
                return;
            };
            let wait = (next - now).to_std().unwrap_or_default();
            tokio::select! {
                _ = self.cancellation_token.cancelled() => return,
                _ = tokio::time::sleep(wait) => {}
            }
            last_fire = next;
            if let Tick::Stop = self.tick().await {
                return;
            }
        }
    }

    /// The dequeue itself is never interrupted: cancellation is only observed between ticks and
    /// while waiting for buffer space.
    #[instrument(skip_all, fields(topic = %self.topic.name()))]
    async fn tick(&self) -> Tick {
        match self.topic.dequeue().await {
            Ok(job) => self.deliver(job).await,
            Err(e) if e.is_empty_queue() => {
                tracing::trace!("Queue is empty");
                Tick::Continue
            }
            Err(e) => {
                tracing::error!("Failed to dequeue: {}", e);
                let _ = self.errors.send(Arc::new(e));
                match self.error_policy {
                    ErrorPolicy::Stop => {
                        tracing::warn!("Stopping dispatcher after dequeue error");
                        Tick::Stop
                    }
                    ErrorPolicy::Continue => Tick::Continue,
                }
            }
        }
    }

    async fn deliver(&self, mut job: Job) -> Tick {
        let permit = tokio::select! {
            biased;
            permit = self.tx.reserve() => permit,
            _ = self.cancellation_token.cancelled() => {
                tracing::warn!(jid = %job.id(), "Stopped while the buffer was full, returning job to the queue");
                if let Err(e) = job.return_to_queue().await {
                    tracing::error!(jid = %job.id(), "Failed to return job: {}", e);
                    let _ = self.errors.send(Arc::new(e));
                }
                return Tick::Stop;
            }
        };
        match permit {
            Ok(permit) => {
                permit.send(job);
                Tick::Continue
            }
            // Every JobStream handle is gone, nobody will ever read this job.
            Err(_) => {
                tracing::warn!(jid = %job.id(), "Job stream dropped, returning job to the queue");
                if let Err(e) = job.return_to_queue().await {
                    tracing::error!(jid = %job.id(), "Failed to return job: {}", e);
                }
                Tick::Stop
            }
        }
    }
}
