use std::sync::Arc;

use gravity_worker::core::error::GravityError;
use gravity_worker::core::topic::Topic;
use gravity_worker::core::transport::Transport;
use gravity_worker::runner::dispatcher::{Dispatcher, DispatcherConfig, ScheduleSpec};

use crate::config::HttpConfig;
use crate::transport::HttpTransport;

/// Entry point to a Gravity service over HTTP.
///
/// ## Example
/// ```rust,no_run
/// use gravity_worker_http::Gravity;
///
/// # async fn run() -> Result<(), gravity_worker::core::error::GravityError> {
/// let gravity = Gravity::new("http://localhost:10005")?;
/// gravity.ping().await?;
/// let _topic = gravity.topic("first-topic", true).await?;
///
/// let worker = gravity.worker("first-topic", "* * * * * *", "Europe/Rome");
/// worker.start().await?;
/// let jobs = worker.jobs();
/// while let Some(mut job) = jobs.recv().await {
///     job.complete(None).await?;
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Gravity {
    transport: Arc<HttpTransport>,
}

impl Gravity {
    pub fn new(url: &str) -> Result<Self, GravityError> {
        Self::with_config(HttpConfig::new(url)?)
    }

    pub fn with_config(config: HttpConfig) -> Result<Self, GravityError> {
        Ok(Self {
            transport: Arc::new(HttpTransport::new(config)?),
        })
    }

    /// See [`HttpConfig::from_env`].
    pub fn from_env() -> Result<Self, GravityError> {
        Self::with_config(HttpConfig::from_env()?)
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        self.transport.clone()
    }

    /// Health check, bounded by [`HttpConfig::ping_timeout`].
    pub async fn ping(&self) -> Result<(), GravityError> {
        self.transport.ping().await
    }

    /// Handle to a topic, creating it on the service first when `create` is set.
    pub async fn topic(&self, name: &str, create: bool) -> Result<Topic, GravityError> {
        if create {
            self.transport.create_topic(name).await?;
        }
        Ok(Topic::new(name, self.transport()))
    }

    /// A dispatcher polling `topic` on a cron schedule. Nothing happens until it is started;
    /// the expression and timezone are checked then.
    pub fn worker(&self, topic: &str, cron: &str, timezone: &str) -> Dispatcher {
        self.worker_with_config(
            topic,
            ScheduleSpec::cron(cron, timezone),
            DispatcherConfig::default(),
        )
    }

    pub fn worker_with_config(
        &self,
        topic: &str,
        schedule: ScheduleSpec,
        config: DispatcherConfig,
    ) -> Dispatcher {
        Dispatcher::new(Topic::new(topic, self.transport()), schedule, config)
    }
}
