use async_trait::async_trait;
use bytes::Bytes;
use gravity_worker::core::error::GravityError;
use gravity_worker::core::job::{JobRecord, JobStatus, Operation};
use gravity_worker::core::payload::Payload;
use gravity_worker::core::transport::{Enqueued, TopicSchedule, Transport};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use tracing::instrument;

use crate::config::HttpConfig;
use crate::json::raw_json;
use crate::types::{
    ErrorEnvelope, JobEnvelope, LifecycleRequest, ScheduleRequest, TopicRequest,
};

const JSON: &str = "application/json";

/// An implementation of the Transport backed by the Gravity HTTP API.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    config: HttpConfig,
}

impl HttpTransport {
    pub fn new(config: HttpConfig) -> Result<Self, GravityError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| GravityError::Config(format!("can't build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Use an existing client, e.g. one shared with the rest of the application.
    pub fn with_client(client: Client, config: HttpConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// Base URL with `segments` appended, each one percent-encoded.
    fn url(&self, segments: &[&str]) -> Result<Url, GravityError> {
        let mut url = self.config.base_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                GravityError::Config(format!("{} can't be a base URL", self.config.base_url))
            })?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<(StatusCode, Bytes), GravityError> {
        let response: Response = request
            .send()
            .await
            .map_err(|e| GravityError::connectivity_with("request to Gravity failed", e))?;
        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            GravityError::connectivity_with("failed to read response from Gravity", e)
        })?;
        Ok((status, body))
    }

    async fn lifecycle(
        &self,
        operation: Operation,
        job_id: &str,
        request: RequestBuilder,
    ) -> Result<(), GravityError> {
        let (status, _) = self.send(request).await?;
        if status != StatusCode::OK {
            return Err(GravityError::Operation {
                operation,
                job_id: job_id.to_string(),
                status_code: status.as_u16(),
            });
        }
        Ok(())
    }
}

fn is_error(status: StatusCode) -> bool {
    status.is_client_error() || status.is_server_error()
}

/// Service error from the envelope, or `fallback` when the body isn't one.
fn service_error(status: StatusCode, body: &[u8], fallback: &str) -> GravityError {
    let message = serde_json::from_slice::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| fallback.to_string());
    GravityError::Service {
        status_code: status.as_u16(),
        message,
    }
}

fn decode_job(body: &[u8], default_status: JobStatus) -> Result<JobRecord, GravityError> {
    let envelope: JobEnvelope = serde_json::from_slice(body).map_err(GravityError::decode)?;
    envelope
        .data
        .into_record(default_status)
        .map_err(GravityError::decode)
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip_all, err, fields(url = %self.config.base_url))]
    async fn ping(&self) -> Result<(), GravityError> {
        let request = self
            .client
            .get(self.config.base_url.clone())
            .timeout(self.config.ping_timeout);
        let (status, _) = self.send(request).await?;
        if is_error(status) {
            return Err(GravityError::connectivity(format!(
                "health check answered {status}"
            )));
        }
        Ok(())
    }

    #[instrument(skip_all, err, fields(topic = %name))]
    async fn create_topic(&self, name: &str) -> Result<(), GravityError> {
        let request = self
            .client
            .post(self.url(&["topics"])?)
            .json(&TopicRequest { uuid: name });
        let (status, body) = self.send(request).await?;
        if !is_error(status) || status == StatusCode::CONFLICT {
            return Ok(());
        }
        let envelope: ErrorEnvelope = serde_json::from_slice(&body).map_err(GravityError::decode)?;
        Err(GravityError::Service {
            status_code: status.as_u16(),
            message: envelope.error.message,
        })
    }

    #[instrument(skip_all, err, fields(topic = %topic, payload_size = payload.len()))]
    async fn enqueue(
        &self,
        topic: &str,
        payload: &Payload,
    ) -> Result<Enqueued<JobRecord>, GravityError> {
        raw_json(payload)?;
        let request = self
            .client
            .post(self.url(&["topics", topic, "enqueue"])?)
            .header(CONTENT_TYPE, JSON)
            .body(payload.clone().into_bytes());
        let (status, body) = self.send(request).await?;
        if status == StatusCode::CONFLICT {
            return Ok(Enqueued::Duplicate);
        }
        if is_error(status) {
            return Err(service_error(status, &body, "error adding job"));
        }
        decode_job(&body, JobStatus::Queued).map(Enqueued::Accepted)
    }

    #[instrument(skip_all, err, fields(topic = %topic))]
    async fn dequeue(&self, topic: &str) -> Result<JobRecord, GravityError> {
        let request = self
            .client
            .post(self.url(&["topics", topic, "dequeue"])?)
            .header(CONTENT_TYPE, JSON);
        let (status, body) = self.send(request).await?;
        if status == StatusCode::NOT_FOUND {
            return Err(GravityError::NotFound {
                status_code: status.as_u16(),
            });
        }
        if is_error(status) {
            return Err(service_error(status, &body, "error getting job"));
        }
        decode_job(&body, JobStatus::InProgress)
    }

    #[instrument(skip_all, err, fields(jid = %job_id))]
    async fn complete(&self, job_id: &str, output: Option<&Payload>) -> Result<(), GravityError> {
        let body = LifecycleRequest {
            out: output.map(raw_json).transpose()?,
            ..Default::default()
        };
        let request = self
            .client
            .put(self.url(&["jobs", job_id, "complete"])?)
            .json(&body);
        self.lifecycle(Operation::Complete, job_id, request).await
    }

    #[instrument(skip_all, err, fields(jid = %job_id))]
    async fn fail(&self, job_id: &str, error: Option<&Payload>) -> Result<(), GravityError> {
        let body = LifecycleRequest {
            error: error.map(raw_json).transpose()?,
            ..Default::default()
        };
        let request = self
            .client
            .put(self.url(&["jobs", job_id, "fail"])?)
            .json(&body);
        self.lifecycle(Operation::Fail, job_id, request).await
    }

    #[instrument(skip_all, err, fields(jid = %job_id))]
    async fn return_job(&self, job_id: &str) -> Result<(), GravityError> {
        let request = self.client.put(self.url(&["jobs", job_id, "return"])?);
        self.lifecycle(Operation::Return, job_id, request).await
    }

    #[instrument(skip_all, err, fields(topic = %schedule.topic, cron = %schedule.cron))]
    async fn add_schedule(&self, schedule: &TopicSchedule) -> Result<(), GravityError> {
        let request = self
            .client
            .post(self.url(&["schedules"])?)
            .json(&ScheduleRequest {
                topic: &schedule.topic,
                cron: &schedule.cron,
                cron_timezone: &schedule.timezone,
                active: schedule.active,
                schedule_once: schedule.once,
                delay: schedule.delay,
            });
        let (status, body) = self.send(request).await?;
        if status != StatusCode::OK {
            let fallback = status
                .canonical_reason()
                .unwrap_or("error adding schedule");
            return Err(service_error(status, &body, fallback));
        }
        Ok(())
    }
}
