//! Small worker against a running Gravity service.
//!
//! `gravity-worker-demo enqueue --count 10` seeds a topic, `gravity-worker-demo work` consumes it
//! and randomly completes or fails each job until interrupted.

use anyhow::Context;
use clap::{Parser, Subcommand};
use futures::StreamExt;
use gravity_worker::prelude::*;
use gravity_worker_http::{encode_json, Gravity, HttpConfig, PayloadJsonExt};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gravity-worker-demo", about = "Enqueue and process Gravity jobs")]
struct Cli {
    /// Gravity base URL. Without it the GRAVITY_* environment variables are used.
    #[arg(long)]
    url: Option<String>,
    /// Topic to work on
    #[arg(long, default_value = "first-topic")]
    topic: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Put sample jobs on the topic
    Enqueue {
        #[arg(long, default_value_t = 10)]
        count: usize,
    },
    /// Poll the topic and process jobs until Ctrl-C
    Work {
        /// Six-field cron, or five fields for minute resolution
        #[arg(long, default_value = "*/5 * * * * *")]
        cron: String,
        /// IANA timezone, UTC when empty
        #[arg(long, default_value = "")]
        timezone: String,
        /// Chance of failing a job, 0.0 to 1.0
        #[arg(long, default_value_t = 0.2)]
        failure_rate: f64,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct DemoPayload {
    message: String,
    sequence: usize,
}

#[derive(Debug, Serialize)]
struct DemoOutput {
    length: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();

    let gravity = match &cli.url {
        Some(url) => Gravity::with_config(HttpConfig::new(url)?)?,
        None => Gravity::from_env().context("pass --url or set GRAVITY_URL")?,
    };
    gravity.ping().await.context("Gravity is not reachable")?;
    let topic = gravity.topic(&cli.topic, true).await?;

    match cli.command {
        Command::Enqueue { count } => enqueue(&topic, count).await,
        Command::Work {
            cron,
            timezone,
            failure_rate,
        } => work(&gravity, &cli.topic, &cron, &timezone, failure_rate).await,
    }
}

async fn enqueue(topic: &Topic, count: usize) -> anyhow::Result<()> {
    for sequence in 0..count {
        let payload = encode_json(&DemoPayload {
            message: format!("Job number {sequence}"),
            sequence,
        })?;
        match topic.enqueue(payload).await? {
            Enqueued::Accepted(job) => tracing::info!(jid = job.id(), "enqueued"),
            Enqueued::Duplicate => tracing::warn!(sequence, "already queued"),
        }
    }
    Ok(())
}

async fn work(
    gravity: &Gravity,
    topic: &str,
    cron: &str,
    timezone: &str,
    failure_rate: f64,
) -> anyhow::Result<()> {
    anyhow::ensure!(
        (0.0..=1.0).contains(&failure_rate),
        "failure rate must be between 0 and 1"
    );
    let worker = gravity.worker(topic, cron, timezone);
    worker.start().await?;

    let mut errors = worker.errors();
    let jobs = worker.jobs().into_stream();
    tokio::pin!(jobs);
    loop {
        tokio::select! {
            job = jobs.next() => match job {
                Some(job) => process(job, failure_rate).await,
                None => break,
            },
            Ok(err) = errors.recv() => tracing::error!(error = %err, "worker reported an error"),
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
        }
    }
    worker.stop().await;
    Ok(())
}

async fn process(mut job: Job, failure_rate: f64) {
    let payload: Result<DemoPayload, _> = job
        .data()
        .ok_or_else(|| GravityError::InvalidArgument("job has no data".to_string()))
        .and_then(|data| data.decode_json());

    let failed = rand::thread_rng().gen_bool(failure_rate);
    let result = match payload {
        Ok(payload) if !failed => {
            tracing::info!(jid = job.id(), message = %payload.message, "completing");
            let output = encode_json(&DemoOutput {
                length: payload.message.len(),
            });
            match output {
                Ok(output) => job.complete(Some(output)).await,
                Err(err) => job.fail(encode_json(&err.to_string()).ok()).await,
            }
        }
        Ok(_) => {
            tracing::info!(jid = job.id(), "failing on purpose");
            job.fail(encode_json("unlucky").ok()).await
        }
        Err(err) => {
            tracing::warn!(jid = job.id(), error = %err, "undecodable job");
            job.fail(encode_json(&err.to_string()).ok()).await
        }
    };
    if let Err(err) = result {
        tracing::error!(jid = job.id(), error = %err, "lifecycle call failed");
    }
}
