#![doc = include_str!("../README.md")]

pub mod core;

/// Schedule driven job dispatcher.
#[cfg(feature = "runner")]
pub mod runner {
    pub mod dispatcher;
    pub mod job_stream;

    #[cfg(test)]
    mod tests;
}

/// Re-exports to simplify importing this crate types.
pub mod prelude {
    pub use super::core::{
        error::GravityError,
        job::{Job, JobRecord, JobStatus, Operation},
        payload::Payload,
        schedule::{CronSchedule, IntervalSchedule, Schedule},
        topic::Topic,
        transport::{Enqueued, TopicSchedule, Transport},
    };
    #[cfg(feature = "runner")]
    pub use super::runner::{
        dispatcher::{Dispatcher, DispatcherConfig, DispatcherState, ErrorPolicy, ScheduleSpec},
        job_stream::JobStream,
    };
}
