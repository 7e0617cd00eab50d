use std::sync::Arc;

use futures::Stream;
use tokio::sync::{mpsc, Mutex};

use crate::core::job::Job;

/// Read-only handle to the jobs delivered by a [`Dispatcher`](super::dispatcher::Dispatcher).
///
/// Clones share one buffer, so each job is received by exactly one of them.
#[derive(Clone)]
pub struct JobStream {
    rx: Arc<Mutex<mpsc::Receiver<Job>>>,
}

impl JobStream {
    pub(crate) fn new(rx: mpsc::Receiver<Job>) -> Self {
        Self {
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    /// Wait for the next job. `None` once the dispatcher stopped and every buffered job was
    /// received.
    pub async fn recv(&self) -> Option<Job> {
        self.rx.lock().await.recv().await
    }

    /// Take a buffered job without waiting.
    ///
    /// Also returns `None` while another handle is inside [`recv`](Self::recv), even if jobs are
    /// buffered: the handles share one receiver and this never waits for it.
    pub fn try_recv(&self) -> Option<Job> {
        self.rx.try_lock().ok()?.try_recv().ok()
    }

    pub fn into_stream(self) -> impl Stream<Item = Job> + Send {
        futures::stream::unfold(self, |jobs| async move {
            let job = jobs.recv().await?;
            Some((job, jobs))
        })
    }
}
