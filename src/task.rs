use std::{path::PathBuf, sync::Arc, time::Duration};

use bytes::Bytes;
use tokio::{fs, time::Instant};
use tracing::info;

use crate::{
    client::PayloadSink, common::payload_file_name, error::HarnessError,
    generator::DataGenerator,
};

/// Outcome of a send task that went through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub task_id: u64,
    /// Size sampled by the scheduler.
    pub requested_size: usize,
    /// Bytes actually sent, the requested size rounded down to whole samples.
    pub payload_len: usize,
    /// Time spent delivering the payload.
    pub elapsed: Duration,
}

/// One generate, deliver and persist unit of work.
#[derive(Debug, Clone)]
pub struct SendTask {
    task_id: u64,
    payload_size: usize,
    output_dir: PathBuf,
    delay: Option<Duration>,
}

impl SendTask {
    pub fn new(task_id: u64, payload_size: usize, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            task_id,
            payload_size,
            output_dir: output_dir.into(),
            delay: None,
        }
    }

    /// Sleep `delay` after the payload is persisted.
    pub fn with_delay(mut self, delay: Option<Duration>) -> Self {
        self.delay = delay;
        self
    }

    /// Path of the sender side copy.
    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(payload_file_name(self.task_id))
    }

    /// Generate the payload, deliver it to `sink`, then write the local copy.
    pub async fn run(self, sink: Arc<dyn PayloadSink>) -> Result<TaskReport, HarnessError> {
        let payload = Bytes::from(DataGenerator::generate(self.payload_size));
        let payload_len = payload.len();

        let start = Instant::now();
        sink.deliver(self.task_id, payload.clone()).await?;
        let elapsed = start.elapsed();

        let path = self.output_path();
        fs::write(&path, &payload)
            .await
            .map_err(|err| HarnessError::io(&path, err))?;

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        info!(
            "task {} finished (sent {:.2} kB, duration {:.2} ms)",
            self.task_id,
            payload_len as f64 / 1024.0,
            elapsed.as_secs_f64() * 1000.0
        );

        Ok(TaskReport {
            task_id: self.task_id,
            requested_size: self.payload_size,
            payload_len,
            elapsed,
        })
    }
}
