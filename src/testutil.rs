//! Sinks and scratch directories shared by the unit tests.

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::Mutex,
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;

use crate::{client::PayloadSink, error::HarnessError};

/// Fresh empty directory under the system temp dir.
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "file-async-harness-{}-{}",
        name,
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Keeps every delivered payload in memory.
#[derive(Default)]
pub struct MemorySink {
    payloads: Mutex<HashMap<u64, Bytes>>,
}

impl MemorySink {
    pub fn get(&self, task_id: u64) -> Option<Vec<u8>> {
        self.payloads
            .lock()
            .unwrap()
            .get(&task_id)
            .map(|payload| payload.to_vec())
    }

    pub fn len(&self) -> usize {
        self.payloads.lock().unwrap().len()
    }
}

#[async_trait]
impl PayloadSink for MemorySink {
    async fn deliver(&self, task_id: u64, payload: Bytes) -> Result<(), HarnessError> {
        self.payloads.lock().unwrap().insert(task_id, payload);
        Ok(())
    }
}

/// Accepts payloads after a fixed delay.
pub struct DelaySink {
    delay: Duration,
}

impl DelaySink {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl PayloadSink for DelaySink {
    async fn deliver(&self, _task_id: u64, _payload: Bytes) -> Result<(), HarnessError> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

/// Fails the tasks whose id is a multiple of `n`, accepts the others.
pub struct FailingSink {
    n: u64,
}

impl FailingSink {
    pub fn every(n: u64) -> Self {
        Self { n }
    }
}

#[async_trait]
impl PayloadSink for FailingSink {
    async fn deliver(&self, task_id: u64, _payload: Bytes) -> Result<(), HarnessError> {
        if task_id % self.n == 0 {
            return Err(HarnessError::Timeout(format!(
                "simulated failure of task {}",
                task_id
            )));
        }
        Ok(())
    }
}

/// Panics while delivering task `task_id`, accepts the others.
pub struct PanicSink {
    task_id: u64,
}

impl PanicSink {
    pub fn on(task_id: u64) -> Self {
        Self { task_id }
    }
}

#[async_trait]
impl PayloadSink for PanicSink {
    async fn deliver(&self, task_id: u64, _payload: Bytes) -> Result<(), HarnessError> {
        if task_id == self.task_id {
            panic!("sink failure on task {}", task_id);
        }
        Ok(())
    }
}
