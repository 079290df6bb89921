use std::{path::PathBuf, time::Duration};

use crate::{common::TimeoutOptions, error::HarnessError};

/// Default port the receiver listens on.
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// Smallest payload, 1KB.
pub const DATA_SIZE_MIN: usize = 1 << 10;
/// Largest payload (exclusive when sampling), 1MB.
pub const DATA_SIZE_MAX: usize = 1 << 20;
pub const FILE_COUNT: u64 = 100;
/// The sender stops spawning after 10 minutes.
pub const DURATION_MAX: Duration = Duration::from_secs(10 * 60);
pub const GEN_INTERVAL_MIN: Duration = Duration::from_millis(1);
pub const GEN_INTERVAL_MAX: Duration = Duration::from_secs(1);
pub const SENDER_DIR: &str = "out_send";
pub const RECEIVER_DIR: &str = "out_recv";
/// Extra sleep added to each task when the queue delay test mode is on.
pub const TEST_QUEUE_DELAY: Duration = Duration::from_secs(1);

/// Settings of the sender role.
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Host of the receiver to POST to.
    pub receiver_host: String,
    /// Port of the receiver to POST to.
    pub receiver_port: u16,
    /// Inclusive lower bound of the payload size, in bytes.
    pub data_size_min: usize,
    /// Exclusive upper bound of the payload size, in bytes.
    pub data_size_max: usize,
    /// Maximum number of tasks spawned in a run.
    pub file_count: u64,
    /// No task is spawned after this much time since the start of the run.
    pub duration_max: Duration,
    /// Inclusive lower bound of the pause between two spawns.
    pub gen_interval_min: Duration,
    /// Exclusive upper bound of the pause between two spawns.
    pub gen_interval_max: Duration,
    /// Directory receiving the sender side copies.
    pub output_dir: PathBuf,
    /// Keep every task alive for [`TEST_QUEUE_DELAY`] after it is done, so
    /// that several tasks are in flight at once.
    pub test_delay_queue: bool,
    /// Seed for interval and size sampling. Entropy is used when unset.
    pub seed: Option<u64>,
    pub timeout_options: TimeoutOptions,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            receiver_host: DEFAULT_HOST.to_string(),
            receiver_port: DEFAULT_PORT,
            data_size_min: DATA_SIZE_MIN,
            data_size_max: DATA_SIZE_MAX,
            file_count: FILE_COUNT,
            duration_max: DURATION_MAX,
            gen_interval_min: GEN_INTERVAL_MIN,
            gen_interval_max: GEN_INTERVAL_MAX,
            output_dir: PathBuf::from(SENDER_DIR),
            test_delay_queue: false,
            seed: None,
            timeout_options: TimeoutOptions::default(),
        }
    }
}

impl SenderConfig {
    pub fn validate(&self) -> Result<(), HarnessError> {
        if self.data_size_min >= self.data_size_max {
            return Err(HarnessError::Config(format!(
                "data size range is empty: [{}, {})",
                self.data_size_min, self.data_size_max
            )));
        }
        if self.gen_interval_min >= self.gen_interval_max {
            return Err(HarnessError::Config(format!(
                "generation interval range is empty: [{:?}, {:?})",
                self.gen_interval_min, self.gen_interval_max
            )));
        }
        if self.receiver_host.is_empty() {
            return Err(HarnessError::Config("receiver host is empty".to_string()));
        }
        Ok(())
    }

    /// Base url of the receiver, without trailing slash.
    pub fn receiver_url(&self) -> String {
        format!("http://{}:{}", self.receiver_host, self.receiver_port)
    }

    /// The artificial delay each task sleeps before finishing, if any.
    pub fn task_delay(&self) -> Option<Duration> {
        self.test_delay_queue.then_some(TEST_QUEUE_DELAY)
    }
}

/// Settings of the receiver role.
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    pub host: String,
    /// Port to bind, 0 picks a free one.
    pub port: u16,
    /// Directory receiving the receiver side copies.
    pub output_dir: PathBuf,
    /// Largest request body accepted, in bytes.
    pub max_body_size: u64,
    pub timeout_options: TimeoutOptions,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            output_dir: PathBuf::from(RECEIVER_DIR),
            max_body_size: DATA_SIZE_MAX as u64,
            timeout_options: TimeoutOptions::default(),
        }
    }
}

impl ReceiverConfig {
    pub fn validate(&self) -> Result<(), HarnessError> {
        if self.max_body_size == 0 {
            return Err(HarnessError::Config(
                "max body size must be positive".to_string(),
            ));
        }
        if self.host.is_empty() {
            return Err(HarnessError::Config("bind host is empty".to_string()));
        }
        Ok(())
    }

    /// The `host:port` string the server binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// The whole harness configuration, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct HarnessConfig {
    pub sender: SenderConfig,
    pub receiver: ReceiverConfig,
}

impl HarnessConfig {
    pub fn validate(&self) -> Result<(), HarnessError> {
        self.sender.validate()?;
        self.receiver.validate()
    }
}
