use std::time::Duration;

/// Extension of every payload file, on both sides.
pub const PAYLOAD_FILE_EXT: &str = "bin";

/// Timeouts shared by the sender client and the receiver server.
#[derive(Debug, Clone)]
pub struct TimeoutOptions {
    /// Time allowed to establish a connection to the receiver.
    pub connect_timeout: Duration,
    /// Time allowed for a whole POST, response included.
    pub request_timeout: Duration,
    /// Time the receiver waits for a request body.
    pub read_timeout: Duration,
}

impl Default for TimeoutOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            read_timeout: Duration::from_secs(30),
        }
    }
}

/// File name holding the payload of `task_id`.
pub fn payload_file_name(task_id: u64) -> String {
    format!("{}.{}", task_id, PAYLOAD_FILE_EXT)
}

/// Parse the task id back out of a payload file name.
pub fn task_id_from_file_name(name: &str) -> Option<u64> {
    name.strip_suffix(PAYLOAD_FILE_EXT)?
        .strip_suffix('.')?
        .parse()
        .ok()
}
