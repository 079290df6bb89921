use std::{path::PathBuf, time::Duration};

use clap::{Parser, ValueEnum};

use crate::config::HarnessConfig;

/// Role the process runs as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Role {
    /// Generate payloads and post them to the receiver
    Sender,
    /// Accept payloads and store them
    Receiver,
    /// Compare the sender and receiver directories
    Verify,
}

/// Run a server that generates data or a server that receives data
#[derive(Parser, Debug)]
#[command(name = "harness")]
#[command(about = "Run a server that generates data or a server that receives data", long_about = None)]
pub struct Cli {
    #[arg(long, value_enum)]
    pub server: Role,

    /// Receiver host, bound by the receiver and targeted by the sender
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,

    #[arg(long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Maximum number of files to send
    #[arg(long)]
    pub file_count: Option<u64>,

    /// Stop spawning tasks after this many seconds
    #[arg(long, value_name = "SECS")]
    pub duration_secs: Option<u64>,

    /// Smallest payload in bytes
    #[arg(long, value_name = "BYTES")]
    pub data_size_min: Option<usize>,

    /// Largest payload in bytes, exclusive
    #[arg(long, value_name = "BYTES")]
    pub data_size_max: Option<usize>,

    #[arg(long, value_name = "MS")]
    pub interval_min_ms: Option<u64>,

    #[arg(long, value_name = "MS")]
    pub interval_max_ms: Option<u64>,

    #[arg(long, value_name = "DIR")]
    #[arg(value_hint = clap::ValueHint::DirPath)]
    pub sender_dir: Option<PathBuf>,

    #[arg(long, value_name = "DIR")]
    #[arg(value_hint = clap::ValueHint::DirPath)]
    pub receiver_dir: Option<PathBuf>,

    /// Largest body the receiver accepts, in bytes
    #[arg(long, value_name = "BYTES")]
    pub max_body_size: Option<u64>,

    /// Seed for interval and size sampling
    #[arg(long)]
    pub seed: Option<u64>,

    /// Keep each task alive one extra second so tasks pile up in the queue
    #[arg(long)]
    pub test_delay_queue: bool,
}

impl Cli {
    /// Apply the overrides on top of the default configuration.
    pub fn to_config(&self) -> HarnessConfig {
        let mut config = HarnessConfig::default();
        let sender = &mut config.sender;
        let receiver = &mut config.receiver;

        if let Some(host) = &self.host {
            sender.receiver_host = host.clone();
            receiver.host = host.clone();
        }
        if let Some(port) = self.port {
            sender.receiver_port = port;
            receiver.port = port;
        }
        if let Some(count) = self.file_count {
            sender.file_count = count;
        }
        if let Some(secs) = self.duration_secs {
            sender.duration_max = Duration::from_secs(secs);
        }
        if let Some(min) = self.data_size_min {
            sender.data_size_min = min;
        }
        if let Some(max) = self.data_size_max {
            sender.data_size_max = max;
        }
        if let Some(ms) = self.interval_min_ms {
            sender.gen_interval_min = Duration::from_millis(ms);
        }
        if let Some(ms) = self.interval_max_ms {
            sender.gen_interval_max = Duration::from_millis(ms);
        }
        if let Some(dir) = &self.sender_dir {
            sender.output_dir = dir.clone();
        }
        if let Some(dir) = &self.receiver_dir {
            receiver.output_dir = dir.clone();
        }
        if let Some(limit) = self.max_body_size {
            receiver.max_body_size = limit;
        }
        sender.seed = self.seed;
        sender.test_delay_queue = self.test_delay_queue;
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_PORT, FILE_COUNT};

    #[test]
    fn test_parse_role_only() {
        let cli = Cli::try_parse_from(["harness", "--server", "sender"]).unwrap();
        assert_eq!(cli.server, Role::Sender);
        let config = cli.to_config();
        assert_eq!(config.sender.file_count, FILE_COUNT);
        assert_eq!(config.receiver.port, DEFAULT_PORT);
        assert!(!config.sender.test_delay_queue);
    }

    #[test]
    fn test_invalid_role_is_rejected() {
        assert!(Cli::try_parse_from(["harness", "--server", "relay"]).is_err());
        assert!(Cli::try_parse_from(["harness"]).is_err());
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::try_parse_from([
            "harness",
            "--server",
            "receiver",
            "--port",
            "9000",
            "--file-count",
            "5",
            "--interval-max-ms",
            "20",
            "--receiver-dir",
            "/tmp/recv",
            "--seed",
            "11",
            "--test-delay-queue",
        ])
        .unwrap();
        let config = cli.to_config();
        assert_eq!(config.sender.receiver_port, 9000);
        assert_eq!(config.receiver.port, 9000);
        assert_eq!(config.sender.file_count, 5);
        assert_eq!(config.sender.gen_interval_max, Duration::from_millis(20));
        assert_eq!(config.receiver.output_dir, PathBuf::from("/tmp/recv"));
        assert_eq!(config.sender.seed, Some(11));
        assert!(config.sender.test_delay_queue);
    }
}
