use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use tokio::fs;
use tracing::{debug, info, warn};

use crate::{common::task_id_from_file_name, error::HarnessError};

/// Comparison of the sender and receiver directories, ids sorted ascending.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct VerifyReport {
    /// Byte-identical on both sides.
    pub matched: Vec<u64>,
    /// Present on both sides with different contents.
    pub mismatched: Vec<u64>,
    /// Only in the sender directory.
    pub missing_on_receiver: Vec<u64>,
    /// Only in the receiver directory.
    pub missing_on_sender: Vec<u64>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.mismatched.is_empty()
            && self.missing_on_receiver.is_empty()
            && self.missing_on_sender.is_empty()
    }
}

/// Payload files of `dir`, keyed by task id. Other files are ignored.
async fn list_payloads(dir: &Path) -> Result<BTreeMap<u64, PathBuf>, HarnessError> {
    let mut payloads = BTreeMap::new();
    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|err| HarnessError::io(dir, err))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|err| HarnessError::io(dir, err))?
    {
        let name = entry.file_name();
        match name.to_str().and_then(task_id_from_file_name) {
            Some(task_id) => {
                payloads.insert(task_id, entry.path());
            }
            None => debug!("Skipping {:?}", entry.path()),
        }
    }
    Ok(payloads)
}

async fn read(path: &Path) -> Result<Vec<u8>, HarnessError> {
    fs::read(path).await.map_err(|err| HarnessError::io(path, err))
}

/// Compare every payload file of `sender_dir` with its receiver copy.
pub async fn compare_dirs(
    sender_dir: &Path,
    receiver_dir: &Path,
) -> Result<VerifyReport, HarnessError> {
    let sent = list_payloads(sender_dir).await?;
    let mut received = list_payloads(receiver_dir).await?;
    let mut report = VerifyReport::default();

    for (task_id, sent_path) in sent {
        let Some(received_path) = received.remove(&task_id) else {
            warn!("task {} was never received", task_id);
            report.missing_on_receiver.push(task_id);
            continue;
        };
        if read(&sent_path).await? == read(&received_path).await? {
            report.matched.push(task_id);
        } else {
            warn!("task {} differs between sender and receiver", task_id);
            report.mismatched.push(task_id);
        }
    }
    report.missing_on_sender = received.into_keys().collect();

    info!(
        "verified {} files: {} matched, {} mismatched, {} missing on receiver, {} missing on sender",
        report.matched.len()
            + report.mismatched.len()
            + report.missing_on_receiver.len()
            + report.missing_on_sender.len(),
        report.matched.len(),
        report.mismatched.len(),
        report.missing_on_receiver.len(),
        report.missing_on_sender.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::scratch_dir;

    #[tokio::test]
    async fn test_compare_dirs() {
        let root = scratch_dir("verify");
        let send = root.join("send");
        let recv = root.join("recv");
        std::fs::create_dir_all(&send).unwrap();
        std::fs::create_dir_all(&recv).unwrap();

        std::fs::write(send.join("0.bin"), b"same").unwrap();
        std::fs::write(recv.join("0.bin"), b"same").unwrap();
        std::fs::write(send.join("1.bin"), b"sent").unwrap();
        std::fs::write(recv.join("1.bin"), b"diff").unwrap();
        std::fs::write(send.join("2.bin"), b"lost").unwrap();
        std::fs::write(recv.join("3.bin"), b"extra").unwrap();
        std::fs::write(recv.join("notes.txt"), b"ignored").unwrap();

        let report = compare_dirs(&send, &recv).await.unwrap();
        assert_eq!(
            report,
            VerifyReport {
                matched: vec![0],
                mismatched: vec![1],
                missing_on_receiver: vec![2],
                missing_on_sender: vec![3],
            }
        );
        assert!(!report.is_clean());
        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn test_compare_missing_dir() {
        let root = scratch_dir("verify_missing");
        let res = compare_dirs(&root.join("nope"), &root).await;
        assert!(matches!(res, Err(HarnessError::Io { .. })));
        std::fs::remove_dir_all(&root).ok();
    }
}
