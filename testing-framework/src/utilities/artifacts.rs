// File: testing-framework/src/utilities/artifacts.rs
//
// Failure artifacts
//
// When an invariant fails and an artifact directory is configured, the
// executor writes the operation kind, the violated invariant, the violating
// values and both snapshots as pretty JSON. Artifacts can be loaded back and
// summarised for post-mortem inspection.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sett_common::address;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{InvariantViolation, Observation};
use crate::executor::{OperationKind, OperationRecord};
use crate::report::DiagnosticSink;
use crate::snapshot::Snapshot;

/// One tracked balance, amounts rendered in base units
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceEntry {
    pub entity: String,
    pub token: String,
    pub amount: String,
}

/// Serializable form of a [`Snapshot`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotDump {
    pub balances: Vec<BalanceEntry>,
    pub scalars: IndexMap<String, String>,
}

impl From<&Snapshot> for SnapshotDump {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            balances: snapshot
                .balances()
                .map(|(key, amount)| BalanceEntry {
                    entity: key.entity.clone(),
                    token: key.token.clone(),
                    amount: amount.to_string(),
                })
                .collect(),
            scalars: snapshot
                .scalars()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureArtifact {
    pub kind: OperationKind,
    pub invariant: String,
    pub message: String,
    /// RFC 3339 time of the failure
    pub timestamp: String,
    pub from: String,
    pub actor: Option<String>,
    pub amount: Option<String>,
    pub tx_index: Option<u64>,
    pub block_number: Option<u64>,
    pub observations: Vec<Observation>,
    pub before: Option<SnapshotDump>,
    pub after: Option<SnapshotDump>,
}

impl FailureArtifact {
    pub fn from_record(record: &OperationRecord, violation: &InvariantViolation) -> Self {
        let params = record.params();
        Self {
            kind: record.kind(),
            invariant: violation.invariant.to_string(),
            message: violation.message.clone(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            from: address::to_hex(&params.from),
            actor: params.actor.clone(),
            amount: params.amount.map(|a| a.to_string()),
            tx_index: record.receipt().map(|r| r.tx_index),
            block_number: record.receipt().map(|r| r.block_number),
            observations: violation.observations.clone(),
            before: record.before().map(SnapshotDump::from),
            after: record.after().map(SnapshotDump::from),
        }
    }

    /// Write the artifact into `output_dir`, creating it if needed.
    ///
    /// Returns the path of the written file.
    pub async fn save(&self, output_dir: impl AsRef<Path>) -> Result<PathBuf> {
        let output_dir = output_dir.as_ref();
        fs::create_dir_all(output_dir)
            .await
            .context("Failed to create artifact directory")?;

        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S%3f");
        let filename = format!(
            "{}_{}_{}.json",
            self.kind,
            self.invariant.replace('.', "_"),
            timestamp
        );
        let filepath = output_dir.join(filename);

        let json = serde_json::to_string_pretty(self).context("Failed to serialize artifact")?;
        let mut file = fs::File::create(&filepath)
            .await
            .context("Failed to create artifact file")?;
        file.write_all(json.as_bytes())
            .await
            .context("Failed to write artifact data")?;
        file.flush().await.context("Failed to flush artifact file")?;

        Ok(filepath)
    }

    pub async fn load(filepath: impl AsRef<Path>) -> Result<Self> {
        let filepath = filepath.as_ref();
        let content = fs::read_to_string(filepath)
            .await
            .with_context(|| format!("Failed to read artifact file {}", filepath.display()))?;
        serde_json::from_str(&content).context("Failed to parse artifact JSON")
    }

    /// Short framed summary for a terminal or log
    pub fn print_summary(&self, sink: &dyn DiagnosticSink) {
        const WIDTH: usize = 62;
        let border = "═".repeat(WIDTH + 2);
        sink.write_line(&format!("╔{}╗", border));
        sink.write_line(&format!("║ {:WIDTH$} ║", "INVARIANT FAILURE ARTIFACT"));
        sink.write_line(&format!("╠{}╣", border));
        sink.write_line(&format!("║ {:WIDTH$} ║", format!("Operation:  {}", self.kind)));
        sink.write_line(&format!("║ {:WIDTH$} ║", format!("Invariant:  {}", self.invariant)));
        sink.write_line(&format!("║ {:WIDTH$} ║", format!("Timestamp:  {}", self.timestamp)));
        if let Some(block) = self.block_number {
            sink.write_line(&format!("║ {:WIDTH$} ║", format!("Block:      {}", block)));
        }
        sink.write_line(&format!("╠{}╣", border));
        for line in textwrap::wrap(&self.message, WIDTH) {
            sink.write_line(&format!("║ {:WIDTH$} ║", line));
        }
        for obs in &self.observations {
            let rendered = format!("{}: {} -> {}", obs.key, obs.before, obs.after);
            for line in textwrap::wrap(&rendered, WIDTH) {
                sink.write_line(&format!("║ {:WIDTH$} ║", line));
            }
        }
        sink.write_line(&format!("╚{}╝", border));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::BufferSink;

    fn artifact() -> FailureArtifact {
        FailureArtifact {
            kind: OperationKind::Harvest,
            invariant: "harvest.strategistFee".to_string(),
            message: "strategist.want did not increase".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            from: "0x0000000000000000000000000000000000000003".to_string(),
            actor: Some("keeper".to_string()),
            amount: None,
            tx_index: Some(4),
            block_number: Some(9),
            observations: vec![Observation::new("strategist.want", 0, 0)],
            before: None,
            after: None,
        }
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = artifact().save(dir.path()).await.unwrap();
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("Harvest_harvest_strategistFee_"));

        let loaded = FailureArtifact::load(&path).await.unwrap();
        assert_eq!(loaded.kind, OperationKind::Harvest);
        assert_eq!(loaded.observations.len(), 1);
        assert_eq!(loaded.block_number, Some(9));
    }

    #[test]
    fn test_summary() {
        let sink = BufferSink::new();
        artifact().print_summary(&sink);
        let out = sink.contents();
        assert!(out.contains("Operation:  Harvest"));
        assert!(out.contains("strategist.want: 0 -> 0"));
    }
}
