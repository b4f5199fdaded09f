//! Migration reports.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::version::Version;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Applied,
    Skipped,
    Failed,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            StepStatus::Applied => "applied",
            StepStatus::Skipped => "skipped",
            StepStatus::Failed => "failed",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Failed,
}

/// Outcome of one planned step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: String,
    pub from: Version,
    pub to: Version,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Audit trail of a run. Built by the engine, read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationReport {
    from: Version,
    target: Version,
    status: RunStatus,
    records: Vec<StepRecord>,
}

impl MigrationReport {
    pub(crate) fn new(from: Version, target: Version) -> Self {
        MigrationReport {
            from,
            target,
            status: RunStatus::Completed,
            records: Vec::new(),
        }
    }

    pub(crate) fn record(&mut self, record: StepRecord) {
        if record.status == StepStatus::Failed {
            self.status = RunStatus::Failed;
        }
        self.records.push(record);
    }

    /// Version the document had when the run started.
    pub fn from(&self) -> &Version {
        &self.from
    }

    pub fn target(&self) -> &Version {
        &self.target
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Completed
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    pub fn applied_count(&self) -> usize {
        self.count(StepStatus::Applied)
    }

    pub fn skipped_count(&self) -> usize {
        self.count(StepStatus::Skipped)
    }

    /// The failed record, if the run stopped on an error.
    pub fn failure(&self) -> Option<&StepRecord> {
        self.records.iter().find(|r| r.status == StepStatus::Failed)
    }

    fn count(&self, status: StepStatus) -> usize {
        self.records.iter().filter(|r| r.status == status).count()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "from": self.from,
            "target": self.target,
            "status": self.status,
            "records": self.records,
        })
    }

    /// One line per record followed by a summary line.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for r in &self.records {
            out.push_str(&format!("{:<8} {}", r.status, r.step));
            if let Some(msg) = &r.message {
                out.push_str(&format!(": {}", msg));
            }
            out.push('\n');
        }
        match self.status {
            RunStatus::Completed if self.records.is_empty() => {
                out.push_str(&format!("already at version {}\n", self.target));
            }
            RunStatus::Completed => out.push_str(&format!(
                "migrated {} -> {} ({} applied, {} skipped)\n",
                self.from,
                self.target,
                self.applied_count(),
                self.skipped_count()
            )),
            RunStatus::Failed => out.push_str(&format!(
                "migration from {} to {} failed after {} applied step(s)\n",
                self.from,
                self.target,
                self.applied_count()
            )),
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(step: &str, from: u64, to: u64, status: StepStatus) -> StepRecord {
        StepRecord {
            step: step.to_string(),
            from: Version::from(from),
            to: Version::from(to),
            status,
            message: None,
        }
    }

    #[test]
    fn failure_flips_run_status() {
        let mut report = MigrationReport::new(Version::from(1u64), Version::from(3u64));
        report.record(record("1->2", 1, 2, StepStatus::Applied));
        assert!(report.is_success());
        report.record(StepRecord {
            message: Some("boom".to_string()),
            ..record("2->3", 2, 3, StepStatus::Failed)
        });
        assert_eq!(report.status(), RunStatus::Failed);
        assert_eq!(report.failure().unwrap().step, "2->3");
        assert_eq!(report.applied_count(), 1);
    }

    #[test]
    fn serializes_to_json() {
        let mut report = MigrationReport::new(Version::from(1u64), Version::from(2u64));
        report.record(record("1->2", 1, 2, StepStatus::Skipped));
        assert_eq!(
            report.to_json(),
            json!({
                "from": 1,
                "target": 2,
                "status": "completed",
                "records": [{"step": "1->2", "from": 1, "to": 2, "status": "skipped"}]
            })
        );
    }

    #[test]
    fn renders_text_lines() {
        let mut report = MigrationReport::new(Version::from(1u64), Version::from(3u64));
        report.record(record("1->2", 1, 2, StepStatus::Applied));
        report.record(StepRecord {
            message: Some("value at $.a does not exist".to_string()),
            ..record("2->3", 2, 3, StepStatus::Failed)
        });
        let text = report.render_text();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "applied  1->2");
        assert_eq!(lines[1], "failed   2->3: value at $.a does not exist");
        assert!(lines[2].contains("failed after 1 applied"));
    }

    #[test]
    fn empty_report_says_already_current() {
        let report = MigrationReport::new(Version::from(4u64), Version::from(4u64));
        assert_eq!(report.render_text(), "already at version 4\n");
    }
}
