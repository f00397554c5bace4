//! Execution records: per-case `meta.json` plus the run-wide `summary.jsonl`.
//!
//! Record fields are declared in alphabetical order so both files carry
//! sorted keys.
use crate::exec::ExecutionResult;
use crate::paths::HarnessPaths;
use crate::plan::PlannedCase;
use crate::surface::Surface;
use crate::util::now_epoch_ms;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Why an execution happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordRole {
    /// A catalog case under test.
    Case,
    /// One step of a multi-step flow.
    FlowStep,
    /// Prerequisite workspace creation.
    Setup,
    /// Existence check before creating a prerequisite.
    Probe,
    /// Removal of a workspace the harness owns.
    Cleanup,
}

impl RecordRole {
    /// Roles that count towards pass/fail totals.
    pub fn is_scored(self) -> bool {
        matches!(self, RecordRole::Case | RecordRole::FlowStep)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub accepted_exit_codes: Vec<i32>,
    pub argv: Vec<String>,
    pub case_id: String,
    pub command_display: String,
    pub duration_ms: u128,
    pub exit_code: i32,
    pub generated_at_epoch_ms: u128,
    pub passed: bool,
    pub purpose: String,
    pub requires: Option<String>,
    pub role: RecordRole,
    pub stderr_path: PathBuf,
    pub stdout_path: PathBuf,
    pub surface: Surface,
    pub timed_out: bool,
}

#[derive(Debug, Clone)]
pub struct Recorder {
    paths: HarnessPaths,
}

impl Recorder {
    pub fn new(paths: HarnessPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &HarnessPaths {
        &self.paths
    }

    /// Write `meta.json` for the case and append the record to the summary.
    pub fn record(
        &self,
        planned: &PlannedCase,
        result: &ExecutionResult,
        role: RecordRole,
        accepted: &BTreeSet<i32>,
    ) -> Result<CaseRecord> {
        let record = CaseRecord {
            accepted_exit_codes: accepted.iter().copied().collect(),
            argv: result.argv.clone(),
            case_id: planned.case.case_id.clone(),
            command_display: result.command_display.clone(),
            duration_ms: result.duration_ms,
            exit_code: result.exit_code,
            generated_at_epoch_ms: now_epoch_ms()?,
            passed: !result.timed_out && accepted.contains(&result.exit_code),
            purpose: planned.case.purpose.clone(),
            requires: planned.case.requires.clone(),
            role,
            stderr_path: result.stderr_path.clone(),
            stdout_path: result.stdout_path.clone(),
            surface: planned.surface,
            timed_out: result.timed_out,
        };

        let meta_path = self.paths.meta_path(planned.surface, &planned.case.case_id);
        if let Some(parent) = meta_path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        let mut text = serde_json::to_string_pretty(&record).context("serialize case record")?;
        text.push('\n');
        fs::write(&meta_path, text.as_bytes())
            .with_context(|| format!("write {}", meta_path.display()))?;
        self.append_summary(&record)?;

        tracing::info!(
            surface = %record.surface,
            case_id = %record.case_id,
            exit_code = record.exit_code,
            duration_ms = record.duration_ms as u64,
            passed = record.passed,
            "recorded execution"
        );
        Ok(record)
    }

    fn append_summary(&self, record: &CaseRecord) -> Result<()> {
        let path = self.paths.summary_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        let mut line = serde_json::to_string(record).context("serialize summary line")?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("open {}", path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("append {}", path.display()))?;
        Ok(())
    }
}

/// Load every record from a `summary.jsonl`, skipping blank lines.
pub fn load_summary(path: &Path) -> Result<Vec<CaseRecord>> {
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("parse {} line {}", path.display(), idx + 1))
        })
        .collect()
}
