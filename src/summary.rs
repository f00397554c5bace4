//! Per-surface aggregation of `summary.jsonl`.
use crate::record::{load_summary, CaseRecord};
use crate::surface::Surface;
use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SurfaceSummary {
    pub cases: usize,
    pub passed: usize,
    pub failed: usize,
    /// Latest failing case ids, in first-seen order.
    pub failing: Vec<String>,
}

/// Outcome of the most recent scored execution of each case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub surfaces: BTreeMap<Surface, SurfaceSummary>,
}

impl RunSummary {
    /// Aggregate scored records. A case run more than once counts once,
    /// with the outcome of its last record.
    pub fn from_records(records: &[CaseRecord]) -> Self {
        let mut latest: BTreeMap<Surface, Vec<(&str, bool)>> = BTreeMap::new();
        for record in records.iter().filter(|record| record.role.is_scored()) {
            let cases = latest.entry(record.surface).or_default();
            match cases.iter_mut().find(|(id, _)| *id == record.case_id) {
                Some(entry) => entry.1 = record.passed,
                None => cases.push((record.case_id.as_str(), record.passed)),
            }
        }

        let surfaces = latest
            .into_iter()
            .map(|(surface, cases)| {
                let passed = cases.iter().filter(|(_, passed)| *passed).count();
                let failing: Vec<String> = cases
                    .iter()
                    .filter(|(_, passed)| !*passed)
                    .map(|(id, _)| id.to_string())
                    .collect();
                let summary = SurfaceSummary {
                    cases: cases.len(),
                    passed,
                    failed: failing.len(),
                    failing,
                };
                (surface, summary)
            })
            .collect();
        Self { surfaces }
    }

    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self::from_records(&load_summary(path)?))
    }

    pub fn failed(&self) -> usize {
        self.surfaces.values().map(|summary| summary.failed).sum()
    }

    pub fn to_markdown(&self) -> String {
        let mut out = String::from("| surface | cases | passed | failed |\n");
        out.push_str("| --- | ---: | ---: | ---: |\n");
        for (surface, summary) in &self.surfaces {
            out.push_str(&format!(
                "| {surface} | {} | {} | {} |\n",
                summary.cases, summary.passed, summary.failed
            ));
        }
        let failing: Vec<String> = self
            .surfaces
            .iter()
            .flat_map(|(surface, summary)| {
                summary
                    .failing
                    .iter()
                    .map(move |case_id| format!("- `{surface}:{case_id}`"))
            })
            .collect();
        if !failing.is_empty() {
            out.push_str("\nFailing cases:\n\n");
            out.push_str(&failing.join("\n"));
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordRole;
    use std::path::PathBuf;

    fn record(surface: Surface, case_id: &str, role: RecordRole, passed: bool) -> CaseRecord {
        CaseRecord {
            accepted_exit_codes: vec![0],
            argv: vec!["cws".into()],
            case_id: case_id.into(),
            command_display: "cws".into(),
            duration_ms: 5,
            exit_code: if passed { 0 } else { 1 },
            generated_at_epoch_ms: 0,
            passed,
            purpose: String::new(),
            requires: None,
            role,
            stderr_path: PathBuf::from("stderr.txt"),
            stdout_path: PathBuf::from("stdout.txt"),
            surface,
            timed_out: false,
        }
    }

    #[test]
    fn counts_scored_records_per_surface() {
        let records = vec![
            record(Surface::Cli, "ls", RecordRole::Case, true),
            record(Surface::Cli, "e2e_setup_create_ws-e2e-cli", RecordRole::Setup, false),
            record(Surface::Cli, "exec_root", RecordRole::Case, false),
            record(Surface::Bash, "01_help", RecordRole::FlowStep, true),
        ];
        let summary = RunSummary::from_records(&records);
        assert_eq!(
            summary.surfaces[&Surface::Cli],
            SurfaceSummary {
                cases: 2,
                passed: 1,
                failed: 1,
                failing: vec!["exec_root".into()],
            }
        );
        assert_eq!(summary.surfaces[&Surface::Bash].passed, 1);
        assert_eq!(summary.failed(), 1);
    }

    #[test]
    fn reruns_keep_the_latest_outcome() {
        let records = vec![
            record(Surface::Zsh, "ls", RecordRole::Case, false),
            record(Surface::Zsh, "ls", RecordRole::Case, true),
        ];
        let summary = RunSummary::from_records(&records);
        assert_eq!(summary.surfaces[&Surface::Zsh].cases, 1);
        assert_eq!(summary.failed(), 0);
    }

    #[test]
    fn markdown_lists_failing_cases() {
        let records = vec![record(Surface::Cli, "exec_root", RecordRole::Case, false)];
        let markdown = RunSummary::from_records(&records).to_markdown();
        assert!(markdown.contains("| cli | 1 | 0 | 1 |"));
        assert!(markdown.contains("- `cli:exec_root`"));
    }
}
