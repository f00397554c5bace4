//! Which planned cases a run executes.
use crate::plan::PlannedCase;
use crate::surface::Surface;
use anyhow::{anyhow, Result};
use serde::Serialize;
use std::collections::BTreeSet;

const RM_ALL_CASE: &str = "rm_all_yes";

/// One `<PREFIX>_CASE` entry: a case id, optionally pinned to a surface.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct CaseSelector {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surface: Option<Surface>,
    pub case_id: String,
}

impl CaseSelector {
    fn matches(&self, surface: Surface, case_id: &str) -> bool {
        let surface_ok = match self.surface {
            Some(pinned) => pinned == surface,
            None => true,
        };
        surface_ok && self.case_id == case_id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CaseSelection {
    selectors: BTreeSet<CaseSelector>,
}

impl CaseSelection {
    /// Parse a comma-separated list such as `ls,bash:exec_root`.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut selectors = BTreeSet::new();
        for token in raw.split(',').map(str::trim).filter(|token| !token.is_empty()) {
            let selector = match token.split_once(':') {
                Some((surface, case_id)) => CaseSelector {
                    surface: Some(surface.parse()?),
                    case_id: case_id.trim().to_string(),
                },
                None => CaseSelector {
                    surface: None,
                    case_id: token.to_string(),
                },
            };
            if selector.case_id.is_empty() {
                return Err(anyhow!("empty case id in selector {token:?}"));
            }
            selectors.insert(selector);
        }
        Ok(Self { selectors })
    }

    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.selectors.len()
    }

    pub fn matches(&self, surface: Surface, case_id: &str) -> bool {
        self.selectors
            .iter()
            .any(|selector| selector.matches(surface, case_id))
    }

    /// Narrow `planned` to the cases this run executes.
    ///
    /// Without explicit selectors nothing runs unless `full` is set, and the
    /// `rm --all` case is dropped unless `allow_rm_all` is set. Explicit
    /// selectors that match nothing are an error.
    pub fn apply(
        &self,
        planned: Vec<PlannedCase>,
        full: bool,
        allow_rm_all: bool,
    ) -> Result<Vec<PlannedCase>> {
        if self.is_empty() {
            if !full {
                return Ok(Vec::new());
            }
            return Ok(planned
                .into_iter()
                .filter(|case| allow_rm_all || case.case.case_id != RM_ALL_CASE)
                .collect());
        }
        let filtered: Vec<PlannedCase> = planned
            .into_iter()
            .filter(|case| self.matches(case.surface, &case.case.case_id))
            .collect();
        if filtered.is_empty() {
            let wanted: Vec<String> = self
                .selectors
                .iter()
                .map(|selector| match selector.surface {
                    Some(surface) => format!("{surface}:{}", selector.case_id),
                    None => selector.case_id.clone(),
                })
                .collect();
            return Err(anyhow!(
                "case selection did not match any planned cases: {}",
                wanted.join(", ")
            ));
        }
        Ok(filtered)
    }
}
