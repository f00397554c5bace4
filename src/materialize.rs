//! Placeholder materialization.
//!
//! Arguments are rewritten in a single left-to-right pass that always takes
//! the longest placeholder starting at the current position, so compound
//! placeholders (`ws-e2e-tunnel`) win over their prefixes (`ws-e2e`) and
//! substituted text is never rescanned.
use crate::catalog::{
    Case, WorkspaceFlavor, CODEX_PROFILE_PLACEHOLDER, GPG_KEY_PLACEHOLDER,
    PRIVATE_REPO_PLACEHOLDER, PUBLIC_REPO_PLACEHOLDER, TUNNEL_PLACEHOLDER, WORKSPACE_PLACEHOLDER,
};
use crate::config::E2eConfig;
use crate::plan::{PlannedCase, Planner};
use crate::surface::Surface;

/// Qualified workspace name for a surface and flavor, e.g. `ws-e2e-zsh-repo`.
pub fn workspace_name(surface: Surface, flavor: WorkspaceFlavor) -> String {
    format!("{WORKSPACE_PLACEHOLDER}-{surface}{}", flavor.suffix())
}

pub fn tunnel_name(workspace: &str) -> String {
    format!("{workspace}-tunnel")
}

/// Concrete values for one case on one surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitutions {
    /// Placeholders matched anywhere inside an argument. Unconfigured
    /// values keep the placeholder text.
    substring: Vec<(&'static str, Option<String>)>,
    /// Placeholders replaced only when they are the whole argument.
    exact: Vec<(&'static str, Option<String>)>,
}

impl Substitutions {
    pub fn new(surface: Surface, flavor: WorkspaceFlavor, config: &E2eConfig) -> Self {
        let workspace = workspace_name(surface, flavor);
        let mut substring = vec![
            (TUNNEL_PLACEHOLDER, Some(tunnel_name(&workspace))),
            (WORKSPACE_PLACEHOLDER, Some(workspace)),
            (PRIVATE_REPO_PLACEHOLDER, config.private_repo.clone()),
            (PUBLIC_REPO_PLACEHOLDER, config.public_repo.clone()),
        ];
        substring.sort_by_key(|(token, _)| std::cmp::Reverse(token.len()));
        Self {
            substring,
            exact: vec![
                (CODEX_PROFILE_PLACEHOLDER, config.codex_profile.clone()),
                (GPG_KEY_PLACEHOLDER, config.gpg_key_id.clone()),
            ],
        }
    }

    pub fn apply(&self, arg: &str) -> String {
        if let Some((_, value)) = self.exact.iter().find(|(token, _)| *token == arg) {
            return value.clone().unwrap_or_else(|| arg.to_string());
        }
        let mut out = String::with_capacity(arg.len());
        let mut rest = arg;
        while !rest.is_empty() {
            // Longest first: the table is sorted by token length.
            match self
                .substring
                .iter()
                .find(|(token, _)| rest.starts_with(*token))
            {
                Some((token, value)) => {
                    out.push_str(value.as_deref().unwrap_or(*token));
                    rest = &rest[token.len()..];
                }
                None => {
                    let Some(ch) = rest.chars().next() else {
                        break;
                    };
                    out.push(ch);
                    rest = &rest[ch.len_utf8()..];
                }
            }
        }
        out
    }

    pub fn apply_all(&self, args: &[String]) -> Vec<String> {
        args.iter().map(|arg| self.apply(arg)).collect()
    }
}

/// Substitute every placeholder in `case` and re-plan it for `surface`.
pub fn materialize(
    planner: &Planner,
    surface: Surface,
    case: &Case,
    config: &E2eConfig,
) -> PlannedCase {
    let substitutions = Substitutions::new(surface, case.flavor(), config);
    let materialized = case.with_args(substitutions.apply_all(&case.args));
    planner.plan(surface, materialized)
}

#[cfg(test)]
#[path = "materialize_tests.rs"]
mod tests;
