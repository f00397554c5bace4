//! Environment handed to every launcher invocation.
use crate::config::{AmbientEnv, E2eConfig};
use crate::paths::{HarnessPaths, XDG_KINDS};
use crate::surface::ToolProfile;
use anyhow::Result;
use std::collections::BTreeMap;
use std::path::Path;

/// Variables that keep launcher output plain and non-interactive.
const QUIET_OUTPUT: [(&str, &str); 7] = [
    ("NO_COLOR", "1"),
    ("CLICOLOR", "0"),
    ("CLICOLOR_FORCE", "0"),
    ("FORCE_COLOR", "0"),
    ("PY_COLORS", "0"),
    ("GIT_PAGER", "cat"),
    ("PAGER", "cat"),
];

/// A fully composed child environment. The child sees exactly these
/// variables; nothing is inherited implicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChildEnv {
    vars: BTreeMap<String, String>,
}

impl ChildEnv {
    pub fn from_map(vars: BTreeMap<String, String>) -> Self {
        Self { vars }
    }

    /// Compose the run-wide environment from the ambient snapshot.
    ///
    /// Creates the isolated home, XDG and temp directories unless the host
    /// home is in use.
    pub fn compose(
        ambient: &AmbientEnv,
        config: &E2eConfig,
        tool: &ToolProfile,
        repo_root: &Path,
        paths: &HarnessPaths,
    ) -> Result<Self> {
        let mut vars = ambient.vars().clone();
        if !config.use_host_home {
            vars.remove(&tool.launcher_var("DOCKER_ARGS"));
        }
        if let Some(token) = config.gh_token.as_deref() {
            let has_token = ["GH_TOKEN", "GITHUB_TOKEN"]
                .iter()
                .any(|key| vars.get(*key).is_some_and(|value| !value.is_empty()));
            if !has_token {
                vars.insert("GH_TOKEN".to_string(), token.to_string());
            }
        }
        vars.insert("CODEX_HOME".to_string(), repo_root.display().to_string());
        vars.insert(
            "CODEX_WORKSPACE_OPEN_VSCODE_ENABLED".to_string(),
            "false".to_string(),
        );
        for (key, value) in QUIET_OUTPUT {
            vars.insert(key.to_string(), value.to_string());
        }
        if !config.enable_gpg {
            vars.insert("CODEX_WORKSPACE_GPG".to_string(), "none".to_string());
            vars.insert("CODEX_WORKSPACE_GPG_KEY".to_string(), String::new());
        }
        if let Some(image) = config.image.as_deref() {
            vars.insert(tool.launcher_var("IMAGE"), image.to_string());
        }
        if !config.use_host_home {
            paths.ensure_isolated_dirs()?;
            vars.insert("HOME".to_string(), paths.home_dir().display().to_string());
            for kind in XDG_KINDS {
                vars.insert(
                    format!("XDG_{}_HOME", kind.to_ascii_uppercase()),
                    paths.xdg_dir(kind).display().to_string(),
                );
            }
            vars.insert("TMPDIR".to_string(), paths.tmp_dir().display().to_string());
        }
        Ok(Self { vars })
    }

    /// A copy with case overrides applied last.
    pub fn with_overrides(&self, overrides: &BTreeMap<String, String>) -> Self {
        let mut vars = self.vars.clone();
        vars.extend(
            overrides
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );
        Self { vars }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) {
        self.vars.remove(key);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }
}
