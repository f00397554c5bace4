//! Invocation surfaces and the launcher tool they wrap.
//!
//! A surface is one interchangeable way of reaching the launcher: the script
//! executed directly, or the shell function it defines once sourced.
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Default launcher function name.
pub const DEFAULT_TOOL: &str = "cws";

/// Default environment prefix for harness toggles.
pub const DEFAULT_ENV_PREFIX: &str = "CWS_E2E";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum Surface {
    /// Execute the launcher script directly.
    Cli,
    /// Source the bash integration and call the function.
    Bash,
    /// Source the zsh integration and call the function.
    Zsh,
}

impl Surface {
    pub const ALL: [Surface; 3] = [Surface::Cli, Surface::Bash, Surface::Zsh];

    pub fn as_str(self) -> &'static str {
        match self {
            Surface::Cli => "cli",
            Surface::Bash => "bash",
            Surface::Zsh => "zsh",
        }
    }

    /// True for surfaces that run through a sourced shell function.
    pub fn is_shell(self) -> bool {
        !matches!(self, Surface::Cli)
    }
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Surface {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "cli" => Ok(Surface::Cli),
            "bash" => Ok(Surface::Bash),
            "zsh" => Ok(Surface::Zsh),
            other => Err(anyhow::anyhow!("unknown surface: {other}")),
        }
    }
}

/// The launcher under test: its function name and where its scripts live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolProfile {
    name: String,
    env_prefix: String,
}

impl Default for ToolProfile {
    fn default() -> Self {
        Self::new(DEFAULT_TOOL, DEFAULT_ENV_PREFIX)
    }
}

impl ToolProfile {
    pub fn new(name: impl Into<String>, env_prefix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            env_prefix: env_prefix.into(),
        }
    }

    /// Shell function name exported by the integration scripts.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Prefix of the harness toggles (e.g. `CWS_E2E`).
    pub fn env_prefix(&self) -> &str {
        &self.env_prefix
    }

    /// Launcher-owned variable, e.g. `CWS_IMAGE` for the `cws` tool.
    pub fn launcher_var(&self, suffix: &str) -> String {
        format!("{}_{suffix}", self.name.to_ascii_uppercase())
    }

    /// Repo-relative script a surface executes or sources.
    ///
    /// The direct surface executes the bash script, which runs its entry
    /// point when it is not being sourced.
    pub fn script_rel(&self, surface: Surface) -> PathBuf {
        let ext = match surface {
            Surface::Cli | Surface::Bash => "bash",
            Surface::Zsh => "zsh",
        };
        PathBuf::from("scripts").join(format!("{}.{ext}", self.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_round_trips_through_str() {
        for surface in Surface::ALL {
            let parsed: Surface = surface.as_str().parse().expect("parse surface");
            assert_eq!(parsed, surface);
        }
        assert!("fish".parse::<Surface>().is_err());
    }

    #[test]
    fn script_paths_follow_the_tool_name() {
        let tool = ToolProfile::new("awl", "AWS_E2E");
        assert_eq!(tool.script_rel(Surface::Cli), PathBuf::from("scripts/awl.bash"));
        assert_eq!(tool.script_rel(Surface::Zsh), PathBuf::from("scripts/awl.zsh"));
        assert_eq!(tool.env_prefix(), "AWS_E2E");
        assert_eq!(tool.launcher_var("IMAGE"), "AWL_IMAGE");
    }
}
