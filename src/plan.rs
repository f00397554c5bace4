//! Invocation planning: turn a case into an executable argv per surface.
//!
//! Planning is pure. It depends only on the case, the surface, the repo root
//! and the tool profile, so every re-plan of the same inputs is identical.
use crate::catalog::{cases_for, Case};
use crate::surface::{Surface, ToolProfile};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A case bound to a surface. Re-planning builds a new value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedCase {
    pub surface: Surface,
    pub case: Case,
    pub argv: Vec<String>,
    pub display: String,
}

impl PlannedCase {
    /// `surface:case_id`, the id used for selection and reporting.
    pub fn qualified_id(&self) -> String {
        format!("{}:{}", self.surface, self.case.case_id)
    }
}

#[derive(Debug, Clone)]
pub struct Planner {
    repo_root: PathBuf,
    tool: ToolProfile,
}

impl Planner {
    pub fn new(repo_root: PathBuf, tool: ToolProfile) -> Self {
        Self { repo_root, tool }
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    pub fn tool(&self) -> &ToolProfile {
        &self.tool
    }

    /// Plan every catalog case applicable to `surface`.
    pub fn plan_cases(&self, surface: Surface) -> Vec<PlannedCase> {
        cases_for(surface)
            .into_iter()
            .map(|case| self.plan(surface, case))
            .collect()
    }

    pub fn plan(&self, surface: Surface, case: Case) -> PlannedCase {
        match surface {
            Surface::Cli => self.plan_cli(case),
            Surface::Bash | Surface::Zsh => self.plan_shell(surface, case),
        }
    }

    fn plan_cli(&self, case: Case) -> PlannedCase {
        let script_rel = self.tool.script_rel(Surface::Cli);
        let script = self.repo_root.join(&script_rel);
        let mut argv = Vec::with_capacity(case.args.len() + 1);
        argv.push(script.display().to_string());
        argv.extend(case.args.iter().cloned());
        let display = format!(
            "{}{} {}",
            env_prefix(&case.env),
            rel_display(&script_rel),
            shell_join(&case.args)
        )
        .trim_end()
        .to_string();
        PlannedCase {
            surface: Surface::Cli,
            case,
            argv,
            display,
        }
    }

    fn plan_shell(&self, surface: Surface, case: Case) -> PlannedCase {
        let script = self.shell_script(surface, &case);
        let shell_argv: &[&str] = match surface {
            Surface::Bash => &["bash", "--noprofile", "--norc", "-c"],
            _ => &["zsh", "-f", "-c"],
        };
        let mut argv: Vec<String> = shell_argv.iter().map(|part| part.to_string()).collect();
        argv.push(script.clone());
        let display = format!(
            "{}{} {}",
            env_prefix(&case.env),
            shell_argv.join(" "),
            shell_words::quote(script.trim())
        );
        PlannedCase {
            surface,
            case,
            argv,
            display,
        }
    }

    /// Script text handed to the shell: prelude, source line, function call.
    fn shell_script(&self, surface: Surface, case: &Case) -> String {
        let mut lines = Vec::new();
        if let Some(prelude) = case.prelude.as_deref() {
            lines.push(prelude.to_string());
        }
        let source = rel_display(&self.tool.script_rel(surface));
        lines.push(format!("source {}", shell_words::quote(&source)));
        lines.push(
            format!("{} {}", self.tool.name(), shell_join(&case.args))
                .trim_end()
                .to_string(),
        );
        let mut script = lines.join("\n").trim_end().to_string();
        script.push('\n');
        script
    }
}

pub fn shell_join(parts: &[String]) -> String {
    shell_words::join(parts)
}

/// Sorted `KEY=value` prefix for display, with a trailing space.
pub fn env_prefix(env: &BTreeMap<String, String>) -> String {
    if env.is_empty() {
        return String::new();
    }
    let pairs: Vec<String> = env
        .iter()
        .map(|(key, value)| format!("{key}={}", shell_words::quote(value)))
        .collect();
    format!("{} ", pairs.join(" "))
}

fn rel_display(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
#[path = "plan_tests.rs"]
mod tests;
