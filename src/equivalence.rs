//! Cross-surface behavioral equivalence against a stubbed container backend.
//!
//! The stub `docker` prints a `docker` sentinel line followed by one received
//! argument per line. A shell-surface case is equivalent when the arguments
//! its wrapper hands to the backend match those of the direct surface.
use crate::config::{AmbientEnv, E2eConfig};
use crate::env::ChildEnv;
use crate::exec::Executor;
use crate::paths::HarnessPaths;
use crate::plan::{PlannedCase, Planner};
use crate::surface::Surface;
use crate::util::tail_string;
use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Stub binaries relative to the repository root.
pub const DEFAULT_STUB_BIN_REL: &str = "tests/stubs/bin";
pub const STUB_IMAGE: &str = "graysurf/codex-workspace-launcher:latest";
const SENTINEL: &str = "docker";
const OUTPUT_TAIL_BYTES: usize = 4096;

/// Launcher variables that would change wrapper behavior if inherited.
const LEAKY_LAUNCHER_VARS: [&str; 2] = ["BASH_PATH", "DOCKER_ARGS"];
const TOKEN_VARS: [&str; 2] = ["GH_TOKEN", "GITHUB_TOKEN"];

/// Direct-surface case a shell case is compared against.
pub fn counterpart_id(case_id: &str) -> &str {
    match case_id {
        "env_docker_args_array" => "env_docker_args_string",
        other => other,
    }
}

/// Arguments received by the stub backend, i.e. every line after the sentinel.
pub fn parse_stub_argv(stdout: &str) -> Result<Vec<String>> {
    let lines: Vec<&str> = stdout.lines().collect();
    let idx = lines
        .iter()
        .position(|line| *line == SENTINEL)
        .ok_or_else(|| anyhow!("stubbed docker output missing '{SENTINEL}' sentinel:\n{stdout}"))?;
    Ok(lines[idx + 1..].iter().map(|line| line.to_string()).collect())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseEquivalence {
    pub surface: Surface,
    pub case_id: String,
    pub counterpart_id: String,
    pub expected: Vec<String>,
    pub actual: Vec<String>,
}

impl CaseEquivalence {
    pub fn is_equivalent(&self) -> bool {
        self.expected == self.actual
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EquivalenceReport {
    pub cases: Vec<CaseEquivalence>,
}

impl EquivalenceReport {
    pub fn mismatches(&self) -> impl Iterator<Item = &CaseEquivalence> {
        self.cases.iter().filter(|case| !case.is_equivalent())
    }

    pub fn is_clean(&self) -> bool {
        self.mismatches().next().is_none()
    }
}

pub struct EquivalenceChecker {
    planner: Planner,
    executor: Executor,
    env: ChildEnv,
    /// Direct-surface results, shared across shell surfaces.
    direct: BTreeMap<String, Vec<String>>,
}

impl EquivalenceChecker {
    /// Build a checker whose runs see `stub_bin` first on `PATH` and keep
    /// their home, XDG and temp directories under `<out>/stub`.
    pub fn new(
        planner: Planner,
        ambient: &AmbientEnv,
        paths: &HarnessPaths,
        stub_bin: &Path,
    ) -> Result<Self> {
        let stub_paths = HarnessPaths::new(paths.stub_root());
        let env = stub_env(&planner, ambient, &stub_paths, stub_bin)?;
        let executor = Executor::new(planner.repo_root().to_path_buf(), stub_paths, None);
        Ok(Self {
            planner,
            executor,
            env,
            direct: BTreeMap::new(),
        })
    }

    /// Compare every planned case of a shell surface with its direct
    /// counterpart.
    pub fn check_surface(&mut self, surface: Surface) -> Result<EquivalenceReport> {
        if !surface.is_shell() {
            bail!("equivalence compares shell surfaces against {}", Surface::Cli);
        }
        let direct: BTreeMap<String, PlannedCase> = self
            .planner
            .plan_cases(Surface::Cli)
            .into_iter()
            .map(|planned| (planned.case.case_id.clone(), planned))
            .collect();

        let mut report = EquivalenceReport::default();
        for planned in self.planner.plan_cases(surface) {
            let counterpart = counterpart_id(&planned.case.case_id).to_string();
            let expected = match self.direct.get(&counterpart) {
                Some(argv) => argv.clone(),
                None => {
                    let cli = direct.get(&counterpart).ok_or_else(|| {
                        anyhow!(
                            "no {} counterpart for {}",
                            Surface::Cli,
                            planned.qualified_id()
                        )
                    })?;
                    let argv = self.stub_argv(cli)?;
                    self.direct.insert(counterpart.clone(), argv.clone());
                    argv
                }
            };
            let actual = self.stub_argv(&planned)?;
            let outcome = CaseEquivalence {
                surface,
                case_id: planned.case.case_id.clone(),
                counterpart_id: counterpart,
                expected,
                actual,
            };
            if outcome.is_equivalent() {
                tracing::debug!(surface = %surface, case_id = %outcome.case_id, "equivalent");
            } else {
                tracing::warn!(
                    surface = %surface,
                    case_id = %outcome.case_id,
                    expected = ?outcome.expected,
                    actual = ?outcome.actual,
                    "backend arguments differ"
                );
            }
            report.cases.push(outcome);
        }
        Ok(report)
    }

    fn stub_argv(&self, planned: &PlannedCase) -> Result<Vec<String>> {
        let env = self.env.with_overrides(&planned.case.env);
        let result = self.executor.run_batch(planned, &env, None)?;
        if result.exit_code != 0 {
            let combined = format!("{}\n{}", result.stdout.trim(), result.stderr.trim());
            bail!(
                "{} failed (exit {})\n{}",
                planned.qualified_id(),
                result.exit_code,
                tail_string(combined.trim(), OUTPUT_TAIL_BYTES)
            );
        }
        parse_stub_argv(&result.stdout).with_context(|| planned.qualified_id())
    }
}

/// Default location of the stub binaries for a repository.
pub fn default_stub_bin(repo_root: &Path) -> PathBuf {
    repo_root.join(DEFAULT_STUB_BIN_REL)
}

fn stub_env(
    planner: &Planner,
    ambient: &AmbientEnv,
    paths: &HarnessPaths,
    stub_bin: &Path,
) -> Result<ChildEnv> {
    let tool = planner.tool();
    // Stub runs never need the gated toggles; GPG stays disabled.
    let config = E2eConfig::disabled(tool.env_prefix());
    let mut env = ChildEnv::compose(ambient, &config, tool, planner.repo_root(), paths)?;

    let path = match ambient.non_empty("PATH") {
        Some(rest) => format!("{}:{rest}", stub_bin.display()),
        None => stub_bin.display().to_string(),
    };
    env.set("PATH", path);
    for suffix in LEAKY_LAUNCHER_VARS {
        env.remove(&tool.launcher_var(suffix));
    }
    for var in TOKEN_VARS {
        env.remove(var);
    }
    env.set(tool.launcher_var("AUTH"), "env");
    env.set(tool.launcher_var("IMAGE"), STUB_IMAGE);
    env.set("CODEX_WORKSPACE_GPG", "none");
    env.set("CODEX_WORKSPACE_GPG_KEY", "");
    Ok(env)
}
