//! Typed paths into the harness output layout.
//!
//! ```text
//! <out>/summary.jsonl
//! <out>/.lock
//! <out>/<surface>/<case>/{stdout.txt,stderr.txt,meta.json}
//! <out>/home, <out>/xdg/{config,cache,data,state}, <out>/tmp
//! <out>/stub/...
//! ```
use crate::config::AmbientEnv;
use crate::surface::Surface;
use anyhow::{Context, Result};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::OnceLock;

/// Output root relative to the repository root.
pub const DEFAULT_OUT_REL: &str = "out/tests/e2e";

/// XDG base directories isolated per run.
pub const XDG_KINDS: [&str; 4] = ["config", "cache", "data", "state"];

#[derive(Debug, Clone)]
pub struct HarnessPaths {
    root: PathBuf,
}

impl HarnessPaths {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Default layout for a repository: `<repo>/out/tests/e2e`.
    pub fn for_repo(repo_root: &Path) -> Self {
        Self::new(repo_root.join(DEFAULT_OUT_REL))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn summary_path(&self) -> PathBuf {
        self.root.join("summary.jsonl")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root.join(".lock")
    }

    pub fn surface_dir(&self, surface: Surface) -> PathBuf {
        self.root.join(surface.as_str())
    }

    pub fn case_dir(&self, surface: Surface, case_id: &str) -> PathBuf {
        self.surface_dir(surface).join(sanitize_case_id(case_id))
    }

    pub fn stdout_path(&self, surface: Surface, case_id: &str) -> PathBuf {
        self.case_dir(surface, case_id).join("stdout.txt")
    }

    pub fn stderr_path(&self, surface: Surface, case_id: &str) -> PathBuf {
        self.case_dir(surface, case_id).join("stderr.txt")
    }

    pub fn meta_path(&self, surface: Surface, case_id: &str) -> PathBuf {
        self.case_dir(surface, case_id).join("meta.json")
    }

    pub fn home_dir(&self) -> PathBuf {
        self.root.join("home")
    }

    pub fn xdg_dir(&self, kind: &str) -> PathBuf {
        self.root.join("xdg").join(kind)
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.root.join("tmp")
    }

    /// Scratch area for the stubbed-backend equivalence runs.
    pub fn stub_root(&self) -> PathBuf {
        self.root.join("stub")
    }

    /// Create the isolated home, XDG and temp directories.
    pub fn ensure_isolated_dirs(&self) -> Result<()> {
        let mut dirs = vec![self.home_dir(), self.tmp_dir()];
        dirs.extend(XDG_KINDS.iter().map(|kind| self.xdg_dir(kind)));
        for dir in dirs {
            fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
        }
        Ok(())
    }
}

/// Map runs of characters outside `[A-Za-z0-9._-]` to `_`.
pub fn sanitize_case_id(case_id: &str) -> String {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    let re = UNSAFE.get_or_init(|| Regex::new(r"[^a-zA-Z0-9._-]+").expect("valid regex"));
    re.replace_all(case_id, "_").into_owned()
}

/// Resolve the repository root the launcher scripts live in.
///
/// Order: explicit flag, `git rev-parse --show-toplevel`, `CODEX_HOME`, cwd.
/// The result is always absolute; children run with it as their cwd.
pub fn discover_repo_root(explicit: Option<&Path>, env: &AmbientEnv) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return canonical_root(path);
    }
    if let Some(toplevel) = git_toplevel() {
        return canonical_root(&toplevel);
    }
    if let Some(codex_home) = env.non_empty("CODEX_HOME") {
        return canonical_root(Path::new(codex_home));
    }
    let cwd = std::env::current_dir().context("resolve current directory")?;
    canonical_root(&cwd)
}

fn canonical_root(path: &Path) -> Result<PathBuf> {
    fs::canonicalize(path).with_context(|| format!("resolve repo root {}", path.display()))
}

fn git_toplevel() -> Option<PathBuf> {
    let output = Command::new("git")
        .args(["rev-parse", "--show-toplevel"])
        .stderr(Stdio::null())
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(PathBuf::from(trimmed))
}
