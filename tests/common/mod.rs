//! Shared test infrastructure for integration tests.
//!
//! A fixture is a throwaway launcher repository: `scripts/cws.bash` (sourced
//! by bash, executed directly by the cli surface), `scripts/cws.zsh`, and a
//! stub `docker` under `tests/stubs/bin` that echoes what it receives.

use std::env;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const BASH_WRAPPER: &str = r#"#!/usr/bin/env bash
cws() {
  local -a extra=()
  if [[ "$(declare -p CWS_DOCKER_ARGS 2>/dev/null)" == "declare -a"* ]]; then
    extra=("${CWS_DOCKER_ARGS[@]}")
  elif [[ -n "${CWS_DOCKER_ARGS:-}" ]]; then
    read -r -a extra <<<"$CWS_DOCKER_ARGS"
  fi
  docker run --rm "${extra[@]}" -e "CWS_AUTH=${CWS_AUTH:-}" "${CWS_IMAGE:-unset}" "$@"
}

if [[ "${BASH_SOURCE[0]}" == "$0" ]]; then
  cws "$@"
fi
"#;

/// Same wrapper, but the array form of `CWS_DOCKER_ARGS` is ignored.
const BASH_WRAPPER_NO_ARRAY: &str = r#"#!/usr/bin/env bash
cws() {
  local -a extra=()
  if [[ "$(declare -p CWS_DOCKER_ARGS 2>/dev/null)" == "declare -x"* ]]; then
    read -r -a extra <<<"$CWS_DOCKER_ARGS"
  fi
  docker run --rm "${extra[@]}" -e "CWS_AUTH=${CWS_AUTH:-}" "${CWS_IMAGE:-unset}" "$@"
}

if [[ "${BASH_SOURCE[0]}" == "$0" ]]; then
  cws "$@"
fi
"#;

const ZSH_WRAPPER: &str = r#"cws() {
  local -a extra
  extra=()
  if [[ ${(t)CWS_DOCKER_ARGS} == array* ]]; then
    extra=("${CWS_DOCKER_ARGS[@]}")
  elif [[ -n ${CWS_DOCKER_ARGS:-} ]]; then
    extra=(${=CWS_DOCKER_ARGS})
  fi
  docker run --rm "${extra[@]}" -e "CWS_AUTH=${CWS_AUTH:-}" "${CWS_IMAGE:-unset}" "$@"
}
"#;

const STUB_DOCKER: &str = r#"#!/bin/sh
echo docker
for arg in "$@"; do
  printf '%s\n' "$arg"
done
"#;

pub struct LauncherRepo {
    temp: TempDir,
}

impl LauncherRepo {
    pub fn setup() -> Self {
        Self::with_bash_wrapper(BASH_WRAPPER)
    }

    /// A repo whose bash wrapper drops array-form docker args.
    #[allow(dead_code)]
    pub fn without_array_support() -> Self {
        Self::with_bash_wrapper(BASH_WRAPPER_NO_ARRAY)
    }

    fn with_bash_wrapper(bash: &str) -> Self {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        write_executable(&root.join("scripts/cws.bash"), bash);
        write_executable(&root.join("scripts/cws.zsh"), ZSH_WRAPPER);
        write_executable(&root.join("tests/stubs/bin/docker"), STUB_DOCKER);
        Self { temp }
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn stub_bin(&self) -> PathBuf {
        self.root().join("tests/stubs/bin")
    }

    pub fn out_dir(&self) -> PathBuf {
        self.root().join("out/tests/e2e")
    }

    /// Host `PATH` with the stub backend first.
    #[allow(dead_code)]
    pub fn path_with_stubs(&self) -> String {
        let host = env::var("PATH").unwrap_or_else(|_| "/usr/bin:/bin".into());
        format!("{}:{host}", self.stub_bin().display())
    }
}

/// Whether an interpreter needed by a surface is installed.
#[allow(dead_code)]
pub fn have(program: &str) -> bool {
    let found = which::which(program).is_ok();
    if !found {
        eprintln!("Skipping: {program} not available");
    }
    found
}

fn write_executable(path: &Path, text: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create fixture dir");
    }
    fs::write(path, text).expect("write fixture script");
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).expect("chmod fixture script");
}
