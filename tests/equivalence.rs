//! Shell wrappers must hand the backend exactly what the direct CLI does.

mod common;

use common::{have, LauncherRepo};
use cws_e2e::config::AmbientEnv;
use cws_e2e::equivalence::EquivalenceChecker;
use cws_e2e::paths::HarnessPaths;
use cws_e2e::plan::Planner;
use cws_e2e::surface::{Surface, ToolProfile};

fn checker(repo: &LauncherRepo) -> EquivalenceChecker {
    let planner = Planner::new(repo.root().to_path_buf(), ToolProfile::default());
    let ambient = AmbientEnv::from_pairs([("PATH", std::env::var("PATH").unwrap_or_default())]);
    EquivalenceChecker::new(
        planner,
        &ambient,
        &HarnessPaths::new(repo.out_dir()),
        &repo.stub_bin(),
    )
    .expect("checker")
}

fn assert_clean(surface: Surface) {
    let repo = LauncherRepo::setup();
    let mut checker = checker(&repo);
    let report = checker.check_surface(surface).expect("check");

    let planned = Planner::new(repo.root().to_path_buf(), ToolProfile::default())
        .plan_cases(surface)
        .len();
    assert_eq!(report.cases.len(), planned);
    let diffs: Vec<_> = report.mismatches().map(|case| &case.case_id).collect();
    assert!(diffs.is_empty(), "{surface} mismatches: {diffs:?}");
}

#[test]
fn bash_wrapper_matches_direct_cli() {
    if !have("bash") {
        return;
    }
    assert_clean(Surface::Bash);
}

#[test]
fn zsh_wrapper_matches_direct_cli() {
    if !have("bash") || !have("zsh") {
        return;
    }
    assert_clean(Surface::Zsh);
}

#[test]
fn array_docker_args_match_the_string_form() {
    if !have("bash") {
        return;
    }
    let repo = LauncherRepo::setup();
    let report = checker(&repo).check_surface(Surface::Bash).expect("check");
    let array = report
        .cases
        .iter()
        .find(|case| case.case_id == "env_docker_args_array")
        .expect("array case");
    assert_eq!(array.counterpart_id, "env_docker_args_string");
    assert!(array.is_equivalent());
    assert!(array.actual.windows(2).any(|pair| pair == ["-e", "FOO=bar"]));
}

#[test]
fn dropped_array_args_are_reported() {
    if !have("bash") {
        return;
    }
    let repo = LauncherRepo::without_array_support();
    let report = checker(&repo).check_surface(Surface::Bash).expect("check");
    let diffs: Vec<&str> = report
        .mismatches()
        .map(|case| case.case_id.as_str())
        .collect();
    assert_eq!(diffs, vec!["env_docker_args_array"]);
    assert!(!report.is_clean());
}

#[test]
fn stub_runs_are_recorded_under_the_stub_root() {
    if !have("bash") {
        return;
    }
    let repo = LauncherRepo::setup();
    checker(&repo).check_surface(Surface::Bash).expect("check");
    let stdout = repo.out_dir().join("stub/bash/ls/stdout.txt");
    let text = std::fs::read_to_string(&stdout).expect("stub stdout");
    assert!(text.starts_with("docker\n"));
    assert!(repo.out_dir().join("stub/cli/ls/stdout.txt").is_file());
}
