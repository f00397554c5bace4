use super::*;
use crate::catalog::cases_for;
use crate::surface::ToolProfile;
use std::path::PathBuf;

fn planner() -> Planner {
    Planner::new(PathBuf::from("/repo"), ToolProfile::default())
}

fn case(surface: Surface, case_id: &str) -> Case {
    cases_for(surface)
        .into_iter()
        .find(|case| case.case_id == case_id)
        .unwrap_or_else(|| panic!("missing case {case_id}"))
}

fn configured() -> E2eConfig {
    let mut config = E2eConfig::disabled("CWS_E2E");
    config.public_repo = Some("octo/hello".to_string());
    config.private_repo = Some("octo/secret".to_string());
    config.codex_profile = Some("work".to_string());
    config.gpg_key_id = Some("ABCD1234".to_string());
    config
}

#[test]
fn compound_tunnel_placeholder_is_not_split() {
    let config = configured();
    let planned = materialize(&planner(), Surface::Zsh, &case(Surface::Zsh, "tunnel_named"), &config);
    assert_eq!(
        planned.case.args,
        vec!["tunnel", "ws-e2e-zsh", "--name", "ws-e2e-zsh-tunnel"]
    );
}

#[test]
fn workspace_names_are_isolated_per_surface() {
    let config = configured();
    let mut names = Vec::new();
    for surface in Surface::ALL {
        let planned = materialize(&planner(), surface, &case(surface, "exec_root"), &config);
        names.push(planned.case.args[2].clone());
    }
    assert_eq!(names, vec!["ws-e2e-cli", "ws-e2e-bash", "ws-e2e-zsh"]);
}

#[test]
fn flavors_qualify_repo_workspaces() {
    let config = configured();
    let reset = materialize(&planner(), Surface::Cli, &case(Surface::Cli, "reset_work_repos"), &config);
    assert_eq!(reset.case.args[2], "ws-e2e-cli-repo");
    let private = materialize(
        &planner(),
        Surface::Bash,
        &case(Surface::Bash, "reset_private_repo"),
        &config,
    );
    assert_eq!(private.case.args[2], "ws-e2e-bash-private");
}

#[test]
fn repository_tokens_substitute_inside_urls() {
    let config = configured();
    let planned = materialize(
        &planner(),
        Surface::Cli,
        &case(Surface::Cli, "create_seed_private_repo"),
        &config,
    );
    assert_eq!(
        planned.case.args,
        vec!["create", "--private-repo", "octo/secret", "octo/hello"]
    );
    let ssh = materialize(
        &planner(),
        Surface::Cli,
        &case(Surface::Cli, "create_public_ssh_scp_style"),
        &config,
    );
    assert_eq!(ssh.case.args[1], "git@github.com:octo/hello.git");
}

#[test]
fn unconfigured_values_stay_verbatim() {
    let config = E2eConfig::disabled("CWS_E2E");
    let planned = materialize(
        &planner(),
        Surface::Cli,
        &case(Surface::Cli, "create_public_https"),
        &config,
    );
    assert_eq!(planned.case.args[1], "https://github.com/OWNER/REPO");
    let codex = materialize(
        &planner(),
        Surface::Cli,
        &case(Surface::Cli, "auth_codex_profile"),
        &config,
    );
    assert_eq!(codex.case.args[3], "CODEX_PROFILE");
}

#[test]
fn exact_tokens_only_match_whole_arguments() {
    let substitutions = Substitutions::new(Surface::Cli, WorkspaceFlavor::Plain, &configured());
    assert_eq!(substitutions.apply("CODEX_PROFILE"), "work");
    assert_eq!(substitutions.apply("GPG_KEY_ID"), "ABCD1234");
    assert_eq!(substitutions.apply("my-CODEX_PROFILE"), "my-CODEX_PROFILE");
    assert_eq!(substitutions.apply("naïve"), "naïve");
}

#[test]
fn materialization_is_deterministic_and_replans() {
    let config = configured();
    let source = case(Surface::Bash, "auth_gpg_key");
    let first = materialize(&planner(), Surface::Bash, &source, &config);
    let second = materialize(&planner(), Surface::Bash, &source, &config);
    assert_eq!(first, second);
    assert!(first.argv[4].contains("cws auth gpg --key ABCD1234 ws-e2e-bash"));
    assert_eq!(source.args[3], "GPG_KEY_ID");
}
