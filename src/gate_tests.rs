use super::*;
use crate::catalog::cases_for;
use crate::surface::Surface;

fn case(case_id: &str) -> Case {
    cases_for(Surface::Cli)
        .into_iter()
        .find(|case| case.case_id == case_id)
        .unwrap_or_else(|| panic!("missing case {case_id}"))
}

fn enabled() -> E2eConfig {
    let mut config = E2eConfig::disabled("CWS_E2E");
    config.enabled = true;
    config
}

fn skip_reason(case_id: &str, config: &E2eConfig) -> Option<SkipReason> {
    match decide(&case(case_id), config, BackendStatus::Available) {
        Verdict::Proceed => None,
        Verdict::Skip(skip) => Some(skip.reason),
    }
}

#[test]
fn unavailable_backend_skips_everything() {
    let config = enabled();
    for case in cases_for(Surface::Bash) {
        let verdict = decide(&case, &config, BackendStatus::Unavailable);
        assert_eq!(verdict, Verdict::Skip(Skip::backend_unavailable()));
    }
}

#[test]
fn help_cases_ignore_feature_toggles() {
    let config = enabled();
    for case_id in ["help", "help_exec", "help_tunnel", "help_rm", "help_auth"] {
        assert_eq!(skip_reason(case_id, &config), None, "{case_id}");
    }
}

#[test]
fn tunnel_cases_are_gated_by_toggle() {
    let mut config = enabled();
    for case_id in ["tunnel_foreground", "tunnel_detach", "tunnel_named"] {
        assert_eq!(
            skip_reason(case_id, &config),
            Some(SkipReason::TunnelDisabled)
        );
    }
    config.enable_tunnel = true;
    assert_eq!(skip_reason("tunnel_named", &config), None);
    assert_eq!(skip_reason("tunnel_foreground", &config), None);
}

#[test]
fn rm_all_requires_explicit_allowance() {
    let mut config = enabled();
    let verdict = decide(&case("rm_all_yes"), &config, BackendStatus::Available);
    let Verdict::Skip(skip) = verdict else {
        panic!("rm --all should be skipped");
    };
    assert_eq!(skip.reason, SkipReason::RmAllNotAllowed);
    assert_eq!(skip.message, "rm --all disabled (set CWS_E2E_ALLOW_RM_ALL=1).");

    config.allow_rm_all = true;
    assert_eq!(skip_reason("rm_all_yes", &config), None);
    assert_eq!(skip_reason("rm_workspace_yes", &enabled()), None);
}

#[test]
fn auth_checks_run_in_order() {
    let mut config = enabled();
    assert_eq!(
        skip_reason("auth_codex_profile", &config),
        Some(SkipReason::AuthDisabled)
    );
    config.enable_auth = true;
    assert_eq!(
        skip_reason("auth_codex_profile", &config),
        Some(SkipReason::CodexDisabled)
    );
    config.enable_codex = true;
    assert_eq!(
        skip_reason("auth_codex_profile", &config),
        Some(SkipReason::CodexProfileMissing)
    );
    config.codex_profile = Some("work".to_string());
    assert_eq!(skip_reason("auth_codex_profile", &config), None);

    assert_eq!(skip_reason("auth_gpg_key", &config), Some(SkipReason::GpgDisabled));
    config.enable_gpg = true;
    assert_eq!(skip_reason("auth_gpg_key", &config), Some(SkipReason::GpgKeyMissing));
    config.gpg_key_id = Some("ABCD".to_string());
    assert_eq!(skip_reason("auth_gpg_key", &config), None);
    assert_eq!(skip_reason("auth_github", &config), None);
}

#[test]
fn repo_requirements_name_the_variable_to_set() {
    let config = enabled();
    let Verdict::Skip(skip) = decide(&case("reset_private_repo"), &config, BackendStatus::Available)
    else {
        panic!("private repo reset should be skipped");
    };
    assert_eq!(skip.reason, SkipReason::PrivateRepoMissing);
    assert!(skip.message.contains("CWS_E2E_PRIVATE_REPO"));

    assert_eq!(
        skip_reason("exec_command", &config),
        Some(SkipReason::PublicRepoMissing)
    );
    assert_eq!(
        skip_reason("create_public_https", &config),
        Some(SkipReason::PublicRepoMissing)
    );
    assert_eq!(skip_reason("exec_root", &config), None);
}

#[test]
fn ssh_creates_need_their_toggle_before_repo_checks() {
    let mut config = enabled();
    assert_eq!(
        skip_reason("create_public_ssh_scp_style", &config),
        Some(SkipReason::SshDisabled)
    );
    config.enable_ssh = true;
    config.public_repo = Some("octo/hello".to_string());
    assert_eq!(skip_reason("create_public_ssh_scp_style", &config), None);
}

#[test]
fn exec_shell_is_opt_in() {
    let mut config = enabled();
    assert_eq!(
        skip_reason("exec_shell", &config),
        Some(SkipReason::ExecShellDisabled)
    );
    config.enable_exec_shell = true;
    assert_eq!(skip_reason("exec_shell", &config), None);
}

#[test]
fn messages_follow_the_configured_prefix() {
    let mut config = E2eConfig::disabled("AWS_E2E");
    config.enabled = true;
    let Verdict::Skip(skip) = decide(&case("tunnel_detach"), &config, BackendStatus::Available)
    else {
        panic!("tunnel should be skipped");
    };
    assert_eq!(skip.message, "Tunnel cases disabled (set AWS_E2E_ENABLE_TUNNEL=1).");
    assert_eq!(
        Skip::harness_disabled(&config).message,
        "AWS_E2E is not enabled (set AWS_E2E=1 to run real Docker e2e)."
    );
}
