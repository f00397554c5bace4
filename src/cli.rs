//! CLI argument parsing for the e2e harness.
use crate::surface::Surface;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "cws-e2e",
    version,
    about = "End-to-end scenario planner and harness for workspace launcher CLIs",
    after_help = "Commands:\n  plan --surface <s>         Print planned cases for a surface\n  run [--surface <s>]        Gate, execute and record selected cases\n  flow --surface <s>         Run the multi-step lifecycle flow\n  equivalence                Compare shell wrappers against the direct CLI\n  summary                    Aggregate summary.jsonl per surface\n\nExamples:\n  cws-e2e plan --surface zsh\n  CWS_E2E=1 cws-e2e run --surface cli --case ls,exec_root\n  CWS_E2E=1 CWS_E2E_PUBLIC_REPO=octo/hello cws-e2e flow --surface cli\n  cws-e2e equivalence --surface bash\n  cws-e2e summary --json",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every subcommand.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Repository root holding the launcher scripts
    #[arg(long, value_name = "DIR", global = true)]
    pub repo_root: Option<PathBuf>,

    /// Output root (default: <repo>/out/tests/e2e)
    #[arg(long, value_name = "DIR", global = true)]
    pub out_dir: Option<PathBuf>,

    /// Launcher function name
    #[arg(long, value_name = "NAME", global = true, default_value = "cws")]
    pub tool: String,

    /// Prefix of the harness environment toggles
    #[arg(long, value_name = "PREFIX", global = true, default_value = "CWS_E2E")]
    pub env_prefix: String,

    /// Log debug detail to stderr
    #[arg(long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Plan(PlanArgs),
    Run(RunArgs),
    Flow(FlowArgs),
    Equivalence(EquivalenceArgs),
    Summary(SummaryArgs),
}

#[derive(Parser, Debug)]
#[command(about = "Print the planned invocation of every case on a surface")]
pub struct PlanArgs {
    #[arg(long, value_enum)]
    pub surface: Surface,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Gate, execute and record catalog cases")]
pub struct RunArgs {
    /// Restrict to one surface (default: all)
    #[arg(long, value_enum)]
    pub surface: Option<Surface>,

    /// Comma-separated case ids, optionally `surface:id`; overrides <PREFIX>_CASE
    #[arg(long, value_name = "IDS")]
    pub case: Option<String>,
}

#[derive(Parser, Debug)]
#[command(about = "Run the multi-step lifecycle flow on one surface")]
pub struct FlowArgs {
    #[arg(long, value_enum)]
    pub surface: Surface,
}

#[derive(Parser, Debug)]
#[command(about = "Compare shell-wrapper backend arguments against the direct CLI")]
pub struct EquivalenceArgs {
    /// Shell surface to check (default: bash and zsh)
    #[arg(long, value_enum)]
    pub surface: Option<Surface>,

    /// Directory holding the stub `docker` (default: <repo>/tests/stubs/bin)
    #[arg(long, value_name = "DIR")]
    pub stub_bin: Option<PathBuf>,
}

#[derive(Parser, Debug)]
#[command(about = "Summarize recorded executions per surface")]
pub struct SummaryArgs {
    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_flags_apply_after_the_subcommand() {
        let args = RootArgs::try_parse_from([
            "cws-e2e",
            "run",
            "--surface",
            "zsh",
            "--case",
            "ls",
            "--tool",
            "awl",
            "--env-prefix",
            "AWS_E2E",
        ])
        .expect("parse");
        assert_eq!(args.global.tool, "awl");
        assert_eq!(args.global.env_prefix, "AWS_E2E");
        let Command::Run(run) = args.command else {
            panic!("expected run");
        };
        assert_eq!(run.surface, Some(Surface::Zsh));
        assert_eq!(run.case.as_deref(), Some("ls"));
    }

    #[test]
    fn plan_requires_a_surface() {
        assert!(RootArgs::try_parse_from(["cws-e2e", "plan"]).is_err());
        let args =
            RootArgs::try_parse_from(["cws-e2e", "plan", "--surface", "cli", "--json"]).expect("parse");
        assert!(matches!(args.command, Command::Plan(PlanArgs { json: true, .. })));
    }

    #[test]
    fn command_definition_is_consistent() {
        use clap::CommandFactory;
        RootArgs::command().debug_assert();
    }
}
