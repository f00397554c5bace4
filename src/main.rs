use anyhow::Result;
use clap::Parser;
use cws_e2e::cli::{
    Command, EquivalenceArgs, FlowArgs, GlobalArgs, PlanArgs, RootArgs, RunArgs, SummaryArgs,
};
use cws_e2e::config::{AmbientEnv, E2eConfig};
use cws_e2e::env::ChildEnv;
use cws_e2e::equivalence::{default_stub_bin, EquivalenceChecker};
use cws_e2e::exec::Executor;
use cws_e2e::lifecycle::{CaseOutcome, FlowOutcome, Harness};
use cws_e2e::paths::{discover_repo_root, HarnessPaths};
use cws_e2e::plan::{PlannedCase, Planner};
use cws_e2e::record::{CaseRecord, Recorder};
use cws_e2e::selection::CaseSelection;
use cws_e2e::summary::RunSummary;
use cws_e2e::surface::{Surface, ToolProfile};
use cws_e2e::util::display_path;
use std::path::PathBuf;
use std::process::ExitCode;

/// Everything a subcommand needs, resolved once at startup.
struct Session {
    ambient: AmbientEnv,
    repo_root: PathBuf,
    tool: ToolProfile,
    paths: HarnessPaths,
    config: E2eConfig,
}

impl Session {
    fn resolve(global: &GlobalArgs) -> Result<Self> {
        let ambient = AmbientEnv::capture();
        let repo_root = discover_repo_root(global.repo_root.as_deref(), &ambient)?;
        let tool = ToolProfile::new(global.tool.as_str(), global.env_prefix.as_str());
        let paths = match &global.out_dir {
            Some(dir) => HarnessPaths::new(dir.clone()),
            None => HarnessPaths::for_repo(&repo_root),
        };
        let config = E2eConfig::from_env(&global.env_prefix, &ambient)?;
        tracing::debug!(
            repo_root = %repo_root.display(),
            out = %paths.root().display(),
            enabled = config.enabled,
            "resolved session"
        );
        Ok(Self {
            ambient,
            repo_root,
            tool,
            paths,
            config,
        })
    }

    fn planner(&self) -> Planner {
        Planner::new(self.repo_root.clone(), self.tool.clone())
    }

    fn harness(&self, config: E2eConfig) -> Result<Harness<Executor>> {
        let env = ChildEnv::compose(
            &self.ambient,
            &config,
            &self.tool,
            &self.repo_root,
            &self.paths,
        )?;
        let executor = Executor::new(
            self.repo_root.clone(),
            self.paths.clone(),
            config.batch_timeout,
        );
        let recorder = Recorder::new(self.paths.clone());
        Ok(Harness::new(executor, self.planner(), config, env, recorder))
    }
}

fn main() -> Result<ExitCode> {
    let args = RootArgs::parse();
    init_logging(args.global.verbose);
    let session = Session::resolve(&args.global)?;

    match args.command {
        Command::Plan(args) => cmd_plan(&session, args),
        Command::Run(args) => cmd_run(&session, args),
        Command::Flow(args) => cmd_flow(&session, args),
        Command::Equivalence(args) => cmd_equivalence(&session, args),
        Command::Summary(args) => cmd_summary(&session, args),
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_plan(session: &Session, args: PlanArgs) -> Result<ExitCode> {
    let planned = session.planner().plan_cases(args.surface);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&planned)?);
        return Ok(ExitCode::SUCCESS);
    }
    for case in &planned {
        println!("{}\t{}", case.qualified_id(), case.display);
        println!("\t{}", case.case.purpose);
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_run(session: &Session, args: RunArgs) -> Result<ExitCode> {
    let mut config = session.config.clone();
    if let Some(raw) = args.case.as_deref() {
        config.case_selection = CaseSelection::parse(raw)?;
    }
    let surfaces = match args.surface {
        Some(surface) => vec![surface],
        None => Surface::ALL.to_vec(),
    };
    let planner = session.planner();
    let planned: Vec<PlannedCase> = surfaces
        .into_iter()
        .flat_map(|surface| planner.plan_cases(surface))
        .collect();
    let selected = config
        .case_selection
        .apply(planned, config.full, config.allow_rm_all)?;
    if selected.is_empty() {
        println!(
            "no cases selected (set {} or {})",
            config.var("CASE"),
            config.var("FULL")
        );
        return Ok(ExitCode::SUCCESS);
    }

    let mut harness = session.harness(config)?;
    let mut failures = 0;
    for planned in &selected {
        let id = planned.qualified_id();
        match harness.run_case(planned) {
            Ok(CaseOutcome::Passed(record)) => {
                println!("PASS {id} ({} ms)", record.duration_ms);
            }
            Ok(CaseOutcome::Skipped(skip)) => println!("SKIP {id}: {skip}"),
            Err(err) => {
                failures += 1;
                println!("FAIL {id}: {err:#}");
            }
        }
    }
    println!(
        "{} case(s), {failures} failed; records in {}",
        selected.len(),
        display_path(&session.paths.summary_path(), Some(&session.repo_root))
    );
    Ok(exit_for(failures))
}

fn cmd_flow(session: &Session, args: FlowArgs) -> Result<ExitCode> {
    let mut harness = session.harness(session.config.clone())?;
    match harness.run_flow(args.surface)? {
        FlowOutcome::Completed(steps) => print_steps(&steps),
        FlowOutcome::Skipped { completed, skip } => {
            print_steps(&completed);
            println!("SKIP {}: {skip}", args.surface);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn print_steps(steps: &[CaseRecord]) {
    for step in steps {
        let status = if step.passed { "PASS" } else { "FAIL" };
        println!(
            "{status} {}:{} (exit {}, {} ms)",
            step.surface, step.case_id, step.exit_code, step.duration_ms
        );
    }
}

fn cmd_equivalence(session: &Session, args: EquivalenceArgs) -> Result<ExitCode> {
    let surfaces = match args.surface {
        Some(surface) => vec![surface],
        None => vec![Surface::Bash, Surface::Zsh],
    };
    let stub_bin = args
        .stub_bin
        .unwrap_or_else(|| default_stub_bin(&session.repo_root));
    let mut checker =
        EquivalenceChecker::new(session.planner(), &session.ambient, &session.paths, &stub_bin)?;

    let mut mismatches = 0;
    for surface in surfaces {
        let shell = surface.as_str();
        if surface.is_shell() && which::which(shell).is_err() {
            println!("SKIP {surface}: {shell} not found on PATH");
            continue;
        }
        let report = checker.check_surface(surface)?;
        for case in &report.cases {
            if case.is_equivalent() {
                println!("OK   {surface}:{}", case.case_id);
            } else {
                mismatches += 1;
                println!(
                    "DIFF {surface}:{} vs {}:{}\n  expected: {:?}\n  actual:   {:?}",
                    case.case_id,
                    Surface::Cli,
                    case.counterpart_id,
                    case.expected,
                    case.actual
                );
            }
        }
    }
    Ok(exit_for(mismatches))
}

fn cmd_summary(session: &Session, args: SummaryArgs) -> Result<ExitCode> {
    let summary = RunSummary::load(&session.paths.summary_path())?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", summary.to_markdown());
    }
    Ok(exit_for(summary.failed()))
}

fn exit_for(failures: usize) -> ExitCode {
    if failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
