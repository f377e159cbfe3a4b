//! `panel-sim` - run synthetic research panels from the command line

mod settings;

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use panel_core::{validate_request, RunStatus, SimulationOrchestrator, TargetShape};
use panel_provider::OpenAiCompatibleService;
use settings::{RunRequest, Settings};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    let request_arg = Arg::new("request")
        .long("request")
        .short('r')
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("JSON file with business_context, stakeholder_groups and optional config");
    let config_arg = Arg::new("config")
        .long("config")
        .short('c')
        .value_parser(value_parser!(PathBuf))
        .help("TOML settings file with [engine], [simulation] and [provider] tables");

    Command::new("panel-sim")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Synthetic customer-research panel simulator")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("run")
                .about("Generate personas and simulate interviews")
                .arg(request_arg.clone())
                .arg(config_arg.clone())
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .value_parser(value_parser!(PathBuf))
                        .help("Write the run record here instead of stdout"),
                )
                .arg(
                    Arg::new("poll-secs")
                        .long("poll-secs")
                        .default_value("2")
                        .value_parser(value_parser!(u64))
                        .help("Seconds between progress log lines"),
                ),
        )
        .subcommand(
            Command::new("validate")
                .about("Check a request without calling the model")
                .arg(request_arg)
                .arg(config_arg),
        )
        .subcommand(Command::new("schema").about("Print the JSON schemas the model must follow"))
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("json-logs"));

    match matches.subcommand() {
        Some(("run", args)) => {
            let status = run(args).await?;
            std::process::exit(match status {
                RunStatus::Completed => 0,
                RunStatus::Cancelled => 130,
                _ => 1,
            });
        }
        Some(("validate", args)) => validate(args),
        Some(("schema", _)) => schema(),
        _ => Ok(()),
    }
}

fn load_inputs(args: &ArgMatches) -> anyhow::Result<(RunRequest, Settings)> {
    let settings = Settings::load(args.get_one::<PathBuf>("config").map(PathBuf::as_path))?;
    let request_path = args
        .get_one::<PathBuf>("request")
        .context("--request is required")?;
    let request = RunRequest::load(request_path)?;
    Ok((request, settings))
}

async fn run(args: &ArgMatches) -> anyhow::Result<RunStatus> {
    let (request, settings) = load_inputs(args)?;
    let config = request.effective_config(&settings);
    let poll = Duration::from_secs(args.get_one::<u64>("poll-secs").copied().unwrap_or(2).max(1));

    let service = OpenAiCompatibleService::from_config(settings.provider.clone())
        .context("configuring provider")?;
    tracing::info!(
        model = %settings.provider.model,
        endpoint = %settings.provider.completions_url(),
        "provider ready"
    );

    let orchestrator = SimulationOrchestrator::new(Arc::new(service), settings.engine);
    let run_id = orchestrator.start(request.business_context, request.stakeholder_groups, config);
    tracing::info!(%run_id, "run started");

    let waiter = orchestrator.wait(run_id);
    tokio::pin!(waiter);
    let mut ticker = tokio::time::interval(poll);
    let mut cancel_sent = false;

    let result = loop {
        tokio::select! {
            result = &mut waiter => break result?,
            signal = tokio::signal::ctrl_c(), if !cancel_sent => {
                signal.context("listening for Ctrl-C")?;
                cancel_sent = true;
                if orchestrator.cancel(run_id) {
                    tracing::warn!("cancellation requested, letting in-flight interviews finish");
                }
            }
            _ = ticker.tick() => {
                if let Ok(p) = orchestrator.get_progress(run_id) {
                    tracing::info!(
                        stage = ?p.stage,
                        percent = %format!("{:.0}", p.percentage),
                        personas = %format!("{}/{}", p.completed_personas, p.total_personas),
                        interviews = %format!("{}/{}", p.completed_interviews, p.total_interviews),
                        eta_secs = p.estimated_time_remaining.map(|d| d.as_secs()),
                        "{}",
                        p.current_task
                    );
                }
            }
        }
    };

    let rendered = serde_json::to_string_pretty(&result)?;
    match args.get_one::<PathBuf>("output") {
        Some(path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("writing {}", path.display()))?;
            tracing::info!(path = %path.display(), "run record written");
        }
        None => println!("{rendered}"),
    }

    tracing::info!(
        status = %result.status,
        personas = result.personas.len(),
        interviews = result.interviews.len(),
        failed_groups = result.failed_groups().len(),
        failed_interviews = result.interview_errors().count(),
        warnings = result.warnings.len(),
        "run finished"
    );
    Ok(result.status)
}

fn validate(args: &ArgMatches) -> anyhow::Result<()> {
    let (request, settings) = load_inputs(args)?;
    let config = request.effective_config(&settings);
    validate_request(&request.business_context, &request.stakeholder_groups, &config)?;

    let planned = request.stakeholder_groups.len() * config.people_per_stakeholder;
    println!(
        "request ok: {} group(s), {} persona(s) and as many interviews planned",
        request.stakeholder_groups.len(),
        planned
    );
    Ok(())
}

fn schema() -> anyhow::Result<()> {
    let schemas = serde_json::json!({
        "persona_list": TargetShape::PersonaList { count: 1 }.json_schema(),
        "interview": TargetShape::Interview { questions: 1 }.json_schema(),
    });
    println!("{}", serde_json::to_string_pretty(&schemas)?);
    Ok(())
}
