use std::fs;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use log::info;
use photobatch_core::ReconstructionEngine;
use photobatch_core::test_utils::RecordingEngine;
use photobatch_pipeline::session::ReconstructionSession;
use photobatch_pipeline::{
    LogSink, PipelineConfig, RunReport, SaveTarget, StepReport, format_units, run_finish,
    run_select_folder, run_stage2, step_build_mesh,
};

mod engine;

use engine::CommandEngine;

/// Batch photogrammetry over paired `<name>_2` / `<name>_1` photo folders.
#[derive(Debug, Parser)]
#[command(author, version, about = "Two-stage batch reconstruction and texturing")]
struct Args {
    /// Session file carried from Stage 1 to Stage 2.
    #[arg(long, global = true, default_value = "photobatch-session.json")]
    session: PathBuf,

    /// Optional path to a JSON PipelineConfig. Defaults are used if omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Engine executable, run once per engine call.
    #[arg(long, global = true)]
    engine: Option<PathBuf>,

    /// Extra argument passed to the engine before the operation name.
    #[arg(long = "engine-arg", global = true, allow_hyphen_values = true)]
    engine_args: Vec<String>,

    /// Rehearse with a recording engine that writes placeholder artifacts.
    #[arg(long, global = true, conflicts_with = "engine")]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Discover units under ROOT, run Stage 1 and choose the project file.
    SelectFolder {
        root: PathBuf,
        /// Project file; asked for interactively if omitted.
        #[arg(long)]
        project: Option<PathBuf>,
        /// Discard an existing session file.
        #[arg(long)]
        fresh: bool,
    },
    /// Build meshes for every reconstruction unit. May be repeated.
    BuildMesh,
    /// Export, import, texture and save the project.
    Finish {
        /// Set or replace the project file chosen during folder selection.
        #[arg(long)]
        project: Option<PathBuf>,
    },
    /// Build meshes, then finish.
    CreateModel {
        #[arg(long)]
        project: Option<PathBuf>,
    },
    /// Print the labels of every registered unit.
    ListUnits {
        /// Include status and photo count.
        #[arg(long)]
        verbose: bool,
    },
}

fn load_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let data =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn load_config(path: Option<&Path>) -> Result<Option<PipelineConfig>> {
    path.map(load_json_file::<PipelineConfig>).transpose()
}

fn make_engine(args: &Args, config: &PipelineConfig) -> Result<Box<dyn ReconstructionEngine>> {
    if args.dry_run {
        return Ok(Box::new(RecordingEngine::with_extensions(
            config.image_extensions.as_slice(),
        )));
    }
    match &args.engine {
        Some(program) => Ok(Box::new(
            CommandEngine::new(program)
                .with_args(&args.engine_args)
                .with_extensions(config.image_extensions.as_slice()),
        )),
        None => bail!("no engine configured; pass --engine <program> or --dry-run"),
    }
}

/// Interpret one line typed at the project prompt; blank cancels.
fn parse_project_answer(line: &str) -> Option<PathBuf> {
    let trimmed = line.trim();
    (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
}

fn prompt_project_path<R: BufRead, W: Write>(mut input: R, mut output: W) -> Option<PathBuf> {
    write!(output, "Project file to save (empty to cancel): ").ok()?;
    output.flush().ok()?;
    let mut line = String::new();
    input.read_line(&mut line).ok()?;
    parse_project_answer(&line)
}

fn print_step(report: &StepReport) {
    println!("{}: {}", report.operation, report.summary());
    for path in &report.skipped {
        println!("  skipped {path}");
    }
    for failure in &report.failures {
        println!("  {failure}");
    }
}

fn print_run(report: &RunReport) {
    for step in &report.steps {
        print_step(step);
    }
}

fn open_session(args: &Args) -> Result<ReconstructionSession> {
    let mut session = ReconstructionSession::load_from_file(&args.session)
        .context("run select-folder first")?;
    if let Some(config) = load_config(args.config.as_deref())? {
        session.set_config(config)?;
    }
    Ok(session)
}

/// Run one subcommand; `Ok(false)` means some unit failed.
fn run(args: &Args) -> Result<bool> {
    match &args.command {
        Command::SelectFolder {
            root,
            project,
            fresh,
        } => {
            if args.session.exists() && !*fresh {
                bail!(
                    "session file {} already exists; pass --fresh to start a new run",
                    args.session.display()
                );
            }
            let config = load_config(args.config.as_deref())?.unwrap_or_default();
            let mut session = ReconstructionSession::with_config(config)?;
            let mut engine = make_engine(args, &session.config)?;

            let project = project.clone();
            let outcome = run_select_folder(
                &mut session,
                engine.as_mut(),
                &mut LogSink,
                root,
                || {
                    project.or_else(|| {
                        let stdin = io::stdin();
                        if !stdin.is_terminal() {
                            return None;
                        }
                        prompt_project_path(stdin.lock(), io::stderr())
                    })
                },
            )?;
            session.save_to_file(&args.session)?;

            print_step(&outcome.report);
            match &outcome.save {
                SaveTarget::Path(path) => println!("project: {}", path.display()),
                SaveTarget::Cancelled => {
                    println!("no project file chosen; pass --project to finish or create-model")
                }
            }
            info!("session written to {}", args.session.display());
            Ok(outcome.report.is_success())
        }
        Command::BuildMesh => {
            let mut session = open_session(args)?;
            let mut engine = make_engine(args, &session.config)?;
            session.reattach(engine.as_mut())?;
            let result = step_build_mesh(&mut session, engine.as_mut(), &mut LogSink);
            session.save_to_file(&args.session)?;
            let report = result?;
            print_step(&report);
            Ok(report.is_success())
        }
        Command::Finish { project } | Command::CreateModel { project } => {
            let mut session = open_session(args)?;
            if let Some(project) = project {
                session.set_project_path(project)?;
            }
            let mut engine = make_engine(args, &session.config)?;
            session.reattach(engine.as_mut())?;
            let result = if matches!(args.command, Command::Finish { .. }) {
                run_finish(&mut session, engine.as_mut(), &mut LogSink)
            } else {
                run_stage2(&mut session, engine.as_mut(), &mut LogSink)
            };
            // Keep whatever completed before a fatal step.
            session.save_to_file(&args.session)?;
            let report = result?;
            print_run(&report);
            Ok(report.is_success())
        }
        Command::ListUnits { verbose } => {
            let session = ReconstructionSession::load_from_file(&args.session)?;
            print!("{}", format_units(&session.registry, *verbose));
            Ok(true)
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    match try_main() {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn try_main() -> Result<bool> {
    let args = Args::parse();
    run(&args)
}
