use std::env;
use std::io::{IsTerminal, stdout};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use futures::future::OptionFuture;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use tabula::config::Settings;
use tabula::exec::{ExecutionTask, Outcome, Pipeline};
use tabula::scripting::ScriptEngine;
use tabula::session::Mode;
use tabula::shell::{DEFAULT_PROJECT, Shell, write_lines};

const USAGE: &str = "Usage: tabula [FILE]...
       tabula --project NAME
       tabula --run FILE";

enum Launch {
    Files(Vec<PathBuf>),
    Project(String),
    Run(PathBuf),
    Help,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Launch> {
    let mut files = Vec::new();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Launch::Help),
            "-p" | "--project" => {
                let name = args.next().context("--project needs a name")?;
                return Ok(Launch::Project(name));
            }
            "-r" | "--run" => {
                let file = args.next().context("--run needs a file")?;
                return Ok(Launch::Run(PathBuf::from(file)));
            }
            flag if flag.starts_with('-') => bail!("Unknown option: {}\n{}", flag, USAGE),
            _ => files.push(PathBuf::from(arg)),
        }
    }
    Ok(Launch::Files(files))
}

fn load_settings() -> Settings {
    let mut engine = ScriptEngine::new();
    if let Err(e) = engine.load_default() {
        tracing::warn!("init script failed: {}", e);
    }
    engine.settings()
}

/// Run one program without the shell and print its event as JSON
async fn run_headless(settings: &Settings, path: PathBuf) -> Result<ExitCode> {
    let path = std::path::absolute(&path)?;
    if !path.is_file() {
        bail!("{} does not exist", path.display());
    }
    if Mode::from_path(&path) != Mode::Program {
        bail!("{} is not a program", path.display());
    }

    let mut pipeline = Pipeline::from_settings(settings)?;
    pipeline.submit(ExecutionTask::for_source(&path, &settings.classpath))?;
    let event = pipeline
        .next_event()
        .await
        .context("execution worker stopped unexpectedly")?;

    println!("{}", serde_json::to_string_pretty(&event)?);
    Ok(match event.outcome {
        Outcome::Completed { .. } => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    })
}

async fn run_shell(settings: Settings, launch: Launch) -> Result<()> {
    let mut shell = Shell::new(settings)?;
    match launch {
        Launch::Files(files) if !files.is_empty() => shell.open_files(&files),
        Launch::Project(name) => shell.open_project(&name),
        _ => shell.open_project(DEFAULT_PROJECT),
    }

    let plain = !stdout().is_terminal();
    let mut out = stdout();
    write_lines(&mut out, &shell.drain_lines(), plain)?;

    let mut input = BufReader::new(tokio::io::stdin()).lines();

    while shell.running {
        let busy: OptionFuture<_> = shell
            .busy_deadline()
            .map(|deadline| tokio::time::sleep_until(deadline.into()))
            .into();

        tokio::select! {
            line = input.next_line() => match line? {
                Some(line) => shell.execute(&line),
                None => {
                    // End of input: leave, discarding what cannot be saved
                    shell.execute(":q");
                    if shell.running {
                        shell.execute(":q!");
                    }
                }
            },
            Some(event) = shell.next_event() => shell.on_event(event),
            Some(()) = busy => shell.poll_busy(Instant::now()),
        }

        write_lines(&mut out, &shell.drain_lines(), plain)?;
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("TABULA_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let launch = parse_args(env::args().skip(1))?;
    let settings = load_settings();

    match launch {
        Launch::Help => {
            println!("{}", USAGE);
            Ok(ExitCode::SUCCESS)
        }
        Launch::Run(path) => run_headless(&settings, path).await,
        launch => {
            run_shell(settings, launch).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
