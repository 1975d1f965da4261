//! Morpheus CLI - test-to-method coverage history for JVM projects.

use std::io::{stdout, IsTerminal};
use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use morpheus::cli::{Cli, Command};
use morpheus::config::Config;
use morpheus::identifier;
use morpheus::output::Format;
use morpheus::payload::CommitInfo;
use morpheus::pipeline::{import_directory, CommitInput, CommitPipeline, ImportOptions};
use morpheus::query;
use morpheus::storage::{SqliteStore, StorageAdapter};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load_default(".")?,
    };

    if !config.output.color || !stdout().is_terminal() {
        colored::control::set_override(false);
    }

    let format: Format = match cli.format {
        Some(format) => Format::from(morpheus::config::OutputFormat::from(format)),
        None => Format::from(config.output.format),
    };
    let database = cli
        .database
        .clone()
        .unwrap_or_else(|| config.database.path.clone());

    match cli.command {
        Command::ParseTest(args) => {
            let parsed = identifier::parse(&args.identifier)?;
            emit(format, &parsed)?;
        }
        Command::Init => {
            let store = open(&database)?;
            #[derive(Serialize)]
            struct Initialized {
                database: String,
                schema_version: i64,
            }
            emit(
                format,
                &Initialized {
                    database: database.display().to_string(),
                    schema_version: store.schema_version()?,
                },
            )?;
        }
        Command::Ingest(args) => {
            let mut store = open(&database)?;
            let input = CommitInput::load(
                args.project,
                CommitInfo {
                    sha: args.sha,
                    author: args.author,
                    datetime: args.datetime,
                },
                &args.methods,
                &args.coverage,
            )
            .context("failed to read tool outputs")?;
            let report = CommitPipeline::from_config(&config)
                .run(&mut store, &input)
                .with_context(|| format!("commit {} was not ingested", input.commit.sha))?;
            emit(format, &report)?;
        }
        Command::Import(args) => {
            let mut store = open(&database)?;
            let options = ImportOptions {
                layout: config.layout.clone(),
                skip_existing: args.skip_existing,
                progress: !args.no_progress && std::io::stderr().is_terminal(),
            };
            let summary = import_directory(
                &mut store,
                &CommitPipeline::from_config(&config),
                &args.dir,
                &options,
            )?;
            emit(format, &summary)?;
            if summary.has_failures() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Projects => {
            let store = open(&database)?;
            emit(format, &query::list_projects(store.conn())?)?;
        }
        Command::Commits(args) => {
            let store = open(&database)?;
            emit(format, &query::list_commits(store.conn(), args.project_id)?)?;
        }
        Command::Methods(args) => {
            let store = open(&database)?;
            emit(
                format,
                &query::list_methods(store.conn(), args.project_id, args.commit)?,
            )?;
        }
        Command::Versions(args) => {
            let store = open(&database)?;
            emit(format, &query::list_versions(store.conn(), args.id)?)?;
        }
        Command::Coverage(args) => {
            let store = open(&database)?;
            emit(
                format,
                &query::commit_coverage(store.conn(), args.project_id, args.commit_id)?,
            )?;
        }
        Command::MethodHistory(args) => {
            let store = open(&database)?;
            emit(format, &query::method_history(store.conn(), args.id)?)?;
        }
        Command::TestHistory(args) => {
            let store = open(&database)?;
            emit(format, &query::test_history(store.conn(), args.id)?)?;
        }
        Command::Stats => {
            let store = open(&database)?;
            emit(format, &store.conn().stats()?)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn open(path: &Path) -> anyhow::Result<SqliteStore> {
    SqliteStore::open(path)
        .with_context(|| format!("failed to open database {}", path.display()))
}

fn emit<T: Serialize>(format: Format, data: &T) -> morpheus::core::Result<()> {
    format.format(data, &mut stdout())
}
