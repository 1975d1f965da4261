//! CLI implementation using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Morpheus - test-to-method coverage history for JVM projects.
#[derive(Parser)]
#[command(name = "morpheus")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Coverage database (overrides `database.path`)
    #[arg(short, long, global = true)]
    pub database: Option<PathBuf>,

    /// Output format (overrides `output.format`)
    #[arg(short, long, value_enum, global = true)]
    pub format: Option<OutputFormat>,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the database schema
    Init,

    /// Ingest the tool outputs of one commit
    Ingest(IngestArgs),

    /// Import an analysis output tree (<dir>/<project>/<sha>/...)
    Import(ImportArgs),

    /// List projects
    Projects,

    /// List the commits of a project, newest first
    Commits(ProjectArgs),

    /// List the production methods of a project
    Methods(MethodsArgs),

    /// List the recorded versions of a method, oldest first
    Versions(IdArgs),

    /// Show the test-to-method coverage graph of one commit
    #[command(alias = "cov")]
    Coverage(CoverageArgs),

    /// Show which tests covered a method across commits
    MethodHistory(IdArgs),

    /// Show which methods a test covered across commits
    TestHistory(IdArgs),

    /// Parse a raw test identifier and print its parts
    ParseTest(ParseTestArgs),

    /// Show row counts of every table
    Stats,
}

#[derive(Args)]
pub struct IngestArgs {
    /// Project name
    #[arg(long)]
    pub project: String,

    /// Commit sha
    #[arg(long)]
    pub sha: String,

    /// Commit author
    #[arg(long, default_value = "")]
    pub author: String,

    /// Commit timestamp
    #[arg(long, default_value = "")]
    pub datetime: String,

    /// methods.json produced by the method-extraction tool
    #[arg(long)]
    pub methods: PathBuf,

    /// coverage.json produced by the coverage tool
    #[arg(long)]
    pub coverage: PathBuf,
}

#[derive(Args)]
pub struct ImportArgs {
    /// Root of the analysis output tree
    pub dir: PathBuf,

    /// Skip commits that are already stored
    #[arg(long)]
    pub skip_existing: bool,

    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

#[derive(Args)]
pub struct ProjectArgs {
    pub project_id: i64,
}

#[derive(Args)]
pub struct MethodsArgs {
    pub project_id: i64,

    /// Only methods declared in this commit
    #[arg(long)]
    pub commit: Option<i64>,
}

#[derive(Args)]
pub struct CoverageArgs {
    pub project_id: i64,
    pub commit_id: i64,
}

#[derive(Args)]
pub struct IdArgs {
    pub id: i64,
}

#[derive(Args)]
pub struct ParseTestArgs {
    /// Raw identifier, e.g. `testFoo().[engine:junit-jupiter]/[class:pkg.FooTest]/[method:testFoo()]`
    pub identifier: String,
}

/// Output format.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}

impl From<OutputFormat> for crate::config::OutputFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => Self::Json,
            OutputFormat::Text => Self::Text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["morpheus", "projects", "-f", "json", "-d", "x.db"]).unwrap();
        assert!(matches!(cli.format, Some(OutputFormat::Json)));
        assert_eq!(cli.database, Some(PathBuf::from("x.db")));
    }

    #[test]
    fn test_cli_format_defaults_to_config() {
        let cli = Cli::try_parse_from(["morpheus", "projects"]).unwrap();
        assert!(cli.format.is_none());
    }

    #[test]
    fn test_cli_ingest() {
        let cli = Cli::try_parse_from([
            "morpheus",
            "ingest",
            "--project",
            "commons-io",
            "--sha",
            "abc",
            "--methods",
            "m.json",
            "--coverage",
            "c.json",
        ])
        .unwrap();
        match cli.command {
            Command::Ingest(args) => {
                assert_eq!(args.project, "commons-io");
                assert_eq!(args.author, "");
                assert_eq!(args.coverage, PathBuf::from("c.json"));
            }
            _ => panic!("Expected Ingest command"),
        }
    }

    #[test]
    fn test_cli_ingest_requires_inputs() {
        assert!(Cli::try_parse_from(["morpheus", "ingest", "--project", "p", "--sha", "s"]).is_err());
    }

    #[test]
    fn test_cli_import() {
        let cli = Cli::try_parse_from(["morpheus", "import", "out", "--skip-existing"]).unwrap();
        match cli.command {
            Command::Import(args) => {
                assert_eq!(args.dir, PathBuf::from("out"));
                assert!(args.skip_existing);
                assert!(!args.no_progress);
            }
            _ => panic!("Expected Import command"),
        }
    }

    #[test]
    fn test_cli_methods_commit_filter() {
        let cli = Cli::try_parse_from(["morpheus", "methods", "1", "--commit", "7"]).unwrap();
        match cli.command {
            Command::Methods(args) => {
                assert_eq!(args.project_id, 1);
                assert_eq!(args.commit, Some(7));
            }
            _ => panic!("Expected Methods command"),
        }
    }

    #[test]
    fn test_cli_coverage_alias() {
        let cli = Cli::try_parse_from(["morpheus", "cov", "1", "2"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Coverage(CoverageArgs {
                project_id: 1,
                commit_id: 2
            })
        ));
    }

    #[test]
    fn test_cli_history_commands() {
        let cli = Cli::try_parse_from(["morpheus", "method-history", "3"]).unwrap();
        assert!(matches!(cli.command, Command::MethodHistory(IdArgs { id: 3 })));
        let cli = Cli::try_parse_from(["morpheus", "test-history", "4"]).unwrap();
        assert!(matches!(cli.command, Command::TestHistory(IdArgs { id: 4 })));
        let cli = Cli::try_parse_from(["morpheus", "versions", "5"]).unwrap();
        assert!(matches!(cli.command, Command::Versions(IdArgs { id: 5 })));
    }
}
