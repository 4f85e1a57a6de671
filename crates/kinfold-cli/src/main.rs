#![forbid(unsafe_code)]

mod cmd;
mod output;
mod validate;

use clap::{CommandFactory, Parser, Subcommand};
use output::{OutputMode, resolve_output_mode};
use std::env;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "kinfold: a family tree that derives kinship from tie records",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Output format. Overrides --json, `FORMAT` and the user config.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn output_mode(&self) -> OutputMode {
        resolve_output_mode(self.format, self.json)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Setup",
        about = "Initialize a family tree",
        long_about = "Create .kinfold/ with a default config and an empty SQLite store.",
        after_help = "EXAMPLES:\n    # Initialize in the current directory\n    kf init\n\n    # Rewrite the default config, keeping records\n    kf init --force"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Records",
        about = "Manage people",
        after_help = "EXAMPLES:\n    # Add a person\n    kf person add --first Ada --last Byron --born 1815-12-10\n\n    # Search by name\n    kf person list --search byron\n\n    # Emit machine-readable output\n    kf person show p-3f9a01c2b7de --json"
    )]
    Person(cmd::person::PersonArgs),

    #[command(
        next_help_heading = "Records",
        about = "Manage ties between people",
        long_about = "Record parent-child and partnership ties. The relation's kind decides how \
                      the three person slots are read.",
        after_help = "EXAMPLES:\n    # Child with two parents\n    kf tie add --a <child> --b <mother> --c <father>\n\n    # Partnership\n    kf tie add --a <one> --b <other> --relation partner --type married\n\n    # Ties naming one person\n    kf tie list --person <id>"
    )]
    Tie(cmd::tie::TieArgs),

    #[command(
        next_help_heading = "Records",
        about = "Manage tie relations",
        after_help = "EXAMPLES:\n    # Add a parent-child relation\n    kf relation add step_parent --kind parent_child\n\n    # List relations\n    kf relation list"
    )]
    Relation(cmd::relation::RelationArgs),

    #[command(
        next_help_heading = "Records",
        about = "Manage tie types",
        after_help = "EXAMPLES:\n    # Register a qualifier\n    kf tie-type add married\n\n    # List qualifiers\n    kf tie-type list"
    )]
    TieType(cmd::tie_type::TieTypeArgs),

    #[command(
        next_help_heading = "Kinship",
        about = "Show a person's parents",
        after_help = "EXAMPLES:\n    kf parents p-3f9a01c2b7de\n    kf parents p-3f9a01c2b7de --json"
    )]
    Parents(cmd::kin::KinArgs),

    #[command(
        next_help_heading = "Kinship",
        about = "Show a person's siblings",
        long_about = "Show siblings grouped by parent pair, or through one explicit pair.",
        after_help = "EXAMPLES:\n    # Every parent pair\n    kf siblings p-3f9a01c2b7de\n\n    # Through one pair\n    kf siblings p-3f9a01c2b7de --parent <mother> --other <father>"
    )]
    Siblings(cmd::kin::SiblingsArgs),

    #[command(
        next_help_heading = "Kinship",
        about = "Show a person's partners",
        long_about = "Show partners from partnership ties and from shared children.",
        after_help = "EXAMPLES:\n    kf partners p-3f9a01c2b7de"
    )]
    Partners(cmd::kin::KinArgs),

    #[command(
        next_help_heading = "Kinship",
        about = "Show a person's children grouped by partner",
        after_help = "EXAMPLES:\n    kf children p-3f9a01c2b7de --format text"
    )]
    Children(cmd::kin::KinArgs),

    #[command(
        next_help_heading = "Setup",
        about = "Generate shell completion scripts",
        after_help = "EXAMPLES:\n    # Generate bash completions\n    kf completions bash\n\n    # Generate zsh completions\n    kf completions zsh"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

/// `KINFOLD_LOG` wins; otherwise `--verbose` or `DEBUG` raise the default.
/// Binary events are under the `kf` target.
fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("KINFOLD_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            "kinfold=debug,kf=debug,info"
        } else if env::var("DEBUG").is_ok() {
            "kinfold=debug,info"
        } else {
            "kinfold=info,warn"
        })
    });

    let format = env::var("KINFOLD_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let project_root = env::current_dir()?;
    let output = cli.output_mode();
    debug!(?output, "resolved output mode");

    match cli.command {
        Commands::Init(ref args) => cmd::init::run_init(args, output, &project_root),
        Commands::Person(ref args) => cmd::person::run_person(args, output, &project_root),
        Commands::Tie(ref args) => cmd::tie::run_tie(args, output, &project_root),
        Commands::Relation(ref args) => cmd::relation::run_relation(args, output, &project_root),
        Commands::TieType(ref args) => cmd::tie_type::run_tie_type(args, output, &project_root),
        Commands::Parents(ref args) => cmd::kin::run_parents(args, output, &project_root),
        Commands::Siblings(ref args) => cmd::kin::run_siblings(args, output, &project_root),
        Commands::Partners(ref args) => cmd::kin::run_partners(args, output, &project_root),
        Commands::Children(ref args) => cmd::kin::run_children(args, output, &project_root),
        Commands::Completions(args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)
        }
    }
}
