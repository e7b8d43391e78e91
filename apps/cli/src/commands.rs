//! CLI command definitions, routing, and tracing setup.

use std::io::{BufReader, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use coursegraph_core::{Console, PromptConfirm, StorageBackends, run_ingest};
use coursegraph_relabel::{RewriteReporter, Rewriter, default_mapping};
use coursegraph_shared::{
    AppConfig, CourseGraphError, ProjectConfig, config_dir, init_config, load_config,
    resolve_config_path,
};
use coursegraph_textbook::TextbookParser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// CourseGraph: relabel graph queries and ingest textbooks.
#[derive(Parser)]
#[command(
    name = "coursegraph",
    version,
    about = "Operator tools for the CourseGraph study app: label rewrite and textbook ingestion.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Rewrite legacy graph labels in embedded queries under modules/, data/, scripts/.
    Relabel,

    /// Parse textbooks, then load the graph store and the search index.
    Ingest,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Write a config file with defaults (user config unless --local).
    Init {
        /// Write ./coursegraph.toml instead of ~/.coursegraph/coursegraph.toml.
        #[arg(long)]
        local: bool,
    },
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr; stdout carries
/// the operator transcript.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "coursegraph=warn",
        1 => "coursegraph=info",
        2 => "coursegraph=debug",
        _ => "coursegraph=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let project_root = project_root()?;
    match cli.command {
        Command::Relabel => cmd_relabel(&project_root).await,
        Command::Ingest => cmd_ingest(&project_root).await,
        Command::Config { action } => match action {
            ConfigAction::Init { local } => cmd_config_init(&project_root, local).await,
            ConfigAction::Show => cmd_config_show(&project_root).await,
        },
    }
}

/// Commands run from the project root, i.e. the working directory.
fn project_root() -> Result<PathBuf> {
    std::env::current_dir().map_err(|e| eyre!("cannot determine working directory: {e}"))
}

// ---------------------------------------------------------------------------
// relabel
// ---------------------------------------------------------------------------

async fn cmd_relabel(project_root: &Path) -> Result<()> {
    let config = load_config_or_default(project_root);
    let rewriter = Rewriter::from(&config.relabel);
    let roots = config.relabel.roots.clone();
    let root = project_root.to_path_buf();

    info!(roots = ?roots, "starting relabel");
    let spinner = relabel_spinner();
    let progress = RelabelProgress::new(spinner.clone(), std::io::stdout());

    let report = tokio::task::spawn_blocking(move || {
        rewriter.rewrite_roots(&root, roots.as_slice(), default_mapping(), &progress)
    })
    .await
    .map_err(|e| eyre!("relabel task failed: {e}"))?;

    spinner.finish_and_clear();
    let report = report?;

    println!();
    println!(
        "  Scanned {} files, modified {}, {} substitutions",
        report.scanned,
        report.modified.len(),
        report.substitutions
    );
    if !report.failed.is_empty() {
        println!("  {} files could not be processed", report.failed.len());
    }
    Ok(())
}

/// Relabel has no stage to report a config error in; it falls back to the
/// built-in roots and classification rules.
fn load_config_or_default(project_root: &Path) -> AppConfig {
    load_config(project_root).unwrap_or_else(|e| {
        warn!(error = %e, "config could not be loaded, using defaults");
        AppConfig::default()
    })
}

fn relabel_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.set_message("Rewriting labels");
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    spinner
}

/// One line on `W` per modified or failed file, with the spinner held off
/// while it is written.
struct RelabelProgress<W: Write + Send> {
    spinner: ProgressBar,
    out: Mutex<W>,
}

impl<W: Write + Send> RelabelProgress<W> {
    fn new(spinner: ProgressBar, out: W) -> Self {
        Self {
            spinner,
            out: Mutex::new(out),
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|e| e.into_inner())
    }

    fn line(&self, line: &str) {
        self.spinner.suspend(|| {
            let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
            if let Err(e) = writeln!(out, "{line}").and_then(|()| out.flush()) {
                warn!(error = %e, "could not write relabel progress");
            }
        });
    }
}

impl<W: Write + Send> RewriteReporter for RelabelProgress<W> {
    fn file_modified(&self, path: &Path, substitutions: usize) {
        self.line(&format!("✓ {} ({substitutions} replaced)", path.display()));
    }

    fn file_failed(&self, path: &Path, error: &CourseGraphError) {
        self.line(&format!("✗ {}: {error}", path.display()));
    }
}

// ---------------------------------------------------------------------------
// ingest
// ---------------------------------------------------------------------------

async fn cmd_ingest(project_root: &Path) -> Result<()> {
    let (textbook_root, backends) = ingest_setup(project_root);
    let console = Console::new(std::io::stdout());
    let stdin = std::io::stdin();
    let echo = !stdin.is_terminal();
    let mut confirm =
        PromptConfirm::new(BufReader::new(stdin), std::io::stdout()).echoing(echo);

    // Stage failures are reported in the transcript; the command itself succeeds.
    run_ingest(
        &textbook_root,
        &TextbookParser::default(),
        &backends,
        &mut confirm,
        &console,
    )
    .await;
    Ok(())
}

/// Textbook root and store backends for `project_root`.
///
/// A config that fails to load still lets Parse run against the default
/// textbook root; both load stages then fail with the config error.
fn ingest_setup(project_root: &Path) -> (PathBuf, StorageBackends) {
    match load_config(project_root) {
        Ok(config) => (
            project_root.join(&config.project.textbook_root),
            StorageBackends::new(config, project_root),
        ),
        Err(e) => {
            warn!(error = %e, "config could not be loaded, stores will not open");
            (
                project_root.join(ProjectConfig::default().textbook_root),
                StorageBackends::misconfigured(&e, project_root),
            )
        }
    }
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

async fn cmd_config_init(project_root: &Path, local: bool) -> Result<()> {
    let dir = if local {
        project_root.to_path_buf()
    } else {
        config_dir()?
    };
    let path = init_config(&dir)?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(project_root: &Path) -> Result<()> {
    match resolve_config_path(project_root)? {
        Some(path) => println!("# {}", path.display()),
        None => println!("# built-in defaults"),
    }
    let config: AppConfig = load_config(project_root)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
