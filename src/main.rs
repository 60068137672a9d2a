use assetline::config::{self, BuildMode};
use assetline::graph::Scope;
use assetline::tasks::{self, BuildContext};
use assetline::output;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup.
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "assetline")]
#[command(about = "Asset pipeline for statically generated sites")]
#[command(long_about = "\
Asset pipeline for statically generated sites

Compiles stylesheets, minifies scripts, optimizes images and runs the site
generator. In development the site is then watched and served with live
reload.

Project layout (defaults):

  project/
  ├── assets.toml                  # Optional pipeline config
  ├── _config.yml                  # Site generator config
  ├── _assets/                     # Source root
  │   ├── fonts/                   # Copied as-is
  │   ├── images/                  # Optimized (incremental)
  │   ├── uploads/                 # Optimized; resized in production
  │   ├── styles/scss/main.scss    # → styles/main.min.css
  │   ├── styles/libs/*.css        # → styles/libs/*.min.css
  │   └── js/*.js                  # → js/*.min.js
  └── _site/                       # Generated site, served in development
      └── assets/                  # Build root

NODE_ENV selects the build mode: unset or exactly 'development' means
development, any other value means production. --mode overrides it.

Run 'assetline gen-config' to generate a documented assets.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Project root
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Pipeline config file (default: <root>/assets.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Build mode: development (dev) or production (prod). Overrides NODE_ENV
    #[arg(long, global = true, value_parser = BuildMode::parse)]
    mode: Option<BuildMode>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Remove the build root
    Clean,
    /// Optimize general images and uploads
    Images,
    /// Copy fonts, optimize images, compile stylesheets
    Css,
    /// Minify scripts
    Scripts,
    /// Write responsive variants of uploads
    #[command(name = "resizeImages", alias = "resize-images")]
    ResizeImages,
    /// Run the site generator
    #[command(name = "buildSiteGenerator", alias = "build-site")]
    BuildSiteGenerator,
    /// Serve the site with live reload (development only)
    Server,
    /// Development build, then watch and serve
    Dev,
    /// Production build
    Prod,
    /// List entry points and the tasks they run
    Tasks,
    /// Print a stock assets.toml with all options documented
    GenConfig,
}

impl Command {
    /// Graph entry point, for commands that run tasks.
    fn task(&self) -> Option<&'static str> {
        Some(match self {
            Command::Clean => "clean",
            Command::Images => "images",
            Command::Css => "css",
            Command::Scripts => "scripts",
            Command::ResizeImages => "resizeImages",
            Command::BuildSiteGenerator => "buildSiteGenerator",
            Command::Server => "server",
            Command::Dev => "dev",
            Command::Prod => "prod",
            Command::Tasks | Command::GenConfig => return None,
        })
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let graph = tasks::pipeline_graph()?;

    let Some(task) = cli.command.task() else {
        match cli.command {
            Command::GenConfig => print!("{}", config::stock_config_toml()),
            _ => output::print_task_list(&tasks::listing(&graph)),
        }
        return Ok(());
    };

    let mode = cli.mode.unwrap_or_else(BuildMode::from_env);
    let config = config::load_config(&cli.root, cli.config.as_deref())?;
    init_thread_pool(&config.processing);

    let ctx = BuildContext::new(&cli.root, config, mode)?;
    let scope = Scope::new(Arc::new(graph), Arc::new(ctx));
    let report = tasks::run(&scope, task)?;
    tracing::info!("'{task}' done ({} tasks)", report.completed.len());
    Ok(())
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
