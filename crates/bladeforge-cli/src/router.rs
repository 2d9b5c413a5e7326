// Command routing and dispatch

use std::path::PathBuf;

use bladeforge_config::{BladeConfig, ConfigManager};
use bladeforge_views::Blade;
use clap::{Parser, Subcommand};
use tracing::debug;

use crate::{
    commands::{CheckCommand, Command, CompileCommand, RenderCommand},
    error::CliResult,
};

/// Blade - render and precompile Blade templates
#[derive(Parser, Debug)]
#[command(name = "blade")]
#[command(bin_name = "blade")]
#[command(about = "Render and precompile Blade templates")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// View directory (repeatable, replaces the configured view paths)
    #[arg(long = "views", value_name = "DIR", global = true)]
    pub views: Vec<PathBuf>,

    /// Compiled template cache directory
    #[arg(long, value_name = "DIR", global = true)]
    pub cache: Option<PathBuf>,

    /// Configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only report errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Render a view to stdout
    Render {
        /// View name (`pages.home`, `mail::welcome`)
        #[arg(value_name = "VIEW")]
        view: String,

        /// View data as a JSON object
        #[arg(long, value_name = "JSON", conflicts_with = "data_file")]
        data: Option<String>,

        /// File containing view data as a JSON object
        #[arg(long, value_name = "PATH")]
        data_file: Option<PathBuf>,
    },

    /// Compile every template below a directory into the cache
    Compile {
        /// Directory or file (default: first view path)
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,
    },

    /// Compile a view and the views it extends or includes
    Check {
        /// View name
        #[arg(value_name = "VIEW")]
        view: String,
    },
}

/// Routes parsed arguments to command handlers
pub struct CommandRouter;

impl CommandRouter {
    /// Parse CLI arguments, set up logging and run the command
    pub fn route() -> CliResult<String> {
        let cli = Cli::parse();
        crate::logging::init_logging(cli.verbose, cli.quiet);
        Self::execute(&cli)
    }

    /// Run a parsed command and return its output
    pub fn execute(cli: &Cli) -> CliResult<String> {
        let blade = Blade::from_config(&Self::load_config(cli)?);

        match &cli.command {
            Commands::Render {
                view,
                data,
                data_file,
            } => RenderCommand::new(view.clone())
                .with_data(data.clone())
                .with_data_file(data_file.clone())
                .execute(&blade),
            Commands::Compile { path } => CompileCommand::new(path.clone()).execute(&blade),
            Commands::Check { view } => CheckCommand::new(view.clone()).execute(&blade),
        }
    }

    /// Configuration file and environment, overridden by command line flags
    pub fn load_config(cli: &Cli) -> CliResult<BladeConfig> {
        let manager = match &cli.config {
            Some(path) => ConfigManager::with_path(path),
            None => ConfigManager::new(),
        };
        let mut config = manager.load()?;

        if !cli.views.is_empty() {
            config.view_paths = cli.views.clone();
        }
        if let Some(cache) = &cli.cache {
            config.cache_path = cache.clone();
        }
        config.validate()?;

        debug!(
            config = %manager.config_path().display(),
            views = ?config.view_paths,
            cache = %config.cache_path.display(),
            "Resolved configuration"
        );
        Ok(config)
    }
}
