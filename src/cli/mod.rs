//! Command-line interface parsing and handling
//!
//! This module parses command-line arguments, resolves configuration and
//! dispatches to the individual commands.

pub mod call;
pub mod plain;
pub mod settings;

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;

use crate::api::{CallTarget, InvocationMode};
use crate::cli::call::run_call;
use crate::cli::plain::{get_prompt, list_tools, read_resource};
use crate::cli::settings::handle_config_command;
use crate::core::arguments::FillMode;
use crate::core::backend::http::HttpBackend;
use crate::core::backend::InspectorBackend;
use crate::core::config::{Config, BACKEND_URL_ENV};
use crate::utils::logging::init_tracing;

#[derive(Parser)]
#[command(name = "mcp-inspector")]
#[command(version)]
#[command(about = "Invoke MCP tools through a capability proxy and follow their events")]
#[command(
    long_about = "mcp-inspector talks to the inspector endpoints of a capability proxy. It opens a \
session for the selected server, starts a tool call, follows the call's event stream and prints \
progress, logs and the final result.\n\n\
Environment Variables:\n\
  MCP_INSPECTOR_BACKEND_URL   Base URL of the proxy (overridden by --backend)\n\
  RUST_LOG                    Diagnostics filter (default: mcp_inspector=info)\n\n\
Controls:\n\
  Ctrl+C            Ask the backend to cancel the running call\n\
  Ctrl+C (twice)    Stop following the call and exit"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Base URL of the proxy backend
    #[arg(short = 'b', long, global = true, value_name = "URL")]
    pub backend: Option<String>,

    /// Path to an alternate configuration file
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Append call activity to the specified file
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log: Option<String>,
}

/// Which server a command is addressed to.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Backend server id (server mode)
    #[arg(long)]
    pub server_id: Option<String>,

    /// Server name as registered with the proxy (proxy mode)
    #[arg(long)]
    pub server_name: Option<String>,

    /// Routing mode: proxy or server
    #[arg(long, value_parser = parse_mode)]
    pub mode: Option<InvocationMode>,
}

impl TargetArgs {
    pub fn to_target(&self, config: &Config) -> CallTarget {
        CallTarget::new(
            self.mode.unwrap_or_else(|| config.mode()),
            self.server_id.clone(),
            self.server_name.clone(),
        )
    }
}

fn parse_mode(value: &str) -> Result<InvocationMode, String> {
    value.parse()
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillArg {
    /// Declared defaults plus required properties
    Defaults,
    /// A value for every declared property
    Mock,
}

impl From<FillArg> for FillMode {
    fn from(value: FillArg) -> Self {
        match value {
            FillArg::Defaults => FillMode::Defaults,
            FillArg::Mock => FillMode::Mock,
        }
    }
}

#[derive(clap::Args, Debug, Clone)]
pub struct CallArgs {
    /// Name of the tool to invoke
    pub tool: String,

    #[command(flatten)]
    pub target: TargetArgs,

    /// Tool arguments as a JSON object
    #[arg(long, conflicts_with_all = ["args_file", "fill"])]
    pub args: Option<String>,

    /// Read tool arguments from a JSON file
    #[arg(long, value_name = "FILE", conflicts_with = "fill")]
    pub args_file: Option<PathBuf>,

    /// Generate arguments from the tool's input schema
    #[arg(long, value_enum)]
    pub fill: Option<FillArg>,

    /// Execution timeout hint sent to the backend
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Invoke a tool and follow its event stream
    Call(CallArgs),
    /// List the tools a server exposes
    Tools {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Read a resource by URI
    ReadResource {
        uri: String,
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Render a prompt
    GetPrompt {
        name: String,
        /// Prompt argument, repeatable
        #[arg(long = "arg", value_name = "KEY=VALUE")]
        args: Vec<String>,
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Show or change configuration values
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigAction {
    /// Print every configuration value
    Show,
    /// Print the configuration file location
    Path,
    /// Set a configuration value
    Set { key: String, value: String },
    /// Remove a configuration value
    Unset { key: String },
}

/// Configuration resolved from the file, the environment and the flags.
pub struct CliContext {
    pub config: Config,
    pub config_path: PathBuf,
    pub backend_url: Option<String>,
    pub log_file: Option<String>,
}

impl CliContext {
    pub fn load(args: &Args) -> Result<Self, Box<dyn Error>> {
        let config_path = Config::resolve_path(args.config.as_deref())?;
        let config = Config::load_from_path(&config_path)?;
        let env_url = std::env::var(BACKEND_URL_ENV).ok();
        let backend_url = config.resolve_backend_url(args.backend.as_deref(), env_url.as_deref());
        Ok(Self {
            config,
            config_path,
            backend_url,
            log_file: args.log.clone(),
        })
    }

    pub fn connect(&self) -> Result<Arc<dyn InspectorBackend>, Box<dyn Error>> {
        let Some(url) = self.backend_url.as_deref() else {
            return Err(format!(
                "No backend URL configured. Pass --backend, set {BACKEND_URL_ENV}, or run \
'mcp-inspector config set backend-url <url>'."
            )
            .into());
        };
        let backend = HttpBackend::new(url, self.config.http_timeouts())?;
        debug!(backend = %backend.base_url(), "Using inspector backend");
        Ok(Arc::new(backend))
    }
}

pub fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let context = CliContext::load(&args)?;

    match args.command {
        Commands::Call(call_args) => run_call(&context, call_args).await,
        Commands::Tools { target } => list_tools(&context, &target).await,
        Commands::ReadResource { uri, target } => read_resource(&context, &target, &uri).await,
        Commands::GetPrompt { name, args, target } => {
            get_prompt(&context, &target, &name, &args).await
        }
        Commands::Config { action } => handle_config_command(&context, action),
    }
}
