//! boxbridge CLI: inspect and drive remote sandboxes from the shell.
//!
//! ## Commands
//!
//! - `tools`: list the agent tools each sandbox kind exposes
//! - `call`: invoke one `{kind}_{tool}` tool, provisioning on demand
//! - `create`: provision a sandbox and print its id
//! - `prompt`: print the agent system prompt
//! - `config`: print the config JSON Schema or the effective config

use anyhow::{Context, Result};
use boxbridge::agent::create_system_prompt;
use boxbridge::config::Config;
use boxbridge::manager::SandboxManager;
use boxbridge::metrics::Metrics;
use boxbridge::sandbox::agentbay::AgentBayClient;
use boxbridge::sandbox::{SandboxKind, ToolCategory};
use boxbridge::tools::ToolRegistry;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "boxbridge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "On-demand remote sandboxes as LLM agent tools", long_about = None)]
struct Cli {
    /// Config file (default: ~/.config/boxbridge/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List agent tools per sandbox kind
    Tools {
        /// Only this kind
        #[arg(long)]
        kind: Option<SandboxKind>,

        /// Only this category (file, command, code, desktop, browser, agent, ui, app, system)
        #[arg(long)]
        category: Option<ToolCategory>,

        /// Print full descriptors as JSON
        #[arg(long)]
        json: bool,
    },

    /// Call one tool, e.g. `call linux_run_shell_command --args '{"command":"ls"}'`
    Call {
        /// Full tool name (`{kind}_{tool}`)
        tool: String,

        /// Tool arguments as a JSON object
        #[arg(long, default_value = "{}")]
        args: String,

        /// Print the structured result as JSON
        #[arg(long)]
        json: bool,

        /// Print Prometheus metrics after the call
        #[arg(long)]
        metrics: bool,
    },

    /// Provision a sandbox of the given kind
    Create {
        kind: SandboxKind,

        /// Leave the sandbox running instead of deleting it on exit
        #[arg(long)]
        keep: bool,
    },

    /// Print the agent system prompt
    Prompt,

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the config JSON Schema
    Schema,

    /// Print the effective config (API key masked)
    Show,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "boxbridge=debug" } else { "boxbridge=info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init()
        .ok();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Commands::Tools {
            kind,
            category,
            json,
        } => {
            let kinds = match kind {
                Some(kind) => vec![kind],
                None => config.enabled_kinds()?,
            };
            let registry = ToolRegistry::new(&kinds);
            let described = match category {
                Some(category) => registry.describe_category(category),
                None => registry.describe_all(),
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&described)?);
            } else {
                for (kind, tools) in &described {
                    println!("{kind} ({} tools)", tools.len());
                    for tool in tools {
                        println!("  {:<36} {}", tool.name, tool.description);
                    }
                }
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Call {
            tool,
            args,
            json,
            metrics,
        } => {
            let args: serde_json::Value =
                serde_json::from_str(&args).context("--args must be valid JSON")?;
            let manager = build_manager(&config)?;
            let toolkit = ToolRegistry::for_manager(&manager).build_toolkit(manager.clone())?;

            let response = tokio::select! {
                response = toolkit.execute(&tool, args) => Some(response),
                _ = tokio::signal::ctrl_c() => {
                    tracing::warn!("interrupted, cleaning up");
                    None
                }
            };
            manager.cleanup_all().await;

            let Some(response) = response else {
                return Ok(ExitCode::from(130));
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                println!("{}", response.output);
            }
            if metrics {
                print!("{}", manager.metrics().encode()?);
            }
            Ok(if response.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }

        Commands::Create { kind, keep } => {
            let manager = build_manager(&config)?;
            let handle = match manager.ensure(kind).await {
                Ok(handle) => handle,
                Err(e) => {
                    eprintln!("{e}");
                    return Ok(ExitCode::FAILURE);
                }
            };
            println!("sandbox_id: {}", handle.sandbox_id());
            println!("image_id:   {}", handle.image_id());
            match handle.resource_info().await {
                Ok(info) if !info.resource_url.is_empty() => {
                    println!("live view:  {}", info.resource_url)
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("could not fetch resource url: {e:#}"),
            }
            if keep {
                println!("sandbox left running");
            } else {
                manager.cleanup_all().await;
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Prompt => {
            let registry = ToolRegistry::new(&config.enabled_kinds()?);
            println!("{}", create_system_prompt(&registry.describe_all()));
            Ok(ExitCode::SUCCESS)
        }

        Commands::Config { action } => {
            match action {
                ConfigAction::Schema => {
                    println!("{}", serde_json::to_string_pretty(&Config::json_schema())?)
                }
                ConfigAction::Show => print!("{}", toml::to_string_pretty(&config.redacted())?),
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn build_manager(config: &Config) -> Result<Arc<SandboxManager>> {
    let provider = Arc::new(AgentBayClient::from_config(&config.agentbay)?);
    let metrics = Arc::new(Metrics::new()?);
    Ok(Arc::new(SandboxManager::new(provider, config, metrics)?))
}
