use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;

use agent_evaluator::config::ServerConfig;
use agent_evaluator::container::BuildPlan;
use agent_evaluator::logging;

#[derive(Parser)]
#[command(name = "agent-evaluator", version, about = "Agent Evaluator Backend")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve(ServeArgs),
    /// Print the container build file after checking the build context
    Containerfile {
        /// Build context holding Cargo.toml
        #[arg(long, default_value = ".")]
        context: PathBuf,
    },
}

#[derive(Args, Default)]
struct ServeArgs {
    /// Interface to bind
    #[arg(long)]
    host: Option<IpAddr>,
    /// Port to bind; overrides PORT
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve(ServeArgs::default())) {
        Command::Serve(args) => {
            logging::init();
            tracing::info!("Starting Agent Evaluator Backend...");

            let mut config = ServerConfig::from_env().context("Invalid configuration")?;
            if let Some(host) = args.host {
                config.host = host;
            }
            if let Some(port) = args.port {
                config.port = port;
            }
            agent_evaluator::serve(config).await
        }
        Command::Containerfile { context } => {
            let rendered = BuildPlan::default()
                .render_for(&context)
                .with_context(|| format!("Cannot build from {}", context.display()))?;
            print!("{}", rendered);
            Ok(())
        }
    }
}
