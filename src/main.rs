use agent402::agent::AgentState;
use agent402::catalog;
use agent402::utils::{init_logging, LogTarget};
use agent402::{AppContext, Config};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{error, info};

/// Agent402 - an AI agent that pays for services over HTTP 402
#[derive(Parser)]
#[command(name = "agent402")]
#[command(version)]
#[command(about = "Request paid AI services, settle the HTTP 402 in USDC, unlock the result", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive terminal dashboard (default)
    Tui,

    /// Run one request-pay-unlock flow without a UI and print the activity log
    Run {
        /// Service id, see `agent402 services`
        #[arg(short, long)]
        service: String,

        /// Stop at the 402 instead of approving the payment
        #[arg(long)]
        no_approve: bool,
    },

    /// List the service catalog
    Services,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command.unwrap_or(Commands::Tui) {
        Commands::Tui => {
            let _guard = init_logging(&config.logging, LogTarget::File)?;
            info!(network = %config.network.name, "Configuration loaded");
            let context = AppContext::build(config)?;
            agent402::tui::run(context).await
        }
        Commands::Run {
            service,
            no_approve,
        } => {
            let _guard = init_logging(&config.logging, LogTarget::Stderr)?;
            let failed = run_headless(config, &service, !no_approve).await?;
            if failed {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Services => {
            for service in catalog::ai_services() {
                println!(
                    "{:<14} {:<18} {:>5} USDC  {}",
                    service.id, service.name, service.price, service.description
                );
            }
            Ok(())
        }
    }
}

/// Returns whether the flow ended in the error state
async fn run_headless(config: Config, service_id: &str, approve: bool) -> anyhow::Result<bool> {
    let service = catalog::find_service(service_id).ok_or_else(|| {
        let known: Vec<String> = catalog::ai_services().into_iter().map(|s| s.id).collect();
        anyhow::anyhow!("Unknown service {:?}, expected one of {}", service_id, known.join(", "))
    })?;

    let mut context = AppContext::build(config)?;
    context.connect_wallet().await?;
    context.sync_wallet().await?;

    let runtime = &mut context.runtime;
    runtime.select_service(service);
    runtime.request_service();
    runtime.run_until_settled().await;

    if approve && runtime.session().state() == AgentState::PaymentRequired {
        runtime.approve_payment();
        runtime.run_until_settled().await;
    }

    let session = runtime.session();
    let report = json!({
        "summary": session.summary(),
        "mode": runtime.mode(),
        "activity": session.activity().to_vec(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    let failed = session.state() == AgentState::Error;
    if failed {
        error!(error = ?session.last_error(), "Flow ended in error");
    }
    Ok(failed)
}
