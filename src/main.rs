use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::io::Write;
use std::sync::Arc;
use stratflow_rs::flow::{Field, SessionStore, WorkflowState};
use stratflow_rs::intel::config::Config;
use stratflow_rs::intel::phases::{PhaseController, DEFAULT_TRIGGER};
use stratflow_rs::intel::pipelines::{audience, competitive};
use stratflow_rs::intel::server;
use stratflow_rs::intel::tools::ToolInvoker;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP API
    Serve {
        /// Port to listen on (overrides PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run the full workflow interactively, pausing at the checkpoint
    Run {
        /// The trigger message
        #[arg(short, long, default_value = DEFAULT_TRIGGER)]
        trigger: String,
    },
    /// Run only phase 1 (competitive analysis) and print the report
    Phase1,
}

fn build_controller(config: &Config) -> anyhow::Result<Arc<PhaseController>> {
    let primary = Arc::new(ToolInvoker::new(config.primary_toolbox_url.clone()));
    let secondary = Arc::new(ToolInvoker::new(config.secondary_toolbox_url.clone()));

    let competitive = competitive::production_pipeline(config, &primary, &secondary)?;
    let audience = audience::production_pipeline(config, &primary, &secondary)?;

    let store = Arc::new(SessionStore::new());
    Ok(Arc::new(PhaseController::new(
        competitive,
        audience,
        store,
    )?))
}

async fn run_interactive(config: &Config, trigger: &str) -> anyhow::Result<()> {
    let controller = build_controller(config)?;
    let session_id = PhaseController::mint_session_id();

    println!("Starting phase 1 (competitive analysis)...");
    let outcome = controller.trigger(&session_id, trigger).await?;

    if outcome.suspended_before.is_none() {
        // Phase 1 errored straight through to the final report
        println!("{}", outcome.state.text_or_empty(Field::FinalSummary));
        return Ok(());
    }

    println!("{}", outcome.state.text_or_empty(Field::CheckpointMessage));
    print!("\nYour response: ");
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    let input = input.trim();
    let input = if input.is_empty() { "proceed" } else { input };

    println!("\nResuming with: '{}'", input);
    let final_outcome = controller.resume(&session_id, input).await?;

    let output = final_outcome
        .state
        .text_or_empty(Field::CreativeIntelligence);
    if !output.is_empty() {
        println!("{}", output);
    }
    println!("{}", final_outcome.state.text_or_empty(Field::FinalSummary));
    Ok(())
}

async fn run_phase1_only(config: &Config) -> anyhow::Result<()> {
    let primary = Arc::new(ToolInvoker::new(config.primary_toolbox_url.clone()));
    let secondary = Arc::new(ToolInvoker::new(config.secondary_toolbox_url.clone()));

    let pipeline = competitive::production_pipeline(config, &primary, &secondary)?;
    let result = pipeline.run(WorkflowState::empty()).await;

    println!("{}", result.text_or_empty(Field::FinalReport));
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let config = Config::from_env()?;

    match args.command {
        Commands::Serve { port } => {
            let controller = build_controller(&config)?;
            let port = port.unwrap_or(config.port);
            server::serve(port, controller)
                .await
                .map_err(|e| anyhow::anyhow!(e))?;
        }
        Commands::Run { trigger } => run_interactive(&config, &trigger).await?,
        Commands::Phase1 => run_phase1_only(&config).await?,
    }

    Ok(())
}
