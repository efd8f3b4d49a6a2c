use clap::{Parser, Subcommand};
use postflow_backend::dispatcher::{
    ConsoleConfirm, ConsoleNotifier, DispatchOutcome, HttpWorkflowBackend, WorkflowDispatcher,
};
use postflow_backend::workflow::WorkflowAction;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(
    name = "workflow_cli",
    author,
    version,
    about = "Runs post workflow actions against a PostFlow server.",
    long_about = None
)]
struct Cli {
    /// Base URL of the server, e.g. http://127.0.0.1:8080
    #[arg(long, env = "POSTFLOW_SERVER")]
    server: String,

    #[arg(long, env = "POSTFLOW_USERNAME")]
    username: String,

    #[arg(long, env = "POSTFLOW_PASSWORD", hide_env_values = true)]
    password: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Lists the actions you may run on a post right now.
    Actions { post_id: String },
    /// Confirms and runs one action.
    Run {
        post_id: String,
        action: WorkflowAction,
        /// Skip the confirmation question.
        #[arg(long)]
        yes: bool,
    },
}

#[actix_web::main]
async fn main() -> ExitCode {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("warn"));
    let cli = Cli::parse();

    let backend = match HttpWorkflowBackend::new(&cli.server) {
        Ok(backend) => backend,
        Err(e) => {
            eprintln!("❌ Error: Could not create HTTP client: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = backend.login(&cli.username, &cli.password).await {
        eprintln!("❌ Login failed: {}", e);
        return ExitCode::FAILURE;
    }

    match cli.command {
        Commands::Actions { post_id } => match backend.fetch_actions(&post_id).await {
            Ok(actions) if actions.is_empty() => {
                println!("No actions available for post {}.", post_id);
                ExitCode::SUCCESS
            }
            Ok(actions) => {
                println!("Actions available for post {}:", post_id);
                for action in actions {
                    println!("- {:<14} {} ({})", action.key.key(), action.label, action.variant);
                }
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("❌ Error: {}", e);
                ExitCode::FAILURE
            }
        },
        Commands::Run { post_id, action, yes } => {
            let dispatcher = WorkflowDispatcher::new(backend);
            let confirm = ConsoleConfirm { assume_yes: yes };
            let outcome = dispatcher
                .dispatch(&post_id, action, &confirm, &ConsoleNotifier, |reply| {
                    println!("Post {} is now {}.", post_id, reply.status);
                })
                .await;

            match outcome {
                DispatchOutcome::Completed { .. } => ExitCode::SUCCESS,
                DispatchOutcome::Cancelled => {
                    println!("Cancelled.");
                    ExitCode::SUCCESS
                }
                DispatchOutcome::Failed { error } if error.is_conflict() => {
                    eprintln!("The post was moved on by someone else. See 'actions {}'.", post_id);
                    ExitCode::FAILURE
                }
                DispatchOutcome::Busy | DispatchOutcome::Failed { .. } => ExitCode::FAILURE,
            }
        }
    }
}
