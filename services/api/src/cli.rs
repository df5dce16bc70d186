use crate::commands::{run_score, run_weights, InputArgs, WeightsCommand};
use crate::demo::{run_demo, DemoArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use loan_scorecard::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Loan Scorecard",
    about = "Score loan applicants and manage scorecard weights from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Score an applicant read from a JSON attribute file
    Score(InputArgs),
    /// Inspect or change the active weight configuration
    Weights {
        #[command(subcommand)]
        command: WeightsCommand,
    },
    /// Walk through scoring and weight management against a scratch data directory
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Score(args) => run_score(args),
        Command::Weights { command } => run_weights(command),
        Command::Demo(args) => run_demo(args),
    }
}
