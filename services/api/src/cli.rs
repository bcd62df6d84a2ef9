use crate::commands::{run_bands, run_predict, PredictArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use tea_screen::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "TEA Screening Service",
    about = "Score screening questionnaire submissions and serve the results",
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
    /// Score one submission from the form export and print the result
    Predict(PredictArgs),
    /// Print the severity bands of the configured threshold
    Bands,
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
        Command::Predict(args) => run_predict(args),
        Command::Bands => run_bands(),
    }
}
