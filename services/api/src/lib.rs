mod cli;
mod commands;
mod infra;
mod routes;
mod server;

use tea_screen::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
