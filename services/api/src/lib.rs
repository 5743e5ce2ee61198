mod cli;
mod infra;
mod routes;
mod score;
mod server;

use zone_insights::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
