// src/main.rs
use poll_ledger::{config::Config, logging, BoxError};

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    dotenvy::dotenv().ok(); // Load environment variables from .env file

    let config = Config::load()?;
    logging::init(config.log_format, &config.log_level)?;

    poll_ledger::run(config).await
}
