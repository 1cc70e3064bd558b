mod app;
mod cli;
mod listing;
mod telemetry;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use crate::app::App;
use crate::cli::Args;
use crate::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let args = Args::parse();
    init_telemetry(&args)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting adaptor");

    let result = match App::build(args) {
        Ok(app) => app.run().await,
        Err(e) => Err(e),
    };

    if let Err(ref e) = result {
        error!("Adaptor error: {:#}", e);
    }

    result
}
