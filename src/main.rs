//
// main.rs
// MedView-rs
//
// Tokio entry point that hands off execution to the CLI layer so volumes load on the blocking pool.
//
// Thales Matheus Mendonça Santos - November 2025

use medview::cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::run().await
}
