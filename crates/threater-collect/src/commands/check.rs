//! `threater-collect check` command implementation
//!
//! One request against the lists endpoint. Reports "unreachable" and
//! "reachable but unauthorized" separately.

use super::Context;
use crate::api::endpoints::PROBE_PATH;
use crate::api::ApiClient;
use crate::error::Result;
use colored::Colorize;
use tracing::{info, warn};

pub async fn run(ctx: &Context) -> Result<()> {
    let connection = ctx.settings.connection()?;
    if connection.api_key.is_none() {
        warn!("no API key configured; expect the probe to be rejected");
    }
    let client = ApiClient::new(&connection)?;

    println!("Checking {} ...", client.base_url());
    match client.probe(PROBE_PATH).await {
        Ok(outcome) => {
            info!(status = outcome.status, elapsed_ms = outcome.elapsed_ms(), "probe succeeded");
            println!(
                "{} API reachable and credentials accepted (HTTP {}, {} ms)",
                "✓".green(),
                outcome.status,
                outcome.elapsed_ms()
            );
            Ok(())
        },
        Err(e) if e.is_reachable() => {
            println!("{} API reachable but the request was rejected: {}", "✗".red(), e);
            Err(e.into())
        },
        Err(e) => {
            println!("{} API unreachable: {}", "✗".red(), e);
            Err(e.into())
        },
    }
}
