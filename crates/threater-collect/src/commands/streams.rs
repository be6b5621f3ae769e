//! `threater-collect streams` command implementation

use super::Context;
use crate::checkpoint::{CheckpointStore, SqliteCheckpointStore};
use crate::error::Result;
use crate::streams::CATALOG;
use colored::Colorize;
use threater_common::CheckpointKey;

/// Print the catalog with enabled flags and stored checkpoints.
pub async fn run(ctx: &Context) -> Result<()> {
    let store = SqliteCheckpointStore::open(&ctx.state_dir)?;

    println!("{}", "ThreatER Streams:".cyan().bold());
    println!();

    for descriptor in CATALOG {
        let enabled = ctx.settings.toggles.is_enabled(descriptor.group);
        let key = CheckpointKey::new(descriptor.name, descriptor.checkpoint_key);
        let checkpoint = store.get(&key).await?;

        let name = if enabled {
            descriptor.name.green()
        } else {
            descriptor.name.dimmed()
        };
        println!("{}", name);
        match descriptor.fan_out {
            Some(ref fan) => println!("  Endpoint:   {} -> {}", fan.parent_path, fan.child_path_template),
            None => println!("  Endpoint:   {}", descriptor.endpoint_path),
        }
        println!("  Sourcetype: {}", descriptor.sourcetype);
        println!(
            "  Group:      {} ({})",
            descriptor.group,
            if enabled { "enabled" } else { "disabled" }
        );
        println!(
            "  Checkpoint: {}",
            checkpoint.as_deref().unwrap_or("none")
        );
        println!();
    }

    println!("  Total streams: {}", CATALOG.len());
    println!("  State dir:     {}", ctx.state_dir.display());
    Ok(())
}
