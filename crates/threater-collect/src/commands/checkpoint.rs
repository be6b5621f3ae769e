//! `threater-collect checkpoint` command implementation

use super::{resolve_stream, Context};
use crate::checkpoint::{CheckpointStore, SqliteCheckpointStore};
use crate::error::Result;
use colored::Colorize;
use threater_common::CheckpointKey;
use tracing::info;

fn key_for(stream: &str) -> Result<CheckpointKey> {
    let descriptor = resolve_stream(stream)?;
    Ok(CheckpointKey::new(descriptor.name, descriptor.checkpoint_key))
}

/// Print the stored checkpoint.
pub async fn show(ctx: &Context, stream: &str) -> Result<Option<String>> {
    let key = key_for(stream)?;
    let store = SqliteCheckpointStore::open(&ctx.state_dir)?;

    match store.stored(&key)? {
        Some(row) => {
            println!("{}", key.to_string().green());
            println!("  Value:   {}", row.value);
            println!("  Updated: {}", row.updated_at);
            if let Some(path) = store.path() {
                println!("  Store:   {}", path.display());
            }
            Ok(Some(row.value))
        },
        None => {
            println!("{} has no checkpoint; the next run collects everything.", key);
            Ok(None)
        },
    }
}

/// Forget the stored checkpoint.
pub async fn reset(ctx: &Context, stream: &str) -> Result<bool> {
    let key = key_for(stream)?;
    let store = SqliteCheckpointStore::open(&ctx.state_dir)?;

    let removed = store.clear(&key).await?;
    if removed {
        info!(checkpoint = %key, "checkpoint reset");
        println!("{} Reset {}", "✓".green(), key);
    } else {
        println!("{} had no checkpoint", key);
    }
    Ok(removed)
}
