//! `threater-collect run` and `run-enabled`

use super::{resolve_stream, Context};
use crate::api::ApiClient;
use crate::checkpoint::SqliteCheckpointStore;
use crate::error::Result;
use crate::orchestrator::{run_stream, RunOptions, RunSummary};
use crate::sink::{self, EventSink};
use crate::streams::StreamDescriptor;
use std::path::Path;
use tracing::{info, warn};

struct Session {
    client: ApiClient,
    store: SqliteCheckpointStore,
    sink: Box<dyn EventSink>,
}

impl Session {
    /// Validate settings before anything is opened.
    fn open(ctx: &Context, output: Option<&Path>) -> Result<Self> {
        let connection = ctx.settings.connection()?;
        connection.require_credentials()?;

        Ok(Self {
            client: ApiClient::new(&connection)?,
            store: SqliteCheckpointStore::open(&ctx.state_dir)?,
            sink: sink::open(output)?,
        })
    }

    async fn collect(&mut self, descriptor: &StreamDescriptor, options: &RunOptions) -> Result<RunSummary> {
        let summary = run_stream(descriptor, &self.client, &self.store, &mut self.sink, options).await?;
        eprintln!("{}", serde_json::to_string(&summary)?);
        Ok(summary)
    }
}

/// Collect one stream.
pub async fn run(
    ctx: &Context,
    stream: &str,
    output: Option<&Path>,
    max_pages: Option<u32>,
) -> Result<RunSummary> {
    let descriptor = resolve_stream(stream)?;
    let mut session = Session::open(ctx, output)?;
    let options = RunOptions {
        max_pages: max_pages.or(ctx.settings.max_pages),
    };
    session.collect(descriptor, &options).await
}

/// Collect every enabled stream, one after another, stopping at the first
/// failure.
pub async fn run_enabled(ctx: &Context, output: Option<&Path>) -> Result<Vec<RunSummary>> {
    let streams: Vec<_> = ctx.enabled_streams().collect();
    if streams.is_empty() {
        warn!("every stream group is disabled; nothing to collect");
        return Ok(Vec::new());
    }

    let mut session = Session::open(ctx, output)?;
    let options = RunOptions {
        max_pages: ctx.settings.max_pages,
    };

    let mut summaries = Vec::with_capacity(streams.len());
    for descriptor in streams {
        summaries.push(session.collect(descriptor, &options).await?);
    }
    info!(streams = summaries.len(), "all enabled streams collected");
    Ok(summaries)
}
