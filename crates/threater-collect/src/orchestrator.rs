//! Incremental collection run
//!
//! One run reads the stored checkpoint, pages through the stream's endpoint
//! with the checkpoint as lower bound, emits every record, flushes the sink
//! and only then commits the newest timestamp seen. A failure anywhere aborts
//! the run without touching the checkpoint, so the next run re-emits from the
//! old position (at-least-once).

use crate::api::types::{QueryParams, Record, LIMIT_PARAM};
use crate::checkpoint::CheckpointStore;
use crate::error::Result;
use crate::pagination::{traverse, PageSource, Paginator};
use crate::sink::{Event, EventSink};
use crate::streams::{FanOut, StreamDescriptor};
use futures::TryStreamExt;
use serde::Serialize;
use serde_json::value::RawValue;
use serde_json::Value;
use std::time::Instant;
use threater_common::{CheckpointKey, HighWaterMark};
use tracing::{debug, info, instrument, warn};

/// Per-run knobs
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Page ceiling per traversal; `None` is unbounded
    pub max_pages: Option<u32>,
}

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub connector: String,
    pub sourcetype: String,
    pub records_emitted: u64,
    pub pages_fetched: u64,
    pub parents_visited: u64,
    pub checkpoint_before: Option<String>,
    pub newest_timestamp_seen: Option<String>,
    pub checkpoint_committed: Option<String>,
    pub elapsed_ms: u64,
}

struct RunState<'d> {
    descriptor: &'d StreamDescriptor,
    mark: HighWaterMark,
    newest_seen: Option<String>,
    records: u64,
    pages: u64,
    parents: u64,
}

impl<'d> RunState<'d> {
    fn observe(&mut self, child: &Record) {
        if let Some(ts) = probe_timestamp(child, self.descriptor.timestamp_fields) {
            if self.newest_seen.as_deref().map_or(true, |seen| ts.as_str() > seen) {
                self.newest_seen = Some(ts.clone());
            }
            self.mark.advance(&ts);
        }
    }
}

/// Run one stream to completion.
#[instrument(skip_all, fields(connector = descriptor.name))]
pub async fn run_stream<S, C, K>(
    descriptor: &StreamDescriptor,
    source: &S,
    store: &C,
    sink: &mut K,
    options: &RunOptions,
) -> Result<RunSummary>
where
    S: PageSource + ?Sized,
    C: CheckpointStore + ?Sized,
    K: EventSink + ?Sized,
{
    let started = Instant::now();
    let key = CheckpointKey::new(descriptor.name, descriptor.checkpoint_key);
    let mark = HighWaterMark::new(store.get(&key).await?);
    info!(checkpoint = mark.initial().unwrap_or("none"), "collection started");

    let mut params = QueryParams::new();
    params.insert(LIMIT_PARAM.to_string(), descriptor.page_size.to_string());
    if let Some(since) = mark.initial() {
        params.insert(descriptor.since_param.to_string(), since.to_string());
    }

    let mut state = RunState {
        descriptor,
        mark,
        newest_seen: None,
        records: 0,
        pages: 0,
        parents: 0,
    };

    match descriptor.fan_out {
        None => {
            collect_pages(
                source,
                descriptor.endpoint_path,
                params,
                None,
                &mut state,
                sink,
                options,
            )
            .await?;
        },
        Some(ref fan) => fan_out(fan, source, params, &mut state, sink, options).await?,
    }

    // Events must be durable before the checkpoint moves past them.
    sink.flush()?;

    let committed = match state.mark.committable() {
        Some(value) => {
            store.set(&key, value).await?;
            info!(checkpoint = value, "checkpoint updated");
            Some(value.to_string())
        },
        None => {
            debug!("checkpoint unchanged");
            None
        },
    };

    let summary = RunSummary {
        connector: descriptor.name.to_string(),
        sourcetype: descriptor.sourcetype.to_string(),
        records_emitted: state.records,
        pages_fetched: state.pages,
        parents_visited: state.parents,
        checkpoint_before: state.mark.initial().map(str::to_string),
        newest_timestamp_seen: state.newest_seen,
        checkpoint_committed: committed,
        elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
    };
    info!(
        records = summary.records_emitted,
        pages = summary.pages_fetched,
        high_water_mark = state.mark.current().unwrap_or("none"),
        elapsed_ms = summary.elapsed_ms,
        "collection complete"
    );
    Ok(summary)
}

/// Page through one endpoint, emitting each record (wrapped in parent
/// context when given).
async fn collect_pages<S, K>(
    source: &S,
    endpoint_path: &str,
    params: QueryParams,
    parent: Option<&ParentContext>,
    state: &mut RunState<'_>,
    sink: &mut K,
    options: &RunOptions,
) -> Result<()>
where
    S: PageSource + ?Sized,
    K: EventSink + ?Sized,
{
    let mut paginator = Paginator::new(source, endpoint_path, params).with_max_pages(options.max_pages);

    while let Some(page) = paginator.next_page().await? {
        state.pages += 1;
        let count = page.records.len();

        for record in page.records {
            state.observe(&record);
            let payload = match parent {
                Some(ctx) => ctx.wrap(&record)?,
                None => record,
            };
            sink.write(&Event::new(state.descriptor.sourcetype, payload))?;
            state.records += 1;
        }

        info!(
            endpoint = endpoint_path,
            page = paginator.pages_fetched(),
            records = count,
            total = state.records,
            "fetched page"
        );
    }
    Ok(())
}

async fn fan_out<S, K>(
    fan: &FanOut,
    source: &S,
    child_params: QueryParams,
    state: &mut RunState<'_>,
    sink: &mut K,
    options: &RunOptions,
) -> Result<()>
where
    S: PageSource + ?Sized,
    K: EventSink + ?Sized,
{
    let mut parent_params = QueryParams::new();
    parent_params.insert(LIMIT_PARAM.to_string(), fan.parent_page_size.to_string());

    let mut paginator =
        Paginator::new(source, fan.parent_path, parent_params).with_max_pages(options.max_pages);
    let mut parents = traverse(&mut paginator);

    while let Some(raw_parent) = parents.try_next().await? {
        let Some(ctx) = ParentContext::from_parent(fan, &raw_parent)? else {
            warn!(parent = raw_parent.get(), "parent without a usable id skipped");
            continue;
        };
        state.parents += 1;
        debug!(parent = %ctx.id, path = %ctx.path, "collecting children");

        collect_pages(source, &ctx.path, child_params.clone(), Some(&ctx), state, sink, options).await?;
    }
    drop(parents);

    state.pages += u64::from(paginator.pages_fetched());
    Ok(())
}

/// Parent fields copied into every child payload
struct ParentContext {
    id: String,
    /// Child endpoint with the id already encoded
    path: String,
    /// `{"field":value,...,` ready for the child to be appended
    prefix: String,
    child_field: &'static str,
}

impl ParentContext {
    /// `None` when the parent has no usable id.
    fn from_parent(fan: &FanOut, parent: &Record) -> Result<Option<Self>> {
        let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(parent.get()) else {
            return Ok(None);
        };
        let id = match fields.get(fan.parent_id_field) {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return Ok(None),
        };
        let Some(path) = fan.child_path(&id) else {
            return Ok(None);
        };

        let mut prefix = String::from("{");
        for (out_field, parent_field) in fan.parent_context {
            prefix.push_str(&serde_json::to_string(out_field)?);
            prefix.push(':');
            prefix.push_str(&serde_json::to_string(
                fields.get(*parent_field).unwrap_or(&Value::Null),
            )?);
            prefix.push(',');
        }

        Ok(Some(Self {
            id,
            path,
            prefix,
            child_field: fan.child_field,
        }))
    }

    fn wrap(&self, child: &RawValue) -> Result<Record> {
        let payload = format!(
            "{}{}:{}}}",
            self.prefix,
            serde_json::to_string(self.child_field)?,
            child.get()
        );
        Ok(RawValue::from_string(payload)?)
    }
}

/// First non-empty string among `fields`, in order.
fn probe_timestamp(record: &RawValue, fields: &[&str]) -> Option<String> {
    let Ok(Value::Object(map)) = serde_json::from_str::<Value>(record.get()) else {
        return None;
    };
    fields.iter().find_map(|f| match map.get(*f) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    })
}
