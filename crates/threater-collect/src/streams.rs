//! Stream catalog
//!
//! One declarative [`StreamDescriptor`] per ThreatER connector. Nothing in
//! here performs I/O; the orchestrator interprets the descriptors.

use crate::api::endpoints;
use serde::Serialize;

/// Prefix shared by every connector name.
pub const CONNECTOR_PREFIX: &str = "threater_";

/// Setup toggle a stream belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamGroup {
    Events,
    Lists,
    Enforcers,
    Networks,
    Users,
    Reports,
}

impl StreamGroup {
    pub fn as_str(self) -> &'static str {
        match self {
            StreamGroup::Events => "events",
            StreamGroup::Lists => "lists",
            StreamGroup::Enforcers => "enforcers",
            StreamGroup::Networks => "networks",
            StreamGroup::Users => "users",
            StreamGroup::Reports => "reports",
        }
    }
}

impl std::fmt::Display for StreamGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Two-level collection: enumerate parents, then paginate each parent's
/// children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FanOut {
    /// Parent collection, traversed without a since filter
    pub parent_path: &'static str,
    pub parent_page_size: u32,
    /// Child path with an `{id}` placeholder
    pub child_path_template: &'static str,
    /// Parent field holding the id substituted into the child path
    pub parent_id_field: &'static str,
    /// `(output field, parent field)` pairs copied into each emitted payload
    pub parent_context: &'static [(&'static str, &'static str)],
    /// Output field holding the raw child record
    pub child_field: &'static str,
}

impl FanOut {
    /// Child endpoint of one parent, with the id percent-encoded as a single
    /// path segment. `None` when the id cannot be one (`.` or `..`).
    pub fn child_path(&self, parent_id: &str) -> Option<String> {
        let segment = endpoints::path_segment(parent_id)?;
        Some(self.child_path_template.replace("{id}", &segment))
    }
}

/// Everything that distinguishes one connector from another
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamDescriptor {
    /// Connector name; also the checkpoint namespace
    pub name: &'static str,
    pub endpoint_path: &'static str,
    pub sourcetype: &'static str,
    pub checkpoint_key: &'static str,
    /// Query parameter carrying the checkpoint lower bound
    pub since_param: &'static str,
    /// Record fields probed in order for the checkpoint timestamp
    pub timestamp_fields: &'static [&'static str],
    pub page_size: u32,
    pub group: StreamGroup,
    pub fan_out: Option<FanOut>,
}

impl StreamDescriptor {
    /// Name without the `threater_` prefix.
    pub fn short_name(&self) -> &'static str {
        self.name.strip_prefix(CONNECTOR_PREFIX).unwrap_or(self.name)
    }
}

#[allow(clippy::too_many_arguments)]
const fn simple(
    name: &'static str,
    endpoint_path: &'static str,
    sourcetype: &'static str,
    checkpoint_key: &'static str,
    since_param: &'static str,
    timestamp_fields: &'static [&'static str],
    page_size: u32,
    group: StreamGroup,
) -> StreamDescriptor {
    StreamDescriptor {
        name,
        endpoint_path,
        sourcetype,
        checkpoint_key,
        since_param,
        timestamp_fields,
        page_size,
        group,
        fan_out: None,
    }
}

const UPDATED_AT: &[&str] = &["updated_at"];

/// Every connector, in catalog order
pub static CATALOG: &[StreamDescriptor] = &[
    simple(
        "threater_block_events",
        "/events/block",
        "threater:block_event",
        "block_events_last_timestamp",
        "after",
        &["timestamp"],
        500,
        StreamGroup::Events,
    ),
    simple(
        "threater_command_logs",
        "/command/logs",
        "threater:command_log",
        "command_logs_last_timestamp",
        "created_after",
        &["created_at", "executed_at", "timestamp"],
        200,
        StreamGroup::Events,
    ),
    simple(
        "threater_ioc_results",
        "/ioc/results",
        "threater:ioc_result",
        "ioc_results_last_updated",
        "updated_after",
        &["updated_at", "last_seen", "timestamp"],
        200,
        StreamGroup::Events,
    ),
    simple(
        "threater_lists",
        "/lists",
        "threater:list",
        "lists_last_updated",
        "updated_after",
        UPDATED_AT,
        200,
        StreamGroup::Lists,
    ),
    simple(
        "threater_block_lists",
        "/lists/block",
        "threater:block_list",
        "block_lists_last_updated",
        "updated_after",
        UPDATED_AT,
        200,
        StreamGroup::Lists,
    ),
    simple(
        "threater_external_lists",
        "/external-lists",
        "threater:external_list",
        "external_lists_last_updated",
        "updated_after",
        UPDATED_AT,
        200,
        StreamGroup::Lists,
    ),
    StreamDescriptor {
        name: "threater_list_entries",
        endpoint_path: "/lists/{id}/entries",
        sourcetype: "threater:list_entry",
        checkpoint_key: "list_entries_last_updated",
        since_param: "updated_after",
        timestamp_fields: UPDATED_AT,
        page_size: 200,
        group: StreamGroup::Lists,
        fan_out: Some(FanOut {
            parent_path: "/lists",
            parent_page_size: 200,
            child_path_template: "/lists/{id}/entries",
            parent_id_field: "id",
            parent_context: &[("list_id", "id"), ("list_name", "name"), ("list_type", "type")],
            child_field: "entry",
        }),
    },
    simple(
        "threater_enforcers",
        "/enforcers",
        "threater:enforcer",
        "enforcers_last_updated",
        "updated_after",
        UPDATED_AT,
        200,
        StreamGroup::Enforcers,
    ),
    simple(
        "threater_networks",
        "/networks",
        "threater:network",
        "networks_last_updated",
        "updated_after",
        UPDATED_AT,
        200,
        StreamGroup::Networks,
    ),
    simple(
        "threater_policy_networks",
        "/policies/networks",
        "threater:policy_network",
        "policy_networks_last_updated",
        "updated_after",
        UPDATED_AT,
        200,
        StreamGroup::Networks,
    ),
    simple(
        "threater_ports",
        "/ports",
        "threater:port",
        "ports_last_updated",
        "updated_after",
        UPDATED_AT,
        200,
        StreamGroup::Networks,
    ),
    simple(
        "threater_reports",
        "/reports",
        "threater:report",
        "reports_last_updated",
        "created_after",
        &["created_at", "generated_at"],
        200,
        StreamGroup::Reports,
    ),
    simple(
        "threater_subscriptions",
        "/subscriptions",
        "threater:subscription",
        "subscriptions_last_updated",
        "updated_after",
        &["updated_at", "last_updated"],
        200,
        StreamGroup::Users,
    ),
    simple(
        "threater_user_activity",
        "/users/activity",
        "threater:user_activity",
        "user_activity_last_timestamp",
        "created_after",
        &["created_at", "event_time", "timestamp"],
        200,
        StreamGroup::Users,
    ),
];

/// Look a stream up by connector name, with or without the `threater_` prefix.
pub fn find(name: &str) -> Option<&'static StreamDescriptor> {
    let name = name.trim();
    CATALOG
        .iter()
        .find(|d| d.name == name || d.short_name() == name)
}
