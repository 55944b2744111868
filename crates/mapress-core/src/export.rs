//! Portable JSON export of a rendered map

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::Serialize;

use crate::types::{GraphEdge, GraphNode, MindMap};

pub const EXPORT_VERSION: &str = "1.0";

/// RFC 3339 UTC timestamp with millisecond precision, e.g. `2024-01-15T10:00:00.000Z`.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn now_timestamp() -> String {
    timestamp(Utc::now())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapExport {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub exported_at: String,
    pub version: &'static str,
}

impl MapExport {
    pub fn new(graph: MindMap, exported_at: DateTime<Utc>) -> Self {
        Self {
            nodes: graph.nodes,
            edges: graph.edges,
            exported_at: timestamp(exported_at),
            version: EXPORT_VERSION,
        }
    }
}

/// `mapress-export-YYYY-MM-DD.{extension}`
pub fn export_filename(date: NaiveDate, extension: &str) -> String {
    format!("mapress-export-{}.{extension}", date.format("%Y-%m-%d"))
}
