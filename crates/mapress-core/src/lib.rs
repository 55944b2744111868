//! # mapress-core
//!
//! Core library for turning LLM-produced news outlines into small,
//! citation-backed mind maps.
//!
//! This library provides:
//! - Outline parsing and shape validation
//! - Corroboration-based pruning to a node budget
//! - Outline to node/edge graph conversion
//! - Topic maps and their super-category groupings
//! - Article extraction helpers and map export
//!
//! ## Features
//!
//! - `default`: Pure data processing (no network)
//! - `orchestrator`: Search/fetch adapters, OpenRouter client, the streaming
//!   outline pipeline and the tool-calling topic-map agent
//!
//! ## Example
//!
//! ```no_run
//! use mapress_core::{outline_to_graph, parse_outline, prune_outline};
//!
//! # fn example(raw: &str) -> anyhow::Result<()> {
//! let outline = parse_outline(raw)?;
//! let pruned = prune_outline(&outline, 16);
//! let graph = outline_to_graph(&pruned);
//! println!("{}", serde_json::to_string_pretty(&graph)?);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod errors;
pub mod export;
pub mod graph;
pub mod parser;
pub mod prune;
pub mod super_categories;
pub mod topic_map;
pub mod types;
pub mod url_utils;
pub mod validate;

#[cfg(feature = "orchestrator")]
pub mod orchestrator;

// Re-export commonly used types
pub use types::{
    Category, Fact, GraphEdge, GraphNode, MindMap, NodePayload, Outline, Position, SourceRef,
};

pub use config::MapressConfig;
pub use errors::{ConfigError, OutlineError, ValidationError};
pub use export::{MapExport, export_filename};
pub use graph::{GraphBuilder, outline_to_graph};
pub use parser::{FetchedDocument, extract_document, html_to_markdown, sanitize_html};
pub use prune::{DEFAULT_MAX_NODES, corroboration_score, prune_outline};
pub use super_categories::{
    CategoryStats, SuperCategory, category_stats, generate_super_categories, nodes_for_category,
};
pub use topic_map::{MapRequest, TopicMap, TopicNode};
pub use validate::{parse_outline, validate_outline};

#[cfg(feature = "orchestrator")]
pub use parser::fetch_html;

/// Sample article extracts bundled for mock runs and tests.
pub const SAMPLE_DOCS_JSON: &str = include_str!("../fixtures/docs.sample.json");

/// Sample LLM outline bundled for mock runs and tests.
pub const SAMPLE_OUTLINE_JSON: &str = include_str!("../fixtures/outline.sample.json");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_outline_parses_and_validates() {
        let outline = parse_outline(SAMPLE_OUTLINE_JSON).unwrap();
        assert!(outline.categories.len() >= 3);
    }

    #[test]
    fn sample_docs_deserialize() {
        let docs = parser::parse_document_bundle(SAMPLE_DOCS_JSON).unwrap();
        assert_eq!(docs.len(), 8);
        assert!(docs.iter().all(|d| d.url.starts_with("https://")));
    }

    #[test]
    fn sample_outline_survives_full_flow() {
        let outline = parse_outline(SAMPLE_OUTLINE_JSON).unwrap();
        let pruned = prune_outline(&outline, DEFAULT_MAX_NODES);
        let graph = outline_to_graph(&pruned);

        assert!(pruned.node_count() <= DEFAULT_MAX_NODES);
        assert_eq!(graph.nodes.len(), pruned.node_count());
        assert_eq!(graph.edges.len(), pruned.fact_count());
    }
}
