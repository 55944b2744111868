//! Outline and graph types shared across mapress

use serde::{Deserialize, Serialize};

/// A citation backing a fact or category. Identity is the URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRef {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outlet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote: Option<String>,
}

impl SourceRef {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            outlet: None,
            published_at: None,
            quote: None,
        }
    }
}

/// A short, cited statement under a category.
///
/// Every bullet is backed by `sources` as a whole; there is no per-bullet mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fact {
    pub title: String,
    pub bullets: Vec<String>,
    pub sources: Vec<SourceRef>,
}

/// A top-level grouping of facts. Owns its facts exclusively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub title: String,
    pub facts: Vec<Fact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<SourceRef>>,
}

/// The category/fact tree produced for one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outline {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub generated_at: String,
    pub categories: Vec<Category>,
}

impl Outline {
    /// Categories plus all of their facts.
    pub fn node_count(&self) -> usize {
        self.categories.len() + self.fact_count()
    }

    pub fn fact_count(&self) -> usize {
        self.categories.iter().map(|c| c.facts.len()).sum()
    }
}

/// Placeholder coordinate; real layout happens downstream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryData {
    pub title: String,
    pub sources: Vec<SourceRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FactData {
    pub title: String,
    pub bullets: Vec<String>,
    pub sources: Vec<SourceRef>,
}

/// Kind-tagged payload of a graph node, serialized as `"kind"` + `"data"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum NodePayload {
    Category(CategoryData),
    Fact(FactData),
}

/// A node in the mind map
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphNode {
    pub id: String,
    #[serde(flatten)]
    pub payload: NodePayload,
    pub position: Position,
}

impl GraphNode {
    pub fn title(&self) -> &str {
        match &self.payload {
            NodePayload::Category(data) => &data.title,
            NodePayload::Fact(data) => &data.title,
        }
    }

    pub fn is_category(&self) -> bool {
        matches!(self.payload, NodePayload::Category(_))
    }

    pub fn sources(&self) -> &[SourceRef] {
        match &self.payload {
            NodePayload::Category(data) => &data.sources,
            NodePayload::Fact(data) => &data.sources,
        }
    }
}

/// An edge connecting a category to one of its facts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    pub id: String,
    pub source: String,
    pub target: String,
}

/// A complete renderable mind map
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct MindMap {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}
