//! Outline to mind-map conversion

pub use crate::types::{GraphEdge, GraphNode, MindMap};
use crate::types::{Category, CategoryData, FactData, NodePayload, Outline, Position};

/// Horizontal column of fact nodes.
pub const FACT_COLUMN_X: f64 = 300.0;
/// Vertical distance between consecutive categories.
pub const CATEGORY_SPACING_Y: f64 = 120.0;
/// Vertical offset between facts of one category.
pub const FACT_SPACING_Y: f64 = 90.0;

pub fn category_node_id(ci: usize) -> String {
    format!("cat-{ci}")
}

pub fn fact_node_id(ci: usize, fi: usize) -> String {
    format!("cat-{ci}-fact-{fi}")
}

pub fn edge_id(source: &str, target: &str) -> String {
    format!("e-{source}-{target}")
}

/// Build a mind map from outlines, one category at a time.
///
/// Ids are derived from positions in the outline only, so identical outlines
/// always produce identical graphs.
pub struct GraphBuilder {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    next_category: usize,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            next_category: 0,
        }
    }

    pub fn ingest_outline(&mut self, outline: &Outline) {
        for category in &outline.categories {
            self.ingest_category(category);
        }
    }

    fn ingest_category(&mut self, category: &Category) {
        let ci = self.next_category;
        self.next_category += 1;

        let category_id = category_node_id(ci);
        let base_y = ci as f64 * CATEGORY_SPACING_Y;

        self.nodes.push(GraphNode {
            id: category_id.clone(),
            payload: NodePayload::Category(CategoryData {
                title: category.title.clone(),
                sources: category.sources.clone().unwrap_or_default(),
            }),
            position: Position { x: 0.0, y: base_y },
        });

        for (fi, fact) in category.facts.iter().enumerate() {
            let fact_id = fact_node_id(ci, fi);
            self.nodes.push(GraphNode {
                id: fact_id.clone(),
                payload: NodePayload::Fact(FactData {
                    title: fact.title.clone(),
                    bullets: fact.bullets.clone(),
                    sources: fact.sources.clone(),
                }),
                position: Position {
                    x: FACT_COLUMN_X,
                    y: base_y + fi as f64 * FACT_SPACING_Y,
                },
            });
            self.edges.push(GraphEdge {
                id: edge_id(&category_id, &fact_id),
                source: category_id.clone(),
                target: fact_id,
            });
        }
    }

    pub fn into_graph(self) -> MindMap {
        MindMap {
            nodes: self.nodes,
            edges: self.edges,
        }
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Flatten an outline into category and fact nodes joined by category→fact edges.
pub fn outline_to_graph(outline: &Outline) -> MindMap {
    let mut builder = GraphBuilder::new();
    builder.ingest_outline(outline);
    builder.into_graph()
}
