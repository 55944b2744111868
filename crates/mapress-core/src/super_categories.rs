//! Fixed thematic groupings of topic-map nodes
//!
//! Membership comes from each node's `relatedTopics`; a node can sit in
//! several super categories at once.

use serde::Serialize;

use crate::topic_map::TopicNode;

struct Template {
    name: &'static str,
    description: &'static str,
    color: &'static str,
}

const TEMPLATES: [Template; 6] = [
    Template {
        name: "Technology",
        description: "AI, tech companies, digital innovation, software, hardware",
        color: "bg-blue-100 border-blue-300 text-blue-800",
    },
    Template {
        name: "Politics",
        description: "Government, policy, elections, political developments",
        color: "bg-red-100 border-red-300 text-red-800",
    },
    Template {
        name: "Economy",
        description: "Business, markets, financial trends, economic policy",
        color: "bg-green-100 border-green-300 text-green-800",
    },
    Template {
        name: "International",
        description: "Global affairs, diplomacy, international relations",
        color: "bg-purple-100 border-purple-300 text-purple-800",
    },
    Template {
        name: "Society",
        description: "Social issues, culture, public health, community",
        color: "bg-yellow-100 border-yellow-300 text-yellow-800",
    },
    Template {
        name: "Science",
        description: "Research, medical breakthroughs, scientific studies",
        color: "bg-indigo-100 border-indigo-300 text-indigo-800",
    },
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuperCategory {
    pub id: String,
    pub name: String,
    pub description: String,
    pub node_ids: Vec<String>,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryStats {
    pub total: usize,
    pub categories: Vec<CategoryCount>,
}

/// Group nodes under the six fixed templates, dropping templates with no members.
///
/// Ids are `super-cat-{k}`, numbered after empty templates are removed.
pub fn generate_super_categories<'a>(
    nodes: impl IntoIterator<Item = &'a TopicNode>,
) -> Vec<SuperCategory> {
    let mut members: Vec<Vec<String>> = vec![Vec::new(); TEMPLATES.len()];

    for node in nodes {
        let Some(topics) = &node.related_topics else {
            continue;
        };
        for topic in topics {
            if let Some(slot) = TEMPLATES.iter().position(|t| t.name == topic.as_str()) {
                if !members[slot].contains(&node.id) {
                    members[slot].push(node.id.clone());
                }
            }
        }
    }

    TEMPLATES
        .iter()
        .zip(members)
        .filter(|(_, node_ids)| !node_ids.is_empty())
        .enumerate()
        .map(|(k, (template, node_ids))| SuperCategory {
            id: format!("super-cat-{k}"),
            name: template.name.to_string(),
            description: template.description.to_string(),
            node_ids,
            color: template.color.to_string(),
        })
        .collect()
}

/// Nodes belonging to `category_id`, or every node when the id is unknown.
pub fn nodes_for_category<'a>(
    nodes: impl IntoIterator<Item = &'a TopicNode>,
    category_id: &str,
    super_categories: &[SuperCategory],
) -> Vec<&'a TopicNode> {
    let category = super_categories.iter().find(|c| c.id == category_id);
    nodes
        .into_iter()
        .filter(|node| category.is_none_or(|c| c.node_ids.contains(&node.id)))
        .collect()
}

/// Member counts per super category; `total` counts a node once per membership.
pub fn category_stats(super_categories: &[SuperCategory]) -> CategoryStats {
    CategoryStats {
        total: super_categories.iter().map(|c| c.node_ids.len()).sum(),
        categories: super_categories
            .iter()
            .map(|c| CategoryCount {
                name: c.name.clone(),
                count: c.node_ids.len(),
            })
            .collect(),
    }
}
