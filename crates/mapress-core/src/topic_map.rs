//! Topic maps produced by the tool-calling generation path
//!
//! A topic map is a richer sibling of the outline graph: nodes carry
//! analytical summaries and labelled edges connect topics to each other.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::ValidationError;
use crate::validate::{check_absolute_url, check_count, check_length};

pub const MAX_TOPIC_TITLE_CHARS: usize = 100;
pub const MAX_SUMMARY_CHARS: usize = 2000;
pub const DEPTH_RANGE: RangeInclusive<u8> = 1..=3;
pub const RECENCY_DAYS_RANGE: RangeInclusive<u32> = 1..=365;
pub const MAX_SOURCES_RANGE: RangeInclusive<usize> = 1..=20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicNode {
    pub id: String,
    pub title: String,
    pub summary: String,
    #[serde(default)]
    pub citations: Vec<Citation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_points: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implications: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_topics: Option<Vec<String>>,
}

impl TopicNode {
    fn placeholder(id: &str, title: &str, summary: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            summary: summary.to_string(),
            citations: Vec::new(),
            children: None,
            key_points: None,
            context: None,
            implications: None,
            related_topics: None,
        }
    }

    pub fn validate(&self, path: &str) -> Result<(), ValidationError> {
        check_length(&format!("{path}.title"), &self.title, MAX_TOPIC_TITLE_CHARS)?;
        check_length(&format!("{path}.summary"), &self.summary, MAX_SUMMARY_CHARS)?;
        if self.citations.is_empty() {
            return Err(ValidationError::TooFew {
                path: format!("{path}.citations"),
                min: 1,
                actual: 0,
            });
        }
        for (i, citation) in self.citations.iter().enumerate() {
            check_absolute_url(&format!("{path}.citations[{i}].url"), &citation.url)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicEdge {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicMap {
    pub topic: String,
    pub generated_at: String,
    pub depth: u8,
    pub nodes: BTreeMap<String, TopicNode>,
    pub edges: Vec<TopicEdge>,
}

impl TopicMap {
    /// Returned when every generation strategy failed.
    pub fn generation_failed(topic: &str, depth: u8, generated_at: String) -> Self {
        Self::single(
            topic,
            depth,
            generated_at,
            TopicNode::placeholder(
                "error",
                "Generation Failed",
                "Unable to generate topic map. Please try again later.",
            ),
        )
    }

    /// Returned when generation succeeded but found nothing.
    pub fn no_content(topic: &str, depth: u8, generated_at: String) -> Self {
        Self::single(
            topic,
            depth,
            generated_at,
            TopicNode::placeholder(
                "default",
                "No Content Found",
                "No relevant content could be found for this topic.",
            ),
        )
    }

    fn single(topic: &str, depth: u8, generated_at: String, node: TopicNode) -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(node.id.clone(), node);
        Self {
            topic: topic.to_string(),
            generated_at,
            depth,
            nodes,
            edges: Vec::new(),
        }
    }

    /// Validate model-generated content. Placeholder maps are not expected to pass.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let depth_range = (*DEPTH_RANGE.start() as usize)..=(*DEPTH_RANGE.end() as usize);
        check_count("depth", self.depth as usize, &depth_range)?;
        for (id, node) in &self.nodes {
            node.validate(&format!("nodes[{id:?}]"))?;
        }
        Ok(())
    }
}

/// Body of the topic-map endpoint after defaults and clamping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default = "default_recency_days", deserialize_with = "recency_days_or_default")]
    pub recency_days: u32,
    #[serde(default = "default_max_sources", deserialize_with = "max_sources_or_default")]
    pub max_sources: usize,
    #[serde(default = "default_depth", deserialize_with = "depth_or_default")]
    pub depth: u8,
}

/// Read a limit as a wide integer: `0` and `null` select the default,
/// negative values become `0` and are raised by [`MapRequest::clamped`].
fn limit_or<'de, D>(deserializer: D, default: u64) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<i64>::deserialize(deserializer)? {
        None | Some(0) => default,
        Some(n) => n.max(0) as u64,
    })
}

fn recency_days_or_default<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let days = limit_or(deserializer, u64::from(default_recency_days()))?;
    Ok(u32::try_from(days).unwrap_or(u32::MAX))
}

fn max_sources_or_default<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
    let max = limit_or(deserializer, default_max_sources() as u64)?;
    Ok(usize::try_from(max).unwrap_or(usize::MAX))
}

fn depth_or_default<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    let depth = limit_or(deserializer, u64::from(default_depth()))?;
    Ok(u8::try_from(depth).unwrap_or(u8::MAX))
}

fn default_recency_days() -> u32 {
    7
}

fn default_max_sources() -> usize {
    8
}

fn default_depth() -> u8 {
    2
}

impl MapRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            recency_days: default_recency_days(),
            max_sources: default_max_sources(),
            depth: default_depth(),
        }
    }

    /// Pull out-of-range values back to their bounds.
    pub fn clamped(mut self) -> Self {
        self.recency_days = self
            .recency_days
            .clamp(*RECENCY_DAYS_RANGE.start(), *RECENCY_DAYS_RANGE.end());
        self.max_sources = self
            .max_sources
            .clamp(*MAX_SOURCES_RANGE.start(), *MAX_SOURCES_RANGE.end());
        self.depth = self.depth.clamp(*DEPTH_RANGE.start(), *DEPTH_RANGE.end());
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.prompt.trim().is_empty() {
            return Err(ValidationError::Empty {
                path: "prompt".to_string(),
            });
        }
        Ok(())
    }
}

/// Model payload of a topic map before the request metadata is attached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TopicMapBody {
    #[serde(default)]
    pub nodes: BTreeMap<String, TopicNode>,
    #[serde(default)]
    pub edges: Vec<TopicEdge>,
}

impl TopicMapBody {
    pub fn into_map(self, request: &MapRequest, generated_at: String) -> TopicMap {
        TopicMap {
            topic: request.prompt.clone(),
            generated_at,
            depth: request.depth,
            nodes: self.nodes,
            edges: self.edges,
        }
    }
}
