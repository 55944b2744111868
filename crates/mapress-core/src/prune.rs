//! Budget-driven outline pruning
//!
//! Facts cited by the fewest distinct source domains are removed first until
//! the outline fits the node budget. Categories are never removed directly;
//! they disappear only once all of their facts are gone. The running count
//! keeps counting emptied categories until the end, so a budget below the
//! category count is degenerate and may strip every fact.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::types::{Category, Fact, Outline};
use crate::url_utils::source_domain;

/// Budget used when the caller does not supply one.
pub const DEFAULT_MAX_NODES: usize = 16;

/// Number of distinct source domains cited by a fact.
pub fn corroboration_score(fact: &Fact) -> usize {
    fact.sources
        .iter()
        .map(|source| source_domain(&source.url))
        .collect::<HashSet<_>>()
        .len()
}

/// Reduce `outline` to at most `max_nodes` categories plus facts.
///
/// Returns a new outline; the input is left untouched. Ties in corroboration
/// score are broken by input order (first category first, then first fact).
pub fn prune_outline(outline: &Outline, max_nodes: usize) -> Outline {
    let mut count = outline.node_count();
    if count <= max_nodes {
        return outline.clone();
    }

    if max_nodes < outline.categories.len() {
        warn!(
            max_nodes,
            categories = outline.categories.len(),
            "node budget is below the category count; categories are never pruned directly"
        );
    }

    let mut scored: Vec<(usize, usize, usize)> = outline
        .categories
        .iter()
        .enumerate()
        .flat_map(|(ci, category)| {
            category
                .facts
                .iter()
                .enumerate()
                .map(move |(fi, fact)| (ci, fi, corroboration_score(fact)))
        })
        .collect();
    // stable: equal scores keep input order
    scored.sort_by_key(|&(_, _, score)| score);

    let mut keep: Vec<Vec<bool>> = outline
        .categories
        .iter()
        .map(|category| vec![true; category.facts.len()])
        .collect();

    for (ci, fi, score) in scored {
        if count <= max_nodes {
            break;
        }
        keep[ci][fi] = false;
        count -= 1;
        debug!(
            category = %outline.categories[ci].title,
            fact = %outline.categories[ci].facts[fi].title,
            score,
            "pruned fact"
        );
    }

    let categories: Vec<Category> = outline
        .categories
        .iter()
        .zip(keep)
        .filter_map(|(category, keep_facts)| {
            let facts: Vec<Fact> = category
                .facts
                .iter()
                .zip(keep_facts)
                .filter(|(_, keep)| *keep)
                .map(|(fact, _)| fact.clone())
                .collect();

            if facts.is_empty() {
                None
            } else {
                Some(Category {
                    title: category.title.clone(),
                    facts,
                    sources: category.sources.clone(),
                })
            }
        })
        .collect();

    Outline {
        query: outline.query.clone(),
        generated_at: outline.generated_at.clone(),
        categories,
    }
}
