//! Shape validation for LLM-produced outlines
//!
//! The pruner and graph builder assume validated input and do not re-check
//! anything; every outline must pass through [`validate_outline`] (usually via
//! [`parse_outline`]) first. Lengths are counted in Unicode scalar values.

use std::ops::RangeInclusive;

use url::Url;

use crate::errors::{OutlineError, ValidationError};
use crate::types::{Outline, SourceRef};

pub const CATEGORY_COUNT: RangeInclusive<usize> = 3..=7;
pub const FACTS_PER_CATEGORY: RangeInclusive<usize> = 1..=4;
pub const BULLETS_PER_FACT: RangeInclusive<usize> = 1..=2;
pub const SOURCES_PER_FACT: RangeInclusive<usize> = 1..=3;

pub const MAX_TITLE_CHARS: usize = 60;
pub const MAX_BULLET_CHARS: usize = 140;
pub const MAX_QUOTE_CHARS: usize = 240;

/// Deserialize raw LLM output and validate it.
///
/// A missing `query` or `generatedAt` is tolerated; the caller overwrites both.
pub fn parse_outline(raw: &str) -> Result<Outline, OutlineError> {
    let outline: Outline = serde_json::from_str(raw)?;
    validate_outline(&outline)?;
    Ok(outline)
}

/// Check an outline against its shape constraints, reporting the first violation.
pub fn validate_outline(outline: &Outline) -> Result<(), ValidationError> {
    check_count("categories", outline.categories.len(), &CATEGORY_COUNT)?;

    for (ci, category) in outline.categories.iter().enumerate() {
        let cat_path = format!("categories[{ci}]");
        check_length(&format!("{cat_path}.title"), &category.title, MAX_TITLE_CHARS)?;
        check_count(
            &format!("{cat_path}.facts"),
            category.facts.len(),
            &FACTS_PER_CATEGORY,
        )?;

        if let Some(sources) = &category.sources {
            check_sources(&format!("{cat_path}.sources"), sources)?;
        }

        for (fi, fact) in category.facts.iter().enumerate() {
            let fact_path = format!("{cat_path}.facts[{fi}]");
            check_length(&format!("{fact_path}.title"), &fact.title, MAX_TITLE_CHARS)?;

            check_count(
                &format!("{fact_path}.bullets"),
                fact.bullets.len(),
                &BULLETS_PER_FACT,
            )?;
            for (bi, bullet) in fact.bullets.iter().enumerate() {
                check_length(&format!("{fact_path}.bullets[{bi}]"), bullet, MAX_BULLET_CHARS)?;
            }

            check_count(
                &format!("{fact_path}.sources"),
                fact.sources.len(),
                &SOURCES_PER_FACT,
            )?;
            check_sources(&format!("{fact_path}.sources"), &fact.sources)?;
        }
    }

    Ok(())
}

fn check_sources(path: &str, sources: &[SourceRef]) -> Result<(), ValidationError> {
    for (si, source) in sources.iter().enumerate() {
        let source_path = format!("{path}[{si}]");
        check_absolute_url(&format!("{source_path}.url"), &source.url)?;
        if let Some(quote) = &source.quote {
            check_length(&format!("{source_path}.quote"), quote, MAX_QUOTE_CHARS)?;
        }
    }
    Ok(())
}

pub(crate) fn check_count(
    path: &str,
    actual: usize,
    range: &RangeInclusive<usize>,
) -> Result<(), ValidationError> {
    if range.contains(&actual) {
        Ok(())
    } else {
        Err(ValidationError::Count {
            path: path.to_string(),
            min: *range.start(),
            max: *range.end(),
            actual,
        })
    }
}

pub(crate) fn check_length(path: &str, value: &str, max: usize) -> Result<(), ValidationError> {
    let actual = value.chars().count();
    if actual > max {
        return Err(ValidationError::TooLong {
            path: path.to_string(),
            max,
            actual,
        });
    }
    Ok(())
}

pub(crate) fn check_absolute_url(path: &str, value: &str) -> Result<(), ValidationError> {
    Url::parse(value)
        .map(|_| ())
        .map_err(|err| ValidationError::InvalidUrl {
            path: path.to_string(),
            url: value.to_string(),
            reason: err.to_string(),
        })
}
