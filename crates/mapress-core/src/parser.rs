//! Article fetching and text extraction

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

use crate::url_utils::display_host;

/// Readable content of one fetched article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedDocument {
    pub url: String,
    pub title: String,
    pub markdown: String,
}

impl FetchedDocument {
    /// Stand-in used when an article could not be fetched.
    pub fn unavailable(url: &str) -> Self {
        Self {
            url: url.to_string(),
            title: url.to_string(),
            markdown: String::new(),
        }
    }
}

#[derive(Deserialize)]
struct DocumentBundle {
    docs: Vec<FetchedDocument>,
}

/// Parse a `{"docs": [...]}` bundle of already-extracted articles.
pub fn parse_document_bundle(raw: &str) -> serde_json::Result<Vec<FetchedDocument>> {
    serde_json::from_str::<DocumentBundle>(raw).map(|bundle| bundle.docs)
}

/// Fetch HTML content from a URL, keeping at most `max_bytes` of the body
///
/// Requires the `orchestrator` feature (needs reqwest)
#[cfg(feature = "orchestrator")]
pub async fn fetch_html(
    client: &reqwest::Client,
    url: &str,
    max_bytes: usize,
) -> anyhow::Result<String> {
    use anyhow::Context;

    let response = client
        .get(url)
        .header(
            reqwest::header::ACCEPT,
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        )
        .send()
        .await
        .with_context(|| format!("failed to fetch {url}"))?;

    let mut response = response
        .error_for_status()
        .with_context(|| format!("non-success status from {url}"))?;

    // stop reading at the cap; the rest of the body is never downloaded
    let mut body = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .with_context(|| format!("failed to read response body from {url}"))?
    {
        let room = max_bytes - body.len();
        if chunk.len() >= room {
            body.extend_from_slice(&chunk[..room]);
            break;
        }
        body.extend_from_slice(&chunk);
    }

    Ok(String::from_utf8_lossy(&body).into_owned())
}

/// Text of the first non-empty `<title>` element.
pub fn extract_title(html: &str) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    let document = Html::parse_document(html);
    document
        .select(&selector)
        .map(|element| element.text().collect::<String>().trim().to_string())
        .find(|title| !title.is_empty())
}

/// Sanitize HTML by removing script, style, and other unwanted elements
pub fn sanitize_html(html: &str) -> String {
    static RE_TAG_BLOCKS: Lazy<Vec<Regex>> = Lazy::new(|| {
        [
            r"(?is)<script[^>]*?>[\s\S]*?</script>",
            r"(?is)<style[^>]*?>[\s\S]*?</style>",
            r"(?is)<noscript[^>]*?>[\s\S]*?</noscript>",
            r"(?is)<template[^>]*?>[\s\S]*?</template>",
        ]
        .into_iter()
        .map(|pattern| Regex::new(pattern).expect("invalid block regex"))
        .collect()
    });
    static RE_COMMENT: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?is)<!--.*?-->").expect("invalid comment regex"));

    let mut clean = html.to_string();
    for re in RE_TAG_BLOCKS.iter() {
        clean = re.replace_all(&clean, "").into_owned();
    }

    RE_COMMENT.replace_all(&clean, "").into_owned()
}

/// Convert HTML to Markdown (with sanitization)
pub fn html_to_markdown(html: &str) -> String {
    let sanitized = sanitize_html(html);
    html2md::parse_html(&sanitized)
}

/// First `max_chars` characters of `text`, with `...` appended when cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

/// Turn a fetched page into a title plus bounded markdown body.
///
/// The title falls back to the page's host when the document has none.
pub fn extract_document(url: &str, html: &str, max_chars: usize) -> FetchedDocument {
    let title = extract_title(html).unwrap_or_else(|| display_host(url));
    let markdown = html_to_markdown(html);

    FetchedDocument {
        url: url.to_string(),
        title,
        markdown: truncate_chars(markdown.trim(), max_chars),
    }
}
