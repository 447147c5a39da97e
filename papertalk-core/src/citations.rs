//! Citation mining over finished research answers.
//!
//! Scans for arXiv abstract links and turns each one into a [`Citation`] with
//! a direct PDF link. The scan is deliberately literal: every occurrence
//! yields a record, in order, and repeated identifiers are not merged.

use std::sync::OnceLock;

use regex::Regex;

use crate::models::Citation;

pub const ABS_URL_PREFIX: &str = "https://arxiv.org/abs/";
pub const PDF_URL_PREFIX: &str = "https://arxiv.org/pdf/";
pub const PLACEHOLDER_SUMMARY: &str = "Summary not available.";

fn arxiv_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            // Version suffix is matched but left out of the capture.
            Regex::new(r"https?://(?:www\.)?arxiv\.org/abs/(\d{4}\.\d{4,5})(?:v\d+)?").ok()
        })
        .as_ref()
}

/// Build the citation record for one arXiv identifier.
pub fn citation_for(source_id: &str) -> Citation {
    Citation {
        source_id: source_id.to_string(),
        source_url: format!("{ABS_URL_PREFIX}{source_id}"),
        fetch_url: format!("{PDF_URL_PREFIX}{source_id}.pdf"),
        summary: PLACEHOLDER_SUMMARY.to_string(),
    }
}

/// Returns `None` when the text has no arXiv links, never an empty vec.
pub fn extract_citations(text: &str) -> Option<Vec<Citation>> {
    let citations: Vec<Citation> = arxiv_pattern()?
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|id| citation_for(id.as_str()))
        .collect();

    if citations.is_empty() {
        None
    } else {
        Some(citations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_suffix_ignored_and_duplicates_kept() {
        let text = "See https://arxiv.org/abs/2301.00001 and the revision \
                    https://arxiv.org/abs/2301.00001v2 for details.";
        let citations = extract_citations(text).expect("two links present");

        assert_eq!(citations.len(), 2);
        for c in &citations {
            assert_eq!(c.source_id, "2301.00001");
            assert_eq!(c.source_url, "https://arxiv.org/abs/2301.00001");
            assert_eq!(c.fetch_url, "https://arxiv.org/pdf/2301.00001.pdf");
            assert_eq!(c.summary, PLACEHOLDER_SUMMARY);
        }
    }

    #[test]
    fn test_no_links_yields_none() {
        assert!(extract_citations("Transformers rely on attention.").is_none());
        assert!(extract_citations("").is_none());
        assert!(extract_citations("https://example.org/abs/2301.00001").is_none());
    }

    #[test]
    fn test_order_of_first_appearance() {
        let text = "[b](https://arxiv.org/abs/1706.03762) then \
                    [a](http://arxiv.org/abs/2005.14165v4) then \
                    https://arxiv.org/abs/1706.03762v7";
        let ids: Vec<String> = extract_citations(text)
            .unwrap()
            .into_iter()
            .map(|c| c.source_id)
            .collect();
        assert_eq!(ids, vec!["1706.03762", "2005.14165", "1706.03762"]);
    }

    #[test]
    fn test_five_digit_identifiers() {
        let citations = extract_citations("(https://arxiv.org/abs/2310.12345v1)").unwrap();
        assert_eq!(citations[0].source_id, "2310.12345");
        assert_eq!(citations[0].fetch_url, "https://arxiv.org/pdf/2310.12345.pdf");
    }

    #[test]
    fn test_pdf_links_are_not_citations() {
        assert!(extract_citations("https://arxiv.org/pdf/2301.00001.pdf").is_none());
    }
}
