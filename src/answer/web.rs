//! Supplementary web context for general questions.

use async_trait::async_trait;

/// One piece of external context attached to an answer.
#[derive(Debug, Clone)]
pub struct WebSnippet {
    pub title: String,
    pub body: String,
    pub source_url: String,
    pub image_url: Option<String>,
}

/// Capability trait for fetching web context for a question.
#[async_trait]
pub trait WebLookup: Send + Sync {
    async fn lookup(&self, question: &str) -> Vec<WebSnippet>;
}

/// Lookup backed by a small static table of reputable references.
///
/// Matches on topic keywords and otherwise falls back to one generic
/// pointer, so general questions always carry at least one external source.
#[derive(Default)]
pub struct StaticWebLookup;

impl StaticWebLookup {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

const TOPIC_TABLE: &[(&[&str], &str, &str, &str)] = &[
    (
        &["endometriosis"],
        "Endometriosis - World Health Organization",
        "Endometriosis is a disease in which tissue similar to the lining of the uterus grows outside the uterus, causing pain and sometimes infertility.",
        "https://www.who.int/news-room/fact-sheets/detail/endometriosis",
    ),
    (
        &["menopause", "perimenopause"],
        "Menopause - World Health Organization",
        "Menopause is one point in a continuum of life stages for women and marks the end of the reproductive period, typically between ages 45 and 55.",
        "https://www.who.int/news-room/fact-sheets/detail/menopause",
    ),
    (
        &["cervical", "hpv"],
        "Cervical cancer - World Health Organization",
        "Cervical cancer is caused by persistent infection with the human papillomavirus and is largely preventable through vaccination and screening.",
        "https://www.who.int/news-room/fact-sheets/detail/cervical-cancer",
    ),
    (
        &["contraception", "contraceptive"],
        "Family planning/contraception - World Health Organization",
        "Contraceptive information and services are fundamental to the health and human rights of all individuals.",
        "https://www.who.int/news-room/fact-sheets/detail/family-planning-contraception",
    ),
];

#[async_trait]
impl WebLookup for StaticWebLookup {
    async fn lookup(&self, question: &str) -> Vec<WebSnippet> {
        let lower = question.to_lowercase();

        for (keywords, title, body, url) in TOPIC_TABLE {
            if keywords.iter().any(|kw| lower.contains(kw)) {
                return vec![WebSnippet {
                    title: (*title).to_string(),
                    body: (*body).to_string(),
                    source_url: (*url).to_string(),
                    image_url: None,
                }];
            }
        }

        vec![WebSnippet {
            title: "Sexual and reproductive health - World Health Organization".to_string(),
            body: "Reference material on sexual and reproductive health, including guidance on gynecological conditions.".to_string(),
            source_url: "https://www.who.int/health-topics/sexual-and-reproductive-health-and-research".to_string(),
            image_url: None,
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_topic_match() {
        let lookup = StaticWebLookup::new();
        let snippets = lookup.lookup("What are symptoms of endometriosis?").await;
        assert_eq!(snippets.len(), 1);
        assert!(snippets[0].title.contains("Endometriosis"));
    }

    #[tokio::test]
    async fn test_generic_fallback() {
        let lookup = StaticWebLookup::new();
        let snippets = lookup.lookup("completely unrelated question").await;
        assert_eq!(snippets.len(), 1);
        assert!(snippets[0].source_url.starts_with("https://"));
    }
}
