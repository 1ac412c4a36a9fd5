//! URL enrichment.
//!
//! Every `http(s)://` link in a message is fetched and the recipe text
//! found on the page is inlined right after it:
//!
//! ```text
//! see https://example.com/recipe (Extracted Content: Boil water. Add pasta.)
//! ```
//!
//! Extraction is best-effort. A failed fetch or parse is inlined as a short
//! error string and never fails the turn.

use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use souschef_config::ExtractionConfig;
use souschef_core::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const URL_PATTERN: &str = r"https?://[^\s]+";
const INSTRUCTIONS_NOT_FOUND: &str = "Recipe instructions not found.";

/// Why a page could not be turned into text.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct ExtractionFailure(pub String);

/// Fetches a page body as text.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> std::result::Result<String, ExtractionFailure>;
}

/// reqwest-backed fetcher with a browser user agent and a hard timeout.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &ExtractionConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::Config {
                message: format!("page fetcher HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> std::result::Result<String, ExtractionFailure> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| ExtractionFailure(e.to_string()))?;

        response
            .text()
            .await
            .map_err(|e| ExtractionFailure(e.to_string()))
    }
}

/// Turns an HTML document into the most recipe-like text it contains.
///
/// Priority: an ld+json `Recipe` node's instructions, then a
/// `.recipe-content` / `#recipe` container, then the page's visible text.
pub struct PageExtractor {
    ld_json: Selector,
    container: Selector,
    body: Selector,
}

impl PageExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            ld_json: parse_selector(r#"script[type="application/ld+json"]"#)?,
            container: parse_selector(".recipe-content, #recipe")?,
            body: parse_selector("body")?,
        })
    }

    pub fn extract(&self, html: &str) -> String {
        let document = Html::parse_document(html);

        for script in document.select(&self.ld_json) {
            let raw: String = script.text().collect();
            let Ok(json) = serde_json::from_str::<Value>(&raw) else {
                continue;
            };
            if let Some(recipe) = find_recipe_node(&json) {
                return match recipe.get("recipeInstructions") {
                    Some(instructions) => render_instructions(instructions),
                    None => INSTRUCTIONS_NOT_FOUND.to_string(),
                };
            }
        }

        if let Some(container) = document.select(&self.container).next() {
            let text = visible_text(container);
            if !text.is_empty() {
                return text;
            }
        }

        match document.select(&self.body).next() {
            Some(body) => visible_text(body),
            None => visible_text(document.root_element()),
        }
    }
}

fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::Internal(format!("selector {css:?}: {e}")))
}

/// Depth-first search for a node whose `@type` is (or includes) `Recipe`,
/// looking through top-level arrays and `@graph`.
fn find_recipe_node(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) => items.iter().find_map(find_recipe_node),
        Value::Object(map) => {
            let is_recipe = match map.get("@type") {
                Some(Value::String(t)) => t == "Recipe",
                Some(Value::Array(types)) => types.iter().any(|t| t == "Recipe"),
                _ => false,
            };
            if is_recipe {
                return Some(value);
            }
            map.get("@graph").and_then(find_recipe_node)
        }
        _ => None,
    }
}

/// `recipeInstructions` may be plain text, a list of strings, or a list of
/// `HowToStep` / `HowToSection` objects.
fn render_instructions(value: &Value) -> String {
    let mut steps = Vec::new();
    collect_steps(value, &mut steps);
    if steps.is_empty() {
        INSTRUCTIONS_NOT_FOUND.to_string()
    } else {
        steps.join("\n")
    }
}

fn collect_steps(value: &Value, steps: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if !s.is_empty() {
                steps.push(s.to_string());
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_steps(item, steps)),
        Value::Object(map) => {
            if let Some(children) = map.get("itemListElement") {
                if let Some(Value::String(name)) = map.get("name") {
                    steps.push(name.trim().to_string());
                }
                collect_steps(children, steps);
            } else if let Some(text) = map.get("text").or_else(|| map.get("name")) {
                collect_steps(text, steps);
            }
        }
        _ => {}
    }
}

/// Whitespace-normalized text of `element`, skipping script and style content.
fn visible_text(element: ElementRef<'_>) -> String {
    element
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let parent = node.parent().and_then(ElementRef::wrap)?;
            if matches!(parent.value().name(), "script" | "style" | "noscript" | "template") {
                return None;
            }
            let text = text.trim();
            (!text.is_empty()).then_some(text)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Finds URLs in a message and inlines their extracted content.
pub struct UrlEnricher {
    pattern: Regex,
    extractor: PageExtractor,
    fetcher: Arc<dyn PageFetcher>,
}

impl UrlEnricher {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(URL_PATTERN).map_err(|e| Error::Internal(e.to_string()))?,
            extractor: PageExtractor::new()?,
            fetcher,
        })
    }

    pub fn contains_urls(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }

    /// Rewrite every URL occurrence as `<url> (Extracted Content: <text>)`.
    /// Each distinct URL is fetched once.
    pub async fn enrich(&self, text: &str) -> String {
        let mut extracted: HashMap<&str, String> = HashMap::new();
        for found in self.pattern.find_iter(text) {
            let url = found.as_str();
            if extracted.contains_key(url) {
                continue;
            }
            let content = self.extract_url(url).await;
            extracted.insert(url, content);
        }

        if extracted.is_empty() {
            return text.to_string();
        }

        self.pattern
            .replace_all(text, |caps: &regex::Captures<'_>| {
                let url = &caps[0];
                let content = extracted.get(url).map(String::as_str).unwrap_or_default();
                format!("{url} (Extracted Content: {content})")
            })
            .into_owned()
    }

    async fn extract_url(&self, url: &str) -> String {
        match self.fetcher.fetch(url).await {
            Ok(html) => {
                let text = self.extractor.extract(&html);
                debug!(url, chars = text.len(), "Extracted page content");
                text
            }
            Err(e) => {
                warn!(url, error = %e, "URL extraction failed");
                format!("An error occurred while processing the URL: {e}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct StaticFetcher {
        pages: HashMap<String, std::result::Result<String, String>>,
        calls: Mutex<Vec<String>>,
    }

    impl StaticFetcher {
        fn new(pages: &[(&str, std::result::Result<&str, &str>)]) -> Arc<Self> {
            Arc::new(Self {
                pages: pages
                    .iter()
                    .map(|(url, page)| {
                        (url.to_string(), page.map(str::to_string).map_err(str::to_string))
                    })
                    .collect(),
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl PageFetcher for StaticFetcher {
        async fn fetch(&self, url: &str) -> std::result::Result<String, ExtractionFailure> {
            self.calls.lock().unwrap().push(url.to_string());
            match self.pages.get(url) {
                Some(Ok(html)) => Ok(html.clone()),
                Some(Err(e)) => Err(ExtractionFailure(e.clone())),
                None => Err(ExtractionFailure("404 Not Found".into())),
            }
        }
    }

    #[test]
    fn ld_json_recipe_instructions_win() {
        let html = r#"<html><head>
            <script type="application/ld+json">
            {"@context":"https://schema.org","@type":"Recipe","name":"Pasta",
             "recipeInstructions":[{"@type":"HowToStep","text":"Boil water."},
                                   {"@type":"HowToStep","text":"Add pasta."}]}
            </script></head>
            <body><div class="recipe-content">Ignored container</div></body></html>"#;
        let text = PageExtractor::new().unwrap().extract(html);
        assert_eq!(text, "Boil water.\nAdd pasta.");
    }

    #[test]
    fn ld_json_graph_is_searched() {
        let html = r#"<script type="application/ld+json">
            {"@graph":[{"@type":"WebPage"},{"@type":["Recipe"],"recipeInstructions":"Stir well."}]}
            </script>"#;
        assert_eq!(PageExtractor::new().unwrap().extract(html), "Stir well.");
    }

    #[test]
    fn recipe_without_instructions() {
        let html = r#"<script type="application/ld+json">{"@type":"Recipe","name":"Mystery"}</script>"#;
        assert_eq!(PageExtractor::new().unwrap().extract(html), INSTRUCTIONS_NOT_FOUND);
    }

    #[test]
    fn container_fallback() {
        let html = r#"<html><body><nav>Home</nav>
            <div id="recipe"><h2>Soup</h2><p>Simmer for <b>20</b> minutes.</p></div>
            </body></html>"#;
        assert_eq!(
            PageExtractor::new().unwrap().extract(html),
            "Soup Simmer for 20 minutes."
        );
    }

    #[test]
    fn full_text_fallback_skips_scripts() {
        let html = r#"<html><head><style>p{}</style></head><body>
            <p>Hello</p><script>var x = 1;</script><p>world</p></body></html>"#;
        assert_eq!(PageExtractor::new().unwrap().extract(html), "Hello world");
    }

    #[test]
    fn invalid_ld_json_is_ignored() {
        let html = r#"<script type="application/ld+json">{not json</script><div class="recipe-content">Mix.</div>"#;
        assert_eq!(PageExtractor::new().unwrap().extract(html), "Mix.");
    }

    #[tokio::test]
    async fn enrich_appends_content_after_url() {
        let fetcher = StaticFetcher::new(&[(
            "https://example.com/recipe",
            Ok(r#"<div class="recipe-content">Cook the pasta.</div>"#),
        )]);
        let enricher = UrlEnricher::new(fetcher).unwrap();

        let out = enricher
            .enrich("I'd like pasta, see https://example.com/recipe")
            .await;
        assert_eq!(
            out,
            "I'd like pasta, see https://example.com/recipe (Extracted Content: Cook the pasta.)"
        );
    }

    #[tokio::test]
    async fn fetch_failure_is_inlined_not_raised() {
        let fetcher = StaticFetcher::new(&[("https://down.example", Err("connection refused"))]);
        let enricher = UrlEnricher::new(fetcher).unwrap();

        let out = enricher.enrich("look https://down.example now").await;
        assert_eq!(
            out,
            "look https://down.example (Extracted Content: An error occurred while processing the URL: connection refused) now"
        );
    }

    #[tokio::test]
    async fn repeated_url_fetched_once() {
        let fetcher = StaticFetcher::new(&[("https://a.example/x", Ok("<p>A</p>"))]);
        let enricher = UrlEnricher::new(fetcher.clone()).unwrap();

        let out = enricher.enrich("https://a.example/x and https://a.example/x").await;
        assert_eq!(out.matches("(Extracted Content: A)").count(), 2);
        assert_eq!(fetcher.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn text_without_urls_is_unchanged() {
        let enricher = UrlEnricher::new(StaticFetcher::new(&[])).unwrap();
        assert!(!enricher.contains_urls("just soup"));
        assert_eq!(enricher.enrich("just soup").await, "just soup");
    }
}
