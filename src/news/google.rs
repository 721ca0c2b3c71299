use std::time::Duration;

use opentelemetry::KeyValue;
use serde::Deserialize;

use super::ContextProvider;
use crate::pipeline::cache::TtlCache;
use crate::telemetry::metrics::NEWS_FETCH_COUNT;

pub const NO_NEWS_MESSAGE: &str = "No recent news found on Google News.";

const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

pub struct GoogleNewsProvider {
    client: reqwest::Client,
    base_url: String,
    max_items: usize,
    cache: TtlCache<String>,
}

impl GoogleNewsProvider {
    pub fn new(base_url: &str, max_items: usize, cache_ttl: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_items,
            cache: TtlCache::new(cache_ttl, 64),
        })
    }

    async fn fetch(&self, query: &str) -> anyhow::Result<String> {
        let body = self
            .client
            .get(format!("{}/rss/search", self.base_url))
            .query(&[
                ("q", format!("{query} when:1d").as_str()),
                ("hl", "en-US"),
                ("gl", "US"),
                ("ceid", "US:en"),
            ])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_feed(&body, self.max_items)
    }
}

#[derive(Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<Item>,
}

#[derive(Deserialize)]
struct Item {
    title: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
}

/// One `- title (date)` line per item, capped at `max_items`.
pub fn parse_feed(xml: &str, max_items: usize) -> anyhow::Result<String> {
    let rss: Rss = quick_xml::de::from_str(xml)?;

    let lines: Vec<String> = rss
        .channel
        .items
        .into_iter()
        .take(max_items)
        .map(|item| {
            format!(
                "- {} ({})",
                item.title.as_deref().unwrap_or("No Title"),
                item.pub_date.as_deref().unwrap_or("")
            )
        })
        .collect();

    if lines.is_empty() {
        return Ok(NO_NEWS_MESSAGE.to_string());
    }

    Ok(lines.join("\n") + "\n")
}

#[async_trait::async_trait]
impl ContextProvider for GoogleNewsProvider {
    #[tracing::instrument(name = "news fetch", skip(self), fields(news.cached, news.chars))]
    async fn context(&self, query: &str) -> String {
        let span = tracing::Span::current();

        if let Some(cached) = self.cache.get(query) {
            span.record("news.cached", true);
            return cached;
        }
        span.record("news.cached", false);

        match self.fetch(query).await {
            Ok(text) => {
                NEWS_FETCH_COUNT.add(1, &[KeyValue::new("outcome", "ok")]);
                span.record("news.chars", text.chars().count());
                self.cache.insert(query.to_string(), text.clone());
                text
            }
            Err(e) => {
                NEWS_FETCH_COUNT.add(1, &[KeyValue::new("outcome", "error")]);
                tracing::warn!(error = %e, "News feed fetch failed");
                format!("News Feed Error: {e}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <generator>NFE/5.0</generator>
    <title>"Bitcoin crypto when:1d" - Google News</title>
    <link>https://news.google.com/search?q=Bitcoin</link>
    <item>
      <title>Bitcoin ETF inflows hit record - Reuters</title>
      <link>https://news.google.com/rss/articles/abc</link>
      <guid isPermaLink="false">abc</guid>
      <pubDate>Mon, 12 Oct 2026 08:00:00 GMT</pubDate>
      <source url="https://www.reuters.com">Reuters</source>
    </item>
    <item>
      <title>SEC delays decision on spot filings - Bloomberg</title>
      <pubDate>Mon, 12 Oct 2026 07:30:00 GMT</pubDate>
    </item>
    <item>
      <pubDate>Mon, 12 Oct 2026 07:00:00 GMT</pubDate>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_parse_feed_formats_items() {
        let text = parse_feed(FEED, 15).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "- Bitcoin ETF inflows hit record - Reuters (Mon, 12 Oct 2026 08:00:00 GMT)"
        );
        assert_eq!(lines[2], "- No Title (Mon, 12 Oct 2026 07:00:00 GMT)");
    }

    #[test]
    fn test_parse_feed_caps_items() {
        let text = parse_feed(FEED, 2).unwrap();
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn test_parse_feed_without_items() {
        let xml = r#"<rss version="2.0"><channel><title>empty</title></channel></rss>"#;
        assert_eq!(parse_feed(xml, 15).unwrap(), NO_NEWS_MESSAGE);
    }

    #[test]
    fn test_parse_feed_rejects_garbage() {
        assert!(parse_feed("not xml at all", 15).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_feed_reports_error_text() {
        let provider =
            GoogleNewsProvider::new("http://127.0.0.1:9", 15, Duration::from_secs(60)).unwrap();
        let text = provider.context("Bitcoin").await;
        assert!(text.starts_with("News Feed Error:"));
    }
}
