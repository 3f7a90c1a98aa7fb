use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

use super::{PaperIndex, PaperRecord};

pub const DEFAULT_API_URL: &str = "http://export.arxiv.org/api/query";

/// Client for the arXiv export API. Responses are Atom feeds.
#[derive(Clone)]
pub struct ArxivClient {
    client: Client,
    api_url: String,
}

impl ArxivClient {
    pub fn new(api_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build arXiv HTTP client")?;

        Ok(Self {
            client,
            api_url: api_url.to_string(),
        })
    }

    async fn query(&self, params: &[(&str, String)]) -> Result<Vec<PaperRecord>> {
        let response = self
            .client
            .get(&self.api_url)
            .query(params)
            .send()
            .await
            .context("arXiv request failed")?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("arXiv API returned {}", status));
        }

        let body = response.text().await.context("Failed to read arXiv response")?;
        parse_feed(&body)
    }
}

#[async_trait]
impl PaperIndex for ArxivClient {
    async fn search(
        &self,
        query: &str,
        category: Option<&str>,
        max_results: usize,
    ) -> Result<Vec<PaperRecord>> {
        let search_query = match category {
            Some(cat) if !cat.trim().is_empty() => format!("{} AND cat:{}", query, cat.trim()),
            _ => query.to_string(),
        };
        info!("Searching arXiv with query: {}", search_query);

        let papers = self
            .query(&[
                ("search_query", search_query),
                ("start", "0".to_string()),
                ("max_results", max_results.to_string()),
                ("sortBy", "relevance".to_string()),
                ("sortOrder", "descending".to_string()),
            ])
            .await?;

        info!("arXiv returned {} papers", papers.len());
        Ok(papers)
    }

    async fn fetch(&self, arxiv_id: &str) -> Result<Option<PaperRecord>> {
        info!("Fetching data for arXiv ID: {}", arxiv_id);
        let papers = self.query(&[("id_list", arxiv_id.to_string())]).await?;
        Ok(papers.into_iter().next())
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Field {
    Id,
    Title,
    Summary,
    Published,
    Updated,
    AuthorName,
    Doi,
    JournalRef,
}

#[derive(Default)]
struct EntryBuilder {
    id: String,
    title: String,
    summary: String,
    published: String,
    updated: String,
    authors: Vec<String>,
    categories: Vec<String>,
    abs_url: Option<String>,
    pdf_url: Option<String>,
    doi: Option<String>,
    journal_ref: Option<String>,
}

impl EntryBuilder {
    fn push_text(&mut self, field: Field, text: &str) {
        let target = match field {
            Field::Id => &mut self.id,
            Field::Title => &mut self.title,
            Field::Summary => &mut self.summary,
            Field::Published => &mut self.published,
            Field::Updated => &mut self.updated,
            Field::AuthorName => {
                self.authors.push(collapse_whitespace(text));
                return;
            }
            Field::Doi => {
                self.doi = Some(text.trim().to_string());
                return;
            }
            Field::JournalRef => {
                self.journal_ref = Some(collapse_whitespace(text));
                return;
            }
        };
        target.push_str(text);
    }

    fn link(&mut self, element: &BytesStart) -> Result<()> {
        let mut href = None;
        let mut title = None;
        let mut rel = None;
        for attr in element.attributes() {
            let attr = attr?;
            let value = attr.unescape_value()?.to_string();
            match attr.key.local_name().as_ref() {
                b"href" => href = Some(value),
                b"title" => title = Some(value),
                b"rel" => rel = Some(value),
                _ => {}
            }
        }

        if let Some(href) = href {
            if title.as_deref() == Some("pdf") {
                self.pdf_url = Some(href);
            } else if rel.as_deref() == Some("alternate") {
                self.abs_url = Some(href);
            }
        }
        Ok(())
    }

    fn category(&mut self, element: &BytesStart) -> Result<()> {
        for attr in element.attributes() {
            let attr = attr?;
            if attr.key.local_name().as_ref() == b"term" {
                let term = attr.unescape_value()?.to_string();
                if !self.categories.contains(&term) {
                    self.categories.push(term);
                }
            }
        }
        Ok(())
    }

    /// `None` for error entries and entries without a title.
    fn build(self) -> Option<PaperRecord> {
        let id_url = self.id.trim();
        if id_url.contains("/api/errors") {
            debug!("Skipping arXiv error entry {}", id_url);
            return None;
        }

        let title = collapse_whitespace(&self.title);
        if title.is_empty() || id_url.is_empty() {
            return None;
        }

        let arxiv_id = match id_url.split_once("/abs/") {
            Some((_, rest)) => rest.to_string(),
            None => id_url.rsplit('/').next().unwrap_or(id_url).to_string(),
        };

        Some(PaperRecord {
            abs_url: self
                .abs_url
                .unwrap_or_else(|| format!("https://arxiv.org/abs/{}", arxiv_id)),
            arxiv_id,
            title,
            authors: self.authors,
            summary: collapse_whitespace(&self.summary),
            published: parse_timestamp(&self.published),
            updated: parse_timestamp(&self.updated),
            categories: self.categories,
            pdf_url: self.pdf_url,
            doi: self.doi.filter(|d| !d.is_empty()),
            journal_ref: self.journal_ref.filter(|j| !j.is_empty()),
        })
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Parses an arXiv Atom feed into records, in feed order.
pub fn parse_feed(xml: &str) -> Result<Vec<PaperRecord>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut papers = Vec::new();
    let mut entry: Option<EntryBuilder> = None;
    let mut field: Option<Field> = None;
    let mut in_author = false;

    loop {
        match reader.read_event().context("Malformed arXiv feed")? {
            Event::Start(e) => {
                let name = e.local_name();
                match name.as_ref() {
                    b"entry" => entry = Some(EntryBuilder::default()),
                    b"author" => in_author = true,
                    b"link" => {
                        if let Some(builder) = entry.as_mut() {
                            builder.link(&e)?;
                        }
                    }
                    b"category" => {
                        if let Some(builder) = entry.as_mut() {
                            builder.category(&e)?;
                        }
                    }
                    other if entry.is_some() => {
                        field = match other {
                            b"id" => Some(Field::Id),
                            b"title" => Some(Field::Title),
                            b"summary" => Some(Field::Summary),
                            b"published" => Some(Field::Published),
                            b"updated" => Some(Field::Updated),
                            b"name" if in_author => Some(Field::AuthorName),
                            b"doi" => Some(Field::Doi),
                            b"journal_ref" => Some(Field::JournalRef),
                            _ => None,
                        };
                    }
                    _ => {}
                }
            }
            Event::Empty(e) => {
                if let Some(builder) = entry.as_mut() {
                    match e.local_name().as_ref() {
                        b"link" => builder.link(&e)?,
                        b"category" => builder.category(&e)?,
                        _ => {}
                    }
                }
            }
            Event::Text(t) => {
                if let (Some(builder), Some(current)) = (entry.as_mut(), field) {
                    let text = t.unescape().context("Invalid text in arXiv feed")?;
                    builder.push_text(current, &text);
                }
            }
            Event::CData(t) => {
                if let (Some(builder), Some(current)) = (entry.as_mut(), field) {
                    let text = String::from_utf8_lossy(&t.into_inner()).to_string();
                    builder.push_text(current, &text);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"entry" => {
                    if let Some(paper) = entry.take().and_then(EntryBuilder::build) {
                        papers.push(paper);
                    }
                    field = None;
                }
                b"author" => in_author = false,
                _ => field = None,
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(papers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ATTENTION_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:arxiv="http://arxiv.org/schemas/atom">
  <title type="html">ArXiv Query: id_list=1706.03762</title>
  <id>http://arxiv.org/api/abc</id>
  <updated>2024-01-01T00:00:00-05:00</updated>
  <entry>
    <id>http://arxiv.org/abs/1706.03762v7</id>
    <updated>2023-08-02T00:41:18Z</updated>
    <published>2017-06-12T17:57:34Z</published>
    <title>Attention Is All
      You Need</title>
    <summary>  The dominant sequence transduction models are based on
      complex recurrent &amp; convolutional neural networks.</summary>
    <author><name>Ashish Vaswani</name></author>
    <author><name>Noam Shazeer</name></author>
    <arxiv:doi>10.48550/arXiv.1706.03762</arxiv:doi>
    <link href="http://arxiv.org/abs/1706.03762v7" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/1706.03762v7" rel="related" type="application/pdf"/>
    <arxiv:primary_category term="cs.CL" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cs.CL" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cs.LG" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
</feed>"#;

    const TWO_ENTRY_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <entry>
    <id>http://arxiv.org/abs/hep-th/9901001v1</id>
    <published>1999-01-01T00:00:00Z</published>
    <title>Old Style</title>
    <summary>Strings.</summary>
    <author><name>A. Physicist</name></author>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2301.00001v1</id>
    <published>2023-01-01T00:00:00Z</published>
    <title>New Style</title>
    <summary>Graphs.</summary>
  </entry>
</feed>"#;

    const ERROR_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <entry>
    <id>http://arxiv.org/api/errors#incorrect_id_format_for_bogus</id>
    <title>Error</title>
    <summary>incorrect id format for bogus</summary>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_single_entry() {
        let papers = parse_feed(ATTENTION_FEED).unwrap();
        assert_eq!(papers.len(), 1);

        let paper = &papers[0];
        assert_eq!(paper.arxiv_id, "1706.03762v7");
        assert_eq!(paper.title, "Attention Is All You Need");
        assert_eq!(paper.authors, vec!["Ashish Vaswani", "Noam Shazeer"]);
        assert!(paper.summary.starts_with("The dominant sequence"));
        assert!(paper.summary.contains("recurrent & convolutional"));
        assert_eq!(paper.published_date().as_deref(), Some("2017-06-12"));
        assert_eq!(paper.updated_date().as_deref(), Some("2023-08-02"));
        assert_eq!(paper.year(), Some(2017));
        assert_eq!(paper.categories, vec!["cs.CL", "cs.LG"]);
        assert_eq!(paper.pdf_url.as_deref(), Some("http://arxiv.org/pdf/1706.03762v7"));
        assert_eq!(paper.abs_url, "http://arxiv.org/abs/1706.03762v7");
        assert_eq!(paper.doi.as_deref(), Some("10.48550/arXiv.1706.03762"));
        assert_eq!(paper.journal_ref, None);
    }

    #[test]
    fn test_parse_multiple_entries_in_order() {
        let papers = parse_feed(TWO_ENTRY_FEED).unwrap();
        let ids: Vec<&str> = papers.iter().map(|p| p.arxiv_id.as_str()).collect();
        assert_eq!(ids, vec!["hep-th/9901001v1", "2301.00001v1"]);
        assert!(papers[1].authors.is_empty());
        assert_eq!(papers[1].abs_url, "https://arxiv.org/abs/2301.00001v1");
    }

    #[test]
    fn test_error_entries_are_dropped() {
        assert!(parse_feed(ERROR_FEED).unwrap().is_empty());
    }

    #[test]
    fn test_feed_title_is_not_an_entry() {
        let feed = r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>Query</title></feed>"#;
        assert!(parse_feed(feed).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_by_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/query"))
            .and(query_param("id_list", "1706.03762"))
            .respond_with(ResponseTemplate::new(200).set_body_string(ATTENTION_FEED))
            .expect(1)
            .mount(&server)
            .await;

        let client = ArxivClient::new(&format!("{}/api/query", server.uri()), Duration::from_secs(5)).unwrap();
        let paper = client.fetch("1706.03762").await.unwrap().unwrap();
        assert_eq!(paper.title, "Attention Is All You Need");
    }

    #[tokio::test]
    async fn test_fetch_unknown_id_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/query"))
            .respond_with(ResponseTemplate::new(200).set_body_string(ERROR_FEED))
            .mount(&server)
            .await;

        let client = ArxivClient::new(&format!("{}/api/query", server.uri()), Duration::from_secs(5)).unwrap();
        assert!(client.fetch("bogus").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_search_adds_category_filter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/query"))
            .and(query_param("search_query", "graph neural networks AND cat:cs.LG"))
            .and(query_param("max_results", "7"))
            .respond_with(ResponseTemplate::new(200).set_body_string(TWO_ENTRY_FEED))
            .expect(1)
            .mount(&server)
            .await;

        let client = ArxivClient::new(&format!("{}/api/query", server.uri()), Duration::from_secs(5)).unwrap();
        let papers = client.search("graph neural networks", Some("cs.LG"), 7).await.unwrap();
        assert_eq!(papers.len(), 2);
    }

    #[tokio::test]
    async fn test_server_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = ArxivClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
        assert!(client.search("anything", None, 5).await.is_err());
    }
}
