use chrono::Local;
use reqwest::Client;
use url::Url;

use crate::document::{Document, PageSource};
use crate::{info_time, Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    NotFetched,
    Fetched,
}

/// The URL a fetcher currently points at and whether its document is loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTarget {
    url: String,
    state: FetchState,
}

impl FetchTarget {
    pub(crate) fn empty() -> Self {
        FetchTarget {
            url: String::new(),
            state: FetchState::NotFetched,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> FetchState {
        self.state
    }

    pub fn is_fetched_at(&self, url: &str) -> bool {
        self.state == FetchState::Fetched && self.url == url
    }

    /// Points at `url` and forgets any earlier fetch.
    pub(crate) fn repoint(&mut self, url: &str) {
        url.clone_into(&mut self.url);
        self.state = FetchState::NotFetched;
    }

    pub(crate) fn mark_fetched(&mut self) {
        self.state = FetchState::Fetched;
    }
}

/// Schemes a plain HTTP request can go to.
pub(crate) const HTTP_SCHEMES: &[&str] = &["http", "https"];

/// Checks that `url` is an absolute http(s) URL before any request goes out.
pub(crate) fn parse_url(raw: &str) -> Result<Url> {
    parse_url_with(raw, HTTP_SCHEMES)
}

/// Like [`parse_url`], accepting any scheme in `schemes`.
///
/// `localhost:8080/games` parses with scheme `localhost` and no host, so it is reported like a
/// missing scheme.
pub(crate) fn parse_url_with(raw: &str, schemes: &[&str]) -> Result<Url> {
    let missing_scheme = || format!("No scheme supplied. Perhaps you meant https://{raw}?");
    let url = Url::parse(raw).map_err(|e| Error::MalformedUrl {
        url: raw.into(),
        reason: match e {
            url::ParseError::RelativeUrlWithoutBase => missing_scheme(),
            other => other.to_string(),
        },
    })?;

    if !schemes.contains(&url.scheme()) {
        return Err(Error::MalformedUrl {
            url: raw.into(),
            reason: if url.has_host() {
                format!("Unsupported scheme {:?}", url.scheme())
            } else {
                missing_scheme()
            },
        });
    }
    Ok(url)
}

/// Plain HTTP fetcher, no script execution.
#[derive(Debug)]
pub struct StaticFetcher {
    client: Client,
    target: FetchTarget,
    document: Option<Document>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    pub fn with_client(client: Client) -> Self {
        StaticFetcher {
            client,
            target: FetchTarget::empty(),
            document: None,
        }
    }

    /// Returns the document at `url`, requesting it unless it is already the fetched target.
    pub async fn fetch(&mut self, url: &str) -> Result<&Document> {
        if !self.target.is_fetched_at(url) {
            self.load(url).await?;
        }
        self.document()
    }

    /// Repoints the fetcher at `url` and requests it again, even if it is the current target.
    pub async fn set_target(&mut self, url: &str) -> Result<&Document> {
        self.load(url).await?;
        self.document()
    }

    async fn load(&mut self, url: &str) -> Result<()> {
        self.document = None;
        self.target.repoint(url);

        let parsed = parse_url(url)?;
        let html = request_page_html(&self.client, parsed).await?;

        self.document = Some(Document::parse(&html));
        self.target.mark_fetched();
        Ok(())
    }
}

impl Default for StaticFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl PageSource for StaticFetcher {
    fn target(&self) -> &FetchTarget {
        &self.target
    }

    fn document(&self) -> Result<&Document> {
        self.document.as_ref().ok_or(Error::NotFetched)
    }
}

/// Requests a page and returns a `Result<String>` containing the HTML.
async fn request_page_html(client: &Client, url: Url) -> Result<String> {
    let start_time = Local::now();
    let url_str = url.to_string();

    let res = client
        .get(url)
        .send()
        .await
        .map_err(|e| Error::network(&url_str, e))?;
    let status = res.status();
    let html = res.text().await.map_err(|e| Error::network(&url_str, e))?;

    info_time!(start_time, "GET {} -> {}", url_str, status);
    Ok(html)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_without_scheme_is_malformed() {
        let err = parse_url("fake").unwrap_err();
        match err {
            Error::MalformedUrl { url, reason } => {
                assert_eq!(url, "fake");
                assert_eq!(reason, "No scheme supplied. Perhaps you meant https://fake?");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn host_and_port_without_scheme_is_malformed() {
        match parse_url("localhost:8080/games").unwrap_err() {
            Error::MalformedUrl { url, reason } => {
                assert_eq!(url, "localhost:8080/games");
                assert!(reason.starts_with("No scheme supplied"), "{reason}");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn only_http_schemes_are_fetched() {
        assert!(matches!(
            parse_url("ftp://example.com/list"),
            Err(Error::MalformedUrl { .. })
        ));
        assert!(matches!(
            parse_url("data:text/html,<p>hi</p>"),
            Err(Error::MalformedUrl { .. })
        ));
        assert!(parse_url_with("data:text/html,<p>hi</p>", &["data"]).is_ok());
        assert!(parse_url("https://boardgamegeek.com/browse/boardgame/1").is_ok());
    }

    #[test]
    fn absolute_url_parses() {
        assert!(parse_url("http://127.0.0.1:3000/1").is_ok());
    }

    #[test]
    fn repoint_resets_state() {
        let mut target = FetchTarget::empty();
        target.repoint("http://a/");
        target.mark_fetched();
        assert!(target.is_fetched_at("http://a/"));

        target.repoint("http://b/");
        assert_eq!(target.state(), FetchState::NotFetched);
        assert_eq!(target.url(), "http://b/");
        assert!(!target.is_fetched_at("http://a/"));
    }

    #[test]
    fn document_before_fetch_is_not_fetched() {
        let fetcher = StaticFetcher::new();
        assert!(matches!(fetcher.document(), Err(Error::NotFetched)));
    }
}
