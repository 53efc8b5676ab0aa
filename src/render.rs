//! Browser-rendered fetching through a WebDriver session.
//!
//! One [`RenderedFetcher`] owns one headless Firefox session (driven through geckodriver) for its
//! whole life. Every navigation reuses that session; [`RenderedFetcher::quit`] ends it.

use std::time::Duration;

use chrono::Local;
use fantoccini::error::CmdError;
use fantoccini::wd::{Capabilities, TimeoutConfiguration};
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::json;

use crate::document::{Document, PageSource};
use crate::request::{parse_url_with, FetchState, FetchTarget};
use crate::{info_time, Error, Result};

const SCRIPT_TIMEOUT: Duration = Duration::from_secs(30);

/// The browser can also open inline `data:` pages.
const RENDER_SCHEMES: &[&str] = &["http", "https", "data"];

/// Settings fixed for the lifetime of a [`RenderedFetcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    timeout: Duration,
    proxy: Option<String>,
}

impl RenderOptions {
    /// `timeout_secs` has to be positive. An empty proxy means none.
    pub fn new(timeout_secs: u64, proxy: Option<String>) -> Result<Self> {
        if timeout_secs == 0 {
            return Err(Error::Config(
                "the page timeout has to be a positive number of seconds".into(),
            ));
        }
        Ok(RenderOptions {
            timeout: Duration::from_secs(timeout_secs),
            proxy: proxy.filter(|p| !p.trim().is_empty()),
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref()
    }

    fn capabilities(&self) -> Capabilities {
        let mut caps = Capabilities::new();
        caps.insert("browserName".into(), json!("firefox"));
        caps.insert(
            "moz:firefoxOptions".into(),
            json!({ "args": ["-headless"] }),
        );
        if let Some(proxy) = &self.proxy {
            caps.insert(
                "proxy".into(),
                json!({
                    "proxyType": "manual",
                    "httpProxy": proxy,
                    "sslProxy": proxy,
                }),
            );
        }
        caps
    }
}

/// Fetcher that loads pages in a headless browser and snapshots the rendered DOM.
pub struct RenderedFetcher {
    client: Client,
    options: RenderOptions,
    target: FetchTarget,
    document: Option<Document>,
}

impl RenderedFetcher {
    /// Starts a browser session on the WebDriver server at `webdriver_url`.
    pub async fn connect(webdriver_url: &str, options: RenderOptions) -> Result<Self> {
        let start_time = Local::now();
        let client = ClientBuilder::native()
            .capabilities(options.capabilities())
            .connect(webdriver_url)
            .await?;

        let timeouts =
            TimeoutConfiguration::new(Some(SCRIPT_TIMEOUT), Some(options.timeout), Some(Duration::ZERO));
        if let Err(e) = client.update_timeouts(timeouts).await {
            // Don't leave a browser behind for a session nobody can use.
            let _ = client.close().await;
            return Err(e.into());
        }

        info_time!(start_time, "Browser session started via {}", webdriver_url);
        Ok(RenderedFetcher {
            client,
            options,
            target: FetchTarget::empty(),
            document: None,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.options.timeout()
    }

    pub fn proxy(&self) -> Option<&str> {
        self.options.proxy()
    }

    /// Returns the rendered document at `url`, navigating unless it is already the fetched target.
    pub async fn fetch(&mut self, url: &str) -> Result<&Document> {
        if !self.target.is_fetched_at(url) {
            self.load(url).await?;
        }
        self.document()
    }

    /// Navigates the session to `url` and snapshots it, even if it is the current target.
    pub async fn set_target(&mut self, url: &str) -> Result<&Document> {
        self.load(url).await?;
        self.document()
    }

    /// Blocks until an element with class `class_name` is in the live DOM, then re-snapshots.
    pub async fn wait_for_element(&mut self, class_name: &str, timeout: Duration) -> Result<&Document> {
        if self.target.state() != FetchState::Fetched {
            return Err(Error::NotFetched);
        }

        let selector = format!(".{class_name}");
        let waited = self
            .client
            .wait()
            .at_most(timeout)
            .for_element(Locator::Css(&selector))
            .await;
        match waited {
            Ok(_) => {}
            Err(CmdError::WaitTimeout) => {
                return Err(Error::ElementTimeout {
                    class: class_name.into(),
                    timeout,
                })
            }
            Err(e) => return Err(e.into()),
        }

        let source = self.client.source().await?;
        self.document = Some(Document::parse(&source));
        self.document()
    }

    /// Ends the browser session, terminating the browser process.
    pub async fn quit(self) -> Result<()> {
        self.client.close().await?;
        info_time!("Browser session closed");
        Ok(())
    }

    async fn load(&mut self, url: &str) -> Result<()> {
        self.document = None;
        self.target.repoint(url);

        let start_time = Local::now();
        parse_url_with(url, RENDER_SCHEMES)?;
        self.client
            .goto(url)
            .await
            .map_err(|e| Error::network(url, e))?;
        let source = self.client.source().await?;

        self.document = Some(Document::parse(&source));
        self.target.mark_fetched();
        info_time!(start_time, "Rendered {}", url);
        Ok(())
    }
}

impl PageSource for RenderedFetcher {
    fn target(&self) -> &FetchTarget {
        &self.target
    }

    fn document(&self) -> Result<&Document> {
        self.document.as_ref().ok_or(Error::NotFetched)
    }
}
