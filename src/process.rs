use chrono::Local;

use crate::output::JsonLinesWriter;
use crate::parse::{extract_categories, extract_game, extract_game_links};
use crate::render::RenderedFetcher;
use crate::request::StaticFetcher;
use crate::{info_time, warn_time, Config, Game, Result, PARAMETER_ROW_CLASS};

/// Counts from one crawl run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    pub categories: usize,
    pub links: usize,
    pub scraped: usize,
    pub failed: usize,
}

/// Runs the whole crawl: listing pages first, then every game detail page.
///
/// Failing to read the listings aborts the run, a failing game page is logged and skipped.
pub async fn process_site(config: &Config) -> Result<CrawlReport> {
    let start_time = Local::now();
    info_time!("Started scraping");

    let mut listing = StaticFetcher::new();
    let categories = collect_categories(&mut listing, &config.categories_url).await?;
    info_time!("Found {} categories", categories.len());

    let links = collect_game_links(&mut listing, config).await?;
    info_time!(start_time, "Finished PROCESSING listing pages, {} games", links.len());

    let mut session = CrawlSession::open(config).await?;
    let crawled = session.crawl(&links).await;
    let closed = session.close().await;

    let mut report = first_failure(crawled, closed)?;
    report.categories = categories.len();
    report.links = links.len();
    info_time!(
        start_time,
        "DONE: {} scraped, {} failed, written to {}",
        report.scraped,
        report.failed,
        config.output_path.display()
    );
    Ok(report)
}

/// Category names from the category listing page.
pub async fn collect_categories(fetcher: &mut StaticFetcher, url: &str) -> Result<Vec<String>> {
    let doc = fetcher.set_target(url).await?;
    extract_categories(doc)
}

/// Absolute game URLs from listing pages `1..=pages`, in listing order.
pub async fn collect_game_links(fetcher: &mut StaticFetcher, config: &Config) -> Result<Vec<String>> {
    let mut links = Vec::new();
    for page_no in 1..=config.pages {
        let doc = fetcher.set_target(&config.games_page_url(page_no)).await?;
        let page_links = extract_game_links(doc, &config.base_url)?;
        info_time!("Listing page {}: {} games", page_no, page_links.len());
        links.extend(page_links);
    }
    Ok(links)
}

/// Combines the crawl result with the result of closing its session.
///
/// A crawl error wins over a close error, which is only logged then.
fn first_failure(crawled: Result<CrawlReport>, closed: Result<()>) -> Result<CrawlReport> {
    match (crawled, closed) {
        (Ok(report), Ok(())) => Ok(report),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(close_err)) => {
            warn_time!("Closing the browser session failed too: {}", close_err);
            Err(e)
        }
    }
}

/// Turns a game URL into its record.
#[allow(async_fn_in_trait)]
pub trait GameScraper {
    async fn scrape_game(&mut self, url: &str) -> Result<Game>;
}

impl GameScraper for RenderedFetcher {
    /// Renders the page, waits for the parameter rows and extracts the record.
    async fn scrape_game(&mut self, url: &str) -> Result<Game> {
        self.set_target(url).await?;
        let timeout = self.timeout();
        let doc = self.wait_for_element(PARAMETER_ROW_CLASS, timeout).await?;
        extract_game(doc)
    }
}

/// The detail phase of a crawl: a scraper and the output file it writes to.
pub struct CrawlSession<S = RenderedFetcher> {
    scraper: S,
    writer: JsonLinesWriter,
    limit: usize,
}

impl CrawlSession<RenderedFetcher> {
    /// Starts the browser session, then truncates the output file.
    ///
    /// The previous output stays untouched when the browser can't be started.
    pub async fn open(config: &Config) -> Result<Self> {
        let fetcher = RenderedFetcher::connect(&config.webdriver_url, config.render_options()?).await?;

        let writer = JsonLinesWriter::new(&config.output_path);
        if let Err(e) = writer.overwrite::<Game>(&[]).await {
            if let Err(close_err) = fetcher.quit().await {
                warn_time!("Closing the browser session failed: {}", close_err);
            }
            return Err(e);
        }
        Ok(CrawlSession::new(fetcher, writer, config.limit))
    }

    /// Ends the browser session.
    pub async fn close(self) -> Result<()> {
        self.scraper.quit().await
    }
}

impl<S: GameScraper> CrawlSession<S> {
    /// `limit` caps the number of scraped games, 0 means no cap.
    pub fn new(scraper: S, writer: JsonLinesWriter, limit: usize) -> Self {
        CrawlSession {
            scraper,
            writer,
            limit,
        }
    }

    /// Scrapes `links` in order, appending each game as soon as it is extracted.
    ///
    /// Only an output failure stops the loop.
    pub async fn crawl(&mut self, links: &[String]) -> Result<CrawlReport> {
        let mut report = CrawlReport::default();
        for link in links {
            if self.limit > 0 && report.scraped >= self.limit {
                info_time!("Reached the limit of {} games", self.limit);
                break;
            }

            let start_time = Local::now();
            match self.scraper.scrape_game(link).await {
                Ok(game) => {
                    self.writer.append(std::slice::from_ref(&game)).await?;
                    report.scraped += 1;
                    info_time!(start_time, "Scraped {} ({})", game.title, game.release);
                }
                Err(e) => {
                    report.failed += 1;
                    warn_time!("Skipping {}: {}", link, e);
                }
            }
        }
        Ok(report)
    }
}
