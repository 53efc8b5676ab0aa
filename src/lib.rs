//! Board game catalog scraper.
//!
//! Listing pages are fetched statically, game detail pages are rendered in a
//! headless browser, and both end up as a [`Document`] that the extractors in
//! [`parse`] read fields out of.

mod macros;

pub mod config;
pub mod document;
mod error;
pub mod game;
pub mod output;
pub mod parse;
pub mod process;
pub mod render;
pub mod request;

pub use config::Config;
pub use document::{Cardinality, Document, Matches, PageSource, Projection, QuerySpec};
pub use error::{Error, Result};
pub use game::Game;
pub use render::{RenderOptions, RenderedFetcher};
pub use request::{FetchState, FetchTarget, StaticFetcher};

#[doc(hidden)]
pub use chrono;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:4444";
const DEFAULT_OUTPUT_PATH: &str = "games.jsonl";
const DEFAULT_PAGES: usize = 2;
/// If set to 0 there is no limit on the number of scraped games.
const DEFAULT_LIMIT: usize = 0;

/// Class of the parameter rows, awaited before a detail page is extracted.
const PARAMETER_ROW_CLASS: &str = "gameplay-item-primary";
