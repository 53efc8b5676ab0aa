use std::time::Duration;

use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid URL '{url}': {reason}")]
    MalformedUrl { url: String, reason: String },

    #[error("Couldn't fetch {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: BoxError,
    },

    #[error("Element with class '{class}' didn't appear within {timeout:?}")]
    ElementTimeout { class: String, timeout: Duration },

    #[error("Nothing matched the query: {query}")]
    NoMatch { query: String },

    #[error("Couldn't extract field: {0}")]
    Extraction(String),

    #[error("Parameter block has {found} rows, expected at least {expected}")]
    MissingParameterRow { expected: usize, found: usize },
    #[error("Parameter row {row} has {found} tokens, token {index} is missing")]
    MissingParameterToken { row: usize, index: usize, found: usize },

    #[error("No document loaded, the fetcher has no fetched target.")]
    NotFetched,

    #[error("Couldn't start a browser session: {0}")]
    Session(#[from] fantoccini::error::NewSessionError),
    #[error("Browser command failed: {0}")]
    Browser(#[from] fantoccini::error::CmdError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Io Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Json Error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn network(url: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Error::Network {
            url: url.into(),
            source: source.into(),
        }
    }

    /// True for failures of the transport itself (connection refused, DNS, timeouts).
    pub fn is_network(&self) -> bool {
        matches!(self, Error::Network { .. })
    }
}
