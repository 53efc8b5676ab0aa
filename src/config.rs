use std::path::PathBuf;
use std::str::FromStr;

use crate::render::RenderOptions;
use crate::{Error, Result};
use crate::{DEFAULT_LIMIT, DEFAULT_OUTPUT_PATH, DEFAULT_PAGES, DEFAULT_TIMEOUT_SECS, DEFAULT_WEBDRIVER_URL};

/// Crawl settings, read from the environment (and a `.env` file, if there is one).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Prefix for the relative game links found on listing pages.
    pub base_url: String,
    pub categories_url: String,
    /// Listing page `n` lives at `{games_url}/{n}`.
    pub games_url: String,
    /// Page load and element wait bound, in seconds. Always positive.
    pub timeout_secs: u64,
    pub proxy: Option<String>,
    pub webdriver_url: String,
    pub output_path: PathBuf,
    pub pages: usize,
    /// If set to 0 every listed game is scraped.
    pub limit: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // A missing .env file is fine, the variables may come from the shell.
        let _ = dotenv::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup, `from_env` passes `std::env::var`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let required = |key: &str| get(key).ok_or_else(|| Error::Config(format!("{key} is not set")));

        let timeout_secs = parse_or(&get, "TIMEOUT", DEFAULT_TIMEOUT_SECS)?;
        if timeout_secs == 0 {
            return Err(Error::Config("TIMEOUT has to be a positive number of seconds".into()));
        }

        Ok(Config {
            base_url: required("BASE_URL")?,
            categories_url: required("CATEGORIES_URL")?,
            games_url: required("GAMES_URL")?,
            timeout_secs,
            proxy: get("PROXY"),
            webdriver_url: get("WEBDRIVER_URL").unwrap_or_else(|| DEFAULT_WEBDRIVER_URL.into()),
            output_path: get("OUTPUT_PATH")
                .unwrap_or_else(|| DEFAULT_OUTPUT_PATH.into())
                .into(),
            pages: parse_or(&get, "PAGES", DEFAULT_PAGES)?,
            limit: parse_or(&get, "LIMIT", DEFAULT_LIMIT)?,
        })
    }

    pub fn render_options(&self) -> Result<RenderOptions> {
        RenderOptions::new(self.timeout_secs, self.proxy.clone())
    }

    /// URL of listing page `page_no`, counted from 1.
    pub fn games_page_url(&self, page_no: usize) -> String {
        format!("{}/{}", self.games_url.trim_end_matches('/'), page_no)
    }
}

fn parse_or<T, F>(get: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("{key}={raw:?}: {e}"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("BASE_URL", "https://boardgamegeek.com"),
        ("CATEGORIES_URL", "https://boardgamegeek.com/browse/boardgamecategory"),
        ("GAMES_URL", "https://boardgamegeek.com/browse/boardgame/page"),
    ];

    #[test]
    fn defaults_fill_optional_keys() {
        let config = config_from(&REQUIRED).unwrap();
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.proxy, None);
        assert_eq!(config.webdriver_url, "http://localhost:4444");
        assert_eq!(config.output_path, PathBuf::from("games.jsonl"));
        assert_eq!(config.pages, 2);
        assert_eq!(config.limit, 0);
    }

    #[test]
    fn empty_proxy_is_none() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("PROXY", ""));
        pairs.push(("TIMEOUT", " 12 "));
        let config = config_from(&pairs).unwrap();
        assert_eq!(config.proxy, None);
        assert_eq!(config.timeout_secs, 12);
    }

    #[test]
    fn missing_required_key_is_an_error() {
        let err = config_from(&REQUIRED[..2]).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("GAMES_URL")));
    }

    #[test]
    fn timeout_has_to_be_positive() {
        for bad in ["0", "-3", "soon"] {
            let mut pairs = REQUIRED.to_vec();
            pairs.push(("TIMEOUT", bad));
            assert!(matches!(config_from(&pairs), Err(Error::Config(_))), "{bad}");
        }
    }

    #[test]
    fn games_page_url_appends_the_page_number() {
        let config = config_from(&REQUIRED).unwrap();
        assert_eq!(
            config.games_page_url(3),
            "https://boardgamegeek.com/browse/boardgame/page/3"
        );
    }
}
