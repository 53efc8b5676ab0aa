//! Field extraction for catalog pages.
//!
//! Everything here is a pure function over a [`Document`]. The indices used below (second
//! title container, fourth parameter row, ...) follow the site's markup. When the layout
//! changes these fail instead of producing half-filled records.

use std::sync::OnceLock;

use regex::Regex;

use crate::document::{element_text, Document, QuerySpec};
use crate::game::Game;
use crate::{warn_time, Error, Result};

const TITLE_INFO_CLASS: &str = "game-header-title-info";
const TITLE_CONTAINER_CLASS: &str = "game-header-title-container";
const PARAMETER_ROW_CLASS: &str = crate::PARAMETER_ROW_CLASS;
const FEATURE_DESCRIPTION_CLASS: &str = "feature-description";
const CREDITS_CLASS: &str = "game-header-credits";

/// Pieces left over from "N/A" values and the poll link once feature text is split.
const FEATURE_NOISE: [&str; 3] = ["N", "A", "Viewpollandresults"];

const PARAMETER_ROWS: usize = 4;

fn cached(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("hard-coded regex is valid"))
}

fn year_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached(&RE, r" *\((\d+)\) *")
}

fn trailing_blank_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached(&RE, r"(?m)[\t ]+$")
}

fn non_word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached(&RE, r"\W+")
}

fn capitalized_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached(&RE, r"[A-Z][^A-Z]*")
}

fn more_suffix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached(&RE, r"[0-9]+more")
}

/// Extracts every field of a game detail page.
pub fn extract_game(doc: &Document) -> Result<Game> {
    let rows = parameter_rows(doc);
    let params = extract_parameters(&rows[..])?;
    let (title, release) = extract_title_and_release(doc)?;
    let description = extract_description(doc)?;
    let (category, tags) = extract_category_and_tags(doc)?;
    let publisher = extract_publisher(doc)?;

    Ok(Game {
        title,
        players: params.players,
        release,
        tags,
        age: params.age,
        time: params.time,
        category,
        publisher,
        description,
        weight: params.weight,
    })
}

/// Title and release year from the heading of the second title-info block.
pub fn extract_title_and_release(doc: &Document) -> Result<(String, i32)> {
    let info = nth(doc, QuerySpec::new("div").class(TITLE_INFO_CLASS), 1)?;
    let heading = doc
        .find(&QuerySpec::new("h1").within(info))
        .or_else(|_| doc.find(&QuerySpec::new("a").within(info)))
        .map_err(|_| Error::Extraction(format!("no heading inside .{TITLE_INFO_CLASS}")))?;
    split_title_and_release(&element_text(&heading))
}

/// Splits heading text like `"\t\tGloomhaven (2017) "` into `("Gloomhaven", 2017)`.
pub fn split_title_and_release(raw: &str) -> Result<(String, i32)> {
    let text = raw.replace('\t', "");
    let caps = year_re()
        .captures(&text)
        .ok_or_else(|| Error::Extraction(format!("no parenthesized year in {text:?}")))?;
    let release = caps[1]
        .parse::<i32>()
        .map_err(|e| Error::Extraction(format!("bad release year {:?}: {e}", &caps[1])))?;

    let title = year_re().replace(&text, " ").trim().to_string();
    if title.is_empty() {
        return Err(Error::Extraction(format!("no title before the year in {text:?}")));
    }
    Ok((title, release))
}

/// First paragraph of the second title container, without trailing blanks.
pub fn extract_description(doc: &Document) -> Result<String> {
    let container = nth(doc, QuerySpec::new("div").class(TITLE_CONTAINER_CLASS), 1)?;
    let paragraph = doc.text(&QuerySpec::new("p").within(container))?;
    Ok(trailing_blank_re().replace(&paragraph, "").into_owned())
}

/// Raw text of every parameter row, in page order.
pub fn parameter_rows(doc: &Document) -> Vec<String> {
    doc.text_all(&QuerySpec::new("div").class(PARAMETER_ROW_CLASS))
}

/// Parameter rows split on whitespace runs, empty tokens dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterBlock {
    rows: Vec<Vec<String>>,
}

impl ParameterBlock {
    pub fn tokenize<S: AsRef<str>>(rows: &[S]) -> Self {
        ParameterBlock {
            rows: rows
                .iter()
                .map(|row| row.as_ref().split_whitespace().map(String::from).collect())
                .collect(),
        }
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    fn token(&self, row: usize, index: usize) -> Result<&str> {
        let tokens = self.rows.get(row).ok_or(Error::MissingParameterRow {
            expected: PARAMETER_ROWS,
            found: self.rows.len(),
        })?;
        tokens
            .get(index)
            .map(String::as_str)
            .ok_or(Error::MissingParameterToken {
                row,
                index,
                found: tokens.len(),
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameters {
    pub players: String,
    pub time: String,
    pub age: String,
    pub weight: f64,
}

/// Maps parameter rows by position: players = row 0 token 0, time = row 1 token 0,
/// age = row 2 token 1, weight = row 3 token 2.
pub fn extract_parameters<S: AsRef<str>>(rows: &[S]) -> Result<Parameters> {
    let block = ParameterBlock::tokenize(rows);
    if block.rows().len() < PARAMETER_ROWS {
        return Err(Error::MissingParameterRow {
            expected: PARAMETER_ROWS,
            found: block.rows().len(),
        });
    }

    let players = block.token(0, 0)?.to_string();
    let time = block.token(1, 0)?.to_string();
    let age = block.token(2, 1)?.to_string();
    let weight_token = block.token(3, 2)?;
    let weight = weight_token
        .parse::<f64>()
        .map_err(|e| Error::Extraction(format!("weight {weight_token:?} is not a number: {e}")))?;

    Ok(Parameters {
        players,
        time,
        age,
        weight,
    })
}

/// Category and tags from the first two feature descriptions.
pub fn extract_category_and_tags(doc: &Document) -> Result<(String, Vec<String>)> {
    let features = doc.text_all(&QuerySpec::new("div").class(FEATURE_DESCRIPTION_CLASS));
    if features.len() < 2 {
        return Err(Error::Extraction(format!(
            "expected 2 .{FEATURE_DESCRIPTION_CLASS} blocks, found {}",
            features.len()
        )));
    }

    let categories = split_feature(&features[0]);
    let mut tags = split_feature(&features[1]);
    if let Some(last) = tags.last_mut() {
        let stripped = more_suffix_re().replace(last, "").into_owned();
        *last = stripped;
    }
    tags.retain(|tag| !tag.is_empty());

    let category = categories
        .into_iter()
        .next()
        .ok_or_else(|| Error::Extraction("no category in feature description".into()))?;
    Ok((category, tags))
}

/// `"Adventure, Fantasy + 5 more"` becomes `["Adventure", "Fantasy5more"]`.
fn split_feature(text: &str) -> Vec<String> {
    let squashed = non_word_re().replace_all(text, "");
    capitalized_re()
        .find_iter(&squashed)
        .map(|m| m.as_str())
        .filter(|piece| !FEATURE_NOISE.contains(piece))
        .map(String::from)
        .collect()
}

/// Publisher link from the second credits block.
///
/// The credits list has an extra leading entry on some pages, the publisher is the third item
/// when there are exactly three and the second otherwise.
pub fn extract_publisher(doc: &Document) -> Result<String> {
    let credits = nth(doc, QuerySpec::new("div").class(CREDITS_CLASS), 1)?;
    let items = doc.find_all(&QuerySpec::new("li").within(credits));
    let index = if items.len() == 3 { 2 } else { 1 };
    let item = items.get(index).ok_or_else(|| {
        Error::Extraction(format!(
            "credits list has {} items, no publisher entry",
            items.len()
        ))
    })?;
    let publisher = doc.text(&QuerySpec::new("a").within(*item))?;
    Ok(publisher.trim().to_string())
}

/// Category names linked from the first table of the category listing.
pub fn extract_categories(doc: &Document) -> Result<Vec<String>> {
    let table = doc.find(&QuerySpec::new("table"))?;
    Ok(doc
        .text_all(&QuerySpec::new("a").within(table))
        .into_iter()
        .map(|name| name.trim().to_string())
        .collect())
}

/// Absolute game URLs from a paginated games listing.
pub fn extract_game_links(doc: &Document, base_url: &str) -> Result<Vec<String>> {
    let table = doc.find(&QuerySpec::new("table").id("collectionitems"))?;
    let links = doc
        .find_all(&QuerySpec::new("a").class("primary").within(table))
        .into_iter()
        .filter_map(|anchor| match anchor.value().attr("href") {
            Some(href) => Some(format!("{base_url}{href}")),
            None => {
                warn_time!("Skipping game link without href: {:?}", element_text(&anchor));
                None
            }
        })
        .collect();
    Ok(links)
}

/// The `index`-th match of `spec`, as an extraction failure when there are fewer.
fn nth<'a>(doc: &'a Document, spec: QuerySpec<'a>, index: usize) -> Result<scraper::ElementRef<'a>> {
    doc.find_all(&spec).get(index).copied().ok_or_else(|| {
        Error::Extraction(format!("expected at least {} matches of {spec}", index + 1))
    })
}
