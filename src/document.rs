//! Structural queries over a parsed page.
//!
//! A [`Document`] is produced by either fetcher and queried the same way no matter where it came
//! from. The search parameters live in a [`QuerySpec`]; optional filters combine with AND.

use std::fmt;

use scraper::{CaseSensitivity, ElementRef, Html};

use crate::request::FetchTarget;
use crate::{Error, Result};

/// Immutable parsed markup of one page snapshot.
///
/// Node handles returned by queries borrow the document, so they can't outlive the fetcher
/// state that produced them.
pub struct Document {
    html: Html,
}

impl Document {
    pub fn parse(markup: &str) -> Self {
        Document {
            html: Html::parse_document(markup),
        }
    }

    /// All elements matching `spec`, in document order, regardless of its cardinality and
    /// projection.
    pub fn find_all<'a>(&'a self, spec: &QuerySpec<'a>) -> Vec<ElementRef<'a>> {
        match spec.scope {
            // `descendants` yields the node itself first.
            Some(scope) => scope
                .descendants()
                .skip(1)
                .filter_map(ElementRef::wrap)
                .filter(|el| spec.matches(el))
                .collect(),
            None => self
                .html
                .tree
                .root()
                .descendants()
                .filter_map(ElementRef::wrap)
                .filter(|el| spec.matches(el))
                .collect(),
        }
    }

    /// First element matching `spec`, or [`Error::NoMatch`].
    pub fn find<'a>(&'a self, spec: &QuerySpec<'a>) -> Result<ElementRef<'a>> {
        self.find_all(spec)
            .into_iter()
            .next()
            .ok_or_else(|| Error::NoMatch {
                query: spec.to_string(),
            })
    }

    pub fn text_all<'a>(&'a self, spec: &QuerySpec<'a>) -> Vec<String> {
        self.find_all(spec).iter().map(element_text).collect()
    }

    pub fn text<'a>(&'a self, spec: &QuerySpec<'a>) -> Result<String> {
        self.find(spec).map(|el| element_text(&el))
    }

    /// Runs `spec` honoring its cardinality and projection.
    pub fn query<'a>(&'a self, spec: &QuerySpec<'a>) -> Result<Matches<'a>> {
        let matches = match (spec.cardinality, spec.projection) {
            (Cardinality::All, Projection::Node) => Matches::Nodes(self.find_all(spec)),
            (Cardinality::All, Projection::Text) => Matches::Texts(self.text_all(spec)),
            (Cardinality::First, Projection::Node) => Matches::Node(self.find(spec)?),
            (Cardinality::First, Projection::Text) => Matches::Text(self.text(spec)?),
        };
        Ok(matches)
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("root", &self.html.root_element().value().name())
            .finish_non_exhaustive()
    }
}

/// Concatenated text of every text node below `el`, unmodified.
pub fn element_text(el: &ElementRef<'_>) -> String {
    el.text().collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cardinality {
    First,
    #[default]
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Projection {
    #[default]
    Text,
    Node,
}

/// Parameters of a structural search.
///
/// ```
/// use bgscrap::{Document, QuerySpec};
///
/// let doc = Document::parse(r#"<table id="t"><tr><td><a class="primary">Go</a></td></tr></table>"#);
/// let table = doc.find(&QuerySpec::new("table").id("t")).unwrap();
/// let links = doc.text_all(&QuerySpec::new("a").class("primary").within(table));
/// assert_eq!(links, vec!["Go".to_string()]);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct QuerySpec<'a> {
    pub tag: &'a str,
    pub class: Option<&'a str>,
    pub id: Option<&'a str>,
    pub scope: Option<ElementRef<'a>>,
    pub cardinality: Cardinality,
    pub projection: Projection,
}

impl<'a> QuerySpec<'a> {
    pub fn new(tag: &'a str) -> Self {
        QuerySpec {
            tag,
            class: None,
            id: None,
            scope: None,
            cardinality: Cardinality::default(),
            projection: Projection::default(),
        }
    }

    pub fn class(mut self, class: &'a str) -> Self {
        self.class = Some(class);
        self
    }

    pub fn id(mut self, id: &'a str) -> Self {
        self.id = Some(id);
        self
    }

    /// Restricts the search to descendants of `scope`.
    pub fn within(mut self, scope: ElementRef<'a>) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn first(mut self) -> Self {
        self.cardinality = Cardinality::First;
        self
    }

    pub fn all(mut self) -> Self {
        self.cardinality = Cardinality::All;
        self
    }

    pub fn nodes(mut self) -> Self {
        self.projection = Projection::Node;
        self
    }

    pub fn texts(mut self) -> Self {
        self.projection = Projection::Text;
        self
    }

    fn matches(&self, el: &ElementRef<'_>) -> bool {
        let element = el.value();
        if !element.name().eq_ignore_ascii_case(self.tag) {
            return false;
        }
        if let Some(class) = self.class {
            // A class token, or the whole attribute when the caller passes several classes.
            let has_class = element.has_class(class, CaseSensitivity::CaseSensitive)
                || element.attr("class") == Some(class);
            if !has_class {
                return false;
            }
        }
        match self.id {
            Some(id) => element.id() == Some(id),
            None => true,
        }
    }
}

impl fmt::Display for QuerySpec<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.tag)?;
        if let Some(class) = self.class {
            write!(f, " class=\"{class}\"")?;
        }
        if let Some(id) = self.id {
            write!(f, " id=\"{id}\"")?;
        }
        f.write_str(">")?;
        if let Some(scope) = self.scope {
            write!(f, " within <{}>", scope.value().name())?;
        }
        Ok(())
    }
}

/// Result of [`Document::query`], shaped by the query's cardinality and projection.
#[derive(Debug, Clone)]
pub enum Matches<'a> {
    Nodes(Vec<ElementRef<'a>>),
    Node(ElementRef<'a>),
    Texts(Vec<String>),
    Text(String),
}

/// Something that holds a [`Document`] and can be queried.
///
/// Both fetchers implement this, so the query surface is defined once here.
pub trait PageSource {
    fn target(&self) -> &FetchTarget;

    /// The current document, or [`Error::NotFetched`] before the first successful fetch.
    fn document(&self) -> Result<&Document>;

    fn query<'a>(&'a self, spec: &QuerySpec<'a>) -> Result<Matches<'a>> {
        self.document()?.query(spec)
    }

    fn find_all<'a>(&'a self, spec: &QuerySpec<'a>) -> Result<Vec<ElementRef<'a>>> {
        Ok(self.document()?.find_all(spec))
    }

    fn find<'a>(&'a self, spec: &QuerySpec<'a>) -> Result<ElementRef<'a>> {
        self.document()?.find(spec)
    }

    fn text_all<'a>(&'a self, spec: &QuerySpec<'a>) -> Result<Vec<String>> {
        Ok(self.document()?.text_all(spec))
    }

    fn text<'a>(&'a self, spec: &QuerySpec<'a>) -> Result<String> {
        self.document()?.text(spec)
    }
}
