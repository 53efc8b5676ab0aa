//! StaticFetcher against a throwaway local HTTP server.

use std::collections::HashMap;

use bgscrap::process::{collect_categories, collect_game_links};
use bgscrap::{Config, Error, FetchState, PageSource, QuerySpec, StaticFetcher};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serves `pages` (path -> body) until the test ends. Unknown paths get an empty 404.
async fn serve(pages: HashMap<&'static str, &'static str>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            let mut buf = vec![0u8; 4096];
            let n = stream.read(&mut buf).await.unwrap_or(0);
            let request = String::from_utf8_lossy(&buf[..n]);
            let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();

            let (status, body) = match pages.get(path.as_str()) {
                Some(body) => ("200 OK", *body),
                None => ("404 Not Found", ""),
            };
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
    });

    format!("http://{addr}")
}

/// Ignores proxy variables from the environment so requests stay on loopback.
fn fetcher() -> StaticFetcher {
    StaticFetcher::with_client(reqwest::Client::builder().no_proxy().build().unwrap())
}

/// An address nothing listens on.
async fn closed_port() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/")
}

const CATEGORIES: &str = r#"<html><body>
    <table><tr><td><a href="/c/1">Abstract Strategy</a></td><td><a href="/c/2">Card Game</a></td></tr></table>
</body></html>"#;

const PAGE_ONE: &str = r#"<html><body><table id="collectionitems">
    <tr><td><a class="primary" href="/boardgame/174430/gloomhaven">Gloomhaven</a></td></tr>
    <tr><td><a class="primary" href="/boardgame/161936/pandemic-legacy">Pandemic Legacy</a></td></tr>
</table></body></html>"#;

const PAGE_TWO: &str = r#"<html><body><table id="collectionitems">
    <tr><td><a class="primary" href="/boardgame/224517/brass-birmingham">Brass: Birmingham</a></td></tr>
</table></body></html>"#;

#[tokio::test]
async fn fetch_parses_the_response_body() {
    let base = serve(HashMap::from([("/categories", CATEGORIES)])).await;
    let mut fetcher = fetcher();

    let url = format!("{base}/categories");
    let doc = fetcher.fetch(&url).await.unwrap();
    let names = doc.text_all(&QuerySpec::new("a"));
    assert_eq!(names, vec!["Abstract Strategy".to_string(), "Card Game".into()]);

    assert_eq!(fetcher.target().url(), url);
    assert_eq!(fetcher.target().state(), FetchState::Fetched);
}

#[tokio::test]
async fn repointing_discards_the_previous_document() {
    let base = serve(HashMap::from([("/1", PAGE_ONE), ("/categories", CATEGORIES)])).await;
    let mut fetcher = fetcher();

    fetcher.fetch(&format!("{base}/1")).await.unwrap();
    assert_eq!(fetcher.find_all(&QuerySpec::new("a").class("primary")).unwrap().len(), 2);

    fetcher.set_target(&format!("{base}/categories")).await.unwrap();
    assert!(fetcher.find_all(&QuerySpec::new("a").class("primary")).unwrap().is_empty());
    assert!(matches!(
        fetcher.find(&QuerySpec::new("table").id("collectionitems")),
        Err(Error::NoMatch { .. })
    ));
}

#[tokio::test]
async fn malformed_url_fails_before_any_request() {
    let mut fetcher = fetcher();
    let err = fetcher.fetch("fake").await.unwrap_err();
    assert!(matches!(err, Error::MalformedUrl { .. }), "{err:?}");
    assert!(matches!(fetcher.document(), Err(Error::NotFetched)));
}

#[tokio::test]
async fn refused_connection_is_a_network_error() {
    let mut fetcher = fetcher();
    let err = fetcher.fetch(&closed_port().await).await.unwrap_err();
    assert!(err.is_network(), "{err:?}");
}

#[tokio::test]
async fn failed_repoint_leaves_no_stale_document() {
    let base = serve(HashMap::from([("/1", PAGE_ONE)])).await;
    let mut fetcher = fetcher();
    fetcher.fetch(&format!("{base}/1")).await.unwrap();

    let unreachable = closed_port().await;
    assert!(fetcher.set_target(&unreachable).await.is_err());
    assert_eq!(fetcher.target().url(), unreachable);
    assert_eq!(fetcher.target().state(), FetchState::NotFetched);
    assert!(matches!(fetcher.document(), Err(Error::NotFetched)));
}

#[tokio::test]
async fn listing_phase_collects_categories_and_links() {
    let base = serve(HashMap::from([
        ("/categories", CATEGORIES),
        ("/browse/1", PAGE_ONE),
        ("/browse/2", PAGE_TWO),
    ]))
    .await;
    let config = Config::from_lookup(|key| match key {
        "BASE_URL" => Some("https://boardgamegeek.com".into()),
        "CATEGORIES_URL" => Some(format!("{base}/categories")),
        "GAMES_URL" => Some(format!("{base}/browse")),
        "PAGES" => Some("2".into()),
        _ => None,
    })
    .unwrap();

    let mut fetcher = fetcher();
    let categories = collect_categories(&mut fetcher, &config.categories_url).await.unwrap();
    assert_eq!(categories, vec!["Abstract Strategy".to_string(), "Card Game".into()]);

    let links = collect_game_links(&mut fetcher, &config).await.unwrap();
    assert_eq!(
        links,
        vec![
            "https://boardgamegeek.com/boardgame/174430/gloomhaven".to_string(),
            "https://boardgamegeek.com/boardgame/161936/pandemic-legacy".into(),
            "https://boardgamegeek.com/boardgame/224517/brass-birmingham".into(),
        ]
    );
}

#[tokio::test]
async fn missing_listing_page_is_fatal() {
    let base = serve(HashMap::from([("/browse/1", PAGE_ONE)])).await;
    let config = Config::from_lookup(|key| match key {
        "BASE_URL" => Some("https://boardgamegeek.com".into()),
        "CATEGORIES_URL" => Some(format!("{base}/categories")),
        "GAMES_URL" => Some(format!("{base}/browse")),
        "PAGES" => Some("2".into()),
        _ => None,
    })
    .unwrap();

    // Page 2 is a 404 with an empty body, so it has no collection table.
    let mut fetcher = fetcher();
    let err = collect_game_links(&mut fetcher, &config).await.unwrap_err();
    assert!(matches!(err, Error::NoMatch { .. }), "{err:?}");
}
