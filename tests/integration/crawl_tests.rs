//! Crawl behavior: depth limit, dedup, retries, and full HTTP runs

use crate::support::{start_engine, test_config, url_set, Site};
use pool_crawler::config::{Config, HttpConfig};
use pool_crawler::crawler::{http_engine, Admission, CrawlEngine, HtmlLinkExtractor, HttpFetcher};
use pool_crawler::CrawlError;
use pool_crawler::storage::{MemoryStateStore, SqliteStateStore, StateStore};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const A: &str = "http://site.test/a";
const B: &str = "http://site.test/b";
const C: &str = "http://site.test/c";
const D: &str = "http://site.test/d";
const E: &str = "http://site.test/e";

#[tokio::test]
async fn test_depth_dedup_and_retry_scenario() {
    let site = Arc::new(
        Site::new()
            .page(A, &[B, C])
            .page(B, &[A, D])
            .page(D, &[E])
            .failing(C),
    );
    let store = Arc::new(MemoryStateStore::new());
    let engine = start_engine(&site, test_config(4, 2), store.clone());

    assert_eq!(engine.seed(A), Admission::Submitted);
    engine.wait_idle().await;
    let summary = engine.shutdown(Duration::from_secs(5)).await;

    // D sits at max depth: fetched but never expanded
    assert_eq!(engine.visited().snapshot(), url_set(&[A, B, C, D]));
    assert_eq!(site.calls(A), 1);
    assert_eq!(site.calls(B), 1);
    assert_eq!(site.calls(D), 1);
    assert_eq!(site.calls(E), 0);

    // C fails, is retried once, then abandoned
    assert_eq!(site.calls(C), 2);
    assert!(engine.retry_tracker().has_failed(C));
    assert_eq!(summary.stats.pages_fetched, 3);
    assert_eq!(summary.stats.fetch_failures, 2);
    assert_eq!(summary.stats.retries, 1);
    assert_eq!(summary.stats.abandoned, 1);

    assert_eq!(summary.stats.urls_visited, 4);
    assert_eq!(summary.visited_set_size, 4);
    assert!(summary.persisted);
    assert_eq!(store.stored().unwrap(), url_set(&[A, B, C, D]));
}

#[tokio::test]
async fn test_max_depth_zero_fetches_only_seed() {
    let site = Arc::new(Site::new().page(A, &[B, C]));
    let engine = start_engine(&site, test_config(2, 0), Arc::new(MemoryStateStore::new()));

    engine.seed(A);
    engine.wait_idle().await;

    assert_eq!(site.all_calls().len(), 1);
    assert_eq!(site.calls(A), 1);
    assert_eq!(engine.visited().snapshot(), url_set(&[A]));
    engine.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_cycle_terminates() {
    let site = Arc::new(Site::new().page(A, &[B]).page(B, &[A]));
    let engine = start_engine(&site, test_config(2, 100), Arc::new(MemoryStateStore::new()));

    engine.seed(A);
    engine.wait_idle().await;

    assert_eq!(site.calls(A), 1);
    assert_eq!(site.calls(B), 1);
    engine.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_densely_linked_site_fetches_each_url_once() {
    let urls: Vec<String> = (0..25).map(|i| format!("http://site.test/p{}", i)).collect();
    let links: Vec<&str> = urls.iter().map(String::as_str).collect();
    let site = Arc::new(
        urls.iter()
            .fold(Site::new(), |site, url| site.page(url, &links)),
    );
    let engine = start_engine(&site, test_config(8, 3), Arc::new(MemoryStateStore::new()));

    engine.seed(&urls[0]);
    engine.wait_idle().await;

    let calls = site.all_calls();
    assert_eq!(calls.len(), 25);
    assert!(calls.values().all(|n| *n == 1), "duplicate fetch: {:?}", calls);

    let stats = engine.stats();
    assert_eq!(stats.crawl_count, 25);
    assert_eq!(stats.urls_visited, 25);
    engine.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_crawl_calls_admit_each_url_once() {
    let site = Arc::new(Site::new());
    let engine = start_engine(&site, test_config(4, 1), Arc::new(MemoryStateStore::new()));

    let mut handles = Vec::new();
    for _ in 0..16 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            (0..50)
                .map(|i| engine.crawl(&format!("http://site.test/u{}", i), 1))
                .filter(|admission| *admission == Admission::Submitted)
                .count()
        }));
    }

    let mut submitted = 0;
    for handle in handles {
        submitted += handle.await.unwrap();
    }

    assert_eq!(submitted, 50);
    engine.wait_idle().await;
    assert!(site.all_calls().values().all(|n| *n <= 2));
    engine.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_retry_keeps_depth() {
    // B always fails; its retry stays at depth 1 and passes the depth gate
    let site = Arc::new(Site::new().page(A, &[B]).failing(B));
    let engine = start_engine(&site, test_config(2, 1), Arc::new(MemoryStateStore::new()));

    engine.seed(A);
    engine.wait_idle().await;

    assert_eq!(site.calls(B), 2);
    assert_eq!(engine.stats().retries, 1);
    assert_eq!(engine.stats().skipped, 0);
    engine.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_full_http_crawl_with_depth_limit() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(format!(
                    r#"<html><body>
                    <a href="{}/page1">Page 1</a>
                    <a href="/page2">Page 2</a>
                    <a href="mailto:someone@example.com">Mail</a>
                    </body></html>"#,
                    base_url
                ))
                .insert_header("content-type", "text/html"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<html><body><a href="/">Home</a></body></html>"#),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<html><body><a href="/page3">Deeper</a></body></html>"#),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    // page3 is two hops from the seed; max_depth = 1 keeps it out
    Mock::given(method("GET"))
        .and(path("/page3"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("visited.db");
    let store = Arc::new(SqliteStateStore::new(&state_path));

    let engine = CrawlEngine::new(
        test_config(3, 1),
        HttpFetcher::new(&HttpConfig::default()).unwrap(),
        HtmlLinkExtractor::new(),
        store.clone(),
        true,
    )
    .unwrap();

    let seed = format!("{}/", base_url);
    engine.seed(&seed);
    engine.wait_idle().await;
    let summary = engine.shutdown(Duration::from_secs(5)).await;

    assert_eq!(summary.stats.pages_fetched, 3);
    assert!(summary.persisted);

    let saved = store.load().unwrap();
    assert_eq!(
        saved,
        url_set(&[
            seed.as_str(),
            format!("{}/page1", base_url).as_str(),
            format!("{}/page2", base_url).as_str(),
        ])
    );
}

#[tokio::test]
async fn test_http_retry_recovers_after_one_failure() {
    let mock_server = MockServer::start().await;

    // First request fails; the second falls through to the 200 mock
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let engine = CrawlEngine::new(
        test_config(1, 1),
        HttpFetcher::new(&HttpConfig::default()).unwrap(),
        HtmlLinkExtractor::new(),
        Arc::new(MemoryStateStore::new()),
        false,
    )
    .unwrap();

    engine.seed(&format!("{}/flaky", mock_server.uri()));
    engine.wait_idle().await;
    let summary = engine.shutdown(Duration::from_secs(5)).await;

    assert_eq!(summary.stats.fetch_failures, 1);
    assert_eq!(summary.stats.retries, 1);
    assert_eq!(summary.stats.pages_fetched, 1);
    assert_eq!(summary.stats.abandoned, 0);
}

#[tokio::test]
async fn test_http_engine_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.crawler.worker_count = 3;
    config.state.path = dir.path().join("visited.db");

    let engine = http_engine(&config, false).unwrap();
    assert_eq!(engine.pool_capacity(), 3);
    let summary = engine.shutdown(Duration::from_secs(1)).await;

    assert!(summary.persisted);
    assert!(config.state.path.exists());

    config.crawler.worker_count = 0;
    assert!(matches!(
        http_engine(&config, false),
        Err(CrawlError::Config(_))
    ));
}
