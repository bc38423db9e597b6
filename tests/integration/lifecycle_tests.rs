//! Resize, shutdown, persistence and resume

use crate::support::{start_engine, test_config, url_set, Site};
use pool_crawler::crawler::Admission;
use pool_crawler::storage::{MemoryStateStore, SqliteStateStore, StateStore};
use pool_crawler::CrawlError;
use std::sync::Arc;
use std::time::Duration;

const A: &str = "http://site.test/a";
const B: &str = "http://site.test/b";
const C: &str = "http://site.test/c";

/// A linear chain p0 -> p1 -> ... -> p{len-1}
fn chain(len: usize) -> (Site, Vec<String>) {
    let urls: Vec<String> = (0..len).map(|i| format!("http://site.test/p{}", i)).collect();
    let site = urls.iter().enumerate().fold(Site::new(), |site, (i, url)| {
        match urls.get(i + 1) {
            Some(next) => site.page(url, &[next.as_str()]),
            None => site.page(url, &[]),
        }
    });
    (site, urls)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_resize_mid_run_keeps_visited_set_consistent() {
    let (site, urls) = chain(40);
    let site = Arc::new(site.page(A, &[]).slow(Duration::from_millis(10)));
    let engine = start_engine(&site, test_config(2, 100), Arc::new(MemoryStateStore::new()));

    engine.seed(&urls[0]);
    tokio::time::sleep(Duration::from_millis(35)).await;
    engine.resize(6).unwrap();
    assert_eq!(engine.pool_capacity(), 6);

    // Work on the old pool was abandoned; the engine still settles
    engine.wait_idle().await;
    assert_eq!(engine.outstanding(), 0);

    let visited = engine.visited().snapshot();
    assert!(visited.contains(&urls[0]));
    assert!(site.all_calls().values().all(|n| *n == 1));
    for url in site.all_calls().keys() {
        assert!(visited.contains(url), "fetched but not visited: {}", url);
    }

    // The replacement pool takes new work
    assert_eq!(engine.crawl(A, 0), Admission::Submitted);
    engine.wait_idle().await;
    assert_eq!(site.calls(A), 1);
    engine.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_repeated_resizes_while_crawling() {
    let (site, urls) = chain(20);
    let site = Arc::new(site);
    let engine = start_engine(&site, test_config(3, 100), Arc::new(MemoryStateStore::new()));

    let crawler = {
        let engine = engine.clone();
        let urls = urls.clone();
        tokio::spawn(async move {
            for url in &urls {
                engine.crawl(url, 0);
                tokio::task::yield_now().await;
            }
        })
    };
    for size in [1, 4, 2, 8] {
        engine.resize(size).unwrap();
        tokio::task::yield_now().await;
    }
    crawler.await.unwrap();
    engine.wait_idle().await;

    assert_eq!(engine.pool_capacity(), 8);
    assert_eq!(engine.visited().len(), 20);
    assert!(site.all_calls().values().all(|n| *n == 1));
    engine.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_resize_rejects_zero() {
    let site = Arc::new(Site::new());
    let engine = start_engine(&site, test_config(2, 1), Arc::new(MemoryStateStore::new()));

    let result = engine.resize(0);

    assert!(matches!(result, Err(CrawlError::InvalidPoolSize(0))));
    assert_eq!(engine.pool_capacity(), 2);
    engine.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_shutdown_marks_late_links_visited_without_crawling() {
    let site = Arc::new(Site::new().page(A, &[B]).slow(Duration::from_millis(50)));
    let store = Arc::new(MemoryStateStore::new());
    let engine = start_engine(&site, test_config(1, 5), store.clone());

    engine.seed(A);
    let summary = engine.shutdown(Duration::from_secs(5)).await;

    assert!(!summary.timed_out);
    assert_eq!(site.calls(A), 1);
    assert_eq!(site.calls(B), 0);
    assert_eq!(summary.stats.rejected, 1);
    assert_eq!(store.stored().unwrap(), url_set(&[A, B]));
    assert_eq!(store.save_count(), 1);
}

#[tokio::test]
async fn test_shutdown_timeout_aborts_and_still_saves() {
    let site = Arc::new(Site::new().page(A, &[]).slow(Duration::from_secs(30)));
    let store = Arc::new(MemoryStateStore::new());
    let engine = start_engine(&site, test_config(1, 1), store.clone());

    engine.seed(A);
    tokio::time::sleep(Duration::from_millis(20)).await;

    let started = std::time::Instant::now();
    let summary = engine.shutdown(Duration::from_millis(100)).await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(summary.timed_out);
    assert!(summary.persisted);
    assert_eq!(summary.stats.pages_fetched, 0);
    assert_eq!(store.stored().unwrap(), url_set(&[A]));

    engine.wait_idle().await;
    assert_eq!(engine.outstanding(), 0);
}

#[tokio::test]
async fn test_shutdown_persists_every_admitted_url() {
    let (site, urls) = chain(10);
    let site = Arc::new(site);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state").join("visited.db");
    let store = Arc::new(SqliteStateStore::new(&path));
    let engine = start_engine(&site, test_config(4, 100), store.clone());

    engine.seed(&urls[0]);
    engine.crawl(C, 3);
    let admitted_before_shutdown = engine.visited().snapshot();
    let summary = engine.shutdown(Duration::from_secs(5)).await;

    assert!(summary.persisted);
    let reloaded = SqliteStateStore::new(&path).load().unwrap();
    assert!(reloaded.is_superset(&admitted_before_shutdown));
    assert_eq!(reloaded, engine.visited().snapshot());
    assert_eq!(store.snapshot_info().unwrap().unwrap().url_count as usize, reloaded.len());
}

#[tokio::test]
async fn test_resume_skips_persisted_urls() {
    let site = Arc::new(Site::new().page(A, &[B]).page(B, &[C]).page(C, &[]));
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("visited.db");

    let first = start_engine(&site, test_config(2, 1), Arc::new(SqliteStateStore::new(&path)));
    first.seed(A);
    first.wait_idle().await;
    first.shutdown(Duration::from_secs(5)).await;
    assert_eq!(site.calls(A), 1);
    assert_eq!(site.calls(B), 1);
    assert_eq!(site.calls(C), 0);

    let second = start_engine(&site, test_config(2, 1), Arc::new(SqliteStateStore::new(&path)));
    assert_eq!(second.visited().len(), 2);
    assert_eq!(second.seed(A), Admission::SkippedVisited);
    assert_eq!(second.crawl(B, 0), Admission::SkippedVisited);
    assert_eq!(second.crawl(C, 0), Admission::Submitted);
    second.wait_idle().await;
    second.shutdown(Duration::from_secs(5)).await;

    assert_eq!(site.calls(A), 1);
    assert_eq!(site.calls(C), 1);
    let saved = SqliteStateStore::new(&path).load().unwrap();
    assert_eq!(saved, url_set(&[A, B, C]));
}

#[tokio::test]
async fn test_corrupt_state_file_starts_empty() {
    let site = Arc::new(Site::new().page(A, &[]));
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("visited.db");
    std::fs::write(&path, b"definitely not sqlite").unwrap();

    let engine = start_engine(&site, test_config(1, 1), Arc::new(SqliteStateStore::new(&path)));
    assert!(engine.visited().is_empty());

    engine.seed(A);
    engine.wait_idle().await;
    let summary = engine.shutdown(Duration::from_secs(5)).await;

    assert!(summary.persisted);
    assert_eq!(SqliteStateStore::new(&path).load().unwrap(), url_set(&[A]));
}
