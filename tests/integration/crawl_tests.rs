//! Integration tests for the crawler
//!
//! These tests use wiremock to serve a small mock catalog and run the full
//! crawl cycle end-to-end against a temporary database.

use catalog_sweep::config::{
    Config, CrawlerConfig, OutputConfig, SelectorConfig, SiteConfig, StartUrl, UserAgentConfig,
};
use catalog_sweep::crawler::{Coordinator, RunOutcome};
use catalog_sweep::extension::OutputExtension;
use catalog_sweep::storage::{
    CheckpointStore, Frontier, OutputSink, RunStatus, SqliteStorage, Storage,
};
use catalog_sweep::{RequestState, Role, SweepError};
use scraper::Html;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LISTING_PATH: &str = "/shopping/women/items.aspx";

/// Creates a test configuration for a catalog served by `server`
fn create_test_config(server: &MockServer, db_path: &Path, max_items: Option<u64>) -> Config {
    Config {
        crawler: CrawlerConfig {
            min_concurrency: 2,
            max_concurrency: 5,
            max_request_retries: 1,
            handle_page_timeout_secs: 10,
            request_delay_ms: 0,
            max_items,
        },
        site: SiteConfig {
            base_url: format!("{}/", server.uri()),
            item_url_pattern: r"\d+.aspx".to_string(),
            selectors: SelectorConfig::default(),
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        proxy: None,
        output: OutputConfig {
            database_path: db_path.display().to_string(),
        },
        start_urls: vec![StartUrl {
            url: format!("{}{}", server.uri(), LISTING_PATH),
        }],
        extension: None,
    }
}

fn db_path(dir: &TempDir) -> PathBuf {
    dir.path().join("sweep.db")
}

fn item_path(id: &str) -> String {
    format!("/shopping/women/item-{}.aspx", id)
}

fn listing_html(ids: &[&str]) -> String {
    let links: String = ids
        .iter()
        .map(|id| {
            format!(
                r#"<li><a itemprop="itemListElement" itemid="{}" href="{}">Item {}</a></li>"#,
                id,
                item_path(id),
                id
            )
        })
        .collect();
    format!("<html><body><ul>{}</ul></body></html>", links)
}

fn item_html(id: &str) -> String {
    format!(
        r#"<html><body>
            <h1><span itemprop="name">Item {id}</span></h1>
            <meta itemprop="productID" content="{id}">
            <meta itemprop="color" content="Navy">
            <div aria-label="[Product information]">
                <span data-tstid="priceInfo-original">$100</span>
                <select>
                    <option>Select size</option>
                    <option>S</option>
                    <option>M</option>
                </select>
            </div>
        </body></html>"#
    )
}

/// Mounts a listing page; `page` None is the listing root
///
/// Pages with a `page` parameter must be mounted before the root: the first
/// matching mock wins.
async fn mount_listing(server: &MockServer, page: Option<&str>, ids: &[&str]) {
    let mock = Mock::given(method("GET")).and(path(LISTING_PATH));
    let mock = match page {
        Some(page) => mock.and(query_param("page", page)),
        None => mock,
    };
    mock.respond_with(ResponseTemplate::new(200).set_body_string(listing_html(ids)))
        .mount(server)
        .await;
}

async fn mount_items(server: &MockServer, ids: &[&str]) {
    for id in ids {
        Mock::given(method("GET"))
            .and(path(item_path(id)))
            .respond_with(ResponseTemplate::new(200).set_body_string(item_html(id)))
            .mount(server)
            .await;
    }
}

fn open_storage(dir: &TempDir) -> SqliteStorage {
    SqliteStorage::new(&db_path(dir)).expect("Failed to open test database")
}

fn record_ids(records: &[Value]) -> Vec<String> {
    let mut ids: Vec<String> = records
        .iter()
        .map(|record| record["itemId"].as_str().unwrap_or_default().to_string())
        .collect();
    ids.sort();
    ids
}

#[tokio::test]
async fn test_three_item_listing_end_to_end() {
    let server = MockServer::start().await;
    mount_listing(&server, Some("2"), &[]).await;
    mount_listing(&server, None, &["101", "102", "103"]).await;
    mount_items(&server, &["101", "102", "103"]).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server, &db_path(&dir), None);

    let mut coordinator = Coordinator::new(config, "hash", true).expect("Failed to create coordinator");
    let outcome = coordinator.run().await.expect("Crawl failed");
    assert_eq!(outcome, RunOutcome::Completed);

    let storage = open_storage(&dir);
    let records = storage.load_records().unwrap();
    assert_eq!(record_ids(&records), vec!["101", "102", "103"]);
    assert_eq!(storage.count_by_role(Role::ListingPage).unwrap(), 1);
    assert_eq!(storage.count_by_state(RequestState::Handled).unwrap(), 5);

    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(storage.get_value("detailsEnqueued").unwrap(), Some(json!(3)));
}

#[tokio::test]
async fn test_record_layout() {
    let server = MockServer::start().await;
    mount_listing(&server, Some("2"), &[]).await;
    mount_listing(&server, None, &["101"]).await;
    mount_items(&server, &["101"]).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server, &db_path(&dir), None);
    Coordinator::new(config, "hash", true)
        .unwrap()
        .run()
        .await
        .unwrap();

    let records = open_storage(&dir).load_records().unwrap();
    assert_eq!(records.len(), 1);

    let record = &records[0];
    assert_eq!(record["url"], json!(format!("{}{}", server.uri(), item_path("101"))));
    assert_eq!(record["name"], json!("Item 101"));
    assert_eq!(record["color"], json!("Navy"));
    assert_eq!(record["price"], json!("$100"));
    // The first option is the size prompt
    assert_eq!(record["sizes"], json!(["S", "M"]));
    assert_eq!(record["#debug"]["method"], json!("GET"));
    assert_eq!(record["#debug"]["statusCode"], json!(200));

    let keys: Vec<&String> = record.as_object().unwrap().keys().collect();
    assert_eq!(
        keys,
        vec!["url", "name", "itemId", "color", "sizes", "price", "#debug"]
    );
}

#[tokio::test]
async fn test_stop_marker_ends_listing_chain() {
    let server = MockServer::start().await;
    mount_listing(&server, Some("2"), &["201", "202"]).await;
    mount_listing(&server, Some("3"), &["301", "101", "302"]).await;
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .and(query_param("page", "4"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_html(&["401"])))
        .expect(0)
        .mount(&server)
        .await;
    mount_listing(&server, None, &["101", "102"]).await;
    mount_items(&server, &["101", "102", "201", "202", "301", "302"]).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server, &db_path(&dir), None);
    let outcome = Coordinator::new(config, "hash", true)
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(outcome, RunOutcome::Completed);

    let storage = open_storage(&dir);
    let records = storage.load_records().unwrap();
    // 302 sits after the marker on page 3 and is never admitted
    assert_eq!(record_ids(&records), vec!["101", "102", "201", "202", "301"]);
    assert_eq!(storage.count_by_role(Role::ListingPage).unwrap(), 2);
}

#[tokio::test]
async fn test_max_items_bounds_records() {
    let server = MockServer::start().await;
    mount_listing(&server, Some("2"), &["201", "202"]).await;
    mount_listing(&server, None, &["101", "102", "103"]).await;
    mount_items(&server, &["101", "102", "103", "201", "202"]).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server, &db_path(&dir), Some(2));
    let mut coordinator = Coordinator::new(config, "hash", true).unwrap();
    coordinator.run().await.unwrap();
    assert_eq!(coordinator.gate().items_enqueued(), 2);

    let storage = open_storage(&dir);
    assert_eq!(storage.count_records().unwrap(), 2);
    assert_eq!(storage.count_by_role(Role::ItemDetail).unwrap(), 2);
}

#[tokio::test]
async fn test_resume_respects_checkpointed_counter() {
    let server = MockServer::start().await;
    mount_listing(&server, Some("2"), &[]).await;
    mount_listing(&server, None, &["101", "102", "103"]).await;
    mount_items(&server, &["101", "102", "103"]).await;

    let dir = TempDir::new().unwrap();
    {
        // A previous process admitted 2 items before it was suspended
        let mut storage = open_storage(&dir);
        let run_id = storage.create_run("hash").unwrap();
        storage.set_value("detailsEnqueued", &json!(2)).unwrap();
        storage
            .update_run_status(run_id, RunStatus::Interrupted)
            .unwrap();
    }

    let config = create_test_config(&server, &db_path(&dir), Some(3));
    let mut coordinator = Coordinator::new(config, "hash", false).unwrap();
    assert_eq!(coordinator.gate().items_enqueued(), 2);
    coordinator.run().await.unwrap();

    let storage = open_storage(&dir);
    assert_eq!(storage.count_records().unwrap(), 1);
    assert_eq!(storage.get_value("detailsEnqueued").unwrap(), Some(json!(3)));
}

#[tokio::test]
async fn test_suspend_then_resume() {
    let server = MockServer::start().await;
    mount_listing(&server, Some("2"), &[]).await;
    mount_listing(&server, None, &["101", "102"]).await;
    mount_items(&server, &["101", "102", "900"]).await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&server, &db_path(&dir), None);
    config.start_urls.push(StartUrl {
        url: format!("{}{}", server.uri(), item_path("900")),
    });

    let mut first = Coordinator::new(config.clone(), "hash", true).unwrap();
    let outcome = first.run_until(std::future::ready(())).await.unwrap();
    assert_eq!(outcome, RunOutcome::Suspended);
    let suspended_run = first.run_id();
    drop(first);

    {
        let storage = open_storage(&dir);
        assert_eq!(storage.get_run(suspended_run).unwrap().status, RunStatus::Interrupted);
        assert_eq!(storage.get_value("detailsEnqueued").unwrap(), Some(json!(1)));
    }

    let mut second = Coordinator::new(config, "hash", false).unwrap();
    assert_eq!(second.run_id(), suspended_run);
    let outcome = second.run().await.unwrap();
    assert_eq!(outcome, RunOutcome::Completed);

    let storage = open_storage(&dir);
    assert_eq!(
        record_ids(&storage.load_records().unwrap()),
        vec!["101", "102", "900"]
    );
    assert_eq!(storage.get_value("detailsEnqueued").unwrap(), Some(json!(3)));
}

#[tokio::test]
async fn test_duplicate_links_enqueued_once() {
    let server = MockServer::start().await;
    mount_listing(&server, Some("2"), &["101", "102"]).await;
    mount_listing(&server, None, &["101", "101", "102"]).await;
    mount_items(&server, &["101", "102"]).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server, &db_path(&dir), None);
    let mut coordinator = Coordinator::new(config, "hash", true).unwrap();
    coordinator.run().await.unwrap();

    assert_eq!(coordinator.gate().items_enqueued(), 2);
    let storage = open_storage(&dir);
    assert_eq!(storage.count_records().unwrap(), 2);
}

#[tokio::test]
async fn test_extension_fields_merged_into_records() {
    let server = MockServer::start().await;
    mount_listing(&server, Some("2"), &[]).await;
    mount_listing(&server, None, &["101", "102"]).await;
    mount_items(&server, &["101", "102"]).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server, &db_path(&dir), None);
    let extension: Arc<dyn OutputExtension> = Arc::new(|_: &Html| json!({ "brand": "X" }));

    let mut coordinator = Coordinator::with_extension(config, "hash", true, Some(extension)).unwrap();
    coordinator.run().await.unwrap();

    let records = open_storage(&dir).load_records().unwrap();
    assert_eq!(records.len(), 2);
    for record in &records {
        assert_eq!(record["brand"], json!("X"));
        assert_eq!(record["price"], json!("$100"));
    }
}

#[tokio::test]
async fn test_extension_returning_non_object_is_fatal() {
    let server = MockServer::start().await;
    mount_listing(&server, Some("2"), &[]).await;
    mount_listing(&server, None, &["101", "102"]).await;
    mount_items(&server, &["101", "102"]).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server, &db_path(&dir), None);
    let extension: Arc<dyn OutputExtension> = Arc::new(|_: &Html| json!("brand"));

    let mut coordinator = Coordinator::with_extension(config, "hash", true, Some(extension)).unwrap();
    let result = coordinator.run().await;

    assert!(matches!(result, Err(SweepError::ExtensionContract { .. })));

    let storage = open_storage(&dir);
    assert_eq!(storage.count_records().unwrap(), 0);
    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Failed);
}

#[tokio::test]
async fn test_failing_item_is_abandoned_after_retries() {
    let server = MockServer::start().await;
    mount_listing(&server, Some("2"), &[]).await;
    mount_listing(&server, None, &["101", "500"]).await;
    mount_items(&server, &["101"]).await;
    Mock::given(method("GET"))
        .and(path(item_path("500")))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server, &db_path(&dir), None);
    let outcome = Coordinator::new(config, "hash", true)
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(outcome, RunOutcome::Completed);

    let storage = open_storage(&dir);
    assert_eq!(storage.count_records().unwrap(), 1);
    assert_eq!(storage.count_by_state(RequestState::Failed).unwrap(), 1);

    let failed = storage
        .get_request_by_url(&format!("{}{}", server.uri(), item_path("500")))
        .unwrap()
        .unwrap();
    assert_eq!(failed.state, RequestState::Failed);
    assert_eq!(failed.error_messages.len(), 2);
}

#[tokio::test]
async fn test_panicking_worker_is_retried_then_abandoned() {
    let server = MockServer::start().await;
    mount_listing(&server, Some("2"), &[]).await;
    mount_listing(&server, None, &["101"]).await;
    Mock::given(method("GET"))
        .and(path(item_path("101")))
        .respond_with(ResponseTemplate::new(200).set_body_string(item_html("101")))
        .expect(2)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server, &db_path(&dir), None);
    let extension: Arc<dyn OutputExtension> =
        Arc::new(|_: &Html| -> Value { panic!("extension blew up") });

    let mut coordinator = Coordinator::with_extension(config, "hash", true, Some(extension)).unwrap();
    let outcome = coordinator.run().await.unwrap();
    assert_eq!(outcome, RunOutcome::Completed);

    let storage = open_storage(&dir);
    assert_eq!(storage.count_by_state(RequestState::InProgress).unwrap(), 0);
    assert_eq!(storage.count_by_state(RequestState::Failed).unwrap(), 1);
    assert_eq!(storage.count_records().unwrap(), 0);

    let failed = storage
        .get_request_by_url(&format!("{}{}", server.uri(), item_path("101")))
        .unwrap()
        .unwrap();
    assert_eq!(failed.error_messages.len(), 2);
    assert!(failed.error_messages[0].contains("extension blew up"));
}

#[tokio::test]
async fn test_last_page_seed_completes_cleanly() {
    let server = MockServer::start().await;
    mount_listing(&server, None, &["101"]).await;
    mount_items(&server, &["101"]).await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&server, &db_path(&dir), None);
    config.start_urls = vec![StartUrl {
        url: format!("{}{}?page={}", server.uri(), LISTING_PATH, u64::MAX),
    }];

    let outcome = Coordinator::new(config, "hash", true)
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(outcome, RunOutcome::Completed);

    let storage = open_storage(&dir);
    assert_eq!(storage.count_by_state(RequestState::InProgress).unwrap(), 0);
    assert_eq!(storage.count_by_state(RequestState::Handled).unwrap(), 2);
    assert_eq!(storage.count_records().unwrap(), 1);
}

#[tokio::test]
async fn test_foreign_start_urls_are_skipped() {
    let server = MockServer::start().await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&server, &db_path(&dir), None);
    config.start_urls = vec![StartUrl {
        url: "https://www.example.com/shopping/women/items.aspx".to_string(),
    }];

    let outcome = Coordinator::new(config, "hash", true)
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(outcome, RunOutcome::Completed);

    let storage = open_storage(&dir);
    assert_eq!(storage.pending_count().unwrap(), 0);
    assert_eq!(storage.count_records().unwrap(), 0);
}
