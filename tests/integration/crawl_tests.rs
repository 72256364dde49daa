//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end, including proxy, server-delegation and
//! headless-render escalation.

use serde_json::json;
use spiderfrog::config::{Config, CrawlerConfig, FetchConfig, OutputConfig, UserAgentConfig};
use spiderfrog::crawler::Coordinator;
use spiderfrog::state::{FetchSource, IssueCode, PageRecord};
use spiderfrog::storage::{RunStatus, Storage};
use spiderfrog::LinkKind;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration with escalation disabled
fn create_test_config(db_path: &str) -> Config {
    Config {
        crawler: CrawlerConfig {
            politeness_delay_ms: 0,
            max_pages: 0,
            request_timeout_ms: 2000,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        fetch: FetchConfig {
            proxy_templates: Vec::new(),
            proxy_attempts: 0,
            proxy_backoff_ms: 1,
            server_endpoint: None,
            render_endpoint: None,
            settle_delay_min_ms: 0,
            settle_delay_max_ms: 0,
        },
        output: OutputConfig {
            database_path: db_path.to_string(),
        },
    }
}

fn db_path(dir: &TempDir) -> String {
    dir.path().join("crawl.db").to_string_lossy().into_owned()
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/html")
}

async fn mount_page(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html(body))
        .mount(server)
        .await;
}

fn has_issue(record: &PageRecord, code: IssueCode) -> bool {
    record.issues.iter().any(|issue| issue.code == code)
}

#[tokio::test]
async fn test_full_crawl_single_domain() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(
        &mock_server,
        "/",
        r#"<html lang="en"><head><title>Home</title></head><body>
            <h1>Home</h1>
            <a href="/page1">Page 1</a>
            <a href="/page2#section">Page 2</a>
            <a href="https://external.example.org/">Elsewhere</a>
            </body></html>"#,
    )
    .await;
    mount_page(
        &mock_server,
        "/page1",
        r#"<html><head><title>Page 1</title></head><body>
            <a href="/">Home</a><a href="/page2">Page 2</a>
            </body></html>"#,
    )
    .await;
    mount_page(
        &mock_server,
        "/page2",
        "<html><head><title>Page 2</title></head><body><p>Leaf</p></body></html>",
    )
    .await;

    let temp_dir = TempDir::new().unwrap();
    let config = create_test_config(&db_path(&temp_dir));
    let mut coordinator = Coordinator::new(config, "test-hash").unwrap();
    coordinator.start(&base_url).unwrap();

    let report = coordinator.run().await.unwrap();
    assert_eq!(report.pages_processed, 3);
    assert_eq!(report.pages_failed, 0);
    assert_eq!(report.frontier_remaining, 0);

    let session = coordinator.session();
    assert!(!session.is_running());
    assert_eq!(session.pages().len(), 3);
    assert!(session.pages().values().all(|page| page.status == 200));
    assert!(session
        .pages()
        .values()
        .all(|page| page.source == FetchSource::Direct));

    let home = session.page(&format!("{}/", base_url)).unwrap();
    assert_eq!(home.details.title, "Home");
    assert_eq!(home.links.len(), 3);
    assert_eq!(home.links[1].url, format!("{}/page2", base_url));
    assert_eq!(home.links[2].kind, LinkKind::External);
    assert!(session.page("https://external.example.org/").is_none());

    let run = coordinator.storage().get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.pages_recorded, 3);
}

#[tokio::test]
async fn test_blocked_page_escalates_to_proxy() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let target = format!("{}/blocked", base_url);

    Mock::given(method("GET"))
        .and(path("/blocked"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/proxy"))
        .and(query_param("url", target.as_str()))
        .respond_with(html(
            "<html><head><title>Unblocked via proxy</title></head><body><h1>Hi</h1></body></html>",
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let mut config = create_test_config(&db_path(&temp_dir));
    config.fetch.proxy_templates = vec![format!("{}/proxy?url={{url}}", base_url)];
    config.fetch.proxy_attempts = 2;

    let mut coordinator = Coordinator::new(config, "test-hash").unwrap();
    coordinator.start(&target).unwrap();
    coordinator.run().await.unwrap();

    let page = coordinator.session().page(&target).unwrap();
    assert_eq!(page.status, 200);
    assert_eq!(page.source, FetchSource::Proxy);
    assert_eq!(page.details.title, "Unblocked via proxy");
    assert!(!has_issue(page, IssueCode::HttpError));
}

#[tokio::test]
async fn test_blocked_page_delegates_to_server() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let target = format!("{}/guarded", base_url);

    Mock::given(method("GET"))
        .and(path("/guarded"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/crawl"))
        .and(body_partial_json(json!({ "url": target })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "url": target,
            "status": 200,
            "contentType": "text/html",
            "details": { "title": "Delegated page", "h1": "Delegated" },
            "links": [{ "url": "/next", "type": "external" }],
            "issues": [{ "severity": "error", "code": "NOT-A-CODE", "message": "x" }]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;
    mount_page(
        &mock_server,
        "/next",
        "<html><head><title>Next</title></head><body></body></html>",
    )
    .await;

    let temp_dir = TempDir::new().unwrap();
    let mut config = create_test_config(&db_path(&temp_dir));
    config.fetch.server_endpoint = Some(format!("{}/api/crawl", base_url));

    let mut coordinator = Coordinator::new(config, "test-hash").unwrap();
    coordinator.start(&target).unwrap();
    let report = coordinator.run().await.unwrap();
    assert_eq!(report.pages_processed, 2);

    let session = coordinator.session();
    let page = session.page(&target).unwrap();
    assert_eq!(page.source, FetchSource::Server);
    assert_eq!(page.details.title, "Delegated page");
    assert_eq!(page.links[0].kind, LinkKind::Internal);
    assert!(has_issue(page, IssueCode::TitleShort));
    assert!(page.issues.iter().all(|issue| issue.code.as_str() != "NOT-A-CODE"));

    let next = session.page(&format!("{}/next", base_url)).unwrap();
    assert_eq!(next.source, FetchSource::Direct);
}

#[tokio::test]
async fn test_challenge_page_is_rendered_headless() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let target = format!("{}/challenge", base_url);

    mount_page(
        &mock_server,
        "/challenge",
        "<html><head><title>Just a moment...</title></head><body>Checking your browser</body></html>",
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/api/render"))
        .and(body_partial_json(json!({ "url": target, "waitUntil": "networkidle2" })))
        .respond_with(html(
            "<html><head><title>Rendered content</title></head><body><h1>Real</h1></body></html>",
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let mut config = create_test_config(&db_path(&temp_dir));
    config.fetch.render_endpoint = Some(format!("{}/api/render", base_url));

    let mut coordinator = Coordinator::new(config, "test-hash").unwrap();
    coordinator.start(&target).unwrap();
    coordinator.run().await.unwrap();

    let page = coordinator.session().page(&target).unwrap();
    assert_eq!(page.status, 200);
    assert_eq!(page.source, FetchSource::Headless);
    assert_eq!(page.details.title, "Rendered content");
    assert!(!has_issue(page, IssueCode::BotBlock));
}

#[tokio::test]
async fn test_challenge_kept_when_render_fails() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let target = format!("{}/challenge", base_url);

    mount_page(
        &mock_server,
        "/challenge",
        "<html><head><title>Just a moment...</title></head><body>Checking your browser</body></html>",
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/api/render"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let mut config = create_test_config(&db_path(&temp_dir));
    config.fetch.render_endpoint = Some(format!("{}/api/render", base_url));

    let mut coordinator = Coordinator::new(config, "test-hash").unwrap();
    coordinator.start(&target).unwrap();
    coordinator.run().await.unwrap();

    let page = coordinator.session().page(&target).unwrap();
    assert_eq!(page.status, 200);
    assert_eq!(page.source, FetchSource::Direct);
    assert!(has_issue(page, IssueCode::BotBlock));
}

#[tokio::test]
async fn test_challenge_delegates_to_server_without_renderer() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let target = format!("{}/challenge", base_url);

    mount_page(
        &mock_server,
        "/challenge",
        "<html><head><title>Just a moment...</title></head><body>Verify you are human</body></html>",
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/api/crawl"))
        .and(body_partial_json(json!({ "url": target })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "url": target,
            "status": 200,
            "contentType": "text/html",
            "details": { "title": "Past the challenge" }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let mut config = create_test_config(&db_path(&temp_dir));
    config.fetch.server_endpoint = Some(format!("{}/api/crawl", base_url));

    let mut coordinator = Coordinator::new(config, "test-hash").unwrap();
    coordinator.start(&target).unwrap();
    coordinator.run().await.unwrap();

    let page = coordinator.session().page(&target).unwrap();
    assert_eq!(page.source, FetchSource::Server);
    assert_eq!(page.details.title, "Past the challenge");
    assert!(!has_issue(page, IssueCode::BotBlock));
}

#[tokio::test]
async fn test_unreachable_page_records_crawl_failure() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    // Same host, closed port: in scope but nothing answers
    mount_page(
        &mock_server,
        "/",
        r#"<html><body><a href="http://127.0.0.1:1/dead">Dead</a></body></html>"#,
    )
    .await;

    let temp_dir = TempDir::new().unwrap();
    let config = create_test_config(&db_path(&temp_dir));
    let mut coordinator = Coordinator::new(config, "test-hash").unwrap();
    coordinator.start(&base_url).unwrap();

    let report = coordinator.run().await.unwrap();
    assert_eq!(report.pages_processed, 2);
    assert_eq!(report.pages_failed, 1);

    let dead = coordinator.session().page("http://127.0.0.1:1/dead").unwrap();
    assert_eq!(dead.status, 0);
    assert_eq!(dead.source, FetchSource::None);
    assert_eq!(dead.issues.len(), 1);
    assert_eq!(dead.issues[0].code, IssueCode::CrawlFail);
    assert!(dead.details.title.is_empty());
}

#[tokio::test]
async fn test_redirect_target_is_discovered() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
        .mount(&mock_server)
        .await;
    mount_page(
        &mock_server,
        "/new",
        "<html><head><title>New home</title></head><body></body></html>",
    )
    .await;

    let temp_dir = TempDir::new().unwrap();
    let config = create_test_config(&db_path(&temp_dir));
    let mut coordinator = Coordinator::new(config, "test-hash").unwrap();
    coordinator.start(&format!("{}/old", base_url)).unwrap();
    coordinator.run().await.unwrap();

    let session = coordinator.session();
    let old = session.page(&format!("{}/old", base_url)).unwrap();
    assert_eq!(old.status, 301);
    assert!(has_issue(old, IssueCode::HttpRedirect));

    let new = session.page(&format!("{}/new", base_url)).unwrap();
    assert_eq!(new.status, 200);
}

#[tokio::test]
async fn test_resume_after_page_cap() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(
        &mock_server,
        "/",
        r#"<html><body><a href="/a">A</a><a href="/b">B</a></body></html>"#,
    )
    .await;
    mount_page(&mock_server, "/a", "<html><head><title>Same</title></head></html>").await;
    mount_page(&mock_server, "/b", "<html><head><title>Same</title></head></html>").await;

    let temp_dir = TempDir::new().unwrap();
    let path = db_path(&temp_dir);

    // First run stops at the page cap
    {
        let mut config = create_test_config(&path);
        config.crawler.max_pages = 1;
        let mut coordinator = Coordinator::new(config, "test-hash").unwrap();
        coordinator.start(&base_url).unwrap();

        let report = coordinator.run().await.unwrap();
        assert_eq!(report.pages_processed, 1);
        assert_eq!(report.frontier_remaining, 2);

        let run = coordinator.storage().get_latest_run().unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Interrupted);
    }

    // A new process picks up the persisted frontier
    let config = create_test_config(&path);
    let mut coordinator = Coordinator::new(config, "test-hash").unwrap();
    assert!(!coordinator.session().is_running());
    assert_eq!(coordinator.session().pages().len(), 1);
    assert_eq!(coordinator.session().frontier().len(), 2);

    assert!(coordinator.resume().unwrap());
    let report = coordinator.run().await.unwrap();
    assert_eq!(report.pages_processed, 2);

    let session = coordinator.session();
    assert_eq!(session.pages().len(), 3);
    let duplicates = session
        .pages()
        .values()
        .filter(|page| has_issue(page, IssueCode::TitleDuplicate))
        .count();
    assert_eq!(duplicates, 2);

    let reloaded = coordinator.storage().load_session().unwrap();
    assert!(!reloaded.is_running());
    assert_eq!(reloaded.pages().len(), 3);
    assert!(reloaded.frontier().is_empty());
}

#[tokio::test]
async fn test_resume_with_nothing_pending() {
    let temp_dir = TempDir::new().unwrap();
    let config = create_test_config(&db_path(&temp_dir));
    let mut coordinator = Coordinator::new(config, "test-hash").unwrap();

    assert!(!coordinator.resume().unwrap());
    let report = coordinator.run().await.unwrap();
    assert_eq!(report.pages_processed, 0);
}
