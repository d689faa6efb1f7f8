//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers serving complaint
//! list pages and test fetch classification and the full crawl cycle
//! end-to-end.

use std::path::Path;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tousu_crawler::config::{Config, CrawlerConfig, DelayRangeConfig, OutputConfig, RequestConfig};
use tousu_crawler::crawler::{run_crawl, BlockReason, FetchError, HttpFetcher, PageFetcher};
use tousu_crawler::storage::{Record, SkippedPage};
use tousu_crawler::Termination;
use url::Url;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LIST_PATH: &str = "/qichetousu.html";

/// Builds a list page with `rows` complaint rows and the given pager
fn list_page(page: u32, rows: usize, last: Option<u32>, has_next: bool) -> String {
    let rows: String = (0..rows)
        .map(|i| {
            format!(
                r#"<tr>
                <td><div>{page}{i:02}</div><span class="badge">已回复</span></td>
                <td>某品牌</td><td>某车系</td><td>2024款 1.5T</td>
                <td>行驶中发动机异响，多次维修未解决</td>
                <td><div>发动机</div><div>异响</div></td>
                <td>2025-03-{day:02}</td>
                </tr>"#,
                page = page,
                i = i,
                day = i + 1
            )
        })
        .collect();

    let next = if has_next {
        format!(
            r#"<li class="next"><a href="{}?page={}">下一页</a></li>"#,
            LIST_PATH,
            page + 1
        )
    } else {
        r##"<li class="next hidden"><a href="#">下一页</a></li>"##.to_string()
    };
    let last = last
        .map(|n| format!(r#"<li class="last"><a href="{}?page={}">末页</a></li>"#, LIST_PATH, n))
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
        <html><head><meta charset="utf-8"><title>汽车投诉</title></head>
        <body>
        <table class="tslb_b">
        <thead><tr><th>编号</th><th>品牌</th><th>车系</th><th>车型</th><th>简述</th><th>问题</th><th>日期</th></tr></thead>
        <tbody id="tb1">{rows}</tbody>
        </table>
        <ul class="yiiPager">{next}{last}</ul>
        </body></html>"#,
        rows = rows,
        next = next,
        last = last
    )
}

/// Creates a test configuration pointing at the mock server with no delays
fn create_test_config(server: &MockServer, dir: &Path, start_page: u32) -> Config {
    Config {
        crawler: CrawlerConfig {
            start_page,
            page_limit: None,
            max_retries_per_page: 3,
            retry_backoff: DelayRangeConfig::secs(0.0, 0.0),
            inter_page_delay: DelayRangeConfig::secs(0.0, 0.0),
            min_valid_response_bytes: 500,
            fallback_total_pages: 715,
        },
        request: RequestConfig {
            list_url: format!(
                "{}{}?car_brand_id=0&car_series_id=0&page=1&complaint_status=3%2C4%2C5%2C7",
                server.uri(),
                LIST_PATH
            ),
            timeout_secs: 5,
            ..RequestConfig::default()
        },
        output: OutputConfig {
            csv_path: dir.join("complaints.csv").display().to_string(),
            skipped_pages_path: Some(dir.join("skipped.csv").display().to_string()),
        },
    }
}

async fn mount_page(server: &MockServer, page: u32, body: String) {
    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .and(query_param("page", page.to_string()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html; charset=utf-8"),
        )
        .mount(server)
        .await;
}

fn read_records(path: &Path) -> Vec<Record> {
    let mut reader = csv::Reader::from_path(path).expect("Failed to open CSV");
    reader
        .deserialize()
        .collect::<Result<Vec<Record>, _>>()
        .expect("Failed to read records")
}

fn page_url(server: &MockServer, page: u32) -> Url {
    Url::parse(&format!("{}{}?page={}", server.uri(), LIST_PATH, page)).unwrap()
}

#[tokio::test]
async fn test_fetch_success() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, 1, list_page(1, 3, Some(715), true)).await;

    let fetcher = HttpFetcher::from_config(&RequestConfig::default(), 500).unwrap();
    let page = fetcher
        .fetch(&page_url(&mock_server, 1))
        .await
        .expect("Fetch should succeed");

    assert_eq!(page.status, 200);
    assert_eq!(page.encoding, "utf-8");
    assert!(page.body.contains("tb1"));
}

#[tokio::test]
async fn test_fetch_records_declared_charset() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(list_page(1, 2, Some(715), true), "text/html; charset=GBK"),
        )
        .mount(&mock_server)
        .await;

    let fetcher = HttpFetcher::from_config(&RequestConfig::default(), 500).unwrap();
    let page = fetcher.fetch(&page_url(&mock_server, 1)).await.unwrap();

    // Declared charset is reported; the UTF-8 body still decodes intact
    assert_eq!(page.encoding, "gbk");
    assert!(page.body.contains("某品牌"));
}

#[tokio::test]
async fn test_fetch_sends_configured_headers() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .and(header("cookie", "PHPSESSID=abc123"))
        .and(header("x-requested-with", "XMLHttpRequest"))
        .respond_with(ResponseTemplate::new(200).set_body_string(list_page(1, 2, None, false)))
        .mount(&mock_server)
        .await;

    let mut request = RequestConfig::default();
    request.cookie = "PHPSESSID=abc123".to_string();
    let fetcher = HttpFetcher::from_config(&request, 500).unwrap();

    assert!(fetcher.fetch(&page_url(&mock_server, 1)).await.is_ok());
}

#[tokio::test]
async fn test_fetch_undersized_body_is_suspected_block() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, 1, "<html>访问过于频繁</html>".to_string()).await;

    let fetcher = HttpFetcher::from_config(&RequestConfig::default(), 500).unwrap();
    let err = fetcher.fetch(&page_url(&mock_server, 1)).await.unwrap_err();

    assert!(err.is_suspected_block());
    assert!(matches!(
        err,
        FetchError::SuspectedBlock {
            reason: BlockReason::Undersized { threshold: 500, .. }
        }
    ));
}

#[tokio::test]
async fn test_fetch_forbidden_is_suspected_block() {
    let mock_server = MockServer::start().await;
    for status in [403u16, 429] {
        Mock::given(method("GET"))
            .and(path(LIST_PATH))
            .and(query_param("page", status.to_string()))
            .respond_with(ResponseTemplate::new(status))
            .mount(&mock_server)
            .await;
    }

    let fetcher = HttpFetcher::from_config(&RequestConfig::default(), 500).unwrap();
    for status in [403u16, 429] {
        let err = fetcher
            .fetch(&page_url(&mock_server, status as u32))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FetchError::SuspectedBlock {
                reason: BlockReason::Refused { status: s }
            } if s == status
        ));
    }
}

#[tokio::test]
async fn test_fetch_server_error_is_transport() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let fetcher = HttpFetcher::from_config(&RequestConfig::default(), 500).unwrap();
    let err = fetcher.fetch(&page_url(&mock_server, 1)).await.unwrap_err();

    assert!(matches!(err, FetchError::Transport { .. }));
    assert!(err.to_string().contains("HTTP 500"));
}

#[tokio::test]
async fn test_fetch_connection_refused_is_transport() {
    let fetcher = HttpFetcher::from_config(&RequestConfig::default(), 500).unwrap();
    // Nothing listens on port 1
    let url = Url::parse(&format!("http://127.0.0.1:1{}?page=1", LIST_PATH)).unwrap();
    let err = fetcher.fetch(&url).await.unwrap_err();

    assert!(matches!(err, FetchError::Transport { .. }));
}

#[tokio::test]
async fn test_full_crawl_until_no_next_page() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, 1, list_page(1, 3, Some(3), true)).await;
    mount_page(&mock_server, 2, list_page(2, 3, Some(3), true)).await;
    mount_page(&mock_server, 3, list_page(3, 2, Some(3), false)).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server, dir.path(), 1);

    let report = run_crawl(&config, CancellationToken::new())
        .await
        .expect("Crawl failed");

    assert_eq!(report.termination, Some(Termination::NoNextPage));
    assert_eq!(report.pages_crawled, vec![1, 2, 3]);
    assert_eq!(report.records_written, 8);
    assert_eq!(report.total_pages, Some(3));

    let records = read_records(&dir.path().join("complaints.csv"));
    assert_eq!(records.len(), 8);
    assert_eq!(records[0].id, "100");
    assert_eq!(records[3].id, "200");
    assert_eq!(records[7].id, "301");
    assert_eq!(records[0].brand, "某品牌");
    assert_eq!(records[0].primary_issue, "发动机");
    assert_eq!(records[0].issue_subtype, "异响");
    assert_eq!(records[0].date, "2025-03-01");
}

#[tokio::test]
async fn test_full_crawl_stops_at_page_limit() {
    let mock_server = MockServer::start().await;
    for page in 5..=8 {
        mount_page(&mock_server, page, list_page(page, 1, Some(715), true)).await;
    }

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&mock_server, dir.path(), 5);
    config.crawler.page_limit = Some(6);

    let report = run_crawl(&config, CancellationToken::new())
        .await
        .expect("Crawl failed");

    assert_eq!(report.termination, Some(Termination::AtLimit { upper_bound: 6 }));
    assert_eq!(report.pages_crawled, vec![5, 6]);

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    for request in &requests {
        // Fixed filter parameters survive the page substitution
        assert!(request.url.query().unwrap().contains("complaint_status=3%2C4%2C5%2C7"));
    }
}

#[tokio::test]
async fn test_full_crawl_skips_blocked_page() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, 1, list_page(1, 2, Some(3), true)).await;
    mount_page(&mock_server, 2, "blocked".to_string()).await;
    mount_page(&mock_server, 3, list_page(3, 2, Some(3), false)).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server, dir.path(), 1);

    let report = run_crawl(&config, CancellationToken::new())
        .await
        .expect("Crawl failed");

    assert_eq!(report.pages_crawled, vec![1, 3]);
    assert_eq!(report.skipped_page_numbers(), vec![2]);
    assert_eq!(report.failed_attempts, 3);

    let page_two_requests = mock_server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.query_pairs().any(|(k, v)| k == "page" && v == "2"))
        .count();
    assert_eq!(page_two_requests, 3);

    let records = read_records(&dir.path().join("complaints.csv"));
    let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["100", "101", "300", "301"]);

    let mut reader = csv::Reader::from_path(dir.path().join("skipped.csv")).unwrap();
    let skipped: Vec<SkippedPage> = reader.deserialize().map(|r| r.unwrap()).collect();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].page, 2);
}

#[tokio::test]
async fn test_full_crawl_recovers_after_transient_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;
    mount_page(&mock_server, 1, list_page(1, 2, Some(1), false)).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server, dir.path(), 1);

    let report = run_crawl(&config, CancellationToken::new())
        .await
        .expect("Crawl failed");

    assert_eq!(report.pages_crawled, vec![1]);
    assert!(report.pages_skipped.is_empty());
    assert_eq!(report.failed_attempts, 2);
    assert_eq!(report.records_written, 2);
}

#[tokio::test]
async fn test_resumed_crawl_appends_to_existing_file() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, 1, list_page(1, 2, Some(2), true)).await;
    mount_page(&mock_server, 2, list_page(2, 2, Some(2), false)).await;

    let dir = TempDir::new().unwrap();
    let csv_path = dir.path().join("complaints.csv");

    let mut config = create_test_config(&mock_server, dir.path(), 1);
    config.crawler.page_limit = Some(1);
    run_crawl(&config, CancellationToken::new())
        .await
        .expect("First run failed");

    config.crawler.start_page = 2;
    config.crawler.page_limit = None;
    run_crawl(&config, CancellationToken::new())
        .await
        .expect("Second run failed");

    let content = std::fs::read_to_string(&csv_path).unwrap();
    assert_eq!(content.matches("primaryIssue").count(), 1);

    let ids: Vec<String> = read_records(&csv_path).into_iter().map(|r| r.id).collect();
    assert_eq!(ids, vec!["100", "101", "200", "201"]);
}

#[tokio::test]
async fn test_cancelled_crawl_closes_output() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, 1, list_page(1, 2, Some(715), true)).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server, dir.path(), 1);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let report = run_crawl(&config, cancel).await.expect("Crawl failed");

    assert_eq!(report.termination, Some(Termination::Cancelled));
    assert!(mock_server.received_requests().await.unwrap().is_empty());

    // Header is on disk even though no page was fetched
    let content = std::fs::read_to_string(dir.path().join("complaints.csv")).unwrap();
    assert!(content.starts_with("id,brand,series,model,summary,primaryIssue,issueSubtype,date"));
}
