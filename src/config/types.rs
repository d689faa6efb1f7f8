use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Main configuration structure for Tousu-Crawler
///
/// Every section has defaults, so an empty file is a valid configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub request: RequestConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Crawl loop behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CrawlerConfig {
    /// First page to request; set this to resume an earlier run
    pub start_page: u32,

    /// Hard cap on the last page to request
    pub page_limit: Option<u32>,

    /// Fetch attempts per page before the page is skipped
    pub max_retries_per_page: u32,

    /// Backoff between attempts on the same page
    pub retry_backoff: DelayRangeConfig,

    /// Pacing between consecutive pages
    pub inter_page_delay: DelayRangeConfig,

    /// Bodies shorter than this are treated as block pages
    pub min_valid_response_bytes: usize,

    /// Page count used when the listing does not reveal its own
    pub fallback_total_pages: u32,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            start_page: 1,
            page_limit: None,
            max_retries_per_page: 3,
            retry_backoff: DelayRangeConfig::secs(5.0, 10.0),
            inter_page_delay: DelayRangeConfig::secs(2.0, 4.0),
            min_valid_response_bytes: 500,
            fallback_total_pages: 715,
        }
    }
}

/// A randomized delay window, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DelayRangeConfig {
    pub min_secs: f64,
    pub max_secs: f64,
}

impl DelayRangeConfig {
    pub fn secs(min_secs: f64, max_secs: f64) -> Self {
        Self { min_secs, max_secs }
    }

    /// Lower bound as a `Duration`; only meaningful after validation
    pub fn min(&self) -> Duration {
        Duration::from_secs_f64(self.min_secs)
    }

    /// Upper bound as a `Duration`; only meaningful after validation
    pub fn max(&self) -> Duration {
        Duration::from_secs_f64(self.max_secs)
    }
}

/// HTTP request profile used for every page fetch
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RequestConfig {
    /// List page URL including its fixed filter query; the page number is
    /// substituted into the `page` query parameter
    pub list_url: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// User-Agent header value
    pub user_agent: String,

    /// Session cookie copied from a browser; empty means no cookie is sent
    pub cookie: String,

    /// Additional request headers
    pub headers: BTreeMap<String, String>,
}

impl RequestConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        let headers = [
            ("accept", "application/json, text/javascript, */*; q=0.01"),
            (
                "accept-language",
                "zh-CN,zh;q=0.9,en;q=0.8,en-GB;q=0.7,en-US;q=0.6",
            ),
            (
                "sec-ch-ua",
                "\"Chromium\";v=\"142\", \"Microsoft Edge\";v=\"142\", \"Not_A Brand\";v=\"99\"",
            ),
            ("sec-ch-ua-mobile", "?0"),
            ("sec-ch-ua-platform", "\"Windows\""),
            ("sec-fetch-dest", "empty"),
            ("sec-fetch-mode", "cors"),
            ("sec-fetch-site", "same-origin"),
            ("x-requested-with", "XMLHttpRequest"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            list_url: "https://www.aqsiqauto.com/qichetousu.html?car_brand_id=0&car_series_id=0&page=1&complaint_number=&complaint_status=3%2C4%2C5%2C7".to_string(),
            timeout_secs: 15,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/142.0.0.0 Safari/537.36 Edg/142.0.0.0".to_string(),
            cookie: String::new(),
            headers,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct OutputConfig {
    /// Path to the complaint CSV file
    pub csv_path: String,

    /// Optional CSV file listing pages that were skipped after exhausting retries
    pub skipped_pages_path: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            csv_path: "complaints.csv".to_string(),
            skipped_pages_path: None,
        }
    }
}
