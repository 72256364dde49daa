use serde::Deserialize;

/// Main configuration structure for SpiderFrog
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Fixed politeness delay between dequeues (milliseconds)
    #[serde(rename = "politeness-delay-ms", default = "default_politeness_delay")]
    pub politeness_delay_ms: u64,

    /// Maximum number of pages recorded per session, 0 for no limit
    #[serde(rename = "max-pages", default)]
    pub max_pages: usize,

    /// Timeout applied to every outbound request (milliseconds)
    #[serde(rename = "request-timeout-ms", default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Format: CrawlerName/Version (+ContactURL; ContactEmail)
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Fetch strategy chain configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Proxy URL templates tried in order; `{url}` is replaced by the
    /// percent-encoded target, or the target is appended when absent
    #[serde(rename = "proxy-templates", default = "default_proxy_templates")]
    pub proxy_templates: Vec<String>,

    /// Number of full passes over the proxy templates
    #[serde(rename = "proxy-attempts", default = "default_proxy_attempts")]
    pub proxy_attempts: u32,

    /// Base of the exponential backoff between proxy passes (milliseconds)
    #[serde(rename = "proxy-backoff-ms", default = "default_proxy_backoff")]
    pub proxy_backoff_ms: u64,

    /// Server delegation endpoint returning a fully analyzed page record
    #[serde(rename = "server-endpoint", default)]
    pub server_endpoint: Option<String>,

    /// Headless render endpoint returning the rendered document
    #[serde(rename = "render-endpoint", default)]
    pub render_endpoint: Option<String>,

    /// Lower bound of the randomized post-network-idle settle delay
    #[serde(rename = "settle-delay-min-ms", default = "default_settle_min")]
    pub settle_delay_min_ms: u64,

    /// Upper bound of the randomized post-network-idle settle delay
    #[serde(rename = "settle-delay-max-ms", default = "default_settle_max")]
    pub settle_delay_max_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            proxy_templates: default_proxy_templates(),
            proxy_attempts: default_proxy_attempts(),
            proxy_backoff_ms: default_proxy_backoff(),
            server_endpoint: None,
            render_endpoint: None,
            settle_delay_min_ms: default_settle_min(),
            settle_delay_max_ms: default_settle_max(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database holding the persisted session
    #[serde(rename = "database-path")]
    pub database_path: String,
}

fn default_politeness_delay() -> u64 {
    1000
}

fn default_request_timeout() -> u64 {
    10_000
}

fn default_proxy_templates() -> Vec<String> {
    vec![
        "https://api.allorigins.win/raw?url={url}".to_string(),
        "https://corsproxy.io/?{url}".to_string(),
        "https://api.codetabs.com/v1/proxy?quest={url}".to_string(),
    ]
}

fn default_proxy_attempts() -> u32 {
    3
}

fn default_proxy_backoff() -> u64 {
    1000
}

fn default_settle_min() -> u64 {
    2000
}

fn default_settle_max() -> u64 {
    5000
}
