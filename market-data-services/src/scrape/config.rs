use std::path::PathBuf;
use std::time::Duration;

/// Markets overview pages, tried in order until one renders.
pub const DEFAULT_CANDIDATE_URLS: &[&str] = &[
    "https://www.binance.com/en/markets/overview",
    "https://www.binance.com/en/markets",
];

/// Path fragment shared by every trade/detail link in the listing.
pub const DEFAULT_LINK_PATTERN: &str = "/en/trade/";

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122 Safari/537.36";

/// Scroll sequence used to make a virtualized list render its off-screen rows.
#[derive(Debug, Clone)]
pub struct ScrollPlan {
    pub steps: usize,
    pub step_px: i64,
    pub step_delay: Duration,
    /// Pause after the final scroll-to-top so re-rendered cells settle.
    pub settle_delay: Duration,
}

impl Default for ScrollPlan {
    fn default() -> Self {
        Self {
            steps: 6,
            step_px: 700,
            step_delay: Duration::from_millis(150),
            settle_delay: Duration::from_millis(200),
        }
    }
}

/// Page loading and extraction configuration
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub candidate_urls: Vec<String>,
    pub link_pattern: String,
    /// Minimum number of trade links before a page counts as ready.
    pub ready_threshold: usize,
    pub navigation_timeout: Duration,
    pub ready_timeout: Duration,
    pub ready_poll_interval: Duration,
    pub scroll: ScrollPlan,
    pub user_agent: String,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            candidate_urls: DEFAULT_CANDIDATE_URLS.iter().map(|u| u.to_string()).collect(),
            link_pattern: DEFAULT_LINK_PATTERN.to_string(),
            ready_threshold: 6,
            navigation_timeout: Duration::from_secs(45),
            ready_timeout: Duration::from_secs(20),
            ready_poll_interval: Duration::from_millis(250),
            scroll: ScrollPlan::default(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ScrapeConfig {
    /// CSS selector matching every trade/detail anchor.
    pub fn link_selector(&self) -> String {
        format!("a[href*=\"{}\"]", self.link_pattern.replace('"', "\\\""))
    }
}

/// Browser launch configuration
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Explicit executable path; checked before any known install location.
    pub executable_override: Option<PathBuf>,
    pub window_width: u32,
    pub window_height: u32,
    pub launch_timeout: Duration,
    /// Per-CDP-request timeout.
    pub request_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            executable_override: None,
            window_width: 1366,
            window_height: 900,
            launch_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(60),
        }
    }
}
