//! Centralized configuration for Sectional.
//!
//! All tunable parameters for the hydrator and its HTTP transport live here
//! instead of being scattered through the codebase as literals.

use std::str::FromStr;
use std::time::Duration;

/// Central configuration for the hydration service.
///
/// Supports environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct HydratorConfig {
    /// Section rendering settings
    pub section: SectionConfig,
    /// HTTP transport settings
    pub network: NetworkConfig,
}

/// How the hydrator treats a call whose section already has a call in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlapPolicy {
    /// Let overlapping calls race; the last swap to complete wins.
    #[default]
    Allow,
    /// Fail the newer call with `SectionBusy` while the older one runs.
    RejectSameSection,
}

impl FromStr for OverlapPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "allow" => Ok(OverlapPolicy::Allow),
            "reject" | "reject-same-section" => Ok(OverlapPolicy::RejectSameSection),
            _ => Err(format!("Invalid overlap policy: {s}")),
        }
    }
}

/// Section rendering endpoint configuration.
#[derive(Debug, Clone)]
pub struct SectionConfig {
    /// Query parameter naming the section to render
    pub param_name: String,
    /// Behavior for concurrent calls on the same section
    pub overlap: OverlapPolicy,
}

impl Default for SectionConfig {
    fn default() -> Self {
        Self {
            param_name: "section_id".to_string(),
            overlap: OverlapPolicy::Allow,
        }
    }
}

/// HTTP communication configuration.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Upper bound for one section request (None = wait forever)
    pub request_timeout: Option<Duration>,
    /// TCP connect timeout for the HTTP client
    pub connect_timeout: Duration,
    /// User agent for section requests
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            request_timeout: None,
            connect_timeout: Duration::from_secs(10),
            user_agent: format!("sectional/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HydratorConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Unparseable values are ignored and the default is kept.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(param) = std::env::var("SECTIONAL_SECTION_PARAM")
            && !param.is_empty()
        {
            config.section.param_name = param;
        }

        if let Ok(policy) = std::env::var("SECTIONAL_OVERLAP")
            && let Ok(policy) = policy.parse::<OverlapPolicy>()
        {
            config.section.overlap = policy;
        }

        if let Ok(timeout) = std::env::var("SECTIONAL_REQUEST_TIMEOUT")
            && let Ok(seconds) = timeout.parse::<u64>()
        {
            // Zero disables the timeout
            config.network.request_timeout = (seconds > 0).then(|| Duration::from_secs(seconds));
        }

        if let Ok(timeout) = std::env::var("SECTIONAL_CONNECT_TIMEOUT")
            && let Ok(seconds) = timeout.parse::<u64>()
        {
            config.network.connect_timeout = Duration::from_secs(seconds);
        }

        if let Ok(user_agent) = std::env::var("SECTIONAL_USER_AGENT")
            && !user_agent.is_empty()
        {
            config.network.user_agent = user_agent;
        }

        config
    }

    /// Creates a configuration for tests: bounded requests, strict overlap.
    pub fn for_testing() -> Self {
        Self {
            section: SectionConfig {
                overlap: OverlapPolicy::RejectSameSection,
                ..Default::default()
            },
            network: NetworkConfig {
                request_timeout: Some(Duration::from_secs(5)),
                connect_timeout: Duration::from_secs(1),
                ..Default::default()
            },
        }
    }
}
