//! Cache Configuration Module
//!
//! Settings for the cache store connection, entry TTL, timeouts, background
//! jobs and warming. Loaded from environment variables with defaults that
//! match a production deployment.

use std::str::FromStr;
use std::time::Duration;

use catalogue_core::ProductQuery;
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CACHE_HEALTH_NAME, DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_ENTRY_TTL_SECS,
    DEFAULT_HEALTH_TIMEOUT_MS, DEFAULT_IO_TIMEOUT_MS, DEFAULT_METRICS_INTERVAL_SECS,
    DEFAULT_REDIS_URL, DEFAULT_SERVICE_TIMEOUT_MS, DEFAULT_WARM_PRODUCT_SAMPLE,
    DEFAULT_WRITE_BACK_TIMEOUT_MS,
};
use crate::error::ConfigError;
use crate::keys::TagOrdering;

const ENV_PREFIX: &str = "CATALOGUE_CACHE_";

// ============================================================================
// CACHE SETTINGS
// ============================================================================

/// Runtime settings for the caching layer.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSettings {
    /// Cache store address.
    pub redis_url: String,

    /// TTL applied to every entry kind.
    pub entry_ttl: Duration,

    /// Bound on establishing the store connection.
    pub connect_timeout: Duration,

    /// Bound on each interactive store command.
    pub io_timeout: Duration,

    /// Bound on a background write-back, independent of the request.
    pub write_back_timeout: Duration,

    /// Bound on the store ping during health checks.
    pub health_ping_timeout: Duration,

    /// Bound on each call to the authoritative service.
    pub service_timeout: Duration,

    /// Interval between periodic metric snapshots in the log.
    pub metrics_log_interval: Duration,

    /// Whether to warm the cache once at startup.
    pub warm_on_startup: bool,

    /// Interval for periodic re-warming. `None` disables it.
    pub warming_interval: Option<Duration>,

    /// Tag arrangement used for list and count keys.
    pub tag_ordering: TagOrdering,

    /// Service name of the cache entry in health reports.
    pub health_service_name: String,

    /// Append a metrics entry to health reports.
    pub report_metrics_health: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            redis_url: DEFAULT_REDIS_URL.to_string(),
            entry_ttl: Duration::from_secs(DEFAULT_ENTRY_TTL_SECS),
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            io_timeout: Duration::from_millis(DEFAULT_IO_TIMEOUT_MS),
            write_back_timeout: Duration::from_millis(DEFAULT_WRITE_BACK_TIMEOUT_MS),
            health_ping_timeout: Duration::from_millis(DEFAULT_HEALTH_TIMEOUT_MS),
            service_timeout: Duration::from_millis(DEFAULT_SERVICE_TIMEOUT_MS),
            metrics_log_interval: Duration::from_secs(DEFAULT_METRICS_INTERVAL_SECS),
            warm_on_startup: true,
            warming_interval: None,
            tag_ordering: TagOrdering::Preserve,
            health_service_name: DEFAULT_CACHE_HEALTH_NAME.to_string(),
            report_metrics_health: false,
        }
    }
}

impl CacheSettings {
    /// Create settings with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from environment variables, falling back to the default
    /// for anything missing or unparsable.
    ///
    /// # Environment Variables
    /// - `CATALOGUE_CACHE_REDIS_URL`: Store address (default: redis://redis:6379)
    /// - `CATALOGUE_CACHE_TTL_SECS`: Entry TTL (default: 1800)
    /// - `CATALOGUE_CACHE_CONNECT_TIMEOUT_MS`: Connect timeout (default: 5000)
    /// - `CATALOGUE_CACHE_IO_TIMEOUT_MS`: Read/write timeout (default: 3000)
    /// - `CATALOGUE_CACHE_WRITE_BACK_TIMEOUT_MS`: Background write bound (default: 5000)
    /// - `CATALOGUE_CACHE_HEALTH_TIMEOUT_MS`: Health ping bound (default: 3000)
    /// - `CATALOGUE_CACHE_SERVICE_TIMEOUT_MS`: Authoritative call bound (default: 10000)
    /// - `CATALOGUE_CACHE_METRICS_INTERVAL_SECS`: Metrics log interval (default: 300)
    /// - `CATALOGUE_CACHE_WARM_ON_STARTUP`: "true" or "false" (default: true)
    /// - `CATALOGUE_CACHE_WARM_INTERVAL_SECS`: Re-warm interval, 0 disables (default: disabled)
    /// - `CATALOGUE_CACHE_TAG_ORDERING`: "preserve" or "sorted" (default: preserve)
    /// - `CATALOGUE_CACHE_HEALTH_NAME`: Cache entry name in health reports
    /// - `CATALOGUE_CACHE_REPORT_METRICS_HEALTH`: "true" or "false" (default: false)
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`CacheSettings::from_env`], but reports the first invalid value
    /// instead of ignoring it.
    pub fn try_from_env() -> Result<Self, ConfigError> {
        Self::try_from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable source, ignoring invalid values.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();
        let _ = settings.apply(&lookup, false);
        settings
    }

    /// Load from an arbitrary variable source, failing on invalid values.
    pub fn try_from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();
        settings.apply(&lookup, true)?;
        Ok(settings)
    }

    fn apply<F>(&mut self, lookup: &F, strict: bool) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup, strict };

        if let Some(url) = env.string("REDIS_URL") {
            self.redis_url = url;
        }
        if let Some(secs) = env.parse::<u64>("TTL_SECS")? {
            self.entry_ttl = Duration::from_secs(secs);
        }
        if let Some(ms) = env.parse::<u64>("CONNECT_TIMEOUT_MS")? {
            self.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = env.parse::<u64>("IO_TIMEOUT_MS")? {
            self.io_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = env.parse::<u64>("WRITE_BACK_TIMEOUT_MS")? {
            self.write_back_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = env.parse::<u64>("HEALTH_TIMEOUT_MS")? {
            self.health_ping_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = env.parse::<u64>("SERVICE_TIMEOUT_MS")? {
            self.service_timeout = Duration::from_millis(ms);
        }
        if let Some(secs) = env.parse::<u64>("METRICS_INTERVAL_SECS")? {
            self.metrics_log_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(enabled) = env.parse::<bool>("WARM_ON_STARTUP")? {
            self.warm_on_startup = enabled;
        }
        if let Some(secs) = env.parse::<u64>("WARM_INTERVAL_SECS")? {
            self.warming_interval = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(ordering) = env.parse::<TagOrdering>("TAG_ORDERING")? {
            self.tag_ordering = ordering;
        }
        if let Some(name) = env.string("HEALTH_NAME") {
            self.health_service_name = name;
        }
        if let Some(enabled) = env.parse::<bool>("REPORT_METRICS_HEALTH")? {
            self.report_metrics_health = enabled;
        }
        Ok(())
    }

    /// Set the store address.
    pub fn with_redis_url(mut self, url: impl Into<String>) -> Self {
        self.redis_url = url.into();
        self
    }

    /// Set the entry TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.entry_ttl = ttl;
        self
    }

    /// Set the interactive I/O timeout.
    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Set the background write-back bound.
    pub fn with_write_back_timeout(mut self, timeout: Duration) -> Self {
        self.write_back_timeout = timeout;
        self
    }

    /// Set the health ping bound.
    pub fn with_health_ping_timeout(mut self, timeout: Duration) -> Self {
        self.health_ping_timeout = timeout;
        self
    }

    /// Set the authoritative call bound.
    pub fn with_service_timeout(mut self, timeout: Duration) -> Self {
        self.service_timeout = timeout;
        self
    }

    /// Set the metrics log interval.
    pub fn with_metrics_interval(mut self, interval: Duration) -> Self {
        self.metrics_log_interval = interval;
        self
    }

    /// Enable or disable startup warming.
    pub fn with_warm_on_startup(mut self, enabled: bool) -> Self {
        self.warm_on_startup = enabled;
        self
    }

    /// Set (or clear) the periodic warming interval.
    pub fn with_warming_interval(mut self, interval: Option<Duration>) -> Self {
        self.warming_interval = interval;
        self
    }

    /// Set the tag arrangement for keys.
    pub fn with_tag_ordering(mut self, ordering: TagOrdering) -> Self {
        self.tag_ordering = ordering;
        self
    }

    /// Enable or disable the metrics health entry.
    pub fn with_metrics_health(mut self, enabled: bool) -> Self {
        self.report_metrics_health = enabled;
        self
    }
}

struct EnvReader<'a, F> {
    lookup: &'a F,
    strict: bool,
}

impl<F> EnvReader<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn raw(&self, suffix: &str) -> Option<(String, String)> {
        let name = format!("{}{}", ENV_PREFIX, suffix);
        let value = (self.lookup)(&name)?;
        let value = value.trim().to_string();
        (!value.is_empty()).then_some((name, value))
    }

    fn string(&self, suffix: &str) -> Option<String> {
        self.raw(suffix).map(|(_, value)| value)
    }

    fn parse<T>(&self, suffix: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let Some((name, value)) = self.raw(suffix) else {
            return Ok(None);
        };
        match value.to_ascii_lowercase().parse::<T>() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(e) if self.strict => Err(ConfigError::InvalidValue {
                field: name,
                value,
                reason: e.to_string(),
            }),
            Err(e) => {
                tracing::warn!(variable = %name, value = %value, error = %e, "Ignoring invalid cache setting");
                Ok(None)
            }
        }
    }
}

// ============================================================================
// WARMING PLAN
// ============================================================================

/// The queries the warmer pre-populates.
///
/// Kept as data so deployments can decide which listings count as popular
/// without touching the warming logic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarmingPlan {
    /// Listings warmed together with their matching counts.
    pub listings: Vec<ProductQuery>,

    /// How many products from the first unfiltered page are warmed
    /// individually.
    #[serde(default = "default_product_sample")]
    pub product_sample_size: u32,
}

fn default_product_sample() -> u32 {
    DEFAULT_WARM_PRODUCT_SAMPLE
}

impl Default for WarmingPlan {
    fn default() -> Self {
        Self {
            listings: vec![
                ProductQuery::all(1, 6),
                ProductQuery::all(1, 12),
                ProductQuery::all(1, 6).with_order("price"),
                ProductQuery::all(1, 6).with_order("name"),
                ProductQuery::all(1, 6).with_tags(["brown"]),
                ProductQuery::all(1, 6).with_tags(["blue"]),
                ProductQuery::all(1, 6).with_tags(["geek"]),
            ],
            product_sample_size: DEFAULT_WARM_PRODUCT_SAMPLE,
        }
    }
}

impl WarmingPlan {
    /// An empty plan: no listings, no individual products.
    pub fn empty() -> Self {
        Self {
            listings: Vec::new(),
            product_sample_size: 0,
        }
    }

    /// Parse a plan from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let plan: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::InvalidPlan(e.to_string()))?;
        plan.validate()?;
        Ok(plan)
    }

    /// Load from `CATALOGUE_CACHE_WARM_PLAN` (JSON), or the default plan if unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var(format!("{}WARM_PLAN", ENV_PREFIX)) {
            Ok(json) if !json.trim().is_empty() => Self::from_json(&json),
            _ => Ok(Self::default()),
        }
    }

    /// Reject pages that could never be served.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for query in &self.listings {
            if query.page_num == 0 || query.page_size == 0 {
                return Err(ConfigError::InvalidPlan(format!(
                    "page number and size must be positive: {:?}",
                    query
                )));
            }
        }
        Ok(())
    }

    /// Set the listings.
    pub fn with_listings(mut self, listings: Vec<ProductQuery>) -> Self {
        self.listings = listings;
        self
    }

    /// Set the individual product sample size.
    pub fn with_product_sample(mut self, size: u32) -> Self {
        self.product_sample_size = size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = CacheSettings::default();
        assert_eq!(settings.entry_ttl, Duration::from_secs(1800));
        assert_eq!(settings.connect_timeout, Duration::from_secs(5));
        assert_eq!(settings.io_timeout, Duration::from_secs(3));
        assert_eq!(settings.write_back_timeout, Duration::from_secs(5));
        assert_eq!(settings.health_ping_timeout, Duration::from_secs(3));
        assert_eq!(settings.metrics_log_interval, Duration::from_secs(300));
        assert!(settings.warm_on_startup);
        assert_eq!(settings.warming_interval, None);
        assert_eq!(settings.tag_ordering, TagOrdering::Preserve);
        assert_eq!(settings.health_service_name, "catalogue-redis");
    }

    #[test]
    fn test_from_lookup_reads_prefixed_vars() {
        let settings = CacheSettings::from_lookup(lookup(&[
            ("CATALOGUE_CACHE_REDIS_URL", "redis://cache:6380"),
            ("CATALOGUE_CACHE_TTL_SECS", "60"),
            ("CATALOGUE_CACHE_WARM_INTERVAL_SECS", "900"),
            ("CATALOGUE_CACHE_TAG_ORDERING", "sorted"),
            ("CATALOGUE_CACHE_WARM_ON_STARTUP", "FALSE"),
        ]));
        assert_eq!(settings.redis_url, "redis://cache:6380");
        assert_eq!(settings.entry_ttl, Duration::from_secs(60));
        assert_eq!(settings.warming_interval, Some(Duration::from_secs(900)));
        assert_eq!(settings.tag_ordering, TagOrdering::Sorted);
        assert!(!settings.warm_on_startup);
    }

    #[test]
    fn test_zero_warm_interval_disables() {
        let settings =
            CacheSettings::from_lookup(lookup(&[("CATALOGUE_CACHE_WARM_INTERVAL_SECS", "0")]));
        assert_eq!(settings.warming_interval, None);
    }

    #[test]
    fn test_lenient_lookup_ignores_garbage() {
        let settings = CacheSettings::from_lookup(lookup(&[("CATALOGUE_CACHE_TTL_SECS", "soon")]));
        assert_eq!(settings.entry_ttl, Duration::from_secs(1800));
    }

    #[test]
    fn test_strict_lookup_reports_garbage() {
        let err = CacheSettings::try_from_lookup(lookup(&[("CATALOGUE_CACHE_TTL_SECS", "soon")]))
            .unwrap_err();
        match err {
            ConfigError::InvalidValue { field, value, .. } => {
                assert_eq!(field, "CATALOGUE_CACHE_TTL_SECS");
                assert_eq!(value, "soon");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_builder() {
        let settings = CacheSettings::new()
            .with_ttl(Duration::from_secs(60))
            .with_io_timeout(Duration::from_millis(100))
            .with_warming_interval(Some(Duration::from_secs(600)))
            .with_tag_ordering(TagOrdering::Sorted)
            .with_metrics_health(true);
        assert_eq!(settings.entry_ttl, Duration::from_secs(60));
        assert_eq!(settings.io_timeout, Duration::from_millis(100));
        assert_eq!(settings.warming_interval, Some(Duration::from_secs(600)));
        assert!(settings.report_metrics_health);
    }

    #[test]
    fn test_default_plan_lists_popular_queries() {
        let plan = WarmingPlan::default();
        assert_eq!(plan.listings.len(), 7);
        assert_eq!(plan.listings[0], ProductQuery::all(1, 6));
        assert_eq!(plan.listings[1], ProductQuery::all(1, 12));
        assert!(plan.listings.iter().any(|q| q.order == "price"));
        assert!(plan.listings.iter().any(|q| q.tags == vec!["geek".to_string()]));
        assert_eq!(plan.product_sample_size, 10);
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn test_plan_from_json() {
        let plan = WarmingPlan::from_json(
            r#"{"listings":[{"tags":["blue"],"order":"price","page_num":1,"page_size":9}]}"#,
        )
        .unwrap();
        assert_eq!(plan.listings.len(), 1);
        assert_eq!(plan.listings[0].page_size, 9);
        assert_eq!(plan.product_sample_size, 10);
    }

    #[test]
    fn test_plan_rejects_zero_page() {
        let err =
            WarmingPlan::from_json(r#"{"listings":[{"page_num":0,"page_size":6}]}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPlan(_)));
        assert!(WarmingPlan::from_json("not json").is_err());
    }
}
