use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u32(profile: &str, key: &str, default: u32) -> u32 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_usize(profile: &str, key: &str, default: usize) -> usize {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    match profiled_env_opt(profile, key) {
        Some(v) => matches!(v.as_str(), "true" | "1"),
        None => default,
    }
}

/// Comma-separated list, trimmed, empties dropped.
fn profiled_env_list(profile: &str, key: &str) -> Vec<String> {
    profiled_env_opt(profile, key)
        .map(|v| split_list(&v))
        .unwrap_or_default()
}

pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub aws: AwsConfig,
    pub optimizer: OptimizerConfig,
    pub catalog: CatalogConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `SPOTMIX_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    /// Malformed numbers fall back to their defaults; an unknown capacity
    /// unit is an error.
    pub fn from_env() -> Result<Self, CoreError> {
        let profile = env_or("SPOTMIX_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Result<Self, CoreError> {
        let p = profile.to_uppercase();
        let p = p.as_str();
        let aws = AwsConfig::from_env_profiled(p);
        let optimizer = OptimizerConfig::from_env_profiled(p, &aws.region)?;
        Ok(Self {
            profile: p.to_string(),
            aws,
            optimizer,
            catalog: CatalogConfig::from_env_profiled(p),
        })
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        self.aws.validate()?;
        self.optimizer.validate()
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        let o = &self.optimizer;
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  aws:        region={}, endpoint={}, max_attempts={}",
            self.aws.region,
            self.aws.endpoint_url.as_deref().unwrap_or("(default)"),
            self.aws.max_attempts
        );
        tracing::info!(
            "  optimizer:  min_group_size={}, top_k={}, concurrency={}, max_in_flight={}",
            o.min_group_size,
            o.top_k.map(|k| k.to_string()).unwrap_or_else(|| "all".into()),
            o.concurrency,
            o.max_in_flight
        );
        tracing::info!(
            "  placement:  min_types={}, target_capacity={} {}, single_az={}, regions={:?}",
            o.placement.min_types,
            o.placement.target_capacity,
            o.placement.capacity_unit,
            o.placement.single_az,
            o.placement.regions
        );
        tracing::info!("  catalog:    families={:?}", self.catalog.family_prefixes);
    }

    /// Return a redacted view safe for reports (no secrets).
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "aws": {
                "region": self.aws.region,
                "endpoint_override": self.aws.endpoint_url.is_some(),
                "static_credentials": self.aws.has_static_credentials(),
            },
            "optimizer": self.optimizer,
            "catalog": self.catalog,
        })
    }
}

// ── AWS ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    pub region: String,
    pub access_key_id: Option<String>,
    #[serde(skip_serializing)]
    pub secret_access_key: Option<String>,
    #[serde(skip_serializing)]
    pub session_token: Option<String>,
    pub endpoint_url: Option<String>,
    /// SDK retry attempts per request (standard retry mode).
    pub max_attempts: u32,
    /// Product description used for spot price history lookups.
    pub product_description: String,
}

impl AwsConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            region: profiled_env_or(p, "AWS_REGION", "us-east-1"),
            access_key_id: profiled_env_opt(p, "AWS_ACCESS_KEY_ID"),
            secret_access_key: profiled_env_opt(p, "AWS_SECRET_ACCESS_KEY"),
            session_token: profiled_env_opt(p, "AWS_SESSION_TOKEN"),
            endpoint_url: profiled_env_opt(p, "AWS_ENDPOINT_URL"),
            max_attempts: profiled_env_u32(p, "AWS_MAX_ATTEMPTS", 3),
            product_description: profiled_env_or(p, "SPOT_PRODUCT_DESCRIPTION", "Linux/UNIX"),
        }
    }

    pub fn has_static_credentials(&self) -> bool {
        self.access_key_id.is_some() && self.secret_access_key.is_some()
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.region.is_empty() {
            return Err(CoreError::InvalidConfig("AWS region must be set".into()));
        }
        if self.max_attempts == 0 {
            return Err(CoreError::InvalidConfig(
                "AWS max attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

// ── Placement ─────────────────────────────────────────────────

/// Unit the placement target capacity is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CapacityUnit {
    #[default]
    Units,
    Vcpu,
    MemoryMib,
}

impl fmt::Display for CapacityUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapacityUnit::Units => write!(f, "units"),
            CapacityUnit::Vcpu => write!(f, "vcpu"),
            CapacityUnit::MemoryMib => write!(f, "memory-mib"),
        }
    }
}

impl FromStr for CapacityUnit {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "units" => Ok(CapacityUnit::Units),
            "vcpu" => Ok(CapacityUnit::Vcpu),
            "memory-mib" => Ok(CapacityUnit::MemoryMib),
            other => Err(CoreError::InvalidConfig(format!(
                "unknown capacity unit '{other}' (expected units, vcpu or memory-mib)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementConfig {
    /// Smallest instance-type list the placement provider accepts.
    pub min_types: usize,
    pub target_capacity: u32,
    pub capacity_unit: CapacityUnit,
    /// Score per availability zone instead of per region.
    pub single_az: bool,
    pub regions: Vec<String>,
}

impl PlacementConfig {
    fn from_env_profiled(p: &str, default_region: &str) -> Result<Self, CoreError> {
        let capacity_unit = match profiled_env_opt(p, "PLACEMENT_CAPACITY_UNIT") {
            Some(v) => v.parse()?,
            None => CapacityUnit::default(),
        };
        let mut regions = profiled_env_list(p, "PLACEMENT_REGIONS");
        if regions.is_empty() {
            regions.push(default_region.to_string());
        }
        Ok(Self {
            min_types: profiled_env_usize(p, "PLACEMENT_MIN_TYPES", 3),
            target_capacity: profiled_env_u32(p, "PLACEMENT_TARGET_CAPACITY", 1),
            capacity_unit,
            single_az: profiled_env_bool(p, "PLACEMENT_SINGLE_AZ", false),
            regions,
        })
    }
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            min_types: 3,
            target_capacity: 1,
            capacity_unit: CapacityUnit::Units,
            single_az: false,
            regions: vec!["us-east-1".to_string()],
        }
    }
}

// ── Optimizer ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    pub min_group_size: usize,
    /// `None` keeps every ranked combination.
    pub top_k: Option<usize>,
    /// Combinations evaluated concurrently.
    pub concurrency: usize,
    /// Signal queries allowed in flight across all workers.
    pub max_in_flight: usize,
    /// Stop after this many combinations have been dispatched.
    pub max_combinations: Option<usize>,
    #[serde(with = "opt_secs")]
    pub time_budget: Option<Duration>,
    pub placement: PlacementConfig,
}

impl OptimizerConfig {
    fn from_env_profiled(p: &str, default_region: &str) -> Result<Self, CoreError> {
        let nonzero = |v: usize| if v == 0 { None } else { Some(v) };
        let time_budget = profiled_env_u64(p, "OPTIMIZER_TIME_BUDGET_SECS", 0);
        Ok(Self {
            min_group_size: profiled_env_usize(p, "OPTIMIZER_MIN_GROUP_SIZE", 3),
            top_k: nonzero(profiled_env_usize(p, "OPTIMIZER_TOP_K", 0)),
            concurrency: profiled_env_usize(p, "OPTIMIZER_CONCURRENCY", 4),
            max_in_flight: profiled_env_usize(p, "OPTIMIZER_MAX_IN_FLIGHT", 8),
            max_combinations: nonzero(profiled_env_usize(p, "OPTIMIZER_MAX_COMBINATIONS", 0)),
            time_budget: (time_budget > 0).then(|| Duration::from_secs(time_budget)),
            placement: PlacementConfig::from_env_profiled(p, default_region)?,
        })
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.concurrency == 0 {
            return Err(CoreError::InvalidConfig(
                "concurrency must be at least 1".into(),
            ));
        }
        if self.max_in_flight == 0 {
            return Err(CoreError::InvalidConfig(
                "max in-flight signal queries must be at least 1".into(),
            ));
        }
        if self.placement.min_types == 0 {
            return Err(CoreError::InvalidConfig(
                "placement provider minimum must be at least 1".into(),
            ));
        }
        if self.placement.target_capacity == 0 {
            return Err(CoreError::InvalidConfig(
                "placement target capacity must be at least 1".into(),
            ));
        }
        if self.top_k == Some(0) {
            return Err(CoreError::InvalidConfig(
                "top-k must be at least 1 (omit it to keep everything)".into(),
            ));
        }
        Ok(())
    }
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            min_group_size: 3,
            top_k: None,
            concurrency: 4,
            max_in_flight: 8,
            max_combinations: None,
            time_budget: None,
            placement: PlacementConfig::default(),
        }
    }
}

mod opt_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match v {
            Some(d) => s.serialize_some(&d.as_secs()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_secs))
    }
}

// ── Catalog ───────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Family prefixes applied when the caller passes none.
    pub family_prefixes: Vec<String>,
}

impl CatalogConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            family_prefixes: profiled_env_list(p, "CATALOG_FAMILY_PREFIXES"),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────
