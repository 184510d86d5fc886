use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};

use spotmix_core::config::{CatalogConfig, OptimizerConfig};
use spotmix_core::{CandidateFilter, ResourceConstraint, AMD_A_SERIES_FAMILIES};

/// Find spot instance-type combinations with the best placement scores.
#[derive(Parser, Debug)]
#[command(name = "spotmix", version, about)]
pub struct Cli {
    /// Configuration profile; `{PROFILE}_{KEY}` env vars take precedence.
    #[arg(long, env = "SPOTMIX_PROFILE", global = true)]
    pub profile: Option<String>,

    /// AWS region override.
    #[arg(long, global = true)]
    pub region: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Rank instance-type combinations by placement score and price.
    Optimize(OptimizeArgs),
    /// List per-zone spot offerings matching a shape across regions.
    Offerings(OfferingsArgs),
}

/// Instance shape: exact with `--vcpus/--memory-gib`, or a floor with
/// `--min-vcpus/--min-memory-gib`.
#[derive(Args, Debug, Clone)]
pub struct ShapeArgs {
    #[arg(long, requires = "memory_gib", conflicts_with_all = ["min_vcpus", "min_memory_gib"])]
    pub vcpus: Option<u32>,

    #[arg(long, requires = "vcpus")]
    pub memory_gib: Option<f64>,

    #[arg(long, requires = "min_memory_gib")]
    pub min_vcpus: Option<u32>,

    #[arg(long, requires = "min_vcpus")]
    pub min_memory_gib: Option<f64>,
}

impl ShapeArgs {
    pub fn constraint(&self) -> Result<ResourceConstraint> {
        let constraint = match (self.vcpus, self.memory_gib, self.min_vcpus, self.min_memory_gib) {
            (Some(vcpus), Some(memory_gib), None, None) => {
                ResourceConstraint::Exact { vcpus, memory_gib }
            }
            (None, None, Some(min_vcpus), Some(min_memory_gib)) => ResourceConstraint::Threshold {
                min_vcpus,
                min_memory_gib,
            },
            _ => bail!("specify either --vcpus and --memory-gib, or --min-vcpus and --min-memory-gib"),
        };
        constraint.validate()?;
        Ok(constraint)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct OptimizeArgs {
    #[command(flatten)]
    pub shape: ShapeArgs,

    /// Instance-type name prefixes to keep, comma separated (e.g. m5a,r5a).
    #[arg(long, value_delimiter = ',')]
    pub families: Vec<String>,

    /// Restrict to AMD A-series families.
    #[arg(long)]
    pub amd_only: bool,

    /// Smallest combination size.
    #[arg(long)]
    pub min_size: Option<usize>,

    /// Keep only the best K combinations (0 keeps all).
    #[arg(long)]
    pub top_k: Option<usize>,

    /// Combinations evaluated concurrently.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Signal queries in flight across all workers.
    #[arg(long)]
    pub max_in_flight: Option<usize>,

    /// Stop after evaluating this many combinations (0 is unbounded).
    #[arg(long)]
    pub max_combinations: Option<usize>,

    /// Stop after this many seconds, keeping partial results (0 is unbounded).
    #[arg(long)]
    pub time_budget_secs: Option<u64>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    pub format: OutputFormat,

    /// Report path (default: spot_instance_scores.<format>).
    #[arg(long)]
    pub output: Option<PathBuf>,
}

impl OptimizeArgs {
    /// Candidate filter from the shape and family flags. Without family
    /// flags the configured catalog prefixes apply.
    pub fn filter(&self, catalog: &CatalogConfig) -> Result<CandidateFilter> {
        let mut families: Vec<String> = self.families.clone();
        if self.amd_only {
            families.extend(AMD_A_SERIES_FAMILIES.iter().map(|f| f.to_string()));
        }
        if families.is_empty() {
            families = catalog.family_prefixes.clone();
        }
        families.sort();
        families.dedup();
        Ok(CandidateFilter::new(self.shape.constraint()?).with_families(families))
    }

    /// Layer command-line overrides on top of the env configuration.
    pub fn apply(&self, config: &mut OptimizerConfig) {
        if let Some(min_size) = self.min_size {
            config.min_group_size = min_size.max(1);
        }
        if let Some(top_k) = self.top_k {
            config.top_k = (top_k > 0).then_some(top_k);
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(max_in_flight) = self.max_in_flight {
            config.max_in_flight = max_in_flight;
        }
        if let Some(max) = self.max_combinations {
            config.max_combinations = (max > 0).then_some(max);
        }
        if let Some(secs) = self.time_budget_secs {
            config.time_budget = (secs > 0).then(|| std::time::Duration::from_secs(secs));
        }
    }

    pub fn output_path(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            PathBuf::from(format!("spot_instance_scores.{}", self.format.extension()))
        })
    }
}

#[derive(Args, Debug, Clone)]
pub struct OfferingsArgs {
    #[command(flatten)]
    pub shape: ShapeArgs,

    /// Regions to scan, comma separated (default: every opted-in region).
    #[arg(long, value_delimiter = ',')]
    pub regions: Vec<String>,

    /// Regions scanned concurrently.
    #[arg(long, default_value_t = 4)]
    pub concurrency: usize,

    #[arg(long, default_value = "available_spot_instances.csv")]
    pub output: PathBuf,
}
