//! Pure conversions between EC2 API shapes and domain types.

use aws_sdk_ec2::primitives::DateTime;
use aws_sdk_ec2::types::{
    Filter, InstanceTypeInfo, SpotPlacementScore, SpotPrice, TargetCapacityUnitType,
};
use tracing::debug;

use spotmix_core::config::CapacityUnit;
use spotmix_core::{ResourceType, SignalError, SignalSource};
use spotmix_optimizer::{CatalogHints, PlacementScores};

/// Server-side filters for `DescribeInstanceTypes`.
pub fn hint_filters(hints: &CatalogHints) -> Vec<Filter> {
    let mut filters = Vec::new();
    if hints.spot_only {
        filters.push(filter("supported-usage-class", "spot"));
    }
    if let Some(vcpus) = hints.exact_vcpus {
        filters.push(filter("vcpu-info.default-vcpus", &vcpus.to_string()));
    }
    if let Some(mib) = hints.exact_memory_mib {
        filters.push(filter("memory-info.size-in-mib", &mib.to_string()));
    }
    filters
}

pub fn filter(name: &str, value: &str) -> Filter {
    Filter::builder().name(name).values(value).build()
}

pub fn capacity_unit_type(unit: CapacityUnit) -> TargetCapacityUnitType {
    match unit {
        CapacityUnit::Units => TargetCapacityUnitType::Units,
        CapacityUnit::Vcpu => TargetCapacityUnitType::Vcpu,
        CapacityUnit::MemoryMib => TargetCapacityUnitType::MemoryMib,
    }
}

/// Convert one instance type description. Records missing a name, vCPU
/// count or memory size are dropped.
pub fn resource_from_info(info: &InstanceTypeInfo) -> Option<ResourceType> {
    let name = info.instance_type()?.as_str();
    let vcpus = info.v_cpu_info().and_then(|v| v.default_v_cpus());
    let memory = info.memory_info().and_then(|m| m.size_in_mib());

    match (vcpus, memory) {
        (Some(vcpus), Some(mib)) if vcpus > 0 && mib > 0 => {
            ResourceType::new(name, vcpus as u32, mib as u64).ok()
        }
        _ => {
            debug!(instance_type = %name, "Dropping instance type without vCPU or memory info");
            None
        }
    }
}

/// Scope key for a placement score: the region, or `region/az-id` for
/// single-AZ requests.
pub fn score_key(score: &SpotPlacementScore) -> Option<String> {
    let region = score.region()?;
    Some(match score.availability_zone_id() {
        Some(az) if !az.is_empty() => format!("{region}/{az}"),
        _ => region.to_string(),
    })
}

/// Fold placement score entries into a scope-keyed map. Entries without a
/// scope or a score are ignored.
pub fn scores_from_entries(entries: &[SpotPlacementScore], into: &mut PlacementScores) {
    for entry in entries {
        if let (Some(key), Some(score)) = (score_key(entry), entry.score()) {
            into.insert(key, f64::from(score));
        }
    }
}

/// Latest price across the returned history entries. An empty history is
/// `Ok(None)`; an unparseable price string is malformed.
pub fn latest_price(history: &[SpotPrice]) -> Result<Option<f64>, SignalError> {
    let Some(latest) = history
        .iter()
        .filter(|p| p.spot_price().is_some())
        .max_by_key(|p| p.timestamp().map(timestamp_key))
    else {
        return Ok(None);
    };

    let raw = latest.spot_price().unwrap_or_default();
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(Some)
        .ok_or_else(|| SignalError::Malformed {
            signal: SignalSource::Price,
            message: format!("unparseable spot price {raw:?}"),
        })
}

fn timestamp_key(ts: &DateTime) -> (i64, u32) {
    (ts.secs(), ts.subsec_nanos())
}
