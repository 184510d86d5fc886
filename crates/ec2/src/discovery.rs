//! Region and availability-zone spot offering discovery.
//!
//! Lists every opted-in region, the instance types offered in each zone,
//! and keeps the ones whose shape satisfies a [`CandidateFilter`].

use std::collections::{BTreeMap, BTreeSet};

use aws_sdk_ec2::types::{InstanceType, LocationType};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use spotmix_core::{CandidateFilter, ResourceType, SignalSource};

use crate::client::Ec2Signals;
use crate::convert;
use crate::error::{classify, Ec2Error};

pub const OFFERINGS_PAGE_SIZE: i32 = 200;

/// `DescribeInstanceTypes` accepts at most this many explicit names.
pub const DESCRIBE_BATCH: usize = 100;

/// One instance type offered in one availability zone.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OfferingRow {
    pub instance_type: String,
    pub vcpus: u32,
    pub memory_gib: f64,
    pub region: String,
    pub az: String,
}

/// Zones offering each instance type, keyed by type name.
pub type ZoneOfferings = BTreeMap<String, BTreeSet<String>>;

impl Ec2Signals {
    /// Regions enabled for this account. `not-opted-in` regions are dropped.
    pub async fn opted_in_regions(&self) -> Result<Vec<String>, Ec2Error> {
        let resp = self
            .client()
            .describe_regions()
            .all_regions(true)
            .send()
            .await
            .map_err(|e| Ec2Error::from(classify(SignalSource::Catalog, &e)))?;

        let mut regions: Vec<String> = resp
            .regions()
            .iter()
            .filter(|r| r.opt_in_status() != Some("not-opted-in"))
            .filter_map(|r| r.region_name().map(str::to_string))
            .collect();
        regions.sort();
        Ok(regions)
    }

    /// Instance types offered per availability zone in this client's region.
    pub async fn zone_offerings(&self) -> Result<ZoneOfferings, Ec2Error> {
        let mut offerings = ZoneOfferings::new();
        let mut next_token: Option<String> = None;

        loop {
            let resp = self
                .client()
                .describe_instance_type_offerings()
                .location_type(LocationType::AvailabilityZone)
                .max_results(OFFERINGS_PAGE_SIZE)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| Ec2Error::from(classify(SignalSource::Catalog, &e)))?;

            for offering in resp.instance_type_offerings() {
                if let (Some(ty), Some(zone)) = (offering.instance_type(), offering.location()) {
                    offerings
                        .entry(ty.as_str().to_string())
                        .or_default()
                        .insert(zone.to_string());
                }
            }

            match resp.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }

        debug!(region = %self.region(), types = offerings.len(), "Zone offerings listed");
        Ok(offerings)
    }

    /// Resolve shapes for named types, restricted to spot-capable ones.
    pub async fn describe_types(&self, names: &[String]) -> Result<Vec<ResourceType>, Ec2Error> {
        let mut resolved = Vec::with_capacity(names.len());

        for batch in names.chunks(DESCRIBE_BATCH) {
            let mut next_token: Option<String> = None;
            loop {
                let resp = self
                    .client()
                    .describe_instance_types()
                    .set_instance_types(Some(
                        batch.iter().map(|n| InstanceType::from(n.as_str())).collect(),
                    ))
                    .filters(convert::filter("supported-usage-class", "spot"))
                    .set_next_token(next_token.take())
                    .send()
                    .await
                    .map_err(|e| Ec2Error::from(classify(SignalSource::Catalog, &e)))?;

                resolved.extend(
                    resp.instance_types()
                        .iter()
                        .filter_map(convert::resource_from_info),
                );

                match resp.next_token() {
                    Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                    _ => break,
                }
            }
        }

        Ok(resolved)
    }

    /// Offering rows for this client's region.
    pub async fn region_offerings(
        &self,
        filter: &CandidateFilter,
    ) -> Result<Vec<OfferingRow>, Ec2Error> {
        let offerings = self.zone_offerings().await?;
        let names: Vec<String> = offerings.keys().cloned().collect();
        let types = self.describe_types(&names).await?;
        Ok(offering_rows(self.region(), &offerings, &types, filter))
    }
}

/// Discover matching offerings across `regions`, `concurrency` regions at a
/// time. A region that fails is logged and left out of the result.
pub async fn discover_offerings(
    signals: &Ec2Signals,
    regions: &[String],
    filter: &CandidateFilter,
    concurrency: usize,
) -> Vec<OfferingRow> {
    let per_region: Vec<Vec<OfferingRow>> = stream::iter(regions.iter())
        .map(|region| async move {
            let regional = signals.for_region(region);
            match regional.region_offerings(filter).await {
                Ok(rows) => {
                    info!(region = %region, rows = rows.len(), "Region scanned");
                    rows
                }
                Err(e) => {
                    warn!(region = %region, error = %e, "Skipping region");
                    Vec::new()
                }
            }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut rows: Vec<OfferingRow> = per_region.into_iter().flatten().collect();
    sort_rows(&mut rows);
    rows
}

/// Join zone offerings with resolved shapes and keep rows the filter accepts.
pub fn offering_rows(
    region: &str,
    offerings: &ZoneOfferings,
    types: &[ResourceType],
    filter: &CandidateFilter,
) -> Vec<OfferingRow> {
    let mut rows: Vec<OfferingRow> = types
        .iter()
        .filter(|rt| filter.accepts(rt))
        .flat_map(|rt| {
            offerings
                .get(&rt.name)
                .into_iter()
                .flatten()
                .map(move |zone| OfferingRow {
                    instance_type: rt.name.clone(),
                    vcpus: rt.vcpus,
                    memory_gib: rt.memory_gib(),
                    region: region.to_string(),
                    az: zone.clone(),
                })
        })
        .collect();
    sort_rows(&mut rows);
    rows
}

fn sort_rows(rows: &mut [OfferingRow]) {
    rows.sort_by(|a, b| {
        (&a.region, &a.instance_type, &a.az).cmp(&(&b.region, &b.instance_type, &b.az))
    });
}
