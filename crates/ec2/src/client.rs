//! AWS EC2-backed catalog, placement and price signals.
//!
//! [`Ec2Signals`] wraps one SDK client and implements every collaborator
//! trait the optimizer consumes, so a single instance can be shared by the
//! catalog loader and all aggregation workers.

use std::time::SystemTime;

use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::BehaviorVersion;
use aws_sdk_ec2::config::{Credentials, Region};
use aws_sdk_ec2::primitives::DateTime;
use aws_sdk_ec2::types::InstanceType;
use aws_sdk_ec2::Client;
use aws_types::SdkConfig;
use tracing::{debug, info, warn};

use spotmix_core::config::AwsConfig;
use spotmix_core::{SignalError, SignalSource};
use spotmix_optimizer::{
    CatalogHints, CatalogPage, PlacementQuery, PlacementScores, PlacementSignal, PriceSignal,
    ResourceCatalog,
};

use crate::convert;
use crate::error::{classify, Ec2Error};

/// `DescribeInstanceTypes` page size.
pub const CATALOG_PAGE_SIZE: i32 = 100;

/// Placement score responses are paged; 10 is the API minimum.
const PLACEMENT_PAGE_SIZE: i32 = 10;

/// EC2 client serving as resource catalog, placement signal and price signal.
#[derive(Clone)]
pub struct Ec2Signals {
    client: Client,
    sdk_config: SdkConfig,
    region: String,
    product_description: String,
}

impl Ec2Signals {
    /// Create a new client from project config.
    ///
    /// Static credentials are used when both key id and secret are set;
    /// otherwise the default provider chain applies.
    pub async fn new(aws: &AwsConfig) -> Result<Self, Ec2Error> {
        aws.validate()?;

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(aws.region.clone()))
            .retry_config(RetryConfig::standard().with_max_attempts(aws.max_attempts));

        if let (Some(key_id), Some(secret)) = (&aws.access_key_id, &aws.secret_access_key) {
            let creds = Credentials::new(
                key_id,
                secret,
                aws.session_token.clone(),
                None,
                "spotmix-static",
            );
            loader = loader.credentials_provider(creds);
        }

        if let Some(ref endpoint) = aws.endpoint_url {
            if !endpoint.is_empty() {
                let url = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
                    endpoint.clone()
                } else {
                    format!("https://{endpoint}")
                };
                loader = loader.endpoint_url(url);
            }
        }

        let sdk_config = loader.load().await;
        let client = Client::new(&sdk_config);

        info!(
            region = %aws.region,
            max_attempts = aws.max_attempts,
            static_credentials = aws.has_static_credentials(),
            "EC2 signals initialised"
        );

        Ok(Self {
            client,
            sdk_config,
            region: aws.region.clone(),
            product_description: aws.product_description.clone(),
        })
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Same credentials and retry settings, pointed at another region.
    pub fn for_region(&self, region: &str) -> Self {
        let conf = aws_sdk_ec2::config::Builder::from(&self.sdk_config)
            .region(Region::new(region.to_string()))
            .build();
        Self {
            client: Client::from_conf(conf),
            sdk_config: self.sdk_config.clone(),
            region: region.to_string(),
            product_description: self.product_description.clone(),
        }
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl ResourceCatalog for Ec2Signals {
    async fn list_page(
        &self,
        hints: &CatalogHints,
        next_token: Option<String>,
    ) -> Result<CatalogPage, SignalError> {
        let resp = self
            .client
            .describe_instance_types()
            .set_filters(Some(convert::hint_filters(hints)))
            .max_results(CATALOG_PAGE_SIZE)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| classify(SignalSource::Catalog, &e))?;

        let items: Vec<_> = resp
            .instance_types()
            .iter()
            .filter_map(convert::resource_from_info)
            .collect();

        debug!(
            region = %self.region,
            returned = resp.instance_types().len(),
            kept = items.len(),
            "Catalog page fetched"
        );

        Ok(CatalogPage {
            items,
            next_token: resp.next_token().filter(|t| !t.is_empty()).map(str::to_string),
        })
    }
}

#[async_trait]
impl PlacementSignal for Ec2Signals {
    async fn placement_scores(
        &self,
        query: &PlacementQuery,
    ) -> Result<PlacementScores, SignalError> {
        let mut scores = PlacementScores::new();
        let mut next_token: Option<String> = None;

        loop {
            let mut req = self
                .client
                .get_spot_placement_scores()
                .target_capacity(query.target_capacity as i32)
                .target_capacity_unit_type(convert::capacity_unit_type(query.capacity_unit))
                .single_availability_zone(query.single_az)
                .max_results(PLACEMENT_PAGE_SIZE)
                .set_next_token(next_token.take());
            for name in &query.instance_types {
                req = req.instance_types(name);
            }
            for region in &query.regions {
                req = req.region_names(region);
            }

            let resp = req
                .send()
                .await
                .map_err(|e| classify(SignalSource::Placement, &e))?;

            convert::scores_from_entries(resp.spot_placement_scores(), &mut scores);

            match resp.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }

        debug!(
            types = query.instance_types.len(),
            scopes = scores.len(),
            "Placement scores fetched"
        );
        Ok(scores)
    }
}

#[async_trait]
impl PriceSignal for Ec2Signals {
    async fn spot_price(&self, instance_type: &str) -> Result<Option<f64>, SignalError> {
        let resp = self
            .client
            .describe_spot_price_history()
            .instance_types(InstanceType::from(instance_type))
            .product_descriptions(&self.product_description)
            .start_time(DateTime::from(SystemTime::now()))
            .send()
            .await
            .map_err(|e| classify(SignalSource::Price, &e))?;

        let price = convert::latest_price(resp.spot_price_history())?;
        if price.is_none() {
            warn!(
                instance_type,
                product = %self.product_description,
                "No spot price history"
            );
        }
        Ok(price)
    }
}
