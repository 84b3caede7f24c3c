use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::ServiceError;
use crate::kernel::geo::BoundingBox;
use crate::kernel::poi::Poi;
use crate::services::PoiLookup;

const DEFAULT_BASE_URL: &str = "http://localhost:8070";

/// Read-only POI directory: `GET /pois?south=..&west=..&north=..&east=..` -> `[Poi]`.
#[derive(Clone)]
pub struct HttpPoiLookup {
    client: Client,
    base_url: String,
}

impl HttpPoiLookup {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Reads `POI_BASE_URL`.
    pub fn from_env(timeout: Duration) -> Self {
        let base_url = std::env::var("POI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::new(base_url, timeout)
    }
}

#[async_trait]
impl PoiLookup for HttpPoiLookup {
    async fn lookup(&self, area: &BoundingBox) -> Result<Vec<Poi>, ServiceError> {
        let response = self
            .client
            .get(format!("{}/pois", self.base_url))
            .query(&[
                ("south", area.south),
                ("west", area.west),
                ("north", area.north),
                ("east", area.east),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ServiceError::Status {
                service: "poi-lookup",
                status: response.status().as_u16(),
            });
        }
        Ok(response.json().await?)
    }
}
