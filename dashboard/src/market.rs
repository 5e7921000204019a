use crate::errors::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::debug;

pub const MARKET_PAGE_SIZE: usize = 10;
const DISTRICT_SCAN_LIMIT: usize = 1000;

/// Quick-pick commodity chips offered next to the listing.
pub const POPULAR_COMMODITIES: [&str; 9] = [
    "Tomato",
    "Potato",
    "Onion",
    "Brinjal",
    "Cauliflower",
    "Cabbage",
    "Ginger",
    "Chili",
    "Garlic",
];

/// One mandi price listing, prices per quintal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketRecord {
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub district: String,
    #[serde(default)]
    pub market: String,
    #[serde(default)]
    pub commodity: String,
    #[serde(default)]
    pub variety: String,
    #[serde(default)]
    pub grade: String,
    #[serde(default)]
    pub arrival_date: String,
    #[serde(default, deserialize_with = "lenient_number")]
    pub min_price: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub max_price: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub modal_price: f64,
}

// The resource API sends numbers either as JSON numbers or as strings.
fn lenient_number<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<f64, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64().unwrap_or_default(),
        Value::String(s) => s.trim().parse().unwrap_or_default(),
        _ => 0.0,
    })
}

#[derive(Debug, Deserialize)]
struct ResourceResponse {
    #[serde(default)]
    records: Option<Vec<MarketRecord>>,
    #[serde(default, deserialize_with = "lenient_number")]
    total: f64,
}

/// Listing filters. Empty strings mean "any".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketFilters {
    pub state: String,
    pub district: String,
    pub market: String,
    pub commodity: String,
    pub variety: String,
    pub grade: String,
}

impl MarketFilters {
    /// Changing the state invalidates the district.
    pub fn set_state(&mut self, state: &str) {
        self.state = state.to_string();
        self.district.clear();
    }

    fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        [
            ("filters[state.keyword]", &self.state),
            ("filters[district]", &self.district),
            ("filters[market]", &self.market),
            ("filters[commodity]", &self.commodity),
            ("filters[variety]", &self.variety),
            ("filters[grade]", &self.grade),
        ]
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| (key, value.as_str()))
        .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MarketPage {
    pub records: Vec<MarketRecord>,
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
    pub page: usize,
    pub total_pages: usize,
}

impl MarketPage {
    fn new(records: Vec<MarketRecord>, total: usize, offset: usize) -> Self {
        Self {
            records,
            total,
            offset,
            limit: MARKET_PAGE_SIZE,
            page: offset / MARKET_PAGE_SIZE + 1,
            total_pages: total.div_ceil(MARKET_PAGE_SIZE),
        }
    }
}

/// Client for the commodity price resource.
#[derive(Debug, Clone)]
pub struct MarketClient {
    client: reqwest::Client,
    resource_url: String,
    api_key: String,
}

impl MarketClient {
    pub fn new(client: reqwest::Client, resource_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            resource_url: resource_url.into(),
            api_key: api_key.into(),
        }
    }

    async fn fetch(&self, filters: &[(&str, &str)], limit: usize, offset: usize) -> Result<ResourceResponse> {
        let limit = limit.to_string();
        let offset = offset.to_string();
        let mut params: Vec<(&str, &str)> = vec![
            ("api-key", self.api_key.as_str()),
            ("format", "json"),
            ("limit", limit.as_str()),
            ("offset", offset.as_str()),
        ];
        params.extend_from_slice(filters);

        let response = self
            .client
            .get(&self.resource_url)
            .query(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Status {
                status: response.status().as_u16(),
                url: self.resource_url.clone(),
            });
        }

        Ok(response.json().await?)
    }

    /// One page of listings. No matches is an empty page, not an error.
    pub async fn records(&self, filters: &MarketFilters, offset: usize) -> Result<MarketPage> {
        let body = self
            .fetch(&filters.query_pairs(), MARKET_PAGE_SIZE, offset)
            .await?;
        let records = body.records.unwrap_or_default();
        debug!("Market query returned {} of {} records", records.len(), body.total);
        Ok(MarketPage::new(records, body.total as usize, offset))
    }

    /// Districts with listings in `state`, sorted and unique.
    pub async fn districts(&self, state: &str) -> Result<Vec<String>> {
        if state.is_empty() {
            return Ok(Vec::new());
        }
        let body = self
            .fetch(&[("filters[state.keyword]", state)], DISTRICT_SCAN_LIMIT, 0)
            .await?;
        Ok(unique_districts(body.records.unwrap_or_default()))
    }
}

pub fn unique_districts(records: Vec<MarketRecord>) -> Vec<String> {
    records
        .into_iter()
        .map(|r| r.district)
        .filter(|d| !d.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
