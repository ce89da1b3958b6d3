use std::time::{Duration, SystemTime};

use serde::Deserialize;

use crate::source::domain::dataset_client::{
    DatasetClient, DatasetCredentials, DatasetError, DatasetImage,
};

const DEFAULT_BASE_URL: &str = "https://app.viam.com/api/v1";

const HEADER_KEY: &str = "key";
const HEADER_KEY_ID: &str = "key-id";

/// Dataset client talking to the remote data service over HTTPS.
///
/// Two round-trip shapes: one listing request returning item metadata
/// (filename, capture time, binary URL), then one GET per item for the
/// encoded image bytes. Items without a binary URL are skipped with a
/// warning; they never reach the replay cycle.
pub struct HttpDatasetClient {
    base_url: String,
    http: reqwest::blocking::Client,
}

impl HttpDatasetClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::blocking::Client::new(),
        }
    }

    fn list_items(
        &self,
        credentials: &DatasetCredentials,
        limit: usize,
    ) -> Result<Vec<ListingItem>, DatasetError> {
        let url = format!(
            "{}/organizations/{}/datasets/{}/items",
            self.base_url, credentials.organization_id, credentials.dataset_id
        );

        let response = self
            .http
            .get(&url)
            .query(&[("limit", limit.to_string())])
            .header(HEADER_KEY_ID, &credentials.api_key_id)
            .header(HEADER_KEY, &credentials.api_key)
            .send()?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED
            || response.status() == reqwest::StatusCode::FORBIDDEN
        {
            return Err(DatasetError::Unauthorized {
                organization_id: credentials.organization_id.clone(),
            });
        }

        let listing: Listing = response
            .error_for_status()?
            .json()
            .map_err(|e| DatasetError::Malformed(e.to_string()))?;
        Ok(listing.items)
    }

    fn download(&self, credentials: &DatasetCredentials, url: &str) -> Result<Vec<u8>, DatasetError> {
        let response = self
            .http
            .get(url)
            .header(HEADER_KEY_ID, &credentials.api_key_id)
            .header(HEADER_KEY, &credentials.api_key)
            .send()?
            .error_for_status()?;
        Ok(response.bytes()?.to_vec())
    }
}

impl Default for HttpDatasetClient {
    fn default() -> Self {
        Self::new()
    }
}

impl DatasetClient for HttpDatasetClient {
    fn fetch_images(
        &self,
        credentials: &DatasetCredentials,
        limit: usize,
    ) -> Result<Vec<DatasetImage>, DatasetError> {
        let items = self.list_items(credentials, limit)?;
        log::info!(
            "dataset {} listing returned {} items",
            credentials.dataset_id,
            items.len()
        );

        let mut images = Vec::with_capacity(items.len());
        for (i, item) in items.into_iter().enumerate() {
            let Some(url) = item.data_url.as_deref().filter(|u| !u.is_empty()) else {
                log::warn!("skipping dataset item {i} with no binary payload");
                continue;
            };
            let data = self.download(credentials, url)?;
            images.push(DatasetImage {
                data,
                timestamp: item.capture_time(),
                filename: item.filename_or_default(i),
            });
        }
        Ok(images)
    }
}

#[derive(Deserialize)]
struct Listing {
    #[serde(default)]
    items: Vec<ListingItem>,
}

#[derive(Deserialize)]
struct ListingItem {
    #[serde(default)]
    file_name: Option<String>,
    /// Capture time as unix seconds.
    #[serde(default)]
    time_requested: Option<u64>,
    #[serde(default)]
    data_url: Option<String>,
}

impl ListingItem {
    fn capture_time(&self) -> SystemTime {
        match self.time_requested {
            Some(secs) => SystemTime::UNIX_EPOCH + Duration::from_secs(secs),
            None => SystemTime::now(),
        }
    }

    fn filename_or_default(&self, index: usize) -> String {
        match self.file_name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("dataset_image_{index}.jpg"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_items(json: &str) -> Vec<ListingItem> {
        let listing: Listing = serde_json::from_str(json).unwrap();
        listing.items
    }

    #[test]
    fn test_listing_parses_full_item() {
        let items = parse_items(
            r#"{"items": [{"file_name": "a.jpg", "time_requested": 1700000000, "data_url": "https://x/a"}]}"#,
        );
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].filename_or_default(0), "a.jpg");
        assert_eq!(
            items[0].capture_time(),
            SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)
        );
    }

    #[test]
    fn test_listing_tolerates_missing_fields() {
        let items = parse_items(r#"{"items": [{}]}"#);
        assert_eq!(items.len(), 1);
        assert!(items[0].data_url.is_none());
        assert_eq!(items[0].filename_or_default(7), "dataset_image_7.jpg");
    }

    #[test]
    fn test_empty_filename_falls_back_to_generated() {
        let items = parse_items(r#"{"items": [{"file_name": ""}]}"#);
        assert_eq!(items[0].filename_or_default(3), "dataset_image_3.jpg");
    }

    #[test]
    fn test_missing_items_key_parses_as_empty() {
        let items = parse_items("{}");
        assert!(items.is_empty());
    }

    #[test]
    fn test_capture_time_without_timestamp_is_recent() {
        let items = parse_items(r#"{"items": [{}]}"#);
        let t = items[0].capture_time();
        assert!(t.elapsed().unwrap() < Duration::from_secs(5));
    }
}
