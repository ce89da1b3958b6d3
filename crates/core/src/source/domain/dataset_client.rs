use std::time::SystemTime;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("dataset request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("dataset listing was malformed: {0}")]
    Malformed(String),
    #[error("authentication rejected for organization {organization_id}")]
    Unauthorized { organization_id: String },
}

/// Credentials and selector for the remote dataset service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatasetCredentials {
    pub api_key: String,
    pub api_key_id: String,
    pub organization_id: String,
    pub dataset_id: String,
}

impl DatasetCredentials {
    /// Two credential sets select the same image collection when the
    /// organization and dataset match; key rotation alone does not
    /// invalidate an already-fetched cache.
    pub fn same_dataset(&self, other: &DatasetCredentials) -> bool {
        self.organization_id == other.organization_id && self.dataset_id == other.dataset_id
    }
}

/// One encoded image fetched from a dataset, kept in memory for cyclic
/// replay. Decoding happens lazily at serve time.
#[derive(Clone, Debug)]
pub struct DatasetImage {
    pub data: Vec<u8>,
    pub timestamp: SystemTime,
    pub filename: String,
}

/// Remote dataset service boundary.
///
/// Given credentials and a dataset identifier, returns an ordered
/// collection of encoded images with timestamps. The transport and wire
/// format live behind this trait; the replay core only sees bytes.
pub trait DatasetClient: Send {
    /// Fetches up to `limit` images from the dataset, in service order.
    /// Entries without a binary payload are skipped by implementations,
    /// so every returned image has non-empty data.
    fn fetch_images(
        &self,
        credentials: &DatasetCredentials,
        limit: usize,
    ) -> Result<Vec<DatasetImage>, DatasetError>;
}
