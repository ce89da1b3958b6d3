pub mod dataset_source;
pub mod file_source;
pub mod http_dataset_client;
