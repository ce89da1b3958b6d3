pub mod dataset_client;
pub mod frame_source;
