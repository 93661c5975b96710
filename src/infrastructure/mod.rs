pub mod processing_client;

pub use processing_client::{ProcessingClient, UploadEvent, UploadStream};
