// Ingest pipeline: raw table intake, processing, and storage

pub mod ingestion;
pub mod processing;
pub mod storage;

pub use ingestion::Ingestor;
pub use storage::Storage;
