pub mod app;
pub mod ingest;
pub mod layout;
pub mod tracking;
pub mod transcript;
