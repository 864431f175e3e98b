pub mod api;
pub mod ingestion;
pub mod models;
pub mod notify;
pub mod reminder;
pub mod schedule;
pub mod sources;
pub mod storage;
