pub mod db;
pub mod download;
pub mod ingest;
pub mod report;
pub mod schema;
