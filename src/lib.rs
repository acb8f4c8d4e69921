pub mod aggregate;
pub mod commands;
pub mod config;
pub mod descriptor;
pub mod ingest;
pub mod investigate;
pub mod record;
pub mod report;
