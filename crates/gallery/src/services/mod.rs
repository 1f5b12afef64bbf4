pub mod ingest;
pub mod retrieve;
