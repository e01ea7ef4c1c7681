pub mod aggregate;
pub mod analytics;
pub mod config;
pub mod dedup;
pub mod document;
pub mod error;
pub mod identity;
pub mod ingest;
pub mod ledger;
pub mod logging;
pub mod normalize;
pub mod participants;
pub mod store;
