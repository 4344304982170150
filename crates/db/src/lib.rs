pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use connection::{begin_write, connect, connect_in_memory, connect_with_settings, DbPool};
pub use fixtures::{DemoSeedDataset, LeadSeedInfo, SeedResult, VerificationResult};
