//! Command implementations for swim-cli

pub mod upgrade;

pub use upgrade::{upgrade, UpgradeArgs};
