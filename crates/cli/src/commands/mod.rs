//! Command implementations

pub mod health;
pub mod inventory;
pub mod workloads;
