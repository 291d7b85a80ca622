//! Travel Advisor Destination Store
//!
//! Retrieval layer for a travel-advisor agent:
//! - Loads a destination catalog from CSV
//! - Embeds and persists it in a local vector store (seeded once, idempotent)
//! - Verifies the store and reports statistics
//! - Answers semantic, by-name and criteria searches through agent tools
//! - Wraps service startup so the store is seeded before the service runs
//!
//! FLOW:
//! CSV → EMBED → STORE → VERIFY → SEARCH → TOOLS / API

pub mod api;
pub mod catalog;
pub mod config;
pub mod embedding;
pub mod error;
pub mod models;
pub mod search;
pub mod seed;
pub mod startup;
pub mod store;
pub mod telemetry;
pub mod tools;
pub mod verify;

pub use error::{AdvisorError, Result};

// Re-export common types
pub use models::*;
pub use search::DestinationSearch;
