//! # backlogwatch-adapters
//!
//! Backends used by backlogwatch to measure campaign backlogs and to publish
//! the resulting health state.
//!
//! ## Supported Systems
//!
//! - **MySQL / MariaDB** (`mysql` feature) - Aggregates pending campaign
//!   kickoffs and overdue scheduled events from the campaign tables
//! - **Statuspage** (`statuspage` feature) - Lists components and incidents,
//!   creates and updates incidents through the REST API
//!
//! ## Quick Start (Statuspage)
//!
//! ```rust,no_run
//! use backlogwatch_adapters::statuspage::{IncidentScope, StatuspageClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = StatuspageClient::builder()
//!         .api_key("secret")
//!         .page_id("abc123")
//!         .build()?;
//!
//!     let open = client.list_incidents(IncidentScope::Unresolved).await?;
//!     println!("{} unresolved incidents", open.len());
//!     Ok(())
//! }
//! ```

pub mod error;

#[cfg(feature = "mysql")]
pub mod mysql;

#[cfg(feature = "statuspage")]
pub mod statuspage;

pub use error::AdapterError;

// Re-export types for convenience
pub use backlogwatch_types::{Measurement, ResourceCatalog, SubType};
