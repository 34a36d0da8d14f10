//! Records and eligibility rules for a research company's staff, laboratories,
//! projects, equipment and career progressions, kept in SQLite.

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod graph;
pub mod models;
pub mod service;
pub mod store;
pub mod telemetry;

pub use db::Database;
pub use engine::EligibilityEngine;
pub use error::{QueryError, ServiceError, StoreError};
pub use graph::Organization;
pub use service::OrgService;
pub use store::{RecordStore, TenureFilter};
