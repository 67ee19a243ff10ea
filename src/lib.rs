//! Ceph Provider - declarative management of Ceph through the Manager dashboard
//!
//! Reconciles cephx principals, RGW users / subusers / keys, pools, CRUSH
//! rules, erasure-code profiles and configuration against a Ceph cluster,
//! using only the Ceph Manager dashboard REST API.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                          Provider Root                              │
//! │   options · endpoint merge · registry · client injection            │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────────┐  ┌──────────────────┐  ┌───────────────────┐  │
//! │  │    Resources     │  │   Data Sources   │  │    Ephemeral      │  │
//! │  │ plan/apply/verify│  │   read-only      │  │   open / close    │  │
//! │  └────────┬─────────┘  └────────┬─────────┘  └─────────┬─────────┘  │
//! │           └─────────────────────┼──────────────────────┘            │
//! │                    ┌────────────┴────────────┐                      │
//! │                    │  Typed Ceph subsystems  │                      │
//! │                    └────────────┬────────────┘                      │
//! ├─────────────────────────────────┼───────────────────────────────────┤
//! │             Dashboard client: login · 401 re-login · tasks          │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`provider`]: provider root, resources, data sources, ephemeral resources
//! - [`domain`]: reconciliation engine, ports, schemas and plan modifiers
//! - [`ceph`]: typed operations per Ceph subsystem
//! - [`client`]: dashboard HTTP client with session and task handling
//! - [`keyring`]: cephx keyring codec
//! - [`context`]: deadlines and cancellation
//! - [`error`]: error types and handling

pub mod ceph;
pub mod client;
pub mod context;
pub mod domain;
pub mod error;
pub mod keyring;
pub mod provider;

// Re-export commonly used types
pub use client::{ApiRequest, CephClient, ClientConfig};

pub use context::OpContext;

pub use domain::{
    DataSource, DataSourceRef, EphemeralResource, EphemeralResourceRef, Nullable, OpenedEphemeral, PlannedChange,
    PrivateState, Resource, ResourceRef, Schema,
};

pub use error::{ConfigError, Error, Result};

pub use keyring::KeyringEntry;

pub use provider::{CephProvider, ClientSlot, ProviderConfig, ProviderSchema, PROVIDER_NAME};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
