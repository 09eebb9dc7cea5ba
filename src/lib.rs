//! envsync: encrypted, versioned environment variables synced across
//! devices and teams.
//!
//! # Architecture
//!
//! - **`core`**: crypto primitives, the local state store, the vault model,
//!   RBAC, the audit log, and doctor diagnostics (C1-C3, C6-C7, C10)
//! - **`remote`**: the pluggable remote transport (file/HTTP/cloud) and
//!   cloud session store (C4)
//! - **`sync`**: the three-way push/pull/diff reconciliation engine (C5)
//! - **`server`**: the self-hosted HTTP remote (C9), used by the
//!   `envsync-server` binary
//! - **`cloud`**: the cloud control plane (C8), used by the `envsync-cloud`
//!   binary
//! - **`cli`**: command-line argument grammar and dispatch
//!
//! # Example
//!
//! ```no_run
//! use envsync::core::vault::Vault;
//!
//! let mut vault = Vault::open()?;
//! let value = vault.get("DATABASE_URL")?;
//! # Ok::<(), envsync::error::Error>(())
//! ```

pub mod cli;
pub mod cloud;
pub mod core;
pub mod error;
pub mod remote;
pub mod server;
pub mod sync;
