//! APT backend for apt-notifier.
//!
//! Reads the package cache through libapt (`rust-apt`) to find upgradable
//! packages. Refresh and commit run `apt-get` behind an escalation helper,
//! turning its status records into [`apn_core::ProgressEvent`]s, or go
//! through libapt directly when no helper is needed.

pub mod backend;
pub mod cache;
pub mod command;
pub mod progress;
pub mod status;

pub use backend::{AptBackend, AptConfig};
