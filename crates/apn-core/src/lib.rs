//! Core types and traits for apt-notifier.
//!
//! This crate provides the foundational abstractions shared by the APT
//! backend, the service layer and the dialog.

pub mod error;
pub mod operation;
pub mod package;
pub mod source;

pub use error::{Error, Result};
pub use operation::{Operation, OperationKind, OperationResult, OperationStatus, ProgressEvent};
pub use package::{UpgradeCandidate, Version};
pub use source::{PackageSource, ProgressCallback};
