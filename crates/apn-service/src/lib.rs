//! Update orchestration for apt-notifier.

pub mod manager;
pub mod progress;
pub mod state;

pub use manager::UpdateManager;
pub use progress::{ProgressAdapter, ProgressBar};
pub use state::{PackageList, PackageRow, ViewState};
