pub mod data;
pub mod progress;
pub mod runtime;
pub mod types;

pub use data::{checked_label, rows_to_ui, set_row_upgrading};
pub use progress::ChannelProgressBar;
pub use runtime::async_call;
pub use types::UiMessage;
