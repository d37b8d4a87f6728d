use apn_service::ProgressBar;
use std::sync::{mpsc, Mutex};

use crate::UiMessage;

/// Progress bar living on the UI thread, fed from a worker through the
/// message channel.
pub struct ChannelProgressBar {
    tx: Mutex<mpsc::Sender<UiMessage>>,
}

impl ChannelProgressBar {
    pub fn new(tx: mpsc::Sender<UiMessage>) -> Self {
        Self { tx: Mutex::new(tx) }
    }

    fn send(&self, msg: UiMessage) {
        if let Ok(tx) = self.tx.lock() {
            let _ = tx.send(msg);
        }
    }
}

impl ProgressBar for ChannelProgressBar {
    fn set_fraction(&self, fraction: f64) {
        self.send(UiMessage::SetProgress(fraction as f32));
    }

    fn set_text(&self, text: &str) {
        self.send(UiMessage::SetProgressText(text.to_string()));
    }
}
