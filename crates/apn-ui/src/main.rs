//! apt-notifier - lists upgradable packages and upgrades them.

use apn_apt::AptConfig;
use apn_core::Error;
use apn_service::{ProgressBar, UpdateManager};
use slint::{ModelRc, SharedString, Timer, TimerMode, VecModel};
use std::sync::{mpsc, Arc};
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

slint::include_modules!();

mod ui_helpers;
use ui_helpers::{
    async_call, checked_label, rows_to_ui, set_row_upgrading, ChannelProgressBar,
    UiMessage,
};

/// Show the list or the "no packages" label and enable Update to match
fn after_populate(window: &UpdaterDialog, rows: Vec<PackageData>) {
    let has_packages = !rows.is_empty();
    window.set_packages(ModelRc::new(VecModel::from(rows)));
    window.set_has_packages(has_packages);
}

/// Populate the list in the background
fn start_populate(manager: Arc<UpdateManager>, tx: mpsc::Sender<UiMessage>) {
    let _ = tx.send(UiMessage::SetBusy(true));
    let bar: Arc<dyn ProgressBar> = Arc::new(ChannelProgressBar::new(tx.clone()));

    async_call(
        tx,
        async move {
            if !manager.is_available().await {
                warn!("APT package lists not found, is this a Debian-based system?");
            }
            manager.populate_packages(bar).await
        },
        |result, tx| {
            match result {
                Ok(packages) => {
                    let _ = tx.send(UiMessage::SetStatus(checked_label(&packages)));
                    let _ = tx.send(UiMessage::PackagesLoaded(packages));
                }
                Err(e) => {
                    error!("Failed to list upgrades: {}", e);
                    let _ = tx.send(UiMessage::SetProgressText(format!("Error: {}", e)));
                }
            }
            let _ = tx.send(UiMessage::SetBusy(false));
        },
    );
}

/// Upgrade the marked packages in the background, then repopulate
fn start_upgrade(manager: Arc<UpdateManager>, tx: mpsc::Sender<UiMessage>) {
    let _ = tx.send(UiMessage::SetBusy(true));
    let _ = tx.send(UiMessage::SetProgress(0.0));
    let bar: Arc<dyn ProgressBar> = Arc::new(ChannelProgressBar::new(tx.clone()));

    async_call(
        tx,
        async move { manager.upgrade(bar).await },
        |result, tx| {
            match result {
                Ok(report) => {
                    info!("{}", report.summary());
                    let _ = tx.send(UiMessage::SetStatus(format!(
                        "{}. {}",
                        report.summary(),
                        checked_label(&report.packages)
                    )));
                    let _ = tx.send(UiMessage::PackagesLoaded(report.packages));
                }
                Err(e) => {
                    error!("Upgrade failed: {}", e);
                    let _ = tx.send(UiMessage::SetProgressText(format!("Error: {}", e)));
                }
            }
            let _ = tx.send(UiMessage::SetBusy(false));
        },
    );
}

fn main() {
    let verbose = std::env::args()
        .skip(1)
        .any(|arg| arg == "-v" || arg == "--verbose");

    // Initialize logging.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(if verbose { Level::DEBUG } else { Level::INFO })
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");

    info!("Starting apt-notifier");

    let manager = match AptConfig::from_env().and_then(UpdateManager::with_config) {
        Ok(manager) => Arc::new(manager),
        Err(e @ Error::ConfigError(_)) => {
            error!("Check the APT_NOTIFIER_* environment: {}", e);
            std::process::exit(2);
        }
        Err(e) => {
            error!("Failed to initialize APT backend: {}", e);
            std::process::exit(1);
        }
    };

    let window = UpdaterDialog::new().expect("Failed to create window");

    // Channel for UI updates from background threads
    let (tx, rx) = mpsc::channel::<UiMessage>();

    // Timer to poll for UI messages
    let timer = Timer::default();
    let window_weak = window.as_weak();
    timer.start(
        TimerMode::Repeated,
        std::time::Duration::from_millis(50),
        move || {
            if let Some(window) = window_weak.upgrade() {
                while let Ok(msg) = rx.try_recv() {
                    match msg {
                        UiMessage::PackagesLoaded(packages) => {
                            after_populate(&window, rows_to_ui(&packages));
                        }
                        UiMessage::SetBusy(busy) => {
                            window.set_busy(busy);
                        }
                        UiMessage::SetStatus(status) => {
                            window.set_status_message(SharedString::from(&status));
                        }
                        UiMessage::SetProgress(value) => {
                            window.set_progress(value);
                        }
                        UiMessage::SetProgressText(text) => {
                            window.set_progress_text(SharedString::from(&text));
                        }
                    }
                }
            }
        },
    );

    after_populate(&window, Vec::new());
    start_populate(manager.clone(), tx.clone());

    // Update button
    let tx_update = tx.clone();
    let manager_update = manager.clone();
    window.on_update_clicked(move || {
        info!("Update clicked");
        start_upgrade(manager_update.clone(), tx_update.clone());
    });

    // Upgrade checkbox
    let window_weak = window.as_weak();
    let manager_toggle = manager.clone();
    window.on_toggle_package(move |index, upgrading| {
        let Some(window) = window_weak.upgrade() else {
            return;
        };
        let Some(full_name) =
            set_row_upgrading(&window.get_packages(), index as usize, upgrading)
        else {
            return;
        };

        // marked before any later Update click can start the commit
        if let Err(e) = manager_toggle.mark_upgrade_blocking(&full_name, upgrading) {
            warn!("Failed to mark {}: {}", full_name, e);
        }
    });

    let window_weak = window.as_weak();
    window.on_close_clicked(move || {
        if let Some(window) = window_weak.upgrade() {
            let _ = window.hide();
        }
    });

    info!("Running application");
    window.run().expect("Failed to run application");

    match tokio::runtime::Runtime::new() {
        Ok(rt) => rt.block_on(manager.cleanup()),
        Err(e) => error!("Failed to create runtime for cleanup: {}", e),
    }
}
