use apn_service::PackageList;

#[derive(Debug, Clone)]
pub enum UiMessage {
    PackagesLoaded(PackageList),
    SetBusy(bool),
    SetStatus(String),
    SetProgress(f32),
    SetProgressText(String),
}
