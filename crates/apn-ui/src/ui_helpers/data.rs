use apn_service::{PackageList, PackageRow};
use chrono::Local;
use slint::{Model, ModelRc, SharedString, VecModel};

use crate::PackageData;

fn row_to_ui(row: &PackageRow) -> PackageData {
    PackageData {
        upgrading: row.upgrading,
        name: SharedString::from(row.name.as_str()),
        full_name: SharedString::from(row.full_name.as_str()),
        version: SharedString::from(row.version.as_str()),
    }
}

/// Convert the package list to rows for the dialog
pub fn rows_to_ui(packages: &PackageList) -> Vec<PackageData> {
    packages.rows().iter().map(row_to_ui).collect()
}

/// "Last checked 14:02", or nothing before the first check
pub fn checked_label(packages: &PackageList) -> String {
    match packages.checked_at {
        Some(at) => format!(
            "Last checked {}",
            at.with_timezone(&Local).format("%H:%M")
        ),
        None => String::new(),
    }
}

/// Helper to update the `upgrading` field in a VecModel, returns the row's full name
pub fn set_row_upgrading(
    model: &ModelRc<PackageData>,
    index: usize,
    upgrading: bool,
) -> Option<String> {
    let vec_model = model.as_any().downcast_ref::<VecModel<PackageData>>()?;
    let mut row = vec_model.row_data(index)?;
    row.upgrading = upgrading;
    let full_name = row.full_name.to_string();
    vec_model.set_row_data(index, row);
    Some(full_name)
}
