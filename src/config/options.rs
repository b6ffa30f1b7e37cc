// src/config/options.rs
use std::path::{Path, PathBuf};

use super::consts::*;
use crate::core::sanitize::sanitize_file_part;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AppOptions {
    pub store: StoreOptions,
    pub navigation: NavigationOptions,
    pub export: ExportOptions,
}

/// Where the correlation store lives and which browsing session it belongs to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreOptions {
    pub dir: PathBuf,
    pub session: String,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(STORE_DIR),
            session: s!(DEFAULT_SESSION),
        }
    }
}

impl StoreOptions {
    /// `<dir>/session/<session>`; the session name is sanitized for the filesystem.
    pub fn session_dir(&self) -> PathBuf {
        self.dir
            .join(SESSION_SUBDIR)
            .join(sanitize_file_part(&self.session, DEFAULT_SESSION))
    }

    pub fn log_file(&self) -> PathBuf {
        self.dir.join(LOG_FILE)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NavigationOptions {
    pub details_base_url: String,
    pub open_all_pause_ms: u64,
}

impl Default for NavigationOptions {
    fn default() -> Self {
        Self {
            details_base_url: s!(DETAILS_BASE_URL),
            open_all_pause_ms: OPEN_ALL_PAUSE_MS,
        }
    }
}

impl NavigationOptions {
    /// Details-page URL for a patient id.
    pub fn details_url(&self, patient_id: &str) -> String {
        format!("{}?intPatient_ID={patient_id}&PatientId={patient_id}", self.details_base_url)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportOptions {
    pub out_dir: PathBuf,
    pub write_file: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from(DEFAULT_OUT_DIR),
            write_file: true,
        }
    }
}

impl ExportOptions {
    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn details_url_repeats_the_id() {
        let nav = NavigationOptions {
            details_base_url: s!("https://host/Patient/datPatient.aspx"),
            ..Default::default()
        };
        assert_eq!(
            nav.details_url("4411"),
            "https://host/Patient/datPatient.aspx?intPatient_ID=4411&PatientId=4411"
        );
    }

    #[test]
    fn session_dir_is_sanitized() {
        let store = StoreOptions { dir: PathBuf::from("st"), session: s!("../evil tab") };
        assert_eq!(store.session_dir(), PathBuf::from("st").join("session").join("evil_tab"));
    }
}
