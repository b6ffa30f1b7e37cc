// src/config/consts.rs

// Target application
pub const DETAILS_BASE_URL: &str = "https://app4.curemd.net/curemdc/Patient/datPatient.aspx";
pub const DETAILS_PAGE_MARKER: &str = "datPatient.aspx";
pub const SEARCH_PATH: &str = "/mobiledoc/Controller?action=searchappt&project=WebEMR";

// Correlation keys (session-scoped)
pub const CURRENT_PATIENT_KEY: &str = "curemd_current_patient";
pub const SEARCH_RESULTS_KEY: &str = "curemd_search_results";

// Local store
pub const STORE_DIR: &str = ".store";
pub const SESSION_SUBDIR: &str = "session";
pub const DEFAULT_SESSION: &str = "default";
pub const LOG_FILE: &str = "debug.log";

// Export
pub const DEFAULT_OUT_DIR: &str = "out";
pub const RECORD_FILE_PREFIX: &str = "patient_demographics";
pub const SLOTS_FILE_PREFIX: &str = "appointment_slots";

// Net
pub const USER_AGENT: &str = concat!("emr_scrape/", env!("CARGO_PKG_VERSION"));

// Pacing between tabs when opening a whole listing
pub const OPEN_ALL_PAUSE_MS: u64 = 500;

// Bumped whenever a section or locator list changes
pub const SCHEMA_VERSION: &str = "2025.12.12";
