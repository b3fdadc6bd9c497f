pub mod cve_sync;

pub use cve_sync::{CveSyncError, CveSyncJob};
