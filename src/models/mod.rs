pub mod request;
pub mod scan;
pub mod search;

pub use request::{sanitize_target, ScanModule, ScanPlan, ScanRequest, ScanType};
pub use scan::{Scan, ScanHistoryEntry, ScanStatus};
pub use search::SearchResult;
