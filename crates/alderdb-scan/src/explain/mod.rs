//! Plan visualization for custom bitmap-heap scans.

pub mod walker;

pub use walker::explain_scan;
