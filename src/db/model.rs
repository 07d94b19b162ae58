//! Query slices used by the scan engine.
//!
//! Keep these structs focused on the data returned by queries. Business logic
//! should live in higher layers.

use crate::model::ChildStatus;

/// Guardian slice loaded once per scan request.
#[derive(Debug, Clone)]
pub struct ScanGuardian {
    pub id: i64,
    pub name: String,
    pub role: String,
    pub phone: Option<String>,
}

/// Child slice processed independently within a scan batch.
#[derive(Debug, Clone)]
pub struct ChildForScan {
    pub id: i64,
    pub name: String,
    pub status: ChildStatus,
}
