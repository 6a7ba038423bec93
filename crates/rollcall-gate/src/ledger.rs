//! Attendance records and the storage boundary they are handed to.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
}

/// Who recorded the attendance row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkedBy {
    Student,
    Instructor,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub user_id: u64,
    pub unit_id: u64,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub captured_image_path: Option<PathBuf>,
    pub marked_by: MarkedBy,
    pub created_at: DateTime<Utc>,
}

impl AttendanceRecord {
    /// A student's self-marked presence, backed by a verified capture.
    pub fn self_marked(user_id: u64, unit_id: u64, capture: PathBuf, at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            unit_id,
            date: at.date_naive(),
            status: AttendanceStatus::Present,
            captured_image_path: Some(capture),
            marked_by: MarkedBy::Student,
            created_at: at,
        }
    }
}

#[derive(Error, Debug)]
#[error("ledger rejected attendance record: {0}")]
pub struct LedgerError(pub String);

/// Persistent attendance storage, owned by the surrounding application.
pub trait AttendanceLedger: Send + Sync {
    fn record(&self, record: &AttendanceRecord) -> Result<(), LedgerError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_self_marked_record_json() {
        let at = Utc.with_ymd_and_hms(2024, 9, 2, 23, 59, 59).unwrap();
        let record = AttendanceRecord::self_marked(4, 11, PathBuf::from("/k/user_4/captures/c.png"), at);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["status"], "present");
        assert_eq!(json["marked_by"], "student");
        assert_eq!(json["date"], "2024-09-02");
        assert_eq!(json["unit_id"], 11);
    }
}
