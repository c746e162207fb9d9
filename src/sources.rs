//! collaborators the billing engine reads from but does not own

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::types::{BillingPeriod, MessId, StudentId};

/// one day of attendance for one student
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub date: NaiveDate,
    pub is_on_leave: bool,
    pub total_meals_present: u32,
}

impl AttendanceRecord {
    /// a day is missed when on leave or no meal was taken
    pub fn is_absent(&self) -> bool {
        self.is_on_leave || self.total_meals_present == 0
    }
}

pub trait AttendanceSource {
    /// records for the student with dates in `[start, end]`
    fn query_range(
        &self,
        student_id: StudentId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>>;
}

pub trait StudentDirectory {
    fn exists(&self, student_id: StudentId) -> Result<bool>;

    /// students currently enrolled in the mess
    fn list_students(&self, mess_id: &str) -> Result<Vec<StudentId>>;
}

/// attendance reduced to what a bill needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceSummary {
    pub total_days: u32,
    pub days_present: u32,
    pub days_absent: u32,
    pub total_meals_consumed: u32,
}

impl AttendanceSummary {
    /// days without a record count as present; each absent date counts once
    pub fn tally(period: &BillingPeriod, records: &[AttendanceRecord]) -> Self {
        let total_days = period.total_days();
        let absent_dates: BTreeSet<NaiveDate> = records
            .iter()
            .filter(|r| period.contains(r.date) && r.is_absent())
            .map(|r| r.date)
            .collect();
        let days_absent = (absent_dates.len() as u32).min(total_days);

        Self {
            total_days,
            days_present: total_days - days_absent,
            days_absent,
            // meals are not tracked per bill yet
            total_meals_consumed: 0,
        }
    }
}

/// in-memory attendance log
#[derive(Debug, Default, Clone)]
pub struct MemoryAttendance {
    records: HashMap<StudentId, Vec<AttendanceRecord>>,
}

impl MemoryAttendance {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, student_id: StudentId, record: AttendanceRecord) {
        self.records.entry(student_id).or_default().push(record);
    }

    /// mark a full-day leave
    pub fn mark_leave(&mut self, student_id: StudentId, date: NaiveDate) {
        self.record(
            student_id,
            AttendanceRecord {
                date,
                is_on_leave: true,
                total_meals_present: 0,
            },
        );
    }
}

impl AttendanceSource for MemoryAttendance {
    fn query_range(
        &self,
        student_id: StudentId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>> {
        Ok(self
            .records
            .get(&student_id)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| r.date >= start && r.date <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// in-memory mess rosters
#[derive(Debug, Default, Clone)]
pub struct MemoryDirectory {
    rosters: HashMap<MessId, Vec<StudentId>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enroll(&mut self, mess_id: &str, student_id: StudentId) {
        let roster = self.rosters.entry(mess_id.to_string()).or_default();
        if !roster.contains(&student_id) {
            roster.push(student_id);
        }
    }
}

impl StudentDirectory for MemoryDirectory {
    fn exists(&self, student_id: StudentId) -> Result<bool> {
        Ok(self.rosters.values().any(|roster| roster.contains(&student_id)))
    }

    fn list_students(&self, mess_id: &str) -> Result<Vec<StudentId>> {
        Ok(self.rosters.get(mess_id).cloned().unwrap_or_default())
    }
}
