use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{BillId, StudentId};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BillingError {
    #[error("invalid {field}: {message}")]
    InvalidInput {
        field: String,
        message: String,
    },

    #[error("student not found: {student_id}")]
    StudentNotFound {
        student_id: StudentId,
    },

    #[error("bill not found: {bill_id}")]
    BillNotFound {
        bill_id: String,
    },

    #[error("bill already exists for student {student_id} for {month:02}/{year}")]
    DuplicateBill {
        student_id: StudentId,
        month: u32,
        year: i32,
    },

    #[error("bill number already in use: {bill_number}")]
    DuplicateBillNumber {
        bill_number: String,
    },

    #[error("bill {bill_number} is cancelled")]
    BillCancelled {
        bill_number: String,
    },

    #[error("{field} cannot be changed once a bill is issued")]
    ImmutableField {
        field: String,
    },

    #[error("storage failure: {message}")]
    Storage {
        message: String,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
    },
}

/// coarse classification used by callers to pick a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Duplicate,
    State,
    Persistence,
}

impl BillingError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        BillingError::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn bill_not_found(bill_id: BillId) -> Self {
        BillingError::BillNotFound {
            bill_id: bill_id.to_string(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        BillingError::Storage {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            BillingError::InvalidInput { .. } | BillingError::InvalidConfiguration { .. } => {
                ErrorKind::Validation
            }
            BillingError::StudentNotFound { .. } | BillingError::BillNotFound { .. } => {
                ErrorKind::NotFound
            }
            BillingError::DuplicateBill { .. } | BillingError::DuplicateBillNumber { .. } => {
                ErrorKind::Duplicate
            }
            BillingError::BillCancelled { .. } | BillingError::ImmutableField { .. } => {
                ErrorKind::State
            }
            BillingError::Storage { .. } => {
                ErrorKind::Persistence
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, BillingError>;
