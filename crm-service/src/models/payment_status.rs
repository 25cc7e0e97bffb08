//! Payment status model.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Payment status of an invoice, persisted as a small ordinal code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    Pending,
    Paid,
    Overdue,
}

/// Rejected payment status input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentStatusError {
    #[error("payment status {0} is out of range (expected 0..=3)")]
    OutOfRange(i64),

    #[error("payment status '{0}' is not a number")]
    NotANumber(String),
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 4] = [
        PaymentStatus::Unpaid,
        PaymentStatus::Pending,
        PaymentStatus::Paid,
        PaymentStatus::Overdue,
    ];

    /// Ordinal stored in the `payment_status` column.
    pub fn code(&self) -> i16 {
        match self {
            PaymentStatus::Unpaid => 0,
            PaymentStatus::Pending => 1,
            PaymentStatus::Paid => 2,
            PaymentStatus::Overdue => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Overdue => "overdue",
        }
    }

    pub fn from_code(code: i64) -> Result<Self, PaymentStatusError> {
        match code {
            0 => Ok(PaymentStatus::Unpaid),
            1 => Ok(PaymentStatus::Pending),
            2 => Ok(PaymentStatus::Paid),
            3 => Ok(PaymentStatus::Overdue),
            other => Err(PaymentStatusError::OutOfRange(other)),
        }
    }

    /// Parse a submitted form value. Absent or blank input means `Unpaid`.
    pub fn parse_submitted(value: Option<&str>) -> Result<Self, PaymentStatusError> {
        match value.map(str::trim) {
            None | Some("") => Ok(PaymentStatus::Unpaid),
            Some(raw) => raw.parse(),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = PaymentStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code: i64 = s
            .trim()
            .parse()
            .map_err(|_| PaymentStatusError::NotANumber(s.to_string()))?;
        Self::from_code(code)
    }
}

impl TryFrom<i16> for PaymentStatus {
    type Error = PaymentStatusError;

    fn try_from(code: i16) -> Result<Self, Self::Error> {
        Self::from_code(i64::from(code))
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip_through_ordinal() {
        for status in PaymentStatus::ALL {
            assert_eq!(PaymentStatus::try_from(status.code()), Ok(status));
        }
    }

    #[test]
    fn test_out_of_range_code_is_rejected() {
        assert_eq!(
            "5".parse::<PaymentStatus>(),
            Err(PaymentStatusError::OutOfRange(5))
        );
        assert_eq!(
            PaymentStatus::try_from(-1),
            Err(PaymentStatusError::OutOfRange(-1))
        );
    }

    #[test]
    fn test_blank_submission_defaults_to_unpaid() {
        assert_eq!(PaymentStatus::parse_submitted(None), Ok(PaymentStatus::Unpaid));
        assert_eq!(
            PaymentStatus::parse_submitted(Some("  ")),
            Ok(PaymentStatus::Unpaid)
        );
        assert_eq!(
            PaymentStatus::parse_submitted(Some("2")),
            Ok(PaymentStatus::Paid)
        );
        assert!(matches!(
            PaymentStatus::parse_submitted(Some("paid")),
            Err(PaymentStatusError::NotANumber(_))
        ));
    }
}
