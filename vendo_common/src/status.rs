use std::{fmt::Display, str::FromStr};

use log::error;
use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

//--------------------------------------    PaymentStatus    ---------------------------------------------------------
/// The canonical lifecycle of a payment attempt. Every provider-specific status code maps into
/// this set; codes we do not recognise map to [`PaymentStatus::Pending`] so that a later
/// callback or a status probe can still settle the payment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PaymentStatus {
    /// The payment row exists but the provider has not acknowledged it yet.
    #[default]
    Initiated,
    /// The provider has acknowledged the payment and we are waiting for the outcome.
    Pending,
    /// The payment completed. Terminal.
    Success,
    /// The provider reported a definitive failure. Terminal.
    Failed,
    /// The payment window lapsed before completion. Terminal.
    Expired,
}

impl PaymentStatus {
    /// Terminal statuses are absorbing. Once a payment reaches one, no callback or reaper may
    /// move it again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Success | PaymentStatus::Failed | PaymentStatus::Expired)
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Initiated => write!(f, "Initiated"),
            PaymentStatus::Pending => write!(f, "Pending"),
            PaymentStatus::Success => write!(f, "Success"),
            PaymentStatus::Failed => write!(f, "Failed"),
            PaymentStatus::Expired => write!(f, "Expired"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid payment status: {0}")]
pub struct StatusConversionError(String);

impl FromStr for PaymentStatus {
    type Err = StatusConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Initiated" => Ok(Self::Initiated),
            "Pending" => Ok(Self::Pending),
            "Success" => Ok(Self::Success),
            "Failed" => Ok(Self::Failed),
            "Expired" => Ok(Self::Expired),
            s => Err(StatusConversionError(s.to_string())),
        }
    }
}

impl From<String> for PaymentStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid payment status: {value}. But this conversion cannot fail. Defaulting to Initiated");
            PaymentStatus::Initiated
        })
    }
}
