//! Turns submission outcomes into display-ready records and keeps the
//! session's result log.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::clock::Clock;
use crate::error::{ExecutionFailure, ValidationError};
use crate::exchange::types::{ExecutionOutcome, OrderResult};

/// Whether an outcome came from a test submission or a live one
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DisplayMode {
    Test,
    Live,
}

impl DisplayMode {
    pub fn from_test_flag(is_test: bool) -> Self {
        if is_test {
            DisplayMode::Test
        } else {
            DisplayMode::Live
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum DisplayOutcome {
    Placed {
        #[serde(flatten)]
        result: OrderResult,
    },
    /// The backend answered with a failure
    Failed { message: String },
    /// Never reached the backend
    Rejected { reason: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayRecord {
    pub mode: DisplayMode,
    pub label: String,
    #[serde(flatten)]
    pub outcome: DisplayOutcome,
    pub recorded_at: DateTime<Utc>,
}

impl DisplayRecord {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, DisplayOutcome::Placed { .. })
    }

    pub fn result(&self) -> Option<&OrderResult> {
        match &self.outcome {
            DisplayOutcome::Placed { result } => Some(result),
            _ => None,
        }
    }
}

impl fmt::Display for DisplayRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.label)?;
        match &self.outcome {
            DisplayOutcome::Placed { result } => {
                writeln!(
                    f,
                    "Type: {} | Side: {} | Symbol: {}",
                    result.kind, result.side, result.symbol
                )?;
                writeln!(f, "Quantity: {} | Status: {}", result.quantity, result.status)?;
                write!(f, "Order ID: {}", result.order_id)?;
                if let Some(executed) = result.executed_price {
                    write!(f, "\nExecuted Price: ${}", format_usd(executed))?;
                } else if let Some(price) = result.price {
                    write!(f, "\nPrice: ${}", format_usd(price))?;
                }
                if let (Some(stop), Some(stop_limit)) = (result.stop_price, result.stop_limit_price) {
                    write!(
                        f,
                        "\nStop Price: ${} | Stop Limit Price: ${}",
                        format_usd(stop),
                        format_usd(stop_limit)
                    )?;
                }
                if let Some(list_id) = result.order_list_id {
                    write!(f, "\nOrder List ID: {}", list_id)?;
                }
                write!(f, "\n{}", result.timestamp.format("%Y-%m-%d %H:%M:%S UTC"))
            }
            DisplayOutcome::Failed { message } => write!(
                f,
                "{}\n{}",
                message,
                self.recorded_at.format("%Y-%m-%d %H:%M:%S UTC")
            ),
            DisplayOutcome::Rejected { reason } => write!(
                f,
                "{}\n{}",
                reason,
                self.recorded_at.format("%Y-%m-%d %H:%M:%S UTC")
            ),
        }
    }
}

/// Two decimals with thousands separators: 35123.4 -> "35,123.40"
pub fn format_usd(value: Decimal) -> String {
    let rounded = value.round_dp(2);
    let text = format!("{:.2}", rounded.abs());
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, frac_part)
}

#[derive(Clone)]
pub struct ResultPresenter {
    clock: Arc<dyn Clock>,
}

impl ResultPresenter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn present(&self, outcome: &ExecutionOutcome, is_test: bool) -> DisplayRecord {
        let mode = DisplayMode::from_test_flag(is_test);
        match outcome {
            Ok(result) => DisplayRecord {
                mode,
                label: success_label(mode),
                outcome: DisplayOutcome::Placed {
                    result: result.clone(),
                },
                recorded_at: result.timestamp,
            },
            Err(failure) => self.present_failure(failure, is_test),
        }
    }

    pub fn present_failure(&self, failure: &ExecutionFailure, is_test: bool) -> DisplayRecord {
        let mode = DisplayMode::from_test_flag(is_test);
        DisplayRecord {
            mode,
            label: failure_label(mode),
            outcome: DisplayOutcome::Failed {
                message: failure.message.clone(),
            },
            recorded_at: self.clock.now(),
        }
    }

    pub fn present_rejection(&self, error: &ValidationError, is_test: bool) -> DisplayRecord {
        let mode = DisplayMode::from_test_flag(is_test);
        DisplayRecord {
            mode,
            label: failure_label(mode),
            outcome: DisplayOutcome::Rejected {
                reason: error.to_string(),
            },
            recorded_at: self.clock.now(),
        }
    }
}

fn success_label(mode: DisplayMode) -> String {
    match mode {
        DisplayMode::Test => "🧪 TEST Order Placed Successfully!".to_string(),
        DisplayMode::Live => "✅ LIVE Order Placed Successfully!".to_string(),
    }
}

fn failure_label(mode: DisplayMode) -> String {
    match mode {
        DisplayMode::Test => "❌ TEST Order Failed".to_string(),
        DisplayMode::Live => "❌ LIVE Order Failed".to_string(),
    }
}

/// Append-only, session-long log of display records.
#[derive(Clone, Default)]
pub struct ResultLog {
    entries: Arc<Mutex<Vec<DisplayRecord>>>,
}

impl ResultLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, record: DisplayRecord) {
        self.entries.lock().unwrap().push(record);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Display order: most recently appended first
    pub fn newest_first(&self) -> Vec<DisplayRecord> {
        self.entries.lock().unwrap().iter().rev().cloned().collect()
    }
}
