//! Trigger configuration: the `trigger_type` discriminator plus its
//! type-specific `trigger_args` payload.

use crate::error::TriggerError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The `trigger_type` discriminator stored alongside a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    /// 5-field cron expression.
    Cron,
    /// Fixed duration between runs.
    Interval,
    /// Single one-shot instant.
    Date,
}

impl TriggerType {
    /// The string stored in the `trigger_type` column.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cron => "cron",
            Self::Interval => "interval",
            Self::Date => "date",
        }
    }
}

impl FromStr for TriggerType {
    type Err = TriggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cron" => Ok(Self::Cron),
            "interval" => Ok(Self::Interval),
            "date" => Ok(Self::Date),
            other => Err(TriggerError::UnknownTriggerType {
                trigger_type: other.to_string(),
            }),
        }
    }
}

/// The subset-of-fields interval payload: `{weeks, days, hours, minutes, seconds}`.
///
/// Every field is optional; the sum of all present fields must be greater
/// than zero — a zero-duration interval is rejected at construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalArgs {
    /// Whole weeks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weeks: Option<u64>,
    /// Whole days.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days: Option<u64>,
    /// Whole hours.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours: Option<u64>,
    /// Whole minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minutes: Option<u64>,
    /// Whole seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seconds: Option<u64>,
}

/// Converts one optional field to a checked `Duration` via `ctor`, treating
/// an absent field as zero. Rejects values that don't fit in `i64` and
/// values `ctor` itself can't represent, rather than silently wrapping or
/// panicking (as the unchecked `Duration::weeks`/`days`/... constructors do).
fn checked_component(
    value: Option<u64>,
    ctor: fn(i64) -> Option<Duration>,
) -> Result<Duration, TriggerError> {
    match value {
        None => Ok(Duration::zero()),
        Some(v) => i64::try_from(v)
            .ok()
            .and_then(ctor)
            .ok_or(TriggerError::IntervalOutOfRange),
    }
}

impl IntervalArgs {
    /// Sums the present fields into a single duration.
    ///
    /// # Errors
    ///
    /// Returns [`TriggerError::IntervalOutOfRange`] if any field, or their
    /// sum, overflows the range `chrono::Duration` can represent.
    pub fn to_duration(self) -> Result<Duration, TriggerError> {
        let weeks = checked_component(self.weeks, Duration::try_weeks)?;
        let days = checked_component(self.days, Duration::try_days)?;
        let hours = checked_component(self.hours, Duration::try_hours)?;
        let minutes = checked_component(self.minutes, Duration::try_minutes)?;
        let seconds = checked_component(self.seconds, Duration::try_seconds)?;

        weeks
            .checked_add(&days)
            .and_then(|d| d.checked_add(&hours))
            .and_then(|d| d.checked_add(&minutes))
            .and_then(|d| d.checked_add(&seconds))
            .ok_or(TriggerError::IntervalOutOfRange)
    }

    /// Validates that the summed duration is representable and strictly
    /// positive.
    pub fn validate(self) -> Result<(), TriggerError> {
        if self.to_duration()? <= Duration::zero() {
            Err(TriggerError::ZeroInterval)
        } else {
            Ok(())
        }
    }
}

/// A task's trigger: the rule that produces its future run instants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "trigger_type", rename_all = "snake_case")]
pub enum TriggerConfig {
    /// 5-field cron expression, standard minute/hour/dom/month/dow semantics.
    Cron {
        /// The cron expression string.
        expression: String,
    },
    /// Fixed interval, first fire strictly after construction.
    Interval {
        /// The interval fields.
        args: IntervalArgs,
    },
    /// Single one-shot instant.
    Date {
        /// The instant to fire at.
        at: DateTime<Utc>,
    },
}

impl TriggerConfig {
    /// Returns the discriminator for this config.
    #[must_use]
    pub fn trigger_type(&self) -> TriggerType {
        match self {
            Self::Cron { .. } => TriggerType::Cron,
            Self::Interval { .. } => TriggerType::Interval,
            Self::Date { .. } => TriggerType::Date,
        }
    }

    /// Validates the configuration, rejecting malformed cron expressions
    /// and zero-duration intervals.
    pub fn validate(&self) -> Result<(), TriggerError> {
        match self {
            Self::Cron { expression } => parse_cron(expression).map(|_| ()),
            Self::Interval { args } => args.validate(),
            Self::Date { .. } => Ok(()),
        }
    }

    /// Builds a config from a `trigger_type` discriminator and a
    /// type-specific `trigger_args` payload, as the store adapter does on
    /// insert/update.
    ///
    /// # Errors
    ///
    /// Returns an error if `trigger_type` is unrecognized or `trigger_args`
    /// doesn't match the shape that type requires.
    pub fn from_parts(trigger_type: &str, trigger_args: &str) -> Result<Self, TriggerError> {
        let config = match TriggerType::from_str(trigger_type)? {
            TriggerType::Cron => Self::Cron {
                expression: trigger_args.to_string(),
            },
            TriggerType::Interval => {
                let args: IntervalArgs =
                    serde_json::from_str(trigger_args).map_err(|e| TriggerError::MalformedArgs {
                        trigger_type: trigger_type.to_string(),
                        reason: e.to_string(),
                    })?;
                Self::Interval { args }
            }
            TriggerType::Date => {
                let at = DateTime::parse_from_rfc3339(trigger_args)
                    .map_err(|e| TriggerError::MalformedArgs {
                        trigger_type: trigger_type.to_string(),
                        reason: e.to_string(),
                    })?
                    .with_timezone(&Utc);
                Self::Date { at }
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Serializes the type-specific payload back to the text form stored
    /// in the `trigger_args` column.
    #[must_use]
    pub fn to_args_text(&self) -> String {
        match self {
            Self::Cron { expression } => expression.clone(),
            Self::Interval { args } => {
                serde_json::to_string(args).expect("IntervalArgs always serializes")
            }
            Self::Date { at } => at.to_rfc3339(),
        }
    }
}

/// Parses and validates a 5-field cron expression.
///
/// The `cron` crate expects 6 fields (seconds first); we prepend a literal
/// `0` seconds field so callers only ever write the standard 5-field form
/// (minute hour day-of-month month day-of-week).
pub(crate) fn parse_cron(expression: &str) -> Result<cron::Schedule, TriggerError> {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(TriggerError::InvalidCronExpression {
            expression: expression.to_string(),
            reason: format!("expected 5 fields, got {}", fields.len()),
        });
    }
    let six_field = format!("0 {expression}");
    cron::Schedule::from_str(&six_field).map_err(|e| TriggerError::InvalidCronExpression {
        expression: expression.to_string(),
        reason: e.to_string(),
    })
}
