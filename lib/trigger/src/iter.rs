//! The lazy, restartable run-date iterator.
//!
//! `RunDateIter::new` is a value: each call to `Trigger::iter()` produces a
//! fresh iterator seeded from the current wall clock, and consecutive
//! `next()` calls on one iterator return strictly non-decreasing timestamps.

use crate::config::{parse_cron, TriggerConfig};
use chrono::{DateTime, Duration, Utc};

/// A lazy sequence of future run instants for one activation of a trigger.
pub enum RunDateIter {
    /// Cron: re-queries the parsed schedule for the next fire strictly
    /// after a cursor that advances with each call.
    Cron {
        schedule: cron::Schedule,
        cursor: DateTime<Utc>,
    },
    /// Interval: `base + k * delta` for `k = 1, 2, ...`.
    Interval {
        base: DateTime<Utc>,
        delta: Duration,
        next_k: u64,
    },
    /// Date: yields the configured instant once, then nothing.
    Date(Option<DateTime<Utc>>),
}

impl RunDateIter {
    /// Builds a fresh iterator for `config`, seeded at `now`.
    ///
    /// # Panics
    ///
    /// Panics if `config` is an invalid cron expression or an interval whose
    /// field sum overflows `Duration`'s range. Callers must validate the
    /// config (via [`TriggerConfig::validate`]) before storing it; by the
    /// time an iterator is created the config is assumed sound.
    #[must_use]
    pub fn new(config: &TriggerConfig, now: DateTime<Utc>) -> Self {
        match config {
            TriggerConfig::Cron { expression } => {
                let schedule = parse_cron(expression).expect("trigger config was validated");
                Self::Cron {
                    schedule,
                    cursor: now,
                }
            }
            TriggerConfig::Interval { args } => Self::Interval {
                base: now,
                delta: args.to_duration().expect("trigger config was validated"),
                next_k: 1,
            },
            TriggerConfig::Date { at } => Self::Date(Some(*at)),
        }
    }
}

impl Iterator for RunDateIter {
    type Item = DateTime<Utc>;

    fn next(&mut self) -> Option<DateTime<Utc>> {
        match self {
            Self::Cron { schedule, cursor } => {
                let next = schedule.after(cursor).next()?;
                *cursor = next;
                Some(next)
            }
            Self::Interval { base, delta, next_k } => {
                let run_at = *base + *delta * (*next_k as i32);
                *next_k += 1;
                Some(run_at)
            }
            Self::Date(slot) => slot.take(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IntervalArgs;

    #[test]
    fn interval_yields_strictly_after_base_by_exact_delta() {
        let now = Utc::now();
        let config = TriggerConfig::Interval {
            args: IntervalArgs {
                seconds: Some(5),
                ..Default::default()
            },
        };
        let mut iter = RunDateIter::new(&config, now);
        let first = iter.next().unwrap();
        let second = iter.next().unwrap();
        assert_eq!(first, now + Duration::seconds(5));
        assert_eq!(second - first, Duration::seconds(5));
    }

    #[test]
    fn date_yields_once_then_terminates() {
        let at = Utc::now() + Duration::hours(1);
        let config = TriggerConfig::Date { at };
        let mut iter = RunDateIter::new(&config, Utc::now());
        assert_eq!(iter.next(), Some(at));
        assert_eq!(iter.next(), None);
        assert_eq!(iter.next(), None);
    }

    #[test]
    fn cron_yields_strictly_increasing_instants() {
        let config = TriggerConfig::Cron {
            expression: "* * * * *".to_string(),
        };
        let now = Utc::now();
        let mut iter = RunDateIter::new(&config, now);
        let first = iter.next().unwrap();
        let second = iter.next().unwrap();
        assert!(first > now);
        assert!(second > first);
    }

    #[test]
    fn two_activations_reset_state() {
        let config = TriggerConfig::Interval {
            args: IntervalArgs {
                seconds: Some(1),
                ..Default::default()
            },
        };
        let now = Utc::now();
        let mut first_activation = RunDateIter::new(&config, now);
        let a1 = first_activation.next().unwrap();

        let mut second_activation = RunDateIter::new(&config, now);
        let a2 = second_activation.next().unwrap();

        assert_eq!(a1, a2);
    }
}
