//! Recurrence rule evaluation.
//!
//! A [`RecurrenceRule`] describes when a scheduled transaction repeats. The
//! evaluator is a pure function of the rule and the query window: the nth
//! occurrence is always computed from the rule's start anchor, never by
//! re-adding a period to an already clamped date, so month-end clamping
//! (Jan 31 + 1 month = Feb 28/29) cannot drift between evaluations that use
//! different windows. This determinism is what makes materialization
//! idempotent.

use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

impl TryFrom<&str> for Frequency {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            other => Err(EngineError::InvalidRecurrence(format!(
                "unknown frequency: {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    pub interval: u32,
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
    pub max_occurrences: Option<u32>,
}

impl RecurrenceRule {
    pub fn validate(&self) -> ResultEngine<()> {
        if self.interval < 1 {
            return Err(EngineError::InvalidRecurrence(
                "interval must be >= 1".to_string(),
            ));
        }
        // Persisted as i32 columns; values beyond that range would wrap.
        if i32::try_from(self.interval).is_err() {
            return Err(EngineError::InvalidRecurrence(
                "interval too large".to_string(),
            ));
        }
        if let Some(max) = self.max_occurrences {
            if i32::try_from(max).is_err() {
                return Err(EngineError::InvalidRecurrence(
                    "max_occurrences too large".to_string(),
                ));
            }
        }
        if let Some(end) = self.end {
            if end < self.start {
                return Err(EngineError::InvalidRecurrence(
                    "end date before start date".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// The nth occurrence (0-based), computed from the start anchor.
    ///
    /// `None` on arithmetic overflow, which ends the sequence.
    fn nth(&self, n: u32) -> Option<NaiveDate> {
        let steps = n.checked_mul(self.interval)?;
        match self.frequency {
            Frequency::Daily => self.start.checked_add_days(Days::new(u64::from(steps))),
            Frequency::Weekly => self
                .start
                .checked_add_days(Days::new(u64::from(steps) * 7)),
            Frequency::Monthly => self.start.checked_add_months(Months::new(steps)),
            Frequency::Yearly => self
                .start
                .checked_add_months(Months::new(steps.checked_mul(12)?)),
        }
    }

    /// Lazy ascending, duplicate-free occurrence dates within the closed
    /// window `[window_start, window_end]`.
    ///
    /// Occurrences before `window_start` are skipped but still count toward
    /// `max_occurrences`; re-evaluating with the same inputs always yields
    /// the same dates.
    pub fn occurrences(
        &self,
        window_start: NaiveDate,
        window_end: NaiveDate,
    ) -> ResultEngine<Occurrences> {
        self.validate()?;
        if window_end < window_start {
            return Err(EngineError::InvalidRecurrence(
                "window end before window start".to_string(),
            ));
        }

        let upper = match self.end {
            Some(end) => end.min(window_end),
            None => window_end,
        };

        Ok(Occurrences {
            rule: *self,
            index: 0,
            window_start,
            upper,
        })
    }
}

/// Iterator over the occurrence dates of a [`RecurrenceRule`].
#[derive(Clone, Debug)]
pub struct Occurrences {
    rule: RecurrenceRule,
    index: u32,
    window_start: NaiveDate,
    upper: NaiveDate,
}

impl Iterator for Occurrences {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        loop {
            if let Some(max) = self.rule.max_occurrences {
                if self.index >= max {
                    return None;
                }
            }
            let date = self.rule.nth(self.index)?;
            if date > self.upper {
                return None;
            }
            self.index += 1;
            if date < self.window_start {
                continue;
            }
            return Some(date);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn rule(frequency: Frequency, interval: u32, start: NaiveDate) -> RecurrenceRule {
        RecurrenceRule {
            frequency,
            interval,
            start,
            end: None,
            max_occurrences: None,
        }
    }

    #[test]
    fn weekly_yields_five_dates_in_january() {
        let r = rule(Frequency::Weekly, 1, date(2023, 1, 2));
        let dates: Vec<_> = r
            .occurrences(date(2023, 1, 1), date(2023, 1, 30))
            .unwrap()
            .collect();
        assert_eq!(
            dates,
            vec![
                date(2023, 1, 2),
                date(2023, 1, 9),
                date(2023, 1, 16),
                date(2023, 1, 23),
                date(2023, 1, 30),
            ]
        );
    }

    #[test]
    fn monthly_clamps_to_end_of_february() {
        let r = rule(Frequency::Monthly, 1, date(2023, 1, 31));
        let dates: Vec<_> = r
            .occurrences(date(2023, 1, 1), date(2023, 3, 31))
            .unwrap()
            .collect();
        assert_eq!(
            dates,
            vec![date(2023, 1, 31), date(2023, 2, 28), date(2023, 3, 31)]
        );
    }

    #[test]
    fn monthly_clamp_does_not_drift_across_windows() {
        // Evaluating March alone must give the same date as a full-range
        // evaluation: the anchor is always the rule start, not February 28.
        let r = rule(Frequency::Monthly, 1, date(2023, 1, 31));
        let march_only: Vec<_> = r
            .occurrences(date(2023, 3, 1), date(2023, 3, 31))
            .unwrap()
            .collect();
        assert_eq!(march_only, vec![date(2023, 3, 31)]);
    }

    #[test]
    fn leap_year_february() {
        let r = rule(Frequency::Monthly, 1, date(2024, 1, 31));
        let dates: Vec<_> = r
            .occurrences(date(2024, 2, 1), date(2024, 2, 29))
            .unwrap()
            .collect();
        assert_eq!(dates, vec![date(2024, 2, 29)]);
    }

    #[test]
    fn yearly_clamps_leap_day() {
        let r = rule(Frequency::Yearly, 1, date(2024, 2, 29));
        let dates: Vec<_> = r
            .occurrences(date(2024, 1, 1), date(2026, 12, 31))
            .unwrap()
            .collect();
        assert_eq!(
            dates,
            vec![date(2024, 2, 29), date(2025, 2, 28), date(2026, 2, 28)]
        );
    }

    #[test]
    fn daily_with_interval() {
        let r = rule(Frequency::Daily, 3, date(2023, 6, 1));
        let dates: Vec<_> = r
            .occurrences(date(2023, 6, 1), date(2023, 6, 10))
            .unwrap()
            .collect();
        assert_eq!(
            dates,
            vec![
                date(2023, 6, 1),
                date(2023, 6, 4),
                date(2023, 6, 7),
                date(2023, 6, 10),
            ]
        );
    }

    #[test]
    fn evaluation_is_deterministic() {
        let r = RecurrenceRule {
            frequency: Frequency::Weekly,
            interval: 2,
            start: date(2023, 1, 5),
            end: Some(date(2023, 12, 31)),
            max_occurrences: Some(10),
        };
        let a: Vec<_> = r
            .occurrences(date(2023, 1, 1), date(2023, 6, 30))
            .unwrap()
            .collect();
        let b: Vec<_> = r
            .occurrences(date(2023, 1, 1), date(2023, 6, 30))
            .unwrap()
            .collect();
        assert_eq!(a, b);
        assert!(a.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn skipped_occurrences_count_toward_max() {
        // Three occurrences exist in total; the first two fall before the
        // window, so only the third is yielded.
        let r = RecurrenceRule {
            frequency: Frequency::Daily,
            interval: 1,
            start: date(2023, 1, 1),
            end: None,
            max_occurrences: Some(3),
        };
        let dates: Vec<_> = r
            .occurrences(date(2023, 1, 3), date(2023, 1, 31))
            .unwrap()
            .collect();
        assert_eq!(dates, vec![date(2023, 1, 3)]);
    }

    #[test]
    fn rule_end_caps_the_window() {
        let r = RecurrenceRule {
            frequency: Frequency::Daily,
            interval: 1,
            start: date(2023, 1, 1),
            end: Some(date(2023, 1, 3)),
            max_occurrences: None,
        };
        let dates: Vec<_> = r
            .occurrences(date(2023, 1, 1), date(2023, 1, 31))
            .unwrap()
            .collect();
        assert_eq!(dates.len(), 3);
    }

    #[test]
    fn window_before_start_is_empty() {
        let r = rule(Frequency::Daily, 1, date(2023, 5, 1));
        let dates: Vec<_> = r
            .occurrences(date(2023, 1, 1), date(2023, 1, 31))
            .unwrap()
            .collect();
        assert!(dates.is_empty());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let r = rule(Frequency::Daily, 0, date(2023, 1, 1));
        let err = r
            .occurrences(date(2023, 1, 1), date(2023, 1, 31))
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::InvalidRecurrence("interval must be >= 1".to_string())
        );
    }

    #[test]
    fn interval_beyond_storage_range_is_rejected() {
        let r = rule(Frequency::Daily, (i32::MAX as u32) + 1, date(2023, 1, 1));
        assert_eq!(
            r.validate().unwrap_err(),
            EngineError::InvalidRecurrence("interval too large".to_string())
        );
    }

    #[test]
    fn max_occurrences_beyond_storage_range_is_rejected() {
        let r = RecurrenceRule {
            frequency: Frequency::Daily,
            interval: 1,
            start: date(2023, 1, 1),
            end: None,
            max_occurrences: Some((i32::MAX as u32) + 1),
        };
        assert_eq!(
            r.validate().unwrap_err(),
            EngineError::InvalidRecurrence("max_occurrences too large".to_string())
        );
    }

    #[test]
    fn inverted_window_is_rejected() {
        let r = rule(Frequency::Daily, 1, date(2023, 1, 1));
        let err = r
            .occurrences(date(2023, 2, 1), date(2023, 1, 1))
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::InvalidRecurrence("window end before window start".to_string())
        );
    }

    #[test]
    fn end_before_start_is_rejected() {
        let r = RecurrenceRule {
            frequency: Frequency::Monthly,
            interval: 1,
            start: date(2023, 5, 1),
            end: Some(date(2023, 4, 1)),
            max_occurrences: None,
        };
        assert_eq!(
            r.validate().unwrap_err(),
            EngineError::InvalidRecurrence("end date before start date".to_string())
        );
    }
}
