//! Abroad-period merging.
//!
//! Each dated visit is an inclusive interval from its effective date to its
//! end date (a single day when no end is recorded). Intervals that overlap or
//! sit next to each other are merged into maximal abroad periods.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::dates::{days_between, inclusive_days};
use crate::{StatsConfig, VisitRecord};

/// A maximal stretch of continuous time away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbroadPeriod {
    pub start: NaiveDate,
    /// Inclusive
    pub end: NaiveDate,
}

impl AbroadPeriod {
    /// Inclusive day count.
    pub fn days(&self) -> u32 {
        inclusive_days(self.start, self.end)
    }

    /// True when `date` falls inside the period, ends included.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Merge every dated visit into abroad periods, ascending by start.
pub fn merge_periods(visits: &[VisitRecord], config: &StatsConfig) -> Vec<AbroadPeriod> {
    let mut intervals: Vec<AbroadPeriod> = visits
        .iter()
        .filter_map(|v| {
            Some(AbroadPeriod {
                start: v.effective_date()?,
                end: v.effective_end()?,
            })
        })
        .collect();
    intervals.sort_by_key(|p| p.start);

    let mut merged = Vec::new();
    let mut iter = intervals.into_iter();
    let Some(mut current) = iter.next() else {
        return merged;
    };

    for interval in iter {
        let gap = days_between(interval.start, current.end);
        if gap <= config.adjacency_gap_days {
            current.end = current.end.max(interval.end);
        } else {
            merged.push(current);
            current = interval;
        }
    }
    merged.push(current);

    merged
}

/// Interval-derived statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalStats {
    pub periods: Vec<AbroadPeriod>,
    /// Longest merged period, inclusive days
    pub longest_continuous_days: u32,
    /// Days into the open period containing `today`, else 0
    pub currently_abroad_days: u32,
}

/// Longest merged period in days; 0 when there are none.
pub fn longest_continuous_days(periods: &[AbroadPeriod]) -> u32 {
    periods.iter().map(AbroadPeriod::days).max().unwrap_or(0)
}

/// Days spent so far in the last period if `today` falls within it.
pub fn currently_abroad_days(periods: &[AbroadPeriod], today: NaiveDate) -> u32 {
    match periods.last() {
        Some(last) if last.contains(today) => inclusive_days(last.start, today),
        _ => 0,
    }
}

/// Merge periods and derive the headline values for `today`.
pub fn interval_stats(
    visits: &[VisitRecord],
    today: NaiveDate,
    config: &StatsConfig,
) -> IntervalStats {
    let periods = merge_periods(visits, config);
    IntervalStats {
        longest_continuous_days: longest_continuous_days(&periods),
        currently_abroad_days: currently_abroad_days(&periods, today),
        periods,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn span(id: &str, start: &str, end: &str) -> VisitRecord {
        VisitRecord::new(id, "FR").with_dates(start, Some(end))
    }

    fn today() -> NaiveDate {
        date(2030, 1, 1)
    }

    #[test]
    fn test_next_day_visits_merge() {
        let visits = vec![
            span("v1", "2023-01-01", "2023-01-05"),
            span("v2", "2023-01-06", "2023-01-10"),
        ];

        let periods = merge_periods(&visits, &StatsConfig::default());
        assert_eq!(periods.len(), 1);
        assert_eq!(periods[0].start, date(2023, 1, 1));
        assert_eq!(periods[0].end, date(2023, 1, 10));
        assert_eq!(periods[0].days(), 10);
    }

    #[test]
    fn test_gap_of_three_days_splits() {
        let visits = vec![
            span("v1", "2023-01-01", "2023-01-05"),
            span("v2", "2023-01-08", "2023-01-10"),
        ];

        let periods = merge_periods(&visits, &StatsConfig::default());
        assert_eq!(periods.len(), 2);
        assert_eq!(longest_continuous_days(&periods), 5);
    }

    #[test]
    fn test_overlap_and_containment() {
        let visits = vec![
            span("v1", "2023-03-01", "2023-03-20"),
            span("v2", "2023-03-05", "2023-03-10"),
            span("v3", "2023-03-15", "2023-03-25"),
        ];

        let periods = merge_periods(&visits, &StatsConfig::default());
        assert_eq!(
            periods,
            vec![AbroadPeriod {
                start: date(2023, 3, 1),
                end: date(2023, 3, 25),
            }]
        );
    }

    #[test]
    fn test_unsorted_input_and_single_day_visits() {
        let visits = vec![
            VisitRecord::new("v2", "IT").with_dates("2022-06-03", None),
            VisitRecord::new("v1", "FR").with_dates("2022-06-02", None),
            VisitRecord::new("v3", "ES").with_dates("2022-06-10", None),
        ];

        let periods = merge_periods(&visits, &StatsConfig::default());
        assert_eq!(periods.len(), 2);
        assert_eq!(periods[0].days(), 2);
        assert_eq!(periods[1].days(), 1);
    }

    #[test]
    fn test_inverted_range_treated_as_single_day() {
        let visits = vec![span("v1", "2023-05-10", "2023-05-01")];
        let stats = interval_stats(&visits, today(), &StatsConfig::default());
        assert_eq!(stats.periods.len(), 1);
        assert_eq!(stats.longest_continuous_days, 1);
    }

    #[test]
    fn test_undated_visits_ignored() {
        let visits = vec![
            VisitRecord::new("v1", "FR").with_days(12),
            span("v2", "2023-05-01", "2023-05-03"),
        ];
        let stats = interval_stats(&visits, today(), &StatsConfig::default());
        assert_eq!(stats.periods.len(), 1);
        assert_eq!(stats.longest_continuous_days, 3);
    }

    #[test]
    fn test_currently_abroad() {
        let visits = vec![
            span("v1", "2020-01-01", "2020-01-30"),
            span("v2", "2024-06-01", "2024-06-20"),
        ];
        let config = StatsConfig::default();

        let inside = interval_stats(&visits, date(2024, 6, 5), &config);
        assert_eq!(inside.currently_abroad_days, 5);

        let first_day = interval_stats(&visits, date(2024, 6, 1), &config);
        assert_eq!(first_day.currently_abroad_days, 1);

        let last_day = interval_stats(&visits, date(2024, 6, 20), &config);
        assert_eq!(last_day.currently_abroad_days, 20);

        let after = interval_stats(&visits, date(2024, 6, 21), &config);
        assert_eq!(after.currently_abroad_days, 0);

        // Only the last period counts
        let earlier = interval_stats(&visits, date(2020, 1, 10), &config);
        assert_eq!(earlier.currently_abroad_days, 0);
    }

    #[test]
    fn test_configurable_gap() {
        let visits = vec![
            span("v1", "2023-01-01", "2023-01-05"),
            span("v2", "2023-01-08", "2023-01-10"),
        ];
        let config = StatsConfig::default().with_adjacency_gap_days(3);
        assert_eq!(merge_periods(&visits, &config).len(), 1);

        let strict = StatsConfig::default().with_adjacency_gap_days(0);
        let adjacent = vec![
            span("v1", "2023-01-01", "2023-01-05"),
            span("v2", "2023-01-06", "2023-01-10"),
        ];
        assert_eq!(merge_periods(&adjacent, &strict).len(), 2);
    }

    #[test]
    fn test_empty_input() {
        let stats = interval_stats(&[], today(), &StatsConfig::default());
        assert_eq!(stats, IntervalStats::default());
    }

    #[test]
    fn test_adjacent_countries_form_one_period() {
        let visits = vec![
            VisitRecord::new("v1", "FR")
                .with_dates("2023-04-10", Some("2023-04-20"))
                .with_days(10),
            VisitRecord::new("v2", "IT")
                .with_dates("2023-04-21", Some("2023-04-25"))
                .with_days(4),
        ];
        let stats = interval_stats(&visits, today(), &StatsConfig::default());
        assert_eq!(stats.periods.len(), 1);
        assert_eq!(stats.longest_continuous_days, 16);
    }
}
