//! Recurrence rule parsing and expansion.
//!
//! Rules use an iCalendar-subset text form: semicolon-delimited `KEY=VALUE`
//! pairs, e.g. `FREQ=WEEKLY;INTERVAL=2;BYDAY=MO,WE,FR;COUNT=10`. Supported
//! keys are FREQ, INTERVAL, BYDAY, COUNT and UNTIL (YYYYMMDD).
//!
//! This is the only recurrence engine in the system; the simpler pattern
//! names accepted by the booking API (`daily`, `weekly`, `biweekly`,
//! `monthly`) are converted into a [`RecurrenceRule`] before storage.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{Display, EnumString};
use tracing::debug;

/// Hard cap on generated occurrences; also the default when COUNT is absent.
pub const DEFAULT_COUNT_CAP: u32 = 100;

/// Hard cap on the calendar horizon of the weekly-with-weekdays expansion,
/// measured in weeks from the start date regardless of INTERVAL.
pub const MAX_WEEKS: u32 = 520;

/// Largest INTERVAL accepted by the parser. Anything bigger is a parse
/// failure, which callers treat the same as an unparseable rule.
pub const MAX_INTERVAL: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

/// Legacy pattern names accepted by the booking API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SimplePattern {
    Daily,
    Weekly,
    Biweekly,
    Monthly,
}

impl SimplePattern {
    /// Normalize a legacy pattern into a full recurrence rule.
    pub fn to_rule(self, count: Option<u32>) -> RecurrenceRule {
        let (freq, interval) = match self {
            SimplePattern::Daily => (Frequency::Daily, 1),
            SimplePattern::Weekly => (Frequency::Weekly, 1),
            SimplePattern::Biweekly => (Frequency::Weekly, 2),
            SimplePattern::Monthly => (Frequency::Monthly, 1),
        };
        RecurrenceRule {
            freq,
            interval,
            by_day: Vec::new(),
            count,
            until: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceRule {
    pub freq: Frequency,
    /// Stride between occurrences in units of `freq`; always >= 1.
    pub interval: u32,
    /// Weekday filter, only meaningful for weekly rules.
    pub by_day: Vec<Weekday>,
    pub count: Option<u32>,
    pub until: Option<NaiveDate>,
}

impl RecurrenceRule {
    pub fn new(freq: Frequency) -> Self {
        Self {
            freq,
            interval: 1,
            by_day: Vec::new(),
            count: None,
            until: None,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RecurrenceParseError {
    #[error("empty rule")]
    Empty,
    #[error("rule has no FREQ")]
    MissingFreq,
    #[error("malformed pair: {0}")]
    MalformedPair(String),
    #[error("unknown key: {0}")]
    UnknownKey(String),
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

fn parse_weekday(code: &str) -> Option<Weekday> {
    match code {
        "MO" => Some(Weekday::Mon),
        "TU" => Some(Weekday::Tue),
        "WE" => Some(Weekday::Wed),
        "TH" => Some(Weekday::Thu),
        "FR" => Some(Weekday::Fri),
        "SA" => Some(Weekday::Sat),
        "SU" => Some(Weekday::Sun),
        _ => None,
    }
}

fn weekday_code(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

/// Parse an iCalendar-subset rule string.
pub fn parse_rule(input: &str) -> Result<RecurrenceRule, RecurrenceParseError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(RecurrenceParseError::Empty);
    }

    let mut freq: Option<Frequency> = None;
    let mut interval: u32 = 1;
    let mut by_day: Vec<Weekday> = Vec::new();
    let mut count: Option<u32> = None;
    let mut until: Option<NaiveDate> = None;

    for pair in input.split(';') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| RecurrenceParseError::MalformedPair(pair.to_string()))?;
        let invalid = |key: &str, value: &str| RecurrenceParseError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };

        match key {
            "FREQ" => {
                freq = Some(Frequency::from_str(value).map_err(|_| invalid(key, value))?);
            }
            "INTERVAL" => {
                let parsed: u32 = value.parse().map_err(|_| invalid(key, value))?;
                if parsed == 0 || parsed > MAX_INTERVAL {
                    return Err(invalid(key, value));
                }
                interval = parsed;
            }
            "BYDAY" => {
                by_day = value
                    .split(',')
                    .map(|code| parse_weekday(code.trim()).ok_or_else(|| invalid(key, value)))
                    .collect::<Result<Vec<_>, _>>()?;
                if by_day.is_empty() {
                    return Err(invalid(key, value));
                }
            }
            "COUNT" => {
                let parsed: u32 = value.parse().map_err(|_| invalid(key, value))?;
                if parsed == 0 {
                    return Err(invalid(key, value));
                }
                count = Some(parsed);
            }
            "UNTIL" => {
                until = Some(
                    NaiveDate::parse_from_str(value, "%Y%m%d").map_err(|_| invalid(key, value))?,
                );
            }
            other => return Err(RecurrenceParseError::UnknownKey(other.to_string())),
        }
    }

    let freq = freq.ok_or(RecurrenceParseError::MissingFreq)?;
    Ok(RecurrenceRule {
        freq,
        interval,
        by_day,
        count,
        until,
    })
}

/// Format a rule back into its text form. `INTERVAL=` is omitted when the
/// interval equals the parse default of 1, so `parse(format(r)) == r`.
pub fn format_rule(rule: &RecurrenceRule) -> String {
    let mut parts = vec![format!("FREQ={}", rule.freq)];
    if rule.interval != 1 {
        parts.push(format!("INTERVAL={}", rule.interval));
    }
    if !rule.by_day.is_empty() {
        let days: Vec<&str> = rule.by_day.iter().map(|d| weekday_code(*d)).collect();
        parts.push(format!("BYDAY={}", days.join(",")));
    }
    if let Some(count) = rule.count {
        parts.push(format!("COUNT={}", count));
    }
    if let Some(until) = rule.until {
        parts.push(format!("UNTIL={}", until.format("%Y%m%d")));
    }
    parts.join(";")
}

fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        _ => {
            let leap = (year % 4 == 0 && year % 100 != 0) || year % 400 == 0;
            if leap {
                29
            } else {
                28
            }
        }
    }
}

/// Month arithmetic with day-of-month clamping. `None` when the result
/// falls outside chrono's representable date range.
fn add_months(date: NaiveDate, months: i64) -> Option<NaiveDate> {
    let zero_based = date.year() as i64 * 12 + date.month0() as i64 + months;
    let year = i32::try_from(zero_based.div_euclid(12)).ok()?;
    let month = zero_based.rem_euclid(12) as u32 + 1;
    let day = date.day().min(days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Expand a rule into an ordered, finite list of occurrence dates starting at
/// (and including, when it matches) `start`.
///
/// Total for every rule: expansion stops early when the next date would fall
/// outside chrono's representable range, so handwritten rules with extreme
/// intervals or start dates near the range limit cannot panic.
pub fn generate_occurrences(start: NaiveDate, rule: &RecurrenceRule) -> Vec<NaiveDate> {
    let cap = rule.count.unwrap_or(DEFAULT_COUNT_CAP).min(DEFAULT_COUNT_CAP) as usize;
    let mut out = Vec::new();

    if rule.freq == Frequency::Weekly && !rule.by_day.is_empty() {
        // Week-by-week scan: emit every matching weekday inside each
        // interval-selected week. The horizon is MAX_WEEKS calendar weeks
        // from the start, so a large interval shrinks the stride count
        // instead of stretching the horizon.
        let to_monday = Duration::days(start.weekday().num_days_from_monday() as i64);
        let Some(week_start) = start.checked_sub_signed(to_monday) else {
            return out;
        };
        let stride = rule.interval.max(1) as usize;
        'weeks: for week in (0..MAX_WEEKS).step_by(stride) {
            let Some(base) = week_start.checked_add_signed(Duration::weeks(week as i64)) else {
                break;
            };
            for offset in 0..7 {
                let Some(date) = base.checked_add_signed(Duration::days(offset)) else {
                    break 'weeks;
                };
                if date < start || !rule.by_day.contains(&date.weekday()) {
                    continue;
                }
                if let Some(until) = rule.until {
                    if date > until {
                        break 'weeks;
                    }
                }
                out.push(date);
                if out.len() >= cap {
                    break 'weeks;
                }
            }
        }
        return out;
    }

    // Stride from the start date each step so monthly day-of-month clamping
    // does not accumulate (Jan 31 -> Feb 28 -> Mar 31).
    let mut step: u32 = 0;
    while out.len() < cap {
        let units = step as i64 * rule.interval as i64;
        let date = match rule.freq {
            Frequency::Daily => Duration::try_days(units)
                .and_then(|d| start.checked_add_signed(d)),
            Frequency::Weekly => Duration::try_weeks(units)
                .and_then(|d| start.checked_add_signed(d)),
            Frequency::Monthly => add_months(start, units),
            Frequency::Yearly => add_months(start, units * 12),
        };
        let Some(date) = date else { break };
        if let Some(until) = rule.until {
            if date > until {
                break;
            }
        }
        out.push(date);
        step += 1;
    }
    out
}

/// Expand a stored rule string, degrading to a single occurrence on any
/// parse failure. Callers treat a bad rule as "no recurrence".
pub fn expand_or_single(start: NaiveDate, rule: Option<&str>) -> Vec<NaiveDate> {
    match rule {
        None => vec![start],
        Some(text) => match parse_rule(text) {
            Ok(rule) => generate_occurrences(start, &rule),
            Err(err) => {
                debug!(rule = text, error = %err, "unparseable recurrence rule, treating as single occurrence");
                vec![start]
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_a_full_rule() {
        let rule = parse_rule("FREQ=WEEKLY;INTERVAL=2;BYDAY=MO,WE,FR;COUNT=10").unwrap();
        assert_eq!(rule.freq, Frequency::Weekly);
        assert_eq!(rule.interval, 2);
        assert_eq!(
            rule.by_day,
            vec![Weekday::Mon, Weekday::Wed, Weekday::Fri]
        );
        assert_eq!(rule.count, Some(10));
        assert_eq!(rule.until, None);
    }

    #[test]
    fn parses_until_dates() {
        let rule = parse_rule("FREQ=DAILY;UNTIL=20250630").unwrap();
        assert_eq!(rule.until, Some(date(2025, 6, 30)));
    }

    #[test_case("" => matches Err(RecurrenceParseError::Empty); "empty string")]
    #[test_case("INTERVAL=2" => matches Err(RecurrenceParseError::MissingFreq); "no freq")]
    #[test_case("FREQ=HOURLY" => matches Err(RecurrenceParseError::InvalidValue { .. }); "bad freq")]
    #[test_case("FREQ=DAILY;INTERVAL=0" => matches Err(RecurrenceParseError::InvalidValue { .. }); "zero interval")]
    #[test_case("FREQ=DAILY;INTERVAL=4294967295" => matches Err(RecurrenceParseError::InvalidValue { .. }); "oversized interval")]
    #[test_case("FREQ=WEEKLY;INTERVAL=3000000000;BYDAY=MO" => matches Err(RecurrenceParseError::InvalidValue { .. }); "oversized weekly interval")]
    #[test_case("FREQ=DAILY;COUNT=zero" => matches Err(RecurrenceParseError::InvalidValue { .. }); "bad count")]
    #[test_case("FREQ=WEEKLY;BYDAY=XX" => matches Err(RecurrenceParseError::InvalidValue { .. }); "bad weekday")]
    #[test_case("FREQ=DAILY;WKST=MO" => matches Err(RecurrenceParseError::UnknownKey(_)); "unknown key")]
    #[test_case("FREQ" => matches Err(RecurrenceParseError::MalformedPair(_)); "no equals")]
    fn rejects_invalid_rules(input: &str) -> Result<RecurrenceRule, RecurrenceParseError> {
        parse_rule(input)
    }

    #[test]
    fn format_omits_default_interval() {
        let rule = parse_rule("FREQ=DAILY;COUNT=5").unwrap();
        assert_eq!(format_rule(&rule), "FREQ=DAILY;COUNT=5");

        let rule = parse_rule("FREQ=WEEKLY;INTERVAL=2").unwrap();
        assert_eq!(format_rule(&rule), "FREQ=WEEKLY;INTERVAL=2");
    }

    #[test]
    fn round_trips_through_format() {
        for text in [
            "FREQ=DAILY;COUNT=7",
            "FREQ=WEEKLY;INTERVAL=2;BYDAY=MO,WE,FR;COUNT=10",
            "FREQ=MONTHLY;UNTIL=20261231",
            "FREQ=YEARLY",
        ] {
            let rule = parse_rule(text).unwrap();
            assert_eq!(parse_rule(&format_rule(&rule)).unwrap(), rule);
        }
    }

    #[test]
    fn weekly_mo_we_fr_from_monday_gives_three_in_first_week() {
        // 2025-03-03 is a Monday.
        let start = date(2025, 3, 3);
        let rule = parse_rule("FREQ=WEEKLY;BYDAY=MO,WE,FR;COUNT=3").unwrap();
        let dates = generate_occurrences(start, &rule);
        assert_eq!(
            dates,
            vec![date(2025, 3, 3), date(2025, 3, 5), date(2025, 3, 7)]
        );
    }

    #[test]
    fn weekly_byday_skips_days_before_start() {
        // 2025-03-05 is a Wednesday; the Monday of that week must not appear.
        let start = date(2025, 3, 5);
        let rule = parse_rule("FREQ=WEEKLY;BYDAY=MO,WE;COUNT=3").unwrap();
        let dates = generate_occurrences(start, &rule);
        assert_eq!(
            dates,
            vec![date(2025, 3, 5), date(2025, 3, 10), date(2025, 3, 12)]
        );
    }

    #[test]
    fn biweekly_byday_honors_interval() {
        let start = date(2025, 3, 3); // Monday
        let rule = parse_rule("FREQ=WEEKLY;INTERVAL=2;BYDAY=MO;COUNT=3").unwrap();
        let dates = generate_occurrences(start, &rule);
        assert_eq!(
            dates,
            vec![date(2025, 3, 3), date(2025, 3, 17), date(2025, 3, 31)]
        );
    }

    #[test]
    fn count_bounds_the_output() {
        let rule = parse_rule("FREQ=DAILY;COUNT=4").unwrap();
        assert_eq!(generate_occurrences(date(2025, 1, 1), &rule).len(), 4);
    }

    #[test]
    fn until_bounds_the_output() {
        let rule = parse_rule("FREQ=DAILY;UNTIL=20250105").unwrap();
        let dates = generate_occurrences(date(2025, 1, 1), &rule);
        assert_eq!(dates.len(), 5);
        assert_eq!(*dates.last().unwrap(), date(2025, 1, 5));
    }

    #[test]
    fn missing_count_falls_back_to_safety_cap() {
        let rule = parse_rule("FREQ=DAILY").unwrap();
        assert_eq!(
            generate_occurrences(date(2025, 1, 1), &rule).len(),
            DEFAULT_COUNT_CAP as usize
        );
    }

    #[test]
    fn oversized_count_is_clamped_to_cap() {
        let rule = parse_rule("FREQ=DAILY;COUNT=5000").unwrap();
        assert_eq!(
            generate_occurrences(date(2025, 1, 1), &rule).len(),
            DEFAULT_COUNT_CAP as usize
        );
    }

    #[test]
    fn weekly_scan_never_exceeds_week_cap() {
        // A huge COUNT must still stop at the week cap.
        let rule = parse_rule("FREQ=WEEKLY;BYDAY=MO;COUNT=100000").unwrap();
        let dates = generate_occurrences(date(2025, 1, 6), &rule);
        assert!(dates.len() <= MAX_WEEKS as usize);
    }

    #[test]
    fn weekly_horizon_is_calendar_weeks_not_strides() {
        // INTERVAL=10: only 52 strides fit inside the 520-week horizon.
        let start = date(2025, 1, 6); // Monday
        let rule = parse_rule("FREQ=WEEKLY;INTERVAL=10;BYDAY=MO").unwrap();
        let dates = generate_occurrences(start, &rule);
        assert_eq!(dates.len(), 52);
        let horizon = start + Duration::weeks(MAX_WEEKS as i64);
        assert!(*dates.last().unwrap() <= horizon);
    }

    #[test]
    fn interval_at_the_parse_limit_still_expands() {
        let text = format!("FREQ=DAILY;INTERVAL={MAX_INTERVAL};COUNT=3");
        let rule = parse_rule(&text).unwrap();
        let dates = generate_occurrences(date(2025, 1, 1), &rule);
        assert_eq!(dates.len(), 3);
        assert_eq!(dates[1], date(2025, 1, 1) + Duration::days(MAX_INTERVAL as i64));
    }

    #[test]
    fn absurd_interval_degrades_to_single_occurrence() {
        // Rejected at parse time, so stored rules like these fall back to a
        // single occurrence instead of blowing up during expansion.
        let start = date(2025, 4, 1);
        for text in [
            "FREQ=DAILY;INTERVAL=4294967295;COUNT=3",
            "FREQ=WEEKLY;INTERVAL=3000000000;BYDAY=MO;COUNT=5",
        ] {
            assert_eq!(expand_or_single(start, Some(text)), vec![start]);
        }
    }

    #[test]
    fn expansion_is_total_for_handwritten_extreme_rules() {
        // Rules built in code bypass the parser; expansion must stop at the
        // edge of the representable date range instead of panicking.
        let mut rule = RecurrenceRule::new(Frequency::Daily);
        rule.interval = u32::MAX;
        rule.count = Some(3);
        assert_eq!(
            generate_occurrences(date(2025, 1, 1), &rule),
            vec![date(2025, 1, 1)]
        );

        let mut yearly = RecurrenceRule::new(Frequency::Yearly);
        yearly.count = Some(5);
        assert_eq!(
            generate_occurrences(NaiveDate::MAX, &yearly),
            vec![NaiveDate::MAX]
        );

        let mut weekly = RecurrenceRule::new(Frequency::Weekly);
        weekly.by_day = vec![NaiveDate::MAX.weekday()];
        weekly.count = Some(4);
        let dates = generate_occurrences(NaiveDate::MAX, &weekly);
        assert_eq!(dates, vec![NaiveDate::MAX]);
    }

    #[test]
    fn monthly_clamps_to_end_of_month_without_drift() {
        let rule = parse_rule("FREQ=MONTHLY;COUNT=3").unwrap();
        let dates = generate_occurrences(date(2025, 1, 31), &rule);
        assert_eq!(
            dates,
            vec![date(2025, 1, 31), date(2025, 2, 28), date(2025, 3, 31)]
        );
    }

    #[test]
    fn yearly_handles_leap_day() {
        let rule = parse_rule("FREQ=YEARLY;COUNT=2").unwrap();
        let dates = generate_occurrences(date(2024, 2, 29), &rule);
        assert_eq!(dates, vec![date(2024, 2, 29), date(2025, 2, 28)]);
    }

    #[test]
    fn bad_rule_degrades_to_single_occurrence() {
        let start = date(2025, 4, 1);
        assert_eq!(expand_or_single(start, Some("FREQ=NONSENSE")), vec![start]);
        assert_eq!(expand_or_single(start, None), vec![start]);
    }

    #[rstest::rstest]
    #[case(SimplePattern::Daily, Frequency::Daily, 1)]
    #[case(SimplePattern::Weekly, Frequency::Weekly, 1)]
    #[case(SimplePattern::Biweekly, Frequency::Weekly, 2)]
    #[case(SimplePattern::Monthly, Frequency::Monthly, 1)]
    fn simple_patterns_map_onto_rules(
        #[case] pattern: SimplePattern,
        #[case] freq: Frequency,
        #[case] interval: u32,
    ) {
        let rule = pattern.to_rule(Some(6));
        assert_eq!(rule.freq, freq);
        assert_eq!(rule.interval, interval);
        assert_eq!(rule.count, Some(6));
    }

    #[test]
    fn biweekly_pattern_expands_on_a_two_week_stride() {
        let rule = SimplePattern::Biweekly.to_rule(Some(6));
        let dates = generate_occurrences(date(2025, 3, 3), &rule);
        assert_eq!(dates.len(), 6);
        assert_eq!(dates[1], date(2025, 3, 17));
    }
}
