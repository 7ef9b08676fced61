use chrono::NaiveDate;
use proptest::prelude::*;

use crewdeck_api::recurrence::{
    format_rule, generate_occurrences, parse_rule, Frequency, RecurrenceRule, DEFAULT_COUNT_CAP,
};

fn arb_frequency() -> impl Strategy<Value = Frequency> {
    prop_oneof![
        Just(Frequency::Daily),
        Just(Frequency::Weekly),
        Just(Frequency::Monthly),
    ]
}

fn arb_start() -> impl Strategy<Value = NaiveDate> {
    // Any day in a ~30 year window.
    (2000i32..2030, 1u32..=12, 1u32..=28)
        .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap())
}

proptest! {
    #[test]
    fn formatted_rules_parse_back_unchanged(
        freq in arb_frequency(),
        interval in 1u32..=6,
        count in proptest::option::of(1u32..=200),
    ) {
        let mut rule = RecurrenceRule::new(freq);
        rule.interval = interval;
        rule.count = count;

        let text = format_rule(&rule);
        let parsed = parse_rule(&text).expect("formatted rule must parse");
        prop_assert_eq!(parsed, rule);
    }

    #[test]
    fn occurrence_count_respects_count_and_cap(
        freq in arb_frequency(),
        interval in 1u32..=4,
        count in 1u32..=200,
        start in arb_start(),
    ) {
        let mut rule = RecurrenceRule::new(freq);
        rule.interval = interval;
        rule.count = Some(count);

        let occurrences = generate_occurrences(start, &rule);
        let expected = count.min(DEFAULT_COUNT_CAP) as usize;
        prop_assert_eq!(occurrences.len(), expected);
    }

    #[test]
    fn occurrences_start_at_start_and_strictly_increase(
        freq in arb_frequency(),
        interval in 1u32..=4,
        count in 2u32..=50,
        start in arb_start(),
    ) {
        let mut rule = RecurrenceRule::new(freq);
        rule.interval = interval;
        rule.count = Some(count);

        let occurrences = generate_occurrences(start, &rule);
        prop_assert_eq!(occurrences[0], start);
        for pair in occurrences.windows(2) {
            prop_assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn until_bounds_every_occurrence(
        interval in 1u32..=3,
        horizon_days in 1i64..=120,
        start in arb_start(),
    ) {
        let until = start + chrono::Duration::days(horizon_days);
        let mut rule = RecurrenceRule::new(Frequency::Daily);
        rule.interval = interval;
        rule.until = Some(until);

        let occurrences = generate_occurrences(start, &rule);
        prop_assert!(!occurrences.is_empty());
        for d in &occurrences {
            prop_assert!(*d <= until);
        }
    }
}
