//! Property tests for parsing, request building and merging.

use chrono::{NaiveDate, NaiveDateTime};
use enricher_core::*;
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn arb_timestamp() -> impl Strategy<Value = NaiveDateTime> {
    (1970i32..2100, 1u32..=12, 1u32..=28).prop_map(|(y, m, d)| {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .expect("day 1..=28 exists in every month")
    })
}

fn arb_points(max: usize) -> impl Strategy<Value = Vec<TimePoint>> {
    prop::collection::vec(
        (arb_timestamp(), -1.0e9f64..1.0e9f64).prop_map(|(ts, v)| TimePoint::new(ts, v)),
        1..max,
    )
}

fn arb_format() -> impl Strategy<Value = TimestampFormat> {
    prop_oneof![
        Just(TimestampFormat::DayMonthYear),
        Just(TimestampFormat::Iso8601),
        Just(TimestampFormat::Pattern("%Y/%m/%d".into())),
    ]
}

fn result_with_flags(flags: &[bool]) -> DetectionResult {
    let n = flags.len();
    DetectionResult {
        expected_values: (0..n).map(|i| i as f64).collect(),
        is_anomaly: flags.to_vec(),
        is_negative_anomaly: vec![false; n],
        is_positive_anomaly: flags.to_vec(),
        lower_margins: vec![0.0; n],
        upper_margins: vec![0.0; n],
        period: 0,
    }
}

fn series_of(points: Vec<TimePoint>, format: TimestampFormat) -> TimeSeries {
    TimeSeries::from_points("date", "value", format, points).expect("non-empty points")
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn flat_output_parses_back_to_same_points(points in arb_points(40), format in arb_format()) {
        let series = series_of(points.clone(), format.clone());
        let flags = vec![false; points.len()];
        let enriched = merge(series, result_with_flags(&flags)).unwrap();
        let table = render_flat(&enriched, &OutputFormat::default()).unwrap();

        let input = InputFormat {
            delimiter: ';',
            timestamp_column: "date".into(),
            value_column: "value".into(),
            timestamp_format: format,
        };
        let reparsed = parse(table.as_bytes(), &input).unwrap();
        let reparsed: Vec<TimePoint> = reparsed.points().copied().collect();
        prop_assert_eq!(reparsed, points);
    }

    #[test]
    fn merge_keeps_every_record_in_order(
        points in arb_points(60),
        seed in prop::collection::vec(any::<bool>(), 60),
    ) {
        let flags: Vec<bool> = seed.into_iter().take(points.len()).collect();
        let series = series_of(points.clone(), TimestampFormat::DayMonthYear);
        let enriched = merge(series, result_with_flags(&flags)).unwrap();

        prop_assert_eq!(enriched.len(), points.len());
        for (record, point) in enriched.records().iter().zip(&points) {
            prop_assert_eq!(&record.point, point);
        }
        prop_assert_eq!(enriched.summary().any_anomaly, flags.iter().any(|f| *f));
        prop_assert_eq!(
            enriched.summary().anomalous_timestamps.len(),
            flags.iter().filter(|f| **f).count()
        );
    }

    #[test]
    fn merge_rejects_any_length_mismatch(
        points in arb_points(30),
        field in 0usize..6,
        delta in prop_oneof![Just(-1i64), 1i64..4],
    ) {
        let n = points.len();
        let series = series_of(points, TimestampFormat::Iso8601);
        let mut result = result_with_flags(&vec![false; n]);
        let wrong = (n as i64 + delta).max(0) as usize;
        match field {
            0 => result.expected_values.resize(wrong, 0.0),
            1 => result.is_anomaly.resize(wrong, false),
            2 => result.is_negative_anomaly.resize(wrong, false),
            3 => result.is_positive_anomaly.resize(wrong, false),
            4 => result.lower_margins.resize(wrong, 0.0),
            _ => result.upper_margins.resize(wrong, 0.0),
        }

        let is_length_mismatch = matches!(
            merge(series, result),
            Err(MergeError::LengthMismatch { expected, actual, .. }) if expected == n && actual == wrong
        );
        prop_assert!(is_length_mismatch);
    }

    #[test]
    fn unknown_granularities_are_rejected(name in "[A-Za-z ]{0,12}") {
        prop_assume!(!Granularity::allowed().iter().any(|g| *g == name));
        let series = series_of(
            vec![TimePoint::new(NaiveDate::from_ymd_opt(2023, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap(), 1.0)],
            TimestampFormat::DayMonthYear,
        );
        let params = DetectionParameters { granularity: name, ..Default::default() };
        let is_invalid_granularity = matches!(
            build(&series, &params),
            Err(ValidationError::InvalidGranularity { .. })
        );
        prop_assert!(is_invalid_granularity);
    }

    #[test]
    fn sensitivity_accepted_only_in_range(sensitivity in -500i32..500) {
        let params = DetectionParameters { sensitivity, ..Default::default() };
        prop_assert_eq!(params.validate().is_ok(), (0..=100).contains(&sensitivity));
    }
}
