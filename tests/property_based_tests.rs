mod common;

use common::strategies::*;
use proptest::prelude::*;

use edw_batch::config::AppConfig;
use edw_batch::constants::system;
use edw_batch::context::parse_properties;
use edw_batch::validation::{validate_identifier, validate_qualified_name};
use edw_batch::{job_names, RunContext};

fn test_context() -> RunContext {
    RunContext::new(
        job_names::CONSUMPTION_SUBSCRIPTION_DETAIL,
        &AppConfig::default(),
        "dev",
    )
}

proptest! {
    /// Property: recorded counts always balance, src = ins + err
    #[test]
    fn recorded_counts_always_balance((source, inserted) in row_count_pair_strategy()) {
        let mut ctx = test_context();
        ctx.record_counts(source, inserted);

        prop_assert_eq!(ctx.counts.src_rec_qty, source);
        prop_assert_eq!(ctx.counts.ins_rec_qty, inserted);
        prop_assert_eq!(ctx.counts.err_rec_qty, source - inserted);
        prop_assert_eq!(
            ctx.counts.src_rec_qty,
            ctx.counts.ins_rec_qty + ctx.counts.err_rec_qty
        );
        prop_assert!(ctx.counts.err_rec_qty >= 0);
    }

    /// Property: generated identifiers pass the SQL interpolation guard
    #[test]
    fn generated_identifiers_pass_validation(name in identifier_strategy()) {
        prop_assert!(validate_identifier(&name).is_ok());
    }

    /// Property: schema-qualified names pass the two-part guard
    #[test]
    fn generated_qualified_names_pass_validation(name in qualified_name_strategy()) {
        prop_assert!(validate_qualified_name(&name).is_ok());
    }

    /// Property: identifiers with SQL metacharacters are always rejected
    #[test]
    fn corrupted_identifiers_are_rejected(
        name in identifier_strategy(),
        suffix in prop_oneof![
            Just(";"),
            Just(" "),
            Just("'"),
            Just("\""),
            Just("-"),
            Just("."),
        ],
    ) {
        let corrupted = format!("{name}{suffix}");
        prop_assert!(validate_identifier(&corrupted).is_err());
    }

    /// Property: overlay date keys round-trip into the resolved window
    #[test]
    fn overlay_dates_round_trip(from in date_strategy(), to in date_strategy()) {
        let mut ctx = test_context();
        ctx.apply_entry("from_dt", &from.format(system::DATE_FORMAT).to_string())
            .unwrap();
        ctx.apply_entry("to_dt", &to.format(system::DATE_FORMAT).to_string())
            .unwrap();

        let (resolved_from, resolved_to) = ctx.resolved_window().unwrap();
        prop_assert_eq!(resolved_from, from);
        prop_assert_eq!(resolved_to, to);
    }

    /// Property: exec timestamps round-trip through the overlay format
    #[test]
    fn overlay_timestamps_round_trip(
        date in date_strategy(),
        hour in 0u32..24,
        minute in 0u32..60,
        second in 0u32..60,
    ) {
        let ts = date.and_hms_opt(hour, minute, second).unwrap();
        let mut ctx = test_context();
        ctx.apply_entry(
            "pc_start_exec_ts",
            &ts.format(system::EXEC_TIMESTAMP_FORMAT).to_string(),
        )
        .unwrap();

        prop_assert_eq!(ctx.window.start_exec_ts, ts);
    }

    /// Property: properties parsing is total and yields trimmed entries
    #[test]
    fn properties_parsing_is_total(content in properties_content_strategy()) {
        let entries = parse_properties(&content);
        for (key, value) in entries {
            prop_assert_eq!(key.trim(), key.as_str());
            prop_assert_eq!(value.trim(), value.as_str());
            prop_assert!(!key.starts_with('#'));
        }
    }
}

#[cfg(test)]
mod count_invariants {
    use super::*;
    use edw_batch::{FlowPath, ProcessStatus};

    #[test]
    fn test_partial_load_counts_as_errors() {
        let mut ctx = test_context();
        ctx.record_counts(100, 97);

        assert_eq!(ctx.counts.src_rec_qty, 100);
        assert_eq!(ctx.counts.ins_rec_qty, 97);
        assert_eq!(ctx.counts.err_rec_qty, 3);
    }

    #[test]
    fn test_full_load_has_no_errors() {
        let mut ctx = test_context();
        ctx.record_counts(42, 42);
        assert_eq!(ctx.counts.err_rec_qty, 0);
    }

    #[test]
    fn test_flow_path_only_recognizes_trip() {
        assert_eq!(FlowPath::from_value("TRIP"), FlowPath::Trip);
        assert_eq!(FlowPath::from_value("CONSUMPTION"), FlowPath::Consumption);
        assert_eq!(FlowPath::from_value("trip"), FlowPath::Consumption);
        assert_eq!(FlowPath::from_value(""), FlowPath::Consumption);
    }

    #[test]
    fn test_process_status_round_trips() {
        for status in [
            ProcessStatus::InProgress,
            ProcessStatus::Complete,
            ProcessStatus::Error,
        ] {
            let parsed: ProcessStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
        assert!(!ProcessStatus::InProgress.is_terminal());
        assert!(ProcessStatus::Complete.is_terminal());
        assert!(ProcessStatus::Error.is_error());
    }
}
