use chrono::NaiveDate;
use proptest::prelude::*;

/// Strategy for generating valid SQL identifiers (schema and table names)
pub fn identifier_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z_][a-zA-Z0-9_]{0,62}"
}

/// Strategy for generating schema-qualified table names
pub fn qualified_name_strategy() -> impl Strategy<Value = String> {
    (identifier_strategy(), identifier_strategy()).prop_map(|(schema, table)| format!("{schema}.{table}"))
}

/// Strategy for generating (source, inserted) row count pairs with inserted <= source
pub fn row_count_pair_strategy() -> impl Strategy<Value = (i64, i64)> {
    (0i64..=5_000_000).prop_flat_map(|source| (Just(source), 0i64..=source))
}

/// Strategy for generating calendar dates across the warehouse's active range
pub fn date_strategy() -> impl Strategy<Value = NaiveDate> {
    (2000i32..2035, 1u32..=12, 1u32..=28)
        .prop_map(|(year, month, day)| NaiveDate::from_ymd_opt(year, month, day).unwrap())
}

/// Strategy for generating one line of a properties overlay
pub fn properties_line_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        // well-formed entries
        (identifier_strategy(), "[a-zA-Z0-9 ./:-]{0,30}")
            .prop_map(|(key, value)| format!("{key}={value}")),
        // comments
        "[a-zA-Z0-9 =]{0,40}".prop_map(|text| format!("# {text}")),
        // blank and whitespace-only lines
        Just(String::new()),
        Just("   ".to_string()),
        // junk without a separator
        "[a-zA-Z0-9 ]{1,40}",
    ]
}

/// Strategy for generating a whole properties overlay body
pub fn properties_content_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(properties_line_strategy(), 0..25).prop_map(|lines| lines.join("\n"))
}
