//! Property tests for query plan construction

use proptest::prelude::*;
use proyo_core::{CommandRequest, QueryBuilder, QueryPlan, QuerySpec};
use regex::Regex;
use serde_json::json;

fn hostile_text_strategy() -> impl Strategy<Value = String> {
    // Every generated value carries characters that must never reach query text.
    ("[a-zA-Z0-9 ._@-]{0,20}", "['\";]{1,3}", "[a-zA-Z0-9 ()=-]{0,20}")
        .prop_map(|(head, poison, tail)| format!("{}{}{}", head, poison, tail))
}

fn command_strategy() -> impl Strategy<Value = String> {
    prop_oneof![Just("1"), Just("2"), Just("3"), Just("4")].prop_map(str::to_string)
}

fn unknown_command_strategy() -> impl Strategy<Value = String> {
    // Padded codes such as " 4" are unknown too.
    "[0-9a-z ]{0,3}".prop_filter("known codes excluded", |s| {
        !matches!(s.as_str(), "1" | "2" | "3" | "4")
    })
}

/// Text is fixed SQL: quoted identifiers only, no literals, no statement breaks.
fn assert_text_is_structural(spec: &QuerySpec) -> Result<(), TestCaseError> {
    prop_assert!(!spec.text.contains('\''), "literal in {}", spec.text);
    prop_assert!(!spec.text.contains(';'), "statement break in {}", spec.text);

    let quoted = Regex::new(r#""([^"]*)""#).map_err(|e| TestCaseError::fail(e.to_string()))?;
    let ident = Regex::new(r"^[A-Za-z0-9_]{1,63}$").map_err(|e| TestCaseError::fail(e.to_string()))?;
    for capture in quoted.captures_iter(&spec.text) {
        prop_assert!(ident.is_match(&capture[1]), "bad identifier {}", &capture[1]);
    }

    let placeholders = Regex::new(r"\$(\d+)").map_err(|e| TestCaseError::fail(e.to_string()))?;
    let highest = placeholders
        .captures_iter(&spec.text)
        .filter_map(|c| c[1].parse::<usize>().ok())
        .max()
        .unwrap_or(0);
    prop_assert_eq!(highest, spec.parameters.len());
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Request values flow only through bound parameters, never into text.
    #[test]
    fn prop_values_never_reach_query_text(
        cmd in command_strategy(),
        user in hostile_text_strategy(),
        id in hostile_text_strategy(),
        mail in hostile_text_strategy(),
        class in prop_oneof![Just("8".to_string()), hostile_text_strategy()],
        complete in any::<bool>(),
    ) {
        let request = CommandRequest::from_payload(json!({
            "cmd": cmd,
            "user": user,
            "mail": mail,
            "id": id,
            "class": class,
            "isComplete": complete,
        }))
        .map_err(|e| TestCaseError::fail(e.to_string()))?;

        let plan = QueryBuilder::default().build(&request);
        for spec in plan.specs() {
            assert_text_is_structural(spec)?;
        }
    }

    /// Same request, same plan.
    #[test]
    fn prop_build_is_deterministic(
        cmd in command_strategy(),
        user in "[a-z0-9@.]{1,20}",
        id in "[a-z0-9]{1,10}",
    ) {
        let request = CommandRequest::from_payload(json!({
            "cmd": cmd, "user": user, "id": id, "class": "5"
        }))
        .map_err(|e| TestCaseError::fail(e.to_string()))?;

        let builder = QueryBuilder::default();
        prop_assert_eq!(builder.build(&request), builder.build(&request));
    }

    /// Unknown codes never produce a query.
    #[test]
    fn prop_unknown_commands_are_unsupported(cmd in unknown_command_strategy()) {
        let request = CommandRequest::from_payload(json!({
            "cmd": cmd, "user": "u", "class": "8", "id": "a"
        }))
        .map_err(|e| TestCaseError::fail(e.to_string()))?;

        let plan = QueryBuilder::default().build(&request);
        let is_unsupported = matches!(plan, QueryPlan::Unsupported { .. });
        prop_assert!(is_unsupported);
        prop_assert!(plan.specs().is_empty());
    }
}
