use serde_json::{Value as JsonValue, json};

/// Synthesized default values for newly created entities, keyed by entity
/// type name. Types without an entry synthesize nothing; their scalar
/// properties start absent.
#[must_use]
pub(crate) fn for_type(entity_type: &str) -> Vec<(&'static str, JsonValue)> {
    match entity_type {
        "dataElement" => vec![
            ("aggregationType", json!("SUM")),
            ("domainType", json!("AGGREGATE")),
            ("valueType", json!("INTEGER")),
        ],
        "dataSet" => vec![
            ("periodType", json!("Monthly")),
        ],
        "category" | "categoryCombo" => vec![
            ("dataDimensionType", json!("DISAGGREGATION")),
        ],
        _ => Vec::new(),
    }
}
