use serde_json::{json, Value};

/// How assembly-task ids are encoded in a Wildberries request body.
///
/// The `orders/status` and `orders/client` endpoints have rejected each of these shapes at
/// different points of the API's life, answering `IncorrectRequestBody` for the ones they
/// currently dislike. Instead of nesting catch blocks per shape, the ladder of encodings is an
/// explicit list tried in order; only a body-shape rejection advances to the next rung.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdEncoding {
    /// `{"orders": [123, 456]}` — the documented format; ids that do not parse as positive
    /// integers are dropped.
    Numeric,
    /// `{"orders": ["123", "456"]}`
    Text,
    /// `{"orders": [{"id": 123}, {"id": 456}]}` — ids that do not parse stay strings.
    Object,
}

/// Ladder for `orders/status`: numbers first (the documented format).
pub(crate) const STATUS_ENCODINGS: [IdEncoding; 3] = [IdEncoding::Numeric, IdEncoding::Text, IdEncoding::Object];

/// Ladder for `orders/client`, which historically preferred strings.
pub(crate) const CLIENT_INFO_ENCODINGS: [IdEncoding; 3] = [IdEncoding::Text, IdEncoding::Numeric, IdEncoding::Object];

/// Trims, de-duplicates and drops empty ids while preserving first-seen order.
pub(crate) fn unique_ids(ids: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    ids.iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

pub(crate) fn encode_order_ids(ids: &[String], encoding: IdEncoding) -> Value {
    let orders: Vec<Value> = match encoding {
        IdEncoding::Numeric => ids.iter().filter_map(|s| parse_positive(s)).map(Value::from).collect(),
        IdEncoding::Text => ids.iter().map(|s| Value::from(s.as_str())).collect(),
        IdEncoding::Object => ids
            .iter()
            .map(|s| match parse_positive(s) {
                Some(n) => json!({ "id": n }),
                None => json!({ "id": s }),
            })
            .collect(),
    };
    json!({ "orders": orders })
}

fn parse_positive(s: &str) -> Option<i64> {
    s.trim().parse::<i64>().ok().filter(|n| *n > 0)
}

/// True when the upstream refused the request because of its body shape, which is the signal to
/// try the next encoding rather than give up.
pub(crate) fn is_body_rejection(status: u16, body: &str) -> bool {
    status >= 400
        && serde_json::from_str::<Value>(body).map(|v| v["code"].as_str() == Some("IncorrectRequestBody")).unwrap_or(false)
}

#[cfg(test)]
mod test {
    use super::*;

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn numeric_encoding_drops_unparseable_ids() {
        let body = encode_order_ids(&ids(&["123", "abc", "456", "-5"]), IdEncoding::Numeric);
        assert_eq!(body, json!({"orders": [123, 456]}));
    }

    #[test]
    fn text_encoding_keeps_everything() {
        let body = encode_order_ids(&ids(&["123", "WB-99"]), IdEncoding::Text);
        assert_eq!(body, json!({"orders": ["123", "WB-99"]}));
    }

    #[test]
    fn object_encoding_prefers_numbers() {
        let body = encode_order_ids(&ids(&["123", "WB-99"]), IdEncoding::Object);
        assert_eq!(body, json!({"orders": [{"id": 123}, {"id": "WB-99"}]}));
    }

    #[test]
    fn unique_ids_preserves_first_seen_order() {
        assert_eq!(unique_ids(&ids(&[" 1 ", "2", "1", "", "3", "2"])), ids(&["1", "2", "3"]));
    }

    #[test]
    fn body_rejection_requires_the_upstream_code() {
        assert!(is_body_rejection(400, r#"{"code":"IncorrectRequestBody","message":"bad"}"#));
        assert!(!is_body_rejection(400, r#"{"code":"SomethingElse"}"#));
        assert!(!is_body_rejection(200, r#"{"code":"IncorrectRequestBody"}"#));
        assert!(!is_body_rejection(400, "not json"));
    }
}
