// src/ingest/providers/cursor.rs
use crate::ingest::types::Params;

pub const SINCE_ID_PARAM: &str = "since_id";

/// Builds the query string for a read: cursor as `since_id`, then caller params.
/// Caller params win on key collisions. Output is sorted so requests are stable.
pub struct CursorParams;

impl CursorParams {
    pub fn merge(cursor: Option<&str>, params: &Params) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> = Vec::with_capacity(params.len() + 1);
        if let Some(c) = cursor {
            out.push((SINCE_ID_PARAM.to_string(), c.to_string()));
        }
        for (k, v) in params {
            out.retain(|(existing, _)| existing != k);
            out.push((k.clone(), param_value(v)));
        }
        out.sort();
        out
    }
}

/// Strings go out unquoted; everything else as its JSON text.
pub fn param_value(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cursor_becomes_since_id() {
        let q = CursorParams::merge(Some("42"), &Params::new());
        assert_eq!(q, vec![("since_id".to_string(), "42".to_string())]);
    }

    #[test]
    fn params_are_stringified_and_forwarded() {
        let mut p = Params::new();
        p.insert("q".into(), json!("rust lang"));
        p.insert("count".into(), json!(20));
        let q = CursorParams::merge(None, &p);
        assert_eq!(
            q,
            vec![
                ("count".to_string(), "20".to_string()),
                ("q".to_string(), "rust lang".to_string())
            ]
        );
    }

    #[test]
    fn explicit_since_id_param_overrides_cursor() {
        let mut p = Params::new();
        p.insert("since_id".into(), json!("7"));
        let q = CursorParams::merge(Some("3"), &p);
        assert_eq!(q, vec![("since_id".to_string(), "7".to_string())]);
    }
}
