//! Diff summaries for audited updates

use serde_json::Value;

/// Summarize top-level field changes between two JSON values
///
/// Returns `None` when nothing changed.
pub fn generate_diff(before: &Value, after: &Value) -> Option<String> {
    let (Value::Object(before_obj), Value::Object(after_obj)) = (before, after) else {
        return (before != after)
            .then(|| format!("{} -> {}", format_value(before), format_value(after)));
    };

    let mut changes = Vec::new();

    for (key, before_val) in before_obj {
        match after_obj.get(key) {
            Some(after_val) if after_val != before_val => changes.push(format!(
                "{}: {} -> {}",
                key,
                format_value(before_val),
                format_value(after_val)
            )),
            Some(_) => {}
            None => changes.push(format!("{}: {} -> (removed)", key, format_value(before_val))),
        }
    }

    for (key, after_val) in after_obj {
        if !before_obj.contains_key(key) {
            changes.push(format!("{}: (added) -> {}", key, format_value(after_val)));
        }
    }

    if changes.is_empty() {
        None
    } else {
        Some(changes.join(", "))
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) if s.chars().count() > 50 => {
            let head: String = s.chars().take(47).collect();
            format!("\"{}...\"", head)
        }
        Value::String(s) => format!("\"{}\"", s),
        Value::Array(arr) => format!("[{} items]", arr.len()),
        Value::Object(obj) => format!("{{{} fields}}", obj.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_adjustment_diff() {
        let before = json!({"category": "Savings", "adjusted": false});
        let after = json!({
            "category": "Savings",
            "adjusted": true,
            "adjustment_note": "Moved to chama"
        });

        let diff = generate_diff(&before, &after).unwrap();
        assert!(diff.contains("adjusted: false -> true"));
        assert!(diff.contains("adjustment_note: (added) -> \"Moved to chama\""));
        assert!(!diff.contains("category"));
    }

    #[test]
    fn test_no_changes() {
        let value = json!({"closed": true});
        assert!(generate_diff(&value, &value).is_none());
    }

    #[test]
    fn test_long_string_truncated() {
        let before = json!({"note": ""});
        let after = json!({"note": "x".repeat(80)});
        let diff = generate_diff(&before, &after).unwrap();
        assert!(diff.ends_with("...\""));
    }
}
