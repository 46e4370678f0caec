//! `{{payload.a.b.0.c}}` placeholder rendering — a single left-to-right scan
//! over `template` that, for each `{{...}}` span rooted at `payload`,
//! resolves dot-separated keys (object fields) and integer segments (array
//! indices) against the decoded webhook body. A segment that cannot be
//! resolved leaves the original placeholder text untouched in the output.

use serde_json::Value;

pub fn render(template: &str, payload: &Value) -> String {
    let mut out = String::with_capacity(template.len());
    let bytes = template.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' && bytes.get(i + 1) == Some(&b'{') {
            if let Some(end) = find_close(template, i + 2) {
                let path_str = &template[i + 2..end];
                match resolve(path_str, payload) {
                    Some(resolved) => out.push_str(&resolved),
                    None => out.push_str(&template[i..end + 2]),
                }
                i = end + 2;
                continue;
            }
        }
        // Push one char at a time, respecting UTF-8 boundaries.
        let ch = template[i..].chars().next().unwrap();
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}

fn find_close(template: &str, from: usize) -> Option<usize> {
    template[from..].find("}}").map(|p| from + p)
}

fn resolve(path_str: &str, payload: &Value) -> Option<String> {
    let mut segments = path_str.split('.');
    let root = segments.next()?;
    if root != "payload" {
        return None;
    }

    let mut current = payload;
    for segment in segments {
        current = match segment.parse::<usize>() {
            Ok(index) => current.as_array()?.get(index)?,
            Err(_) => current.as_object()?.get(segment)?,
        };
    }

    Some(match current {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_nested_object_and_array_path() {
        let payload = json!({"a": {"b": [{"c": "hit"}]}});
        let rendered = render("value: {{payload.a.b.0.c}}", &payload);
        assert_eq!(rendered, "value: hit");
    }

    #[test]
    fn unresolved_segment_leaves_placeholder_literal() {
        let payload = json!({"a": 1});
        let rendered = render("value: {{payload.missing.field}}", &payload);
        assert_eq!(rendered, "value: {{payload.missing.field}}");
    }

    #[test]
    fn non_string_leaf_is_stringified() {
        let payload = json!({"count": 42});
        let rendered = render("n={{payload.count}}", &payload);
        assert_eq!(rendered, "n=42");
    }

    #[test]
    fn multiple_placeholders_in_one_template() {
        let payload = json!({"first": "Ada", "last": "Lovelace"});
        let rendered = render("{{payload.first}} {{payload.last}}", &payload);
        assert_eq!(rendered, "Ada Lovelace");
    }

    #[test]
    fn array_out_of_bounds_leaves_placeholder_literal() {
        let payload = json!({"items": ["x"]});
        let rendered = render("{{payload.items.5}}", &payload);
        assert_eq!(rendered, "{{payload.items.5}}");
    }
}
