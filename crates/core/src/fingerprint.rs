//! Stable request identity for deduplication
//!
//! A fingerprint is `METHOD path|query|body` where query and body are
//! rendered as canonical JSON (object keys sorted at every depth). Query
//! pairs embedded in the URL are merged with the `params` object so the two
//! spellings of the same request collide.

use std::fmt::{self, Write as _};

use serde_json::{Map, Value};
use tollgate_domain::{HttpMethod, RequestDescriptor};
use url::form_urlencoded;

use crate::endpoint::strip_query;

/// Deterministic identity string of a request
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derives [`Fingerprint`]s; stateless and side-effect free
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestFingerprinter;

impl RequestFingerprinter {
    pub fn fingerprint(
        method: HttpMethod,
        url: &str,
        params: Option<&Value>,
        body: Option<&Value>,
    ) -> Fingerprint {
        let path = strip_query(url);
        let query = merged_query(url, params);

        let mut key = String::with_capacity(path.len() + 32);
        key.push_str(method.as_str());
        key.push(' ');
        key.push_str(path);
        key.push('|');
        if let Some(query) = &query {
            write_canonical(&mut key, query);
        }
        key.push('|');
        if let Some(body) = body {
            write_canonical(&mut key, body);
        }
        Fingerprint(key)
    }

    pub fn for_request(request: &RequestDescriptor) -> Fingerprint {
        Self::fingerprint(
            request.method,
            &request.url,
            request.params.as_ref(),
            request.body.as_ref(),
        )
    }
}

fn merged_query(url: &str, params: Option<&Value>) -> Option<Value> {
    let mut merged = Map::new();
    if let Some((_, query)) = url.split_once('?') {
        let query = query.split('#').next().unwrap_or_default();
        for (name, value) in form_urlencoded::parse(query.as_bytes()) {
            append_value(&mut merged, &name, Value::String(value.into_owned()));
        }
    }

    match params {
        Some(Value::Object(object)) => {
            for (name, value) in object {
                match value {
                    Value::Null => {}
                    Value::Array(items) => {
                        for item in items {
                            append_value(&mut merged, name, item.clone());
                        }
                    }
                    other => append_value(&mut merged, name, other.clone()),
                }
            }
        }
        Some(Value::Null) | None => {}
        // Non-object params have no keys to merge; keep them verbatim.
        Some(other) if merged.is_empty() => return Some(other.clone()),
        Some(other) => append_value(&mut merged, "", other.clone()),
    }

    if merged.is_empty() {
        return None;
    }

    // A key sent once is a scalar; repeated keys keep every value in send order.
    for value in merged.values_mut() {
        if matches!(value, Value::Array(items) if items.len() == 1) {
            if let Value::Array(mut items) = value.take() {
                *value = items.remove(0);
            }
        }
    }
    Some(Value::Object(merged))
}

fn append_value(merged: &mut Map<String, Value>, name: &str, value: Value) {
    match merged.get_mut(name) {
        Some(Value::Array(items)) => items.push(value),
        _ => {
            merged.insert(name.to_string(), Value::Array(vec![value]));
        }
    }
}

fn write_canonical(out: &mut String, value: &Value) {
    match value {
        Value::Object(object) => {
            let mut keys: Vec<&String> = object.keys().collect();
            keys.sort();
            out.push('{');
            for (index, key) in keys.into_iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                let _ = write!(out, "{}", Value::String(key.clone()));
                out.push(':');
                if let Some(inner) = object.get(key) {
                    write_canonical(out, inner);
                }
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_canonical(out, item);
            }
            out.push(']');
        }
        scalar => {
            let _ = write!(out, "{scalar}");
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn fp(method: HttpMethod, url: &str, params: Option<Value>, body: Option<Value>) -> Fingerprint {
        RequestFingerprinter::fingerprint(method, url, params.as_ref(), body.as_ref())
    }

    #[test]
    fn test_key_order_does_not_matter() {
        let a = fp(
            HttpMethod::Post,
            "/orders",
            Some(json!({"page": 1, "size": 20})),
            Some(json!({"item": {"sku": "A1", "qty": 2}, "note": "x"})),
        );
        let b = fp(
            HttpMethod::Post,
            "/orders",
            Some(json!({"size": 20, "page": 1})),
            Some(json!({"note": "x", "item": {"qty": 2, "sku": "A1"}})),
        );
        assert_eq!(a, b);
    }

    #[test]
    fn test_query_string_and_params_collide() {
        let inline = fp(HttpMethod::Get, "/users?role=admin&page=2", None, None);
        let params =
            fp(HttpMethod::Get, "/users", Some(json!({"page": "2", "role": "admin"})), None);
        assert_eq!(inline, params);
    }

    #[test]
    fn test_repeated_query_keys_keep_every_value() {
        let both = fp(HttpMethod::Get, "/search?tag=a&tag=b", None, None);
        let last = fp(HttpMethod::Get, "/search?tag=b", None, None);
        assert_ne!(both, last);
        assert_ne!(both, fp(HttpMethod::Get, "/search?tag=b&tag=a", None, None));
        assert!(both.as_str().contains(r#""tag":["a","b"]"#));
    }

    #[test]
    fn test_param_arrays_match_repeated_query_keys() {
        let inline = fp(HttpMethod::Get, "/search?tag=a&tag=b", None, None);
        let params = fp(HttpMethod::Get, "/search", Some(json!({"tag": ["a", "b"]})), None);
        assert_eq!(inline, params);

        let split = fp(HttpMethod::Get, "/search?tag=a", Some(json!({"tag": "b"})), None);
        assert_eq!(inline, split);
        assert_eq!(
            fp(HttpMethod::Get, "/search", Some(json!({"tag": ["a"]})), None),
            fp(HttpMethod::Get, "/search?tag=a", None, None)
        );
    }

    #[test]
    fn test_distinguishes_method_path_and_payload() {
        let base = fp(HttpMethod::Get, "/users", None, None);
        assert_ne!(base, fp(HttpMethod::Delete, "/users", None, None));
        assert_ne!(base, fp(HttpMethod::Get, "/users/1", None, None));
        assert_ne!(base, fp(HttpMethod::Get, "/users", Some(json!({"page": 1})), None));
        assert_ne!(
            fp(HttpMethod::Post, "/users", None, Some(json!([1, 2]))),
            fp(HttpMethod::Post, "/users", None, Some(json!([2, 1])))
        );
    }

    #[test]
    fn test_method_is_uppercased() {
        let key = fp(HttpMethod::Get, "/profile", None, None);
        assert!(key.as_str().starts_with("GET /profile"));
    }

    #[test]
    fn test_string_escaping_is_stable() {
        let a = fp(HttpMethod::Post, "/notes", None, Some(json!({"text": "a\"b", "z": null})));
        let b = fp(HttpMethod::Post, "/notes", None, Some(json!({"z": null, "text": "a\"b"})));
        assert_eq!(a, b);
        assert!(a.as_str().contains(r#""text":"a\"b""#));
    }
}
