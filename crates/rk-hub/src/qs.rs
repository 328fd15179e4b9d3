//! # Query-String Decoding
//!
//! Turns URL query pairs into a query object:
//!
//! ```text
//! ?complete=false&age[$gt]=20&$sort[name]=1&$select[]=name&$limit=2
//!   -> { "complete": false, "age": { "$gt": 20 }, "$sort": { "name": 1 },
//!        "$select": ["name"], "$limit": 2 }
//! ```
//!
//! Shapes the bracket syntax cannot express (`$or`, nested arrays) go in a
//! `q` parameter holding a JSON object, merged over the bracket keys.

use serde_json::{Map, Value};

const JSON_PARAM: &str = "q";

/// Decode `pairs` (already percent-decoded) into a query object.
pub fn decode(pairs: &[(String, String)]) -> Result<Map<String, Value>, String> {
    let mut query = Map::new();
    let mut structured = None;

    for (key, raw) in pairs {
        if key == JSON_PARAM {
            match serde_json::from_str::<Value>(raw) {
                Ok(Value::Object(map)) => structured = Some(map),
                Ok(_) => return Err("'q' must be a JSON object".into()),
                Err(e) => return Err(format!("'q' is not valid JSON: {}", e)),
            }
            continue;
        }

        let path = split_path(key)?;
        insert_path(&mut query, &path, parse_value(raw))?;
    }

    if let Some(structured) = structured {
        for (key, value) in structured {
            query.insert(key, value);
        }
    }

    Ok(query)
}

/// Parse a path segment from the URL into an id: integers stay numeric.
pub fn parse_id(raw: &str) -> Value {
    match raw.parse::<i64>() {
        Ok(n) => Value::Number(n.into()),
        Err(_) => Value::String(raw.to_string()),
    }
}

/// `a[b][]` -> `["a", "b", ""]`.
fn split_path(key: &str) -> Result<Vec<&str>, String> {
    let (head, mut rest) = match key.find('[') {
        Some(pos) => (&key[..pos], &key[pos..]),
        None => return Ok(vec![key]),
    };
    if head.is_empty() {
        return Err(format!("malformed query key '{}'", key));
    }

    let mut path = vec![head];
    while !rest.is_empty() {
        let close = match (rest.starts_with('['), rest.find(']')) {
            (true, Some(close)) => close,
            _ => return Err(format!("malformed query key '{}'", key)),
        };
        path.push(&rest[1..close]);
        rest = &rest[close + 1..];
    }
    Ok(path)
}

fn insert_path(map: &mut Map<String, Value>, path: &[&str], value: Value) -> Result<(), String> {
    let (key, rest) = match path.split_first() {
        Some(split) => split,
        None => return Ok(()),
    };

    match rest.first() {
        None => {
            map.insert(key.to_string(), value);
            Ok(())
        }
        Some(&"") if rest.len() == 1 => {
            let slot = map
                .entry(key.to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
            match slot {
                Value::Array(items) => {
                    items.push(value);
                    Ok(())
                }
                _ => Err(format!("'{}' mixes list and scalar values", key)),
            }
        }
        Some(&"") => Err(format!("'{}[]' must be the last segment", key)),
        Some(_) => {
            let slot = map
                .entry(key.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            match slot {
                Value::Object(inner) => insert_path(inner, rest, value),
                _ => Err(format!("'{}' mixes object and scalar values", key)),
            }
        }
    }
}

fn parse_value(s: &str) -> Value {
    if let Ok(n) = s.parse::<i64>() {
        return Value::Number(n.into());
    }
    // "inf" and "NaN" parse as floats but have no JSON number form.
    if let Some(n) = s.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
        return Value::Number(n);
    }
    if s == "true" {
        Value::Bool(true)
    } else if s == "false" {
        Value::Bool(false)
    } else if s == "null" {
        Value::Null
    } else {
        Value::String(s.to_string())
    }
}
