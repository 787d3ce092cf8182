use serde_json::Value;
use serde_json_path::JsonPath;

#[derive(Debug, PartialEq)]
enum Segment<'a> {
    Key(&'a str),
    Index(i64),
}

/// Evaluates a JSONPath against `body`.
///
/// Definite paths (`$`, `.key`, `['key']`, `[index]`, negative indexes counting
/// from the end) select one node and yield it as is. Any other path (wildcards,
/// deep scans, filters, slices, unions) is handed to [`JsonPath`] and yields
/// every matched node as an array, possibly empty.
///
/// Blank or malformed bodies, paths that do not parse, missing keys and a
/// JSON `null` all yield `None`.
pub fn evaluate(body: &str, path: &str) -> Option<Value> {
    if body.trim().is_empty() {
        return None;
    }
    match parse(path) {
        Some(segments) => walk(&serde_json::from_str(body).ok()?, &segments),
        None => query(body, path),
    }
}

fn walk(document: &Value, segments: &[Segment<'_>]) -> Option<Value> {
    let mut node = document;
    for segment in segments {
        node = match (segment, node) {
            (Segment::Key(key), Value::Object(map)) => map.get(*key)?,
            (Segment::Index(i), Value::Array(items)) => {
                let len = items.len() as i64;
                let i = if *i < 0 { len + i } else { *i };
                items.get(usize::try_from(i).ok()?)?
            }
            _ => return None,
        };
    }
    match node {
        Value::Null => None,
        value => Some(value.clone()),
    }
}

fn query(body: &str, path: &str) -> Option<Value> {
    let query = match JsonPath::parse(path) {
        Ok(query) => query,
        Err(e) => {
            tracing::debug!("Ignoring invalid JSONPath {path:?}: {e}");
            return None;
        }
    };
    let document: Value = serde_json::from_str(body).ok()?;
    let nodes = query.query(&document).all().into_iter().cloned().collect();
    Some(Value::Array(nodes))
}

/// Splits a definite path into segments; `None` for anything indefinite or
/// malformed.
fn parse(path: &str) -> Option<Vec<Segment<'_>>> {
    let mut rest = path.strip_prefix('$')?;
    let mut segments = Vec::new();

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('.') {
            let end = after.find(['.', '[']).unwrap_or(after.len());
            let key = &after[..end];
            if key.is_empty() || key == "*" {
                return None;
            }
            segments.push(Segment::Key(key));
            rest = &after[end..];
        } else if let Some(after) = rest.strip_prefix('[') {
            let end = after.find(']')?;
            segments.push(bracket(after[..end].trim())?);
            rest = &after[end + 1..];
        } else {
            return None;
        }
    }
    Some(segments)
}

fn bracket(inner: &str) -> Option<Segment<'_>> {
    for quote in ['\'', '"'] {
        if let Some(key) = inner
            .strip_prefix(quote)
            .and_then(|s| s.strip_suffix(quote))
        {
            // `['a','b']` is a union
            return (!key.contains(quote)).then_some(Segment::Key(key));
        }
    }
    inner.parse().ok().map(Segment::Index)
}
