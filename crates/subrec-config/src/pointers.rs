//! JSON-pointer leaf enumeration shared by the unused-key report and the
//! secret-literal guard.

use serde_json::Value;

/// One configured leaf value and the pointer that reaches it.
pub(crate) struct Leaf<'a> {
    pub pointer: String,
    pub value: &'a Value,
}

/// Every non-null leaf under `root`, in key order.
///
/// Empty mappings and lists contribute no leaves; `null` means "not set".
pub(crate) fn leaves(root: &Value) -> Vec<Leaf<'_>> {
    let mut out = Vec::new();
    walk(root, String::new(), &mut out);
    out
}

fn walk<'a>(v: &'a Value, at: String, out: &mut Vec<Leaf<'a>>) {
    match v {
        Value::Null => {}
        Value::Object(map) => {
            for (k, child) in map {
                walk(child, format!("{at}/{}", escape_token(k)), out);
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                walk(child, format!("{at}/{i}"), out);
            }
        }
        scalar => out.push(Leaf {
            pointer: if at.is_empty() { "/".to_string() } else { at },
            value: scalar,
        }),
    }
}

/// RFC 6901 token escaping.
fn escape_token(k: &str) -> String {
    k.replace('~', "~0").replace('/', "~1")
}

/// True when `prefix` names `pointer` itself or one of its ancestors.
///
/// `/state/dir` covers `/state/dir` and `/state/dir/x`, never `/state/dirs`.
pub(crate) fn covers(prefix: &str, pointer: &str) -> bool {
    pointer
        .strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}
