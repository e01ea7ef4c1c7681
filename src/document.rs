use serde_json::Value;

/// Read-only cursor over a loosely-typed JSON tree.
///
/// Every step is total: walking into a missing key, a non-object or an
/// out-of-range index yields an empty node instead of an error, so callers
/// only decide on defaults at the leaves.
#[derive(Debug, Clone, Copy)]
pub struct Node<'a>(Option<&'a Value>);

impl<'a> Node<'a> {
    pub fn new(value: &'a Value) -> Self {
        Self(Some(value))
    }

    pub fn raw(self) -> Option<&'a Value> {
        self.0.filter(|v| !v.is_null())
    }

    pub fn is_present(self) -> bool {
        self.raw().is_some()
    }

    pub fn is_object(self) -> bool {
        self.raw().is_some_and(Value::is_object)
    }

    pub fn is_array(self) -> bool {
        self.raw().is_some_and(Value::is_array)
    }

    /// False for missing, null, `false`, zero and empty strings, arrays or
    /// objects.
    pub fn is_truthy(self) -> bool {
        match self.raw() {
            None => false,
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Array(a)) => !a.is_empty(),
            Some(Value::Object(o)) => !o.is_empty(),
            Some(Value::Null) => false,
        }
    }

    pub fn get(self, key: &str) -> Node<'a> {
        Node(self.0.and_then(|v| v.as_object()).and_then(|m| m.get(key)))
    }

    pub fn at(self, idx: usize) -> Node<'a> {
        Node(self.0.and_then(|v| v.as_array()).and_then(|a| a.get(idx)))
    }

    /// Array elements in source order; empty for anything but an array.
    pub fn items(self) -> impl Iterator<Item = Node<'a>> {
        self.0
            .and_then(|v| v.as_array())
            .into_iter()
            .flatten()
            .map(Node::new)
    }

    /// Object members in map order; empty for anything but an object.
    pub fn entries(self) -> impl Iterator<Item = (&'a str, Node<'a>)> {
        self.0
            .and_then(|v| v.as_object())
            .into_iter()
            .flatten()
            .map(|(k, v)| (k.as_str(), Node::new(v)))
    }

    pub fn as_str(self) -> Option<&'a str> {
        self.0.and_then(|v| v.as_str())
    }

    /// Scalar rendered as text: strings verbatim, numbers and booleans via
    /// their JSON form. Seasons arrive both as `"2024/25"` and `2024`.
    pub fn text(self) -> Option<String> {
        match self.raw()? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn text_or(self, default: &str) -> String {
        self.text().unwrap_or_else(|| default.to_string())
    }

    /// Trimmed, non-empty scalar text. Used for player-name slots.
    pub fn name(self) -> Option<String> {
        let text = self.text()?;
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    pub fn as_i64(self) -> Option<i64> {
        let v = self.raw()?;
        if let Some(n) = v.as_i64() {
            return Some(n);
        }
        if let Some(f) = v.as_f64() {
            return Some(f as i64);
        }
        v.as_str()?.trim().parse::<i64>().ok()
    }

    pub fn i64_or(self, default: i64) -> i64 {
        self.as_i64().unwrap_or(default)
    }
}
