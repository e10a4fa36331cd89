//! Event envelope passed between pipeline stages.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// A structured log event.
///
/// Fields live behind an `Arc`, so fanning one event out to many consumers
/// clones a pointer, not the payload. A consumer that needs to modify the
/// event gets its own copy on first write through [`Event::fields_mut`].
///
/// # Examples
///
/// ```rust
/// use logbeat_filter::Event;
///
/// let event = Event::from_line("data", "GET /index.html 200");
/// assert_eq!(event.text("data"), Some("GET /index.html 200"));
/// assert_eq!(event.text("missing"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Event {
    fields: Arc<Map<String, Value>>,
}

impl Event {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self {
            fields: Arc::new(fields),
        }
    }

    /// Build an event carrying a single raw line.
    pub fn from_line(field: &str, line: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert(field.to_string(), Value::String(line.into()));
        Self::new(fields)
    }

    /// Wrap a JSON object. Returns `None` for any other JSON value.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self::new(fields)),
            _ => None,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// The field as text. Only JSON strings count; numbers, objects and
    /// nulls are not treated as a raw line.
    pub fn text(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Mutable access, copying the fields if another holder shares them.
    pub fn fields_mut(&mut self) -> &mut Map<String, Value> {
        Arc::make_mut(&mut self.fields)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.fields_mut().insert(field.into(), value)
    }

    /// Whether two events share the same underlying payload.
    pub fn ptr_eq(&self, other: &Event) -> bool {
        Arc::ptr_eq(&self.fields, &other.fields)
    }
}

impl From<Map<String, Value>> for Event {
    fn from(fields: Map<String, Value>) -> Self {
        Self::new(fields)
    }
}
