//! Display formatting of contract inputs and outputs
//!
//! The default `InspectSerializer` renders JSON values in a compact,
//! human-oriented notation (`{ foo: 'a', bar: 123 }`) and applies the
//! configuration's safety rules:
//!
//! - values of block-listed field names become `'<removed>'`
//! - arrays longer than `max_array_length` become `'Array(<n>)'`
//! - containers nested deeper than `depth` become `[Object]` / `[Array]`
//! - HTTP request/response shaped objects are reduced to a few fields
//!
//! Output depends only on `(config, value)`.

use serde_json::{Map, Value};

use crate::config::ContractConfig;

/// Marker written in place of redacted values and suppressed outputs
pub const REDACTED: &str = "<removed>";

/// Formats values for log lines and causal frames.
pub trait Serializer: Send + Sync {
    fn format(&self, config: &ContractConfig, value: &Value) -> String;
}

/// Default serializer, see the module docs
#[derive(Debug, Clone, Copy, Default)]
pub struct InspectSerializer;

impl Serializer for InspectSerializer {
    fn format(&self, config: &ContractConfig, value: &Value) -> String {
        render(config, value, 0)
    }
}

fn render(config: &ContractConfig, value: &Value, level: usize) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote(s),
        Value::Array(items) => render_array(config, items, level),
        Value::Object(map) => match reduce_http_shape(map) {
            Some(reduced) => render_object(config, &reduced, level),
            None => render_object(config, map, level),
        },
    }
}

fn render_array(config: &ContractConfig, items: &[Value], level: usize) -> String {
    if items.len() > config.max_array_length {
        return quote(&format!("Array({})", items.len()));
    }
    if level > config.depth {
        return "[Array]".to_string();
    }
    if items.is_empty() {
        return "[]".to_string();
    }
    let parts: Vec<String> = items
        .iter()
        .map(|item| render(config, item, level + 1))
        .collect();
    format!("[ {} ]", parts.join(", "))
}

fn render_object(config: &ContractConfig, map: &Map<String, Value>, level: usize) -> String {
    if level > config.depth {
        return "[Object]".to_string();
    }
    if map.is_empty() {
        return "{}".to_string();
    }
    let parts: Vec<String> = map
        .iter()
        .map(|(key, value)| {
            let rendered = if config.is_removed_field(key) {
                quote(REDACTED)
            } else {
                render(config, value, level + 1)
            };
            format!("{}: {}", render_key(key), rendered)
        })
        .collect();
    format!("{{ {} }}", parts.join(", "))
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

fn render_key(key: &str) -> String {
    let mut chars = key.chars();
    let is_identifier = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_' || first == '$')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        }
        None => false,
    };
    if is_identifier {
        key.to_string()
    } else {
        quote(key)
    }
}

/// Reduce request- and response-shaped objects to the fields worth logging.
fn reduce_http_shape(map: &Map<String, Value>) -> Option<Map<String, Value>> {
    let is_request = map.get("method").is_some_and(Value::is_string)
        && map.get("url").is_some_and(Value::is_string)
        && map.contains_key("headers");
    if is_request {
        let mut reduced = Map::new();
        for key in ["method", "url", "headers"] {
            if let Some(v) = map.get(key) {
                reduced.insert(key.to_string(), v.clone());
            }
        }
        let connection = map.get("connection").and_then(Value::as_object);
        for key in ["remoteAddress", "remotePort"] {
            let found = connection
                .and_then(|c| c.get(key))
                .or_else(|| map.get(key));
            if let Some(v) = found {
                reduced.insert(key.to_string(), v.clone());
            }
        }
        return Some(reduced);
    }

    let header = map.get("_header").or_else(|| map.get("header"));
    if let (Some(status), Some(header)) = (map.get("statusCode"), header) {
        let mut reduced = Map::new();
        reduced.insert("statusCode".to_string(), status.clone());
        reduced.insert("header".to_string(), header.clone());
        return Some(reduced);
    }

    None
}
