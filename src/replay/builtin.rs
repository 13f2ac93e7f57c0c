//! Built-in transition functions available to replay scenarios

use crate::scope::{Action, Transition};
use serde_json::{json, Value};

/// Names accepted by [`lookup`], sorted
pub const NAMES: &[&str] = &["counter", "log", "toggle"];

/// Transition function registered under `name`
pub fn lookup(name: &str) -> Option<Box<dyn Transition>> {
    match name {
        "counter" => Some(Box::new(counter)),
        "log" => Some(Box::new(log)),
        "toggle" => Some(Box::new(toggle)),
        _ => None,
    }
}

/// `{count}`: INCREMENT / DECREMENT by `payload.by` (default 1, saturating), RESET to 0
pub fn counter(state: Option<&Value>, action: &Action) -> Value {
    let count = state
        .and_then(|s| s.get("count"))
        .and_then(Value::as_i64)
        .unwrap_or(0);
    let by = action.payload.get("by").and_then(Value::as_i64).unwrap_or(1);

    match action.kind.as_str() {
        "INCREMENT" => json!({ "count": count.saturating_add(by) }),
        "DECREMENT" => json!({ "count": count.saturating_sub(by) }),
        "RESET" => json!({ "count": 0 }),
        _ => json!({ "count": count }),
    }
}

/// `{on}`: TOGGLE flips, SET takes `payload` as the new value
pub fn toggle(state: Option<&Value>, action: &Action) -> Value {
    let on = state
        .and_then(|s| s.get("on"))
        .and_then(Value::as_bool)
        .unwrap_or(false);

    match action.kind.as_str() {
        "TOGGLE" => json!({ "on": !on }),
        "SET" => json!({ "on": action.payload.as_bool().unwrap_or(on) }),
        "RESET" => json!({ "on": false }),
        _ => json!({ "on": on }),
    }
}

/// `{items}`: APPEND pushes the payload, CLEAR / RESET empty the list
pub fn log(state: Option<&Value>, action: &Action) -> Value {
    let mut items = state
        .and_then(|s| s.get("items"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    match action.kind.as_str() {
        "APPEND" => items.push(action.payload.clone()),
        "CLEAR" | "RESET" => items.clear(),
        _ => {}
    }
    json!({ "items": items })
}
