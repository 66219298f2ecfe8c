//! Normalization of upstream task payloads.
//!
//! The upstream API has grown several response dialects over time: tasks
//! under `tasks`, `data` or deeper wrappers, booleans as 0/1 or "yes"/"no",
//! `title` vs `name`. Everything funnels through here so the rest of the
//! crate sees exactly one shape.

use chrono::Utc;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::models::{Priority, Task, TaskId};

/// Wrapper keys tried, in order, when digging a task list out of a response.
const LIST_KEYS: [&str; 6] = ["tasks", "data", "items", "results", "records", "rows"];

/// Recursion bound for [`extract_tasks`]; upstream payloads are shallow.
const MAX_EXTRACT_DEPTH: u8 = 6;

/// Canonical output keys; raw fields with these names are consumed by the
/// struct fields and must not also appear in `Task::extra`.
const CANONICAL_KEYS: [&str; 14] = [
    "id",
    "name",
    "title",
    "details",
    "date",
    "time",
    "isFullDay",
    "isUrgent",
    "urgent",
    "completed",
    "tags",
    "priority",
    "email",
    "createdAt",
];

/// Coerce an upstream boolean-like value.
///
/// Booleans pass through, numbers are true only for 1, and strings are
/// matched (trimmed, case-insensitive) against fixed true/false vocabularies.
/// Anything else is false.
pub fn coerce_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() == Some(1.0),
        Value::String(s) => {
            let normalized = s.trim().to_lowercase();
            matches!(normalized.as_str(), "1" | "true" | "yes" | "y" | "on")
        }
        _ => false,
    }
}

/// First non-null value among the given keys, mirroring how upstream
/// responses alternate between naming conventions.
pub(crate) fn first_present<'a>(raw: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| raw.get(k))
        .find(|v| !v.is_null())
}

fn string_field(raw: &Value, keys: &[&str]) -> String {
    first_present(raw, keys)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn bool_field(raw: &Value, keys: &[&str]) -> bool {
    first_present(raw, keys).is_some_and(coerce_bool)
}

/// Synthetic id for tasks the upstream returned without one. Unstable by
/// contract: superseded by the next successful fetch.
pub fn temp_id() -> String {
    format!(
        "temp-{}-{}",
        Utc::now().timestamp_millis(),
        Uuid::new_v4().simple()
    )
}

fn id_field(raw: &Value) -> TaskId {
    match first_present(raw, &["id", "task_id", "_id"]) {
        Some(Value::Number(n)) => n
            .as_i64()
            .map(TaskId::Num)
            .unwrap_or_else(|| TaskId::Str(n.to_string())),
        Some(Value::String(s)) if !s.is_empty() => TaskId::Str(s.clone()),
        _ => TaskId::Str(temp_id()),
    }
}

/// Map an arbitrary upstream task-like object into the canonical [`Task`].
///
/// Idempotent: feeding a canonical task back through yields an equal value.
/// Fields this function does not understand are preserved in `Task::extra`.
pub fn normalize_task(raw: &Value) -> Task {
    let name = string_field(raw, &["name", "title"]);
    let title = string_field(raw, &["title", "name"]);

    let mut extra = Map::new();
    if let Some(obj) = raw.as_object() {
        for (key, value) in obj {
            if !CANONICAL_KEYS.contains(&key.as_str()) {
                extra.insert(key.clone(), value.clone());
            }
        }
    }

    Task {
        id: id_field(raw),
        name,
        title,
        details: string_field(raw, &["details", "detail"]),
        date: string_field(raw, &["date"]),
        time: string_field(raw, &["time"]),
        is_full_day: bool_field(raw, &["isFullDay", "is_full_day"]),
        is_urgent: bool_field(raw, &["isUrgent", "urgent", "is_urgent"]),
        urgent: bool_field(raw, &["urgent", "isUrgent", "is_urgent"]),
        completed: bool_field(raw, &["completed", "isCompleted", "is_completed"]),
        tags: string_field(raw, &["tags"]),
        priority: first_present(raw, &["priority"])
            .and_then(Value::as_str)
            .map(Priority::parse)
            .unwrap_or_default(),
        email: string_field(raw, &["email"]),
        created_at: first_present(raw, &["createdAt", "created_at"]).cloned(),
        extra,
    }
}

/// Dig the task list out of whatever shape the upstream responded with.
///
/// Tries, in order: a bare array, a JSON-encoded string, the known wrapper
/// keys, a `payload` envelope, an object whose values are individual task
/// records, and finally any nested value. Returns an empty list when nothing
/// recognizable is found; never errors.
pub fn extract_tasks(payload: &Value) -> Vec<Value> {
    extract_at(payload, 0)
}

fn extract_at(payload: &Value, depth: u8) -> Vec<Value> {
    if depth > MAX_EXTRACT_DEPTH {
        return Vec::new();
    }

    match payload {
        Value::Array(items) => items.clone(),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(parsed) => extract_at(&parsed, depth + 1),
            Err(_) => Vec::new(),
        },
        Value::Object(map) => {
            for key in LIST_KEYS.iter().chain(std::iter::once(&"payload")) {
                if let Some(inner) = map.get(*key) {
                    let extracted = extract_at(inner, depth + 1);
                    if !extracted.is_empty() {
                        return extracted;
                    }
                }
            }

            // A bare object map of task records, keyed by id.
            let object_values: Vec<&Value> = map
                .values()
                .filter(|v| v.is_object() || v.is_array())
                .collect();
            if !object_values.is_empty() && object_values.iter().all(|v| !v.is_array()) {
                let looks_like_tasks = object_values.iter().any(|v| {
                    ["id", "title", "name", "task_id"]
                        .iter()
                        .any(|k| v.get(k).is_some())
                });
                if looks_like_tasks {
                    return object_values.into_iter().cloned().collect();
                }
            }

            for value in map.values() {
                let extracted = extract_at(value, depth + 1);
                if !extracted.is_empty() {
                    return extracted;
                }
            }

            Vec::new()
        }
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn coerce_bool_truth_table() {
        for truthy in [json!(true), json!(1), json!("1"), json!("true"), json!("YES"), json!("on")] {
            assert!(coerce_bool(&truthy), "expected true for {truthy}");
        }
        for falsy in [
            json!(false),
            json!(0),
            json!("0"),
            json!("false"),
            json!("no"),
            json!(""),
            json!("off"),
        ] {
            assert!(!coerce_bool(&falsy), "expected false for {falsy}");
        }
        // Unrecognized inputs default to false, not JS truthiness.
        assert!(!coerce_bool(&json!("maybe")));
        assert!(!coerce_bool(&json!(2)));
        assert!(!coerce_bool(&json!(null)));
        assert!(!coerce_bool(&json!({ "nested": true })));
        assert!(!coerce_bool(&json!([1])));
    }

    #[test]
    fn normalize_fills_aliases_and_defaults() {
        let task = normalize_task(&json!({
            "task_id": 7,
            "title": "Call the bank",
            "detail": "about the card",
            "urgent": "yes",
            "is_full_day": 1,
            "completed": "off",
            "priority": "HIGH",
            "email": "v@example.com",
            "position": 3
        }));

        assert_eq!(task.id, TaskId::Num(7));
        assert_eq!(task.name, "Call the bank");
        assert_eq!(task.title, "Call the bank");
        assert_eq!(task.details, "about the card");
        assert!(task.is_urgent);
        assert!(task.urgent);
        assert!(task.is_full_day);
        assert!(!task.completed);
        assert_eq!(task.priority, Priority::Top);
        assert_eq!(task.date, "");
        assert_eq!(task.time, "");
        assert_eq!(task.tags, "");
        // Unknown upstream fields ride along.
        assert_eq!(task.extra.get("position"), Some(&json!(3)));
    }

    #[test]
    fn normalize_generates_temp_id_when_missing() {
        let task = normalize_task(&json!({ "name": "no id yet" }));
        assert!(task.id.is_temporary(), "got {:?}", task.id);
        let other = normalize_task(&json!({ "name": "no id yet" }));
        assert_ne!(task.id, other.id);
    }

    #[test]
    fn normalize_is_idempotent() {
        let raw = json!({
            "id": "abc-1",
            "name": "Water plants",
            "date": "2025-03-18",
            "time": "09:30",
            "isUrgent": 1,
            "tags": "home",
            "priority": "low",
            "email": "v@example.com",
            "createdAt": "2025-03-01T10:00:00Z",
            "color": "green"
        });
        let once = normalize_task(&raw);
        let twice = normalize_task(&serde_json::to_value(&once).unwrap());
        assert_eq!(once, twice);
    }

    #[test]
    fn extract_handles_wrapper_shapes_equivalently() {
        let records = json!([{ "id": 1, "title": "a" }, { "id": 2, "title": "b" }]);
        let bare = records.clone();
        let wrapped = json!({ "success": true, "tasks": records.clone() });
        let nested = json!({ "data": { "items": records.clone() } });

        let expected = extract_tasks(&bare);
        assert_eq!(expected.len(), 2);
        assert_eq!(extract_tasks(&wrapped), expected);
        assert_eq!(extract_tasks(&nested), expected);
    }

    #[test]
    fn extract_accepts_object_map_of_records() {
        let payload = json!({
            "17": { "id": 17, "name": "first" },
            "23": { "id": 23, "name": "second" }
        });
        let tasks = extract_tasks(&payload);
        assert_eq!(tasks.len(), 2);
    }

    #[test]
    fn extract_parses_json_encoded_strings() {
        let payload = json!({ "payload": "[{\"id\": 5, \"name\": \"stringy\"}]" });
        let tasks = extract_tasks(&payload);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].get("id"), Some(&json!(5)));
    }

    #[test]
    fn extract_degrades_to_empty() {
        assert!(extract_tasks(&json!(null)).is_empty());
        assert!(extract_tasks(&json!(42)).is_empty());
        assert!(extract_tasks(&json!("not json")).is_empty());
        assert!(extract_tasks(&json!({ "message": "no tasks here" })).is_empty());

        // Depth bound: a list buried deeper than the recursion limit is not found.
        let mut buried = json!([{ "id": 1 }]);
        for _ in 0..8 {
            buried = json!({ "wrap": buried });
        }
        assert!(extract_tasks(&buried).is_empty());
    }
}
