//! Canonical task shapes shared by the gateway, client and parser.
//!
//! The upstream task API is inconsistent about field names and types, so the
//! rest of the crate only ever handles the normalized forms defined here.
//! Wire names stay camelCase for compatibility with existing clients.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Task identity as the upstream returns it: numeric or string.
///
/// Temporary client-side ids (`temp-...`) are strings and must be replaced
/// by the next successful fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskId {
    Num(i64),
    Str(String),
}

impl TaskId {
    /// True for synthetic ids generated while the upstream id was missing.
    pub fn is_temporary(&self) -> bool {
        matches!(self, TaskId::Str(s) if s.starts_with("temp-"))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskId::Num(n) => write!(f, "{}", n),
            TaskId::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        TaskId::Str(s.to_string())
    }
}

/// Priority bucket for tasks.
///
/// Upstream data also says "high" for the top bucket; anything unrecognized
/// resolves to `Medium`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Priority {
    Top,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "top" | "high" => Priority::Top,
            "low" => Priority::Low,
            _ => Priority::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Top => "top",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Priority {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Priority::parse(&raw))
    }
}

/// A task in canonical client-side shape.
///
/// `name`/`title` and `is_urgent`/`urgent` are aliases kept in sync because
/// upstream responses use either spelling. `time` is meaningless while
/// `is_full_day` is set. Unknown upstream fields ride along in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub details: String,
    /// `YYYY-MM-DD`, or empty for "no date".
    #[serde(default)]
    pub date: String,
    /// `HH:MM`, or empty for "no time".
    #[serde(default)]
    pub time: String,
    #[serde(default, rename = "isFullDay")]
    pub is_full_day: bool,
    #[serde(default, rename = "isUrgent")]
    pub is_urgent: bool,
    #[serde(default)]
    pub urgent: bool,
    #[serde(default)]
    pub completed: bool,
    /// Comma-separated; split only at render time.
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub priority: Priority,
    /// Owner identity, required for every upstream operation.
    #[serde(default)]
    pub email: String,
    #[serde(default, rename = "createdAt")]
    pub created_at: Option<Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Task {
    /// Effective time: full-day tasks never expose one, whatever was stored.
    pub fn effective_time(&self) -> &str {
        if self.is_full_day { "" } else { &self.time }
    }

    pub fn tag_list(&self) -> Vec<&str> {
        self.tags
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect()
    }
}

/// Structured, unsaved output of the transcript parser, also the body of a
/// create request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub time: String,
    #[serde(default, rename = "isFullDay")]
    pub is_full_day: bool,
    #[serde(default, rename = "isUrgent")]
    pub is_urgent: bool,
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub priority: Priority,
}

impl Default for TaskDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            details: String::new(),
            date: String::new(),
            time: String::new(),
            is_full_day: false,
            is_urgent: false,
            tags: String::new(),
            priority: Priority::Medium,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_parses_aliases_and_unknowns() {
        assert_eq!(Priority::parse("top"), Priority::Top);
        assert_eq!(Priority::parse("HIGH"), Priority::Top);
        assert_eq!(Priority::parse("low"), Priority::Low);
        assert_eq!(Priority::parse("medium"), Priority::Medium);
        assert_eq!(Priority::parse("whenever"), Priority::Medium);
        assert_eq!(Priority::parse(""), Priority::Medium);
    }

    #[test]
    fn task_id_round_trips_both_shapes() {
        let num: TaskId = serde_json::from_str("42").unwrap();
        assert_eq!(num, TaskId::Num(42));
        let s: TaskId = serde_json::from_str("\"temp-1-abc\"").unwrap();
        assert!(s.is_temporary());
        assert_eq!(serde_json::to_string(&num).unwrap(), "42");
    }

    #[test]
    fn full_day_masks_time() {
        let task = Task {
            id: TaskId::Num(1),
            name: "t".into(),
            title: "t".into(),
            details: String::new(),
            date: "2025-03-18".into(),
            time: "14:00".into(),
            is_full_day: true,
            is_urgent: false,
            urgent: false,
            completed: false,
            tags: "home, errands".into(),
            priority: Priority::Medium,
            email: "a@b.c".into(),
            created_at: None,
            extra: Default::default(),
        };
        assert_eq!(task.effective_time(), "");
        assert_eq!(task.tag_list(), vec!["home", "errands"]);
    }
}
