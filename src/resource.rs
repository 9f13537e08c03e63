//! Resource shapes returned by the HabitRPG v1 API.
//!
//! Only the fields this crate's callers read are modelled; anything else in
//! the payload is ignored and missing fields fall back to their defaults.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStatus {
    #[serde(default)]
    pub status: String,
}

impl ServerStatus {
    pub fn is_up(&self) -> bool {
        self.status == "up"
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Todo,
    Habit,
    Daily,
    Reward,
}

impl TaskType {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskType::Todo => "todo",
            TaskType::Habit => "habit",
            TaskType::Daily => "daily",
            TaskType::Reward => "reward",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChecklistItem {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub priority: Option<f64>,
    #[serde(default)]
    pub completed: Option<bool>,
    /// Habits only.
    #[serde(default)]
    pub up: Option<bool>,
    #[serde(default)]
    pub down: Option<bool>,
    /// Dailies only.
    #[serde(default)]
    pub streak: Option<u32>,
    /// Due date of a todo, as sent by the server.
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub checklist: Vec<ChecklistItem>,
}

/// Payload for creating a task.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NewTask {
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

impl NewTask {
    pub fn new(task_type: TaskType, text: impl Into<String>) -> Self {
        Self {
            task_type,
            text: text.into(),
            notes: None,
            priority: None,
            value: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_priority(mut self, priority: f64) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Gold cost, for rewards.
    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }
}

/// Partial task update; only the fields that are set are sent.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TaskUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScoreDirection {
    Up,
    Down,
}

impl ScoreDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            ScoreDirection::Up => "up",
            ScoreDirection::Down => "down",
        }
    }
}

/// Stats after scoring a task, plus the task value delta.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ScoreResult {
    #[serde(default)]
    pub delta: f64,
    #[serde(default)]
    pub hp: f64,
    #[serde(default)]
    pub mp: f64,
    #[serde(default)]
    pub exp: f64,
    #[serde(default)]
    pub gp: f64,
    #[serde(default)]
    pub lvl: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Stats {
    #[serde(default)]
    pub hp: f64,
    #[serde(default)]
    pub mp: f64,
    #[serde(default)]
    pub exp: f64,
    #[serde(default)]
    pub gp: f64,
    #[serde(default)]
    pub lvl: u32,
    #[serde(default, rename = "maxHealth")]
    pub max_health: f64,
    #[serde(default, rename = "maxMP")]
    pub max_mp: f64,
    #[serde(default, rename = "toNextLevel")]
    pub to_next_level: f64,
    #[serde(default)]
    pub class: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct User {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub profile: Profile,
    #[serde(default)]
    pub stats: Stats,
}
