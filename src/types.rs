//! Core types for the item graph.

use crate::error::{ItemError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Item priority as an integer (higher = more important).
/// Default is 0. Typical range: -100 to 100.
pub type Priority = i32;

/// Priority constants for convenience.
pub const PRIORITY_HIGH: Priority = 1;
pub const PRIORITY_MEDIUM: Priority = 0;
pub const PRIORITY_LOW: Priority = -1;
pub const PRIORITY_DEFAULT: Priority = PRIORITY_MEDIUM;

/// Parse a priority string ("high", "medium", "low" or an integer).
pub fn parse_priority(s: &str) -> Result<Priority> {
    match s.trim().to_lowercase().as_str() {
        "high" => Ok(PRIORITY_HIGH),
        "medium" => Ok(PRIORITY_MEDIUM),
        "low" => Ok(PRIORITY_LOW),
        other => other
            .parse()
            .map_err(|_| ItemError::invalid("priority", format!("Invalid priority '{}'", s))),
    }
}

/// Kind of unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Task,
    Epic,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Task => "task",
            ItemType::Epic => "epic",
        }
    }
}

impl FromStr for ItemType {
    type Err = ItemError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "task" => Ok(ItemType::Task),
            "epic" => Ok(ItemType::Epic),
            other => Err(ItemError::invalid(
                "item_type",
                format!("Invalid item type '{}'. Valid types: task, epic", other),
            )),
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Open,
    InProgress,
    Blocked,
    Done,
    Canceled,
}

impl ItemStatus {
    pub const ALL: [ItemStatus; 5] = [
        ItemStatus::Open,
        ItemStatus::InProgress,
        ItemStatus::Blocked,
        ItemStatus::Done,
        ItemStatus::Canceled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Open => "open",
            ItemStatus::InProgress => "in_progress",
            ItemStatus::Blocked => "blocked",
            ItemStatus::Done => "done",
            ItemStatus::Canceled => "canceled",
        }
    }

    /// Done and canceled items carry a `closed_at` timestamp.
    pub fn is_closed(&self) -> bool {
        matches!(self, ItemStatus::Done | ItemStatus::Canceled)
    }
}

impl FromStr for ItemStatus {
    type Err = ItemError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "open" => Ok(ItemStatus::Open),
            "in_progress" => Ok(ItemStatus::InProgress),
            "blocked" => Ok(ItemStatus::Blocked),
            "done" => Ok(ItemStatus::Done),
            "canceled" => Ok(ItemStatus::Canceled),
            other => Err(ItemError::invalid(
                "status",
                format!(
                    "Invalid status '{}'. Valid statuses: open, in_progress, blocked, done, canceled",
                    other
                ),
            )),
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A task or epic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub project: String,
    pub item_type: ItemType,
    pub title: String,
    pub description: String,
    pub status: ItemStatus,
    pub priority: Priority,
    pub parent_id: Option<String>,
    pub assigned_agent: Option<String>,
    pub template_id: Option<String>,
    pub results: Option<String>,
    pub labels: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub closed_at: Option<i64>,
}

/// Input for creating an item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewItem {
    pub project: String,
    pub item_type: ItemType,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: Option<ItemStatus>,
    pub priority: Option<Priority>,
    pub parent_id: Option<String>,
    pub assigned_agent: Option<String>,
    pub template_id: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
}

impl NewItem {
    pub fn new(project: impl Into<String>, item_type: ItemType, title: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            item_type,
            title: title.into(),
            description: String::new(),
            status: None,
            priority: None,
            parent_id: None,
            assigned_agent: None,
            template_id: None,
            labels: Vec::new(),
        }
    }

    pub fn task(project: impl Into<String>, title: impl Into<String>) -> Self {
        Self::new(project, ItemType::Task, title)
    }

    pub fn epic(project: impl Into<String>, title: impl Into<String>) -> Self {
        Self::new(project, ItemType::Epic, title)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }
}

/// Field changes for `update_item`. `None` leaves a field untouched;
/// for optional fields `Some(None)` clears the value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub parent_id: Option<Option<String>>,
    pub assigned_agent: Option<Option<String>>,
    pub labels: Option<Vec<String>>,
}

/// Filter for listing items. Empty fields do not constrain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemFilter {
    pub project: Option<String>,
    #[serde(default)]
    pub statuses: Vec<ItemStatus>,
    pub item_type: Option<ItemType>,
    /// `Some(None)` selects root items only.
    pub parent_id: Option<Option<String>>,
    /// Item must carry every listed label.
    #[serde(default)]
    pub labels: Vec<String>,
    /// Items that depend on this item.
    pub blocked_by: Option<String>,
    /// Items this item depends on.
    pub blocking: Option<String>,
    pub limit: Option<i64>,
}

/// A blocking edge: `item_id` depends on `depends_on_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency {
    pub item_id: String,
    pub depends_on_id: String,
}

/// The caller on whose behalf a mutation runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl Actor {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            kind: Some(kind.into()),
        }
    }

    /// No attributed actor.
    pub fn anonymous() -> Self {
        Self::default()
    }
}

/// Type of history event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Created,
    StatusChanged,
    Completed,
    Canceled,
    Reopened,
    TitleChanged,
    DescriptionChanged,
    PriorityChanged,
    ParentChanged,
    AssigneeChanged,
    LabelsChanged,
    DependencyAdded,
    DependencyRemoved,
    Merged,
}

impl EventType {
    /// Events kept for the long retention tier.
    pub const STATUS_CLASS: [EventType; 4] = [
        EventType::StatusChanged,
        EventType::Completed,
        EventType::Canceled,
        EventType::Reopened,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Created => "created",
            EventType::StatusChanged => "status_changed",
            EventType::Completed => "completed",
            EventType::Canceled => "canceled",
            EventType::Reopened => "reopened",
            EventType::TitleChanged => "title_changed",
            EventType::DescriptionChanged => "description_changed",
            EventType::PriorityChanged => "priority_changed",
            EventType::ParentChanged => "parent_changed",
            EventType::AssigneeChanged => "assignee_changed",
            EventType::LabelsChanged => "labels_changed",
            EventType::DependencyAdded => "dependency_added",
            EventType::DependencyRemoved => "dependency_removed",
            EventType::Merged => "merged",
        }
    }

    pub fn is_status_class(&self) -> bool {
        Self::STATUS_CLASS.contains(self)
    }
}

impl FromStr for EventType {
    type Err = ItemError;

    fn from_str(s: &str) -> Result<Self> {
        let event = match s.trim() {
            "created" => EventType::Created,
            "status_changed" => EventType::StatusChanged,
            "completed" => EventType::Completed,
            "canceled" => EventType::Canceled,
            "reopened" => EventType::Reopened,
            "title_changed" => EventType::TitleChanged,
            "description_changed" => EventType::DescriptionChanged,
            "priority_changed" => EventType::PriorityChanged,
            "parent_changed" => EventType::ParentChanged,
            "assignee_changed" => EventType::AssigneeChanged,
            "labels_changed" => EventType::LabelsChanged,
            "dependency_added" => EventType::DependencyAdded,
            "dependency_removed" => EventType::DependencyRemoved,
            "merged" => EventType::Merged,
            other => {
                return Err(ItemError::invalid(
                    "event_type",
                    format!("Unknown event type '{}'", other),
                ));
            }
        };
        Ok(event)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An {old, new} change payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub old: Value,
    pub new: Value,
}

impl Change {
    pub fn new(old: impl Serialize, new: impl Serialize) -> Self {
        Self {
            old: serde_json::to_value(old).unwrap_or(Value::Null),
            new: serde_json::to_value(new).unwrap_or(Value::Null),
        }
    }
}

/// An immutable audit event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub item_id: String,
    pub event_type: EventType,
    pub actor: Actor,
    /// `None` when absent or when the stored payload could not be decoded.
    pub changes: Option<Change>,
    pub created_at: i64,
}

/// Filter for history queries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryQuery {
    pub item_id: Option<String>,
    pub actor_id: Option<String>,
    /// Minimum timestamp (inclusive, epoch ms).
    pub since: Option<i64>,
    #[serde(default)]
    pub event_types: Vec<EventType>,
    pub limit: Option<i64>,
}

/// Outcome of a history retention pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub deleted_count: i64,
    pub status_events: i64,
    pub other_events: i64,
    pub dry_run: bool,
}

/// A freeform note attached to an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: i64,
    pub item_id: String,
    pub message: String,
    pub created_at: i64,
}

/// Outcome of folding one item into another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    pub source_id: String,
    pub target_id: String,
    pub edges_rewired: i64,
    /// Edges dropped because the target already had them.
    pub edges_skipped: i64,
    pub logs_transferred: i64,
    pub dry_run: bool,
}

/// Aggregate project status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub project: String,
    pub counts: std::collections::BTreeMap<ItemStatus, i64>,
    pub total: i64,
    pub ready: Vec<Item>,
    pub in_progress: Vec<Item>,
    pub blocked: Vec<Item>,
    pub recently_done: Vec<Item>,
    pub stale: Vec<Item>,
}
