use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub type RecordId = i64;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum BlockColor {
    #[default]
    Red,
    Green,
    Blue,
    Yellow,
    Purple,
    #[serde(other)]
    Unknown,
}

impl BlockColor {
    pub const PALETTE: [BlockColor; 5] = [
        BlockColor::Red,
        BlockColor::Green,
        BlockColor::Blue,
        BlockColor::Yellow,
        BlockColor::Purple,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Red => "Red",
            Self::Green => "Green",
            Self::Blue => "Blue",
            Self::Yellow => "Yellow",
            Self::Purple => "Purple",
            Self::Unknown => "Unknown",
        }
    }

    pub fn swatch(self) -> &'static str {
        match self {
            Self::Red => "#FFB3B3",
            Self::Green => "#B3FFB3",
            Self::Blue => "#B3D9FF",
            Self::Yellow => "#FFFFB3",
            Self::Purple => "#E6B3FF",
            Self::Unknown => "#FFFFFF",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::PALETTE.into_iter().find(|color| {
            color.name().eq_ignore_ascii_case(value) || color.swatch().eq_ignore_ascii_case(value)
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    /// Rounds drag coordinates to whole pixels, halves toward positive infinity.
    pub fn from_drag(x: f64, y: f64) -> Self {
        Self {
            x: round_half_up(x),
            y: round_half_up(y),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Block {
    pub id: RecordId,
    pub title: String,
    pub color: BlockColor,
    pub date: NaiveDate,
    pub x: i32,
    pub y: i32,
}

impl Block {
    pub fn position(&self) -> Position {
        Position {
            x: self.x,
            y: self.y,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewBlock {
    pub title: String,
    pub color: BlockColor,
    pub date: NaiveDate,
    pub x: i32,
    pub y: i32,
}

impl NewBlock {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.title, "block.title")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: RecordId,
    pub block_id: RecordId,
    pub title: String,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewTask {
    pub block_id: RecordId,
    pub title: String,
    pub time: Option<String>,
    pub completed: bool,
}

impl NewTask {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.title, "task.title")
    }

    pub fn from_template(task: &LibraryTask, block_id: RecordId) -> Self {
        Self {
            block_id,
            title: task.title.clone(),
            time: task.time.clone(),
            completed: task.completed,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TaskEdit {
    pub title: String,
    pub time: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LibraryBlock {
    pub id: RecordId,
    pub title: String,
    pub color: BlockColor,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewLibraryBlock {
    pub title: String,
    pub color: BlockColor,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LibraryTask {
    pub id: RecordId,
    pub block_id: RecordId,
    pub title: String,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewLibraryTask {
    pub block_id: RecordId,
    pub title: String,
    pub time: Option<String>,
    pub completed: bool,
}

impl NewLibraryTask {
    pub fn from_task(task: &Task, library_block_id: RecordId) -> Self {
        Self {
            block_id: library_block_id,
            title: task.title.clone(),
            time: task.time.clone(),
            completed: task.completed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BacklogItem {
    pub id: RecordId,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewBacklogItem {
    pub title: String,
}

impl NewBacklogItem {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.title, "backlog.title")
    }
}

pub fn normalize_title(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_string())
}

pub fn normalize_time(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}

fn round_half_up(value: f64) -> i32 {
    let floor = value.floor();
    let rounded = if value - floor >= 0.5 { floor + 1.0 } else { floor };
    rounded.clamp(i32::MIN as f64, i32::MAX as f64) as i32
}
