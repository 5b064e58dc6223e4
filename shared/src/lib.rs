use std::fmt;
use std::str::FromStr;

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod comment_file;

pub use comment_file::{
    decode_comment_file, encode_comment_file, CommentFileData, CommentFileError,
    COMMENT_FILE_MAGIC, COMMENT_FILE_VERSION,
};

/// Pin colors offered to users. The first entry is used when a comment carries no color.
pub const PALETTE: [&str; 6] = [
    "#f59e0b", "#ef4444", "#10b981", "#3b82f6", "#8b5cf6", "#ec4899",
];

pub const DEFAULT_COLOR: &str = PALETTE[0];

pub const COORDINATE_MIN: f64 = 0.0;
pub const COORDINATE_MAX: f64 = 100.0;

/// A persisted annotation. `x` and `y` are percentages of the content width and height.
#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved: Option<bool>,
    pub created_at: i64,
}

impl Comment {
    pub fn color_or_default(&self) -> &str {
        self.color.as_deref().unwrap_or(DEFAULT_COLOR)
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.unwrap_or(false)
    }

    /// Merges the fields present in `patch` into this comment.
    pub fn apply(&mut self, patch: &CommentPatch) {
        if let Some(x) = patch.x {
            self.x = x;
        }
        if let Some(y) = patch.y {
            self.y = y;
        }
        if let Some(text) = &patch.text {
            self.text = text.clone();
        }
        if let Some(color) = &patch.color {
            self.color = Some(color.clone());
        }
        if let Some(resolved) = patch.resolved {
            self.resolved = Some(resolved);
        }
    }
}

/// Caller-facing input for creating a comment; the engine supplies `id` and `createdAt`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub x: f64,
    pub y: f64,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved: Option<bool>,
}

impl NewComment {
    pub fn new(x: f64, y: f64, text: impl Into<String>) -> Self {
        Self {
            x,
            y,
            text: text.into(),
            color: None,
            resolved: None,
        }
    }
}

/// A partial update. Absent fields are left untouched.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CommentPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved: Option<bool>,
}

impl CommentPatch {
    pub fn touches_position(&self) -> bool {
        self.x.is_some() || self.y.is_some()
    }

    /// True when applying the patch would change how the pin looks.
    pub fn changes_pin(&self, current: &Comment) -> bool {
        self.x.is_some_and(|x| x != current.x)
            || self.y.is_some_and(|y| y != current.y)
            || self
                .color
                .as_deref()
                .is_some_and(|color| color != current.color_or_default())
            || self
                .resolved
                .is_some_and(|resolved| resolved != current.is_resolved())
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    View,
    Annotate,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::View => "view",
            Mode::Annotate => "annotate",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "view" => Ok(Mode::View),
            "annotate" => Ok(Mode::Annotate),
            other => Err(ValidationError::InvalidMode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{axis} must be a number between 0 and 100, got {value}")]
    CoordinateOutOfRange { axis: char, value: f64 },
    #[error("comment text must not be empty")]
    EmptyText,
    #[error("invalid mode {0:?}, expected \"view\" or \"annotate\"")]
    InvalidMode(String),
}

pub fn validate_coordinate(axis: char, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && (COORDINATE_MIN..=COORDINATE_MAX).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::CoordinateOutOfRange { axis, value })
    }
}

pub fn validate_position(x: f64, y: f64) -> Result<(), ValidationError> {
    validate_coordinate('x', x)?;
    validate_coordinate('y', y)
}

pub fn validate_text(text: &str) -> Result<(), ValidationError> {
    if text.trim().is_empty() {
        return Err(ValidationError::EmptyText);
    }
    Ok(())
}

pub fn validate_comment(comment: &Comment) -> Result<(), ValidationError> {
    validate_text(&comment.text)?;
    validate_position(comment.x, comment.y)
}
