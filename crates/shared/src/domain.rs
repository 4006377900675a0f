use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RunConfigError;

pub const MIN_POSTS_TO_PROCESS: u8 = 1;
pub const MAX_POSTS_TO_PROCESS: u8 = 20;
pub const DEFAULT_POSTS_TO_PROCESS: u8 = 5;

/// Parameters of one agent run, serialized as the body of `POST /agent/start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    pub auto_comment: bool,
    pub auto_like: bool,
    pub max_posts_to_process: u8,
    pub cookie_json: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            auto_comment: true,
            auto_like: true,
            max_posts_to_process: DEFAULT_POSTS_TO_PROCESS,
            cookie_json: String::new(),
        }
    }
}

impl RunConfig {
    pub fn new(cookie_json: impl Into<String>) -> Self {
        Self {
            cookie_json: cookie_json.into(),
            ..Self::default()
        }
    }

    pub fn with_max_posts_input(mut self, raw: &str) -> Self {
        self.max_posts_to_process = normalize_max_posts(raw);
        self
    }

    /// Checks the only constraints enforced before contacting the backend.
    pub fn validate(&self) -> Result<(), RunConfigError> {
        if !(MIN_POSTS_TO_PROCESS..=MAX_POSTS_TO_PROCESS).contains(&self.max_posts_to_process) {
            return Err(RunConfigError::MaxPostsOutOfRange(self.max_posts_to_process));
        }
        serde_json::from_str::<serde_json::Value>(&self.cookie_json)
            .map_err(|err| RunConfigError::InvalidCookieJson(err.to_string()))?;
        Ok(())
    }
}

/// Normalizes free-form "max posts" input the way a numeric form field would:
/// the leading integer is taken, anything unparseable falls back to the minimum,
/// and the result is clamped into the accepted range.
pub fn normalize_max_posts(raw: &str) -> u8 {
    match parse_leading_integer(raw) {
        Some(value) => value.clamp(
            i64::from(MIN_POSTS_TO_PROCESS),
            i64::from(MAX_POSTS_TO_PROCESS),
        ) as u8,
        None => MIN_POSTS_TO_PROCESS,
    }
}

fn parse_leading_integer(raw: &str) -> Option<i64> {
    let trimmed = raw.trim_start();
    let (negative, digits) = if let Some(rest) = trimmed.strip_prefix('-') {
        (true, rest)
    } else if let Some(rest) = trimmed.strip_prefix('+') {
        (false, rest)
    } else {
        (false, trimmed)
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let magnitude = digits[..end].bytes().fold(0i64, |acc, digit| {
        acc.saturating_mul(10)
            .saturating_add(i64::from(digit - b'0'))
    });
    Some(if negative { -magnitude } else { magnitude })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    Status,
    Log,
    Result,
    Error,
    Summary,
}

impl LogKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LogKind::Status => "status",
            LogKind::Log => "log",
            LogKind::Result => "result",
            LogKind::Error => "error",
            LogKind::Summary => "summary",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,
    pub kind: LogKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default)]
    pub dry_run: bool,
    pub received_at: DateTime<Utc>,
}

impl LogEntry {
    pub fn new(id: u64, kind: LogKind, message: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            message: message.into(),
            author: None,
            comment: None,
            dry_run: false,
            received_at: Utc::now(),
        }
    }

    /// An entry whose id is assigned later by the log that stores it.
    pub fn unnumbered(kind: LogKind, message: impl Into<String>) -> Self {
        Self::new(0, kind, message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectorField {
    PostContainer,
    AuthorSelector,
    ContentSelector,
    LikeButton,
    CommentButton,
    CommentTextbox,
    CommentPostButton,
}

impl SelectorField {
    pub const ALL: [SelectorField; 7] = [
        SelectorField::PostContainer,
        SelectorField::AuthorSelector,
        SelectorField::ContentSelector,
        SelectorField::LikeButton,
        SelectorField::CommentButton,
        SelectorField::CommentTextbox,
        SelectorField::CommentPostButton,
    ];

    pub fn key(self) -> &'static str {
        match self {
            SelectorField::PostContainer => "post_container",
            SelectorField::AuthorSelector => "author_selector",
            SelectorField::ContentSelector => "content_selector",
            SelectorField::LikeButton => "like_button",
            SelectorField::CommentButton => "comment_button",
            SelectorField::CommentTextbox => "comment_textbox",
            SelectorField::CommentPostButton => "comment_post_button",
        }
    }

    pub fn label(self) -> String {
        self.key().replace('_', " ")
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.key() == key)
    }
}

/// CSS selectors the remote agent uses to locate feed elements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorSet {
    #[serde(default, alias = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub post_container: String,
    pub author_selector: String,
    pub content_selector: String,
    pub like_button: String,
    pub comment_button: String,
    pub comment_textbox: String,
    pub comment_post_button: String,
}

impl Default for SelectorSet {
    fn default() -> Self {
        Self {
            id: None,
            post_container: "div.feed-shared-update-v2".into(),
            author_selector:
                ".update-components-actor__single-line-truncate span[aria-hidden='true']".into(),
            content_selector: ".update-components-update-v2__commentary".into(),
            like_button: "button.react-button__trigger".into(),
            comment_button: "button.comment-button".into(),
            comment_textbox: "div.ql-editor[contenteditable='true']".into(),
            comment_post_button: "button.comments-comment-box__submit-button--cr".into(),
        }
    }
}

impl SelectorSet {
    pub fn get(&self, field: SelectorField) -> &str {
        match field {
            SelectorField::PostContainer => &self.post_container,
            SelectorField::AuthorSelector => &self.author_selector,
            SelectorField::ContentSelector => &self.content_selector,
            SelectorField::LikeButton => &self.like_button,
            SelectorField::CommentButton => &self.comment_button,
            SelectorField::CommentTextbox => &self.comment_textbox,
            SelectorField::CommentPostButton => &self.comment_post_button,
        }
    }

    pub fn get_mut(&mut self, field: SelectorField) -> &mut String {
        match field {
            SelectorField::PostContainer => &mut self.post_container,
            SelectorField::AuthorSelector => &mut self.author_selector,
            SelectorField::ContentSelector => &mut self.content_selector,
            SelectorField::LikeButton => &mut self.like_button,
            SelectorField::CommentButton => &mut self.comment_button,
            SelectorField::CommentTextbox => &mut self.comment_textbox,
            SelectorField::CommentPostButton => &mut self.comment_post_button,
        }
    }

    pub fn set(&mut self, field: SelectorField, value: impl Into<String>) {
        *self.get_mut(field) = value.into();
    }
}
