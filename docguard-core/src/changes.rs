//! Changes feed parameters and results.
//!
//! A changes feed is an ordered, cursor-paginated stream of document mutations for a
//! collection. Callers address it with four query parameters only: `feed`, `style`,
//! `since` and `limit`. The mediator turns those into a validated [`ChangesQuery`].

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::StoreError;

/// How the feed is delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedMode {
    /// Return the changes so far and close.
    #[default]
    Normal,
    /// Wait for at least one change before answering.
    Longpoll,
    /// Keep streaming changes as they happen.
    Continuous,
    /// Continuous, framed as server-sent events.
    EventSource,
}

impl FeedMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedMode::Normal => "normal",
            FeedMode::Longpoll => "longpoll",
            FeedMode::Continuous => "continuous",
            FeedMode::EventSource => "eventsource",
        }
    }
}

/// An empty value selects [`FeedMode::Normal`].
impl FromStr for FeedMode {
    type Err = StoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "" | "normal" => Ok(FeedMode::Normal),
            "longpoll" => Ok(FeedMode::Longpoll),
            "continuous" => Ok(FeedMode::Continuous),
            "eventsource" => Ok(FeedMode::EventSource),
            other => Err(StoreError::InvalidFeedMode(other.to_string())),
        }
    }
}

impl fmt::Display for FeedMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which revisions are listed for each changed document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedStyle {
    /// Only the winning revision.
    #[default]
    MainOnly,
    /// Every leaf revision, conflicts included.
    AllDocs,
}

impl FeedStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedStyle::MainOnly => "main_only",
            FeedStyle::AllDocs => "all_docs",
        }
    }
}

/// An empty value selects [`FeedStyle::MainOnly`].
impl FromStr for FeedStyle {
    type Err = StoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "" | "main_only" => Ok(FeedStyle::MainOnly),
            "all_docs" => Ok(FeedStyle::AllDocs),
            other => Err(StoreError::InvalidFeedStyle(other.to_string())),
        }
    }
}

impl fmt::Display for FeedStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated parameters of a changes feed read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangesQuery {
    pub feed: FeedMode,
    pub style: FeedStyle,
    /// Opaque cursor; `None` starts from the beginning of the feed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<String>,
    /// Maximum number of results; `None` is unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
}

/// One revision listed for a changed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRev {
    pub rev: String,
}

/// One entry of the changes feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub id: String,
    pub seq: String,
    pub changes: Vec<ChangeRev>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deleted: bool,
}

/// A page of the changes feed, returned by the store as is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangesResponse {
    /// Cursor to pass as `since` to continue after this page.
    pub last_seq: String,
    /// Number of changes left after this page.
    pub pending: u64,
    pub results: Vec<Change>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_values_select_defaults() {
        assert_eq!("".parse::<FeedMode>(), Ok(FeedMode::Normal));
        assert_eq!("".parse::<FeedStyle>(), Ok(FeedStyle::MainOnly));
    }

    #[test]
    fn parses_every_mode_and_style() {
        for mode in [
            FeedMode::Normal,
            FeedMode::Longpoll,
            FeedMode::Continuous,
            FeedMode::EventSource,
        ] {
            assert_eq!(mode.as_str().parse::<FeedMode>(), Ok(mode));
        }
        for style in [FeedStyle::MainOnly, FeedStyle::AllDocs] {
            assert_eq!(style.as_str().parse::<FeedStyle>(), Ok(style));
        }
    }

    #[test]
    fn rejects_unknown_values() {
        assert_eq!(
            "sometimes".parse::<FeedMode>(),
            Err(StoreError::InvalidFeedMode("sometimes".into()))
        );
        assert_eq!(
            "Main_Only".parse::<FeedStyle>(),
            Err(StoreError::InvalidFeedStyle("Main_Only".into()))
        );
    }

    #[test]
    fn response_omits_false_deleted_flag() {
        let response = ChangesResponse {
            last_seq: "2".into(),
            pending: 0,
            results: vec![
                Change {
                    id: "a".into(),
                    seq: "1".into(),
                    changes: vec![ChangeRev { rev: "1-x".into() }],
                    deleted: false,
                },
                Change {
                    id: "b".into(),
                    seq: "2".into(),
                    changes: vec![ChangeRev { rev: "2-y".into() }],
                    deleted: true,
                },
            ],
        };

        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "last_seq": "2",
                "pending": 0,
                "results": [
                    { "id": "a", "seq": "1", "changes": [{ "rev": "1-x" }] },
                    { "id": "b", "seq": "2", "changes": [{ "rev": "2-y" }], "deleted": true }
                ]
            })
        );
    }
}
