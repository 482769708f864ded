use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Content category chosen by the uploader. Only drives download disposition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContentCategory {
    Application,
    Audio,
    #[default]
    File,
    Video,
}

impl ContentCategory {
    /// Files and applications are forced to download; media plays inline.
    pub fn disposition(self) -> Disposition {
        match self {
            ContentCategory::File | ContentCategory::Application => Disposition::Attachment,
            ContentCategory::Audio | ContentCategory::Video => Disposition::Inline,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContentCategory::Application => "APPLICATION",
            ContentCategory::Audio => "AUDIO",
            ContentCategory::File => "FILE",
            ContentCategory::Video => "VIDEO",
        }
    }
}

impl fmt::Display for ContentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCategory(pub String);

impl fmt::Display for UnknownCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown content category '{}' (expected FILE, VIDEO, AUDIO or APPLICATION)",
            self.0
        )
    }
}

impl std::error::Error for UnknownCategory {}

impl FromStr for ContentCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "APPLICATION" => Ok(ContentCategory::Application),
            "AUDIO" => Ok(ContentCategory::Audio),
            "FILE" => Ok(ContentCategory::File),
            "VIDEO" => Ok(ContentCategory::Video),
            _ => Err(UnknownCategory(s.to_string())),
        }
    }
}

/// How a download should be presented by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Attachment,
    Inline,
}

/// A file record stored in the catalog.
///
/// Only `is_public` and `public_key` change after insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    pub owner_id: String,
    pub object_key: String,
    pub original_name: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    pub category: ContentCategory,
    pub size_bytes: u64,
    pub mime_type: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub public_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Visibility change applied by the sharing paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareUpdate {
    /// Make the file public. The key is only stored if the record has none yet.
    Enable { public_key: String },
    /// Make the file private again, keeping any issued key.
    Disable,
}
