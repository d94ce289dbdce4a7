use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TagError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Blocker,
    Critical,
    Major,
    Minor,
    Trivial,
    #[default]
    Unknown,
}

impl Priority {
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "blocker" => Self::Blocker,
            "critical" => Self::Critical,
            "major" => Self::Major,
            "minor" => Self::Minor,
            "trivial" => Self::Trivial,
            _ => Self::Unknown,
        }
    }

    /// Only Critical and Major tickets take part in any analysis.
    pub fn is_high(self) -> bool {
        matches!(self, Self::Critical | Self::Major)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub size_bytes: u64,
}

impl Attachment {
    pub fn category(&self) -> AttachmentCategory {
        AttachmentCategory::from_filename(&self.filename)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub timestamp: DateTime<Utc>,
    pub field: String,
    pub from_value: String,
    pub to_value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub key: String,
    pub created_at: DateTime<Utc>,
    pub priority: Priority,
    pub summary: String,
    pub description: String,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub change_events: Vec<ChangeEvent>,

    // Derived by the enrichment and scoring passes.
    #[serde(default)]
    pub resolution_hours: Option<f64>,
    #[serde(default)]
    pub reopen_count: u32,
    #[serde(default)]
    pub sentiment_score: Option<f64>,
    #[serde(default)]
    pub grammar_score: Option<f64>,
    #[serde(default)]
    pub has_steps_to_reproduce: bool,
    #[serde(default)]
    pub has_stack_trace: bool,
}

impl Ticket {
    pub fn score(&self, kind: ScoreKind) -> Option<f64> {
        match kind {
            ScoreKind::Sentiment => self.sentiment_score,
            ScoreKind::Grammar => self.grammar_score,
        }
    }

    pub fn set_score(&mut self, kind: ScoreKind, value: Option<f64>) {
        match kind {
            ScoreKind::Sentiment => self.sentiment_score = value,
            ScoreKind::Grammar => self.grammar_score = value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreKind {
    Sentiment,
    Grammar,
}

impl fmt::Display for ScoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sentiment => f.write_str("sentiment"),
            Self::Grammar => f.write_str("grammar"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AttachmentCategory {
    Image,
    Text,
    Code,
    Video,
    Archive,
    Config,
    Spreadsheet,
    Other,
}

impl AttachmentCategory {
    /// Classifies by the lower-cased substring after the last `.`.
    /// A filename without an extension is `Other`; an extension nobody
    /// recognises is treated as source code.
    pub fn from_filename(filename: &str) -> Self {
        let ext = match filename.rsplit_once('.') {
            Some((_, ext)) if !ext.is_empty() => ext.to_ascii_lowercase(),
            _ => return Self::Other,
        };

        match ext.as_str() {
            "png" | "jpg" | "jpeg" | "gif" | "bmp" | "svg" | "webp" | "tiff" => Self::Image,
            "md" | "txt" | "pdf" | "log" | "rtf" | "doc" | "docx" | "out" => Self::Text,
            "mp4" | "avi" | "mkv" | "mov" | "webm" | "wmv" => Self::Video,
            "zip" | "tar" | "gz" | "tgz" | "bz2" | "xz" | "rar" | "7z" | "jar" | "war" => {
                Self::Archive
            }
            "xml" | "json" | "yaml" | "yml" | "toml" | "ini" | "properties" | "conf" | "cfg" => {
                Self::Config
            }
            "xls" | "xlsx" | "csv" | "ods" | "tsv" => Self::Spreadsheet,
            _ => Self::Code,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Text => "text",
            Self::Code => "code",
            Self::Video => "video",
            Self::Archive => "archive",
            Self::Config => "config",
            Self::Spreadsheet => "spreadsheet",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for AttachmentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Free-text fields a wordiness analysis can be run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextField {
    Summary,
    Description,
    Comments,
}

impl TextField {
    pub fn tag(self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::Description => "description",
            Self::Comments => "comments",
        }
    }
}

impl FromStr for TextField {
    type Err = TagError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "summary" => Ok(Self::Summary),
            "description" => Ok(Self::Description),
            "comments" | "comment" => Ok(Self::Comments),
            other => Err(TagError::UnknownField(other.to_string())),
        }
    }
}

impl fmt::Display for TextField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One correlation analysis against resolution time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Analysis {
    Wordiness(TextField),
    FieldsComplexity,
    CommentsComplexity,
    Attachments,
    Sentiment,
    Grammar,
    StepsToReproduce,
    StackTraces,
}

impl Analysis {
    pub const ALL: [Analysis; 10] = [
        Self::Wordiness(TextField::Summary),
        Self::Wordiness(TextField::Description),
        Self::Wordiness(TextField::Comments),
        Self::FieldsComplexity,
        Self::CommentsComplexity,
        Self::Attachments,
        Self::Sentiment,
        Self::Grammar,
        Self::StepsToReproduce,
        Self::StackTraces,
    ];

    pub fn title(self) -> String {
        match self {
            Self::Wordiness(field) => format!("Wordiness ({field})"),
            Self::FieldsComplexity => "Fields Complexity".to_string(),
            Self::CommentsComplexity => "Comments Complexity".to_string(),
            Self::Attachments => "Attachments".to_string(),
            Self::Sentiment => "Sentiment".to_string(),
            Self::Grammar => "Grammar Correctness".to_string(),
            Self::StepsToReproduce => "Steps To Reproduce".to_string(),
            Self::StackTraces => "Stack Traces".to_string(),
        }
    }
}

impl FromStr for Analysis {
    type Err = TagError;

    /// Accepts `wordiness:<field>` plus one plain tag per other analysis.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if let Some(field) = value.strip_prefix("wordiness:") {
            return Ok(Self::Wordiness(field.parse()?));
        }
        match value {
            "wordiness" => Err(TagError::MissingField),
            "fields_complexity" => Ok(Self::FieldsComplexity),
            "comments_complexity" => Ok(Self::CommentsComplexity),
            "attachments" => Ok(Self::Attachments),
            "sentiment" => Ok(Self::Sentiment),
            "grammar" => Ok(Self::Grammar),
            "steps_to_reproduce" => Ok(Self::StepsToReproduce),
            "stack_traces" => Ok(Self::StackTraces),
            other => Err(TagError::UnknownAnalysis(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_priority_is_critical_or_major() {
        assert!(Priority::Critical.is_high());
        assert!(Priority::Major.is_high());
        assert!(!Priority::Blocker.is_high());
        assert!(!Priority::Minor.is_high());
        assert!(!Priority::Unknown.is_high());
        assert_eq!(Priority::from_name(" MAJOR "), Priority::Major);
    }

    #[test]
    fn attachment_classification_ignores_case() {
        assert_eq!(AttachmentCategory::from_filename("Screen.PNG"), AttachmentCategory::Image);
        assert_eq!(AttachmentCategory::from_filename("server.log"), AttachmentCategory::Text);
        assert_eq!(AttachmentCategory::from_filename("dump.tar.gz"), AttachmentCategory::Archive);
        assert_eq!(AttachmentCategory::from_filename("app.YML"), AttachmentCategory::Config);
        assert_eq!(AttachmentCategory::from_filename("data.xlsx"), AttachmentCategory::Spreadsheet);
        assert_eq!(AttachmentCategory::from_filename("repro.MKV"), AttachmentCategory::Video);
    }

    #[test]
    fn attachment_classification_is_total() {
        for name in ["Main.java", "patch.diff", "weird.zzz", "README", "trailing.", "", ".gitignore"] {
            let category = AttachmentCategory::from_filename(name);
            assert!(!category.label().is_empty());
        }
        assert_eq!(AttachmentCategory::from_filename("weird.zzz"), AttachmentCategory::Code);
        assert_eq!(AttachmentCategory::from_filename("README"), AttachmentCategory::Other);
        assert_eq!(AttachmentCategory::from_filename("trailing."), AttachmentCategory::Other);
    }

    #[test]
    fn analysis_tags_are_rejected_at_the_boundary() {
        assert_eq!(
            "wordiness:description".parse::<Analysis>().unwrap(),
            Analysis::Wordiness(TextField::Description)
        );
        assert_eq!("stack_traces".parse::<Analysis>().unwrap(), Analysis::StackTraces);
        assert!(matches!("wordiness".parse::<Analysis>(), Err(TagError::MissingField)));
        assert!(matches!(
            "wordiness:title".parse::<Analysis>(),
            Err(TagError::UnknownField(field)) if field == "title"
        ));
        assert!(matches!(
            "velocity".parse::<Analysis>(),
            Err(TagError::UnknownAnalysis(_))
        ));
    }

    #[test]
    fn scores_are_addressed_by_kind() {
        let mut ticket = Ticket::default();
        ticket.set_score(ScoreKind::Grammar, Some(0.8));
        assert_eq!(ticket.score(ScoreKind::Grammar), Some(0.8));
        assert_eq!(ticket.score(ScoreKind::Sentiment), None);
    }
}
