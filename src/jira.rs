//! Jira REST issue payloads (`/rest/api/2/search?expand=changelog`) mapped
//! onto [`Ticket`].

use anyhow::{bail, Context};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;

use crate::models::{Attachment, ChangeEvent, Comment, Priority, Ticket};

/// Tickets read from one payload, plus how many issues were left out.
#[derive(Debug, Default)]
pub struct ImportBatch {
    pub tickets: Vec<Ticket>,
    pub skipped: usize,
}

#[derive(Deserialize)]
struct Issue {
    key: String,
    fields: Fields,
    #[serde(default)]
    changelog: Changelog,
}

#[derive(Deserialize)]
struct Fields {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, deserialize_with = "jira_time")]
    created: Option<DateTime<Utc>>,
    #[serde(default)]
    priority: Option<JiraPriority>,
    #[serde(default, rename = "attachment")]
    attachments: Vec<JiraAttachment>,
    #[serde(default)]
    comment: Option<Comments>,
}

#[derive(Deserialize)]
struct JiraPriority {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
struct JiraAttachment {
    #[serde(default)]
    filename: String,
    #[serde(default)]
    size: u64,
}

#[derive(Deserialize, Default)]
struct Comments {
    #[serde(default)]
    comments: Vec<JiraComment>,
}

#[derive(Deserialize)]
struct JiraComment {
    #[serde(default)]
    body: Option<String>,
    #[serde(default, deserialize_with = "jira_time")]
    created: Option<DateTime<Utc>>,
}

#[derive(Deserialize, Default)]
struct Changelog {
    #[serde(default)]
    histories: Vec<History>,
}

#[derive(Deserialize)]
struct History {
    #[serde(default, deserialize_with = "jira_time")]
    created: Option<DateTime<Utc>>,
    #[serde(default)]
    items: Vec<HistoryItem>,
}

#[derive(Deserialize)]
struct HistoryItem {
    #[serde(default)]
    field: String,
    #[serde(default, rename = "fromString")]
    from_string: Option<String>,
    #[serde(default, rename = "toString")]
    to_string: Option<String>,
}

/// Parses either a search response (`{"issues": [...]}`) or a bare array.
/// An issue that cannot be read is logged and skipped; only a payload
/// with no issue list at all is an error.
pub fn parse_issues(json: &str) -> anyhow::Result<ImportBatch> {
    let payload: Value = serde_json::from_str(json).context("invalid Jira issue payload")?;
    let issues = match payload {
        Value::Array(issues) => issues,
        Value::Object(mut search) => match search.remove("issues") {
            Some(Value::Array(issues)) => issues,
            _ => bail!("Jira search payload has no `issues` array"),
        },
        _ => bail!("Jira payload must be an issue array or a search response"),
    };

    let mut batch = ImportBatch::default();
    for value in issues {
        let key = value
            .get("key")
            .and_then(Value::as_str)
            .unwrap_or("<no key>")
            .to_string();
        let parsed = serde_json::from_value::<Issue>(value)
            .map_err(anyhow::Error::from)
            .and_then(into_ticket);
        match parsed {
            Ok(ticket) => batch.tickets.push(ticket),
            Err(error) => {
                warn!(key = %key, error = %error, "skipping unreadable Jira issue");
                batch.skipped += 1;
            }
        }
    }

    Ok(batch)
}

fn into_ticket(issue: Issue) -> anyhow::Result<Ticket> {
    let fields = issue.fields;
    let Some(created_at) = fields.created else {
        bail!("issue has no created timestamp");
    };

    // History items share the timestamp of their history entry; the
    // stored order is kept as-is.
    let mut change_events = Vec::new();
    for history in issue.changelog.histories {
        let Some(timestamp) = history.created else {
            bail!("changelog entry has no created timestamp");
        };
        change_events.extend(history.items.into_iter().map(|item| ChangeEvent {
            timestamp,
            field: item.field,
            from_value: item.from_string.unwrap_or_default(),
            to_value: item.to_string.unwrap_or_default(),
        }));
    }

    Ok(Ticket {
        key: issue.key,
        created_at,
        priority: fields.priority.map(resolve_priority).unwrap_or_default(),
        summary: fields.summary.unwrap_or_default(),
        description: fields.description.unwrap_or_default(),
        comments: fields
            .comment
            .unwrap_or_default()
            .comments
            .into_iter()
            .map(|comment| Comment {
                body: comment.body.unwrap_or_default(),
                created_at: comment.created.unwrap_or(created_at),
            })
            .collect(),
        attachments: fields
            .attachments
            .into_iter()
            .map(|attachment| Attachment {
                filename: attachment.filename,
                size_bytes: attachment.size,
            })
            .collect(),
        change_events,
        ..Default::default()
    })
}

fn resolve_priority(priority: JiraPriority) -> Priority {
    let by_name = priority
        .name
        .as_deref()
        .map(Priority::from_name)
        .unwrap_or_default();
    if by_name != Priority::Unknown {
        return by_name;
    }
    match priority.id.as_deref() {
        Some("1") => Priority::Critical,
        Some("2") => Priority::Major,
        _ => Priority::Unknown,
    }
}

pub fn parse_jira_time(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// `null` and absent timestamps read as `None`; a present but unreadable
/// one is an error.
fn jira_time<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|value| {
        parse_jira_time(&value).ok_or_else(|| {
            serde::de::Error::custom(format!("unrecognised Jira timestamp `{value}`"))
        })
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SEARCH: &str = r#"{
        "issues": [{
            "key": "HDFS-42",
            "fields": {
                "summary": "NameNode crash",
                "description": "java.io.IOException: disk\n\tat a.B.c(B.java:1)\n\tat a.B.d(B.java:2)",
                "created": "2017-01-10T10:00:00.000+0000",
                "priority": {"id": "2", "name": "Major"},
                "attachment": [{"filename": "nn.log", "size": 2048}],
                "comment": {"comments": [
                    {"body": "looking", "created": "2017-01-10T12:00:00.000+0000"}
                ]}
            },
            "changelog": {"histories": [
                {"created": "2017-01-11T10:00:00.000+0000", "items": [
                    {"field": "assignee", "fromString": null, "toString": "alice"},
                    {"field": "status", "fromString": "Open", "toString": "Closed"}
                ]}
            ]}
        }]
    }"#;

    #[test]
    fn parses_search_payload() {
        let batch = parse_issues(SEARCH).unwrap();
        assert_eq!(batch.skipped, 0);
        let tickets = batch.tickets;
        assert_eq!(tickets.len(), 1);
        let ticket = &tickets[0];

        assert_eq!(ticket.key, "HDFS-42");
        assert_eq!(ticket.priority, Priority::Major);
        assert_eq!(ticket.attachments[0].size_bytes, 2048);
        assert_eq!(ticket.comments[0].body, "looking");
        assert_eq!(ticket.change_events.len(), 2);
        assert_eq!(ticket.change_events[0].from_value, "");
        assert_eq!(ticket.change_events[1].to_value, "Closed");
        assert_eq!(
            ticket.change_events[1].timestamp,
            Utc.with_ymd_and_hms(2017, 1, 11, 10, 0, 0).unwrap()
        );
        assert_eq!(ticket.resolution_hours, None);
    }

    #[test]
    fn parses_bare_array_with_sparse_fields() {
        let json = r#"[{"key": "X-1", "fields": {"created": "2020-02-03", "priority": {"id": "1"}}}]"#;
        let tickets = parse_issues(json).unwrap().tickets;

        assert_eq!(tickets[0].priority, Priority::Critical);
        assert_eq!(
            tickets[0].created_at,
            Utc.with_ymd_and_hms(2020, 2, 3, 0, 0, 0).unwrap()
        );
        assert!(tickets[0].change_events.is_empty());
        assert!(tickets[0].description.is_empty());
    }

    #[test]
    fn timestamps_keep_their_offset() {
        let parsed = parse_jira_time("2017-01-10T10:00:00.000-0500").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2017, 1, 10, 15, 0, 0).unwrap());
        assert!(parse_jira_time("yesterday").is_none());
    }

    #[test]
    fn malformed_payload_is_an_error() {
        assert!(parse_issues(r#"{"total": 0}"#).is_err());
        assert!(parse_issues(r#""issues""#).is_err());
        assert!(parse_issues("not json").is_err());
    }

    #[test]
    fn bad_issues_are_skipped_not_fatal() {
        let json = r#"{"issues": [
            {"key": "OK-1", "fields": {
                "created": "2017-01-10T10:00:00.000+0000",
                "comment": {"comments": [{"body": "undated"}]}
            }},
            {"key": "BAD-2", "fields": {"summary": "no created"}},
            {"key": "BAD-3", "fields": {"created": "10/01/2017"}},
            {"key": "BAD-4", "fields": {"created": null}},
            {"key": "BAD-5", "fields": {"created": "2017-01-10T10:00:00.000+0000"},
             "changelog": {"histories": [{"created": null, "items": []}]}},
            42
        ]}"#;

        let batch = parse_issues(json).unwrap();

        assert_eq!(batch.skipped, 5);
        assert_eq!(batch.tickets.len(), 1);
        let ticket = &batch.tickets[0];
        assert_eq!(ticket.key, "OK-1");
        assert_eq!(ticket.comments[0].created_at, ticket.created_at);
    }

    #[test]
    fn null_created_never_becomes_the_epoch() {
        let json = r#"[{"key": "N-1", "fields": {"created": null},
            "changelog": {"histories": [{"created": "2017-01-10T10:00:00.000+0000",
                "items": [{"field": "status", "fromString": "Open", "toString": "Closed"}]}]}}]"#;

        let batch = parse_issues(json).unwrap();

        assert!(batch.tickets.is_empty());
        assert_eq!(batch.skipped, 1);
    }
}
