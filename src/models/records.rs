use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Records that carry a server-assigned identifier
pub trait Record {
    /// Opaque identifier assigned by the remote service
    fn id(&self) -> &str;
}

/// Format an ISO 8601 timestamp as `%Y-%m-%d %H:%M`
pub fn format_timestamp(raw: &str) -> Option<String> {
    parse_timestamp(raw).map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
}

/// Formatted timestamp, or the raw string when it does not parse
fn display_timestamp(raw: &str) -> String {
    format_timestamp(raw).unwrap_or_else(|| raw.to_string())
}

/// Formatted optional timestamp: "Never" when absent, "Unknown" when unparseable
fn display_optional_timestamp(raw: Option<&str>) -> String {
    match raw {
        None => "Never".to_string(),
        Some(value) => format_timestamp(value).unwrap_or_else(|| "Unknown".to_string()),
    }
}

/// Capitalize the first letter of every alphabetic run, lowercase the rest
pub fn title_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut prev_alpha = false;
    for ch in input.chars() {
        if ch.is_alphabetic() {
            if prev_alpha {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(ch);
            prev_alpha = false;
        }
    }
    out
}

/// Truncate to `max_chars`, replacing the tail with `...` when cut
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// A user profile
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub occupation: Option<String>,
    #[serde(default)]
    pub primary_company: Option<String>,
    #[serde(default)]
    pub key_skills: Option<String>,
    #[serde(default)]
    pub main_goals: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub safe_mode: bool,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub preferences: Map<String, JsonValue>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub subscription_tier: Option<String>,
    #[serde(default)]
    pub usage_stats: Option<Map<String, JsonValue>>,
}

impl Profile {
    /// Greeting built from the first name
    pub fn greeting(&self) -> String {
        match self.full_name.split_whitespace().next() {
            Some(first) => format!("Welcome back, {}!", first),
            None => "Welcome to SelfLayer!".to_string(),
        }
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.full_name
    }

    pub fn email_display(&self) -> String {
        self.email.clone().unwrap_or_else(|| "Not provided".to_string())
    }

    pub fn subscription_display(&self) -> String {
        self.subscription_tier.clone().unwrap_or_else(|| "Free".to_string())
    }

    pub fn occupation_display(&self) -> String {
        not_specified(self.occupation.as_deref())
    }

    pub fn company_display(&self) -> String {
        not_specified(self.primary_company.as_deref())
    }

    pub fn skills_display(&self) -> String {
        not_specified(self.key_skills.as_deref())
    }

    pub fn timezone_display(&self) -> String {
        not_specified(self.timezone.as_deref())
    }

    pub fn safe_mode_display(&self) -> &'static str {
        if self.safe_mode { "Enabled" } else { "Disabled" }
    }

    /// Month and year the account was created, e.g. "March 2024"
    pub fn member_since(&self) -> String {
        self.created_at
            .as_deref()
            .and_then(parse_timestamp)
            .map(|dt| dt.format("%B %Y").to_string())
            .unwrap_or_else(|| "Unknown".to_string())
    }

    /// Usage counter from `usage_stats`, zero when missing
    pub fn usage_count(&self, key: &str) -> u64 {
        self.usage_stats
            .as_ref()
            .and_then(|stats| stats.get(key))
            .and_then(|value| value.as_u64())
            .unwrap_or(0)
    }
}

fn not_specified(value: Option<&str>) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v.to_string(),
        _ => "Not specified".to_string(),
    }
}

/// An ingested document
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Document {
    pub id: String,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub keywords: Option<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default = "default_visibility")]
    pub visibility: String,
    #[serde(default)]
    pub content_type: Option<String>,
}

fn default_visibility() -> String {
    "personal".to_string()
}

impl Record for Document {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Document {
    /// Title derived from the file name without its extension
    pub fn title(&self) -> String {
        let stem = match self.file_name.rsplit_once('.') {
            Some((stem, _)) => stem,
            None => self.file_name.as_str(),
        };
        title_case(&stem.replace(['_', '-'], " "))
    }

    /// Status in title case, e.g. "Fully Processed"
    pub fn processing_status(&self) -> String {
        title_case(&self.status.to_lowercase().replace('_', " "))
    }

    pub fn status_emoji(&self) -> &'static str {
        match self.status.to_lowercase().as_str() {
            "fully_processed" | "fully processed" => "✅",
            "processing" => "⏳",
            "failed" => "❌",
            "pending" => "📄",
            _ => "❓",
        }
    }

    /// Human-readable file size
    pub fn size_display(&self) -> String {
        let Some(bytes) = self.file_size.filter(|size| *size > 0) else {
            return "Unknown size".to_string();
        };
        let mut size = bytes as f64;
        for unit in ["B", "KB", "MB", "GB"] {
            if size < 1024.0 {
                return format!("{:.1} {}", size, unit);
            }
            size /= 1024.0;
        }
        format!("{:.1} TB", size)
    }

    pub fn created_display(&self) -> String {
        display_timestamp(&self.created_at)
    }

    pub fn summary_display(&self) -> String {
        match self.summary.as_deref() {
            Some(summary) if !summary.trim().is_empty() => summary.to_string(),
            _ => "No summary available".to_string(),
        }
    }
}

/// A user note
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Note {
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub processing_error: Option<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_visibility")]
    pub visibility: String,
}

impl Record for Note {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Note {
    /// Content cut to `max_length` characters
    pub fn preview(&self, max_length: usize) -> String {
        truncate_chars(&self.content, max_length)
    }

    pub fn tags_display(&self) -> String {
        if self.tags.is_empty() {
            "No tags".to_string()
        } else {
            self.tags.join(", ")
        }
    }

    pub fn created_display(&self) -> String {
        display_timestamp(&self.created_at)
    }

    pub fn updated_display(&self) -> String {
        display_timestamp(&self.updated_at)
    }
}

/// A connected third-party account
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Integration {
    pub id: String,
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub account_identifier: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub is_sync_enabled: bool,
    #[serde(default)]
    pub is_retrieval_enabled: bool,
    #[serde(default)]
    pub is_syncable: bool,
    #[serde(default)]
    pub sync_status: String,
    #[serde(default)]
    pub last_synced_at: Option<String>,
    #[serde(default)]
    pub last_sync_error: Option<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Record for Integration {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Integration {
    pub fn provider_emoji(&self) -> &'static str {
        match self.provider.to_lowercase().as_str() {
            "gmail" => "📧",
            "gdrive" => "📁",
            "notion" => "📝",
            "slack" => "💬",
            "trello" => "📋",
            "linear" => "🎯",
            "gcal" => "📅",
            _ => "🔗",
        }
    }

    pub fn status_emoji(&self) -> &'static str {
        match self.sync_status.to_lowercase().as_str() {
            "success" => "✅",
            "never_synced" => "⭕",
            "error" => "❌",
            "syncing" => "🔄",
            _ => "❓",
        }
    }

    pub fn created_display(&self) -> String {
        display_timestamp(&self.created_at)
    }

    pub fn last_sync_display(&self) -> String {
        display_optional_timestamp(self.last_synced_at.as_deref())
    }

    pub fn tags_display(&self) -> String {
        if self.tags.is_empty() {
            "No tags".to_string()
        } else {
            self.tags.join(", ")
        }
    }
}

/// A scheduled or manual AI automation
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Automation {
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub trigger_slug: Option<String>,
    #[serde(default)]
    pub cron_schedule: Option<String>,
    #[serde(default)]
    pub is_enabled: bool,
    #[serde(default)]
    pub last_run_at: Option<String>,
    #[serde(default)]
    pub last_run_status: Option<String>,
    #[serde(default)]
    pub last_run_message: Option<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl Record for Automation {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Automation {
    pub fn type_emoji(&self) -> &'static str {
        match self.kind.to_lowercase().as_str() {
            "manual" => "🎯",
            "cron" => "⏰",
            "trigger" => "⚡",
            _ => "🔄",
        }
    }

    pub fn status_emoji(&self) -> &'static str {
        match self.last_run_status.as_deref().map(str::to_lowercase).as_deref() {
            Some("success") => "✅",
            Some("error") | Some("failed") => "❌",
            Some("running") => "🔄",
            Some("pending") => "⏳",
            _ => "❓",
        }
    }

    /// Human-readable schedule
    pub fn schedule_display(&self) -> String {
        match (self.kind.as_str(), &self.trigger_slug, &self.cron_schedule) {
            ("manual", _, _) => "Manual".to_string(),
            ("trigger", Some(slug), _) => format!("Trigger: {}", title_case(&slug.replace('_', " "))),
            ("cron", _, Some(cron)) => match cron.as_str() {
                "0 9 * * *" => "Daily at 9:00 AM".to_string(),
                "0 */1 * * *" => "Every hour".to_string(),
                "*/5 * * * *" => "Every 5 minutes".to_string(),
                "0 0 * * 0" => "Weekly on Sunday".to_string(),
                other => format!("Cron: {}", other),
            },
            _ => "Unknown".to_string(),
        }
    }

    pub fn enabled_display(&self) -> &'static str {
        if self.is_enabled { "✅ Enabled" } else { "⏸️ Disabled" }
    }

    pub fn last_run_display(&self) -> String {
        display_optional_timestamp(self.last_run_at.as_deref())
    }

    pub fn last_status_display(&self) -> String {
        self.last_run_status.clone().unwrap_or_else(|| "Never run".to_string())
    }

    pub fn created_display(&self) -> String {
        display_timestamp(&self.created_at)
    }
}

/// A server-originated notification
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Notification {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub datetime: String,
}

impl Record for Notification {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Notification {
    pub fn type_emoji(&self) -> &'static str {
        match self.kind.as_str() {
            "info" => "ℹ️",
            "success" => "✅",
            "warning" => "⚠️",
            "error" => "❌",
            "document" => "📄",
            "note" => "📝",
            "integration" => "🔗",
            _ => "📢",
        }
    }

    pub fn read_marker(&self) -> &'static str {
        if self.read { "✅" } else { "⭕" }
    }

    pub fn created_display(&self) -> String {
        display_timestamp(&self.datetime)
    }
}

/// Combined knowledge-base search results
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SearchResult {
    #[serde(default)]
    pub user_profile: Option<JsonValue>,
    #[serde(default)]
    pub graph_results: Vec<JsonValue>,
    #[serde(default)]
    pub graph_relationships: Vec<JsonValue>,
    #[serde(default)]
    pub document_summaries: Vec<JsonValue>,
    #[serde(default)]
    pub source_chunks: Vec<JsonValue>,
    #[serde(default)]
    pub conversation_history: Vec<JsonValue>,
    #[serde(default)]
    pub honcho_insights: Vec<JsonValue>,
}

impl SearchResult {
    /// Total across every result section except relationships
    pub fn total_results(&self) -> usize {
        self.graph_results.len()
            + self.document_summaries.len()
            + self.source_chunks.len()
            + self.conversation_history.len()
            + self.honcho_insights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total_results() == 0
    }
}

/// Profile block of a persona briefing
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PersonaProfile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
}

impl PersonaProfile {
    /// "Title at Company", whichever parts are present
    pub fn role_line(&self) -> Option<String> {
        match (self.title.as_deref(), self.company.as_deref()) {
            (Some(title), Some(company)) => Some(format!("{} at {}", title, company)),
            (Some(title), None) => Some(title.to_string()),
            (None, Some(company)) => Some(company.to_string()),
            (None, None) => None,
        }
    }
}

/// An action suggested by the persona agent
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProposedAction {
    pub short_display: String,
    #[serde(default)]
    pub execution_payload: JsonValue,
}

/// Relationship micro-summary for a person
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PersonaAgentResponse {
    pub rms: String,
    pub profile: PersonaProfile,
    #[serde(default)]
    pub proposed_actions: Vec<ProposedAction>,
}

/// Random memory surfacing result
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SurfaceResult {
    #[serde(default)]
    pub intent: String,
    #[serde(default)]
    pub content: String,
}

/// Non-streaming answer from the AI assistant
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AskResponse {
    #[serde(default)]
    pub data: AskData,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AskData {
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub suggested_followups: Vec<String>,
    #[serde(default)]
    pub proposed_actions: Vec<JsonValue>,
}

impl AskResponse {
    pub fn answer(&self) -> &str {
        self.data.response.as_deref().unwrap_or("No response received")
    }
}

/// Text carried by one streamed answer chunk (`data.response` or `content`)
pub fn stream_chunk_text(chunk: &JsonValue) -> Option<&str> {
    chunk
        .get("data")
        .and_then(|data| data.get("response"))
        .and_then(JsonValue::as_str)
        .or_else(|| chunk.get("content").and_then(JsonValue::as_str))
}

/// Short label for an arbitrary proposed-action value
pub fn action_label(action: &JsonValue) -> String {
    match action {
        JsonValue::String(text) => text.clone(),
        JsonValue::Object(obj) => obj
            .get("short_display")
            .or_else(|| obj.get("title"))
            .and_then(JsonValue::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| action.to_string()),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document(file_name: &str, status: &str, size: Option<u64>) -> Document {
        serde_json::from_value(json!({
            "id": "doc-1",
            "file_name": file_name,
            "status": status,
            "file_size": size,
            "created_at": "2024-03-05T14:30:00Z",
            "updated_at": "2024-03-05T14:30:00Z",
        }))
        .unwrap()
    }

    #[test]
    fn test_document_title_from_file_name() {
        assert_eq!(document("quarterly_report-final.pdf", "PENDING", None).title(), "Quarterly Report Final");
        assert_eq!(document("archive.tar.gz", "PENDING", None).title(), "Archive.Tar");
        assert_eq!(document("README", "PENDING", None).title(), "Readme");
    }

    #[test]
    fn test_document_status() {
        let doc = document("a.txt", "FULLY_PROCESSED", None);
        assert_eq!(doc.status_emoji(), "✅");
        assert_eq!(doc.processing_status(), "Fully Processed");
        assert_eq!(document("a.txt", "weird", None).status_emoji(), "❓");
    }

    #[test]
    fn test_document_size_display() {
        assert_eq!(document("a", "x", None).size_display(), "Unknown size");
        assert_eq!(document("a", "x", Some(512)).size_display(), "512.0 B");
        assert_eq!(document("a", "x", Some(2048)).size_display(), "2.0 KB");
        assert_eq!(document("a", "x", Some(5 * 1024 * 1024)).size_display(), "5.0 MB");
    }

    #[test]
    fn test_timestamps() {
        assert_eq!(format_timestamp("2024-03-05T14:30:00Z").as_deref(), Some("2024-03-05 14:30"));
        assert_eq!(format_timestamp("2024-03-05T14:30:00.123456").as_deref(), Some("2024-03-05 14:30"));
        assert_eq!(format_timestamp("yesterday"), None);
        assert_eq!(document("a", "x", None).created_display(), "2024-03-05 14:30");
    }

    #[test]
    fn test_note_preview_and_tags() {
        let note: Note = serde_json::from_value(json!({
            "id": "n1", "title": "T", "content": "x".repeat(120), "tags": ["a", "b"]
        }))
        .unwrap();

        let preview = note.preview(100);
        assert_eq!(preview.chars().count(), 100);
        assert!(preview.ends_with("..."));
        assert_eq!(note.tags_display(), "a, b");
        assert_eq!(note.visibility, "personal");
    }

    #[test]
    fn test_profile_greeting_and_usage() {
        let profile: Profile = serde_json::from_value(json!({
            "id": "p1", "user_id": "u1", "full_name": "Ada Lovelace",
            "created_at": "2023-11-02T08:00:00Z",
            "usage_stats": {"documents": 12, "notes": 3}
        }))
        .unwrap();

        assert_eq!(profile.greeting(), "Welcome back, Ada!");
        assert_eq!(profile.member_since(), "November 2023");
        assert_eq!(profile.usage_count("documents"), 12);
        assert_eq!(profile.usage_count("integrations"), 0);
        assert_eq!(profile.subscription_display(), "Free");
    }

    #[test]
    fn test_automation_schedule_display() {
        let mut automation: Automation = serde_json::from_value(json!({
            "id": "a1", "title": "Digest", "type": "cron", "cron_schedule": "0 9 * * *"
        }))
        .unwrap();
        assert_eq!(automation.schedule_display(), "Daily at 9:00 AM");

        automation.cron_schedule = Some("15 3 * * 1".to_string());
        assert_eq!(automation.schedule_display(), "Cron: 15 3 * * 1");

        automation.kind = "trigger".to_string();
        automation.trigger_slug = Some("new_email".to_string());
        assert_eq!(automation.schedule_display(), "Trigger: New Email");

        automation.kind = "manual".to_string();
        assert_eq!(automation.schedule_display(), "Manual");
        assert_eq!(automation.status_emoji(), "❓");
        assert_eq!(automation.last_run_display(), "Never");
    }

    #[test]
    fn test_integration_display() {
        let integration: Integration = serde_json::from_value(json!({
            "id": "i1", "provider": "GMAIL", "sync_status": "NEVER_SYNCED",
            "last_synced_at": "not-a-date"
        }))
        .unwrap();

        assert_eq!(integration.provider_emoji(), "📧");
        assert_eq!(integration.status_emoji(), "⭕");
        assert_eq!(integration.last_sync_display(), "Unknown");
    }

    #[test]
    fn test_search_result_totals() {
        let result: SearchResult = serde_json::from_value(json!({
            "graph_results": [{"name": "a"}, {"name": "b"}],
            "graph_relationships": [{"type": "KNOWS"}],
            "source_chunks": [{"text": "c"}]
        }))
        .unwrap();

        assert_eq!(result.total_results(), 3);
        assert!(!result.is_empty());
        assert!(SearchResult::default().is_empty());
    }

    #[test]
    fn test_stream_chunk_text() {
        assert_eq!(stream_chunk_text(&json!({"content": "a"})), Some("a"));
        assert_eq!(stream_chunk_text(&json!({"data": {"response": "b"}})), Some("b"));
        assert_eq!(stream_chunk_text(&json!({"event": "ping"})), None);
    }

    #[test]
    fn test_persona_role_line() {
        let profile = PersonaProfile {
            name: "Grace".to_string(),
            email: "grace@example.com".to_string(),
            title: Some("Admiral".to_string()),
            company: Some("Navy".to_string()),
        };
        assert_eq!(profile.role_line().as_deref(), Some("Admiral at Navy"));
    }

    #[test]
    fn test_record_requires_id() {
        let parsed: Result<Note, _> = serde_json::from_value(json!({"title": "no id"}));
        assert!(parsed.is_err());
    }
}
