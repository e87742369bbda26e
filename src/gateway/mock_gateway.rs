use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use crate::gateway::event_stream::EventStream;
use crate::gateway::gateway_trait::{ConnectResponse, DocumentUpload, KnowledgeGateway};
use crate::models::{
    AskData, AskRequest, AskResponse, Automation, Document, Integration, NewAutomation, NewNote,
    Note, NoteUpdate, Notification, PersonaAgentResponse, PersonaProfile, PersonaQuery, Profile,
    SearchResult, SurfaceResult,
};
use crate::utils::error::{ApiError, ApiResult};

/// In-memory gateway with deterministic data, call recording and failure injection
#[derive(Debug, Clone, Default)]
pub struct MockGateway {
    inner: Arc<Mutex<MockStore>>,
}

#[derive(Debug, Default)]
struct MockStore {
    profile: Option<Profile>,
    documents: Vec<Document>,
    notes: Vec<Note>,
    notifications: Vec<Notification>,
    integrations: Vec<Integration>,
    automations: Vec<Automation>,
    search_result: SearchResult,
    surface: Option<SurfaceResult>,
    persona: Option<PersonaAgentResponse>,
    answer: String,
    stream_lines: Vec<String>,
    stream_failure: Option<ApiError>,
    failures: HashMap<String, ApiError>,
    calls: Vec<String>,
    next_id: u64,
    acknowledge_only: bool,
}

impl MockStore {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }
}

fn not_found(kind: &str) -> ApiError {
    ApiError::from_status(404, format!("{} not found", kind))
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

fn sample<T: DeserializeOwned>(values: Vec<JsonValue>) -> Vec<T> {
    values
        .into_iter()
        .filter_map(|value| serde_json::from_value(value).ok())
        .collect()
}

impl MockGateway {
    /// Create an empty mock gateway
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock gateway with a small deterministic data set
    pub fn with_sample_data() -> Self {
        let gateway = Self::new();
        {
            let mut store = gateway.lock();
            store.profile = sample::<Profile>(vec![json!({
                "id": "profile-1",
                "user_id": "user-1",
                "full_name": "Demo User",
                "occupation": "Researcher",
                "email": "demo@selflayer.com",
                "timezone": "UTC",
                "created_at": "2024-01-15T09:00:00Z",
                "subscription_tier": "Pro",
                "usage_stats": {"documents": 2, "notes": 2}
            })])
            .pop();
            store.documents = sample(vec![
                json!({"id": "doc-a", "file_name": "research_notes.pdf", "status": "FULLY_PROCESSED",
                       "summary": "Notes on memory systems", "file_size": 20480,
                       "created_at": "2024-02-01T10:00:00Z", "updated_at": "2024-02-01T10:05:00Z"}),
                json!({"id": "doc-b", "file_name": "meeting-minutes.txt", "status": "PROCESSING",
                       "file_size": 512, "created_at": "2024-02-03T16:20:00Z",
                       "updated_at": "2024-02-03T16:20:00Z"}),
            ]);
            store.notes = sample(vec![
                json!({"id": "note-a", "user_id": "user-1", "title": "Reading list",
                       "content": "Papers to read this week", "tags": ["reading"],
                       "created_at": "2024-02-04T08:00:00Z", "updated_at": "2024-02-04T08:00:00Z"}),
                json!({"id": "note-b", "user_id": "user-1", "title": "Ideas",
                       "content": "Index personal knowledge by relationship",
                       "created_at": "2024-02-05T12:30:00Z", "updated_at": "2024-02-05T12:30:00Z"}),
            ]);
            store.notifications = sample(vec![json!({
                "id": "notif-a", "title": "Document processed",
                "message": "research_notes.pdf is ready", "type": "document",
                "read": false, "datetime": "2024-02-01T10:05:00Z"
            })]);
            store.integrations = sample(vec![json!({
                "id": "conn-a", "provider": "gmail", "display_name": "Work mail",
                "account_identifier": "demo@selflayer.com", "is_sync_enabled": true,
                "is_syncable": true, "sync_status": "success",
                "last_synced_at": "2024-02-05T07:00:00Z", "created_at": "2024-01-20T09:00:00Z"
            })]);
            store.automations = sample(vec![json!({
                "id": "auto-a", "user_id": "user-1", "title": "Morning briefing",
                "prompt": "Summarize what changed overnight", "type": "cron",
                "cron_schedule": "0 9 * * *", "is_enabled": true,
                "created_at": "2024-01-25T09:00:00Z", "updated_at": "2024-01-25T09:00:00Z"
            })]);
            store.answer = "This is an offline answer from the mock gateway.".to_string();
            store.stream_lines = vec![
                r#"data: {"content": "This is an offline "}"#.to_string(),
                r#"data: {"content": "streamed answer."}"#.to_string(),
                "data: [DONE]".to_string(),
            ];
            store.surface = Some(SurfaceResult {
                intent: "reflection".to_string(),
                content: "You noted an idea about indexing knowledge by relationship.".to_string(),
            });
        }
        gateway
    }

    fn lock(&self) -> MutexGuard<'_, MockStore> {
        // Recover from a poisoned lock
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record a call and return an injected failure for `operation`, if any
    fn enter(&self, operation: &str, argument: Option<&str>) -> ApiResult<MutexGuard<'_, MockStore>> {
        let mut store = self.lock();
        let call = match argument {
            Some(arg) => format!("{}:{}", operation, arg),
            None => operation.to_string(),
        };
        debug!(call = %call, "mock gateway call");
        store.calls.push(call);
        if let Some(error) = store.failures.get(operation) {
            return Err(error.clone());
        }
        Ok(store)
    }

    /// Answer writes without echoing the record back
    pub fn acknowledge_writes_only(&self) {
        self.lock().acknowledge_only = true;
    }

    pub fn set_profile(&self, profile: Profile) {
        self.lock().profile = Some(profile);
    }

    pub fn set_documents(&self, documents: Vec<Document>) {
        self.lock().documents = documents;
    }

    pub fn set_notes(&self, notes: Vec<Note>) {
        self.lock().notes = notes;
    }

    pub fn set_notifications(&self, notifications: Vec<Notification>) {
        self.lock().notifications = notifications;
    }

    pub fn set_integrations(&self, integrations: Vec<Integration>) {
        self.lock().integrations = integrations;
    }

    pub fn set_automations(&self, automations: Vec<Automation>) {
        self.lock().automations = automations;
    }

    pub fn set_search_result(&self, result: SearchResult) {
        self.lock().search_result = result;
    }

    pub fn set_surface(&self, result: SurfaceResult) {
        self.lock().surface = Some(result);
    }

    pub fn set_persona(&self, response: PersonaAgentResponse) {
        self.lock().persona = Some(response);
    }

    /// Answer returned by the non-streaming ask
    pub fn set_answer(&self, answer: impl Into<String>) {
        self.lock().answer = answer.into();
    }

    /// Body lines returned by the streaming ask
    pub fn set_stream_lines(&self, lines: Vec<String>) {
        self.lock().stream_lines = lines;
    }

    /// Make the streaming ask fail with `error` after its configured lines
    pub fn fail_stream_after_lines(&self, error: ApiError) {
        self.lock().stream_failure = Some(error);
    }

    /// Make every call to `operation` fail with `error`
    pub fn fail_on(&self, operation: &str, error: ApiError) {
        self.lock().failures.insert(operation.to_string(), error);
    }

    /// Remove an injected failure
    pub fn clear_failure(&self, operation: &str) {
        self.lock().failures.remove(operation);
    }

    /// Calls received so far, as `operation` or `operation:argument`
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn notes(&self) -> Vec<Note> {
        self.lock().notes.clone()
    }

    pub fn documents(&self) -> Vec<Document> {
        self.lock().documents.clone()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.lock().notifications.clone()
    }

    pub fn integrations(&self) -> Vec<Integration> {
        self.lock().integrations.clone()
    }

    pub fn automations(&self) -> Vec<Automation> {
        self.lock().automations.clone()
    }
}

#[async_trait]
impl KnowledgeGateway for MockGateway {
    async fn profile(&self) -> ApiResult<Profile> {
        let store = self.enter("profile", None)?;
        store.profile.clone().ok_or_else(|| not_found("Profile"))
    }

    async fn ask(&self, request: &AskRequest) -> ApiResult<AskResponse> {
        let store = self.enter("ask", Some(request.query.as_str()))?;
        Ok(AskResponse {
            data: AskData {
                response: Some(store.answer.clone()),
                ..AskData::default()
            },
        })
    }

    async fn ask_stream(&self, request: &AskRequest) -> ApiResult<EventStream> {
        let store = self.enter("ask_stream", Some(request.query.as_str()))?;
        let mut body = store.stream_lines.join("\n");
        body.push('\n');
        let mut chunks = vec![Ok(body.into_bytes())];
        if let Some(error) = store.stream_failure.clone() {
            chunks.push(Err(error));
        }
        Ok(EventStream::from_chunks(chunks))
    }

    async fn search(&self, query: &str) -> ApiResult<SearchResult> {
        let store = self.enter("search", Some(query))?;
        Ok(store.search_result.clone())
    }

    async fn surface(&self, partial_text: Option<&str>) -> ApiResult<SurfaceResult> {
        let store = self.enter("surface", partial_text)?;
        store.surface.clone().ok_or_else(|| not_found("Memory"))
    }

    async fn list_documents(&self) -> ApiResult<Vec<Document>> {
        let store = self.enter("list_documents", None)?;
        Ok(store.documents.clone())
    }

    async fn upload_document(&self, upload: DocumentUpload) -> ApiResult<JsonValue> {
        let mut store = self.enter("upload_document", Some(upload.file_name.as_str()))?;
        let id = store.next_id("doc");
        let timestamp = now();
        let document = Document {
            id: id.clone(),
            file_name: upload.file_name,
            status: "PENDING".to_string(),
            summary: None,
            keywords: None,
            created_at: timestamp.clone(),
            updated_at: timestamp,
            file_size: Some(upload.bytes.len() as u64),
            visibility: upload.visibility,
            content_type: None,
        };
        store.documents.push(document);
        Ok(json!({ "id": id, "status": "PENDING" }))
    }

    async fn update_document_visibility(&self, id: &str, visibility: &str) -> ApiResult<JsonValue> {
        let mut store = self.enter("update_document_visibility", Some(id))?;
        let document = store
            .documents
            .iter_mut()
            .find(|doc| doc.id == id)
            .ok_or_else(|| not_found("Document"))?;
        document.visibility = visibility.to_string();
        Ok(json!({ "id": id, "visibility": visibility }))
    }

    async fn delete_document(&self, id: &str) -> ApiResult<()> {
        let mut store = self.enter("delete_document", Some(id))?;
        let before = store.documents.len();
        store.documents.retain(|doc| doc.id != id);
        if store.documents.len() == before {
            return Err(not_found("Document"));
        }
        Ok(())
    }

    async fn list_notes(&self) -> ApiResult<Vec<Note>> {
        let store = self.enter("list_notes", None)?;
        Ok(store.notes.clone())
    }

    async fn create_note(&self, note: &NewNote) -> ApiResult<Option<Note>> {
        let mut store = self.enter("create_note", Some(note.title.as_str()))?;
        let timestamp = now();
        let created = Note {
            id: store.next_id("note"),
            user_id: store
                .profile
                .as_ref()
                .map(|p| p.user_id.clone())
                .unwrap_or_default(),
            title: note.title.clone(),
            content: note.content.clone(),
            status: "PENDING".to_string(),
            processing_error: None,
            created_at: timestamp.clone(),
            updated_at: timestamp,
            tags: note.tags.clone(),
            visibility: note.visibility.clone(),
        };
        store.notes.push(created.clone());
        Ok(Some(created).filter(|_| !store.acknowledge_only))
    }

    async fn update_note(&self, id: &str, update: &NoteUpdate) -> ApiResult<Option<Note>> {
        let mut store = self.enter("update_note", Some(id))?;
        if update.is_empty() {
            return Err(ApiError::invalid_request("Nothing to update"));
        }
        let note = store
            .notes
            .iter_mut()
            .find(|note| note.id == id)
            .ok_or_else(|| not_found("Note"))?;
        if let Some(title) = &update.title {
            note.title = title.clone();
        }
        if let Some(content) = &update.content {
            note.content = content.clone();
        }
        note.updated_at = now();
        let echo = note.clone();
        Ok(Some(echo).filter(|_| !store.acknowledge_only))
    }

    async fn delete_note(&self, id: &str) -> ApiResult<()> {
        let mut store = self.enter("delete_note", Some(id))?;
        let before = store.notes.len();
        store.notes.retain(|note| note.id != id);
        if store.notes.len() == before {
            return Err(not_found("Note"));
        }
        Ok(())
    }

    async fn list_notifications(&self) -> ApiResult<Vec<Notification>> {
        let store = self.enter("list_notifications", None)?;
        Ok(store.notifications.clone())
    }

    async fn mark_notification_read(&self, id: &str) -> ApiResult<()> {
        let mut store = self.enter("mark_notification_read", Some(id))?;
        let notification = store
            .notifications
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| not_found("Notification"))?;
        notification.read = true;
        Ok(())
    }

    async fn mark_all_notifications_read(&self) -> ApiResult<()> {
        let mut store = self.enter("mark_all_notifications_read", None)?;
        for notification in store.notifications.iter_mut() {
            notification.read = true;
        }
        Ok(())
    }

    async fn delete_notification(&self, id: &str) -> ApiResult<()> {
        let mut store = self.enter("delete_notification", Some(id))?;
        let before = store.notifications.len();
        store.notifications.retain(|n| n.id != id);
        if store.notifications.len() == before {
            return Err(not_found("Notification"));
        }
        Ok(())
    }

    async fn list_integrations(&self) -> ApiResult<Vec<Integration>> {
        let store = self.enter("list_integrations", None)?;
        Ok(store.integrations.clone())
    }

    async fn connect_integration(&self, provider: &str) -> ApiResult<ConnectResponse> {
        let _store = self.enter("connect_integration", Some(provider))?;
        Ok(ConnectResponse {
            redirect_url: Some(format!("https://auth.selflayer.com/oauth/{}", provider.to_lowercase())),
            message: None,
        })
    }

    async fn set_integration_sync(&self, id: &str, enabled: bool) -> ApiResult<JsonValue> {
        let mut store = self.enter("set_integration_sync", Some(id))?;
        let integration = store
            .integrations
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| not_found("Integration"))?;
        integration.is_sync_enabled = enabled;
        Ok(json!({ "id": id, "is_sync_enabled": enabled }))
    }

    async fn disconnect_integration(&self, id: &str) -> ApiResult<()> {
        let mut store = self.enter("disconnect_integration", Some(id))?;
        let before = store.integrations.len();
        store.integrations.retain(|i| i.id != id);
        if store.integrations.len() == before {
            return Err(not_found("Integration"));
        }
        Ok(())
    }

    async fn list_automations(&self) -> ApiResult<Vec<Automation>> {
        let store = self.enter("list_automations", None)?;
        Ok(store.automations.clone())
    }

    async fn create_automation(&self, automation: &NewAutomation) -> ApiResult<Option<Automation>> {
        let mut store = self.enter("create_automation", Some(automation.title.as_str()))?;
        let timestamp = now();
        let created = Automation {
            id: store.next_id("auto"),
            user_id: String::new(),
            title: automation.title.clone(),
            description: automation.description.clone(),
            prompt: automation.prompt.clone(),
            kind: automation.kind.clone(),
            trigger_slug: None,
            cron_schedule: automation.cron_schedule.clone(),
            is_enabled: true,
            last_run_at: None,
            last_run_status: None,
            last_run_message: None,
            created_at: timestamp.clone(),
            updated_at: timestamp,
        };
        store.automations.push(created.clone());
        Ok(Some(created).filter(|_| !store.acknowledge_only))
    }

    async fn run_automation(&self, id: &str) -> ApiResult<JsonValue> {
        let mut store = self.enter("run_automation", Some(id))?;
        let automation = store
            .automations
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| not_found("Automation"))?;
        automation.last_run_at = Some(now());
        automation.last_run_status = Some("success".to_string());
        Ok(json!({ "message": format!("Automation '{}' started", automation.title) }))
    }

    async fn set_automation_enabled(&self, id: &str, enabled: bool) -> ApiResult<JsonValue> {
        let mut store = self.enter("set_automation_enabled", Some(id))?;
        let automation = store
            .automations
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| not_found("Automation"))?;
        automation.is_enabled = enabled;
        Ok(json!({ "id": id, "is_enabled": enabled }))
    }

    async fn delete_automation(&self, id: &str) -> ApiResult<()> {
        let mut store = self.enter("delete_automation", Some(id))?;
        let before = store.automations.len();
        store.automations.retain(|a| a.id != id);
        if store.automations.len() == before {
            return Err(not_found("Automation"));
        }
        Ok(())
    }

    async fn persona(&self, query: &PersonaQuery) -> ApiResult<PersonaAgentResponse> {
        let store = self.enter("persona", None)?;
        if query.is_empty() {
            return Err(ApiError::invalid_request(
                "At least one of email, name, company or title is required",
            ));
        }
        if let Some(response) = &store.persona {
            return Ok(response.clone());
        }
        let name = query
            .name
            .clone()
            .or_else(|| query.email.clone())
            .or_else(|| query.company.clone())
            .unwrap_or_default();
        Ok(PersonaAgentResponse {
            rms: format!("No relationship history found for {}.", name),
            profile: PersonaProfile {
                name,
                email: query.email.clone().unwrap_or_default(),
                title: query.title.clone(),
                company: query.company.clone(),
            },
            proposed_actions: Vec::new(),
        })
    }
}
