use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::gateway::event_stream::EventStream;
use crate::models::{
    AskRequest, AskResponse, Automation, Document, Integration, NewAutomation, NewNote, Note,
    NoteUpdate, Notification, PersonaAgentResponse, PersonaQuery, Profile, SearchResult,
    SurfaceResult,
};
use crate::utils::error::ApiResult;

/// Content type sent with every uploaded file
pub const UPLOAD_CONTENT_TYPE: &str = "application/octet-stream";

/// A file ready to be sent to `documents/ingest`
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub visibility: String,
}

impl DocumentUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
            visibility: "personal".to_string(),
        }
    }

    pub fn with_visibility(mut self, visibility: impl Into<String>) -> Self {
        self.visibility = visibility.into();
        self
    }
}

/// Result of starting an OAuth connection
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ConnectResponse {
    #[serde(default)]
    pub redirect_url: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Typed access to every remote SelfLayer endpoint
#[async_trait]
pub trait KnowledgeGateway: Send + Sync {
    /// Fetch the signed-in user's profile
    async fn profile(&self) -> ApiResult<Profile>;

    /// Ask the assistant and wait for the whole answer
    async fn ask(&self, request: &AskRequest) -> ApiResult<AskResponse>;

    /// Ask the assistant and read the answer incrementally
    async fn ask_stream(&self, request: &AskRequest) -> ApiResult<EventStream>;

    async fn search(&self, query: &str) -> ApiResult<SearchResult>;

    /// Surface a random memory, optionally seeded by partial text
    async fn surface(&self, partial_text: Option<&str>) -> ApiResult<SurfaceResult>;

    async fn list_documents(&self) -> ApiResult<Vec<Document>>;
    async fn upload_document(&self, upload: DocumentUpload) -> ApiResult<JsonValue>;
    async fn update_document_visibility(&self, id: &str, visibility: &str) -> ApiResult<JsonValue>;
    async fn delete_document(&self, id: &str) -> ApiResult<()>;

    async fn list_notes(&self) -> ApiResult<Vec<Note>>;

    /// Create a note. `None` when the server only acknowledged the write.
    async fn create_note(&self, note: &NewNote) -> ApiResult<Option<Note>>;
    async fn update_note(&self, id: &str, update: &NoteUpdate) -> ApiResult<Option<Note>>;
    async fn delete_note(&self, id: &str) -> ApiResult<()>;

    async fn list_notifications(&self) -> ApiResult<Vec<Notification>>;
    async fn mark_notification_read(&self, id: &str) -> ApiResult<()>;
    async fn mark_all_notifications_read(&self) -> ApiResult<()>;
    async fn delete_notification(&self, id: &str) -> ApiResult<()>;

    async fn list_integrations(&self) -> ApiResult<Vec<Integration>>;
    async fn connect_integration(&self, provider: &str) -> ApiResult<ConnectResponse>;
    async fn set_integration_sync(&self, id: &str, enabled: bool) -> ApiResult<JsonValue>;
    async fn disconnect_integration(&self, id: &str) -> ApiResult<()>;

    async fn list_automations(&self) -> ApiResult<Vec<Automation>>;
    async fn create_automation(&self, automation: &NewAutomation) -> ApiResult<Option<Automation>>;
    async fn run_automation(&self, id: &str) -> ApiResult<JsonValue>;
    async fn set_automation_enabled(&self, id: &str, enabled: bool) -> ApiResult<JsonValue>;
    async fn delete_automation(&self, id: &str) -> ApiResult<()>;

    /// Relationship micro-summary for a person. At least one lookup field is required.
    async fn persona(&self, query: &PersonaQuery) -> ApiResult<PersonaAgentResponse>;
}
