use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{header, Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value as JsonValue};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::gateway::event_stream::EventStream;
use crate::gateway::gateway_trait::{ConnectResponse, DocumentUpload, KnowledgeGateway, UPLOAD_CONTENT_TYPE};
use crate::models::{
    AskRequest, AskResponse, Automation, Document, Integration, NewAutomation, NewNote, Note,
    NoteUpdate, Notification, PersonaAgentResponse, PersonaQuery, Profile, SearchResult,
    SurfaceResult,
};
use crate::utils::config::{validate_base_url, ClientSettings};
use crate::utils::error::{ApiError, ApiResult};

/// User agent sent with every request
pub const USER_AGENT: &str = concat!("selflayer-tui/", env!("CARGO_PKG_VERSION"));

/// Bearer-authenticated JSON client for the SelfLayer REST API
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl HttpGateway {
    /// Build a gateway from resolved client settings
    pub fn new(settings: &ClientSettings) -> ApiResult<Self> {
        let base_url = validate_base_url(&settings.base_url)
            .map_err(|e| ApiError::invalid_request(e.to_string()))?;

        let client = Client::builder()
            .connect_timeout(settings.timeout)
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| ApiError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        info!(base_url = %base_url, timeout_secs = settings.timeout.as_secs(), "API gateway initialized");

        Ok(Self {
            client,
            base_url,
            api_key: settings.api_key.clone(),
            timeout: settings.timeout,
        })
    }

    /// Convenience constructor used by tests
    pub fn with_key(base_url: &str, api_key: &str, timeout: Duration) -> ApiResult<Self> {
        Self::new(&ClientSettings {
            api_key: api_key.to_string(),
            base_url: base_url.to_string(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for an endpoint relative to the base
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    fn request(&self, method: Method, endpoint: &str) -> RequestBuilder {
        let url = self.endpoint_url(endpoint);
        debug!(method = %method, url = %url, "sending request");
        self.client.request(method, url).bearer_auth(&self.api_key)
    }

    /// Send with a deadline covering the whole exchange, body included
    async fn send(&self, endpoint: &str, request: RequestBuilder) -> ApiResult<Response> {
        let response = request
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| send_error(endpoint, e))?;
        check_status(response).await
    }

    /// GET an endpoint, returning the JSON body unchanged
    pub async fn get(&self, endpoint: &str, query: &[(&str, &str)]) -> ApiResult<JsonValue> {
        let request = self.request(Method::GET, endpoint).query(query);
        let response = self.send(endpoint, request).await?;
        read_json(endpoint, response).await
    }

    /// POST a JSON body
    pub async fn post(&self, endpoint: &str, body: Option<&JsonValue>) -> ApiResult<JsonValue> {
        let mut request = self.request(Method::POST, endpoint);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = self.send(endpoint, request).await?;
        read_json(endpoint, response).await
    }

    /// PUT a JSON body
    pub async fn put(&self, endpoint: &str, body: &JsonValue) -> ApiResult<JsonValue> {
        let request = self.request(Method::PUT, endpoint).json(body);
        let response = self.send(endpoint, request).await?;
        read_json(endpoint, response).await
    }

    /// PATCH a JSON body
    pub async fn patch(&self, endpoint: &str, body: &JsonValue) -> ApiResult<JsonValue> {
        let request = self.request(Method::PATCH, endpoint).json(body);
        let response = self.send(endpoint, request).await?;
        read_json(endpoint, response).await
    }

    /// DELETE an endpoint. `None` for 204 or an empty body.
    pub async fn delete(&self, endpoint: &str) -> ApiResult<Option<JsonValue>> {
        let request = self.request(Method::DELETE, endpoint);
        let response = self.send(endpoint, request).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        match read_json(endpoint, response).await? {
            JsonValue::Null => Ok(None),
            value => Ok(Some(value)),
        }
    }

    /// POST a multipart form
    pub async fn post_multipart(&self, endpoint: &str, form: Form) -> ApiResult<JsonValue> {
        let request = self.request(Method::POST, endpoint).multipart(form);
        let response = self.send(endpoint, request).await?;
        read_json(endpoint, response).await
    }

    /// POST with `"stream": true` and read the body as a line-delimited event stream.
    ///
    /// The timeout bounds the wait for response headers and each read of the
    /// body, never the total length of the answer.
    pub async fn stream(&self, endpoint: &str, body: &JsonValue) -> ApiResult<EventStream> {
        let mut body = body.clone();
        if let JsonValue::Object(map) = &mut body {
            map.insert("stream".to_string(), JsonValue::Bool(true));
        }

        let request = self
            .request(Method::POST, endpoint)
            .header(header::ACCEPT, "text/event-stream")
            .json(&body);
        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| timeout_error(endpoint))?
            .map_err(|e| send_error(endpoint, e))?;
        let response = check_status(response).await?;

        let endpoint = endpoint.to_string();
        let bytes = response.bytes_stream().map(move |chunk| {
            chunk
                .map(|bytes| bytes.to_vec())
                .map_err(|e| send_error(&endpoint, e))
        });
        Ok(EventStream::new(Box::pin(bytes)).with_read_timeout(self.timeout))
    }
}

fn timeout_error(endpoint: &str) -> ApiError {
    ApiError::Timeout(format!("Request timeout for {}", endpoint))
}

fn send_error(endpoint: &str, e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        timeout_error(endpoint)
    } else {
        ApiError::Transport(format!("Request error for {}: {}", endpoint, e))
    }
}

async fn check_status(response: Response) -> ApiResult<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    Err(error_from_response(response).await)
}

/// Build the error for a non-success response from its status and body
async fn error_from_response(response: Response) -> ApiError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let message = error_message(status, &text);
    warn!(status = status.as_u16(), message = %message, "request failed");
    ApiError::from_status(status.as_u16(), message)
}

/// Server message: `detail` of a JSON error body, else `HTTP <code>: <text>`
pub fn error_message(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<JsonValue>(body) {
        Ok(value) => match value.get("detail") {
            Some(JsonValue::String(detail)) => detail.clone(),
            Some(detail) => detail.to_string(),
            None => format!("HTTP {}", status.as_u16()),
        },
        Err(_) => format!("HTTP {}: {}", status.as_u16(), body),
    }
}

async fn read_json(endpoint: &str, response: Response) -> ApiResult<JsonValue> {
    let text = response.text().await.map_err(|e| send_error(endpoint, e))?;
    if text.trim().is_empty() {
        return Ok(JsonValue::Null);
    }
    serde_json::from_str(&text)
        .map_err(|e| ApiError::InvalidResponse(format!("{} returned invalid JSON: {}", endpoint, e)))
}

/// Decode a single record
pub fn decode_record<T: DeserializeOwned>(value: JsonValue) -> ApiResult<T> {
    serde_json::from_value(value).map_err(|e| ApiError::InvalidResponse(e.to_string()))
}

/// Decode a list that is either a bare array or wrapped under `key`.
/// Items that fail to deserialize are skipped.
pub fn decode_list<T: DeserializeOwned>(value: JsonValue, key: &str) -> ApiResult<Vec<T>> {
    let items = match value {
        JsonValue::Array(items) => items,
        JsonValue::Object(mut map) => match map.remove(key) {
            Some(JsonValue::Array(items)) => items,
            Some(JsonValue::Null) | None => Vec::new(),
            Some(other) => {
                return Err(ApiError::InvalidResponse(format!(
                    "expected '{}' to be an array, got {}",
                    key, other
                )))
            }
        },
        JsonValue::Null => Vec::new(),
        other => {
            return Err(ApiError::InvalidResponse(format!(
                "expected a list of {}, got {}",
                key, other
            )))
        }
    };

    let mut records = Vec::with_capacity(items.len());
    for item in items {
        match serde_json::from_value::<T>(item) {
            Ok(record) => records.push(record),
            Err(e) => warn!(resource = key, error = %e, "skipping list item that failed to parse"),
        }
    }
    Ok(records)
}

/// Record echoed back by a write. Acknowledgement bodies decode to `None`.
pub fn decode_echo<T: DeserializeOwned>(value: JsonValue, kind: &str) -> Option<T> {
    if value.is_null() {
        return None;
    }
    match serde_json::from_value(value) {
        Ok(record) => Some(record),
        Err(e) => {
            debug!(kind, error = %e, "write response is not a full record");
            None
        }
    }
}

fn to_body<T: serde::Serialize>(value: &T) -> ApiResult<JsonValue> {
    serde_json::to_value(value).map_err(|e| ApiError::invalid_request(e.to_string()))
}

#[async_trait]
impl KnowledgeGateway for HttpGateway {
    async fn profile(&self) -> ApiResult<Profile> {
        decode_record(self.get("profile", &[]).await?)
    }

    async fn ask(&self, request: &AskRequest) -> ApiResult<AskResponse> {
        let body = to_body(request)?;
        decode_record(self.post("exocortex/ask", Some(&body)).await?)
    }

    async fn ask_stream(&self, request: &AskRequest) -> ApiResult<EventStream> {
        let body = to_body(request)?;
        self.stream("exocortex/ask", &body).await
    }

    async fn search(&self, query: &str) -> ApiResult<SearchResult> {
        decode_record(self.get("search", &[("query", query)]).await?)
    }

    async fn surface(&self, partial_text: Option<&str>) -> ApiResult<SurfaceResult> {
        let query: Vec<(&str, &str)> = partial_text
            .filter(|text| !text.trim().is_empty())
            .map(|text| vec![("partial_text", text)])
            .unwrap_or_default();
        decode_record(self.get("surface", &query).await?)
    }

    async fn list_documents(&self) -> ApiResult<Vec<Document>> {
        decode_list(self.get("documents/", &[]).await?, "documents")
    }

    async fn upload_document(&self, upload: DocumentUpload) -> ApiResult<JsonValue> {
        let part = Part::bytes(upload.bytes)
            .file_name(upload.file_name.clone())
            .mime_str(UPLOAD_CONTENT_TYPE)
            .map_err(|e| ApiError::invalid_request(e.to_string()))?;
        let form = Form::new()
            .part("file", part)
            .text("visibility", upload.visibility);
        info!(file = %upload.file_name, "uploading document");
        self.post_multipart("documents/ingest", form).await
    }

    async fn update_document_visibility(&self, id: &str, visibility: &str) -> ApiResult<JsonValue> {
        self.patch(&format!("documents/{}", id), &json!({ "visibility": visibility }))
            .await
    }

    async fn delete_document(&self, id: &str) -> ApiResult<()> {
        self.delete(&format!("documents/{}", id)).await.map(|_| ())
    }

    async fn list_notes(&self) -> ApiResult<Vec<Note>> {
        decode_list(self.get("notes/", &[]).await?, "notes")
    }

    async fn create_note(&self, note: &NewNote) -> ApiResult<Option<Note>> {
        let body = to_body(note)?;
        Ok(decode_echo(self.post("notes/", Some(&body)).await?, "note"))
    }

    async fn update_note(&self, id: &str, update: &NoteUpdate) -> ApiResult<Option<Note>> {
        if update.is_empty() {
            return Err(ApiError::invalid_request("Nothing to update"));
        }
        let body = to_body(update)?;
        Ok(decode_echo(self.put(&format!("notes/{}", id), &body).await?, "note"))
    }

    async fn delete_note(&self, id: &str) -> ApiResult<()> {
        self.delete(&format!("notes/{}", id)).await.map(|_| ())
    }

    async fn list_notifications(&self) -> ApiResult<Vec<Notification>> {
        decode_list(self.get("notifications/", &[]).await?, "notifications")
    }

    async fn mark_notification_read(&self, id: &str) -> ApiResult<()> {
        self.post(&format!("notifications/{}/read", id), None).await.map(|_| ())
    }

    async fn mark_all_notifications_read(&self) -> ApiResult<()> {
        self.post("notifications/read-all", None).await.map(|_| ())
    }

    async fn delete_notification(&self, id: &str) -> ApiResult<()> {
        self.delete(&format!("notifications/{}", id)).await.map(|_| ())
    }

    async fn list_integrations(&self) -> ApiResult<Vec<Integration>> {
        decode_list(self.get("integrations/connections", &[]).await?, "connections")
    }

    async fn connect_integration(&self, provider: &str) -> ApiResult<ConnectResponse> {
        let provider = provider.trim().to_lowercase();
        if provider.is_empty() {
            return Err(ApiError::invalid_request("Provider name is required"));
        }
        match self.post(&format!("integrations/{}/connect", provider), None).await? {
            JsonValue::Null => Ok(ConnectResponse::default()),
            value => decode_record(value),
        }
    }

    async fn set_integration_sync(&self, id: &str, enabled: bool) -> ApiResult<JsonValue> {
        self.patch(
            &format!("integrations/connections/{}", id),
            &json!({ "is_sync_enabled": enabled }),
        )
        .await
    }

    async fn disconnect_integration(&self, id: &str) -> ApiResult<()> {
        self.delete(&format!("integrations/connections/{}", id)).await.map(|_| ())
    }

    async fn list_automations(&self) -> ApiResult<Vec<Automation>> {
        decode_list(self.get("automations", &[]).await?, "automations")
    }

    async fn create_automation(&self, automation: &NewAutomation) -> ApiResult<Option<Automation>> {
        let body = to_body(automation)?;
        Ok(decode_echo(self.post("automations", Some(&body)).await?, "automation"))
    }

    async fn run_automation(&self, id: &str) -> ApiResult<JsonValue> {
        self.post(&format!("automations/{}/run", id), None).await
    }

    async fn set_automation_enabled(&self, id: &str, enabled: bool) -> ApiResult<JsonValue> {
        self.patch(&format!("automations/{}", id), &json!({ "is_enabled": enabled }))
            .await
    }

    async fn delete_automation(&self, id: &str) -> ApiResult<()> {
        self.delete(&format!("automations/{}", id)).await.map(|_| ())
    }

    async fn persona(&self, query: &PersonaQuery) -> ApiResult<PersonaAgentResponse> {
        if query.is_empty() {
            return Err(ApiError::invalid_request(
                "At least one of email, name, company or title is required",
            ));
        }
        let body = to_body(query)?;
        decode_record(self.post("agent/persona", Some(&body)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway(base_url: &str) -> HttpGateway {
        HttpGateway::with_key(base_url, "sl_test_unit", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_endpoint_url_joins_cleanly() {
        let gw = gateway("http://localhost:8001/api/v1/");
        assert_eq!(gw.base_url(), "http://localhost:8001/api/v1");
        assert_eq!(gw.endpoint_url("/notes/"), "http://localhost:8001/api/v1/notes/");
        assert_eq!(gw.endpoint_url("profile"), "http://localhost:8001/api/v1/profile");
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let result = HttpGateway::with_key("ftp://example.com", "sl_test_x", Duration::from_secs(1));
        assert!(matches!(result, Err(ApiError::Validation { status: None, .. })));
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(error_message(StatusCode::NOT_FOUND, r#"{"detail":"Note not found"}"#), "Note not found");
        assert_eq!(error_message(StatusCode::BAD_REQUEST, r#"{"error":"x"}"#), "HTTP 400");
        assert_eq!(error_message(StatusCode::BAD_GATEWAY, "upstream down"), "HTTP 502: upstream down");
        assert_eq!(
            error_message(StatusCode::UNPROCESSABLE_ENTITY, r#"{"detail":[{"msg":"bad"}]}"#),
            r#"[{"msg":"bad"}]"#
        );
    }

    #[test]
    fn test_decode_list_shapes() {
        let bare: Vec<Note> = decode_list(json!([{"id": "a"}, {"id": "b"}]), "notes").unwrap();
        assert_eq!(bare.len(), 2);

        let wrapped: Vec<Note> = decode_list(json!({"notes": [{"id": "a"}]}), "notes").unwrap();
        assert_eq!(wrapped[0].id, "a");

        let missing: Vec<Note> = decode_list(json!({"total": 0}), "notes").unwrap();
        assert!(missing.is_empty());

        assert!(decode_list::<Note>(json!("nope"), "notes").is_err());
    }

    #[test]
    fn test_decode_list_skips_bad_items() {
        let notes: Vec<Note> = decode_list(json!([{"id": "a"}, {"title": "no id"}, {"id": "c"}]), "notes").unwrap();
        let ids: Vec<&str> = notes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn test_decode_echo_tolerates_acknowledgements() {
        let note: Option<Note> = decode_echo(json!({"id": "n1", "title": "Hi"}), "note");
        assert_eq!(note.map(|n| n.id), Some("n1".to_string()));

        let ack: Option<Note> = decode_echo(json!({"message": "Note created", "note_id": "n9"}), "note");
        assert!(ack.is_none());
        assert!(decode_echo::<Note>(JsonValue::Null, "note").is_none());
    }

    #[tokio::test]
    async fn test_persona_requires_a_field() {
        let gw = gateway("http://127.0.0.1:9");
        let result = gw.persona(&PersonaQuery::default()).await;
        assert!(matches!(result, Err(ApiError::Validation { status: None, .. })));
    }

    #[tokio::test]
    async fn test_empty_note_update_rejected_before_request() {
        let gw = gateway("http://127.0.0.1:9");
        let result = gw.update_note("n1", &NoteUpdate::default()).await;
        assert!(matches!(result, Err(ApiError::Validation { status: None, .. })));
    }
}
