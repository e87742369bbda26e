use std::path::Path;
use std::time::Duration;

use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use crate::cli::output_formatter::OutputFormatter;
use crate::engine::command::{
    split_line, AutomationAction, Command, DocumentAction, IntegrationAction, KeyAction, NoteAction,
    NotificationAction,
};
use crate::engine::terminal::Terminal;
use crate::gateway::{DocumentUpload, HttpGateway, KnowledgeGateway, StreamEvent};
use crate::models::{
    stream_chunk_text, AppState, AskRequest, NewAutomation, NewNote, NoteUpdate, PersonaQuery,
};
use crate::utils::config::{mask_api_key, ClientSettings, ConfigStore, KeySource};
use crate::utils::error::{ApiResult, CommandError, SelflayerError, SelflayerResult};

/// Builds a gateway from resolved client settings
pub type GatewayFactory =
    Box<dyn Fn(&ClientSettings) -> ApiResult<Box<dyn KnowledgeGateway>> + Send>;

/// Factory producing reqwest-backed gateways
pub fn http_gateway_factory() -> GatewayFactory {
    Box::new(|settings: &ClientSettings| {
        let gateway = HttpGateway::new(settings)?;
        Ok(Box::new(gateway) as Box<dyn KnowledgeGateway>)
    })
}

/// What the prompt loop should do after a line was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Parses input lines and runs the matching handler against the gateway.
///
/// Every error raised by a handler is rendered to the terminal; none of them
/// ends the session.
pub struct CommandDispatcher<T: Terminal> {
    gateway: Option<Box<dyn KnowledgeGateway>>,
    factory: GatewayFactory,
    config: ConfigStore,
    state: AppState,
    terminal: T,
    timeout: Duration,
}

impl<T: Terminal> CommandDispatcher<T> {
    /// Create a dispatcher, building a gateway right away when a key is available
    pub fn new(config: ConfigStore, terminal: T, timeout: Duration, factory: GatewayFactory) -> Self {
        let mut dispatcher = Self {
            gateway: None,
            factory,
            config,
            state: AppState::new(),
            terminal,
            timeout,
        };
        if let Err(e) = dispatcher.rebuild_gateway() {
            warn!(error = %e, "could not build gateway at startup");
        }
        dispatcher
    }

    pub fn terminal(&self) -> &T {
        &self.terminal
    }

    pub fn terminal_mut(&mut self) -> &mut T {
        &mut self.terminal
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    /// Whether a gateway is ready for credential-requiring commands
    pub fn is_connected(&self) -> bool {
        self.gateway.is_some()
    }

    /// Fetch the profile if possible and print the welcome banner
    pub async fn print_welcome(&mut self) {
        if let Some(gateway) = self.gateway.as_deref() {
            match gateway.profile().await {
                Ok(profile) => {
                    info!(user = %profile.full_name, "profile loaded");
                    self.state.profile = Some(profile);
                }
                Err(e) => warn!(error = %e, "profile fetch failed"),
            }
        }
        let banner = OutputFormatter::format_welcome(self.gateway.is_some(), self.state.profile.as_ref());
        self.terminal.print(&banner);
    }

    /// Handle one input line
    pub async fn handle_line(&mut self, line: &str) -> Flow {
        let (verb, rest) = match split_line(line) {
            Ok(Some(split)) => split,
            Ok(None) => return Flow::Continue,
            Err(e) => {
                self.render_error(&e.into(), "");
                return Flow::Continue;
            }
        };
        if verb.requires_credential() && self.gateway.is_none() {
            self.render_error(&CommandError::MissingCredential.into(), "");
            return Flow::Continue;
        }
        let command = match verb.parse_args(rest) {
            Ok(command) => command,
            Err(e) => {
                self.render_error(&e.into(), "");
                return Flow::Continue;
            }
        };
        debug!(?command, "dispatching command");

        let context = error_context(&command);
        match self.execute(command).await {
            Ok(flow) => flow,
            Err(e) => {
                self.render_error(&e, context);
                Flow::Continue
            }
        }
    }

    /// Run a parsed command
    pub async fn execute(&mut self, command: Command) -> SelflayerResult<Flow> {
        if command.requires_credential() && self.gateway.is_none() {
            return Err(CommandError::MissingCredential.into());
        }

        match command {
            Command::Help => self.terminal.print(&OutputFormatter::format_help()),
            Command::Key(action) => self.handle_key(action).await?,
            Command::Clear => {
                self.terminal.clear_screen();
                let banner =
                    OutputFormatter::format_welcome(self.gateway.is_some(), self.state.profile.as_ref());
                self.terminal.print(&banner);
            }
            Command::Quit => {
                self.terminal.print(&OutputFormatter::format_info("Goodbye!"));
                return Ok(Flow::Exit);
            }
            Command::Ask(question) => self.handle_ask(&question).await?,
            Command::Search(query) => {
                let result = self.gateway()?.search(&query).await?;
                self.terminal.print(&OutputFormatter::format_search(&result, &query));
            }
            Command::Surface(partial) => {
                let result = self.gateway()?.surface(partial.as_deref()).await?;
                self.terminal
                    .print(&OutputFormatter::format_surface(&result, partial.as_deref()));
            }
            Command::Profile => {
                let profile = self.gateway()?.profile().await?;
                self.terminal.print(&OutputFormatter::format_profile(&profile));
                self.state.profile = Some(profile);
            }
            Command::Rms(input) => {
                let query = PersonaQuery::from_input(&input);
                let response = self.gateway()?.persona(&query).await?;
                self.terminal.print(&OutputFormatter::format_persona(&response, &input));
            }
            Command::Documents(action) => self.handle_documents(action).await?,
            Command::Notes(action) => self.handle_notes(action).await?,
            Command::Integrations(action) => self.handle_integrations(action).await?,
            Command::Automations(action) => self.handle_automations(action).await?,
            Command::Notifications(action) => self.handle_notifications(action).await?,
        }
        Ok(Flow::Continue)
    }

    fn gateway(&self) -> Result<&dyn KnowledgeGateway, CommandError> {
        self.gateway.as_deref().ok_or(CommandError::MissingCredential)
    }

    /// Replace the gateway from the current effective settings, or drop it when no key is left
    fn rebuild_gateway(&mut self) -> ApiResult<()> {
        self.gateway = None;
        if let Some(settings) = self.config.client_settings(self.timeout) {
            self.gateway = Some((self.factory)(&settings)?);
            info!(base_url = %settings.base_url, "gateway ready");
        }
        Ok(())
    }

    fn render_error(&mut self, error: &SelflayerError, context: &str) {
        debug!(error = %error, "command failed");
        self.terminal.print(&OutputFormatter::format_error(error, context));
    }

    fn success(&mut self, message: &str, title: &str) {
        self.terminal.print(&OutputFormatter::format_success_panel(message, title));
    }

    fn confirm(&mut self, question: &str) -> bool {
        let confirmed = self.terminal.confirm(question);
        if !confirmed {
            self.terminal.print(&OutputFormatter::format_info("Cancelled."));
        }
        confirmed
    }

    async fn handle_key(&mut self, action: KeyAction) -> SelflayerResult<()> {
        match action {
            KeyAction::Show => {
                let effective = self.config.effective_api_key();
                let masked = mask_api_key(effective.as_ref().map(|(key, _)| key.as_str()));
                let source = effective.map(|(_, source)| source);
                let path = self.config.path().display().to_string();
                self.terminal
                    .print(&OutputFormatter::format_key_status(&masked, source, &path));
            }
            KeyAction::Set(value) => {
                self.config.update_api_key(&value)?;
                self.state.clear();
                self.rebuild_gateway()?;
                info!("api key updated");
                self.success("API key saved to config.", "API Key Updated");

                if let Some((_, KeySource::Environment)) = self.config.effective_api_key() {
                    self.terminal.print(&OutputFormatter::format_warning(
                        "SELFLAYER_API_KEY is set and takes precedence over the stored key.",
                    ));
                }
                self.verify_key().await;
            }
            KeyAction::Clear => {
                self.config.clear_api_key()?;
                self.state.clear();
                self.rebuild_gateway()?;
                info!("api key cleared");
                self.success("Stored API key removed.", "API Key Cleared");
                if self.gateway.is_some() {
                    self.terminal.print(&OutputFormatter::format_info(
                        "Still connected using SELFLAYER_API_KEY from the environment.",
                    ));
                }
            }
        }
        Ok(())
    }

    /// Check the new key by fetching the profile. Failure is reported, the key stays saved.
    async fn verify_key(&mut self) {
        let Some(gateway) = self.gateway.as_deref() else {
            return;
        };
        match gateway.profile().await {
            Ok(profile) => {
                let message = format!("Connected as {}", profile.name());
                self.state.profile = Some(profile);
                self.success(&message, "Key Verified");
            }
            Err(e) => {
                warn!(error = %e, "api key verification failed");
                self.terminal
                    .print(&OutputFormatter::format_api_error(&e, "Key Verification"));
            }
        }
    }

    /// Stream the answer; fall back to a plain request if nothing arrived before a failure
    async fn handle_ask(&mut self, question: &str) -> SelflayerResult<()> {
        let request = AskRequest::new(question);
        let gateway = self.gateway.as_deref().ok_or(CommandError::MissingCredential)?;

        let mut received = false;
        let failure = match gateway.ask_stream(&request).await {
            Ok(mut stream) => loop {
                match stream.next_event().await {
                    Ok(StreamEvent::Chunk(chunk)) => {
                        let Some(text) = stream_chunk_text(&chunk) else {
                            continue;
                        };
                        if !received {
                            self.terminal.print(&OutputFormatter::format_stream_header());
                            received = true;
                        }
                        self.terminal.write_fragment(text);
                    }
                    Ok(StreamEvent::Done) => break None,
                    Err(e) => break Some(e),
                }
            },
            Err(e) => Some(e),
        };

        match (received, failure) {
            (true, None) => {
                self.terminal.print("");
                Ok(())
            }
            (true, Some(e)) => {
                warn!(error = %e, "answer stream interrupted");
                self.terminal.print(&OutputFormatter::format_stream_footer(true));
                Err(e.into())
            }
            (false, failure) => {
                if let Some(e) = failure {
                    warn!(error = %e, "streaming failed, retrying without streaming");
                }
                let response = gateway.ask(&request).await?;
                self.terminal.print(&OutputFormatter::format_ask_response(&response));
                Ok(())
            }
        }
    }

    async fn show_documents(&mut self) -> SelflayerResult<()> {
        let documents = self.gateway()?.list_documents().await?;
        self.state.documents.replace(documents);
        self.terminal
            .print(&OutputFormatter::format_documents(self.state.documents.items()));
        Ok(())
    }

    async fn handle_documents(&mut self, action: DocumentAction) -> SelflayerResult<()> {
        match action {
            DocumentAction::List => self.show_documents().await,
            DocumentAction::Show(index) => {
                let document = self.state.documents.get(index)?;
                self.terminal
                    .print(&OutputFormatter::format_document(document, index));
                Ok(())
            }
            DocumentAction::Upload { path, visibility } => {
                let upload = read_upload(&path, visibility).await?;
                let file_name = upload.file_name.clone();
                self.terminal.print(&OutputFormatter::format_info(&format!(
                    "Uploading {} ({} bytes)...",
                    file_name,
                    upload.bytes.len()
                )));
                self.gateway()?.upload_document(upload).await?;
                self.state.documents.invalidate();
                self.success(
                    &format!("Document '{}' uploaded. Processing has started.", file_name),
                    "Document Uploaded",
                );
                self.show_documents().await
            }
            DocumentAction::SetVisibility { index, visibility } => {
                let id = self.state.documents.resolve(index)?.to_string();
                self.gateway()?
                    .update_document_visibility(&id, &visibility)
                    .await?;
                self.state.documents.invalidate();
                self.success(
                    &format!("Document #{} is now {}.", index, visibility),
                    "Document Updated",
                );
                self.show_documents().await
            }
            DocumentAction::Delete(index) => {
                let document = self.state.documents.get(index)?;
                let id = document.id.clone();
                let question = format!("Delete document #{} '{}'?", index, document.title());
                if !self.confirm(&question) {
                    return Ok(());
                }
                self.gateway()?.delete_document(&id).await?;
                self.state.documents.invalidate();
                self.success(&format!("Document #{} deleted.", index), "Document Deleted");
                self.show_documents().await
            }
        }
    }

    async fn show_notes(&mut self) -> SelflayerResult<()> {
        let notes = self.gateway()?.list_notes().await?;
        self.state.notes.replace(notes);
        self.terminal
            .print(&OutputFormatter::format_notes(self.state.notes.items()));
        Ok(())
    }

    async fn handle_notes(&mut self, action: NoteAction) -> SelflayerResult<()> {
        match action {
            NoteAction::List => self.show_notes().await,
            NoteAction::Show(index) => {
                let note = self.state.notes.get(index)?;
                self.terminal.print(&OutputFormatter::format_note(note, index));
                Ok(())
            }
            NoteAction::Create { title, content } => {
                let request = NewNote::new(title, content);
                self.gateway()?.create_note(&request).await?;
                self.state.notes.invalidate();
                self.success(
                    &format!("Note '{}' created successfully.", request.title),
                    "Note Created",
                );
                self.show_notes().await
            }
            NoteAction::Edit { index, content } => {
                let id = self.state.notes.resolve(index)?.to_string();
                let update = NoteUpdate::new(None, Some(content));
                if update.is_empty() {
                    return Err(CommandError::Usage("Note content cannot be empty.".to_string()).into());
                }
                self.gateway()?.update_note(&id, &update).await?;
                self.state.notes.invalidate();
                self.success(&format!("Note #{} updated.", index), "Note Updated");
                self.show_notes().await
            }
            NoteAction::Delete(index) => {
                let note = self.state.notes.get(index)?;
                let id = note.id.clone();
                let question = format!("Delete note #{} '{}'?", index, note.title);
                if !self.confirm(&question) {
                    return Ok(());
                }
                self.gateway()?.delete_note(&id).await?;
                self.state.notes.invalidate();
                self.success(&format!("Note #{} deleted.", index), "Note Deleted");
                self.show_notes().await
            }
        }
    }

    async fn show_integrations(&mut self) -> SelflayerResult<()> {
        let integrations = self.gateway()?.list_integrations().await?;
        self.state.integrations.replace(integrations);
        self.terminal
            .print(&OutputFormatter::format_integrations(self.state.integrations.items()));
        Ok(())
    }

    async fn handle_integrations(&mut self, action: IntegrationAction) -> SelflayerResult<()> {
        match action {
            IntegrationAction::List => self.show_integrations().await,
            IntegrationAction::Connect(provider) => {
                let response = self.gateway()?.connect_integration(&provider).await?;
                self.state.integrations.invalidate();
                match response.redirect_url {
                    Some(url) => self.success(
                        &format!("Open this link to authorize {}:\n{}", provider, url),
                        "Connect Integration",
                    ),
                    None => {
                        let message = response
                            .message
                            .unwrap_or_else(|| format!("Connection to {} started.", provider));
                        self.success(&message, "Connect Integration");
                    }
                }
                Ok(())
            }
            IntegrationAction::Sync { index, enabled } => {
                let id = self.state.integrations.resolve(index)?.to_string();
                self.gateway()?.set_integration_sync(&id, enabled).await?;
                self.state.integrations.invalidate();
                let state = if enabled { "enabled" } else { "disabled" };
                self.success(
                    &format!("Sync {} for integration #{}.", state, index),
                    "Integration Updated",
                );
                self.show_integrations().await
            }
            IntegrationAction::Disconnect(index) => {
                let integration = self.state.integrations.get(index)?;
                let id = integration.id.clone();
                let question = format!("Disconnect integration #{} ({})?", index, integration.provider);
                if !self.confirm(&question) {
                    return Ok(());
                }
                self.gateway()?.disconnect_integration(&id).await?;
                self.state.integrations.invalidate();
                self.success(
                    &format!("Integration #{} disconnected.", index),
                    "Integration Disconnected",
                );
                self.show_integrations().await
            }
        }
    }

    async fn show_automations(&mut self) -> SelflayerResult<()> {
        let automations = self.gateway()?.list_automations().await?;
        self.state.automations.replace(automations);
        self.terminal
            .print(&OutputFormatter::format_automations(self.state.automations.items()));
        Ok(())
    }

    async fn handle_automations(&mut self, action: AutomationAction) -> SelflayerResult<()> {
        match action {
            AutomationAction::List => self.show_automations().await,
            AutomationAction::Show(index) => {
                let automation = self.state.automations.get(index)?;
                self.terminal
                    .print(&OutputFormatter::format_automation(automation, index));
                Ok(())
            }
            AutomationAction::Create { title, prompt } => {
                let request = NewAutomation::manual(title, prompt);
                self.gateway()?.create_automation(&request).await?;
                self.state.automations.invalidate();
                self.success(
                    &format!("Automation '{}' created.", request.title),
                    "Automation Created",
                );
                self.show_automations().await
            }
            AutomationAction::Run(index) => {
                let id = self.state.automations.resolve(index)?.to_string();
                let response = self.gateway()?.run_automation(&id).await?;
                self.state.automations.invalidate();
                let message = response_message(&response)
                    .unwrap_or_else(|| format!("Automation #{} started.", index));
                self.success(&message, "Automation Started");
                self.show_automations().await
            }
            AutomationAction::Enable(index) => self.set_automation_enabled(index, true).await,
            AutomationAction::Disable(index) => self.set_automation_enabled(index, false).await,
            AutomationAction::Delete(index) => {
                let automation = self.state.automations.get(index)?;
                let id = automation.id.clone();
                let question = format!("Delete automation #{} '{}'?", index, automation.title);
                if !self.confirm(&question) {
                    return Ok(());
                }
                self.gateway()?.delete_automation(&id).await?;
                self.state.automations.invalidate();
                self.success(&format!("Automation #{} deleted.", index), "Automation Deleted");
                self.show_automations().await
            }
        }
    }

    async fn set_automation_enabled(&mut self, index: usize, enabled: bool) -> SelflayerResult<()> {
        let id = self.state.automations.resolve(index)?.to_string();
        self.gateway()?.set_automation_enabled(&id, enabled).await?;
        self.state.automations.invalidate();
        let state = if enabled { "enabled" } else { "disabled" };
        self.success(
            &format!("Automation #{} {}.", index, state),
            "Automation Updated",
        );
        self.show_automations().await
    }

    async fn show_notifications(&mut self) -> SelflayerResult<()> {
        let notifications = self.gateway()?.list_notifications().await?;
        self.state.notifications.replace(notifications);
        self.terminal
            .print(&OutputFormatter::format_notifications(self.state.notifications.items()));
        Ok(())
    }

    async fn handle_notifications(&mut self, action: NotificationAction) -> SelflayerResult<()> {
        match action {
            NotificationAction::List => self.show_notifications().await,
            NotificationAction::MarkRead(index) => {
                let id = self.state.notifications.resolve(index)?.to_string();
                self.gateway()?.mark_notification_read(&id).await?;
                self.state.notifications.invalidate();
                self.success(
                    &format!("Notification #{} marked as read.", index),
                    "Notification Updated",
                );
                self.show_notifications().await
            }
            NotificationAction::MarkAllRead => {
                self.gateway()?.mark_all_notifications_read().await?;
                self.state.notifications.invalidate();
                self.success("All notifications marked as read.", "Notifications Updated");
                self.show_notifications().await
            }
            NotificationAction::Delete(index) => {
                let notification = self.state.notifications.get(index)?;
                let id = notification.id.clone();
                let question = format!("Delete notification #{} '{}'?", index, notification.title);
                if !self.confirm(&question) {
                    return Ok(());
                }
                self.gateway()?.delete_notification(&id).await?;
                self.state.notifications.invalidate();
                self.success(
                    &format!("Notification #{} deleted.", index),
                    "Notification Deleted",
                );
                self.show_notifications().await
            }
        }
    }
}

/// Title prefix for errors raised while running `command`
fn error_context(command: &Command) -> &'static str {
    match command {
        Command::Key(_) => "API Key",
        Command::Ask(_) => "Ask",
        Command::Search(_) => "Search",
        Command::Surface(_) => "Surface",
        Command::Profile => "Profile",
        Command::Rms(_) => "RMS",
        Command::Documents(_) => "Documents",
        Command::Notes(_) => "Notes",
        Command::Integrations(_) => "Integrations",
        Command::Automations(_) => "Automations",
        Command::Notifications(_) => "Notifications",
        Command::Help | Command::Clear | Command::Quit => "",
    }
}

/// `message` field of a loosely typed response
fn response_message(response: &JsonValue) -> Option<String> {
    response
        .get("message")
        .and_then(JsonValue::as_str)
        .map(str::to_string)
}

async fn read_upload(path: &str, visibility: Option<String>) -> Result<DocumentUpload, CommandError> {
    let file_path = Path::new(path);
    let file_name = file_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| CommandError::File(format!("Not a file path: {}", path)))?;
    let bytes = tokio::fs::read(file_path)
        .await
        .map_err(|e| CommandError::File(format!("Cannot read file '{}': {}", path, e)))?;

    let upload = DocumentUpload::new(file_name, bytes);
    Ok(match visibility {
        Some(visibility) => upload.with_visibility(visibility),
        None => upload,
    })
}
