use colored::*;
use serde_json::Value as JsonValue;

use crate::cli::panel::{Panel, Tone};
use crate::models::{
    action_label, truncate_chars, AskResponse, Automation, Document, Integration, Note,
    Notification, PersonaAgentResponse, Profile, SearchResult, SurfaceResult,
};
use crate::utils::config::KeySource;
use crate::utils::error::{ApiError, CommandError, ConfigError, SelflayerError};

const BANNER: &str = r"
███████╗███████╗██╗     ███████╗██╗      █████╗ ██╗   ██╗███████╗██████╗
██╔════╝██╔════╝██║     ██╔════╝██║     ██╔══██╗╚██╗ ██╔╝██╔════╝██╔══██╗
███████╗█████╗  ██║     █████╗  ██║     ███████║ ╚████╔╝ █████╗  ██████╔╝
╚════██║██╔══╝  ██║     ██╔══╝  ██║     ██╔══██║  ╚██╔╝  ██╔══╝  ██╔══██╗
███████║███████╗███████╗██║     ███████╗██║  ██║   ██║   ███████╗██║  ██║
╚══════╝╚══════╝╚══════╝╚═╝     ╚══════╝╚═╝  ╚═╝   ╚═╝   ╚══════╝╚═╝  ╚═╝";

const MAX_GRAPH_ENTITIES: usize = 8;
const MAX_DOCUMENT_HITS: usize = 5;
const MAX_SOURCE_CHUNKS: usize = 3;

/// Renders records and messages as styled terminal text
pub struct OutputFormatter;

impl OutputFormatter {
    /// Startup banner, adjusted to whether a key and profile are available
    pub fn format_welcome(has_api_key: bool, profile: Option<&Profile>) -> String {
        let (greeting, status) = match (has_api_key, profile) {
            (true, Some(profile)) => (
                profile.greeting(),
                format!("✓ Connected as {}", profile.name()).green().bold().to_string(),
            ),
            (true, None) => (
                "Welcome to SelfLayer!".to_string(),
                "✓ API Key Configured".green().bold().to_string(),
            ),
            _ => (
                "Welcome to SelfLayer!".to_string(),
                "✗ API Key Required".red().bold().to_string(),
            ),
        };

        let getting_started: Vec<String> = if has_api_key {
            vec![
                "Ready to go!".cyan().bold().to_string(),
                format!("• {} - Ask AI assistant", "/ask <question>".bold()),
                format!("• {} - Search your knowledge", "/search <query>".bold()),
                format!(
                    "• {} - Documents • {} - Notes • {} - Integrations",
                    "/d".bold(),
                    "/n".bold(),
                    "/i".bold()
                ),
            ]
        } else {
            vec![
                "Getting Started:".cyan().bold().to_string(),
                format!("• Set API key: {}", "/key sl_live_your_api_key_here".bold()),
                format!("• Or set environment: {}", "SELFLAYER_API_KEY".bold()),
            ]
        };

        Panel::new(
            format!("SelfLayer TUI v{} - AI-Powered Knowledge Management", env!("CARGO_PKG_VERSION")),
            Tone::Green,
        )
        .line(BANNER.trim_start_matches('\n').magenta().bold().to_string())
        .blank()
        .line(greeting.bold().to_string())
        .blank()
        .line("Your AI-powered knowledge management and research assistant.")
        .blank()
        .line(status)
        .blank()
        .lines(getting_started)
        .blank()
        .line(format!("Type {} for help • {} to quit", "/h".cyan().bold(), "/q".cyan().bold()))
        .render()
    }

    /// Command reference
    pub fn format_help() -> String {
        let section = |title: &str| title.cyan().bold().to_string();
        let item = |command: &str, text: &str| format!("• {} - {}", command.bold(), text);

        Panel::new("Help & Documentation", Tone::Green)
            .line("SelfLayer Commands Reference".magenta().bold().to_string())
            .blank()
            .line(section("🔑 Setup:"))
            .line(item("/key (/k)", "Show API key status"))
            .line(item("/key <api_key>", "Set SelfLayer API key"))
            .line(item("/key clear", "Clear stored API key"))
            .blank()
            .line(section("🤖 AI & Search:"))
            .line(item("/ask <question> (/a)", "Ask the AI assistant about your knowledge base"))
            .line(item("/search <query> (/s)", "Search documents, notes and the knowledge graph"))
            .line(item("/surface [text] (/m)", "Surface a random memory"))
            .line(item("/profile (/p)", "Show your profile"))
            .blank()
            .line(section("📄 Documents:"))
            .line(item("/documents (/d)", "List all documents"))
            .line(item("/d new /path/to/file [visibility]", "Upload and process a document"))
            .line(item("/d 1", "View details for document #1"))
            .line(item("/d visibility 1 shared", "Change visibility of document #1"))
            .line(item("/d delete 1", "Delete document #1"))
            .blank()
            .line(section("📝 Notes:"))
            .line(item("/notes (/n)", "List all notes"))
            .line(item("/n new \"Title\" \"Content here\"", "Create a note"))
            .line(item("/n 1", "View details for note #1"))
            .line(item("/n edit 1 \"Updated content\"", "Edit note #1"))
            .line(item("/n delete 1", "Delete note #1"))
            .blank()
            .line(section("🔗 Integrations:"))
            .line(item("/integrations (/i)", "List connections"))
            .line(item("/i connect gmail", "Connect an account"))
            .line(item("/i sync 1 on|off", "Toggle syncing for integration #1"))
            .line(item("/i disconnect 1", "Disconnect integration #1"))
            .blank()
            .line(section("⚙️ Automations:"))
            .line(item("/automations (/auto)", "List automations"))
            .line(item("/auto 1", "View details for automation #1"))
            .line(item("/auto new \"Title\" \"Prompt\"", "Create a manual automation"))
            .line(item("/auto run 1", "Run automation #1 now"))
            .line(item("/auto enable 1 | /auto disable 1", "Toggle automation #1"))
            .line(item("/auto delete 1", "Delete automation #1"))
            .blank()
            .line(section("📢 Notifications:"))
            .line(item("/notifications (/notifs)", "View all notifications"))
            .line(item("/notifs read 1", "Mark notification #1 as read"))
            .line(item("/notifs clear", "Mark all as read"))
            .line(item("/notifs delete 1", "Delete notification #1"))
            .blank()
            .line(section("🔮 Advanced:"))
            .line(item("/rms <email|name|\"company\"> (/r)", "Relationship Micro-Summary"))
            .line(item("/clear (/c)", "Clear screen"))
            .line(item("/help (/h)", "Show this help"))
            .line(item("/quit (/q)", "Exit"))
            .blank()
            .line("Tips:".yellow().bold().to_string())
            .line(format!(
                "• Use numbers from the last listing to reference items: {}, {}",
                "/d 1".cyan(),
                "/n edit 2".cyan()
            ))
            .render()
    }

    pub fn format_profile(profile: &Profile) -> String {
        let mut panel = Panel::new("🧑‍💻 Your Profile", Tone::Green)
            .line(format!("👋 {}", profile.greeting()))
            .blank()
            .line(labelled("Name", profile.name()))
            .line(labelled("Email", &profile.email_display()))
            .line(labelled("Occupation", &profile.occupation_display()))
            .line(labelled("Company", &profile.company_display()))
            .line(labelled("Skills", &profile.skills_display()))
            .line(labelled("Timezone", &profile.timezone_display()))
            .line(labelled("Safe Mode", profile.safe_mode_display()))
            .line(labelled("Subscription", &profile.subscription_display()))
            .line(labelled("Member Since", &profile.member_since()));

        if let Some(goals) = profile.main_goals.as_deref().filter(|g| !g.trim().is_empty()) {
            panel = panel.blank().line(format!("🎯 {}", "Goals:".bold())).line(goals);
        }

        panel
            .blank()
            .line(format!("📊 {}", "Usage Statistics:".bold()))
            .line(format!("  📄 Documents: {}", profile.usage_count("documents")))
            .line(format!("  📝 Notes: {}", profile.usage_count("notes")))
            .render()
    }

    pub fn format_documents(documents: &[Document]) -> String {
        if documents.is_empty() {
            return Panel::new("Documents", Tone::Yellow)
                .line("📄 No documents found.".yellow().to_string())
                .blank()
                .line(format!("Upload your first document with: {}", "/d new /path/to/file".cyan()))
                .render();
        }

        let mut panel = Panel::new(format!("📄 Your Documents ({} total)", documents.len()), Tone::Blue);
        for (i, doc) in documents.iter().enumerate() {
            if i > 0 {
                panel.push("");
            }
            panel.push(format!("{} {}", index_tag(i + 1), doc.title().bold()));
            panel.push(format!(
                "{} {} • {}",
                doc.status_emoji(),
                doc.processing_status().green().bold(),
                format!("📅 {} • 💾 {}", doc.created_display(), doc.size_display()).dimmed()
            ));
            panel.push(format!("📝 {} {}", "Summary:".bold(), doc.summary_display()));
        }
        panel.render()
    }

    pub fn format_document(document: &Document, index: usize) -> String {
        Panel::new("📄 Document Details", Tone::Magenta)
            .line(format!("{} {}", index_tag(index), document.title().bold()))
            .blank()
            .line(format!("📁 {} {}", "File:".bold(), document.file_name))
            .line(format!("{} {} {}", document.status_emoji(), "Status:".bold(), document.processing_status()))
            .line(format!("📦 {} {}", "Size:".bold(), document.size_display()))
            .line(format!("👁️ {} {}", "Visibility:".bold(), document.visibility))
            .line(format!("📅 {} {}", "Created:".bold(), document.created_display()))
            .blank()
            .line(format!("📝 {}", "Summary:".bold()))
            .line(document.summary_display())
            .render()
    }

    pub fn format_notes(notes: &[Note]) -> String {
        if notes.is_empty() {
            return Panel::new("Notes", Tone::Yellow)
                .line("📝 No notes found.".yellow().to_string())
                .blank()
                .line(format!(
                    "Create your first note with: {}",
                    "/n new \"Title\" \"Content here\"".cyan()
                ))
                .render();
        }

        let mut panel = Panel::new("📝 Notes", Tone::Green)
            .line(format!("📝 {}", format!("Your Notes ({} total)", notes.len()).bold()))
            .blank();
        for (i, note) in notes.iter().enumerate() {
            panel.push(format!("{} {}", index_tag(i + 1), note.title.bold()));
            panel.push(format!(
                "    {} • {}",
                note.created_display().dimmed(),
                note.updated_display().dimmed()
            ));
            panel.push(format!("    {} {}", "Content:".bold(), note.preview(100)));
            panel.push(format!("    🏷️ {}", note.tags_display()));
            panel.push("");
        }
        panel.render()
    }

    pub fn format_note(note: &Note, index: usize) -> String {
        let mut panel = Panel::new("📝 Note Details", Tone::Green)
            .line(format!("{} {}", index_tag(index), note.title.bold()))
            .blank()
            .line(format!("📅 {} {}", "Created:".bold(), note.created_display()))
            .line(format!("🔄 {} {}", "Updated:".bold(), note.updated_display()))
            .line(format!("🏷️ {} {}", "Tags:".bold(), note.tags_display()));
        if let Some(error) = note.processing_error.as_deref() {
            panel = panel.line(format!("⚠️ {} {}", "Processing error:".bold(), error.red()));
        }
        panel
            .blank()
            .line("Content:".bold().to_string())
            .line(&note.content)
            .render()
    }

    pub fn format_search(result: &SearchResult, query: &str) -> String {
        let mut panel = Panel::new("🔍 Search Results", Tone::Cyan)
            .line(format!("🔍 {} {}", "Search Query:".bold(), query.cyan()))
            .line(format!("📊 {} {}", "Total Results:".bold(), result.total_results()))
            .blank();

        if !result.graph_results.is_empty() {
            panel.push(
                format!("🕸️  Knowledge Graph ({} results)", result.graph_results.len())
                    .green()
                    .bold()
                    .to_string(),
            );
            for line in Self::format_graph_ascii(&result.graph_results, &result.graph_relationships) {
                panel.push(line);
            }
            panel.push("");
            panel.push("Entities:".bold().to_string());
            for (i, entity) in result.graph_results.iter().take(MAX_GRAPH_ENTITIES).enumerate() {
                panel.push(format_entity(i + 1, entity));
            }
            if result.graph_results.len() > MAX_GRAPH_ENTITIES {
                panel.push(format!(
                    "  ... and {} more entities",
                    result.graph_results.len() - MAX_GRAPH_ENTITIES
                ));
            }
            panel.push("");
        }

        if !result.document_summaries.is_empty() {
            panel.push(
                format!("📄 Documents ({} results)", result.document_summaries.len())
                    .blue()
                    .bold()
                    .to_string(),
            );
            for (i, doc) in result.document_summaries.iter().take(MAX_DOCUMENT_HITS).enumerate() {
                let title = str_field(doc, &["title"]).unwrap_or("Untitled");
                let snippet = str_field(doc, &["snippet"]).unwrap_or("No preview available");
                panel.push(format!("  {}. {}", i + 1, title.bold()));
                panel.push(format!("     {}", truncate_chars(snippet, 100)));
            }
            if result.document_summaries.len() > MAX_DOCUMENT_HITS {
                panel.push(format!(
                    "  ... and {} more",
                    result.document_summaries.len() - MAX_DOCUMENT_HITS
                ));
            }
            panel.push("");
        }

        if !result.source_chunks.is_empty() {
            panel.push(
                format!("📋 Source Chunks ({} results)", result.source_chunks.len())
                    .yellow()
                    .bold()
                    .to_string(),
            );
            for (i, chunk) in result.source_chunks.iter().take(MAX_SOURCE_CHUNKS).enumerate() {
                let text = str_field(chunk, &["text"]).unwrap_or("No content available");
                panel.push(format!("  {}. {}", i + 1, truncate_chars(text, 150)));
            }
            if result.source_chunks.len() > MAX_SOURCE_CHUNKS {
                panel.push(format!(
                    "  ... and {} more chunks",
                    result.source_chunks.len() - MAX_SOURCE_CHUNKS
                ));
            }
            panel.push("");
        }

        if !result.conversation_history.is_empty() || !result.honcho_insights.is_empty() {
            panel.push(format!(
                "💬 {} {} conversations • {} insights",
                "Context:".bold(),
                result.conversation_history.len(),
                result.honcho_insights.len()
            ));
        }

        if result.is_empty() {
            panel.push("No results found for this query.".yellow().to_string());
            panel.push("");
            panel.push("Try:");
            panel.push("• Different keywords");
            panel.push("• Broader search terms");
            panel.push("• Check your spelling");
        }

        panel.render()
    }

    /// Text sketch of graph relationships, or the top entities when there are none
    pub fn format_graph_ascii(entities: &[JsonValue], relationships: &[JsonValue]) -> Vec<String> {
        if entities.is_empty() {
            return vec![format!("  {}", "No graph data available".dimmed())];
        }

        let name_of = |uuid: Option<&str>| -> String {
            uuid.and_then(|id| {
                entities
                    .iter()
                    .find(|entity| entity.get("uuid").and_then(JsonValue::as_str) == Some(id))
            })
            .and_then(|entity| str_field(entity, &["name", "title"]))
            .unwrap_or("Unknown")
            .to_string()
        };

        let mut lines = Vec::new();
        if relationships.is_empty() {
            lines.push(format!("{}", "📊 Top Entities:".bold()));
            for entity in entities.iter().take(6) {
                let name = str_field(entity, &["name", "title"]).unwrap_or("Unknown");
                let kind = str_field(entity, &["type", "source_kind"]).unwrap_or("Entity");
                lines.push(format!("  {}: {}", kind.cyan(), name.dimmed()));
            }
            return lines;
        }

        lines.push(format!("{}", "📊 Network Structure:".bold()));
        let mut groups: Vec<(String, Vec<&JsonValue>)> = Vec::new();
        for rel in relationships.iter().take(10) {
            let kind = str_field(rel, &["type"]).unwrap_or("CONNECTED").to_string();
            match groups.iter_mut().find(|(k, _)| *k == kind) {
                Some((_, rels)) => rels.push(rel),
                None => groups.push((kind, vec![rel])),
            }
        }
        for (kind, rels) in groups {
            lines.push(format!("  {}", format!("{}:", kind).cyan()));
            for rel in rels.into_iter().take(5) {
                let source = name_of(str_field(rel, &["source"]));
                let target = name_of(str_field(rel, &["target"]));
                lines.push(format!("    {} → {}", source.dimmed(), target.dimmed()));
            }
        }
        lines
    }

    pub fn format_notifications(notifications: &[Notification]) -> String {
        if notifications.is_empty() {
            return Panel::new("Notifications", Tone::Green)
                .line("🎉 All caught up! No notifications.".green().to_string())
                .render();
        }

        let unread = notifications.iter().filter(|n| !n.read).count();
        let mut panel = Panel::new("📢 Notifications", Tone::Yellow)
            .line(format!(
                "📢 {} {} | {} {}",
                "Total:".bold(),
                notifications.len(),
                "Unread:".bold(),
                unread
            ))
            .blank();
        for (i, notification) in notifications.iter().enumerate() {
            let heading = format!(
                "{} {} {} {}",
                index_tag(i + 1),
                notification.type_emoji(),
                notification.title,
                notification.read_marker()
            );
            if notification.read {
                panel.push(heading.dimmed().to_string());
                panel.push(format!("    {}", notification.message).dimmed().to_string());
            } else {
                panel.push(heading.bold().to_string());
                panel.push(format!("    {}", notification.message.bold()));
            }
            panel.push(format!("    {}", notification.created_display().dimmed()));
            panel.push("");
        }
        panel.render()
    }

    pub fn format_integrations(integrations: &[Integration]) -> String {
        if integrations.is_empty() {
            return Panel::new("Integrations", Tone::Yellow)
                .line("🔗 No integrations connected.".yellow().to_string())
                .blank()
                .line(format!("Connect your first integration with: {}", "/i connect gmail".cyan()))
                .render();
        }

        let headers = ["#", "Provider", "Account", "Status", "Sync", "Last Sync"];
        let rows: Vec<Vec<String>> = integrations
            .iter()
            .enumerate()
            .map(|(i, integration)| {
                let account = if integration.account_identifier.is_empty() {
                    integration.display_name.clone()
                } else {
                    integration.account_identifier.clone()
                };
                vec![
                    (i + 1).to_string(),
                    format!("{} {}", integration.provider_emoji(), integration.provider),
                    account,
                    format!("{} {}", integration.status_emoji(), integration.sync_status),
                    if integration.is_sync_enabled { "on" } else { "off" }.to_string(),
                    integration.last_sync_display(),
                ]
            })
            .collect();

        Panel::new(format!("🔗 Your Integrations ({} total)", integrations.len()), Tone::Blue)
            .line(format_table(&headers, &rows))
            .render()
    }

    pub fn format_automations(automations: &[Automation]) -> String {
        if automations.is_empty() {
            return Panel::new("Automations", Tone::Yellow)
                .line("⚙️ No automations found.".yellow().to_string())
                .blank()
                .line(format!(
                    "Create one with: {}",
                    "/auto new \"Title\" \"Prompt\"".cyan()
                ))
                .render();
        }

        let mut panel = Panel::new(format!("⚙️ Automations ({} total)", automations.len()), Tone::Magenta);
        for (i, automation) in automations.iter().enumerate() {
            panel.push(format!(
                "{} {} {}",
                index_tag(i + 1),
                automation.type_emoji(),
                automation.title.bold()
            ));
            panel.push(format!(
                "    {} • {}",
                automation.schedule_display(),
                automation.enabled_display()
            ));
            panel.push(format!(
                "    {}",
                format!(
                    "{} Last run: {}",
                    automation.status_emoji(),
                    automation.last_run_display()
                )
                .dimmed()
            ));
            panel.push("");
        }
        panel.render()
    }

    pub fn format_automation(automation: &Automation, index: usize) -> String {
        let mut panel = Panel::new("⚙️ Automation Details", Tone::Magenta)
            .line(format!("{} {} {}", index_tag(index), automation.type_emoji(), automation.title.bold()))
            .blank()
            .line(format!("🗓️ {} {}", "Schedule:".bold(), automation.schedule_display()))
            .line(format!("🔌 {} {}", "State:".bold(), automation.enabled_display()))
            .line(format!(
                "{} {} {} ({})",
                automation.status_emoji(),
                "Last run:".bold(),
                automation.last_run_display(),
                automation.last_status_display()
            ))
            .line(format!("📅 {} {}", "Created:".bold(), automation.created_display()));
        if let Some(message) = automation.last_run_message.as_deref() {
            panel = panel.line(format!("💬 {} {}", "Last message:".bold(), message));
        }
        if !automation.description.trim().is_empty() {
            panel = panel.blank().line("Description:".bold().to_string()).line(&automation.description);
        }
        panel
            .blank()
            .line("Prompt:".bold().to_string())
            .line(&automation.prompt)
            .render()
    }

    pub fn format_ask_response(response: &AskResponse) -> String {
        let mut panel = Panel::new("🤖 AI Assistant", Tone::Green)
            .line(format!("🤖 {}", "SelfLayer AI Assistant".bold()))
            .blank()
            .line(response.answer());

        if !response.data.suggested_followups.is_empty() {
            panel = panel.blank().line(format!("💡 {}", "Suggested follow-ups:".bold()));
            for followup in &response.data.suggested_followups {
                panel.push(format!("  • {}", followup));
            }
        }
        if !response.data.proposed_actions.is_empty() {
            panel = panel.blank().line(format!("⚡ {}", "Proposed actions:".bold()));
            for action in &response.data.proposed_actions {
                panel.push(format!("  • {}", action_label(action)));
            }
        }
        panel.render()
    }

    /// Heading printed before streamed answer fragments
    pub fn format_stream_header() -> String {
        format!("{} {}", "🤖".green(), "AI Assistant".green().bold())
    }

    /// Line printed once a streamed answer is complete
    pub fn format_stream_footer(interrupted: bool) -> String {
        if interrupted {
            format!("\n{}", "● Stream interrupted".yellow().dimmed())
        } else {
            String::new()
        }
    }

    pub fn format_persona(response: &PersonaAgentResponse, query: &str) -> String {
        let mut panel = Panel::new("🤝 Relationship Micro-Summary (RMS)", Tone::Magenta);
        if !query.is_empty() {
            panel.push(format!("🔍 {} {}", "Query:".bold(), query.cyan()));
            panel.push("");
        }
        panel.push(format!("👤 {}", "Profile:".bold()));
        panel.push(format!("  {}", response.profile.name.bold()));
        panel.push(format!("  {}", response.profile.email.dimmed()));
        if let Some(role) = response.profile.role_line() {
            panel.push(format!("  {}", role.dimmed()));
        }
        panel.push("");
        panel.push(format!("🤝 {}", "Relationship Micro-Summary:".bold()));
        panel.push(response.rms.italic().to_string());

        if !response.proposed_actions.is_empty() {
            panel.push("");
            panel.push(format!(
                "⚙️ {}",
                format!("Suggested Actions ({}):", response.proposed_actions.len()).bold()
            ));
            for (i, action) in response.proposed_actions.iter().enumerate() {
                panel.push(format!("  {}. {}", i + 1, action.short_display.cyan()));
            }
        }
        panel.render()
    }

    pub fn format_surface(result: &SurfaceResult, query: Option<&str>) -> String {
        let mut panel = Panel::new("🌊 Random Memory Surfacing", Tone::Magenta);
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            panel.push(format!("🌊 {} {}", "Query:".bold(), query.cyan()));
            panel.push("");
        }
        panel
            .line(format!("🧾 {} {}", "Intent:".bold(), result.intent))
            .blank()
            .line(format!("💭 {}", "Response:".bold()))
            .line(&result.content)
            .render()
    }

    /// Current key status for `/key`
    pub fn format_key_status(masked_key: &str, source: Option<KeySource>, config_path: &str) -> String {
        let status = match source {
            Some(source) => format!("✓ Configured ({})", source).green().bold().to_string(),
            None => "✗ Not configured".red().bold().to_string(),
        };
        Panel::new("🔑 API Key", Tone::Cyan)
            .line(labelled("Status", &status))
            .line(labelled("Key", masked_key))
            .line(labelled("Config", config_path))
            .blank()
            .line(format!("Set a key with {}", "/key sl_live_your_api_key_here".cyan()))
            .render()
    }

    pub fn format_error_panel(message: &str, title: &str) -> String {
        Panel::new(format!("❌ {}", title), Tone::Red)
            .line(message.red().to_string())
            .render()
    }

    pub fn format_success_panel(message: &str, title: &str) -> String {
        Panel::new(format!("✅ {}", title), Tone::Green)
            .line(message.green().to_string())
            .render()
    }

    /// Gateway failure with a title and hint chosen from its classification
    pub fn format_api_error(error: &ApiError, context: &str) -> String {
        let (title, tone, hint) = match error {
            ApiError::Unauthorized { .. } => (
                "Authentication Error",
                Tone::Red,
                Some("Check your SELFLAYER_API_KEY environment variable."),
            ),
            ApiError::Forbidden { .. } => (
                "Permission Denied",
                Tone::Red,
                Some("Your API key may not have sufficient permissions."),
            ),
            ApiError::NotFound { .. } => ("Not Found", Tone::Yellow, None),
            ApiError::Validation { .. } => ("Validation Error", Tone::Red, None),
            ApiError::RateLimited { .. } => ("Rate Limited", Tone::Yellow, Some("Please wait and try again.")),
            ApiError::Server { .. } => ("API Error", Tone::Red, None),
            ApiError::Timeout(_) => ("Request Timeout", Tone::Yellow, Some("The server took too long to respond.")),
            ApiError::Transport(_) => ("Connection Error", Tone::Red, Some("Check your network and SELFLAYER_BASE_URL.")),
            ApiError::InvalidResponse(_) => ("Invalid Response", Tone::Red, None),
        };

        let title = if context.is_empty() {
            title.to_string()
        } else {
            format!("{} - {}", context, title)
        };
        let mut panel = Panel::new(format!("❌ {}", title), tone).line(error.message().red().to_string());
        if let Some(hint) = hint {
            panel = panel.blank().line(hint);
        }
        panel.render()
    }

    /// Any client error, rendered as a panel
    pub fn format_error(error: &SelflayerError, context: &str) -> String {
        match error {
            SelflayerError::Api(api) => Self::format_api_error(api, context),
            SelflayerError::Command(command) => {
                let title = match command {
                    CommandError::UnknownCommand(_) => "Invalid Command",
                    CommandError::Usage(_) => "Invalid Arguments",
                    CommandError::InvalidIndex { .. } => "Invalid Input",
                    CommandError::IndexNotFound { kind, .. } => {
                        return Self::format_error_panel(&command.to_string(), &format!("{} Not Found", kind))
                    }
                    CommandError::MissingCredential => "API Error",
                    CommandError::File(_) => "File Error",
                };
                Self::format_error_panel(&command.to_string(), title)
            }
            SelflayerError::Config(config) => {
                let title = match config {
                    ConfigError::EmptyApiKey | ConfigError::InvalidApiKey => "Invalid API Key",
                    _ => "Configuration Error",
                };
                Self::format_error_panel(&config.to_string(), title)
            }
        }
    }

    /// Format info message for CLI display
    pub fn format_info(message: &str) -> String {
        format!("{} {}", "Info:".blue().bold(), message)
    }

    /// Format warning message for CLI display
    pub fn format_warning(message: &str) -> String {
        format!("{} {}", "Warning:".yellow().bold(), message)
    }
}

fn labelled(label: &str, value: &str) -> String {
    format!("{} {}", format!("{}:", label).bold(), value)
}

fn index_tag(index: usize) -> String {
    format!("[{}]", index).cyan().bold().to_string()
}

/// First string value found under any of `keys`
fn str_field<'a>(value: &'a JsonValue, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| value.get(*key).and_then(JsonValue::as_str))
}

fn format_entity(index: usize, entity: &JsonValue) -> String {
    let name = str_field(entity, &["name", "title"]).unwrap_or("Unknown");
    let kind = str_field(entity, &["type"]).unwrap_or("Entity");
    let type_display = if kind != "Entity" {
        kind.cyan().to_string()
    } else {
        str_field(entity, &["source_kind"])
            .filter(|s| !s.is_empty())
            .unwrap_or("Entity")
            .dimmed()
            .to_string()
    };

    let mut line = format!("  {}. {}: {}", index, type_display, name.bold());
    if let Some(description) = str_field(entity, &["description"]).filter(|d| !d.is_empty()) {
        line.push_str(&format!(" - {}", truncate_chars(description, 83).dimmed()));
    }
    line
}

/// Bordered table. Cells are padded on their plain text before colouring.
fn format_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }
    }

    let pad = |text: &str, width: usize| {
        let fill = width.saturating_sub(text.chars().count());
        format!("{}{}", text, " ".repeat(fill))
    };
    let border = {
        let mut line = String::from("+");
        for width in &widths {
            line.push_str(&"-".repeat(width + 2));
            line.push('+');
        }
        line
    };

    let mut output = String::new();
    output.push_str(&border);
    output.push('\n');
    output.push('|');
    for (i, header) in headers.iter().enumerate() {
        output.push_str(&format!(" {} |", pad(*header, widths[i]).magenta().bold()));
    }
    output.push('\n');
    output.push_str(&border);
    output.push('\n');

    for row in rows {
        output.push('|');
        for (i, cell) in row.iter().enumerate().take(widths.len()) {
            let padded = pad(cell.as_str(), widths[i]);
            let styled = if i == 0 { padded.cyan().bold().to_string() } else { padded };
            output.push_str(&format!(" {} |", styled));
        }
        output.push('\n');
    }
    output.push_str(&border);
    output
}
