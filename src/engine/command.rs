use crate::models::app_state::{
    parse_index, ListLabel, AUTOMATION_LABEL, DOCUMENT_LABEL, INTEGRATION_LABEL, NOTE_LABEL,
    NOTIFICATION_LABEL,
};
use crate::utils::error::CommandError;

pub const DOCUMENTS_USAGE: &str =
    "Usage: /d, /d new <path> [visibility], /d 1, /d delete 1, /d visibility 1 <personal|shared>";
pub const NOTES_USAGE: &str =
    "Usage: /n, /n new \"Title\" \"Content\", /n 1, /n edit 1 \"Content\", /n delete 1";
pub const INTEGRATIONS_USAGE: &str =
    "Usage: /i, /i connect <provider>, /i sync 1 on|off, /i disconnect 1";
pub const AUTOMATIONS_USAGE: &str =
    "Usage: /auto, /auto 1, /auto new \"Title\" \"Prompt\", /auto run 1, /auto enable 1, /auto disable 1, /auto delete 1";
pub const NOTIFICATIONS_USAGE: &str =
    "Usage: /notifs, /notifs read 1, /notifs clear, /notifs delete 1";

/// `/key` sub-forms
#[derive(Debug, Clone, PartialEq)]
pub enum KeyAction {
    Show,
    Set(String),
    Clear,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DocumentAction {
    List,
    Upload { path: String, visibility: Option<String> },
    Show(usize),
    Delete(usize),
    SetVisibility { index: usize, visibility: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum NoteAction {
    List,
    Create { title: String, content: String },
    Show(usize),
    Edit { index: usize, content: String },
    Delete(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum IntegrationAction {
    List,
    Connect(String),
    Sync { index: usize, enabled: bool },
    Disconnect(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AutomationAction {
    List,
    Show(usize),
    Create { title: String, prompt: String },
    Run(usize),
    Enable(usize),
    Disable(usize),
    Delete(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum NotificationAction {
    List,
    MarkRead(usize),
    MarkAllRead,
    Delete(usize),
}

/// One parsed line of user input
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Key(KeyAction),
    Clear,
    Quit,
    Ask(String),
    Search(String),
    Surface(Option<String>),
    Profile,
    Documents(DocumentAction),
    Notes(NoteAction),
    Integrations(IntegrationAction),
    Automations(AutomationAction),
    Notifications(NotificationAction),
    Rms(String),
}

/// A command word with its aliases resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Help,
    Key,
    Clear,
    Quit,
    Ask,
    Search,
    Surface,
    Profile,
    Rms,
    Documents,
    Notes,
    Integrations,
    Automations,
    Notifications,
}

impl Verb {
    /// Resolve a command word, with or without its leading slash
    pub fn resolve(word: &str) -> Option<Verb> {
        let name = word.strip_prefix('/').unwrap_or(word).to_lowercase();
        let verb = match name.as_str() {
            "help" | "h" => Verb::Help,
            "key" | "k" => Verb::Key,
            "clear" | "c" => Verb::Clear,
            "quit" | "exit" | "q" => Verb::Quit,
            "ask" | "a" => Verb::Ask,
            "search" | "s" => Verb::Search,
            "surface" | "m" => Verb::Surface,
            "profile" | "p" => Verb::Profile,
            "rms" | "r" => Verb::Rms,
            "documents" | "d" => Verb::Documents,
            "notes" | "n" => Verb::Notes,
            "integrations" | "i" => Verb::Integrations,
            "automations" | "auto" => Verb::Automations,
            "notifications" | "notifs" => Verb::Notifications,
            _ => return None,
        };
        Some(verb)
    }

    /// Whether the verb needs a configured API key
    pub fn requires_credential(self) -> bool {
        !matches!(self, Verb::Help | Verb::Key | Verb::Clear | Verb::Quit)
    }

    /// Parse the argument text that followed the verb
    pub fn parse_args(self, rest: &str) -> Result<Command, CommandError> {
        let command = match self {
            Verb::Help => Command::Help,
            Verb::Key => Command::Key(parse_key(rest)),
            Verb::Clear => Command::Clear,
            Verb::Quit => Command::Quit,
            Verb::Ask => Command::Ask(required_text(rest, "Usage: /ask <question>")?),
            Verb::Search => Command::Search(required_text(rest, "Usage: /search <query>")?),
            Verb::Surface => Command::Surface(Some(rest.to_string()).filter(|t| !t.is_empty())),
            Verb::Profile => Command::Profile,
            Verb::Rms => Command::Rms(required_text(
                rest,
                "Usage: /rms <email | \"company\" | name>",
            )?),
            Verb::Documents => Command::Documents(parse_documents(&tokenize(rest)?)?),
            Verb::Notes => Command::Notes(parse_notes(&tokenize(rest)?)?),
            Verb::Integrations => Command::Integrations(parse_integrations(&tokenize(rest)?)?),
            Verb::Automations => Command::Automations(parse_automations(&tokenize(rest)?)?),
            Verb::Notifications => Command::Notifications(parse_notifications(&tokenize(rest)?)?),
        };
        Ok(command)
    }
}

/// Split a line into its verb and the trimmed remainder. Blank lines yield `None`.
pub fn split_line(line: &str) -> Result<Option<(Verb, &str)>, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    match Verb::resolve(word) {
        Some(verb) => Ok(Some((verb, rest))),
        None => Err(CommandError::UnknownCommand(word.to_string())),
    }
}

impl Command {
    /// Parse a full input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
        match split_line(line)? {
            Some((verb, rest)) => verb.parse_args(rest).map(Some),
            None => Ok(None),
        }
    }

    pub fn verb(&self) -> Verb {
        match self {
            Command::Help => Verb::Help,
            Command::Key(_) => Verb::Key,
            Command::Clear => Verb::Clear,
            Command::Quit => Verb::Quit,
            Command::Ask(_) => Verb::Ask,
            Command::Search(_) => Verb::Search,
            Command::Surface(_) => Verb::Surface,
            Command::Profile => Verb::Profile,
            Command::Rms(_) => Verb::Rms,
            Command::Documents(_) => Verb::Documents,
            Command::Notes(_) => Verb::Notes,
            Command::Integrations(_) => Verb::Integrations,
            Command::Automations(_) => Verb::Automations,
            Command::Notifications(_) => Verb::Notifications,
        }
    }

    /// Whether the command needs a configured API key
    pub fn requires_credential(&self) -> bool {
        self.verb().requires_credential()
    }
}

fn required_text(rest: &str, usage: &str) -> Result<String, CommandError> {
    if rest.is_empty() {
        return Err(CommandError::Usage(usage.to_string()));
    }
    Ok(rest.to_string())
}

fn parse_key(rest: &str) -> KeyAction {
    match rest {
        "" => KeyAction::Show,
        r if r.eq_ignore_ascii_case("clear") => KeyAction::Clear,
        r => KeyAction::Set(r.to_string()),
    }
}

/// Split on whitespace, keeping single- or double-quoted runs together
pub fn tokenize(input: &str) -> Result<Vec<String>, CommandError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;

    for ch in input.chars() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => current.push(ch),
            None if ch == '"' || ch == '\'' => {
                quote = Some(ch);
                in_token = true;
            }
            None if ch.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            None => {
                current.push(ch);
                in_token = true;
            }
        }
    }

    if let Some(q) = quote {
        return Err(CommandError::Usage(format!("Unterminated {} quote", q)));
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

fn index_arg(label: ListLabel, args: &[String], position: usize, usage: &str) -> Result<usize, CommandError> {
    match args.get(position) {
        Some(raw) => parse_index(label, raw),
        None => Err(CommandError::Usage(usage.to_string())),
    }
}

fn rest_text(args: &[String], from: usize) -> String {
    args.get(from..).map(|tail| tail.join(" ")).unwrap_or_default()
}

fn is_number(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_digit())
}

fn parse_documents(args: &[String]) -> Result<DocumentAction, CommandError> {
    let usage = DOCUMENTS_USAGE;
    let Some(first) = args.first() else {
        return Ok(DocumentAction::List);
    };
    match first.to_lowercase().as_str() {
        "new" | "upload" => match args.get(1) {
            Some(path) if !path.trim().is_empty() => Ok(DocumentAction::Upload {
                path: path.clone(),
                visibility: args.get(2).cloned(),
            }),
            _ => Err(CommandError::Usage(usage.to_string())),
        },
        "delete" => Ok(DocumentAction::Delete(index_arg(DOCUMENT_LABEL, args, 1, usage)?)),
        "visibility" => {
            let index = index_arg(DOCUMENT_LABEL, args, 1, usage)?;
            match args.get(2) {
                Some(visibility) => Ok(DocumentAction::SetVisibility {
                    index,
                    visibility: visibility.to_lowercase(),
                }),
                None => Err(CommandError::Usage(usage.to_string())),
            }
        }
        token if is_number(token) => Ok(DocumentAction::Show(parse_index(DOCUMENT_LABEL, token)?)),
        _ => Err(CommandError::Usage(usage.to_string())),
    }
}

fn parse_notes(args: &[String]) -> Result<NoteAction, CommandError> {
    let usage = NOTES_USAGE;
    let Some(first) = args.first() else {
        return Ok(NoteAction::List);
    };
    match first.to_lowercase().as_str() {
        "new" if args.len() >= 3 => {
            let title = args[1].trim().to_string();
            let content = rest_text(args, 2).trim().to_string();
            if title.is_empty() || content.is_empty() {
                return Err(CommandError::Usage("Both title and content are required".to_string()));
            }
            Ok(NoteAction::Create { title, content })
        }
        "edit" if args.len() >= 3 => {
            let index = index_arg(NOTE_LABEL, args, 1, usage)?;
            let content = rest_text(args, 2).trim().to_string();
            if content.is_empty() {
                return Err(CommandError::Usage("Content cannot be empty".to_string()));
            }
            Ok(NoteAction::Edit { index, content })
        }
        "delete" if args.len() >= 2 => Ok(NoteAction::Delete(index_arg(NOTE_LABEL, args, 1, usage)?)),
        token if is_number(token) => Ok(NoteAction::Show(parse_index(NOTE_LABEL, token)?)),
        _ => Err(CommandError::Usage(usage.to_string())),
    }
}

fn parse_integrations(args: &[String]) -> Result<IntegrationAction, CommandError> {
    let usage = INTEGRATIONS_USAGE;
    let Some(first) = args.first() else {
        return Ok(IntegrationAction::List);
    };
    match first.to_lowercase().as_str() {
        "connect" => match args.get(1) {
            Some(provider) => Ok(IntegrationAction::Connect(provider.to_lowercase())),
            None => Err(CommandError::Usage(usage.to_string())),
        },
        "sync" => {
            let index = index_arg(INTEGRATION_LABEL, args, 1, usage)?;
            let enabled = match args.get(2).map(|s| s.to_lowercase()).as_deref() {
                Some("on") | Some("true") | Some("enable") => true,
                Some("off") | Some("false") | Some("disable") => false,
                _ => return Err(CommandError::Usage(usage.to_string())),
            };
            Ok(IntegrationAction::Sync { index, enabled })
        }
        "disconnect" | "delete" => Ok(IntegrationAction::Disconnect(index_arg(
            INTEGRATION_LABEL,
            args,
            1,
            usage,
        )?)),
        _ => Err(CommandError::Usage(usage.to_string())),
    }
}

fn parse_automations(args: &[String]) -> Result<AutomationAction, CommandError> {
    let usage = AUTOMATIONS_USAGE;
    let Some(first) = args.first() else {
        return Ok(AutomationAction::List);
    };
    match first.to_lowercase().as_str() {
        "new" if args.len() >= 3 => {
            let title = args[1].trim().to_string();
            let prompt = rest_text(args, 2).trim().to_string();
            if title.is_empty() || prompt.is_empty() {
                return Err(CommandError::Usage("Both title and prompt are required".to_string()));
            }
            Ok(AutomationAction::Create { title, prompt })
        }
        "run" => Ok(AutomationAction::Run(index_arg(AUTOMATION_LABEL, args, 1, usage)?)),
        "enable" => Ok(AutomationAction::Enable(index_arg(AUTOMATION_LABEL, args, 1, usage)?)),
        "disable" => Ok(AutomationAction::Disable(index_arg(AUTOMATION_LABEL, args, 1, usage)?)),
        "delete" => Ok(AutomationAction::Delete(index_arg(AUTOMATION_LABEL, args, 1, usage)?)),
        token if is_number(token) => Ok(AutomationAction::Show(parse_index(AUTOMATION_LABEL, token)?)),
        _ => Err(CommandError::Usage(usage.to_string())),
    }
}

fn parse_notifications(args: &[String]) -> Result<NotificationAction, CommandError> {
    let usage = NOTIFICATIONS_USAGE;
    let Some(first) = args.first() else {
        return Ok(NotificationAction::List);
    };
    match first.to_lowercase().as_str() {
        "read" => Ok(NotificationAction::MarkRead(index_arg(NOTIFICATION_LABEL, args, 1, usage)?)),
        "clear" | "read-all" => Ok(NotificationAction::MarkAllRead),
        "delete" => Ok(NotificationAction::Delete(index_arg(NOTIFICATION_LABEL, args, 1, usage)?)),
        _ => Err(CommandError::Usage(usage.to_string())),
    }
}
