use serde::Serialize;

/// Default number of context items the assistant may draw on
pub const DEFAULT_CONTEXT_LIMIT: u32 = 10;

/// Body of a question to the assistant
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AskRequest {
    pub query: String,
    pub context_limit: u32,
}

impl AskRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            context_limit: DEFAULT_CONTEXT_LIMIT,
        }
    }
}

/// Body for creating a note
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewNote {
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub visibility: String,
}

impl NewNote {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            tags: Vec::new(),
            visibility: "personal".to_string(),
        }
    }
}

/// Partial note update; blank fields are left out of the body
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NoteUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl NoteUpdate {
    pub fn new(title: Option<String>, content: Option<String>) -> Self {
        Self {
            title: title.filter(|t| !t.trim().is_empty()),
            content: content.filter(|c| !c.trim().is_empty()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none()
    }
}

/// Body for creating an automation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewAutomation {
    pub title: String,
    pub description: String,
    pub prompt: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cron_schedule: Option<String>,
}

impl NewAutomation {
    /// Manually triggered automation
    pub fn manual(title: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            prompt: prompt.into(),
            kind: "manual".to_string(),
            cron_schedule: None,
        }
    }
}

/// Lookup keys for a persona briefing
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PersonaQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl PersonaQuery {
    /// Classify free text: `@` means email, double quotes mean company, anything else is a name
    pub fn from_input(input: &str) -> Self {
        let input = input.trim();
        if input.contains('@') {
            return Self { email: Some(input.to_string()), ..Self::default() };
        }
        if input.len() >= 2 && input.starts_with('"') && input.ends_with('"') {
            let company = input[1..input.len() - 1].trim().to_string();
            return Self { company: Some(company), ..Self::default() };
        }
        Self { name: Some(input.to_string()), ..Self::default() }
    }

    /// True when no lookup field carries text
    pub fn is_empty(&self) -> bool {
        [&self.email, &self.name, &self.company, &self.title]
            .iter()
            .all(|field| field.as_deref().map(|v| v.trim().is_empty()).unwrap_or(true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_persona_query_classification() {
        assert_eq!(PersonaQuery::from_input("ada@example.com").email.as_deref(), Some("ada@example.com"));
        assert_eq!(PersonaQuery::from_input("\"Acme Corp\"").company.as_deref(), Some("Acme Corp"));
        assert_eq!(PersonaQuery::from_input("Ada Lovelace").name.as_deref(), Some("Ada Lovelace"));
        assert!(PersonaQuery::from_input("\"\"").is_empty());
        assert!(PersonaQuery::default().is_empty());
    }

    #[test]
    fn test_persona_query_body_skips_missing_fields() {
        let body = serde_json::to_value(PersonaQuery::from_input("ada@example.com")).unwrap();
        assert_eq!(body, json!({"email": "ada@example.com"}));
    }

    #[test]
    fn test_note_update_drops_blank_fields() {
        let update = NoteUpdate::new(Some("  ".to_string()), Some("new body".to_string()));
        assert_eq!(serde_json::to_value(&update).unwrap(), json!({"content": "new body"}));
        assert!(NoteUpdate::new(None, Some(String::new())).is_empty());
    }

    #[test]
    fn test_new_note_body() {
        let body = serde_json::to_value(NewNote::new("Title", "Body")).unwrap();
        assert_eq!(
            body,
            json!({"title": "Title", "content": "Body", "tags": [], "visibility": "personal"})
        );
    }

    #[test]
    fn test_new_automation_body() {
        let body = serde_json::to_value(NewAutomation::manual("Digest", "Summarize my week")).unwrap();
        assert_eq!(body["type"], "manual");
        assert!(body.get("cron_schedule").is_none());
    }
}
