//! Turns a mirrored email into a task draft.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{extract_json_object, truncate_chars};
use crate::error::LlmError;
use crate::llm::{CompletionRequest, LlmProvider};
use crate::mail::InboxMail;
use crate::tasks::{NewTask, TaskPriority, is_valid_link, parse_due_date};

const MAX_LINKS: usize = 5;
const MAX_BODY_CHARS: usize = 4000;

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s<>"'()\[\]]+"#).unwrap());

/// Task fields as the model returns them; everything optional.
#[derive(Debug, Default, Deserialize)]
struct ExtractedTask {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    due_date: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    related_links: Vec<String>,
}

/// Builds task drafts from mail, with a deterministic fallback.
pub struct TaskExtractor {
    llm: Arc<dyn LlmProvider>,
}

impl TaskExtractor {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Draft a task for `mail`. Never fails: unusable model output falls
    /// back to a draft built from the mail itself.
    pub async fn extract(&self, mail: &InboxMail) -> NewTask {
        match self.try_extract(mail).await {
            Ok(draft) => draft,
            Err(e) => {
                warn!(message_id = %mail.message_id, error = %e, "Task extraction fell back to mail fields");
                fallback_task(mail)
            }
        }
    }

    async fn try_extract(&self, mail: &InboxMail) -> Result<NewTask, LlmError> {
        let request = CompletionRequest::new(build_prompt(mail))
            .with_system(
                "You turn emails into actionable tasks. Respond with a single JSON object and nothing else.",
            )
            .with_temperature(0.2)
            .with_max_tokens(400);
        let response = self.llm.complete(request).await?;
        let extracted: ExtractedTask =
            serde_json::from_str(&extract_json_object(&response.content))?;

        let title = extracted
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| LlmError::InvalidResponse {
                provider: self.llm.model_name().to_string(),
                reason: "task has no title".into(),
            })?
            .to_string();

        let mut links = dedup(extracted.related_links.into_iter().map(|l| l.trim().to_string()));
        links.retain(|l| is_valid_link(l));
        links.truncate(MAX_LINKS);

        let mut tags = dedup(
            extracted
                .tags
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
        );
        if tags.is_empty() {
            tags.push(mail.gmail_category.to_string());
        }

        debug!(message_id = %mail.message_id, title = %title, "Task extracted by model");
        Ok(NewTask {
            title: Some(title),
            description: Some(
                extracted
                    .description
                    .filter(|d| !d.trim().is_empty())
                    .unwrap_or_else(|| mail.snippet.clone()),
            ),
            status: None,
            priority: Some(
                extracted
                    .priority
                    .and_then(|p| p.parse::<TaskPriority>().ok())
                    .unwrap_or_default(),
            ),
            due_date: extracted
                .due_date
                .as_deref()
                .and_then(parse_due_date)
                .map(|d| d.to_rfc3339()),
            tags,
            related_links: links,
            source_message_id: Some(mail.message_id.clone()),
        })
    }
}

/// Draft built only from the mail: subject (or a follow-up line), snippet,
/// the Gmail tab as tag, and links found in the body.
pub fn fallback_task(mail: &InboxMail) -> NewTask {
    let subject = mail.subject.trim();
    let title = if subject.is_empty() {
        let who = if mail.sender_name.trim().is_empty() {
            mail.sender_email.trim()
        } else {
            mail.sender_name.trim()
        };
        format!("Follow up with {who}")
    } else {
        subject.to_string()
    };

    NewTask {
        title: Some(title),
        description: Some(mail.snippet.clone()),
        status: None,
        priority: Some(TaskPriority::Medium),
        due_date: None,
        tags: vec![mail.gmail_category.to_string()],
        related_links: links_in(&mail.body),
        source_message_id: Some(mail.message_id.clone()),
    }
}

/// Up to five distinct http(s) links from `text`, in order of appearance.
fn links_in(text: &str) -> Vec<String> {
    let found = URL_RE
        .find_iter(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ':', '!', '?']).to_string())
        .filter(|l| is_valid_link(l));
    let mut links = dedup(found);
    links.truncate(MAX_LINKS);
    links
}

fn dedup(items: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = Vec::new();
    for item in items {
        if !seen.contains(&item) {
            seen.push(item);
        }
    }
    seen
}

fn build_prompt(mail: &InboxMail) -> String {
    let date = mail
        .date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "unknown".into());
    format!(
        "Create one task from this email.\n\n\
         Return JSON with these fields:\n\
         - \"title\": short imperative title (required)\n\
         - \"description\": one or two sentences of context\n\
         - \"priority\": \"Low\", \"Medium\", or \"High\"\n\
         - \"due_date\": \"YYYY-MM-DD\" if the email implies a deadline, else null\n\
         - \"tags\": a few short lowercase tags\n\
         - \"related_links\": http(s) URLs from the email that matter for the task\n\n\
         From: {sender} <{email}>\n\
         Date: {date}\n\
         Subject: {subject}\n\n\
         {body}",
        sender = mail.sender_name,
        email = mail.sender_email,
        subject = mail.subject,
        body = truncate_chars(&mail.body, MAX_BODY_CHARS),
    )
}
