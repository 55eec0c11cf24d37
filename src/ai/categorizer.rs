//! Batch categorization of mail into user-defined categories.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::extract_json_array;
use crate::error::LlmError;
use crate::llm::{CompletionRequest, LlmProvider};
use crate::mail::InboxMail;

/// Name returned for mail that fits no category.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// The slice of a mail the model sees.
#[derive(Debug, Clone)]
pub struct CategorizationInput {
    pub subject: String,
    pub snippet: String,
    pub sender_name: String,
    pub sender_email: String,
    pub gmail_category: String,
}

impl From<&InboxMail> for CategorizationInput {
    fn from(mail: &InboxMail) -> Self {
        Self {
            subject: mail.subject.clone(),
            snippet: mail.snippet.clone(),
            sender_name: mail.sender_name.clone(),
            sender_email: mail.sender_email.clone(),
            gmail_category: mail.gmail_category.to_string(),
        }
    }
}

/// Classifies a batch of emails with a single LLM call.
pub struct EmailCategorizer {
    llm: Arc<dyn LlmProvider>,
}

impl EmailCategorizer {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// One category name per email, in input order.
    ///
    /// Names are the user's exact spelling or [`UNCATEGORIZED`]. Any failure
    /// (provider error, unparseable output, wrong length) yields
    /// `Uncategorized` for every email.
    pub async fn categorize(
        &self,
        emails: &[CategorizationInput],
        categories: &[String],
    ) -> Vec<String> {
        if emails.is_empty() {
            return Vec::new();
        }

        match self.try_categorize(emails, categories).await {
            Ok(names) => {
                info!(count = names.len(), "Emails categorized");
                names
            }
            Err(e) => {
                warn!(error = %e, count = emails.len(), "Categorization failed, marking all uncategorized");
                vec![UNCATEGORIZED.to_string(); emails.len()]
            }
        }
    }

    async fn try_categorize(
        &self,
        emails: &[CategorizationInput],
        categories: &[String],
    ) -> Result<Vec<String>, LlmError> {
        let request = CompletionRequest::new(build_prompt(emails, categories)).with_temperature(0.0);
        let response = self.llm.complete(request).await?;

        let json = extract_json_array(&response.content);
        let raw: Vec<String> = serde_json::from_str(&json)?;
        if raw.len() != emails.len() {
            return Err(LlmError::InvalidResponse {
                provider: self.llm.model_name().to_string(),
                reason: format!("expected {} categories, got {}", emails.len(), raw.len()),
            });
        }

        Ok(reconcile(&raw, categories))
    }
}

/// Map model output back to the user's spelling.
///
/// An exact match wins, then a case-insensitive one (earliest category
/// first). A user category spelled like `Uncategorized` shadows the
/// sentinel. Unknown names become `Uncategorized`.
pub fn reconcile(raw: &[String], categories: &[String]) -> Vec<String> {
    let mut folded: HashMap<String, &str> = HashMap::new();
    for category in categories {
        folded.entry(fold(category)).or_insert(category.as_str());
    }
    folded.entry(fold(UNCATEGORIZED)).or_insert(UNCATEGORIZED);

    raw.iter()
        .map(|name| {
            if let Some(exact) = categories.iter().find(|c| c.trim() == name.trim()) {
                return exact.clone();
            }
            match folded.get(&fold(name)) {
                Some(matched) => matched.to_string(),
                None => {
                    debug!(category = %name, "Unknown category from model");
                    UNCATEGORIZED.to_string()
                }
            }
        })
        .collect()
}

fn fold(name: &str) -> String {
    name.trim().to_lowercase()
}

fn build_prompt(emails: &[CategorizationInput], categories: &[String]) -> String {
    let category_list = categories.join(", ");
    let mut prompt = format!(
        "You are an intelligent email assistant. Classify each of the following emails into one of these user-defined categories:\n\
         [{category_list}]\n\n\
         IMPORTANT: Return category names with exact case matching. The available categories are: {category_list}\n\n\
         Return a JSON array of category names in the same order as the emails. Each category must be exactly one of the provided categories with matching capitalization.\n\n\
         If an email doesn't fit any category, use \"{UNCATEGORIZED}\".\n\n\
         ONLY output the JSON array. No other text.\n\n\
         Emails:\n"
    );

    for (index, email) in emails.iter().enumerate() {
        prompt.push_str(&format!(
            "\nEmail {n}:\n- Subject: {subject}\n- Snippet: {snippet}\n- Sender Name: {name}\n- Sender Email: {email_addr}\n- Gmail Category: {gmail}\n",
            n = index + 1,
            subject = email.subject,
            snippet = email.snippet,
            name = email.sender_name,
            email_addr = email.sender_email,
            gmail = email.gmail_category,
        ));
    }

    prompt
}
