//! Drafts an email body from a subject line.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::llm::{CompletionRequest, LlmProvider};

const MIN_WORDS: usize = 30;
const MIN_CHARS: usize = 100;

const DEFAULT_TEMPLATE: &str = "Dear [RECIPIENT NAME],

I hope this email finds you well. I am writing to you regarding [SUBJECT MATTER] and wanted to reach out to discuss this further.

[SPECIFIC DETAILS OR CONTEXT] would be greatly appreciated. Please let me know if you have any questions or if there's anything else I can provide to help move this forward.

I look forward to hearing from you soon and appreciate your time and consideration in this matter.

Best regards,
[YOUR NAME]";

const MEETING_TEMPLATE: &str = "Dear [RECIPIENT NAME],

Thank you for taking the time to meet with me [DATE/TIME]. I wanted to follow up on our discussion about [TOPIC] and provide any additional information you might need.

As we discussed, [KEY POINTS FROM MEETING] are the next steps we should focus on. I believe this approach will help us achieve [DESIRED OUTCOME] effectively.

Please let me know if you have any questions or if you'd like to schedule another meeting to discuss this further. I'm available [YOUR AVAILABILITY] and happy to accommodate your schedule.

Looking forward to our continued collaboration.

Best regards,
[YOUR NAME]";

const INQUIRY_TEMPLATE: &str = "Dear [RECIPIENT NAME],

I hope you are doing well. I am reaching out to inquire about [SPECIFIC TOPIC/SERVICE/PRODUCT] and would appreciate any information you can provide.

Specifically, I am interested in learning more about [DETAILED REQUIREMENTS] and how this might align with [YOUR NEEDS/GOALS]. Any guidance or resources you could share would be extremely helpful.

If you have time for a brief call or meeting to discuss this further, I would be happy to work around your schedule. Thank you for your time and consideration.

Best regards,
[YOUR NAME]";

/// Configuration for body generation.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub max_attempts: u32,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Pause after a provider error before the next attempt.
    pub retry_delay: Duration,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            temperature: 0.7,
            max_tokens: 600,
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// Generates email bodies, falling back to canned templates.
pub struct EmailBodyGenerator {
    llm: Arc<dyn LlmProvider>,
    config: GeneratorConfig,
}

impl EmailBodyGenerator {
    pub fn new(llm: Arc<dyn LlmProvider>, config: GeneratorConfig) -> Self {
        Self { llm, config }
    }

    /// Always returns a body: a validated draft, or a template.
    pub async fn generate(&self, subject: &str) -> String {
        for attempt in 1..=self.config.max_attempts {
            let request = CompletionRequest::new(build_prompt(subject, attempt))
                .with_temperature(self.config.temperature)
                .with_max_tokens(self.config.max_tokens);

            match self.llm.complete(request).await {
                Ok(response) => {
                    let body = response.content.trim();
                    match validate_body(body) {
                        Ok(words) => {
                            info!(attempt, words, "Generated email body");
                            return body.to_string();
                        }
                        Err(reason) => debug!(attempt, reason, "Generated body rejected"),
                    }
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Email body generation failed");
                    if attempt < self.config.max_attempts {
                        tokio::time::sleep(self.config.retry_delay).await;
                    }
                }
            }
        }

        info!(subject, "Using fallback email template");
        fallback_template(subject).to_string()
    }
}

/// Word count when the body is long enough, else why not.
fn validate_body(body: &str) -> Result<usize, &'static str> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err("empty body");
    }
    let words = trimmed.split_whitespace().count();
    if words < MIN_WORDS {
        return Err("too few words");
    }
    if trimmed.chars().count() < MIN_CHARS {
        return Err("too few characters");
    }
    Ok(words)
}

/// Pick a template by keywords in the subject.
pub fn fallback_template(subject: &str) -> &'static str {
    let lower = subject.to_lowercase();
    if ["meeting", "follow up", "followup"].iter().any(|k| lower.contains(k)) {
        MEETING_TEMPLATE
    } else if ["inquiry", "question", "information"].iter().any(|k| lower.contains(k)) {
        INQUIRY_TEMPLATE
    } else {
        DEFAULT_TEMPLATE
    }
}

fn build_prompt(subject: &str, attempt: u32) -> String {
    let retry_note = if attempt > 1 {
        format!(
            "\n\nIMPORTANT: This is attempt {attempt}. Please generate a COMPLETE and DETAILED email body with at least {MIN_WORDS} words. The previous attempt was too short or incomplete."
        )
    } else {
        String::new()
    };

    format!(
        "You are an intelligent email writing assistant. Generate a complete email body based on the given subject line.\n\n\
         Requirements:\n\
         - Create a professional and natural email body with AT LEAST {MIN_WORDS} words\n\
         - Include placeholders in square brackets like [YOUR NAME], [SPECIFIC DETAILS], [DATE], etc. for user customization\n\
         - Make it contextually appropriate for the subject\n\
         - Return only the email body content in plain text\n\
         - Keep it professional but ensure it's comprehensive and complete\n\
         - Include proper greeting, main content, and closing\n\n\
         Subject: \"{subject}\"{retry_note}\n\n\
         Generate the email body:"
    )
}
