//! Outgoing message construction for `GmailApi::send_raw`.

use lettre::Message;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};

use crate::error::ComposeError;
use crate::google::encode_base64url;

pub const DEFAULT_SUBJECT: &str = "(no subject)";

/// A file uploaded alongside the message.
#[derive(Debug, Clone)]
pub struct OutgoingAttachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// A message ready to be rendered and sent from a linked account.
#[derive(Debug, Clone)]
pub struct OutgoingMail {
    pub from: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<OutgoingAttachment>,
}

impl OutgoingMail {
    /// Build from form fields. Recipient fields are comma separated; blank
    /// entries are dropped and a blank subject becomes `(no subject)`.
    pub fn from_form(
        from: &str,
        to: &str,
        cc: &str,
        bcc: &str,
        subject: &str,
        body: &str,
    ) -> Self {
        let subject = subject.trim();
        Self {
            from: from.to_string(),
            to: split_recipients(to),
            cc: split_recipients(cc),
            bcc: split_recipients(bcc),
            subject: if subject.is_empty() {
                DEFAULT_SUBJECT.to_string()
            } else {
                subject.to_string()
            },
            body: body.to_string(),
            attachments: Vec::new(),
        }
    }

    pub fn with_attachment(mut self, attachment: OutgoingAttachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn recipient_count(&self) -> usize {
        self.to.len() + self.cc.len() + self.bcc.len()
    }

    /// Render the RFC 5322 `multipart/mixed` message.
    pub fn to_rfc5322(&self) -> Result<Vec<u8>, ComposeError> {
        if self.recipient_count() == 0 {
            return Err(ComposeError::NoRecipients);
        }

        let mut builder = Message::builder()
            .from(mailbox(&self.from)?)
            .subject(self.subject.as_str())
            .keep_bcc();
        for addr in &self.to {
            builder = builder.to(mailbox(addr)?);
        }
        for addr in &self.cc {
            builder = builder.cc(mailbox(addr)?);
        }
        for addr in &self.bcc {
            builder = builder.bcc(mailbox(addr)?);
        }

        let mut parts = MultiPart::mixed().singlepart(SinglePart::plain(self.body.clone()));
        for attachment in &self.attachments {
            let content_type = ContentType::parse(&attachment.content_type).map_err(|_| {
                ComposeError::InvalidContentType {
                    filename: attachment.filename.clone(),
                    content_type: attachment.content_type.clone(),
                }
            })?;
            parts = parts.singlepart(
                Attachment::new(attachment.filename.clone()).body(attachment.data.clone(), content_type),
            );
        }

        let message = builder
            .multipart(parts)
            .map_err(|e| ComposeError::Build(e.to_string()))?;
        Ok(message.formatted())
    }

    /// Rendered message as unpadded base64url.
    pub fn build_raw(&self) -> Result<String, ComposeError> {
        Ok(encode_base64url(&self.to_rfc5322()?))
    }
}

fn split_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn mailbox(addr: &str) -> Result<Mailbox, ComposeError> {
    addr.parse().map_err(|e: lettre::address::AddressError| ComposeError::InvalidAddress {
        address: addr.to_string(),
        reason: e.to_string(),
    })
}
