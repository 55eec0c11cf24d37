//! In-process Google fakes shared by the unit tests and `tests/`.
//!
//! Compiled for `cfg(test)` and behind the `test-util` feature.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use super::{
    ContactDirectory, GmailApi, GmailMessage, GoogleProfile, Header, MessagePart, MessagePartBody,
    MessageRef, OAuthProvider, TokenGrant, encode_base64url,
};
use crate::error::GoogleError;

fn header(name: &str, value: &str) -> Header {
    Header {
        name: name.into(),
        value: value.into(),
    }
}

/// A plain-text inbox message as Gmail would return it. The body links to
/// `https://docs.test/{id}`.
pub fn message(id: &str, from: &str, subject: &str, labels: &[&str], date_ms: i64) -> GmailMessage {
    let body = format!("Hi, details for {subject} are at https://docs.test/{id}");
    GmailMessage {
        id: id.into(),
        thread_id: Some(format!("t-{id}")),
        label_ids: labels.iter().map(|l| l.to_string()).collect(),
        snippet: format!("About {subject}"),
        internal_date: Some(date_ms.to_string()),
        payload: Some(MessagePart {
            mime_type: "text/plain".into(),
            headers: vec![
                header("From", from),
                header("To", "me@example.com"),
                header("Subject", subject),
            ],
            body: Some(MessagePartBody {
                size: body.len() as u64,
                data: Some(encode_base64url(body.as_bytes())),
                ..Default::default()
            }),
            ..Default::default()
        }),
    }
}

/// Wrap `message`'s body in `multipart/mixed` next to an attachment part.
pub fn with_attachment(
    mut message: GmailMessage,
    filename: &str,
    mime_type: &str,
    attachment_id: &str,
) -> GmailMessage {
    let Some(mut payload) = message.payload.take() else {
        return message;
    };
    let text = MessagePart {
        mime_type: std::mem::take(&mut payload.mime_type),
        body: payload.body.take(),
        ..Default::default()
    };
    let attachment = MessagePart {
        mime_type: mime_type.into(),
        filename: filename.into(),
        body: Some(MessagePartBody {
            attachment_id: Some(attachment_id.into()),
            size: 0,
            data: None,
        }),
        ..Default::default()
    };
    payload.mime_type = "multipart/mixed".into();
    payload.parts = vec![text, attachment];
    message.payload = Some(payload);
    message
}

#[derive(Default)]
pub struct FakeGmail {
    messages: Mutex<Vec<GmailMessage>>,
    broken: Mutex<HashSet<String>>,
    attachments: Mutex<HashMap<String, Vec<u8>>>,
    /// Access tokens seen by `list_messages`.
    pub tokens: Mutex<Vec<String>>,
    /// `(message id, removed labels)` per `modify_labels` call.
    pub modified: Mutex<Vec<(String, Vec<String>)>>,
    /// Raw payloads passed to `send_raw`.
    pub sent: Mutex<Vec<String>>,
}

impl FakeGmail {
    /// Messages are listed in the order given.
    pub fn with_messages(messages: Vec<GmailMessage>) -> Self {
        Self {
            messages: Mutex::new(messages),
            ..Default::default()
        }
    }

    /// `get_message` fails for `id`.
    pub fn break_message(&self, id: &str) {
        self.broken.lock().unwrap().insert(id.to_string());
    }

    /// Serve `data` for `attachment_id` on any message.
    pub fn add_attachment(&self, attachment_id: &str, data: &[u8]) {
        self.attachments
            .lock()
            .unwrap()
            .insert(attachment_id.to_string(), data.to_vec());
    }
}

#[async_trait]
impl GmailApi for FakeGmail {
    async fn list_messages(&self, token: &str, max: u32) -> Result<Vec<MessageRef>, GoogleError> {
        self.tokens.lock().unwrap().push(token.to_string());
        Ok(self
            .messages
            .lock()
            .unwrap()
            .iter()
            .take(max as usize)
            .map(|m| MessageRef {
                id: m.id.clone(),
                thread_id: m.thread_id.clone(),
            })
            .collect())
    }

    async fn get_message(&self, _token: &str, id: &str) -> Result<GmailMessage, GoogleError> {
        if self.broken.lock().unwrap().contains(id) {
            return Err(GoogleError::Api {
                status: 500,
                body: "backend error".into(),
            });
        }
        self.messages
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or_else(|| GoogleError::NotFound(format!("message {id}")))
    }

    async fn get_attachment(
        &self,
        _token: &str,
        _message_id: &str,
        attachment_id: &str,
    ) -> Result<Vec<u8>, GoogleError> {
        self.attachments
            .lock()
            .unwrap()
            .get(attachment_id)
            .cloned()
            .ok_or_else(|| GoogleError::NotFound(format!("attachment {attachment_id}")))
    }

    async fn modify_labels(
        &self,
        _token: &str,
        id: &str,
        _add: &[&str],
        remove: &[&str],
    ) -> Result<(), GoogleError> {
        self.modified
            .lock()
            .unwrap()
            .push((id.to_string(), remove.iter().map(|s| s.to_string()).collect()));
        Ok(())
    }

    async fn send_raw(&self, _token: &str, raw: &str) -> Result<String, GoogleError> {
        self.sent.lock().unwrap().push(raw.to_string());
        Ok("sent-1".into())
    }
}

/// Photo lookups keyed by email; any other email errors.
#[derive(Default)]
pub struct FakeContacts {
    pub photos: HashMap<String, String>,
}

#[async_trait]
impl ContactDirectory for FakeContacts {
    async fn photo_url(&self, _token: &str, email: &str) -> Result<Option<String>, GoogleError> {
        match self.photos.get(email) {
            Some(url) => Ok(Some(url.clone())),
            None => Err(GoogleError::Api {
                status: 403,
                body: "people api disabled".into(),
            }),
        }
    }
}

/// Issues fixed tokens; `refresh` always yields `"refreshed"`.
#[derive(Default)]
pub struct FakeOAuth {
    pub email: String,
}

#[async_trait]
impl OAuthProvider for FakeOAuth {
    fn authorization_url(&self, state: &str) -> String {
        format!("https://accounts.test/o/oauth2/auth?state={state}")
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, GoogleError> {
        if code == "bad" {
            return Err(GoogleError::OAuth("invalid_grant".into()));
        }
        Ok(TokenGrant {
            access_token: format!("access-{code}"),
            refresh_token: Some(format!("refresh-{code}")),
            expires_at: Some(Utc::now() + Duration::hours(1)),
        })
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<TokenGrant, GoogleError> {
        Ok(TokenGrant {
            access_token: "refreshed".into(),
            refresh_token: None,
            expires_at: Some(Utc::now() + Duration::hours(1)),
        })
    }

    async fn user_profile(&self, _access_token: &str) -> Result<GoogleProfile, GoogleError> {
        Ok(GoogleProfile {
            email: self.email.clone(),
            name: Some("Test User".into()),
            picture: None,
        })
    }
}
