//! Gmail REST client.

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

use super::types::{AttachmentResponse, GmailMessage, ListMessagesResponse, MessageRef, SendResponse, decode_base64url};
use super::{GmailApi, check_status};
use crate::error::GoogleError;

const GMAIL_BASE_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

/// reqwest-backed `GmailApi`.
pub struct GmailClient {
    client: Client,
    base_url: String,
}

impl GmailClient {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: GMAIL_BASE_URL.to_string(),
        }
    }

    /// Use another API root (`.../users/me`).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// API root plus `segments`, each percent-encoded as one path segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, GoogleError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| GoogleError::InvalidUrl(format!("{}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| GoogleError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl GmailApi for GmailClient {
    async fn list_messages(
        &self,
        access_token: &str,
        max_results: u32,
    ) -> Result<Vec<MessageRef>, GoogleError> {
        let response = self
            .client
            .get(self.endpoint(&["messages"])?)
            .query(&[("maxResults", max_results.to_string())])
            .bearer_auth(access_token)
            .send()
            .await?;
        let response = check_status(response, "messages.list").await?;
        let list: ListMessagesResponse = response
            .json()
            .await
            .map_err(|e| GoogleError::Decode(format!("messages.list: {e}")))?;
        debug!(count = list.messages.len(), "Listed Gmail messages");
        Ok(list.messages)
    }

    async fn get_message(&self, access_token: &str, id: &str) -> Result<GmailMessage, GoogleError> {
        let response = self
            .client
            .get(self.endpoint(&["messages", id])?)
            .query(&[("format", "full")])
            .bearer_auth(access_token)
            .send()
            .await?;
        let response = check_status(response, &format!("message {id}")).await?;
        response
            .json()
            .await
            .map_err(|e| GoogleError::Decode(format!("messages.get {id}: {e}")))
    }

    async fn get_attachment(
        &self,
        access_token: &str,
        message_id: &str,
        attachment_id: &str,
    ) -> Result<Vec<u8>, GoogleError> {
        let response = self
            .client
            .get(self.endpoint(&["messages", message_id, "attachments", attachment_id])?)
            .bearer_auth(access_token)
            .send()
            .await?;
        let response = check_status(response, &format!("attachment {attachment_id}")).await?;
        let attachment: AttachmentResponse = response
            .json()
            .await
            .map_err(|e| GoogleError::Decode(format!("attachments.get: {e}")))?;
        decode_base64url(&attachment.data)
    }

    async fn modify_labels(
        &self,
        access_token: &str,
        id: &str,
        add: &[&str],
        remove: &[&str],
    ) -> Result<(), GoogleError> {
        let response = self
            .client
            .post(self.endpoint(&["messages", id, "modify"])?)
            .bearer_auth(access_token)
            .json(&serde_json::json!({
                "addLabelIds": add,
                "removeLabelIds": remove,
            }))
            .send()
            .await?;
        check_status(response, &format!("message {id}")).await?;
        Ok(())
    }

    async fn send_raw(&self, access_token: &str, raw: &str) -> Result<String, GoogleError> {
        let response = self
            .client
            .post(self.endpoint(&["messages", "send"])?)
            .bearer_auth(access_token)
            .json(&serde_json::json!({ "raw": raw }))
            .send()
            .await?;
        let response = check_status(response, "messages.send").await?;
        let sent: SendResponse = response
            .json()
            .await
            .map_err(|e| GoogleError::Decode(format!("messages.send: {e}")))?;
        Ok(sent.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_encoded_as_single_segments() {
        let client = GmailClient::new(Client::new()).with_base_url("http://127.0.0.1:9/gmail/");
        let url = client.endpoint(&["messages", "a/b?c#d", "modify"]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9/gmail/messages/a%2Fb%3Fc%23d/modify");

        let default = GmailClient::new(Client::new()).endpoint(&["messages"]).unwrap();
        assert_eq!(
            default.as_str(),
            "https://gmail.googleapis.com/gmail/v1/users/me/messages"
        );
    }

    #[test]
    fn unusable_base_url_is_an_error() {
        let client = GmailClient::new(Client::new()).with_base_url("mailto:me@example.com");
        assert!(matches!(
            client.endpoint(&["messages"]),
            Err(GoogleError::InvalidUrl(_))
        ));
    }
}
