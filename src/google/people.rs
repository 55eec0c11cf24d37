//! People API client for sender avatars.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{ContactDirectory, check_status};
use crate::error::GoogleError;

const PEOPLE_BASE_URL: &str = "https://people.googleapis.com/v1";

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    person: Option<Person>,
}

#[derive(Debug, Deserialize)]
struct Person {
    #[serde(default)]
    photos: Vec<Photo>,
}

#[derive(Debug, Deserialize)]
struct Photo {
    url: Option<String>,
}

/// reqwest-backed `ContactDirectory` using `people:searchContacts`.
pub struct PeopleClient {
    client: Client,
    base_url: String,
}

impl PeopleClient {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: PEOPLE_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl ContactDirectory for PeopleClient {
    async fn photo_url(
        &self,
        access_token: &str,
        email: &str,
    ) -> Result<Option<String>, GoogleError> {
        let response = self
            .client
            .get(format!("{}/people:searchContacts", self.base_url))
            .query(&[("query", email), ("readMask", "photos"), ("pageSize", "1")])
            .bearer_auth(access_token)
            .send()
            .await?;
        let response = check_status(response, "people.searchContacts").await?;
        let search: SearchResponse = response
            .json()
            .await
            .map_err(|e| GoogleError::Decode(format!("people.searchContacts: {e}")))?;

        Ok(search
            .results
            .into_iter()
            .filter_map(|r| r.person)
            .flat_map(|p| p.photos)
            .find_map(|photo| photo.url))
    }
}
