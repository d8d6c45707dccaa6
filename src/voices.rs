//! Voice profile management over the REST API.

use reqwest::Method;
use tracing::debug;

use crate::client::Client;
use crate::error::{Error, Result};
use crate::types::{Voice, VoiceCreateParams, VoiceCreateResponse, VoiceListParams, VoiceUpdateParams};

/// Voice management operations.
pub struct VoicesService<'a> {
    client: &'a Client,
}

impl<'a> VoicesService<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// List the voices available to the authenticated organization.
    pub async fn list(&self, params: Option<&VoiceListParams>) -> Result<Vec<Voice>> {
        let mut request = self.client.request(Method::GET, "/voices/");

        if let Some(params) = params {
            let mut query: Vec<(&str, String)> = Vec::new();
            if params.skip > 0 {
                query.push(("skip", params.skip.to_string()));
            }
            if params.limit > 0 {
                query.push(("limit", params.limit.to_string()));
            }
            if params.include_catalog {
                query.push(("include_catalog", "true".to_string()));
            }
            if !query.is_empty() {
                request = request.query(&query);
            }
        }

        let response = request.send().await?;
        if response.status() != reqwest::StatusCode::OK {
            return Err(Error::from_response(response).await);
        }

        Ok(response.json().await?)
    }

    /// Fetch a specific voice by its UID.
    pub async fn get(&self, voice_uid: &str) -> Result<Voice> {
        let response = self
            .client
            .request(Method::GET, &format!("/voices/{voice_uid}"))
            .send()
            .await?;
        if response.status() != reqwest::StatusCode::OK {
            return Err(Error::from_response(response).await);
        }

        Ok(response.json().await?)
    }

    /// Create a custom voice from an audio sample.
    ///
    /// The sample is uploaded as a multipart form; the server responds 201
    /// on success.
    pub async fn create(
        &self,
        audio: Vec<u8>,
        filename: &str,
        params: VoiceCreateParams,
    ) -> Result<VoiceCreateResponse> {
        let part = reqwest::multipart::Part::bytes(audio).file_name(filename.to_string());
        let mut form = reqwest::multipart::Form::new()
            .part("audio_file", part)
            .text("name", params.name);

        if !params.input_format.is_empty() {
            form = form.text("input_format", params.input_format);
        }
        if let Some(description) = params.description {
            form = form.text("description", description);
        }
        if let Some(language) = params.language {
            form = form.text("language", language);
        }
        if params.start_s != 0.0 {
            form = form.text("start_s", params.start_s.to_string());
        }
        if params.timeout_s != 0.0 {
            form = form.text("timeout_s", params.timeout_s.to_string());
        }

        debug!("uploading voice sample {filename}");

        let response = self
            .client
            .request(Method::POST, "/voices/")
            .multipart(form)
            .send()
            .await?;
        if response.status() != reqwest::StatusCode::CREATED {
            return Err(Error::from_response(response).await);
        }

        Ok(response.json().await?)
    }

    /// Update an existing voice. `None` fields are left unchanged.
    pub async fn update(&self, voice_uid: &str, params: &VoiceUpdateParams) -> Result<Voice> {
        let response = self
            .client
            .request(Method::PUT, &format!("/voices/{voice_uid}"))
            .json(params)
            .send()
            .await?;
        if response.status() != reqwest::StatusCode::OK {
            return Err(Error::from_response(response).await);
        }

        Ok(response.json().await?)
    }

    /// Delete a voice by its UID.
    pub async fn delete(&self, voice_uid: &str) -> Result<()> {
        let response = self
            .client
            .request(Method::DELETE, &format!("/voices/{voice_uid}"))
            .send()
            .await?;
        if response.status() != reqwest::StatusCode::NO_CONTENT {
            return Err(Error::from_response(response).await);
        }

        Ok(())
    }
}
