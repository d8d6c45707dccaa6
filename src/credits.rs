//! Credit balance lookup over the REST API.

use reqwest::Method;

use crate::client::Client;
use crate::error::{Error, Result};
use crate::types::CreditsSummary;

/// Credit balance operations.
pub struct CreditsService<'a> {
    client: &'a Client,
}

impl<'a> CreditsService<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Current credit balance for the authenticated organization.
    pub async fn get(&self) -> Result<CreditsSummary> {
        let response = self
            .client
            .request(Method::GET, "/usages/credits")
            .send()
            .await?;
        if response.status() != reqwest::StatusCode::OK {
            return Err(Error::from_response(response).await);
        }

        Ok(response.json().await?)
    }
}
