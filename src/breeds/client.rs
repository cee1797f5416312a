use async_trait::async_trait;
use tracing::debug;

use crate::breeds::dto::{ApiBreed, BreedResponse, BreedSearchParams};

/// Read-only view of the upstream breed catalogue.
#[async_trait]
pub trait BreedDirectory: Send + Sync {
    async fn all(&self) -> anyhow::Result<Vec<BreedResponse>>;
    async fn by_id(&self, id: &str) -> anyhow::Result<Option<BreedResponse>>;
    async fn search(&self, params: &BreedSearchParams) -> anyhow::Result<Vec<BreedResponse>>;
}

/// TheCatAPI client. Authenticates with the `x-api-key` header.
#[derive(Clone)]
pub struct CatApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl CatApiClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .get(format!("{}{}", self.base_url, path))
            .header("x-api-key", &self.api_key)
    }
}

#[async_trait]
impl BreedDirectory for CatApiClient {
    async fn all(&self) -> anyhow::Result<Vec<BreedResponse>> {
        let breeds: Vec<ApiBreed> = self
            .get("/breeds")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        debug!(count = breeds.len(), "fetched breed list");
        Ok(breeds.into_iter().map(Into::into).collect())
    }

    async fn by_id(&self, id: &str) -> anyhow::Result<Option<BreedResponse>> {
        let response = self.get(&format!("/breeds/{id}")).send().await?;

        // Upstream answers unknown ids with 404 or 400 depending on shape.
        if matches!(response.status().as_u16(), 400 | 404) {
            return Ok(None);
        }

        let breed: ApiBreed = response.error_for_status()?.json().await?;
        Ok(Some(breed.into()))
    }

    async fn search(&self, params: &BreedSearchParams) -> anyhow::Result<Vec<BreedResponse>> {
        let mut request = self.get("/breeds/search");
        if let Some(q) = &params.q {
            request = request.query(&[("q", q.as_str())]);
        }
        if let Some(limit) = params.limit {
            request = request.query(&[("limit", limit.to_string())]);
        }
        if let Some(attach_breed) = params.attach_breed {
            request = request.query(&[("attach_breed", attach_breed.to_string())]);
        }

        let breeds: Vec<ApiBreed> = request
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        debug!(count = breeds.len(), "breed search completed");
        Ok(breeds.into_iter().map(Into::into).collect())
    }
}
