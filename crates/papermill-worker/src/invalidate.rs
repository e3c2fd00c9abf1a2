//! Cache invalidation hook: one best-effort call once rasterization
//! completes. The pipeline's correctness never depends on delivery.

use uuid::Uuid;

pub struct CacheInvalidator {
    client: reqwest::Client,
    url: String,
    secret: String,
}

impl CacheInvalidator {
    pub fn new(url: String, secret: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            secret,
        }
    }

    /// Fire-and-forget: spawns the request and returns immediately.
    /// Failures are logged at debug and dropped.
    pub fn fire(&self, document_id: Uuid) {
        let client = self.client.clone();
        let url = self.url.clone();
        let secret = self.secret.clone();

        tokio::spawn(async move {
            let result = client
                .post(&url)
                .json(&serde_json::json!({
                    "documentId": document_id,
                    "secret": secret,
                }))
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => {
                    tracing::debug!(document_id = %document_id, "Cache invalidated");
                }
                Ok(response) => {
                    tracing::debug!(
                        document_id = %document_id,
                        status = %response.status(),
                        "Cache invalidation rejected"
                    );
                }
                Err(e) => {
                    tracing::debug!(
                        document_id = %document_id,
                        error = %e,
                        "Cache invalidation failed"
                    );
                }
            }
        });
    }
}
