use async_trait::async_trait;

use crate::Result;
use crate::types::{GenerateRequest, GenerateResponse};

/// The completion capability: one message list in, one completion out.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    fn provider(&self) -> &str;
    fn model_id(&self) -> &str;

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse>;
}
