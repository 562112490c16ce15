//! Interactive prompt port.

use async_trait::async_trait;

use super::PromptError;
use crate::domain::{AppUrls, UrlUpdateChoice};

#[async_trait]
pub trait PromptPort: Send + Sync {
    /// Ask whether `current` should be replaced with `proposed`.
    async fn choose_url_update(
        &self,
        current: &AppUrls,
        proposed: &AppUrls,
    ) -> Result<UrlUpdateChoice, PromptError>;
}
