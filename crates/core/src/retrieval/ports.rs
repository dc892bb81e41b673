//! Port interface for the remote recommendation service

use async_trait::async_trait;
use oncovista_common::AttemptError;
use oncovista_domain::{RemoteRecommendationResponse, TreatmentQuery};

/// Remote producer of scored recommendations.
///
/// One call is one attempt. Implementations classify failures: a non-2xx
/// status or unparseable body is [`AttemptError::Http`]. Timeouts and
/// cancellation are applied by the caller by dropping the returned future.
#[async_trait]
pub trait RecommendationService: Send + Sync {
    async fn call(&self, query: &TreatmentQuery) -> Result<RemoteRecommendationResponse, AttemptError>;
}
