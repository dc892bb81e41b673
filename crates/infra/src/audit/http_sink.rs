//! Audit webhook sink.

use std::time::Duration;

use async_trait::async_trait;
use oncovista_core::{AuditSink, SinkError};
use oncovista_domain::constants::AUDIT_PATH;
use oncovista_domain::{AuditRecord, OncoVistaError};
use reqwest::Client as ReqwestClient;
use tracing::debug;
use url::Url;

use crate::errors::InfraError;

/// Posts each audit record as JSON to a webhook.
#[derive(Debug, Clone)]
pub struct HttpAuditSink {
    client: ReqwestClient,
    url: Url,
}

impl HttpAuditSink {
    /// Sink posting to `url`. A bare origin gets the default audit path.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, OncoVistaError> {
        let mut url = Url::parse(url.trim()).map_err(|err| OncoVistaError::from(InfraError::from(err)))?;
        if url.path() == "/" {
            url.set_path(AUDIT_PATH);
        }
        let client = ReqwestClient::builder()
            .timeout(timeout)
            .no_proxy()
            .build()
            .map_err(|err| OncoVistaError::from(InfraError::from(err)))?;
        Ok(Self { client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl AuditSink for HttpAuditSink {
    async fn send(&self, record: &AuditRecord) -> Result<(), SinkError> {
        let response = self
            .client
            .post(self.url.clone())
            .json(record)
            .send()
            .await
            .map_err(|err| SinkError::Unavailable(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Unavailable(format!("audit endpoint answered {status}")));
        }
        debug!(retrieval_id = %record.retrieval_id, sequence = record.sequence, "audit record delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_origin_gets_default_path() {
        let sink = HttpAuditSink::new("http://audit.local:8080", Duration::from_secs(5)).unwrap();
        assert_eq!(sink.url().as_str(), "http://audit.local:8080/api/audit/log");

        let sink = HttpAuditSink::new("http://audit.local/hooks/oncology", Duration::from_secs(5)).unwrap();
        assert_eq!(sink.url().path(), "/hooks/oncology");
    }
}
