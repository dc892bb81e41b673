//! Conversions from external infrastructure errors into domain errors.

use std::time::Duration;

use oncovista_common::AttemptError;
use oncovista_domain::OncoVistaError;
use reqwest::Error as HttpError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub OncoVistaError);

impl From<InfraError> for OncoVistaError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<OncoVistaError> for InfraError {
    fn from(value: OncoVistaError) -> Self {
        InfraError(value)
    }
}

trait IntoOncoVistaError {
    fn into_oncovista(self) -> OncoVistaError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → OncoVistaError */
/* -------------------------------------------------------------------------- */

impl IntoOncoVistaError for HttpError {
    fn into_oncovista(self) -> OncoVistaError {
        if self.is_timeout() {
            return OncoVistaError::Network("HTTP request timed out".into());
        }

        #[cfg(not(target_arch = "wasm32"))]
        if self.is_connect() {
            return OncoVistaError::Network("HTTP connection failure".into());
        }

        if self.is_builder() {
            return OncoVistaError::Config(format!("invalid HTTP client setup: {self}"));
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));
            return match code {
                400..=499 if code != 408 && code != 429 => OncoVistaError::InvalidInput(message),
                _ => OncoVistaError::Network(message),
            };
        }

        OncoVistaError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_oncovista())
    }
}

/* -------------------------------------------------------------------------- */
/* config parsing → OncoVistaError */
/* -------------------------------------------------------------------------- */

impl From<toml::de::Error> for InfraError {
    fn from(value: toml::de::Error) -> Self {
        InfraError(OncoVistaError::Config(format!("Invalid TOML format: {value}")))
    }
}

impl From<url::ParseError> for InfraError {
    fn from(value: url::ParseError) -> Self {
        InfraError(OncoVistaError::Config(format!("Invalid URL: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → AttemptError */
/* -------------------------------------------------------------------------- */

/// Classify a transport failure for the retry executor. A client-side
/// timeout keeps its own variant so the breaker and audit trail can tell it
/// apart from a failed response.
pub fn attempt_error(err: &HttpError, timeout: Duration) -> AttemptError {
    if err.is_timeout() {
        return AttemptError::Timeout { timeout };
    }
    AttemptError::http(err.status().map(|status| status.as_u16()), err.to_string())
}

#[cfg(test)]
mod tests {
    use reqwest::Client;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn http_status_503_maps_to_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = Client::builder().no_proxy().build().unwrap();
        let error = client.get(server.uri()).send().await.unwrap().error_for_status().unwrap_err();

        let mapped: OncoVistaError = InfraError::from(error).into();
        match mapped {
            OncoVistaError::Network(msg) => assert!(msg.contains("503")),
            other => panic!("expected network error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn client_timeout_maps_to_attempt_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let timeout = Duration::from_millis(50);
        let client = Client::builder().no_proxy().timeout(timeout).build().unwrap();
        let error = client.get(server.uri()).send().await.unwrap_err();

        assert_eq!(attempt_error(&error, timeout), AttemptError::Timeout { timeout });
    }

    #[test]
    fn toml_errors_become_config_errors() {
        let err = toml::from_str::<toml::Value>("= nope").unwrap_err();
        let mapped: OncoVistaError = InfraError::from(err).into();
        assert!(matches!(mapped, OncoVistaError::Config(msg) if msg.starts_with("Invalid TOML")));
    }
}
