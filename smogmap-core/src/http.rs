//! HTTP plumbing shared by the provider crates.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::ports::{ErrorReporter, PortError};

/// User agent sent with every upstream request.
pub const USER_AGENT: &str = concat!("smogmap/", env!("CARGO_PKG_VERSION"));

/// Build a client whose requests all carry `timeout`.
///
/// # Errors
///
/// Returns [`PortError::Network`] when the TLS backend cannot be initialised.
pub fn build_client(timeout: Duration, accept_invalid_certs: bool) -> Result<Client, PortError> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .danger_accept_invalid_certs(accept_invalid_certs)
        .build()
        .map_err(PortError::from)
}

/// Send the request and reject non-success statuses.
///
/// # Errors
///
/// Returns [`PortError::Network`] on transport failure and
/// [`PortError::UnexpectedStatus`] when the status is not 2xx.
pub async fn send(req: RequestBuilder) -> Result<Response, PortError> {
    let response = req.send().await?;
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(PortError::UnexpectedStatus(status))
    }
}

/// Fetch and decode a JSON body.
///
/// # Errors
///
/// See [`send`]; a body that does not match `T` is [`PortError::Json`].
pub async fn fetch_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, PortError> {
    let body = send(req).await?.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

/// Fetch a body as text.
///
/// # Errors
///
/// See [`send`].
pub async fn fetch_text(req: RequestBuilder) -> Result<String, PortError> {
    send(req).await?.text().await.map_err(PortError::from)
}

/// Treat a non-success status during discovery as "no stations".
///
/// The status is reported and `Ok(None)` returned; every other error is passed on.
///
/// # Errors
///
/// Returns the original error unless it is [`PortError::UnexpectedStatus`].
pub fn skip_on_status<T>(
    result: Result<T, PortError>,
    context: &str,
    reporter: &dyn ErrorReporter,
) -> Result<Option<T>, PortError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err @ PortError::UnexpectedStatus(_)) => {
            reporter.report(context, &err);
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::*;
    use crate::report::CollectingReporter;

    #[test]
    fn status_errors_become_empty_discovery() {
        let reporter = CollectingReporter::new();

        let skipped = skip_on_status::<u8>(
            Err(PortError::UnexpectedStatus(StatusCode::BAD_GATEWAY)),
            "gios discovery",
            &reporter,
        );

        assert!(matches!(skipped, Ok(None)), "status skipped: {skipped:?}");
        assert_eq!(reporter.entries().len(), 1, "status reported");
    }

    #[test]
    fn other_errors_pass_through() {
        let reporter = CollectingReporter::new();

        let passed = skip_on_status::<u8>(
            Err(PortError::PatternNotFound("jsonData")),
            "looko2 discovery",
            &reporter,
        );
        let ok = skip_on_status(Ok(7_u8), "looko2 discovery", &reporter);

        assert!(matches!(passed, Err(PortError::PatternNotFound(_))), "{passed:?}");
        assert!(matches!(ok, Ok(Some(7))), "{ok:?}");
        assert!(reporter.entries().is_empty(), "nothing reported");
    }
}
