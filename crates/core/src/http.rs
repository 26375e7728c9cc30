//! Shared helpers for the HTTP collaborators.

use crate::{ClinicError, ClinicResult};
use reqwest::{Response, Url};

/// Appends path segments to `base`, percent-encoding each one.
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> ClinicResult<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| ClinicError::InvalidInput(format!("'{base}' cannot be used as a base URL")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Turns a non-success response into [`ClinicError::Upstream`], keeping the body for context.
pub(crate) async fn ensure_success(
    service: &'static str,
    response: Response,
) -> ClinicResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::warn!(service, status = status.as_u16(), "upstream request failed");
    Err(ClinicError::Upstream {
        service,
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_appends_segments() {
        let base = Url::parse("http://host/api").unwrap();
        let url = endpoint(&base, &["codes", "maritalStatus"]).unwrap();
        assert_eq!(url.as_str(), "http://host/api/codes/maritalStatus");
    }

    #[test]
    fn test_endpoint_handles_trailing_slash_and_encoding() {
        let base = Url::parse("http://host/api/").unwrap();
        let url = endpoint(&base, &["storage", "a b/c"]).unwrap();
        assert_eq!(url.as_str(), "http://host/api/storage/a%20b%2Fc");
    }
}
