//! Shared HTTP plumbing for the marketplace adapters.
//!
//! `FetchClient` owns the base URL, retry budget and backoff. Adapters
//! hand it a URL and get back the body, or a `CliError` carrying one of
//! the fetch exit codes:
//!
//! | Status            | Behaviour                     | Exit code                |
//! |-------------------|-------------------------------|--------------------------|
//! | 401, 403          | fail immediately              | `EXIT_FETCH_AUTH`        |
//! | 400               | fail immediately              | `EXIT_FETCH_VALIDATION`  |
//! | 404               | fail immediately              | `EXIT_FETCH_NOT_FOUND`   |
//! | other 4xx         | fail immediately              | `EXIT_FETCH_UPSTREAM`    |
//! | 429               | retry, honour `Retry-After`   | `EXIT_FETCH_RATE_LIMIT`  |
//! | 5xx, network      | retry with doubling backoff   | `EXIT_FETCH_UPSTREAM`    |

use std::thread;
use std::time::Duration;

use lotledger_config::FetchSettings;

use crate::exit_codes;
use crate::CliError;

// ── FetchClient ─────────────────────────────────────────────────────

pub struct FetchClient {
    http: reqwest::blocking::Client,
    base_url: String,
    max_retries: u32,
    backoff: Duration,
}

impl FetchClient {
    pub fn new(settings: &FetchSettings, base_url: Option<&str>) -> Result<Self, CliError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(settings.user_agent.as_str())
            .build()
            .map_err(|e| CliError {
                code: exit_codes::EXIT_ERROR,
                message: format!("failed to build HTTP client: {}", e),
                hint: None,
            })?;

        Ok(Self {
            http,
            base_url: base_url
                .unwrap_or(&settings.base_url)
                .trim_end_matches('/')
                .to_string(),
            max_retries: settings.max_retries,
            backoff: Duration::from_secs(1),
        })
    }

    /// Start the doubling backoff at `backoff` instead of one second.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `path` resolved against the base URL.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn get_text(&self, url: &str) -> Result<String, CliError> {
        self.request_with_retry(url, |resp| resp.text())
    }

    pub fn get_bytes(&self, url: &str) -> Result<Vec<u8>, CliError> {
        self.request_with_retry(url, |resp| resp.bytes().map(|b| b.to_vec()))
    }

    /// GET `url` with retry + exponential backoff, then hand the successful
    /// response to `read`.
    fn request_with_retry<T>(
        &self,
        url: &str,
        read: impl Fn(reqwest::blocking::Response) -> reqwest::Result<T>,
    ) -> Result<T, CliError> {
        let mut backoff = self.backoff;
        let mut attempt = 0;

        loop {
            let wait = match self.http.get(url).send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();

                    if status == 401 || status == 403 {
                        return Err(fail(exit_codes::EXIT_FETCH_AUTH, format!("access denied ({}): {}", status, url)));
                    }
                    if status == 400 {
                        return Err(fail(exit_codes::EXIT_FETCH_VALIDATION, format!("request rejected ({}): {}", status, url)));
                    }
                    if status == 404 {
                        return Err(fail(exit_codes::EXIT_FETCH_NOT_FOUND, format!("page not found: {}", url)));
                    }
                    if (400..500).contains(&status) && status != 429 {
                        return Err(fail(exit_codes::EXIT_FETCH_UPSTREAM, format!("request failed ({}): {}", status, url)));
                    }

                    if status == 429 || status >= 500 {
                        if attempt == self.max_retries {
                            let (code, what) = if status == 429 {
                                (exit_codes::EXIT_FETCH_RATE_LIMIT, "rate limited")
                            } else {
                                (exit_codes::EXIT_FETCH_UPSTREAM, "upstream error")
                            };
                            return Err(fail(
                                code,
                                format!("{} after {} attempts ({}): {}", what, attempt + 1, status, url),
                            ));
                        }

                        let retry_after = (status == 429)
                            .then(|| resp.headers().get("retry-after"))
                            .flatten()
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .map(Duration::from_secs);
                        tracing::warn!(attempt = attempt + 1, max = self.max_retries, status, url, "retrying");
                        retry_after.unwrap_or(backoff)
                    } else {
                        return read(resp).map_err(|e| {
                            fail(exit_codes::EXIT_FETCH_UPSTREAM, format!("failed to read {}: {}", url, e))
                        });
                    }
                }
                Err(e) => {
                    if attempt == self.max_retries {
                        return Err(fail(
                            exit_codes::EXIT_FETCH_UPSTREAM,
                            format!("{} unreachable after {} attempts: {}", url, attempt + 1, e),
                        ));
                    }
                    tracing::warn!(attempt = attempt + 1, max = self.max_retries, error = %e, url, "retrying");
                    backoff
                }
            };

            thread::sleep(wait);
            backoff *= 2;
            attempt += 1;
        }
    }
}

fn fail(code: u8, message: String) -> CliError {
    CliError {
        code,
        message,
        hint: None,
    }
}

#[cfg(test)]
pub(super) fn test_client(base_url: &str) -> FetchClient {
    let settings = FetchSettings {
        base_url: base_url.to_string(),
        ..FetchSettings::default()
    };
    FetchClient::new(&settings, None)
        .unwrap()
        .with_backoff(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[test]
    fn test_get_text_success() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/itm/1");
            then.status(200).body("<html>ok</html>");
        });

        let client = test_client(&server.base_url());
        let body = client.get_text(&client.url("/itm/1")).unwrap();

        mock.assert();
        assert_eq!(body, "<html>ok</html>");
    }

    #[test]
    fn test_retry_on_500_then_success() {
        let server = MockServer::start();
        let mut failing = server.mock(|when, then| {
            when.method(GET).path("/itm/2");
            then.status(503);
        });

        let client = test_client(&server.base_url());
        let err = client.get_text(&client.url("itm/2")).unwrap_err();
        assert_eq!(err.code, exit_codes::EXIT_FETCH_UPSTREAM);
        // one try plus three retries
        failing.assert_calls(4);
        failing.delete();

        server.mock(|when, then| {
            when.method(GET).path("/itm/2");
            then.status(200).body("back");
        });
        assert_eq!(client.get_text(&client.url("itm/2")).unwrap(), "back");
    }

    #[test]
    fn test_retry_on_429_exhausted() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/sch/i.html");
            then.status(429).header("retry-after", "0");
        });

        let client = test_client(&server.base_url());
        let err = client.get_text(&client.url("sch/i.html")).unwrap_err();

        assert_eq!(err.code, exit_codes::EXIT_FETCH_RATE_LIMIT);
        assert!(err.message.contains("rate limited"), "message: {}", err.message);
        mock.assert_calls(4);
    }

    #[test]
    fn test_client_errors_fail_fast() {
        let server = MockServer::start();
        let forbidden = server.mock(|when, then| {
            when.method(GET).path("/usr/locked");
            then.status(403);
        });
        let missing = server.mock(|when, then| {
            when.method(GET).path("/itm/404");
            then.status(404);
        });
        let gone = server.mock(|when, then| {
            when.method(GET).path("/itm/410");
            then.status(410);
        });

        let client = test_client(&server.base_url());
        assert_eq!(client.get_text(&client.url("usr/locked")).unwrap_err().code, exit_codes::EXIT_FETCH_AUTH);
        assert_eq!(client.get_text(&client.url("itm/404")).unwrap_err().code, exit_codes::EXIT_FETCH_NOT_FOUND);
        assert_eq!(client.get_text(&client.url("itm/410")).unwrap_err().code, exit_codes::EXIT_FETCH_UPSTREAM);

        forbidden.assert_calls(1);
        missing.assert_calls(1);
        gone.assert_calls(1);
    }

    #[test]
    fn test_base_url_override_and_joining() {
        let settings = FetchSettings::default();
        let client = FetchClient::new(&settings, Some("http://localhost:9/")).unwrap();
        assert_eq!(client.base_url(), "http://localhost:9");
        assert_eq!(client.url("/usr/bob"), "http://localhost:9/usr/bob");
        assert_eq!(client.url("itm/5"), "http://localhost:9/itm/5");
    }
}
