use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use crate::types::NetError;

/// How many consecutive connection failures are allowed before pausing and
/// starting another round.
const MAX_FAILURES_PER_ROUND: usize = 3;

/// How many rounds of pause-and-retry to attempt before giving up.
const MAX_ROUNDS: usize = 5;

/// Bound on 202/429 re-issues of the same request.
const RETRY_CEILING: usize = 10;

/// Basic-auth credentials for the EPrints server.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct NetSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// Base pause between failure rounds; doubles every round.
    pub round_pause: Duration,
    /// Base pause after a 429; grows linearly with the attempt number.
    pub rate_limit_pause: Duration,
    /// Pause before re-issuing a request answered with 202 Accepted.
    pub accepted_pause: Duration,
    pub credentials: Option<Credentials>,
}

impl Default for NetSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            round_pause: Duration::from_secs(10),
            rate_limit_pause: Duration::from_secs(5),
            accepted_pause: Duration::from_secs(1),
            credentials: None,
        }
    }
}

/// HTTP GET client with bounded timeout, retry and backoff behaviour.
///
/// Apart from the network call itself this is purely functional: the same
/// inputs always produce the same classification of the response.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    settings: NetSettings,
}

impl HttpClient {
    pub fn new(settings: NetSettings) -> Result<Self, NetError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| NetError::Network(err.to_string()))?;
        Ok(Self { client, settings })
    }

    /// Issues a GET request, retrying transient failures within fixed
    /// bounds, and classifies the final status code.
    ///
    /// With `polling` set, 404/410 are not treated as errors and the raw
    /// response is handed back for the caller to inspect.
    ///
    /// Retry behaviour, as an explicit loop rather than recursion so the
    /// bounds are directly testable:
    /// - connection-level errors: up to 3 immediate re-attempts, then an
    ///   exponentially growing pause, for at most 5 rounds;
    /// - 202 Accepted: short pause, re-issue, bounded;
    /// - 429: pause growing linearly with the attempt count, re-issue,
    ///   bounded, then surfaced as `RateLimitExceeded`.
    pub async fn get(&self, url: &str, polling: bool) -> Result<reqwest::Response, NetError> {
        let parsed =
            reqwest::Url::parse(url).map_err(|err| NetError::InvalidUrl(err.to_string()))?;

        let mut failures = 0usize;
        let mut rounds = 0usize;
        let mut rate_limit_hits = 0usize;
        let mut accepted_hits = 0usize;
        let mut first_error: Option<String> = None;

        loop {
            let mut request = self.client.get(parsed.clone());
            if let Some(creds) = &self.settings.credentials {
                request = request.basic_auth(&creds.user, Some(&creds.password));
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(err) => {
                    failures += 1;
                    log::debug!("request failure #{failures} for {url}: {err}");
                    // Keep the first error; during an outage the later ones
                    // only describe the inability to reconnect.
                    first_error.get_or_insert_with(|| err.to_string());
                    if failures >= MAX_FAILURES_PER_ROUND {
                        rounds += 1;
                        if rounds > MAX_ROUNDS {
                            let reason = first_error
                                .unwrap_or_else(|| "too many connection errors".to_string());
                            return Err(NetError::Network(format!("{reason} for {url}")));
                        }
                        failures = 0;
                        let pause = self.settings.round_pause * 2u32.pow(rounds as u32 - 1);
                        log::debug!("pausing {pause:?} after consecutive failures for {url}");
                        tokio::time::sleep(pause).await;
                    }
                    continue;
                }
            };

            match response.status().as_u16() {
                // Accepted: received but not yet acted upon. Try again
                // shortly; the resource may become available.
                202 => {
                    accepted_hits += 1;
                    if accepted_hits > RETRY_CEILING {
                        return Err(NetError::Service(format!(
                            "server kept answering 202 for {url}"
                        )));
                    }
                    tokio::time::sleep(self.settings.accepted_pause).await;
                }
                429 => {
                    rate_limit_hits += 1;
                    if rate_limit_hits > RETRY_CEILING {
                        return Err(NetError::RateLimitExceeded);
                    }
                    let pause = self.settings.rate_limit_pause * rate_limit_hits as u32;
                    log::debug!("rate limit hit for {url}; sleeping {pause:?}");
                    tokio::time::sleep(pause).await;
                }
                code => {
                    return match outcome_for_status(code, url, polling) {
                        None => Ok(response),
                        Some(error) => Err(error),
                    };
                }
            }
        }
    }
}

/// Maps an HTTP status code onto the closed outcome taxonomy.
///
/// `None` means the response is usable. 202 and 429 are handled by the
/// retry loop in [`HttpClient::get`] and never reach this table.
fn outcome_for_status(code: u16, url: &str, polling: bool) -> Option<NetError> {
    match code {
        200..=399 => None,
        401 | 402 | 403 | 407 | 451 | 511 => {
            Some(NetError::Authentication(url.to_string()))
        }
        404 | 410 if polling => None,
        404 | 410 => Some(NetError::NoContent(url.to_string())),
        405 | 406 | 409 | 411 | 412 | 414 | 417 | 428 | 431 | 505 | 510 => {
            Some(NetError::Internal {
                code,
                url: url.to_string(),
            })
        }
        415 | 416 => Some(NetError::Service(format!(
            "server rejected the request for {url}"
        ))),
        503 => Some(NetError::Service(
            "server is unavailable -- try again later".to_string(),
        )),
        500 | 501 | 502 | 506 | 507 | 508 => Some(NetError::Service(format!(
            "internal server error (HTTP code {code}) for {url}"
        ))),
        _ => Some(NetError::Network(format!("unable to resolve {url}"))),
    }
}

/// Returns true if it appears we have a network connection.
///
/// Attempts a plain TCP connection to one of the Google DNS servers; no
/// actual DNS lookup is performed.
pub fn network_available() -> bool {
    let addr: SocketAddr = ([8, 8, 8, 8], 53).into();
    TcpStream::connect_timeout(&addr, Duration::from_secs(5)).is_ok()
}
