use rand::Rng;
use reqwest::StatusCode;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Default schedule: 3 retries, backoff doubling from 1s, up to 25% jitter.
const RETRY_BASE_DELAY_SECS: u64 = 1;
pub const MAX_RETRIES: usize = 3;
const RETRY_JITTER_DIVISOR: u128 = 4;

fn is_retriable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT
            | StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

fn is_retriable_send_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_body()
}

fn retry_base_delay(attempt: usize) -> Duration {
    let multiplier = 1u64.checked_shl(attempt as u32).unwrap_or(u64::MAX);
    Duration::from_secs(RETRY_BASE_DELAY_SECS.saturating_mul(multiplier))
}

fn add_jitter(delay: Duration) -> Duration {
    let max_jitter_ms = delay.as_millis() / RETRY_JITTER_DIVISOR;
    if max_jitter_ms == 0 {
        return delay;
    }

    let max_jitter_ms = std::cmp::min(max_jitter_ms, u128::from(u64::MAX)) as u64;
    let jitter_ms = rand::thread_rng().gen_range(0..=max_jitter_ms);
    delay + Duration::from_millis(jitter_ms)
}

/// Send a request, retrying retriable statuses and transport errors.
///
/// A non-success response is returned as-is once retries are exhausted so
/// the caller can turn its body into a structured error.
pub(super) async fn send_with_retry(
    max_retries: usize,
    mut make_request: impl FnMut() -> reqwest::RequestBuilder,
) -> Result<reqwest::Response, reqwest::Error> {
    let mut attempt = 0;

    loop {
        let outcome = make_request().send().await;
        let retry_reason = match &outcome {
            Ok(response) if is_retriable_status(response.status()) => {
                Some(format!("status {}", response.status()))
            }
            Err(err) if is_retriable_send_error(err) => Some(err.to_string()),
            _ => None,
        };

        match retry_reason {
            Some(reason) if attempt < max_retries => {
                if let Ok(response) = outcome {
                    let _ = response.bytes().await;
                }
                let delay = add_jitter(retry_base_delay(attempt));
                debug!(
                    "Request failed ({}); retry {}/{} in {:?}",
                    reason,
                    attempt + 1,
                    max_retries,
                    delay
                );
                sleep(delay).await;
                attempt += 1;
            }
            _ => {
                if let Err(err) = &outcome {
                    debug!("HTTP request failed after {} attempt(s): {}", attempt + 1, err);
                }
                return outcome;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_schedule_doubles() {
        assert_eq!(retry_base_delay(0), Duration::from_secs(1));
        assert_eq!(retry_base_delay(1), Duration::from_secs(2));
        assert_eq!(retry_base_delay(2), Duration::from_secs(4));
    }

    #[test]
    fn test_jitter_is_bounded() {
        let base = Duration::from_secs(4);
        for _ in 0..50 {
            let delay = add_jitter(base);
            assert!(delay >= base);
            assert!(delay <= base + Duration::from_secs(1));
        }
        assert_eq!(add_jitter(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn test_retriable_statuses() {
        assert!(is_retriable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retriable_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_retriable_status(StatusCode::UNAUTHORIZED));
        assert!(!is_retriable_status(StatusCode::BAD_REQUEST));
    }
}
