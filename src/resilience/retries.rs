//! Bounded retry of transient node failures.

use rand::Rng;
use std::future::Future;
use std::time::Duration;

use crate::blockchain::types::BlockchainResult;
use crate::config::schema::RetryConfig;
use crate::observability::metrics;

/// Delay before retry number `retry` (1-based): exponential, capped, plus up to 10% jitter.
pub fn backoff_delay(policy: &RetryConfig, retry: u32) -> Duration {
    if retry == 0 {
        return Duration::ZERO;
    }

    let factor = 2u64.saturating_pow(retry - 1);
    let capped = policy.base_delay_ms.saturating_mul(factor).min(policy.max_delay_ms);

    let jitter_range = capped / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped + jitter)
}

/// Total number of tries the policy allows for one operation.
pub fn attempt_budget(policy: &RetryConfig) -> u32 {
    if policy.enabled {
        policy.max_attempts.max(1)
    } else {
        1
    }
}

/// Run `op` until it succeeds, fails with a non-transient error, or the
/// attempt budget is spent. The last error is returned unchanged.
pub async fn retry_transient<T, F, Fut>(
    policy: &RetryConfig,
    operation: &'static str,
    mut op: F,
) -> BlockchainResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = BlockchainResult<T>>,
{
    let budget = attempt_budget(policy);
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < budget => {
                let delay = backoff_delay(policy, attempt);
                tracing::warn!(
                    operation,
                    attempt,
                    budget,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient failure, retrying"
                );
                metrics::record_retry(operation);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
