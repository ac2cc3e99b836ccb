// src/common/retry.rs

use std::{future::Future, time::Duration};

use crate::common::error::AppError;

// Atraso base entre tentativas (dobra a cada tentativa: 50ms, 100ms, 200ms...)
const BASE_DELAY_MS: u64 = 50;
// Teto do expoente: 50ms * 2^6 = 3.2s
const MAX_BACKOFF_EXP: u32 = 6;

fn backoff(attempt: u32) -> Duration {
    let factor = 1u64 << attempt.min(MAX_BACKOFF_EXP);
    Duration::from_millis(BASE_DELAY_MS.saturating_mul(factor))
}

/// Repete a transação inteira enquanto ela falhar por disputa de lock.
///
/// `f` é chamada até `max_retries + 1` vezes. Qualquer outro erro volta na
/// hora, sem nova tentativa.
pub async fn retry_on_conflict<T, F, Fut>(max_retries: u32, f: F) -> Result<T, AppError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    for attempt in 0..max_retries {
        match f().await {
            Err(e) if e.is_retryable() => {
                let delay = backoff(attempt);
                tracing::warn!(
                    attempt = attempt + 1,
                    max_retries,
                    "Conflito de lock, nova tentativa em {delay:?}"
                );
                tokio::time::sleep(delay).await;
            }
            other => return other,
        }
    }
    // Última tentativa: o erro sobe como está
    f().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_retries_until_attempts_are_exhausted() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();

        let result: Result<(), AppError> = retry_on_conflict(2, || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(AppError::ConcurrentModification)
            }
        })
        .await;

        assert!(matches!(result, Err(AppError::ConcurrentModification)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_succeeds_after_a_transient_conflict() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();

        let result = retry_on_conflict(3, || {
            let c = c.clone();
            async move {
                if c.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(AppError::ConcurrentModification)
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_business_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();

        let result: Result<(), AppError> = retry_on_conflict(3, || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(AppError::SpaceNotFound(1))
            }
        })
        .await;

        assert!(matches!(result, Err(AppError::SpaceNotFound(1))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_doubles_and_then_stops_growing() {
        assert_eq!(backoff(0), Duration::from_millis(50));
        assert_eq!(backoff(1), Duration::from_millis(100));
        assert_eq!(backoff(MAX_BACKOFF_EXP), Duration::from_millis(3200));
        assert_eq!(backoff(64), backoff(MAX_BACKOFF_EXP));
        assert_eq!(backoff(u32::MAX), Duration::from_millis(3200));
    }
}
