// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Retry policies for calls against upstream systems, over `backoff`

use futures::Future;
use std::time::Duration;

pub use ::backoff::future::{retry, retry_notify};
pub use ::backoff::Error as BackoffError;
pub use ::backoff::{backoff::Backoff, ExponentialBackoff, Notify};

/// Number of attempts an upstream call gets under [upstream_policy].
pub const UPSTREAM_MAX_ATTEMPTS: u32 = 5;

/// Return the backoff policy for calls against upstream sources: start at
/// 500 ms and double up to 16 s.  Use it with [retry_with_limit] and
/// [UPSTREAM_MAX_ATTEMPTS].
pub fn upstream_policy() -> ::backoff::ExponentialBackoff {
    const INITIAL_INTERVAL: Duration = Duration::from_millis(500);
    const MAX_INTERVAL: Duration = Duration::from_secs(16);
    policy_with_max(INITIAL_INTERVAL, MAX_INTERVAL)
}

fn policy_with_max(
    initial_interval: Duration,
    max_interval: Duration,
) -> ::backoff::ExponentialBackoff {
    let current_interval = initial_interval;
    ::backoff::ExponentialBackoff {
        current_interval,
        initial_interval,
        multiplier: 2.0,
        randomization_factor: 0.0,
        max_interval,
        max_elapsed_time: None,
        ..backoff::ExponentialBackoff::default()
    }
}

/// Like [retry_notify], but gives up after `max_attempts` attempts.  The
/// transient error of the last attempt is returned as is.
pub async fn retry_with_limit<T, E, F, Fut, N>(
    policy: ::backoff::ExponentialBackoff,
    max_attempts: u32,
    mut operation: F,
    notify: N,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BackoffError<E>>>,
    N: Notify<E>,
{
    let mut attempt = 0;
    retry_notify(
        policy,
        || {
            attempt += 1;
            let last = attempt >= max_attempts;
            let fut = operation();
            async move {
                match fut.await {
                    Err(BackoffError::Transient { err, .. }) if last => {
                        Err(BackoffError::Permanent(err))
                    }
                    other => other,
                }
            }
        },
        notify,
    )
    .await
}
