//! # Poll-While-Waiting
//!
//! The one wait primitive used by the controller.
//!
//! The receiver streams bytes whether or not anyone is listening, so a wait
//! must keep draining the byte source into the decoder or fixes go stale.
//! [`drain_for`] races a source read against a short timer slice until the
//! requested duration has elapsed on the wrapping clock, hands every byte to
//! the decode step as soon as it is read, and finishes with a non-blocking
//! sweep so that bytes which arrived during the wait are consumed before it
//! returns.

use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::debug;

use crate::clock::MonotonicClock;
use crate::serial::ByteSource;

/// Read buffer size per source poll
const DRAIN_CHUNK: usize = 256;

/// Wait for `duration` while feeding every received byte to `step`
///
/// # Arguments
///
/// * `source` - Receiver byte stream
/// * `clock` - Wrapping millisecond clock measuring the wait
/// * `duration` - Total time to wait
/// * `poll` - Longest stretch spent blocked on the source before re-checking the clock
/// * `step` - Decode step invoked once per byte, in arrival order
///
/// # Returns
///
/// * `usize` - Number of bytes handed to `step`
///
/// Source errors are logged and treated like silence; the wait always runs
/// its full duration.
pub async fn drain_for<S, F>(
    source: &mut S,
    clock: &MonotonicClock,
    duration: Duration,
    poll: Duration,
    mut step: F,
) -> usize
where
    S: ByteSource + ?Sized,
    F: FnMut(u8),
{
    let start = clock.now_ms();
    let duration_ms = u32::try_from(duration.as_millis()).unwrap_or(u32::MAX);
    let poll = poll.max(Duration::from_millis(1));

    let mut buf = [0u8; DRAIN_CHUNK];
    let mut drained = 0;
    let mut end_of_stream = false;

    loop {
        let elapsed = clock.elapsed_since(start);
        if elapsed >= duration_ms {
            break;
        }
        let slice = Duration::from_millis(u64::from(duration_ms - elapsed)).min(poll);

        if end_of_stream {
            sleep(slice).await;
            continue;
        }

        tokio::select! {
            result = source.read(&mut buf) => match result {
                Ok(0) => {
                    debug!("Receiver stream ended");
                    end_of_stream = true;
                }
                Ok(n) => {
                    buf[..n].iter().for_each(|&byte| step(byte));
                    drained += n;
                }
                Err(e) => {
                    debug!("Receiver read failed: {}", e);
                    sleep(slice).await;
                }
            },
            _ = sleep(slice) => {}
        }
    }

    if !end_of_stream {
        // Sweep bytes that are already available without waiting for more
        while let Ok(Ok(n)) = timeout(Duration::ZERO, source.read(&mut buf)).await {
            if n == 0 {
                break;
            }
            buf[..n].iter().for_each(|&byte| step(byte));
            drained += n;
        }
    }

    drained
}
