//! Cancellation handle returned by `TypografClient::process_text`.

use tokio::sync::watch;

/// One-shot cancel capability for a single in-flight call.
///
/// `cancel` may be called any number of times, including after the outcome
/// was delivered; only the first call before resolution has an effect.
/// Dropping the handle does not cancel the call.
#[derive(Debug)]
pub struct CancellationHandle {
    flag: watch::Sender<bool>,
}

impl CancellationHandle {
    pub(crate) fn new() -> (Self, watch::Receiver<bool>) {
        let (flag, receiver) = watch::channel(false);
        (Self { flag }, receiver)
    }

    /// Ask the transport to abort the exchange.
    pub fn cancel(&self) {
        let already = self.flag.send_replace(true);
        if !already {
            tracing::debug!("typograf call cancellation requested");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.flag.borrow()
    }
}

/// Resolves to `true` once the flag is raised, `false` if every sender went away first.
pub(crate) async fn raised(mut flag: watch::Receiver<bool>) -> bool {
    loop {
        if *flag.borrow_and_update() {
            return true;
        }
        if flag.changed().await.is_err() {
            return false;
        }
    }
}
