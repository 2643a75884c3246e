//! Two-phase results: a synchronous receipt plus an awaitable completion.

use serialws_core::CommandResult;
use tokio::sync::oneshot;

/// Resolves once the asynchronous half of a session operation has settled.
///
/// Any event the operation causes is delivered to the event sink before the
/// completion resolves. Dropping a `Completion` does not cancel anything.
#[derive(Debug)]
#[must_use = "a completion does nothing unless awaited; drop it explicitly to fire and forget"]
pub struct Completion(Option<oneshot::Receiver<()>>);

impl Completion {
    pub(crate) fn pending() -> (Self, Notifier) {
        let (tx, rx) = oneshot::channel();
        (Self(Some(rx)), Notifier(tx))
    }

    pub(crate) fn ready() -> Self {
        Self(None)
    }

    /// Wait until the operation has settled.
    pub async fn settled(self) {
        if let Some(rx) = self.0 {
            // A dropped notifier means the driving task is gone, which is settled too.
            let _ = rx.await;
        }
    }
}

/// Sending half of a [`Completion`].
#[derive(Debug)]
pub(crate) struct Notifier(oneshot::Sender<()>);

impl Notifier {
    pub(crate) fn notify(self) {
        let _ = self.0.send(());
    }
}

/// What a submitting session operation returns.
#[derive(Debug)]
pub struct Submission {
    /// The synchronous receipt. `success` means "submitted", not "done".
    pub result: CommandResult,
    /// Resolves when the submitted work has settled.
    pub completion: Completion,
}

impl Submission {
    pub(crate) fn accepted(msg: &str, completion: Completion) -> Self {
        Self {
            result: CommandResult::accepted(msg),
            completion,
        }
    }

    pub(crate) fn rejected(msg: impl Into<String>) -> Self {
        Self {
            result: CommandResult::rejected(msg),
            completion: Completion::ready(),
        }
    }

    /// Wait for completion and hand back the synchronous receipt.
    pub async fn settled(self) -> CommandResult {
        self.completion.settled().await;
        self.result
    }
}
