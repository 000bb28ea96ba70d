//! Consumer side of a streaming completion.

use crate::error::CompletionError;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A lazy sequence of text deltas from one completion call.
///
/// Items arrive in upstream order. The sequence ends with `None` after a
/// normal finish, or with a single terminal `Err` item. Once the call is
/// cancelled the very next item is `Err(CompletionError::Aborted)`, even if
/// deltas were still buffered.
pub struct CompletionStream {
    receiver: mpsc::UnboundedReceiver<Result<String, CompletionError>>,
    token: CancellationToken,
    finished: bool,
}

impl CompletionStream {
    pub(crate) fn new(
        receiver: mpsc::UnboundedReceiver<Result<String, CompletionError>>,
        token: CancellationToken,
    ) -> Self {
        Self {
            receiver,
            token,
            finished: false,
        }
    }

    /// Builds an already-terminated stream that yields only `err`.
    pub(crate) fn failed(err: CompletionError) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        // The receiver is alive, so this cannot fail.
        let _ = tx.send(Err(err));
        Self::new(rx, CancellationToken::new())
    }

    /// Cancels this stream's request. The next item is `Aborted`.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Stream for CompletionStream {
    type Item = Result<String, CompletionError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }

        if self.token.is_cancelled() {
            self.finished = true;
            self.receiver.close();
            return Poll::Ready(Some(Err(CompletionError::Aborted)));
        }

        match self.receiver.poll_recv(cx) {
            Poll::Ready(Some(Err(e))) => {
                self.finished = true;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                self.finished = true;
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

impl Drop for CompletionStream {
    fn drop(&mut self) {
        // A dropped consumer stops its producer.
        if !self.finished {
            self.token.cancel();
        }
    }
}
