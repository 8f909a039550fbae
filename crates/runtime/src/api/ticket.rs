//! Pending result of a queued proposal.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use super::errors::{Result, RuntimeError};

/// Resolves to the version the game reached once the worker processed the
/// proposal. Dropping the ticket does not withdraw the proposal.
#[derive(Debug)]
#[must_use = "a ticket does nothing unless awaited"]
pub struct ProposalTicket {
    reply_rx: oneshot::Receiver<Result<u64>>,
}

impl ProposalTicket {
    pub(crate) fn new(reply_rx: oneshot::Receiver<Result<u64>>) -> Self {
        Self { reply_rx }
    }
}

impl Future for ProposalTicket {
    type Output = Result<u64>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.reply_rx)
            .poll(cx)
            .map(|reply| reply.map_err(RuntimeError::ReplyChannelClosed)?)
    }
}
