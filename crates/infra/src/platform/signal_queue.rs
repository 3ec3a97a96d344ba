//! Bounded signal queue
//!
//! Collaborators run wherever the host delivers their callbacks. They post
//! [`Signal`]s through a cloneable [`SignalSender`]; the control thread owns
//! the [`SignalQueue`] and drains it into the session in delivery order.

use crossbeam::channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use thiserror::Error;
use tracing::{debug, trace, warn};

use callroute_core::domain::{SessionController, Signal};

/// Errors raised when posting a signal
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Signal queue full (capacity {0})")]
    Full(usize),

    #[error("Signal queue disconnected")]
    Disconnected,
}

pub type Result<T> = std::result::Result<T, QueueError>;

/// Producer side, handed to collaborators
#[derive(Debug, Clone)]
pub struct SignalSender {
    sender: Sender<Signal>,
    capacity: usize,
}

impl SignalSender {
    /// Post a signal without blocking
    pub fn try_send(&self, signal: Signal) -> Result<()> {
        self.sender.try_send(signal).map_err(|e| match e {
            TrySendError::Full(signal) => {
                warn!(?signal, capacity = self.capacity, "Signal queue full, dropping signal");
                QueueError::Full(self.capacity)
            }
            TrySendError::Disconnected(_) => QueueError::Disconnected,
        })
    }
}

/// Consumer side, owned by the control thread
#[derive(Debug)]
pub struct SignalQueue {
    sender: Sender<Signal>,
    receiver: Receiver<Signal>,
    capacity: usize,
}

impl SignalQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        debug!(capacity, "Created signal queue");
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    pub fn sender(&self) -> SignalSender {
        SignalSender {
            sender: self.sender.clone(),
            capacity: self.capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Next pending signal, if any
    pub fn try_recv(&self) -> Option<Signal> {
        match self.receiver.try_recv() {
            Ok(signal) => Some(signal),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Deliver every pending signal to the session, returning how many were
    /// delivered
    ///
    /// Signals posted while pumping are delivered in the same call.
    pub fn pump(&self, session: &mut SessionController) -> usize {
        let mut delivered = 0;
        while let Some(signal) = self.try_recv() {
            trace!(?signal, "Delivering signal");
            session.handle(signal);
            delivered += 1;
        }
        if delivered > 0 {
            debug!(delivered, "Signal queue drained");
        }
        delivered
    }
}
