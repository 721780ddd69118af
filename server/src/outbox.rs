use linkngo_io::{error::EmitError, Emitter};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::{error::DeliveryError, events::Notification};

/// Sink for one connection's notifications. Implementations must not block.
pub trait Outbox: Send + Sync {
    fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError>;
}

pub type Subscriber = Arc<dyn Outbox>;

impl Outbox for Emitter {
    fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError> {
        let payload = notification.payload()?;
        self.try_emit(notification.event(), payload)
            .map_err(|err| match err {
                EmitError::Full => DeliveryError::Full,
                EmitError::ReceiverClosed => DeliveryError::Closed,
                other => DeliveryError::Emit(other),
            })
    }
}

impl Outbox for mpsc::UnboundedSender<Notification> {
    fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError> {
        self.send(notification.clone())
            .map_err(|_| DeliveryError::Closed)
    }
}
