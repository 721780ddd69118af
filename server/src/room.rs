use tokio::sync::{
    mpsc::{self, error::TrySendError, Sender},
    oneshot,
};
use tracing::{debug, info};

use crate::{
    error::RoomError,
    events::{ConnectionId, Position, RoomId},
    outbox::Subscriber,
    registry::{LeaveOutcome, Registry, RoomSnapshot, UpdateOutcome},
};

enum Command {
    Join {
        id: ConnectionId,
        room_id: RoomId,
        user_name: String,
        outbox: Subscriber,
        reply: oneshot::Sender<Result<RoomSnapshot, RoomError>>,
    },
    UpdatePosition {
        id: ConnectionId,
        room_id: RoomId,
        position: Position,
    },
    Leave {
        id: ConnectionId,
        room_id: RoomId,
    },
    Disconnect {
        id: ConnectionId,
    },
    Snapshot {
        room_id: RoomId,
        reply: oneshot::Sender<Option<RoomSnapshot>>,
    },
    RoomCount {
        reply: oneshot::Sender<usize>,
    },
}

pub struct RoomService {
    registry: Registry,
}

impl RoomService {
    /// Starts the service on the current runtime. It stops once every
    /// [`RoomHandle`] has been dropped.
    pub fn spawn(capacity: usize) -> RoomHandle {
        let (tx, mut rx) = mpsc::channel::<Command>(capacity.max(1));
        tokio::spawn(async move {
            let mut service = RoomService {
                registry: Registry::new(),
            };
            while let Some(command) = rx.recv().await {
                service.apply(command);
            }
            debug!("room service stopped");
        });
        RoomHandle { tx }
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::Join {
                id,
                room_id,
                user_name,
                outbox,
                reply,
            } => {
                let result = self
                    .registry
                    .join(id, room_id.clone(), user_name, outbox);
                if let Ok(snapshot) = &result {
                    info!(%room_id, socket_id = %id, members = snapshot.participants.len(), "joined room");
                }
                let _ = reply.send(result);
            }
            Command::UpdatePosition {
                id,
                room_id,
                position,
            } => {
                if self.registry.room_of(id) != Some(&room_id) {
                    debug!(%room_id, socket_id = %id, "location update for another room ignored");
                    return;
                }
                if let UpdateOutcome::NotJoined = self.registry.update_position(id, position) {
                    debug!(socket_id = %id, "location update before join ignored");
                }
            }
            Command::Leave { id, room_id } => {
                if self.registry.room_of(id) != Some(&room_id) {
                    debug!(%room_id, socket_id = %id, "leave for another room ignored");
                    return;
                }
                let outcome = self.registry.leave(id);
                log_departure(id, outcome, "left room");
            }
            Command::Disconnect { id } => {
                let outcome = self.registry.disconnect(id);
                log_departure(id, outcome, "disconnected from room");
            }
            Command::Snapshot { room_id, reply } => {
                let _ = reply.send(self.registry.snapshot(&room_id));
            }
            Command::RoomCount { reply } => {
                let _ = reply.send(self.registry.room_count());
            }
        }
    }
}

fn log_departure(id: ConnectionId, outcome: LeaveOutcome, message: &'static str) {
    if let LeaveOutcome::Left {
        room_id,
        room_closed,
    } = outcome
    {
        info!(%room_id, socket_id = %id, room_closed, "{message}");
    }
}

#[derive(Clone)]
pub struct RoomHandle {
    tx: Sender<Command>,
}

impl RoomHandle {
    async fn dispatch(&self, command: Command) -> Result<(), RoomError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| RoomError::Unavailable)
    }

    pub async fn join(
        &self,
        id: ConnectionId,
        room_id: RoomId,
        user_name: String,
        outbox: Subscriber,
    ) -> Result<RoomSnapshot, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.dispatch(Command::Join {
            id,
            room_id,
            user_name,
            outbox,
            reply,
        })
        .await?;
        rx.await.map_err(|_| RoomError::Unavailable)?
    }

    /// Ignored unless `id` is currently in `room_id`.
    pub async fn update_position(
        &self,
        id: ConnectionId,
        room_id: RoomId,
        position: Position,
    ) -> Result<(), RoomError> {
        self.dispatch(Command::UpdatePosition {
            id,
            room_id,
            position,
        })
        .await
    }

    /// Ignored unless `id` is currently in `room_id`.
    pub async fn leave(&self, id: ConnectionId, room_id: RoomId) -> Result<(), RoomError> {
        self.dispatch(Command::Leave { id, room_id }).await
    }

    pub async fn disconnect(&self, id: ConnectionId) -> Result<(), RoomError> {
        self.dispatch(Command::Disconnect { id }).await
    }

    /// Queues a disconnect without waiting. When the queue is full the
    /// command is handed to a background task so it is never lost.
    pub fn disconnect_now(&self, id: ConnectionId) {
        match self.tx.try_send(Command::Disconnect { id }) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(command)) => {
                let tx = self.tx.clone();
                if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                    runtime.spawn(async move {
                        let _ = tx.send(command).await;
                    });
                }
            }
        }
    }

    pub async fn snapshot(&self, room_id: RoomId) -> Result<Option<RoomSnapshot>, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.dispatch(Command::Snapshot { room_id, reply }).await?;
        rx.await.map_err(|_| RoomError::Unavailable)
    }

    pub async fn room_count(&self) -> Result<usize, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.dispatch(Command::RoomCount { reply }).await?;
        rx.await.map_err(|_| RoomError::Unavailable)
    }
}
