use axum_linkngo_io::SocketIo;
use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};
use tracing::{debug, info, warn};

use crate::{
    error::RoomError,
    events::{ConnectionId, Inbound, Notification, Position},
    outbox::{Outbox, Subscriber},
    room::RoomHandle,
};

#[derive(Clone, Default)]
pub struct ConnectionIds {
    next: Arc<AtomicU64>,
}

impl ConnectionIds {
    pub fn next(&self) -> ConnectionId {
        ConnectionId::new(self.next.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

/// Issues the connection's single disconnect when dropped, however the
/// connection task ends.
pub struct DisconnectGuard {
    id: ConnectionId,
    rooms: RoomHandle,
}

impl DisconnectGuard {
    pub fn new(id: ConnectionId, rooms: RoomHandle) -> Self {
        Self { id, rooms }
    }
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        self.rooms.disconnect_now(self.id);
    }
}

pub struct Session {
    id: ConnectionId,
    rooms: RoomHandle,
    outbox: Subscriber,
}

impl Session {
    pub fn new(id: ConnectionId, rooms: RoomHandle, outbox: Subscriber) -> Self {
        Self { id, rooms, outbox }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Errors only when the room service is gone.
    pub async fn handle(&self, inbound: Inbound) -> Result<(), RoomError> {
        match inbound {
            Inbound::JoinRoom { room_id, user_name } => {
                match self
                    .rooms
                    .join(self.id, room_id, user_name, self.outbox.clone())
                    .await
                {
                    Ok(_) => Ok(()),
                    Err(err @ RoomError::AlreadyJoined { .. }) => {
                        warn!(socket_id = %self.id, %err, "join refused");
                        Ok(())
                    }
                    Err(err) => Err(err),
                }
            }
            Inbound::LocationUpdate { room_id, lat, lng } => {
                let Some(position) = Position::new(lat, lng) else {
                    debug!(socket_id = %self.id, lat, lng, "invalid position discarded");
                    return Ok(());
                };
                self.rooms.update_position(self.id, room_id, position).await
            }
            Inbound::LeaveRoom { room_id } => self.rooms.leave(self.id, room_id).await,
        }
    }
}

pub async fn handle_socket(
    mut socket: SocketIo,
    rooms: RoomHandle,
    id: ConnectionId,
    addr: SocketAddr,
) {
    let _guard = DisconnectGuard::new(id, rooms.clone());
    let outbound = socket.emitter();
    info!(socket_id = %id, %addr, "client connected");

    if let Err(err) = outbound.deliver(&Notification::Connected { socket_id: id }) {
        warn!(socket_id = %id, %err, "could not greet client");
        return;
    }
    let session = Session::new(id, rooms, Arc::new(outbound.clone()));

    loop {
        // A dead writer ends the connection even while the peer keeps reading.
        let event = tokio::select! {
            event = socket.recv() => match event {
                Ok(event) => event,
                Err(err) => {
                    debug!(socket_id = %id, %err, "connection closed");
                    break;
                }
            },
            () = outbound.closed() => {
                warn!(socket_id = %id, "outbound stream failed");
                break;
            }
        };
        let inbound = match Inbound::decode(event.name(), event.data()) {
            Ok(Some(inbound)) => inbound,
            Ok(None) => {
                debug!(socket_id = %id, event = event.name(), "unknown event ignored");
                continue;
            }
            Err(err) => {
                warn!(socket_id = %id, %err, "closing connection");
                break;
            }
        };
        if let Err(err) = session.handle(inbound).await {
            warn!(socket_id = %id, %err, "closing connection");
            break;
        }
    }

    info!(socket_id = %id, %addr, "client disconnected");
}
