use std::collections::HashMap;
use tracing::{debug, warn};

use crate::{
    error::{DeliveryError, RoomError},
    events::{ConnectionId, Notification, ParticipantView, Position, RoomId, Roster},
    outbox::Subscriber,
};

struct Participant {
    display_name: String,
    position: Option<Position>,
    outbox: Subscriber,
}

impl Participant {
    fn view(&self) -> ParticipantView {
        ParticipantView {
            user_name: self.display_name.clone(),
            lat: self.position.map(|p| p.lat),
            lng: self.position.map(|p| p.lng),
        }
    }
}

#[derive(Default)]
struct Room {
    participants: HashMap<ConnectionId, Participant>,
}

impl Room {
    fn roster(&self) -> Roster {
        self.participants
            .iter()
            .map(|(id, participant)| (*id, participant.view()))
            .collect()
    }

    /// Delivers to every participant except `skip`; returns how many accepted it.
    fn broadcast(
        &self,
        room_id: &RoomId,
        notification: &Notification,
        skip: Option<ConnectionId>,
    ) -> usize {
        self.participants
            .iter()
            .filter(|(id, _)| Some(**id) != skip)
            .filter(|(id, participant)| deliver(room_id, **id, participant, notification))
            .count()
    }
}

fn deliver(
    room_id: &RoomId,
    id: ConnectionId,
    participant: &Participant,
    notification: &Notification,
) -> bool {
    match participant.outbox.deliver(notification) {
        Ok(()) => true,
        // Writer stopped; the gateway task tears the connection down.
        Err(DeliveryError::Closed) => {
            debug!(%room_id, socket_id = %id, event = notification.event(), "outbox closed");
            false
        }
        Err(err) => {
            warn!(%room_id, socket_id = %id, event = notification.event(), %err, "dropped notification");
            false
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub participants: Roster,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Broadcast { recipients: usize },
    NotJoined,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaveOutcome {
    Left { room_id: RoomId, room_closed: bool },
    NotJoined,
}

#[derive(Default)]
pub struct Registry {
    rooms: HashMap<RoomId, Room>,
    members: HashMap<ConnectionId, RoomId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `id` to `room_id`, creating the room if needed.
    ///
    /// The joiner receives `room-users` with the full roster (itself
    /// included); everyone else in the room receives `user-joined`.
    pub fn join(
        &mut self,
        id: ConnectionId,
        room_id: RoomId,
        display_name: String,
        outbox: Subscriber,
    ) -> Result<RoomSnapshot, RoomError> {
        if let Some(current) = self.members.get(&id) {
            return Err(RoomError::AlreadyJoined {
                room_id: current.clone(),
            });
        }

        let room = self.rooms.entry(room_id.clone()).or_default();
        room.participants.insert(
            id,
            Participant {
                display_name: display_name.clone(),
                position: None,
                outbox,
            },
        );
        self.members.insert(id, room_id.clone());

        let snapshot = RoomSnapshot {
            room_id: room_id.clone(),
            participants: room.roster(),
        };
        if let Some(joiner) = room.participants.get(&id) {
            deliver(
                &room_id,
                id,
                joiner,
                &Notification::RoomUsers(snapshot.participants.clone()),
            );
        }
        room.broadcast(
            &room_id,
            &Notification::UserJoined {
                socket_id: id,
                user_name: display_name,
            },
            Some(id),
        );

        Ok(snapshot)
    }

    /// Last writer wins. The sender is among the recipients.
    pub fn update_position(&mut self, id: ConnectionId, position: Position) -> UpdateOutcome {
        let Some(room_id) = self.members.get(&id) else {
            return UpdateOutcome::NotJoined;
        };
        let Some(room) = self.rooms.get_mut(room_id) else {
            return UpdateOutcome::NotJoined;
        };
        let Some(participant) = room.participants.get_mut(&id) else {
            return UpdateOutcome::NotJoined;
        };

        participant.position = Some(position);
        let notification = Notification::LocationUpdate {
            socket_id: id,
            user_name: participant.display_name.clone(),
            lat: position.lat,
            lng: position.lng,
        };
        let recipients = room.broadcast(room_id, &notification, None);
        UpdateOutcome::Broadcast { recipients }
    }

    /// Removes `id` from its room. Safe to repeat.
    pub fn leave(&mut self, id: ConnectionId) -> LeaveOutcome {
        let Some(room_id) = self.members.remove(&id) else {
            return LeaveOutcome::NotJoined;
        };
        let Some(room) = self.rooms.get_mut(&room_id) else {
            return LeaveOutcome::NotJoined;
        };
        room.participants.remove(&id);

        let room_closed = room.participants.is_empty();
        if room_closed {
            self.rooms.remove(&room_id);
        } else {
            room.broadcast(&room_id, &Notification::UserLeft { socket_id: id }, None);
        }
        LeaveOutcome::Left {
            room_id,
            room_closed,
        }
    }

    pub fn disconnect(&mut self, id: ConnectionId) -> LeaveOutcome {
        self.leave(id)
    }

    pub fn snapshot(&self, room_id: &RoomId) -> Option<RoomSnapshot> {
        self.rooms.get(room_id).map(|room| RoomSnapshot {
            room_id: room_id.clone(),
            participants: room.roster(),
        })
    }

    pub fn room_of(&self, id: ConnectionId) -> Option<&RoomId> {
        self.members.get(&id)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn participant_count(&self) -> usize {
        self.members.len()
    }
}
