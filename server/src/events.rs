use serde::{Deserialize, Serialize, Serializer};
use std::{collections::BTreeMap, fmt};

use crate::error::DecodeError;

pub const CONNECTED: &str = "connected";
pub const JOIN_ROOM: &str = "join-room";
pub const ROOM_USERS: &str = "room-users";
pub const USER_JOINED: &str = "user-joined";
pub const LOCATION_UPDATE: &str = "location-update";
pub const LEAVE_ROOM: &str = "leave-room";
pub const USER_LEFT: &str = "user-left";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl Serialize for ConnectionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Free-form room code. Compared exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl From<&str> for RoomId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for RoomId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub lat: f64,
    pub lng: f64,
}

impl Position {
    /// Returns `None` unless both coordinates are finite and in range.
    pub fn new(lat: f64, lng: f64) -> Option<Self> {
        let valid = lat.is_finite()
            && lng.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lng);
        valid.then_some(Self { lat, lng })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantView {
    pub user_name: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

pub type Roster = BTreeMap<ConnectionId, ParticipantView>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JoinRoom {
    room_id: RoomId,
    user_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocationUpdate {
    room_id: RoomId,
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LeaveRoom {
    room_id: RoomId,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    JoinRoom { room_id: RoomId, user_name: String },
    LocationUpdate { room_id: RoomId, lat: f64, lng: f64 },
    LeaveRoom { room_id: RoomId },
}

impl Inbound {
    /// Decodes a named event. Unknown names yield `Ok(None)`.
    pub fn decode(name: &str, data: &[u8]) -> Result<Option<Self>, DecodeError> {
        let inbound = match name {
            JOIN_ROOM => {
                let JoinRoom { room_id, user_name } = parse(JOIN_ROOM, data)?;
                Inbound::JoinRoom { room_id, user_name }
            }
            LOCATION_UPDATE => {
                let LocationUpdate { room_id, lat, lng } = parse(LOCATION_UPDATE, data)?;
                Inbound::LocationUpdate { room_id, lat, lng }
            }
            LEAVE_ROOM => {
                let LeaveRoom { room_id } = parse(LEAVE_ROOM, data)?;
                Inbound::LeaveRoom { room_id }
            }
            _ => return Ok(None),
        };
        Ok(Some(inbound))
    }
}

fn parse<'de, T: Deserialize<'de>>(event: &'static str, data: &'de [u8]) -> Result<T, DecodeError> {
    serde_json::from_slice(data).map_err(|source| DecodeError::Payload { event, source })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum Notification {
    Connected {
        socket_id: ConnectionId,
    },
    RoomUsers(Roster),
    UserJoined {
        socket_id: ConnectionId,
        user_name: String,
    },
    LocationUpdate {
        socket_id: ConnectionId,
        user_name: String,
        lat: f64,
        lng: f64,
    },
    UserLeft {
        socket_id: ConnectionId,
    },
}

impl Notification {
    pub fn event(&self) -> &'static str {
        match self {
            Notification::Connected { .. } => CONNECTED,
            Notification::RoomUsers(_) => ROOM_USERS,
            Notification::UserJoined { .. } => USER_JOINED,
            Notification::LocationUpdate { .. } => LOCATION_UPDATE,
            Notification::UserLeft { .. } => USER_LEFT,
        }
    }

    pub fn payload(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn payload_json(n: &Notification) -> Value {
        serde_json::from_slice(&n.payload().unwrap()).unwrap()
    }

    #[test]
    fn decodes_client_events() {
        let join = Inbound::decode(JOIN_ROOM, br#"{"roomId":"ABC123","userName":"Alice"}"#);
        assert_eq!(
            join.unwrap(),
            Some(Inbound::JoinRoom {
                room_id: "ABC123".into(),
                user_name: "Alice".into()
            })
        );

        let update = Inbound::decode(LOCATION_UPDATE, br#"{"roomId":"ABC123","lat":12.9,"lng":77.5}"#);
        assert_eq!(
            update.unwrap(),
            Some(Inbound::LocationUpdate {
                room_id: "ABC123".into(),
                lat: 12.9,
                lng: 77.5
            })
        );

        let leave = Inbound::decode(LEAVE_ROOM, br#"{"roomId":"ABC123"}"#);
        assert_eq!(
            leave.unwrap(),
            Some(Inbound::LeaveRoom {
                room_id: "ABC123".into()
            })
        );
    }

    #[test]
    fn unknown_events_are_not_errors() {
        assert!(Inbound::decode("typing", b"garbage").unwrap().is_none());
    }

    #[test]
    fn malformed_payload_names_the_event() {
        let err = Inbound::decode(LOCATION_UPDATE, br#"{"roomId":"ABC123","lat":"north"}"#)
            .unwrap_err();
        assert!(err.to_string().starts_with("malformed `location-update` payload"));

        assert!(Inbound::decode(JOIN_ROOM, b"").is_err());
    }

    #[test]
    fn notifications_use_client_field_names() {
        let id = ConnectionId::new(0xa);

        let n = Notification::LocationUpdate {
            socket_id: id,
            user_name: "Alice".into(),
            lat: 12.9,
            lng: 77.5,
        };
        assert_eq!(n.event(), "location-update");
        assert_eq!(
            payload_json(&n),
            json!({"socketId": "000000000000000a", "userName": "Alice", "lat": 12.9, "lng": 77.5})
        );

        let n = Notification::UserJoined {
            socket_id: id,
            user_name: "Bob".into(),
        };
        assert_eq!(n.event(), "user-joined");
        assert_eq!(
            payload_json(&n),
            json!({"socketId": "000000000000000a", "userName": "Bob"})
        );

        let n = Notification::UserLeft { socket_id: id };
        assert_eq!(n.event(), "user-left");
        assert_eq!(payload_json(&n), json!({"socketId": "000000000000000a"}));
    }

    #[test]
    fn room_users_is_keyed_by_socket_id() {
        let mut roster = Roster::new();
        roster.insert(
            ConnectionId::new(1),
            ParticipantView {
                user_name: "Alice".into(),
                lat: Some(12.9),
                lng: Some(77.5),
            },
        );
        roster.insert(
            ConnectionId::new(2),
            ParticipantView {
                user_name: "Bob".into(),
                lat: None,
                lng: None,
            },
        );

        let n = Notification::RoomUsers(roster);
        assert_eq!(n.event(), "room-users");
        assert_eq!(
            payload_json(&n),
            json!({
                "0000000000000001": {"userName": "Alice", "lat": 12.9, "lng": 77.5},
                "0000000000000002": {"userName": "Bob", "lat": null, "lng": null},
            })
        );
    }

    #[test]
    fn positions_must_be_finite_and_in_range() {
        assert_eq!(
            Position::new(12.9, 77.5),
            Some(Position { lat: 12.9, lng: 77.5 })
        );
        assert!(Position::new(-90.0, 180.0).is_some());
        assert!(Position::new(90.5, 0.0).is_none());
        assert!(Position::new(0.0, -180.5).is_none());
        assert!(Position::new(f64::NAN, 0.0).is_none());
        assert!(Position::new(0.0, f64::INFINITY).is_none());
    }
}
