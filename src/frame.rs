use crate::error::{EmitError, FrameError};
use std::str;

/// Outbound event: `[name_len: u8][name][data]`.
#[derive(Debug)]
pub struct Frame<'a> {
    pub name: &'a str,
    pub data: &'a [u8],
}

impl<'a> Frame<'a> {
    pub fn encode(&self, buf: &mut Vec<u8>) -> Result<(), EmitError> {
        let name = self.name.as_bytes();
        let name_len: u8 = name
            .len()
            .try_into()
            .map_err(|_| EmitError::EventNameTooBig)?;

        buf.reserve(1 + name.len() + self.data.len());
        buf.push(name_len);
        buf.extend_from_slice(name);
        buf.extend_from_slice(self.data);
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Box<[u8]>, EmitError> {
        let mut buf = vec![];
        self.encode(&mut buf)?;
        Ok(buf.into())
    }
}

pub fn get_slice<'de>(reader: &mut &'de [u8], len: usize) -> Result<&'de [u8], FrameError> {
    if len <= reader.len() {
        let (slice, rest) = reader.split_at(len);
        *reader = rest;
        Ok(slice)
    } else {
        Err(FrameError::InsufficientBytes)
    }
}

/// Inbound event received from the peer.
#[derive(Debug)]
pub struct Event {
    buf: Box<[u8]>,
    name_len: u8,
}

impl Event {
    pub fn parse(buf: Box<[u8]>) -> Result<Event, FrameError> {
        let reader = &mut &buf[..];
        let name_len = get_slice(reader, 1)?[0];
        let name = get_slice(reader, name_len.into())?;
        str::from_utf8(name).map_err(|_| FrameError::InvalidName)?;
        Ok(Self { buf, name_len })
    }

    #[inline]
    pub fn name(&self) -> &str {
        let name = &self.buf[1..usize::from(self.name_len) + 1];
        // validated in `parse`
        str::from_utf8(name).unwrap_or_default()
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.buf[usize::from(self.name_len) + 1..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_frame() {
        let frame = Frame {
            name: &"1".repeat(256),
            data: &[1, 2],
        };

        // Error Reason: event name too long
        assert_eq!(frame.to_bytes().unwrap_err(), EmitError::EventNameTooBig);

        let frame = Frame {
            name: "location-update",
            data: br#"{"lat":1}"#,
        };
        let bytes = frame.to_bytes().unwrap();
        assert_eq!(bytes[0], 15);

        let event = Event::parse(bytes).unwrap();
        assert_eq!(event.name(), "location-update");
        assert_eq!(event.data(), br#"{"lat":1}"#);
    }

    #[test]
    fn empty_payload() {
        let event = Event::parse(Box::new([4, b'p', b'i', b'n', b'g'])).unwrap();
        assert_eq!(event.name(), "ping");
        assert!(event.data().is_empty());
    }

    #[test]
    fn rejects_truncated_and_invalid_frames() {
        assert_eq!(
            Event::parse(Box::new([])).unwrap_err(),
            FrameError::InsufficientBytes
        );
        assert_eq!(
            Event::parse(Box::new([9, b'j', b'o'])).unwrap_err(),
            FrameError::InsufficientBytes
        );
        assert_eq!(
            Event::parse(Box::new([2, 0xff, 0xfe])).unwrap_err(),
            FrameError::InvalidName
        );
    }
}
