pub mod error;
pub mod frame;

use error::{ConnClose, EmitError};
pub use frame::{Event, Frame};
pub use web_socket;

use std::io;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::mpsc::{self, error::TrySendError, Sender},
};
use web_socket::{DataType, Stream, WebSocket};

pub struct SocketIo {
    ws: WebSocket<Box<dyn AsyncRead + Send + Unpin + 'static>>,
    tx: Sender<Reply>,
}

enum Reply {
    Pong(Box<[u8]>),
    Event(Box<[u8]>),
}

/// Cloneable handle for emitting events on a connection from other tasks.
#[derive(Clone)]
pub struct Emitter {
    tx: Sender<Reply>,
}

impl Emitter {
    pub async fn emit(&self, name: &str, data: impl AsRef<[u8]>) -> Result<(), EmitError> {
        let buf = Frame {
            name,
            data: data.as_ref(),
        }
        .to_bytes()?;

        self.tx
            .send(Reply::Event(buf))
            .await
            .map_err(|_| EmitError::ReceiverClosed)
    }

    /// Queue an event without waiting for room in the outbound buffer.
    pub fn try_emit(&self, name: &str, data: impl AsRef<[u8]>) -> Result<(), EmitError> {
        let buf = Frame {
            name,
            data: data.as_ref(),
        }
        .to_bytes()?;

        self.tx.try_send(Reply::Event(buf)).map_err(|err| match err {
            TrySendError::Full(_) => EmitError::Full,
            TrySendError::Closed(_) => EmitError::ReceiverClosed,
        })
    }

    /// Resolves once the writer task has stopped, e.g. after a failed write.
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}

impl SocketIo {
    pub fn emitter(&self) -> Emitter {
        Emitter {
            tx: self.tx.clone(),
        }
    }

    pub fn new<I, O>(reader: I, writer: O, buffer: usize) -> Self
    where
        I: Unpin + AsyncRead + Send + 'static,
        O: Unpin + AsyncWrite + Send + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<Reply>(buffer.max(1));
        let mut ws_writer = WebSocket::server(writer);
        tokio::spawn(async move {
            while let Some(reply) = rx.recv().await {
                let o = match reply {
                    Reply::Pong(data) => ws_writer.send_pong(data).await,
                    Reply::Event(data) => ws_writer.send(&data[..]).await,
                };
                if let Err(err) = o {
                    tracing::debug!(%err, "websocket writer stopped");
                    break;
                }
            }
        });
        Self {
            ws: WebSocket::server(Box::new(reader)),
            tx,
        }
    }

    /// Waits for the next event. Any error means the connection is over.
    pub async fn recv(&mut self) -> io::Result<Event> {
        let mut buf = Vec::with_capacity(4096);
        loop {
            match self.ws.recv().await? {
                web_socket::Event::Data { ty, data } => match ty {
                    DataType::Complete(_) => return into_event(data),
                    DataType::Stream(stream) => {
                        buf.extend_from_slice(&data);
                        if let Stream::End(_) = stream {
                            return into_event(buf.into());
                        }
                    }
                },
                web_socket::Event::Ping(data) => {
                    let _ = self.tx.send(Reply::Pong(data)).await;
                }
                web_socket::Event::Pong(_) => {}
                web_socket::Event::Error(err) => {
                    return Err(io::Error::new(io::ErrorKind::ConnectionReset, err));
                }
                web_socket::Event::Close { code, reason } => {
                    return Err(io::Error::new(
                        io::ErrorKind::ConnectionAborted,
                        ConnClose { code, reason },
                    ));
                }
            }
        }
    }
}

fn into_event(buf: Box<[u8]>) -> io::Result<Event> {
    Event::parse(buf).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
}
