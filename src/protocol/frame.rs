use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;
use tokio::net::TcpStream;

/// Upper bound on a single frame payload. A length prefix beyond this is
/// treated as stream corruption and is fatal for the connection.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

const LEN_PREFIX: usize = 4;

pub const UNKNOWN_RESOLUTION: &str = "unknown";

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame length {0} exceeds the {MAX_FRAME_LEN} byte limit")]
    Oversized(usize),
    #[error("frame payload is not valid UTF-8")]
    Encoding(#[from] std::string::FromUtf8Error),
    #[error("unknown message type {0:?}")]
    UnknownType(String),
    #[error("frame payload has no type delimiter")]
    MissingDelimiter,
    #[error("invalid message body {0:?}")]
    InvalidBody(String),
}

impl FrameError {
    /// Whether the stream can no longer be trusted. A corrupt length prefix
    /// or undecodable payload closes the connection; an unrecognized type or
    /// body only drops the already-consumed frame.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FrameError::Oversized(_) | FrameError::Encoding(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Resolve,
    Data,
}

impl FrameKind {
    fn tag(self) -> &'static str {
        match self {
            FrameKind::Resolve => "resolve",
            FrameKind::Data => "data",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "resolve" => Some(FrameKind::Resolve),
            "data" => Some(FrameKind::Data),
            _ => None,
        }
    }
}

/// One decoded wire message.
///
/// The body is everything after the first `|`, taken verbatim: the type tag
/// never contains a pipe, and nothing past the delimiter is split again, so
/// a `data` body containing pipes survives intact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: FrameKind,
    pub body: String,
}

impl Frame {
    pub fn resolve(body: impl Into<String>) -> Self {
        Self {
            kind: FrameKind::Resolve,
            body: body.into(),
        }
    }

    pub fn data(body: impl Into<String>) -> Self {
        Self {
            kind: FrameKind::Data,
            body: body.into(),
        }
    }

    pub fn encode(&self) -> Bytes {
        let payload = format!("{}|{}", self.kind.tag(), self.body);
        let mut buf = BytesMut::with_capacity(LEN_PREFIX + payload.len());
        buf.put_u32(payload.len() as u32);
        buf.put_slice(payload.as_bytes());
        buf.freeze()
    }

    /// Parses a resolve-request body into the client id it carries.
    pub fn client_id(&self) -> Result<u32, FrameError> {
        self.body
            .parse()
            .map_err(|_| FrameError::InvalidBody(self.body.clone()))
    }

    fn parse(payload: String) -> Result<Self, FrameError> {
        let (tag, body) = payload
            .split_once('|')
            .ok_or(FrameError::MissingDelimiter)?;
        let kind =
            FrameKind::from_tag(tag).ok_or_else(|| FrameError::UnknownType(tag.to_string()))?;
        Ok(Self {
            kind,
            body: body.to_string(),
        })
    }
}

/// Outcome of a resolve request, as carried in a `resolve` frame body sent by
/// a server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// No owner is known yet; the client must retry.
    Unknown,
    /// The address of the node that owns the client.
    Owner { host: String, port: u16 },
}

impl Resolution {
    pub fn to_frame(&self) -> Frame {
        match self {
            Resolution::Unknown => Frame::resolve(UNKNOWN_RESOLUTION),
            Resolution::Owner { host, port } => Frame::resolve(format!("{host}:{port}")),
        }
    }

    pub fn from_body(body: &str) -> Result<Self, FrameError> {
        if body == UNKNOWN_RESOLUTION {
            return Ok(Resolution::Unknown);
        }
        let (host, port) = body
            .rsplit_once(':')
            .ok_or_else(|| FrameError::InvalidBody(body.to_string()))?;
        let port = port
            .parse()
            .map_err(|_| FrameError::InvalidBody(body.to_string()))?;
        Ok(Resolution::Owner {
            host: host.to_string(),
            port,
        })
    }
}

/// Streaming frame reader.
///
/// Bytes are appended as they arrive; [`next_frame`](Self::next_frame) hands
/// out complete frames and leaves partial ones buffered untouched.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    pub fn next_frame(&mut self) -> Result<Option<Frame>, FrameError> {
        if self.buf.len() < LEN_PREFIX {
            return Ok(None);
        }
        let mut len_bytes = [0u8; LEN_PREFIX];
        len_bytes.copy_from_slice(&self.buf[..LEN_PREFIX]);
        let len = u32::from_be_bytes(len_bytes) as usize;
        if len > MAX_FRAME_LEN {
            return Err(FrameError::Oversized(len));
        }
        if self.buf.len() < LEN_PREFIX + len {
            return Ok(None);
        }
        self.buf.advance(LEN_PREFIX);
        let payload = self.buf.split_to(len);
        let payload = String::from_utf8(payload.to_vec())?;
        Frame::parse(payload).map(Some)
    }
}

/// Outgoing byte buffer with backpressure accounting.
///
/// Encoded frames are queued and drained with non-blocking writes. When a
/// write cannot fully drain the buffer the leftover stays pending and the
/// connection adds write readiness to its interest set; once a later write
/// empties the buffer the interest is dropped again.
#[derive(Debug, Default)]
pub struct FrameWriter {
    pending: BytesMut,
}

impl FrameWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&mut self, frame: &Frame) {
        self.pending.extend_from_slice(&frame.encode());
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    /// Writes as much of the pending buffer as the socket accepts. Returns
    /// `Ok(true)` when the buffer drained completely and `Ok(false)` when the
    /// socket would block with bytes still pending.
    pub fn write_to(&mut self, stream: &TcpStream) -> std::io::Result<bool> {
        while !self.pending.is_empty() {
            match stream.try_write(&self.pending) {
                Ok(0) => {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::WriteZero,
                        "connection closed while writing",
                    ))
                }
                Ok(written) => {
                    self.pending.advance(written);
                }
                Err(error) if error.kind() == std::io::ErrorKind::WouldBlock => {
                    tracing::debug!(
                        "Write backpressure: {} bytes still pending",
                        self.pending.len()
                    );
                    return Ok(false);
                }
                Err(error) => return Err(error),
            }
        }
        Ok(true)
    }
}
