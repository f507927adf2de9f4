//! Resolve/Redirect Wire Protocol
//!
//! Every message on the wire is `[4-byte big-endian length][UTF-8 payload]`
//! with payload `"<type>|<body>"`. Two types exist: `resolve` (a client id on
//! the way in; `host:port` or the literal `unknown` on the way out) and
//! `data` (opaque text relayed to a connected client).
//!
//! The decoder accumulates bytes until a full frame is available and
//! preserves leftover bytes exactly, so a message split across arbitrary
//! read boundaries is reconstructed identically to a single-shot delivery.
//! The writer keeps the bytes a non-blocking write could not drain and
//! reports them as pending, which is how connections decide to subscribe to
//! write readiness (backpressure).

pub mod frame;

pub use frame::{
    Frame, FrameDecoder, FrameError, FrameKind, FrameWriter, Resolution, MAX_FRAME_LEN,
};

#[cfg(test)]
mod tests;
