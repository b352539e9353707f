use thiserror::Error;

/// Errors surfaced by the link-facing API.
///
/// Most failures at this layer are counted and dropped rather than
/// returned; these are the ones the caller can act on.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum LinkError {
    #[error("no buffer segments available for the output frame")]
    Alloc,

    #[error("packet rejected by the VJ codec")]
    BadPacket,

    #[error("serial device accepted a partial write")]
    ShortWrite,

    #[error("serial write failed: {0}")]
    Io(String),

    #[error("VJ compression is not enabled on this link")]
    VjDisabled,
}
