//! Boundary to an external Van Jacobson TCP/IP header codec.
//!
//! The framer selects protocol numbers and routes frames through the codec;
//! the compression algorithm itself lives elsewhere.

use crate::chain::Chain;

/// Outcome of offering an outbound IP packet to the compressor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VjCompress {
    /// Unchanged; send under the IP protocol number.
    Ip,
    /// Compressed; send as VJ compressed TCP.
    CompressedTcp,
    /// Uncompressed but with connection state captured; send as VJ
    /// uncompressed TCP.
    UncompressedTcp,
    /// Not a well-formed IP packet; the caller drops it.
    Bad,
}

/// The codec rejected an inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VjError;

/// External VJ codec driven by the framer.
pub trait VjCodec: Send {
    /// Try to compress an outbound IP packet in place.
    fn compress_tcp(&mut self, packet: &mut Chain) -> VjCompress;
    /// Rebuild the full TCP/IP header of a VJ-compressed frame.
    fn uncompress_compressed(&mut self, frame: Chain) -> Result<Chain, VjError>;
    /// Process a VJ-uncompressed frame, updating connection state.
    fn uncompress_uncompressed(&mut self, frame: Chain) -> Result<Chain, VjError>;
    /// An inbound frame was dropped; invalidate decompressor state so a
    /// later delta frame is not applied to a stale header.
    fn receive_error(&mut self);
    /// Adjust slot-id compression and the highest slot id in use.
    fn configure(&mut self, compress_slot: bool, max_slot: u8);
    /// Fresh-link reset.
    fn reset(&mut self);
}

/// Codec for links that never negotiate VJ: outbound IP passes through,
/// every compressed frame is rejected.
#[derive(Debug, Default)]
pub struct VjDisabled;

impl VjCodec for VjDisabled {
    fn compress_tcp(&mut self, _packet: &mut Chain) -> VjCompress {
        VjCompress::Ip
    }

    fn uncompress_compressed(&mut self, _frame: Chain) -> Result<Chain, VjError> {
        Err(VjError)
    }

    fn uncompress_uncompressed(&mut self, _frame: Chain) -> Result<Chain, VjError> {
        Err(VjError)
    }

    fn receive_error(&mut self) {}

    fn configure(&mut self, _compress_slot: bool, _max_slot: u8) {}

    fn reset(&mut self) {}
}
