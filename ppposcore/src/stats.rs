//! Link counters. Errors at this layer surface as counter increments and a
//! dropped frame; nothing is retried.

/// Inbound counters, owned by the decoder (single RX context).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RxStats {
    /// Good frames handed upward.
    pub frames: u32,
    /// Frames abandoned for any reason.
    pub drops: u32,
    /// Flag arrived before the frame reached its data portion.
    pub len_errs: u32,
    /// FCS residue mismatches at the closing flag.
    pub fcs_errs: u32,
    /// Segment pool exhausted mid-frame.
    pub mem_errs: u32,
}

/// Outbound counters, owned by the link context.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TxStats {
    /// Frames fully written to the serial device.
    pub frames: u32,
    /// Octets written, framing included.
    pub bytes: u64,
    /// Output chains dropped before reaching the wire.
    pub discards: u32,
    /// Segment pool exhausted while building a frame.
    pub mem_errs: u32,
    /// VJ compressor rejected an outbound packet.
    pub proto_errs: u32,
    /// Short or failed serial writes.
    pub io_errs: u32,
}
