//! Wire constants for asynchronous HDLC framing (RFC 1662) and the PPP
//! protocol numbers the framer acts on.

/// Frame delimiter.
pub const FLAG: u8 = 0x7e;
/// Escape prefix; the octet that follows is XORed with [`TRANS`].
pub const ESCAPE: u8 = 0x7d;
/// Transposition mask applied to escaped octets.
pub const TRANS: u8 = 0x20;
/// All-stations address octet.
pub const ALLSTATIONS: u8 = 0xff;
/// Unnumbered Information control octet.
pub const UI: u8 = 0x03;

/// Internet Protocol version 4.
pub const PROTO_IP: u16 = 0x0021;
/// Van Jacobson compressed TCP/IP.
pub const PROTO_VJC_COMP: u16 = 0x002d;
/// Van Jacobson uncompressed TCP/IP.
pub const PROTO_VJC_UNCOMP: u16 = 0x002f;
/// Internet Protocol version 6.
pub const PROTO_IPV6: u16 = 0x0057;
/// Link Control Protocol.
pub const PROTO_LCP: u16 = 0xc021;
