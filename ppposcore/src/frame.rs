//! Outbound framing: escaped-byte appending and HDLC-async encapsulation.

use crate::accm::Accm;
use crate::chain::{AllocError, Chain, Segment, SegmentPool};
use crate::fcs::{fcs_step, FCS_INIT};
use crate::proto::{ALLSTATIONS, ESCAPE, FLAG, TRANS, UI};

/// Negotiated transmit-side header compression.
#[derive(Debug, Clone, Copy, Default)]
pub struct TxOptions {
    /// Address-and-control field compression: omit the FF 03 prefix.
    pub accomp: bool,
    /// Protocol field compression: one protocol octet when it fits.
    pub pcomp: bool,
}

/// Builds an escaped output chain one octet at a time.
///
/// Each push keeps two octets of room in the tail segment, so an escape
/// pair either fits or triggers exactly one allocation and never splits
/// across segments.
pub struct FrameWriter<'a> {
    pool: &'a SegmentPool,
    chain: Chain,
    tail: Segment,
}

impl<'a> FrameWriter<'a> {
    pub fn new(pool: &'a SegmentPool) -> Result<Self, AllocError> {
        let tail = pool.alloc().ok_or(AllocError)?;
        Ok(Self {
            pool,
            chain: Chain::new(),
            tail,
        })
    }

    fn tail_with_room(&mut self) -> Result<&mut Segment, AllocError> {
        if self.tail.room() < 2 {
            let fresh = self.pool.alloc().ok_or(AllocError)?;
            let full = core::mem::replace(&mut self.tail, fresh);
            self.chain.push_segment(full);
        }
        Ok(&mut self.tail)
    }

    /// Append `c`, escape-sequenced when the map requires it.
    pub fn push(&mut self, c: u8, accm: &Accm) -> Result<(), AllocError> {
        let tail = self.tail_with_room()?;
        if accm.escapes(c) {
            tail.push(ESCAPE);
            tail.push(c ^ TRANS);
        } else {
            tail.push(c);
        }
        Ok(())
    }

    /// Append `c` with no escape processing (flag octets only).
    pub fn push_raw(&mut self, c: u8) -> Result<(), AllocError> {
        self.tail_with_room()?.push(c);
        Ok(())
    }

    pub fn finish(mut self) -> Chain {
        self.chain.push_segment(self.tail);
        self.chain
    }
}

fn push_trailer(w: &mut FrameWriter<'_>, fcs: u16, accm: &Accm) -> Result<(), AllocError> {
    // Ones-complement of the remainder, low octet first; the check octets
    // themselves are escape-processed but not FCS-accumulated.
    let fcs = !fcs;
    w.push((fcs & 0xff) as u8, accm)?;
    w.push((fcs >> 8) as u8, accm)?;
    w.push_raw(FLAG)
}

/// Encapsulate `payload` under `protocol` into a complete wire frame.
///
/// `leading_flag` prepends an opening 0x7e to flush line noise after an
/// idle period. On failure the partially built chain is released and the
/// caller drops the packet.
pub fn encapsulate(
    pool: &SegmentPool,
    payload: &Chain,
    protocol: u16,
    opts: TxOptions,
    leading_flag: bool,
    accm: &Accm,
) -> Result<Chain, AllocError> {
    let mut w = FrameWriter::new(pool)?;
    let mut fcs = FCS_INIT;
    if leading_flag {
        w.push_raw(FLAG)?;
    }
    if !opts.accomp {
        fcs = fcs_step(fcs, ALLSTATIONS);
        w.push(ALLSTATIONS, accm)?;
        fcs = fcs_step(fcs, UI);
        w.push(UI, accm)?;
    }
    if !opts.pcomp || protocol > 0xff {
        let hi = (protocol >> 8) as u8;
        fcs = fcs_step(fcs, hi);
        w.push(hi, accm)?;
    }
    let lo = (protocol & 0xff) as u8;
    fcs = fcs_step(fcs, lo);
    w.push(lo, accm)?;
    for c in payload.bytes() {
        fcs = fcs_step(fcs, c);
        w.push(c, accm)?;
    }
    push_trailer(&mut w, fcs, accm)?;
    Ok(w.finish())
}

/// Frame a packet that already carries its PPP header octets (the
/// control-plane write path).
pub fn frame_packet(
    pool: &SegmentPool,
    packet: &[u8],
    leading_flag: bool,
    accm: &Accm,
) -> Result<Chain, AllocError> {
    let mut w = FrameWriter::new(pool)?;
    let mut fcs = FCS_INIT;
    if leading_flag {
        w.push_raw(FLAG)?;
    }
    for &c in packet {
        fcs = fcs_step(fcs, c);
        w.push(c, accm)?;
    }
    push_trailer(&mut w, fcs, accm)?;
    Ok(w.finish())
}
