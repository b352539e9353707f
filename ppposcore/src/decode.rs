//! Inbound decoder: reassembles PPP frames from arbitrary chunks of
//! received octets.
//!
//! The decoder is fed bytes in arrival order and walks a seven-state
//! machine per octet. Frames accumulate in a segment chain; a closing flag
//! with the good FCS residue yields a [`RxEvent::Frame`] whose chain starts
//! with the two-octet protocol identifier, big-endian.

use crate::accm::Accm;
use crate::chain::{Chain, Segment, SegmentPool};
use crate::fcs::{fcs_step, FCS_GOOD, FCS_INIT};
use crate::proto::{ALLSTATIONS, ESCAPE, FLAG, TRANS, UI};
use crate::stats::RxStats;
use log::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum RxState {
    Idle,
    Start,
    Address,
    Control,
    Protocol1,
    Protocol2,
    Data,
}

/// Something the decoder produced while consuming an octet.
#[derive(Debug)]
pub enum RxEvent {
    /// A complete frame passed its FCS check.
    Frame(Chain),
    /// A partial frame was abandoned.
    Dropped(DropCause),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropCause {
    /// Flag arrived before the frame reached its data portion.
    TooShort,
    /// FCS residue mismatch at the closing flag.
    BadFcs,
    /// Segment pool exhausted mid-frame.
    NoBuffers,
}

/// Decoder configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct RxConfig {
    /// Leading octets reserved in the first segment of each reassembled
    /// frame, for upper layers that prepend a forwarding header. Must
    /// leave room for the protocol prefix within one segment.
    pub headroom: usize,
}

pub struct Decoder {
    pool: SegmentPool,
    accm: Accm,
    state: RxState,
    escaped: bool,
    fcs: u16,
    protocol: u16,
    head: Option<Chain>,
    tail: Option<Segment>,
    headroom: usize,
    stats: RxStats,
}

impl Decoder {
    pub fn new(pool: SegmentPool, config: RxConfig) -> Self {
        Self {
            pool,
            accm: Accm::inbound_default(),
            state: RxState::Idle,
            escaped: false,
            fcs: FCS_INIT,
            protocol: 0,
            head: None,
            tail: None,
            headroom: config.headroom,
            stats: RxStats::default(),
        }
    }

    /// Install the negotiated inbound ACCM. The decoder reads its own copy
    /// per byte, so the caller serialises this against `advance`.
    pub fn set_accm(&mut self, accm: Accm) {
        self.accm = accm;
    }

    /// Reset to the fresh-link state, releasing any partial frame.
    pub fn reset(&mut self) {
        self.free_current();
        self.accm = Accm::inbound_default();
        self.state = RxState::Idle;
        self.escaped = false;
        self.fcs = FCS_INIT;
        self.protocol = 0;
    }

    /// Release a partial input frame without touching decode state.
    pub fn free_current(&mut self) {
        self.head = None;
        self.tail = None;
    }

    pub fn stats(&self) -> &RxStats {
        &self.stats
    }

    /// Feed a chunk, handing each produced event to `sink`.
    pub fn feed<F: FnMut(RxEvent)>(&mut self, buf: &[u8], mut sink: F) {
        for &c in buf {
            if let Some(event) = self.advance(c) {
                sink(event);
            }
        }
    }

    /// Consume one received octet.
    pub fn advance(&mut self, c: u8) -> Option<RxEvent> {
        if self.accm.escapes(c) {
            self.special(c)
        } else {
            self.data(c)
        }
    }

    fn special(&mut self, c: u8) -> Option<RxEvent> {
        if c == ESCAPE {
            // An escape always arms the latch, even when the previous octet
            // was itself an escape: a peer that escapes 0x5d produces a
            // sequence this decoder will not give back as a literal ']'.
            self.escaped = true;
            return None;
        }
        if c != FLAG {
            // Usually an XON/XOFF the line discipline slipped in. Not part
            // of the frame: no FCS update, no state change.
            debug!("discarding control octet {c:#04x}");
            return None;
        }
        let event = if self.state <= RxState::Address {
            // extra inter-frame flag
            None
        } else if self.state < RxState::Data {
            warn!("flag inside frame header, state {:?}", self.state);
            self.stats.len_errs += 1;
            self.drop_frame();
            Some(RxEvent::Dropped(DropCause::TooShort))
        } else if self.fcs != FCS_GOOD {
            debug!(
                "dropping frame with bad fcs {:#06x}, proto {:#06x}",
                self.fcs, self.protocol
            );
            self.stats.fcs_errs += 1;
            self.drop_frame();
            Some(RxEvent::Dropped(DropCause::BadFcs))
        } else {
            self.complete()
        };
        // Ready for the next frame.
        self.fcs = FCS_INIT;
        self.state = RxState::Address;
        self.escaped = false;
        event
    }

    fn complete(&mut self) -> Option<RxEvent> {
        let mut chain = match self.head.take() {
            Some(chain) => chain,
            None => {
                // Good residue but nothing stored: a forged frame shorter
                // than its own FCS. Counted with the header-length errors.
                self.stats.len_errs += 1;
                self.stats.drops += 1;
                return Some(RxEvent::Dropped(DropCause::TooShort));
            }
        };
        if let Some(tail) = self.tail.take() {
            chain.push_segment(tail);
        }
        // The two FCS octets were stored as payload; trim them off the end.
        chain.trim_trailing(2);
        self.stats.frames += 1;
        Some(RxEvent::Frame(chain))
    }

    fn data(&mut self, mut c: u8) -> Option<RxEvent> {
        if self.escaped {
            self.escaped = false;
            c ^= TRANS;
        }
        let mut event = None;
        // The address, control and first-protocol states re-examine the
        // same octet in the next state when the peer compressed the field
        // away (ACFC/PFC), so this runs as a fall-through ladder.
        let mut state = self.state;
        loop {
            match state {
                RxState::Idle => {
                    if c != ALLSTATIONS {
                        // noise between frames
                        break;
                    }
                    state = RxState::Start;
                }
                RxState::Start => {
                    self.fcs = FCS_INIT;
                    state = RxState::Address;
                }
                RxState::Address => {
                    if c == ALLSTATIONS {
                        self.state = RxState::Control;
                        break;
                    }
                    state = RxState::Control;
                }
                RxState::Control => {
                    if c == UI {
                        self.state = RxState::Protocol1;
                        break;
                    }
                    state = RxState::Protocol1;
                }
                RxState::Protocol1 => {
                    if c & 1 != 0 {
                        self.protocol = c as u16;
                        self.state = RxState::Data;
                    } else {
                        self.protocol = (c as u16) << 8;
                        self.state = RxState::Protocol2;
                    }
                    break;
                }
                RxState::Protocol2 => {
                    self.protocol |= c as u16;
                    self.state = RxState::Data;
                    break;
                }
                RxState::Data => {
                    event = self.store(c);
                    break;
                }
            }
        }
        // Every non-control octet runs through the FCS: address, control,
        // protocol, payload and the two trailing check octets, which is how
        // the good residue arises.
        self.fcs = fcs_step(self.fcs, c);
        event
    }

    fn store(&mut self, c: u8) -> Option<RxEvent> {
        if self.tail.as_ref().map_or(true, |t| t.room() == 0) {
            if let Some(filled) = self.tail.take() {
                if let Some(chain) = self.head.as_mut() {
                    chain.push_segment(filled);
                }
            }
            let mut seg = match self.pool.alloc() {
                Some(seg) => seg,
                None => {
                    // Out of segments. Abandon this frame but keep decoding:
                    // a new packet may begin within the same chunk.
                    warn!("no free rx segments, dropping frame in progress");
                    self.stats.mem_errs += 1;
                    self.drop_frame();
                    self.state = RxState::Start;
                    return Some(RxEvent::Dropped(DropCause::NoBuffers));
                }
            };
            if self.head.is_none() {
                // First segment of the frame: reserve headroom, then lead
                // with the protocol identifier so the dispatched chain
                // starts with it.
                seg.reserve(self.headroom);
                seg.push((self.protocol >> 8) as u8);
                seg.push((self.protocol & 0xff) as u8);
                self.head = Some(Chain::new());
            }
            self.tail = Some(seg);
        }
        if let Some(tail) = self.tail.as_mut() {
            tail.push(c);
        }
        None
    }

    fn drop_frame(&mut self) {
        if let Some(chain) = self.head.take() {
            debug!("dropping partial frame, {} octets", chain.total_len());
        }
        self.tail = None;
        self.stats.drops += 1;
    }
}
