//! Per-session PPPoS link context.
//!
//! `Pppos` owns the receive decoder, the outbound encapsulation path and
//! the transmit sink. It is built for the split the protocol imposes: one
//! RX context feeds [`Pppos::input`], any number of TX callers go through
//! [`Pppos::write`] / [`Pppos::netif_output`], and the control plane
//! adjusts ACCMs, header-compression flags and VJ settings concurrently.
//! The two sides never share a lock, so receive processing is not stalled
//! by a slow serial write.

use crate::dispatch::Dispatcher;
use crate::error::LinkError;
use crate::serial::SerialTx;
use log::{debug, info, warn};
use ppposcore::accm::Accm;
use ppposcore::chain::{Chain, SegmentPool};
use ppposcore::decode::{Decoder, RxConfig, RxEvent};
use ppposcore::frame::{encapsulate, frame_packet, TxOptions};
use ppposcore::proto::{PROTO_IP, PROTO_VJC_COMP, PROTO_VJC_UNCOMP};
use ppposcore::stats::{RxStats, TxStats};
use ppposcore::vj::{VjCodec, VjCompress, VjDisabled};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

/// Idle gap after which the next frame re-emits an opening flag to flush
/// line noise at the far end.
pub const MAX_IDLE_FLAG: Duration = Duration::from_millis(100);

/// Commands the upper PPP core issues to its link layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkCommand {
    Connect,
    Disconnect,
    Free,
}

/// Upper-layer notifications. Methods default to no-ops; implement the
/// ones the control plane cares about.
pub trait LinkStatus: Send + Sync + 'static {
    /// The link came up and framing is active.
    fn link_started(&self) {}

    /// The link went down.
    fn link_ended(&self) {}

    /// Timing-entropy hook, fired once per `input` call whether or not a
    /// frame completed. Feeds the control plane's magic-number PRNG.
    fn randomize(&self) {}
}

/// Status sink that ignores everything.
pub struct NullStatus;

impl LinkStatus for NullStatus {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Setup,
    Started,
    Closed,
}

#[derive(Debug, Clone, Copy)]
pub struct PpposConfig {
    /// Segments in the link's buffer pool, shared by both directions.
    pub pool_segments: usize,
    /// Leading octets reserved in reassembled frames for upper layers
    /// that prepend a forwarding header.
    pub headroom: usize,
}

impl Default for PpposConfig {
    fn default() -> Self {
        Self {
            pool_segments: 64,
            headroom: 0,
        }
    }
}

/// Counter snapshot for both directions.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinkStats {
    pub rx: RxStats,
    pub tx: TxStats,
    /// Good frames the dispatcher refused.
    pub in_discards: u32,
}

struct TxSide<S> {
    serial: S,
    last_xmit: Option<Instant>,
    opts: TxOptions,
    stats: TxStats,
}

/// One PPP-over-serial session.
pub struct Pppos<S: SerialTx> {
    pool: SegmentPool,
    rx: Mutex<Decoder>,
    tx: Mutex<TxSide<S>>,
    out_accm: Mutex<Accm>,
    vj: Mutex<Box<dyn VjCodec>>,
    vj_enabled: AtomicBool,
    in_discards: AtomicU32,
    dispatcher: Arc<dyn Dispatcher>,
    status: Arc<dyn LinkStatus>,
    lifecycle: RwLock<Lifecycle>,
}

impl<S: SerialTx> Pppos<S> {
    /// Create a link over the given serial output. The link starts in the
    /// setup phase; issue [`LinkCommand::Connect`] to begin framing.
    pub fn new(
        serial: S,
        dispatcher: Arc<dyn Dispatcher>,
        status: Arc<dyn LinkStatus>,
        config: PpposConfig,
    ) -> Self {
        let pool = SegmentPool::new(config.pool_segments);
        let decoder = Decoder::new(
            pool.clone(),
            RxConfig {
                headroom: config.headroom,
            },
        );
        Self {
            pool,
            rx: Mutex::new(decoder),
            tx: Mutex::new(TxSide {
                serial,
                last_xmit: None,
                opts: TxOptions::default(),
                stats: TxStats::default(),
            }),
            out_accm: Mutex::new(Accm::new()),
            vj: Mutex::new(Box::new(VjDisabled)),
            vj_enabled: AtomicBool::new(false),
            in_discards: AtomicU32::new(0),
            dispatcher,
            status,
            lifecycle: RwLock::new(Lifecycle::Setup),
        }
    }

    /// Replace the VJ codec. Do this before connecting.
    pub fn set_vj_codec(&self, codec: Box<dyn VjCodec>) {
        *self.vj.lock().unwrap() = codec;
    }

    pub fn command(&self, command: LinkCommand) {
        match command {
            LinkCommand::Connect => self.connect(),
            LinkCommand::Disconnect => self.disconnect(),
            LinkCommand::Free => self.free(),
        }
    }

    /// Bring the link up: reclaim any leftover input frame, reset decode
    /// state and both ACCMs, reinitialise the VJ codec and notify the
    /// upper layers.
    pub fn connect(&self) {
        self.rx.lock().unwrap().reset();
        *self.out_accm.lock().unwrap() = Accm::new();
        self.vj.lock().unwrap().reset();
        {
            let mut tx = self.tx.lock().unwrap();
            tx.last_xmit = None;
            tx.opts = TxOptions::default();
        }
        *self.lifecycle.write().unwrap() = Lifecycle::Started;
        info!("pppos: connecting");
        self.status.link_started();
    }

    /// Take the link down. The input chain is deliberately left in place:
    /// the RX context may still be mid-call, and the next connect (or
    /// free) reclaims it.
    pub fn disconnect(&self) {
        *self.lifecycle.write().unwrap() = Lifecycle::Setup;
        info!("pppos: link ended");
        self.status.link_ended();
    }

    /// Release any partial input frame and stop accepting bytes. The
    /// context itself is released when the value drops.
    pub fn free(&self) {
        *self.lifecycle.write().unwrap() = Lifecycle::Closed;
        self.rx.lock().unwrap().free_current();
    }

    fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle.read().unwrap()
    }

    /// Pool handle, for building payload chains to hand to
    /// [`Pppos::netif_output`].
    pub fn pool(&self) -> &SegmentPool {
        &self.pool
    }

    /// Feed raw received octets from the serial driver.
    ///
    /// Call from a single RX context; completed frames go to the
    /// dispatcher and the entropy hook fires once per call.
    pub fn input(&self, buf: &[u8]) {
        if self.lifecycle() != Lifecycle::Started {
            return;
        }
        let mut completed: Vec<Chain> = Vec::new();
        let mut dropped = 0u32;
        {
            let mut rx = self.rx.lock().unwrap();
            rx.feed(buf, |event| match event {
                RxEvent::Frame(chain) => completed.push(chain),
                RxEvent::Dropped(_) => dropped += 1,
            });
        }
        if dropped > 0 {
            // A lost frame may have carried a VJ delta; the decompressor
            // must not apply later deltas to a stale header.
            let mut vj = self.vj.lock().unwrap();
            for _ in 0..dropped {
                vj.receive_error();
            }
        }
        for frame in completed {
            if self.dispatcher.dispatch(frame).is_err() {
                warn!("pppos: upper layer refused a frame, dropping");
                self.in_discards.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.status.randomize();
    }

    /// Frame and transmit a packet that already carries its PPP header
    /// octets (control-plane frames from the upper layer).
    pub fn write(&self, packet: &[u8]) -> Result<(), LinkError> {
        let accm = *self.out_accm.lock().unwrap();
        let mut tx = self.tx.lock().unwrap();
        let leading_flag = idle(tx.last_xmit);
        tx.last_xmit = Some(Instant::now());
        let chain = match frame_packet(&self.pool, packet, leading_flag, &accm) {
            Ok(chain) => chain,
            Err(_) => {
                warn!("pppos write: out of segments, dropping {} octets", packet.len());
                tx.stats.mem_errs += 1;
                tx.stats.proto_errs += 1;
                tx.stats.discards += 1;
                return Err(LinkError::Alloc);
            }
        };
        debug!("pppos write: {} framed octets", chain.total_len());
        xmit(&mut tx, chain)
    }

    /// Encapsulate and transmit a network-layer packet under `protocol`.
    ///
    /// IP packets go through the VJ compressor when enabled, which may
    /// rewrite the payload and remap the protocol number.
    pub fn netif_output(&self, mut packet: Chain, mut protocol: u16) -> Result<(), LinkError> {
        if protocol == PROTO_IP && self.vj_enabled.load(Ordering::Acquire) {
            match self.vj.lock().unwrap().compress_tcp(&mut packet) {
                VjCompress::Ip => {}
                VjCompress::CompressedTcp => protocol = PROTO_VJC_COMP,
                VjCompress::UncompressedTcp => protocol = PROTO_VJC_UNCOMP,
                VjCompress::Bad => {
                    warn!("pppos output: bad IP packet");
                    let mut tx = self.tx.lock().unwrap();
                    tx.stats.proto_errs += 1;
                    tx.stats.discards += 1;
                    return Err(LinkError::BadPacket);
                }
            }
        }
        let accm = *self.out_accm.lock().unwrap();
        let mut tx = self.tx.lock().unwrap();
        let leading_flag = idle(tx.last_xmit);
        tx.last_xmit = Some(Instant::now());
        let opts = tx.opts;
        let chain = match encapsulate(&self.pool, &packet, protocol, opts, leading_flag, &accm) {
            Ok(chain) => chain,
            Err(_) => {
                warn!("pppos output: out of segments, dropping proto {protocol:#06x}");
                tx.stats.mem_errs += 1;
                tx.stats.discards += 1;
                return Err(LinkError::Alloc);
            }
        };
        debug!(
            "pppos output: proto {protocol:#06x}, {} framed octets",
            chain.total_len()
        );
        xmit(&mut tx, chain)
    }

    /// Enable or disable VJ and configure the codec (IPCP negotiation
    /// result).
    pub fn vjc_config(&self, enabled: bool, compress_slot: bool, max_slot: u8) {
        self.vj_enabled.store(enabled, Ordering::Release);
        self.vj.lock().unwrap().configure(compress_slot, max_slot);
        debug!("pppos vjc_config: enable={enabled} slot={compress_slot} max={max_slot}");
    }

    /// Rebuild a received VJ-compressed TCP frame. Fails closed when VJ is
    /// off or the codec rejects the frame; on success the rebuilt packet
    /// is returned for delivery to IP.
    pub fn vjc_comp(&self, frame: Chain) -> Result<Chain, LinkError> {
        if !self.vj_enabled.load(Ordering::Acquire) {
            debug!("pppos: dropping VJ compressed frame, VJ disabled");
            return Err(LinkError::VjDisabled);
        }
        self.vj
            .lock()
            .unwrap()
            .uncompress_compressed(frame)
            .map_err(|_| {
                warn!("pppos: dropping malformed VJ compressed frame");
                LinkError::BadPacket
            })
    }

    /// Process a received VJ-uncompressed TCP frame. Same contract as
    /// [`Pppos::vjc_comp`].
    pub fn vjc_uncomp(&self, frame: Chain) -> Result<Chain, LinkError> {
        if !self.vj_enabled.load(Ordering::Acquire) {
            debug!("pppos: dropping VJ uncompressed frame, VJ disabled");
            return Err(LinkError::VjDisabled);
        }
        self.vj
            .lock()
            .unwrap()
            .uncompress_uncompressed(frame)
            .map_err(|_| {
                warn!("pppos: dropping malformed VJ uncompressed frame");
                LinkError::BadPacket
            })
    }

    /// Install the negotiated inbound ACCM.
    pub fn set_in_accm(&self, accm: Accm) {
        self.rx.lock().unwrap().set_accm(accm);
    }

    /// Install the negotiated outbound ACCM.
    pub fn set_out_accm(&self, accm: Accm) {
        *self.out_accm.lock().unwrap() = accm;
    }

    /// Install the negotiated header-compression flags.
    pub fn set_tx_options(&self, opts: TxOptions) {
        self.tx.lock().unwrap().opts = opts;
    }

    pub fn stats(&self) -> LinkStats {
        LinkStats {
            rx: *self.rx.lock().unwrap().stats(),
            tx: self.tx.lock().unwrap().stats,
            in_discards: self.in_discards.load(Ordering::Relaxed),
        }
    }
}

fn idle(last_xmit: Option<Instant>) -> bool {
    last_xmit.map_or(true, |t| t.elapsed() >= MAX_IDLE_FLAG)
}

/// Walk the chain into the serial device. A short write drops the rest of
/// the frame, clears the idle timestamp so the next frame re-opens with a
/// flag, and counts the discard.
fn xmit<S: SerialTx>(tx: &mut TxSide<S>, chain: Chain) -> Result<(), LinkError> {
    let total = chain.total_len();
    for seg in chain.segments() {
        let buf = seg.as_slice();
        match tx.serial.sio_write(buf) {
            Ok(n) if n == buf.len() => {}
            Ok(n) => {
                warn!("pppos xmit: short write, {n} of {} octets", buf.len());
                tx.stats.io_errs += 1;
                tx.stats.discards += 1;
                tx.last_xmit = None;
                return Err(LinkError::ShortWrite);
            }
            Err(e) => {
                warn!("pppos xmit: serial write failed: {e}");
                tx.stats.io_errs += 1;
                tx.stats.discards += 1;
                tx.last_xmit = None;
                return Err(LinkError::Io(e.to_string()));
            }
        }
    }
    tx.stats.frames += 1;
    tx.stats.bytes += total as u64;
    Ok(())
}
