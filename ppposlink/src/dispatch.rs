//! Delivery seam between the decoder and the upper PPP layer.
//!
//! A completed inbound frame is a segment chain starting with the
//! two-octet protocol identifier. Where it goes next depends on the build:
//! a single-threaded stack handles it inline in the RX context (any
//! `Fn(Chain)` closure is a dispatcher), a multi-threaded stack hands it to
//! [`QueueDispatcher`] so `input` returns without touching upper PPP state.

use log::debug;
use ppposcore::chain::Chain;
use std::sync::mpsc::{sync_channel, SyncSender};
use std::thread::JoinHandle;

/// The frame could not be delivered and was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchError;

/// Receives completed inbound frames.
pub trait Dispatcher: Send + Sync + 'static {
    fn dispatch(&self, frame: Chain) -> Result<(), DispatchError>;
}

impl<F: Fn(Chain) + Send + Sync + 'static> Dispatcher for F {
    fn dispatch(&self, frame: Chain) -> Result<(), DispatchError> {
        self(frame);
        Ok(())
    }
}

/// Marshals frames onto a worker thread over a bounded queue.
pub struct QueueDispatcher {
    tx: SyncSender<Chain>,
}

impl QueueDispatcher {
    /// Spawn the dispatch worker. The worker runs `handler` for each frame
    /// and exits once every clone of the dispatcher has dropped.
    pub fn spawn<F>(depth: usize, mut handler: F) -> (Self, JoinHandle<()>)
    where
        F: FnMut(Chain) + Send + 'static,
    {
        let (tx, rx) = sync_channel(depth);
        let handle = std::thread::spawn(move || {
            while let Ok(frame) = rx.recv() {
                handler(frame);
            }
        });
        (Self { tx }, handle)
    }
}

impl Dispatcher for QueueDispatcher {
    fn dispatch(&self, frame: Chain) -> Result<(), DispatchError> {
        // Non-blocking: the RX context must never wait on the upper layer.
        // A full queue or a dead worker means the frame is dropped.
        self.tx.try_send(frame).map_err(|e| {
            debug!("dispatch queue refused a frame: {e:?}");
            DispatchError
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ppposcore::chain::SegmentPool;
    use std::sync::mpsc::channel;
    use std::sync::{Arc, Mutex};

    fn frame(bytes: &[u8]) -> Chain {
        let pool = SegmentPool::new(4);
        Chain::from_slice(&pool, bytes).unwrap()
    }

    #[test]
    fn closures_dispatch_inline() {
        let collected = Arc::new(Mutex::new(Vec::new()));
        let sink = collected.clone();
        let dispatcher = move |chain: Chain| sink.lock().unwrap().push(chain.to_vec());
        dispatcher.dispatch(frame(&[0x00, 0x21, 0x01])).unwrap();
        assert_eq!(*collected.lock().unwrap(), [vec![0x00, 0x21, 0x01]]);
    }

    #[test]
    fn queue_dispatcher_delivers_on_worker_thread() {
        let (out_tx, out_rx) = channel();
        let (dispatcher, handle) = QueueDispatcher::spawn(16, move |chain: Chain| {
            out_tx.send(chain.to_vec()).unwrap();
        });
        dispatcher.dispatch(frame(&[0x00, 0x21, 0xaa])).unwrap();
        dispatcher.dispatch(frame(&[0xc0, 0x21])).unwrap();
        assert_eq!(out_rx.recv().unwrap(), [0x00, 0x21, 0xaa]);
        assert_eq!(out_rx.recv().unwrap(), [0xc0, 0x21]);
        drop(dispatcher);
        handle.join().unwrap();
    }

    #[test]
    fn full_queue_drops_instead_of_blocking() {
        let (gate_tx, gate_rx) = channel::<()>();
        let (dispatcher, handle) = QueueDispatcher::spawn(1, move |_chain: Chain| {
            // hold the worker so the queue stays full
            let _ = gate_rx.recv();
        });
        // The worker takes at most one frame before blocking on the gate,
        // so the single queue slot must refuse a frame within a few sends.
        let mut refused = false;
        for i in 0..10u8 {
            if dispatcher.dispatch(frame(&[i])).is_err() {
                refused = true;
                break;
            }
        }
        assert!(refused);
        drop(gate_tx);
        drop(dispatcher);
        handle.join().unwrap();
    }
}
