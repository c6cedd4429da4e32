use crate::{CommandFrame, Position, Result};
use parking_lot::{Mutex, MutexGuard};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Where halt frames are delivered.
#[derive(Clone, Debug)]
pub(crate) enum HaltSink {
    File(PathBuf),
    Memory(Arc<Mutex<Vec<CommandFrame>>>),
}

/// Last commanded state, shared between a link and its halt handles.
#[derive(Clone, Copy, Debug)]
pub(crate) struct LinkState {
    pub position: Position,
    pub gripper_position: f64,
}

/// Cloneable emergency-halt trigger.
///
/// Triggering never waits on an ack: it flips the shared flag and writes a
/// halt frame at the last known position, so it can be used while another
/// thread is blocked inside `send_and_wait`. Frame writes from the link and
/// from the handle share one lock, and a link checks the flag under it, so
/// no move frame can land after a halt frame.
#[derive(Clone, Debug)]
pub struct HaltHandle {
    flag: Arc<AtomicBool>,
    seq: Arc<AtomicU64>,
    state: Arc<Mutex<LinkState>>,
    writer: Arc<Mutex<()>>,
    sink: HaltSink,
}

impl HaltHandle {
    pub(crate) fn new(seq: Arc<AtomicU64>, state: Arc<Mutex<LinkState>>, sink: HaltSink) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            seq,
            state,
            writer: Arc::new(Mutex::new(())),
            sink,
        }
    }

    pub fn is_halted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Held for the whole check-and-write of any frame.
    pub(crate) fn write_lock(&self) -> MutexGuard<'_, ()> {
        self.writer.lock()
    }

    /// Raise the halt flag and emit a halt frame.
    pub fn trigger(&self) -> Result<()> {
        self.flag.store(true, Ordering::SeqCst);
        let _writing = self.write_lock();
        let LinkState {
            position,
            gripper_position,
        } = *self.state.lock();
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let frame = CommandFrame::halt(position, gripper_position, seq);
        warn!(%position, seq, "emergency halt issued");
        match &self.sink {
            HaltSink::File(path) => crate::handshake::write_frame(path, &frame, "halt"),
            HaltSink::Memory(frames) => {
                frames.lock().push(frame);
                Ok(())
            }
        }
    }

    /// Clear the halt flag so that new moves are accepted again.
    pub fn resume(&self) {
        if self.flag.swap(false, Ordering::SeqCst) {
            tracing::info!("emergency halt cleared");
        }
    }
}
