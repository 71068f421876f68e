//! Host-to-core bulk I/O bus.
//!
//! The bus streams boot images, cartridges and save images into the core (downloads)
//! and reads regions back out (uploads) over a half-duplex handshake. It provides:
//! 1. **Queueing:** A FIFO of [`TransferRequest`]s; no priority and no cancellation.
//! 2. **Handshake:** `before_evaluation` presents a datum, `after_evaluation` samples
//!    the core's wait/ack lines and advances the session.
//! 3. **Backpressure:** A datum is re-presented for as long as the core holds wait.
//! 4. **Violations:** Contradictory or stuck handshake lines abort the session and the
//!    queue moves on.
//!
//! Between two queued transfers the enable lines are deasserted for one host edge so
//! the core can observe the end of each transfer.

/// Transfer requests and sources.
pub mod transfer;

pub use transfer::{BusWidth, CompletedUpload, Direction, TransferRequest, TransferSource};

use std::collections::VecDeque;

use tracing::{debug, info, warn};

use crate::common::{ProtocolViolation, SourceError};
use crate::model::{BusDrive, SimCore};

/// Session state of the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusState {
    /// No transfer in flight.
    Idle,
    /// A transfer is being clocked through the handshake.
    Active,
}

/// Running totals kept by the bus controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusCounters {
    /// Bytes accepted by the core.
    pub bytes_downloaded: u64,
    /// Bytes read back from the core.
    pub bytes_uploaded: u64,
    /// Transfers that ran to completion.
    pub transfers_completed: u64,
    /// Transfers aborted by a protocol violation.
    pub transfers_aborted: u64,
    /// Host edges on which the core held wait.
    pub wait_edges: u64,
}

/// Transient state bound to the transfer in flight.
#[derive(Debug)]
struct BusSession {
    request: TransferRequest,
    transferred: usize,
    stalled: u64,
    buffer: Vec<u8>,
}

impl BusSession {
    fn new(request: TransferRequest) -> Self {
        let buffer = match request.direction() {
            Direction::Download => Vec::new(),
            Direction::Upload => vec![0; request.len()],
        };
        Self {
            request,
            transferred: 0,
            stalled: 0,
            buffer,
        }
    }

    fn address(&self) -> u32 {
        self.request
            .base_address()
            .wrapping_add(self.transferred as u32)
    }

    fn current_datum(&self) -> u16 {
        let data = self.request.data();
        let lo = data.get(self.transferred).copied().unwrap_or(0);
        let hi = data.get(self.transferred + 1).copied().unwrap_or(0);
        u16::from_le_bytes([lo, hi])
    }

    fn drive(&self, width: BusWidth) -> BusDrive {
        let download = self.request.direction() == Direction::Download;
        let data_out = match width {
            BusWidth::Byte => self.current_datum() & 0x00FF,
            BusWidth::Word => self.current_datum(),
        };
        BusDrive {
            download,
            upload: !download,
            index: self.request.index(),
            address: self.address(),
            data_out: if download { data_out } else { 0 },
            write: download,
        }
    }

    fn remaining(&self) -> usize {
        self.request.len() - self.transferred
    }
}

/// Drives the download/upload handshake and owns the transfer queue.
#[derive(Debug)]
pub struct BusController {
    width: BusWidth,
    max_wait_edges: u64,
    queue: VecDeque<TransferRequest>,
    session: Option<BusSession>,
    release_pending: bool,
    uploads: Vec<CompletedUpload>,
    counters: BusCounters,
}

impl BusController {
    /// Creates an idle controller.
    ///
    /// `max_wait_edges` bounds how long the core may hold wait on one datum; zero
    /// disables the limit.
    pub fn new(width: BusWidth, max_wait_edges: u64) -> Self {
        Self {
            width,
            max_wait_edges,
            queue: VecDeque::new(),
            session: None,
            release_pending: false,
            uploads: Vec::new(),
            counters: BusCounters::default(),
        }
    }

    /// Builds a request from `source` and appends it to the queue.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the source cannot be read or is empty; the queue is
    /// left unchanged.
    pub fn queue_download(
        &mut self,
        source: impl Into<TransferSource>,
        index: u8,
        base_address: u32,
        is_upload: bool,
    ) -> Result<(), SourceError> {
        let direction = if is_upload {
            Direction::Upload
        } else {
            Direction::Download
        };
        let request = TransferRequest::new(source.into(), index, base_address, direction)
            .inspect_err(|e| warn!("rejected bus transfer: {e}"))?;
        info!(
            label = request.label(),
            len = request.len(),
            index,
            base_address,
            ?direction,
            "queued bus transfer"
        );
        self.queue.push_back(request);
        Ok(())
    }

    /// Appends an already-built request to the queue.
    pub fn enqueue(&mut self, request: TransferRequest) {
        self.queue.push_back(request);
    }

    /// Pre-evaluation hook, called on each host-clock rising edge.
    pub fn before_evaluation<C: SimCore + ?Sized>(&mut self, core: &mut C) {
        if self.session.is_none() {
            if self.release_pending {
                self.release_pending = false;
                core.drive_bus(&BusDrive::IDLE);
                return;
            }
            let Some(request) = self.queue.pop_front() else {
                return;
            };
            debug!(
                label = request.label(),
                index = request.index(),
                "bus session started"
            );
            self.session = Some(BusSession::new(request));
        }
        if let Some(session) = &self.session {
            core.drive_bus(&session.drive(self.width));
        }
    }

    /// Post-evaluation hook, called on each host-clock rising edge after `eval`.
    ///
    /// # Errors
    ///
    /// Returns the [`ProtocolViolation`] that aborted the session in flight, if any.
    /// The queue continues with the next request either way.
    pub fn after_evaluation<C: SimCore + ?Sized>(
        &mut self,
        core: &C,
    ) -> Result<(), ProtocolViolation> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        let status = core.bus_status();

        if status.wait && status.ack {
            let violation = ProtocolViolation::WaitWithAck {
                index: session.request.index(),
                address: session.address(),
            };
            self.abort(&violation);
            return Err(violation);
        }

        if status.wait {
            session.stalled += 1;
            self.counters.wait_edges += 1;
            if self.max_wait_edges > 0 && session.stalled > self.max_wait_edges {
                let violation = ProtocolViolation::StallLimit {
                    index: session.request.index(),
                    address: session.address(),
                    edges: session.stalled,
                };
                self.abort(&violation);
                return Err(violation);
            }
            return Ok(());
        }

        session.stalled = 0;
        let step = self.width.bytes().min(session.remaining());
        match session.request.direction() {
            Direction::Download => {
                self.counters.bytes_downloaded += step as u64;
            }
            Direction::Upload => {
                let bytes = status.data_in.to_le_bytes();
                let start = session.transferred;
                session.buffer[start..start + step].copy_from_slice(&bytes[..step]);
                self.counters.bytes_uploaded += step as u64;
            }
        }
        session.transferred += step;

        if session.remaining() == 0 {
            self.complete();
        }
        Ok(())
    }

    fn complete(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        self.release_pending = true;
        self.counters.transfers_completed += 1;
        info!(
            label = session.request.label(),
            bytes = session.transferred,
            "bus transfer complete"
        );
        if session.request.direction() == Direction::Upload {
            self.uploads.push(CompletedUpload {
                index: session.request.index(),
                base_address: session.request.base_address(),
                data: session.buffer,
            });
        }
    }

    fn abort(&mut self, violation: &ProtocolViolation) {
        if let Some(session) = self.session.take() {
            warn!(
                label = session.request.label(),
                transferred = session.transferred,
                "bus transfer aborted: {violation}"
            );
        }
        self.release_pending = true;
        self.counters.transfers_aborted += 1;
    }

    /// Session state.
    pub fn state(&self) -> BusState {
        if self.session.is_some() {
            BusState::Active
        } else {
            BusState::Idle
        }
    }

    /// No session in flight and nothing queued.
    pub fn is_idle(&self) -> bool {
        self.session.is_none() && self.queue.is_empty()
    }

    /// Requests waiting behind the active session.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// `(transferred, total)` bytes of the session in flight.
    pub fn active_progress(&self) -> Option<(usize, usize)> {
        self.session
            .as_ref()
            .map(|s| (s.transferred, s.request.len()))
    }

    /// Drains the uploads that finished since the last call.
    pub fn take_completed_uploads(&mut self) -> Vec<CompletedUpload> {
        std::mem::take(&mut self.uploads)
    }

    /// Running totals.
    pub fn counters(&self) -> BusCounters {
        self.counters
    }

    /// Configured datum width.
    pub fn width(&self) -> BusWidth {
        self.width
    }
}
