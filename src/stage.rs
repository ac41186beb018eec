//! Stage client traits and the per-cycle work unit
//!
//! Every remote stage exposes the same three operations (Init, Process,
//! Close) over some transport. This crate treats the transport as opaque:
//! a transport crate implements [`StageClient`] (and [`DeviceClient`] for the
//! device endpoint), and the coordinator drives those trait objects. The
//! in-tree [`passthrough`](crate::stages::passthrough) implementations serve
//! tests and as a reference for transport authors.

use async_trait::async_trait;
use bytes::Bytes;

use crate::config::{DeviceHandle, StageConfig};
use crate::error::Result;
use crate::planes::{FramePlanes, PlaneLayout};

/// Per-call status a stage reports alongside its payload
///
/// The two fields are orthogonal: `needs_more_input` is steady-state
/// backpressure ("consumed input, nothing emittable yet"), `flush_complete`
/// only means anything during the drain phase ("no more buffered output").
/// Transports that fold both into a single continue flag must split it when
/// mapping onto this struct.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageStatus {
    /// Stage consumed input but has no emittable output this cycle
    pub needs_more_input: bool,
    /// Drain only: stage has emptied its internal buffers
    pub flush_complete: bool,
}

impl StageStatus {
    /// Steady-state "here is output" status
    pub fn ready() -> Self {
        Self::default()
    }

    /// Steady-state "need more data" status
    pub fn more_input() -> Self {
        Self {
            needs_more_input: true,
            flush_complete: false,
        }
    }

    /// Drain-phase "fully flushed" status
    pub fn flushed() -> Self {
        Self {
            needs_more_input: false,
            flush_complete: true,
        }
    }
}

/// Extraction stage's consumption report for one cycle
///
/// Offsets are relative to the window bytes submitted this cycle.
/// `total_consumed` is cumulative over the run and is what the coordinator
/// compares against the reader's cumulative byte count to detect catch-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumedSpan {
    /// Offset where the extracted unit begins, `<= unit_end`
    ///
    /// Diagnostic only (leading garbage skipped by the scanner shows up as a
    /// non-zero start); the window slides on `unit_end` alone.
    pub unit_start: usize,
    /// Offset one past the last consumed byte; bytes beyond carry over
    pub unit_end: usize,
    /// Cumulative bytes genuinely consumed since the run began
    pub total_consumed: u64,
}

/// Stage-specific payload carried by a work unit
///
/// Ownership transfers stage to stage; a unit is never held by two stages at
/// once. Buffer-backed variants use [`Bytes`] so forwarding is cheap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitPayload {
    /// No payload (drain requests, transfer confirmations)
    Empty,
    /// Raw window bytes for the extraction stage
    Bitstream {
        /// The current sliding window contents
        data: Bytes,
        /// Cumulative bytes read from the source so far
        total_read: u64,
    },
    /// Opaque handle to a frame resident on the remote device
    FrameRef(u64),
    /// Host-side plane data crossing the transfer boundary
    Planes(FramePlanes),
    /// Encoded bitstream chunks emitted by the transform stage
    Packets(Vec<Bytes>),
}

impl UnitPayload {
    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            UnitPayload::Empty => "empty",
            UnitPayload::Bitstream { .. } => "bitstream",
            UnitPayload::FrameRef(_) => "frame_ref",
            UnitPayload::Planes(_) => "planes",
            UnitPayload::Packets(_) => "packets",
        }
    }
}

/// The per-cycle unit handed stage to stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkUnit {
    /// Stage-specific payload
    pub payload: UnitPayload,
    /// Drain request flag; never set during streaming cycles
    pub flush: bool,
}

impl WorkUnit {
    /// A streaming unit carrying `payload`
    pub fn new(payload: UnitPayload) -> Self {
        Self {
            payload,
            flush: false,
        }
    }

    /// A drain request with no payload
    pub fn flush_request() -> Self {
        Self {
            payload: UnitPayload::Empty,
            flush: true,
        }
    }
}

/// A stage's answer to one Process call
#[derive(Debug, Clone)]
pub struct StageReply {
    /// Backpressure / drain status
    pub status: StageStatus,
    /// Consumption report; only the extraction stage sets this
    pub consumed: Option<ConsumedSpan>,
    /// The unit to forward downstream (or deliver, from the last stage)
    pub unit: WorkUnit,
}

impl StageReply {
    /// A reply that asks for more input and forwards nothing
    pub fn more_input() -> Self {
        Self {
            status: StageStatus::more_input(),
            consumed: None,
            unit: WorkUnit::new(UnitPayload::Empty),
        }
    }

    /// A reply carrying an output unit
    pub fn output(payload: UnitPayload) -> Self {
        Self {
            status: StageStatus::ready(),
            consumed: None,
            unit: WorkUnit::new(payload),
        }
    }

    /// A drain-phase reply confirming the stage is empty
    pub fn flushed() -> Self {
        Self {
            status: StageStatus::flushed(),
            consumed: None,
            unit: WorkUnit::new(UnitPayload::Empty),
        }
    }
}

/// Stage-specific context returned by Init
///
/// The transfer stage reports the device's plane layout here; other stages
/// usually return an empty context.
#[derive(Debug, Clone, Default)]
pub struct StageContext {
    /// Plane geometry the device will use for host transfers
    pub layout: Option<PlaneLayout>,
}

impl StageContext {
    /// Context carrying a plane layout
    pub fn with_layout(layout: PlaneLayout) -> Self {
        Self {
            layout: Some(layout),
        }
    }
}

/// Client for the device endpoint
///
/// Initialized first and closed last: its handle is the shared resource
/// context every other stage binds to.
#[async_trait]
pub trait DeviceClient: Send {
    /// Acquire the device and return its opaque handle
    async fn init(&mut self, device_id: u32) -> Result<DeviceHandle>;

    /// Release the device
    async fn close(&mut self) -> Result<()>;
}

/// Client for one pipeline stage endpoint
///
/// Implementations wrap one remote stage behind a synchronous
/// request/response transport. The coordinator guarantees `process` is never
/// called before `init` has returned successfully, and that `close` is
/// attempted exactly once per initialized stage at run end.
#[async_trait]
pub trait StageClient: Send {
    /// Stage name used in errors and logs
    fn name(&self) -> &str;

    /// Establish the stage against the shared device context
    async fn init(&mut self, config: &StageConfig) -> Result<StageContext>;

    /// Submit one work unit and wait for the stage's reply
    async fn process(&mut self, unit: WorkUnit) -> Result<StageReply>;

    /// Release the stage's remote resources
    async fn close(&mut self) -> Result<()>;
}
