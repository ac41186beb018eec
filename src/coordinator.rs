//! Pipeline coordinator
//!
//! Drives the three remote stages (extraction, transform, transfer) through
//! a run: init, streaming cycles, the drain protocol, best-effort close. One
//! logical thread of control: stages are awaited strictly sequentially, a
//! cycle never starts before the previous cycle's calls have all returned,
//! and unit order into and out of each stage is FIFO by construction.
//!
//! Entry-point contract for callers: a target host (resolved by the transport
//! crate that builds the stage clients), a readable input path and a
//! writable output path (wrapped in a [`UnitSource`] / [`UnitSink`] pair).

use crate::config::StageConfig;
use crate::error::{Error, Result};
use crate::io::{UnitSink, UnitSource};
use crate::stage::{DeviceClient, StageClient, UnitPayload, WorkUnit};

const STAGE_COUNT: usize = 3;

/// Phase of a pipeline run
///
/// Transitions are linear and one-directional: streaming, then each stage
/// drained in process order, then done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PipelineState {
    /// Steady-state cycles while input remains
    Streaming,
    /// Flushing the extraction stage
    DrainingExtract,
    /// Flushing the transform stage
    DrainingTransform,
    /// Flushing the transfer stage
    DrainingTransfer,
    /// Run complete
    Done,
}

impl PipelineState {
    fn draining(stage_index: usize) -> Self {
        match stage_index {
            0 => PipelineState::DrainingExtract,
            1 => PipelineState::DrainingTransform,
            _ => PipelineState::DrainingTransfer,
        }
    }
}

/// Explicit per-run mutable state, owned by the coordinator
///
/// Everything a cycle needs to know about the previous cycle lives here and
/// is passed by reference; no request object is mutated across cycles.
#[derive(Debug, Clone)]
pub struct RunState {
    /// Offset within the previous window up to which input was consumed
    pub consumed_boundary: usize,
    /// Cumulative bytes the extraction stage has genuinely consumed
    pub total_consumed: u64,
    /// Streaming cycles executed
    pub cycles: u64,
    /// Units delivered to the sink
    pub units_delivered: u64,
    /// Current phase
    pub state: PipelineState,
}

impl RunState {
    /// Fresh state at the start of a run
    pub fn new() -> Self {
        Self {
            consumed_boundary: 0,
            total_consumed: 0,
            cycles: 0,
            units_delivered: 0,
            state: PipelineState::Streaming,
        }
    }

    /// Advance the phase; transitions never go backwards
    pub fn enter(&mut self, next: PipelineState) {
        debug_assert!(next >= self.state, "pipeline state moved backwards");
        if next != self.state {
            tracing::info!(from = ?self.state, to = ?next, "pipeline phase change");
            self.state = next;
        }
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

/// Counters reported at the end of a successful run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Streaming cycles executed
    pub cycles: u64,
    /// Units delivered to the sink (frames or packet batches)
    pub units_delivered: u64,
    /// Cumulative bytes read from the input
    pub total_read: u64,
    /// Cumulative bytes consumed by the extraction stage
    pub total_consumed: u64,
}

/// Orchestrates one run across the device and the three pipeline stages
pub struct PipelineCoordinator<Src, Snk> {
    device: Box<dyn DeviceClient>,
    stages: [Box<dyn StageClient>; STAGE_COUNT],
    source: Src,
    sink: Snk,
    config: StageConfig,
    device_id: u32,
}

impl<Src: UnitSource, Snk: UnitSink> PipelineCoordinator<Src, Snk> {
    /// Assemble a coordinator; stages in process order
    pub fn new(
        device: Box<dyn DeviceClient>,
        extract: Box<dyn StageClient>,
        transform: Box<dyn StageClient>,
        transfer: Box<dyn StageClient>,
        source: Src,
        sink: Snk,
        config: StageConfig,
    ) -> Self {
        Self {
            device,
            stages: [extract, transform, transfer],
            source,
            sink,
            config,
            device_id: 0,
        }
    }

    /// Select a device index other than the default 0
    pub fn with_device_id(mut self, device_id: u32) -> Self {
        self.device_id = device_id;
        self
    }

    /// Execute the full run
    ///
    /// On any failure, every stage and the device still get a best-effort
    /// Close before the error is surfaced; Close failures are logged and not
    /// escalated.
    pub async fn run(&mut self) -> Result<RunSummary> {
        let result = self.run_inner().await;
        self.shutdown().await;
        result
    }

    async fn run_inner(&mut self) -> Result<RunSummary> {
        let handle = self.device.init(self.device_id).await?;
        tracing::info!(device = handle.0, "device context acquired");
        let config = self.config.clone().with_device(handle);

        let mut layout = None;
        for stage in &mut self.stages {
            let ctx = stage.init(&config).await?;
            tracing::debug!(stage = stage.name(), layout = ctx.layout.is_some(), "stage initialized");
            if layout.is_none() {
                layout = ctx.layout;
            }
        }
        if let Some(layout) = layout {
            self.source.bind_layout(layout);
            self.sink.bind_layout(layout);
        }

        let mut state = RunState::new();
        self.stream(&mut state).await?;
        self.drain(&mut state).await?;
        state.enter(PipelineState::Done);

        let summary = RunSummary {
            cycles: state.cycles,
            units_delivered: state.units_delivered,
            total_read: self.source.total_read(),
            total_consumed: state.total_consumed,
        };
        tracing::info!(
            cycles = summary.cycles,
            units = summary.units_delivered,
            read = summary.total_read,
            consumed = summary.total_consumed,
            "run complete"
        );
        Ok(summary)
    }

    /// Steady-state cycles until the source is finished
    async fn stream(&mut self, state: &mut RunState) -> Result<()> {
        loop {
            let read_before = self.source.total_read();
            let unit = match self.source.next_unit(state).await? {
                Some(unit) => unit,
                None => return Ok(()),
            };
            state.cycles += 1;
            let consumed_before = state.total_consumed;

            let reply = self.stages[0].process(unit).await?;
            if let Some(span) = reply.consumed {
                debug_assert!(span.unit_start <= span.unit_end, "consumption span inverted");
                state.consumed_boundary = span.unit_end;
                state.total_consumed = span.total_consumed;
            }
            if reply.status.needs_more_input {
                if state.total_consumed == consumed_before {
                    // A residual tail at end-of-input that never advances
                    // consumption can never form a unit; hand it to the drain
                    // phase instead of spinning.
                    if self.source.exhausted() {
                        tracing::info!(
                            residual = self.source.total_read() - state.total_consumed,
                            "input exhausted with residual"
                        );
                        return Ok(());
                    }
                    // No fresh bytes either: the window is at capacity and
                    // the identical contents would be resubmitted forever.
                    if self.source.total_read() == read_before {
                        return Err(Error::Processing {
                            stage: self.stages[0].name().to_string(),
                            reason: format!(
                                "no consumption progress on a full window \
                                 ({} bytes read, {} consumed); unit exceeds the window capacity",
                                read_before, consumed_before
                            ),
                        });
                    }
                }
                continue;
            }

            if let Some(payload) = self.forward_from(1, reply.unit).await? {
                self.sink.deliver(payload).await?;
                state.units_delivered += 1;
            }
        }
    }

    /// Flush each stage in process order
    ///
    /// While stage `k` drains, its flushed output travels through stages
    /// `k+1..` exactly as a normal unit would.
    async fn drain(&mut self, state: &mut RunState) -> Result<()> {
        for index in 0..STAGE_COUNT {
            state.enter(PipelineState::draining(index));
            tracing::info!(stage = self.stages[index].name(), "flushing stage");
            loop {
                let reply = self.stages[index].process(WorkUnit::flush_request()).await?;
                if reply.status.flush_complete {
                    break;
                }
                if reply.status.needs_more_input {
                    continue;
                }
                if let Some(payload) = self.forward_from(index + 1, reply.unit).await? {
                    self.sink.deliver(payload).await?;
                    state.units_delivered += 1;
                }
            }
        }
        Ok(())
    }

    /// Pass a unit through stages `from..`; `None` when a stage held it back
    async fn forward_from(&mut self, from: usize, mut unit: WorkUnit) -> Result<Option<UnitPayload>> {
        unit.flush = false;
        for index in from..STAGE_COUNT {
            let reply = self.stages[index].process(unit).await?;
            if reply.status.needs_more_input {
                return Ok(None);
            }
            unit = reply.unit;
            unit.flush = false;
        }
        Ok(Some(unit.payload))
    }

    /// Best-effort Close on every stage (reverse process order), then device
    async fn shutdown(&mut self) {
        for index in (0..STAGE_COUNT).rev() {
            if let Err(err) = self.stages[index].close().await {
                tracing::warn!(stage = self.stages[index].name(), %err, "stage close failed");
            }
        }
        if let Err(err) = self.device.close().await {
            tracing::warn!(%err, "device close failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_order_is_linear() {
        let mut state = RunState::new();
        assert_eq!(state.state, PipelineState::Streaming);
        state.enter(PipelineState::DrainingExtract);
        state.enter(PipelineState::DrainingTransform);
        state.enter(PipelineState::DrainingTransfer);
        state.enter(PipelineState::Done);
        assert_eq!(state.state, PipelineState::Done);
    }

    #[test]
    #[should_panic(expected = "pipeline state moved backwards")]
    #[cfg(debug_assertions)]
    fn test_backward_transition_asserts() {
        let mut state = RunState::new();
        state.enter(PipelineState::DrainingTransfer);
        state.enter(PipelineState::Streaming);
    }

    #[test]
    fn test_draining_states_by_index() {
        assert_eq!(PipelineState::draining(0), PipelineState::DrainingExtract);
        assert_eq!(PipelineState::draining(1), PipelineState::DrainingTransform);
        assert_eq!(PipelineState::draining(2), PipelineState::DrainingTransfer);
    }
}
