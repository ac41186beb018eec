//! Passthrough stage clients
//!
//! Minimal local implementations of the stage traits: the device hands out a
//! synthetic handle, the extraction stage consumes the whole window as one
//! unit, and the echo stage returns its input unchanged. Useful for testing
//! the coordinator infrastructure and as a reference for transport crates.

use async_trait::async_trait;

use crate::config::{DeviceHandle, StageConfig};
use crate::error::Result;
use crate::planes::PlaneLayout;
use crate::stage::{
    ConsumedSpan, DeviceClient, StageClient, StageContext, StageReply, StageStatus, UnitPayload,
    WorkUnit,
};

/// Device client that hands out a synthetic handle
#[derive(Debug, Default)]
pub struct PassthroughDevice;

#[async_trait]
impl DeviceClient for PassthroughDevice {
    async fn init(&mut self, device_id: u32) -> Result<DeviceHandle> {
        Ok(DeviceHandle(0x1000 + device_id as u64))
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Extraction stage that consumes the entire window as a single unit
///
/// Never reports `needs_more_input`, holds no buffered state (flush completes
/// immediately), and echoes non-bitstream payloads unchanged.
pub struct WholeWindowExtract {
    total_consumed: u64,
}

impl WholeWindowExtract {
    /// New extraction stage with a zeroed consumption counter
    pub fn new() -> Self {
        Self { total_consumed: 0 }
    }
}

impl Default for WholeWindowExtract {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StageClient for WholeWindowExtract {
    fn name(&self) -> &str {
        "whole-window-extract"
    }

    async fn init(&mut self, _config: &StageConfig) -> Result<StageContext> {
        Ok(StageContext::default())
    }

    async fn process(&mut self, unit: WorkUnit) -> Result<StageReply> {
        if unit.flush {
            return Ok(StageReply::flushed());
        }
        match unit.payload {
            UnitPayload::Bitstream { data, total_read } => {
                let len = data.len();
                self.total_consumed += len as u64;
                let mut reply = StageReply::output(UnitPayload::Bitstream { data, total_read });
                reply.consumed = Some(ConsumedSpan {
                    unit_start: 0,
                    unit_end: len,
                    total_consumed: self.total_consumed,
                });
                Ok(reply)
            }
            other => Ok(StageReply::output(other)),
        }
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Stage that returns its input unchanged
pub struct EchoStage {
    name: String,
    layout: Option<PlaneLayout>,
}

impl EchoStage {
    /// New echo stage identified by `name` in logs and errors
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            layout: None,
        }
    }

    /// Report `layout` from Init, the way a transfer stage reports its
    /// device line sizes
    pub fn with_layout(mut self, layout: PlaneLayout) -> Self {
        self.layout = Some(layout);
        self
    }
}

#[async_trait]
impl StageClient for EchoStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn init(&mut self, _config: &StageConfig) -> Result<StageContext> {
        Ok(match self.layout {
            Some(layout) => StageContext::with_layout(layout),
            None => StageContext::default(),
        })
    }

    async fn process(&mut self, unit: WorkUnit) -> Result<StageReply> {
        if unit.flush {
            return Ok(StageReply::flushed());
        }
        Ok(StageReply {
            status: StageStatus::ready(),
            consumed: None,
            unit,
        })
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
