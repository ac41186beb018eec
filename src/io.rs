//! Unit sources and sinks at the local file boundary
//!
//! The coordinator is direction-agnostic: it pulls [`WorkUnit`]s from a
//! [`UnitSource`] and hands terminal payloads to a [`UnitSink`]. The decode
//! direction pairs a [`BitstreamSource`] with a [`FrameSink`]; the encode
//! direction pairs a [`FrameSource`] with a [`PacketSink`].

use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncWriteExt, BufReader};

use crate::coordinator::RunState;
use crate::error::{Error, Result};
use crate::planes::{read_planes, write_planes, PlaneLayout};
use crate::stage::{UnitPayload, WorkUnit};
use crate::window::ChunkReader;

/// Produces the work unit that opens each streaming cycle
#[async_trait]
pub trait UnitSource: Send {
    /// Receive the plane layout reported by stage Init, where relevant
    fn bind_layout(&mut self, _layout: PlaneLayout) {}

    /// Produce the next cycle's unit, or `None` when the input is finished
    ///
    /// `state` carries the previous cycle's consumption report; window-backed
    /// sources use it to decide how far to slide.
    async fn next_unit(&mut self, state: &RunState) -> Result<Option<WorkUnit>>;

    /// Whether the underlying input has reported end-of-input
    fn exhausted(&self) -> bool;

    /// Cumulative bytes read from the input
    fn total_read(&self) -> u64;
}

/// Consumes the payloads that fall out of the last stage
#[async_trait]
pub trait UnitSink: Send {
    /// Receive the plane layout reported by stage Init, where relevant
    fn bind_layout(&mut self, _layout: PlaneLayout) {}

    /// Persist one terminal payload
    async fn deliver(&mut self, payload: UnitPayload) -> Result<()>;
}

/// Decode-direction source: the sliding window over a compressed bitstream
pub struct BitstreamSource<R> {
    reader: ChunkReader<R>,
}

impl BitstreamSource<BufReader<File>> {
    /// Open `path` with the given window capacity
    pub async fn open(path: impl AsRef<Path>, capacity: usize) -> Result<Self> {
        let file = File::open(path).await?;
        Ok(Self::new(ChunkReader::new(BufReader::new(file), capacity)))
    }
}

impl<R: AsyncRead + Unpin + Send> BitstreamSource<R> {
    /// Wrap an already-constructed window reader
    pub fn new(reader: ChunkReader<R>) -> Self {
        Self { reader }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> UnitSource for BitstreamSource<R> {
    async fn next_unit(&mut self, state: &RunState) -> Result<Option<WorkUnit>> {
        self.reader.fill(state.consumed_boundary).await?;
        let window = self.reader.window();
        if window.is_empty() {
            return Ok(None);
        }
        // The pipeline has caught up with the reader and the source is dry.
        if self.reader.at_eof() && state.total_consumed >= self.reader.total_read() {
            return Ok(None);
        }
        Ok(Some(WorkUnit::new(UnitPayload::Bitstream {
            data: Bytes::copy_from_slice(window),
            total_read: self.reader.total_read(),
        })))
    }

    fn exhausted(&self) -> bool {
        self.reader.at_eof()
    }

    fn total_read(&self) -> u64 {
        self.reader.total_read()
    }
}

/// Encode-direction source: one raw frame per cycle, read plane by plane
///
/// Every fully-read frame is submitted; the run ends when a read finds clean
/// end-of-input at a frame boundary. End-of-input in the middle of a frame
/// is an error rather than a silently truncated upload.
pub struct FrameSource<R> {
    source: R,
    layout: Option<PlaneLayout>,
    total_read: u64,
    eof: bool,
}

impl FrameSource<BufReader<File>> {
    /// Open a raw multi-plane input file
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path).await?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: AsyncRead + Unpin + Send> FrameSource<R> {
    /// Wrap a readable raw-frame input
    pub fn new(source: R) -> Self {
        Self {
            source,
            layout: None,
            total_read: 0,
            eof: false,
        }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> UnitSource for FrameSource<R> {
    fn bind_layout(&mut self, layout: PlaneLayout) {
        self.layout = Some(layout);
    }

    async fn next_unit(&mut self, _state: &RunState) -> Result<Option<WorkUnit>> {
        if self.eof {
            return Ok(None);
        }
        let layout = self
            .layout
            .ok_or_else(|| Error::InvalidLayout("frame source has no plane layout bound".into()))?;
        match read_planes(&mut self.source, &layout).await? {
            Some(frame) => {
                self.total_read += layout.frame_len() as u64;
                Ok(Some(WorkUnit::new(UnitPayload::Planes(frame))))
            }
            None => {
                self.eof = true;
                Ok(None)
            }
        }
    }

    fn exhausted(&self) -> bool {
        self.eof
    }

    fn total_read(&self) -> u64 {
        self.total_read
    }
}

/// Decode-direction sink: strided plane writer over the raw output file
///
/// Each delivered frame is written in plane order and made durable with
/// `sync_data` before the next cycle reuses its buffers, so output frame
/// order always matches delivery order.
pub struct FrameSink {
    file: File,
    layout: Option<PlaneLayout>,
}

impl FrameSink {
    /// Create (or truncate) the raw output file
    pub async fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::create(path).await?;
        Ok(Self { file, layout: None })
    }
}

#[async_trait]
impl UnitSink for FrameSink {
    fn bind_layout(&mut self, layout: PlaneLayout) {
        self.layout = Some(layout);
    }

    async fn deliver(&mut self, payload: UnitPayload) -> Result<()> {
        match payload {
            UnitPayload::Planes(frame) => {
                let layout = self.layout.ok_or_else(|| {
                    Error::InvalidLayout("frame sink has no plane layout bound".into())
                })?;
                write_planes(&mut self.file, &frame, &layout).await?;
                self.file.sync_data().await?;
                Ok(())
            }
            UnitPayload::Empty => Ok(()),
            other => Err(Error::Other(format!(
                "frame sink cannot deliver '{}' payload",
                other.kind()
            ))),
        }
    }
}

/// Encode-direction sink: appends encoded bitstream chunks
pub struct PacketSink {
    file: File,
}

impl PacketSink {
    /// Create (or truncate) the encoded output file
    pub async fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::create(path).await?;
        Ok(Self { file })
    }
}

#[async_trait]
impl UnitSink for PacketSink {
    async fn deliver(&mut self, payload: UnitPayload) -> Result<()> {
        match payload {
            UnitPayload::Packets(packets) => {
                if packets.is_empty() {
                    return Ok(());
                }
                for packet in &packets {
                    self.file.write_all(packet).await?;
                }
                self.file.sync_data().await?;
                Ok(())
            }
            UnitPayload::Empty => Ok(()),
            other => Err(Error::Other(format!(
                "packet sink cannot deliver '{}' payload",
                other.kind()
            ))),
        }
    }
}
