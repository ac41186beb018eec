//! Strided plane I/O
//!
//! Frames cross the transfer boundary as three separate planes (luma plus two
//! chroma planes) whose rows are pitched at the device's stride, which may
//! exceed the logical row width. The writer and reader here copy exactly
//! `width` bytes per row and skip the padding, so the on-disk representation
//! is always tightly packed regardless of device alignment.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};

/// Number of planes in the supported pixel formats
pub const PLANE_COUNT: usize = 3;

/// Geometry of a single plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaneSpec {
    /// Logical row width in bytes
    pub width: usize,
    /// Number of rows
    pub height: usize,
    /// Row pitch in bytes, `>= width`
    pub stride: usize,
}

impl PlaneSpec {
    fn validate(&self, index: usize) -> Result<()> {
        if self.stride < self.width {
            return Err(Error::InvalidLayout(format!(
                "plane {}: stride {} < width {}",
                index, self.stride, self.width
            )));
        }
        Ok(())
    }

    /// Bytes occupied by this plane in a stride-pitched buffer
    pub fn buffer_len(&self) -> usize {
        self.stride * self.height
    }

    /// Bytes of payload (padding excluded)
    pub fn payload_len(&self) -> usize {
        self.width * self.height
    }
}

/// Per-plane geometry for a 3-plane frame
///
/// Returned by the transfer stage's Init response and never mutated
/// afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaneLayout {
    /// Plane geometry, luma first
    pub planes: [PlaneSpec; PLANE_COUNT],
}

impl PlaneLayout {
    /// Build a layout from explicit per-plane specs, validating strides
    pub fn new(planes: [PlaneSpec; PLANE_COUNT]) -> Result<Self> {
        for (i, plane) in planes.iter().enumerate() {
            plane.validate(i)?;
        }
        Ok(Self { planes })
    }

    /// 4:2:0 layout: chroma planes are half the luma width and height
    ///
    /// `strides` come from the device (its alignment requirements), the
    /// logical widths from the frame resolution.
    pub fn yuv420(width: usize, height: usize, strides: [usize; PLANE_COUNT]) -> Result<Self> {
        Self::new([
            PlaneSpec {
                width,
                height,
                stride: strides[0],
            },
            PlaneSpec {
                width: width / 2,
                height: height / 2,
                stride: strides[1],
            },
            PlaneSpec {
                width: width / 2,
                height: height / 2,
                stride: strides[2],
            },
        ])
    }

    /// 4:2:0 layout with no padding (stride == width on every plane)
    pub fn yuv420_packed(width: usize, height: usize) -> Result<Self> {
        Self::yuv420(width, height, [width, width / 2, width / 2])
    }

    /// Total payload bytes of one frame (padding excluded)
    pub fn frame_len(&self) -> usize {
        self.planes.iter().map(|p| p.payload_len()).sum()
    }
}

/// Host-side pixel data for one frame, one stride-pitched buffer per plane
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramePlanes {
    /// Plane buffers, luma first, each `stride * height` bytes
    pub planes: [Vec<u8>; PLANE_COUNT],
}

impl FramePlanes {
    /// Allocate zeroed plane buffers matching `layout`
    pub fn zeroed(layout: &PlaneLayout) -> Self {
        Self {
            planes: [
                vec![0u8; layout.planes[0].buffer_len()],
                vec![0u8; layout.planes[1].buffer_len()],
                vec![0u8; layout.planes[2].buffer_len()],
            ],
        }
    }

    fn check_against(&self, layout: &PlaneLayout) -> Result<()> {
        for (i, (buf, spec)) in self.planes.iter().zip(layout.planes.iter()).enumerate() {
            if buf.len() < spec.buffer_len() {
                return Err(Error::InvalidLayout(format!(
                    "plane {}: buffer {} bytes, layout needs {}",
                    i,
                    buf.len(),
                    spec.buffer_len()
                )));
            }
        }
        Ok(())
    }
}

/// Write one frame to `sink`, row by row, stripping stride padding
///
/// Each row writes exactly `width` bytes; partial writes from the sink are
/// retried until the row is fully transferred. Rows are emitted plane 0
/// through plane 2 in input order, so output byte order matches frame order.
pub async fn write_planes<W>(sink: &mut W, frame: &FramePlanes, layout: &PlaneLayout) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    frame.check_against(layout)?;
    for (buf, spec) in frame.planes.iter().zip(layout.planes.iter()) {
        let mut start = 0;
        for _ in 0..spec.height {
            let row = &buf[start..start + spec.width];
            let mut wrote = 0;
            while wrote < spec.width {
                let n = sink.write(&row[wrote..]).await?;
                if n == 0 {
                    return Err(Error::Io(std::io::Error::new(
                        std::io::ErrorKind::WriteZero,
                        "sink accepted zero bytes mid-row",
                    )));
                }
                wrote += n;
            }
            start += spec.stride;
        }
    }
    Ok(())
}

/// Read one frame from `source` into stride-pitched plane buffers
///
/// The mirror of [`write_planes`] for the encode direction: each row reads
/// `width` packed bytes from the source into the head of a `stride`-pitched
/// row. Returns `Ok(None)` on clean end-of-input at a frame boundary; EOF in
/// the middle of a frame is an `UnexpectedEof` I/O error.
pub async fn read_planes<R>(source: &mut R, layout: &PlaneLayout) -> Result<Option<FramePlanes>>
where
    R: AsyncRead + Unpin,
{
    let mut frame = FramePlanes::zeroed(layout);
    let mut any_read = false;
    for (buf, spec) in frame.planes.iter_mut().zip(layout.planes.iter()) {
        let mut start = 0;
        for _ in 0..spec.height {
            let row = &mut buf[start..start + spec.width];
            match read_full_row(source, row).await? {
                RowRead::Full => any_read = true,
                RowRead::CleanEof if !any_read => return Ok(None),
                RowRead::CleanEof => {
                    return Err(Error::Io(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "input ended mid-frame",
                    )))
                }
            }
            start += spec.stride;
        }
    }
    Ok(Some(frame))
}

enum RowRead {
    Full,
    CleanEof,
}

async fn read_full_row<R>(source: &mut R, row: &mut [u8]) -> Result<RowRead>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < row.len() {
        let n = source.read(&mut row[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(RowRead::CleanEof);
            }
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "input ended mid-row",
            )));
        }
        filled += n;
    }
    Ok(RowRead::Full)
}
