use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use crate::core::{ExperimentSettings, ExperimentState};
use crate::error::{Error, Result};
use crate::io::format;

/// Random-access decoder for trajectory files.
///
/// Decoding moves the underlying cursor, so `frame` takes `&mut self`; callers that want
/// to read concurrently open one reader each.
#[derive(Debug)]
pub struct TrajectoryReader<R = BufReader<File>> {
    source: R,
    settings: Arc<ExperimentSettings>,
    chunk_size: u64,
    frame_count: u64,
    buf: Vec<u8>,
}

impl TrajectoryReader<BufReader<File>> {
    /// Open a file written by `TrajectoryWriter`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(BufReader::new(file))
    }
}

impl<R: Read + Seek> TrajectoryReader<R> {
    /// Parse the header of `source` and size its frame table from the stream length.
    ///
    /// Errors:
    /// - `Error::Format` when the stream is shorter than the header or the header is corrupt.
    /// - `Error::Io` on read or seek failures.
    pub fn from_reader(mut source: R) -> Result<Self> {
        let len = source.seek(SeekFrom::End(0))?;
        if len < format::HEADER_SIZE {
            return Err(Error::Format(format!(
                "file holds {len} bytes, shorter than the {} byte header",
                format::HEADER_SIZE
            )));
        }
        source.seek(SeekFrom::Start(0))?;
        let mut header = [0u8; format::HEADER_SIZE as usize];
        source.read_exact(&mut header)?;
        let settings = Arc::new(format::read_header(&header)?);

        let chunk_size = format::chunk_size(settings.particle_count());
        let frame_count = format::frame_count(len, chunk_size);
        tracing::debug!(frame_count, chunk_size, "opened trajectory");

        Ok(Self {
            source,
            settings,
            chunk_size,
            frame_count,
            buf: Vec::new(),
        })
    }

    pub fn settings(&self) -> &ExperimentSettings {
        &self.settings
    }

    /// Byte length of one frame.
    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Number of complete frames in the file; a trailing partial frame is ignored.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Decode frame `index` with a single seek.
    ///
    /// Errors:
    /// - `Error::FrameIndex` unless `index < frame_count()`.
    /// - `Error::Io` on read failures.
    pub fn frame(&mut self, index: u64) -> Result<ExperimentState> {
        if index >= self.frame_count {
            return Err(Error::FrameIndex {
                index,
                frame_count: self.frame_count,
            });
        }
        // Sized on first use: a frame exists, so the header's particle counts are backed by
        // real file bytes.
        if self.buf.is_empty() {
            let chunk = usize::try_from(self.chunk_size).map_err(|_| {
                Error::Format(format!("frame size {} exceeds addressable memory", self.chunk_size))
            })?;
            self.buf = vec![0u8; chunk];
        }
        self.source
            .seek(SeekFrom::Start(format::frame_offset(index, self.chunk_size)))?;
        self.source.read_exact(&mut self.buf)?;
        format::read_frame(&self.buf, &self.settings)
    }

    /// Iterate over frames `start, start + stride, ...` in file order.
    pub fn frames(&mut self, start: u64, stride: u64) -> Frames<'_, R> {
        Frames {
            reader: self,
            next: start,
            stride: stride.max(1),
        }
    }

}

/// Iterator returned by [`TrajectoryReader::frames`].
#[derive(Debug)]
pub struct Frames<'a, R> {
    reader: &'a mut TrajectoryReader<R>,
    next: u64,
    stride: u64,
}

impl<R: Read + Seek> Iterator for Frames<'_, R> {
    type Item = Result<ExperimentState>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.reader.frame_count {
            return None;
        }
        let index = self.next;
        self.next = self.next.saturating_add(self.stride);
        Some(self.reader.frame(index))
    }
}

/// Open a trajectory file for random access.
pub fn open_trajectory(path: impl AsRef<Path>) -> Result<TrajectoryReader> {
    TrajectoryReader::open(path)
}
