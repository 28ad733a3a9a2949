//! File-like collaborator used by `tofile` / `fromfile`.

use crate::{
    exception::{ExcType, RunResult},
    interp::Interp,
};

/// The two calls the array makes on a file object.
///
/// Both may run user code, so they receive the interpreter handle.
pub trait FileLike {
    /// Reads up to `size` bytes; returning fewer signals end of data.
    fn read(&mut self, size: usize, interp: &mut Interp) -> RunResult<Vec<u8>>;

    /// Writes all of `data`.
    fn write(&mut self, data: &[u8], interp: &mut Interp) -> RunResult<()>;
}

/// In-memory binary stream with `io.BytesIO` positioning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryFile {
    buffer: Vec<u8>,
    position: usize,
}

impl MemoryFile {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A stream positioned at the start of `contents`.
    #[must_use]
    pub fn with_contents(contents: Vec<u8>) -> Self {
        Self {
            buffer: contents,
            position: 0,
        }
    }

    /// Everything written so far, regardless of position.
    #[must_use]
    pub fn getvalue(&self) -> &[u8] {
        &self.buffer
    }

    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Absolute seek; positions past the end are allowed and zero-fill on the next write.
    pub fn seek(&mut self, position: i64) -> RunResult<usize> {
        self.position = usize::try_from(position)
            .map_err(|_| ExcType::value_error(format!("Negative seek position {position}")))?;
        Ok(self.position)
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }
}

impl FileLike for MemoryFile {
    fn read(&mut self, size: usize, _interp: &mut Interp) -> RunResult<Vec<u8>> {
        let start = self.position.min(self.buffer.len());
        let end = start.saturating_add(size).min(self.buffer.len());
        self.position = self.position.max(end);
        Ok(self.buffer[start..end].to_vec())
    }

    fn write(&mut self, data: &[u8], _interp: &mut Interp) -> RunResult<()> {
        if data.is_empty() {
            return Ok(());
        }
        let end = self.position + data.len();
        if end > self.buffer.len() {
            self.buffer.resize(end, 0);
        }
        self.buffer[self.position..end].copy_from_slice(data);
        self.position = end;
        Ok(())
    }
}
