//! One seekable stream over an upload split into equal parts.
//!
//! [`MultipartReader`] presents parts `0..n` (all `part_size` long except
//! possibly the last) as a single `Read + Seek` of the declared total size.
//! Underlying part readers are forward-only streams obtained from a
//! [`PartOpener`]; at most `max_open_readers` of them stay open, and the
//! least recently used one is closed when another is needed. Any underlying
//! failure is latched: later calls fail with `PreviousError` until the
//! reader is rebuilt.
//!
//! Not safe for concurrent use; it is owned by the single task decoding the
//! upload.

mod store;

pub use store::{open_upload, StorePartOpener};

use std::collections::HashMap;
use std::fmt;
use std::io::{self, Read, Seek, SeekFrom};
use vidi_common::{Error, Result};

/// Default cap on simultaneously open part readers.
pub const MAX_OPEN_READERS: usize = 10;

/// Gaps up to this size are skipped by reading instead of reopening.
const FORWARD_SKIP_LIMIT: u64 = 64 * 1024;

/// Source of part streams.
pub trait PartOpener {
    /// Open part `num` positioned at byte `offset` within the part.
    fn open(&self, num: u32, offset: u64) -> Result<Box<dyn Read + Send>>;
}

struct OpenPart {
    reader: Box<dyn Read + Send>,
    /// Position within the part.
    offset: u64,
    last_access: u64,
}

/// Seekable reader over a multi-part upload.
pub struct MultipartReader<O> {
    opener: O,
    total: u64,
    part_size: u64,
    parts: u32,
    pos: u64,
    open: HashMap<u32, OpenPart>,
    max_open: usize,
    clock: u64,
    latched: Option<String>,
    closed: bool,
}

impl<O> fmt::Debug for MultipartReader<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultipartReader")
            .field("total", &self.total)
            .field("part_size", &self.part_size)
            .field("parts", &self.parts)
            .field("pos", &self.pos)
            .field("open", &self.open.len())
            .field("latched", &self.latched)
            .finish()
    }
}

impl<O: PartOpener> MultipartReader<O> {
    /// Reader over `total` bytes split into parts of `part_size`.
    pub fn new(opener: O, total: u64, part_size: u64) -> Result<Self> {
        if part_size == 0 && total > 0 {
            return Err(Error::invalid_input("part size must be positive"));
        }
        let parts = if total == 0 { 0 } else { total.div_ceil(part_size) };
        let parts = u32::try_from(parts)
            .map_err(|_| Error::out_of_bounds(format!("{parts} parts exceed the part number range")))?;

        Ok(Self {
            opener,
            total,
            part_size,
            parts,
            pos: 0,
            open: HashMap::new(),
            max_open: MAX_OPEN_READERS,
            clock: 0,
            latched: None,
            closed: false,
        })
    }

    pub fn with_max_open_readers(mut self, max_open: usize) -> Self {
        self.max_open = max_open.max(1);
        self
    }

    pub fn total_size(&self) -> u64 {
        self.total
    }

    pub fn part_count(&self) -> u32 {
        self.parts
    }

    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Number of part readers currently open.
    pub fn open_readers(&self) -> usize {
        self.open.len()
    }

    /// The part holding `pos`; the last part when `pos == total`.
    pub fn active_part(&self) -> u32 {
        if self.parts == 0 {
            return 0;
        }
        ((self.pos / self.part_size) as u32).min(self.parts - 1)
    }

    /// Release every open part reader. Idempotent.
    pub fn close(&mut self) {
        if !self.closed {
            tracing::trace!(open = self.open.len(), "Closing multipart reader");
        }
        self.open.clear();
        self.closed = true;
    }

    fn part_len(&self, num: u32) -> u64 {
        let start = u64::from(num) * self.part_size;
        self.part_size.min(self.total - start)
    }

    fn check_usable(&self) -> Result<()> {
        if self.closed {
            return Err(Error::invalid_input("multipart reader is closed"));
        }
        if let Some(msg) = &self.latched {
            return Err(Error::PreviousError(msg.clone()));
        }
        Ok(())
    }

    /// Remember the first failure and hand it back.
    fn latch(&mut self, err: Error) -> Error {
        tracing::debug!(error = %err, pos = self.pos, "Multipart reader failed");
        self.latched = Some(err.to_string());
        self.open.clear();
        err
    }

    /// Reader for `num` positioned at `offset` within the part.
    fn reader_at(&mut self, num: u32, offset: u64) -> Result<&mut OpenPart> {
        self.clock += 1;
        let now = self.clock;

        let reuse = match self.open.get(&num) {
            Some(part) if part.offset == offset => true,
            Some(part) if part.offset < offset && offset - part.offset <= FORWARD_SKIP_LIMIT => {
                true
            }
            Some(_) => {
                tracing::trace!(part = num, offset, "Reopening part reader");
                self.open.remove(&num);
                false
            }
            None => false,
        };

        if !reuse {
            if self.open.len() >= self.max_open {
                self.evict_lru();
            }
            let reader = self.opener.open(num, offset)?;
            self.open.insert(
                num,
                OpenPart {
                    reader,
                    offset,
                    last_access: now,
                },
            );
        }

        let part = self
            .open
            .get_mut(&num)
            .ok_or_else(|| Error::internal(format!("part {num} vanished from reader cache")))?;
        part.last_access = now;

        if part.offset < offset {
            let gap = offset - part.offset;
            let skipped = io::copy(&mut (&mut part.reader).take(gap), &mut io::sink())?;
            part.offset += skipped;
            if skipped < gap {
                return Err(Error::storage(format!(
                    "part {num} ended at {} while skipping to {offset}",
                    part.offset
                )));
            }
        }

        Ok(part)
    }

    fn evict_lru(&mut self) {
        let oldest = self
            .open
            .iter()
            .min_by_key(|(_, part)| part.last_access)
            .map(|(num, _)| *num);
        if let Some(num) = oldest {
            tracing::trace!(part = num, "Evicting least recently used part reader");
            self.open.remove(&num);
        }
    }

    fn read_inner(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;

        while filled < buf.len() && self.pos < self.total {
            let num = (self.pos / self.part_size) as u32;
            let within = self.pos % self.part_size;
            let available = self.part_len(num) - within;
            let want = (buf.len() - filled).min(available as usize);

            let part = self.reader_at(num, within)?;
            let n = part.reader.read(&mut buf[filled..filled + want])?;
            if n == 0 {
                return Err(Error::storage(format!(
                    "part {num} ended at {within}, expected {} bytes",
                    within + available
                )));
            }
            part.offset += n as u64;
            self.pos += n as u64;
            filled += n;
        }

        Ok(filled)
    }

    fn seek_inner(&mut self, target: SeekFrom) -> Result<u64> {
        let new_pos = match target {
            SeekFrom::Start(offset) => offset,
            SeekFrom::Current(delta) if delta >= 0 => self.pos.saturating_add(delta as u64),
            SeekFrom::Current(delta) => {
                return Err(Error::invalid_input(format!(
                    "backward relative seek by {delta} is not supported"
                )))
            }
            SeekFrom::End(delta) if delta <= 0 => {
                self.total.checked_sub(delta.unsigned_abs()).ok_or_else(|| {
                    Error::invalid_input(format!("seek to {delta} from end before start"))
                })?
            }
            SeekFrom::End(delta) => {
                return Err(Error::invalid_input(format!(
                    "seek past end by {delta} is not supported"
                )))
            }
        };

        if new_pos > self.total {
            return Err(Error::out_of_bounds(format!(
                "seek to {new_pos} beyond total size {}",
                self.total
            )));
        }
        self.pos = new_pos;
        Ok(new_pos)
    }
}

impl<O: PartOpener> Read for MultipartReader<O> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.check_usable()?;
        match self.read_inner(buf) {
            Ok(n) => Ok(n),
            Err(e) => Err(self.latch(e).into()),
        }
    }
}

impl<O: PartOpener> Seek for MultipartReader<O> {
    fn seek(&mut self, target: SeekFrom) -> io::Result<u64> {
        self.check_usable()?;
        // Invalid seeks are caller errors and do not poison the reader.
        Ok(self.seek_inner(target)?)
    }
}
