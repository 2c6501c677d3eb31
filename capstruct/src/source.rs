//! Types related to source files.

use std::fmt;
use std::ops::Range;

/// File id, as handed out by `codespan_reporting::files::SimpleFiles`.
pub type FileId = usize;

/// Byte offsets into source files.
pub type BytePos = u32;

/// Byte ranges in source files.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct ByteRange {
    file_id: FileId,
    start: BytePos,
    end: BytePos,
}

impl fmt::Debug for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByteRange({}, {}..{})", self.file_id, self.start, self.end)
    }
}

impl ByteRange {
    pub const fn new(file_id: FileId, start: BytePos, end: BytePos) -> ByteRange {
        ByteRange {
            file_id,
            start,
            end,
        }
    }

    pub const fn file_id(&self) -> FileId {
        self.file_id
    }

    pub const fn start(&self) -> BytePos {
        self.start
    }

    pub const fn end(&self) -> BytePos {
        self.end
    }

    /// The smallest range covering both `self` and `other`.
    pub fn merge(self, other: ByteRange) -> ByteRange {
        debug_assert_eq!(self.file_id, other.file_id);
        ByteRange::new(
            self.file_id,
            self.start.min(other.start),
            self.end.max(other.end),
        )
    }
}

impl From<ByteRange> for Range<usize> {
    fn from(range: ByteRange) -> Range<usize> {
        (range.start as usize)..(range.end as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_covers_both() {
        let a = ByteRange::new(0, 4, 8);
        let b = ByteRange::new(0, 2, 6);
        assert_eq!(Range::<usize>::from(a.merge(b)), 2..8);
    }
}
