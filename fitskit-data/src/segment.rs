//! Row ranges of binary tables.

use serde::{Deserialize, Serialize};

use crate::error::{FitsError, FitsResult};

/// Inclusive range of 0-based rows.
///
/// `back` may be [`Segment::TO_END`], which stands for the last row of the table as it exists
/// when the segment is used. Such a segment has to be resolved against the live row count
/// before its size means anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Segment {
    pub front: i64,
    pub back: i64,
}

impl Segment {
    /// Sentinel `back` no concrete segment can have, empty ones included.
    pub const TO_END: i64 = i64::MIN;

    pub fn new(front: i64, back: i64) -> Self {
        Self { front, back }
    }

    pub fn from_size(front: i64, size: i64) -> Self {
        Self::new(front, front + size - 1)
    }

    /// `[0, row_count - 1]`, to be built from a freshly queried row count.
    pub fn whole(row_count: usize) -> Self {
        Self::from_size(0, row_count as i64)
    }

    /// From `front` to the end of the table.
    pub fn to_end(front: i64) -> Self {
        Self::new(front, Self::TO_END)
    }

    pub fn is_to_end(&self) -> bool {
        self.back == Self::TO_END
    }

    /// Number of rows of a resolved segment, 0 for an unresolved one.
    pub fn size(&self) -> i64 {
        if self.is_to_end() {
            return 0;
        }
        self.back.saturating_sub(self.front).saturating_add(1).max(0)
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn contains(&self, row: i64) -> bool {
        row >= self.front && row <= self.back
    }

    pub fn overlaps(&self, other: &Segment) -> bool {
        !self.is_empty() && !other.is_empty() && self.front <= other.back && other.front <= self.back
    }

    pub fn shifted(&self, offset: i64) -> Self {
        if self.is_to_end() {
            return Self::to_end(self.front + offset);
        }
        Self::new(self.front + offset, self.back + offset)
    }

    /// Replace [`Segment::TO_END`] and check the segment against the live row count.
    ///
    /// # Errors
    /// Returns [`FitsError::OutOfBounds`] if a bound lies outside `[0, row_count - 1]`.
    pub fn resolve(&self, row_count: usize) -> FitsResult<Segment> {
        let last = row_count as i64 - 1;
        let resolved = if self.is_to_end() {
            Segment::new(self.front, last)
        } else {
            *self
        };
        if resolved.front < 0 || resolved.front > last + 1 {
            return Err(FitsError::out_of_bounds("Front row", resolved.front, 0, last));
        }
        if resolved.back < resolved.front - 1 || resolved.back > last {
            return Err(FitsError::out_of_bounds("Back row", resolved.back, resolved.front - 1, last));
        }
        Ok(resolved)
    }

    /// Consecutive sub-segments of at most `max_size` rows.
    pub fn chunks(&self, max_size: usize) -> SegmentChunks {
        SegmentChunks {
            next_front: self.front,
            back: self.back,
            max_size: max_size.max(1) as i64,
        }
    }
}

/// Iterator returned by [`Segment::chunks`].
#[derive(Debug, Clone)]
pub struct SegmentChunks {
    next_front: i64,
    back: i64,
    max_size: i64,
}

impl Iterator for SegmentChunks {
    type Item = Segment;

    fn next(&mut self) -> Option<Segment> {
        if self.next_front > self.back {
            return None;
        }
        let chunk = Segment::new(self.next_front, self.back.min(self.next_front + self.max_size - 1));
        self.next_front = chunk.back + 1;
        Some(chunk)
    }
}

/// A file row range paired with the first row of an in-memory column.
///
/// Several partial reads can be concatenated into a single column by shifting `memory_front`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileMemSegments {
    pub file: Segment,
    pub memory_front: i64,
}

impl FileMemSegments {
    pub fn new(file: Segment, memory_front: i64) -> Self {
        Self { file, memory_front }
    }

    /// Map memory row 0 to `file_front`, through the end of the memory or of the file.
    pub fn from_file_front(file_front: i64) -> Self {
        Self::new(Segment::to_end(file_front), 0)
    }

    /// Compute the concrete file and memory segments.
    ///
    /// `file_back` replaces a [`Segment::TO_END`] file back. The memory segment starts at
    /// `memory_front`, has the size of the file segment and must end before `memory_back`.
    pub fn resolve(&self, file_back: i64, memory_back: i64) -> FitsResult<(Segment, Segment)> {
        let file = if self.file.is_to_end() {
            Segment::new(self.file.front, file_back)
        } else {
            self.file
        };
        if file.front < 0 {
            return Err(FitsError::out_of_bounds("Front row", file.front, 0, i64::MAX));
        }
        if file.back < file.front - 1 {
            return Err(FitsError::out_of_bounds(
                "Back row",
                file.back,
                file.front - 1,
                i64::MAX,
            ));
        }
        let memory = Segment::from_size(self.memory_front, file.size());
        if memory.front < 0 || memory.back > memory_back {
            return Err(FitsError::out_of_bounds(
                "Memory row",
                if memory.front < 0 { memory.front } else { memory.back },
                0,
                memory_back,
            ));
        }
        Ok((file, memory))
    }
}

impl From<Segment> for FileMemSegments {
    fn from(file: Segment) -> Self {
        Self::new(file, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_arithmetic() {
        let segment = Segment::new(3, 7);
        assert_eq!(segment.size(), 5);
        assert_eq!(Segment::from_size(3, 5), segment);
        assert!(segment.contains(3) && segment.contains(7));
        assert!(!segment.contains(8));
        assert!(segment.overlaps(&Segment::new(7, 9)));
        assert!(!segment.overlaps(&Segment::new(8, 9)));
        assert_eq!(segment.shifted(-3), Segment::new(0, 4));
        assert!(Segment::whole(0).is_empty());
        assert_eq!(Segment::whole(10), Segment::new(0, 9));
    }

    #[test]
    fn to_end_resolves_against_live_row_count() {
        let segment = Segment::to_end(2);
        assert_eq!(segment.resolve(10).unwrap(), Segment::new(2, 9));
        assert_eq!(segment.resolve(20).unwrap(), Segment::new(2, 19));
        assert!(segment.resolve(2).unwrap().is_empty());
        assert_eq!(segment.shifted(3), Segment::to_end(5));
    }

    #[test]
    fn empty_segments_are_not_to_end() {
        for empty in [Segment::whole(0), Segment::from_size(0, 0), Segment::new(0, -1)] {
            assert!(!empty.is_to_end());
            assert_eq!(empty.resolve(6).unwrap().size(), 0);
        }
        assert!(Segment::to_end(0).is_to_end());
        assert_eq!(Segment::to_end(0).resolve(6).unwrap().size(), 6);
    }

    #[test]
    fn resolve_rejects_out_of_range_rows() {
        assert!(Segment::new(0, 10).resolve(10).is_err());
        assert!(Segment::new(-2, 3).resolve(10).is_err());
        assert!(matches!(
            Segment::new(5, 2).resolve(10),
            Err(FitsError::OutOfBounds { value: 2, .. })
        ));
    }

    #[test]
    fn chunks_cover_segment_once() {
        let chunks = Segment::new(5, 16).chunks(5).collect::<Vec<_>>();
        assert_eq!(
            chunks,
            vec![Segment::new(5, 9), Segment::new(10, 14), Segment::new(15, 16)]
        );
        assert_eq!(Segment::whole(0).chunks(5).count(), 0);
        assert_eq!(Segment::new(0, 3).chunks(0).count(), 4);
    }

    #[test]
    fn file_mem_segments_resolution() {
        let segments = FileMemSegments::new(Segment::new(10, 14), 3);
        let (file, memory) = segments.resolve(99, 9).unwrap();
        assert_eq!(file, Segment::new(10, 14));
        assert_eq!(memory, Segment::new(3, 7));
        assert!(segments.resolve(99, 6).is_err());

        let (file, memory) = FileMemSegments::from_file_front(4).resolve(8, 9).unwrap();
        assert_eq!(file, Segment::new(4, 8));
        assert_eq!(memory, Segment::new(0, 4));

        assert!(matches!(
            FileMemSegments::new(Segment::new(5, 2), 0).resolve(99, 9),
            Err(FitsError::OutOfBounds { value: 2, .. })
        ));
        let (file, _) = FileMemSegments::new(Segment::new(5, 4), 0).resolve(99, 9).unwrap();
        assert!(file.is_empty());
    }
}
