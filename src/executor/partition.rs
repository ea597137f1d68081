use std::ops::Range;

/// Contiguous half-open slice `[start, end)` of the global ascending record
/// sequence owned by one participant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    pub start: usize,
    pub end: usize,
}

impl Partition {
    /// Balanced contiguous split: the first `total % participants` ranks get one
    /// extra record. Concatenating partitions in rank order yields `[0, total)`.
    #[must_use]
    pub fn for_rank(total: usize, participants: usize, rank: usize) -> Self {
        if total == 0 || participants == 0 || rank >= participants {
            return Self { start: 0, end: 0 };
        }
        let base = total / participants;
        let remainder = total % participants;
        let extra = usize::from(rank < remainder);
        let start = rank * base + rank.min(remainder);
        Self {
            start,
            end: start + base + extra,
        }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    #[must_use]
    pub const fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}
