//! Sorted sets of row keys and row positions.
//!
//! The server identifies rows by 64-bit row keys that are sparse but tend to
//! come in long runs, so a [`RowSequence`] stores half-open intervals rather
//! than individual keys.  The same type describes row positions (dense
//! indexes into a table state) in emitted updates.

use std::cmp::{max, min};
use std::fmt::{self, Debug, Display, Formatter};

/// Keys `begin..=end` move to `dest..=dest + (end - begin)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftRange {
    pub begin: u64,
    pub end: u64,
    pub dest: u64,
}

/// Immutable sorted set of `u64` values stored as disjoint, non-adjacent,
/// ascending half-open intervals.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct RowSequence {
    intervals: Vec<(u64, u64)>,
}

/// Collects keys and intervals in any order and builds a normalized
/// [`RowSequence`].
#[derive(Debug, Default)]
pub struct RowSequenceBuilder {
    intervals: Vec<(u64, u64)>,
}

impl RowSequenceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_key(&mut self, key: u64) {
        self.add_interval(key, key.saturating_add(1));
    }

    /// Adds the half-open interval `begin..end`.  Empty intervals are ignored.
    pub fn add_interval(&mut self, begin: u64, end: u64) {
        if begin >= end {
            return;
        }
        if let Some(last) = self.intervals.last_mut() {
            // Fast path for ascending input.
            if begin >= last.0 && begin <= last.1 {
                last.1 = max(last.1, end);
                return;
            }
        }
        self.intervals.push((begin, end));
    }

    pub fn build(mut self) -> RowSequence {
        if !self.intervals.is_sorted_by_key(|(begin, _)| *begin) {
            self.intervals.sort_unstable_by_key(|(begin, _)| *begin);
        }
        let mut intervals: Vec<(u64, u64)> = Vec::with_capacity(self.intervals.len());
        for (begin, end) in self.intervals {
            match intervals.last_mut() {
                Some(last) if begin <= last.1 => last.1 = max(last.1, end),
                _ => intervals.push((begin, end)),
            }
        }
        RowSequence { intervals }
    }
}

impl RowSequence {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The half-open interval `begin..end`.
    pub fn from_interval(begin: u64, end: u64) -> Self {
        let mut builder = RowSequenceBuilder::new();
        builder.add_interval(begin, end);
        builder.build()
    }

    /// Positions `0..len`.
    pub fn positions(len: u64) -> Self {
        Self::from_interval(0, len)
    }

    pub fn from_keys(keys: impl IntoIterator<Item = u64>) -> Self {
        let mut builder = RowSequenceBuilder::new();
        for key in keys {
            builder.add_key(key);
        }
        builder.build()
    }

    pub fn len(&self) -> u64 {
        self.intervals.iter().map(|(begin, end)| end - begin).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn first(&self) -> Option<u64> {
        self.intervals.first().map(|(begin, _)| *begin)
    }

    pub fn last(&self) -> Option<u64> {
        self.intervals.last().map(|(_, end)| end - 1)
    }

    /// Iterates over the half-open intervals in ascending order.
    pub fn intervals(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.intervals.iter().copied()
    }

    /// Iterates over the members in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.intervals.iter().flat_map(|(begin, end)| *begin..*end)
    }

    pub fn contains(&self, key: u64) -> bool {
        let i = self.intervals.partition_point(|(_, end)| *end <= key);
        self.intervals
            .get(i)
            .is_some_and(|(begin, _)| *begin <= key)
    }

    pub fn union(&self, other: &RowSequence) -> RowSequence {
        let mut builder = RowSequenceBuilder::new();
        for (begin, end) in self.intervals().chain(other.intervals()) {
            builder.add_interval(begin, end);
        }
        builder.build()
    }

    /// Members of `self` that are not in `other`.
    pub fn difference(&self, other: &RowSequence) -> RowSequence {
        let mut builder = RowSequenceBuilder::new();
        let mut j = 0;
        for &(begin, end) in &self.intervals {
            let mut start = begin;
            while j < other.intervals.len() && other.intervals[j].1 <= start {
                j += 1;
            }
            let mut k = j;
            while start < end {
                match other.intervals.get(k) {
                    Some(&(other_begin, other_end)) if other_begin < end => {
                        if other_begin > start {
                            builder.add_interval(start, other_begin);
                        }
                        start = max(start, other_end);
                        k += 1;
                    }
                    _ => {
                        builder.add_interval(start, end);
                        start = end;
                    }
                }
            }
        }
        builder.build()
    }

    pub fn intersects(&self, other: &RowSequence) -> bool {
        let (mut i, mut j) = (0, 0);
        while i < self.intervals.len() && j < other.intervals.len() {
            let (a_begin, a_end) = self.intervals[i];
            let (b_begin, b_end) = other.intervals[j];
            if max(a_begin, b_begin) < min(a_end, b_end) {
                return true;
            }
            if a_end <= b_end {
                i += 1;
            } else {
                j += 1;
            }
        }
        false
    }

    /// For each member of `subset`, its rank within `self`.
    ///
    /// Returns `None` if `subset` has a member that `self` does not contain.
    pub fn positions_of(&self, subset: &RowSequence) -> Option<RowSequence> {
        let mut builder = RowSequenceBuilder::new();
        let mut i = 0;
        let mut offset = 0;
        for &(begin, end) in &subset.intervals {
            while i < self.intervals.len() && self.intervals[i].1 <= begin {
                offset += self.intervals[i].1 - self.intervals[i].0;
                i += 1;
            }
            let &(self_begin, self_end) = self.intervals.get(i)?;
            if begin < self_begin || end > self_end {
                return None;
            }
            builder.add_interval(offset + begin - self_begin, offset + end - self_begin);
        }
        Some(builder.build())
    }

    /// Moves keys according to `shifts`, which must be sorted by `begin` and
    /// non-overlapping.
    ///
    /// Returns `None` if the shifts are malformed, overflow, or would change
    /// the relative order of keys or make two keys collide.
    pub fn apply_shifts(&self, shifts: &[ShiftRange]) -> Option<RowSequence> {
        if shifts.is_empty() {
            return Some(self.clone());
        }
        for (i, shift) in shifts.iter().enumerate() {
            if shift.begin > shift.end || shift.dest.checked_add(shift.end - shift.begin).is_none()
            {
                return None;
            }
            if i > 0 && shifts[i - 1].end >= shift.begin {
                return None;
            }
        }

        let mut moved: Vec<(u64, u64)> = Vec::with_capacity(self.intervals.len());
        let mut s = 0;
        for &(begin, end) in &self.intervals {
            let mut start = begin;
            while start < end {
                while s < shifts.len() && shifts[s].end < start {
                    s += 1;
                }
                match shifts.get(s) {
                    Some(shift) if shift.begin <= start => {
                        let stop = min(end, shift.end.saturating_add(1));
                        let new_begin = shift.dest + (start - shift.begin);
                        moved.push((new_begin, new_begin + (stop - start)));
                        start = stop;
                    }
                    Some(shift) if shift.begin < end => {
                        moved.push((start, shift.begin));
                        start = shift.begin;
                    }
                    _ => {
                        moved.push((start, end));
                        start = end;
                    }
                }
            }
        }

        if moved.windows(2).any(|pair| pair[1].0 < pair[0].1) {
            return None;
        }
        let mut builder = RowSequenceBuilder::new();
        for (begin, end) in moved {
            builder.add_interval(begin, end);
        }
        Some(builder.build())
    }
}

impl FromIterator<u64> for RowSequence {
    fn from_iter<T: IntoIterator<Item = u64>>(iter: T) -> Self {
        Self::from_keys(iter)
    }
}

impl Display for RowSequence {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, (begin, end)) in self.intervals.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            if end - begin == 1 {
                write!(f, "{begin}")?;
            } else {
                write!(f, "{begin}-{}", end - 1)?;
            }
        }
        f.write_str("]")
    }
}

impl Debug for RowSequence {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "RowSequence{self}")
    }
}
