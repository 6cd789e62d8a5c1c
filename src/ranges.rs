use std::collections::BTreeMap;
use std::fmt;

/// An inclusive interval of code points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RuneRange {
    pub start: u32,
    pub end: u32,
}

impl RuneRange {
    pub fn new(start: u32, end: u32) -> Self {
        debug_assert!(start <= end, "inverted range {start:#x}-{end:#x}");
        Self { start, end }
    }

    pub fn from_chars(start: char, end: char) -> Self {
        Self::new(start as u32, end as u32)
    }

    pub fn contains(&self, point: u32) -> bool {
        self.start <= point && point <= self.end
    }

    fn touches(&self, other: &RuneRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

/// A union of inclusive rune ranges, kept sorted and minimal: no two ranges
/// overlap or sit next to each other.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RangeSet(Vec<RuneRange>);

impl RangeSet {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Build a set from arbitrary ranges, sorting and merging them.
    pub fn new(ranges: impl IntoIterator<Item = RuneRange>) -> Self {
        let mut ranges: Vec<_> = ranges.into_iter().collect();
        ranges.sort_unstable();
        let mut set = Self::empty();
        for range in ranges {
            set.push_coalesced(range);
        }
        set
    }

    pub fn from_char(c: char) -> Self {
        Self(vec![RuneRange::from_chars(c, c)])
    }

    pub fn ranges(&self) -> &[RuneRange] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains_char(&self, c: char) -> bool {
        let point = c as u32;
        let idx = self.0.partition_point(|r| r.end < point);
        self.0.get(idx).is_some_and(|r| r.contains(point))
    }

    /// True iff `range` shares at least one character with this set.
    pub fn contains(&self, range: RuneRange) -> bool {
        let idx = self.0.partition_point(|r| r.end < range.start);
        self.0.get(idx).is_some_and(|r| r.start <= range.end)
    }

    /// True iff any range of `self` shares a character with any range of `other`.
    pub fn overlaps(&self, other: &RangeSet) -> bool {
        let (mut i, mut j) = (0, 0);
        while i < self.0.len() && j < other.0.len() {
            let (a, b) = (&self.0[i], &other.0[j]);
            if a.touches(b) {
                return true;
            }
            if a.end < b.end {
                i += 1;
            } else {
                j += 1;
            }
        }
        false
    }

    /// The characters covered by both sets.
    ///
    /// Walks both lists once, always stepping past whichever current range
    /// ends first.
    pub fn intersect(&self, other: &RangeSet) -> RangeSet {
        let mut out = RangeSet::empty();
        let (mut i, mut j) = (0, 0);
        while i < self.0.len() && j < other.0.len() {
            let (a, b) = (self.0[i], other.0[j]);
            let start = a.start.max(b.start);
            let end = a.end.min(b.end);
            if start <= end {
                out.push_coalesced(RuneRange::new(start, end));
            }
            if a.end < b.end {
                i += 1;
            } else {
                j += 1;
            }
        }
        out
    }

    /// The characters covered by either set.
    pub fn sum(&self, other: &RangeSet) -> RangeSet {
        let mut out = RangeSet::empty();
        let (mut i, mut j) = (0, 0);
        while i < self.0.len() || j < other.0.len() {
            let next = match (self.0.get(i), other.0.get(j)) {
                (Some(a), Some(b)) if a.start <= b.start => {
                    i += 1;
                    *a
                }
                (Some(_), Some(b)) => {
                    j += 1;
                    *b
                }
                (Some(a), None) => {
                    i += 1;
                    *a
                }
                (None, Some(b)) => {
                    j += 1;
                    *b
                }
                (None, None) => break,
            };
            out.push_coalesced(next);
        }
        out
    }

    /// Append a range that starts no earlier than the last one, merging it
    /// into the tail when they overlap or are adjacent.
    fn push_coalesced(&mut self, range: RuneRange) {
        match self.0.last_mut() {
            Some(last) if range.start <= last.end.saturating_add(1) => {
                last.end = last.end.max(range.end);
            }
            _ => self.0.push(range),
        }
    }
}

impl From<RuneRange> for RangeSet {
    fn from(range: RuneRange) -> Self {
        Self(vec![range])
    }
}

/// Partition the union of `lists` into elementary ranges.
///
/// Every boundary of every input range survives, so each input range is
/// exactly a union of returned blocks, and each block is either inside or
/// outside each input range. Blocks are returned in ascending order.
pub fn split<'a>(lists: impl IntoIterator<Item = &'a RangeSet>) -> Vec<RuneRange> {
    // boundary point -> change in coverage depth; end bounds are exclusive
    let mut deltas: BTreeMap<u32, isize> = BTreeMap::new();
    for range in lists.into_iter().flat_map(|l| l.ranges()) {
        *deltas.entry(range.start).or_default() += 1;
        *deltas.entry(range.end + 1).or_default() -= 1;
    }

    let mut blocks = Vec::new();
    let mut depth = 0;
    let mut points = deltas.into_iter().peekable();
    while let Some((point, delta)) = points.next() {
        depth += delta;
        match points.peek() {
            Some(&(next, _)) if depth > 0 => blocks.push(RuneRange::new(point, next - 1)),
            _ => {}
        }
    }
    blocks
}

fn write_point(f: &mut fmt::Formatter<'_>, point: u32) -> fmt::Result {
    match char::from_u32(point) {
        Some(c @ ('\\' | ']' | '[' | '-' | '^')) => write!(f, "\\{c}"),
        Some(c) if c.is_ascii_graphic() || (c.is_alphanumeric() && !c.is_ascii()) => {
            write!(f, "{c}")
        }
        _ => write!(f, "\\u{{{point:x}}}"),
    }
}

impl fmt::Display for RuneRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_point(f, self.start)?;
        if self.end != self.start {
            write!(f, "-")?;
            write_point(f, self.end)?;
        }
        Ok(())
    }
}

impl fmt::Display for RangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for range in &self.0 {
            write!(f, "{range}")?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ranges: &[(char, char)]) -> RangeSet {
        RangeSet::new(ranges.iter().map(|&(a, b)| RuneRange::from_chars(a, b)))
    }

    fn r(a: char, b: char) -> RuneRange {
        RuneRange::from_chars(a, b)
    }

    #[test]
    fn new_merges_overlapping_and_adjacent() {
        let s = set(&[('m', 'p'), ('a', 'c'), ('d', 'f'), ('o', 'z')]);
        assert_eq!(s.ranges(), &[r('a', 'f'), r('m', 'z')]);
    }

    #[test]
    fn overlaps() {
        assert!(set(&[('a', 'c')]).overlaps(&set(&[('c', 'e')])));
        assert!(set(&[('a', 'b'), ('x', 'z')]).overlaps(&set(&[('m', 'n'), ('y', 'y')])));
        assert!(!set(&[('a', 'c')]).overlaps(&set(&[('d', 'f')])));
        assert!(!set(&[('a', 'c'), ('x', 'z')]).overlaps(&set(&[('d', 'w')])));
        assert!(!RangeSet::empty().overlaps(&set(&[('a', 'z')])));
    }

    #[test]
    fn contains_single_range() {
        let s = set(&[('a', 'c'), ('x', 'z')]);
        assert!(s.contains(r('c', 'd')));
        assert!(s.contains(r('b', 'b')));
        assert!(s.contains(r('d', 'x')));
        assert!(!s.contains(r('d', 'w')));
        assert!(!s.contains(r('0', '9')));
        assert!(s.contains_char('y'));
        assert!(!s.contains_char('m'));
    }

    #[test]
    fn intersect() {
        let a = set(&[('a', 'f'), ('m', 'z')]);
        let b = set(&[('d', 'o')]);
        assert_eq!(a.intersect(&b), set(&[('d', 'f'), ('m', 'o')]));
        assert_eq!(b.intersect(&a), a.intersect(&b));

        let a = set(&[('a', 'e')]);
        let b = RangeSet::new([r('a', 'b'), r('d', 'e')]);
        assert_eq!(a.intersect(&b), b);
        assert!(set(&[('a', 'c')]).intersect(&set(&[('d', 'f')])).is_empty());
    }

    #[test]
    fn intersect_coalesces_adjacent_pieces() {
        // pieces from different ranges of `b` that touch end up as one range
        let a = set(&[('a', 'z')]);
        let b = RangeSet(vec![r('a', 'c'), r('d', 'f')]);
        assert_eq!(a.intersect(&b).ranges(), &[r('a', 'f')]);
    }

    #[test]
    fn sum() {
        let a = set(&[('a', 'c'), ('x', 'z')]);
        let b = set(&[('d', 'f'), ('m', 'n')]);
        assert_eq!(a.sum(&b), set(&[('a', 'f'), ('m', 'n'), ('x', 'z')]));
        assert_eq!(RangeSet::empty().sum(&b), b);
    }

    #[test]
    fn split_overlapping() {
        let blocks = split(&[set(&[('a', 'm')]), set(&[('f', 'z')])]);
        assert_eq!(blocks, vec![r('a', 'e'), r('f', 'm'), r('n', 'z')]);
    }

    #[test]
    fn split_keeps_touching_boundaries() {
        let blocks = split(&[set(&[('a', 'c')]), set(&[('d', 'f')])]);
        assert_eq!(blocks, vec![r('a', 'c'), r('d', 'f')]);
    }

    #[test]
    fn split_skips_gaps_and_duplicates() {
        let blocks = split(&[set(&[('a', 'c')]), set(&[('a', 'c')]), set(&[('x', 'z')])]);
        assert_eq!(blocks, vec![r('a', 'c'), r('x', 'z')]);
    }

    #[test]
    fn split_empty_input() {
        assert!(split(&Vec::new()).is_empty());
        assert!(split(&[RangeSet::empty()]).is_empty());
    }

    #[test]
    fn split_is_an_exact_partition() {
        let inputs = vec![
            set(&[('0', '9'), ('a', 'z')]),
            set(&[('5', 'c')]),
            set(&[('b', 'b'), ('y', '~')]),
            set(&[('\0', '\u{10FFFF}')]),
            set(&[('a', 'a')]),
        ];
        let blocks = split(&inputs);

        for pair in blocks.windows(2) {
            assert!(pair[0].end < pair[1].start, "blocks overlap: {pair:?}");
        }

        let union = inputs.iter().fold(RangeSet::empty(), |acc, s| acc.sum(s));
        assert_eq!(RangeSet::new(blocks.iter().copied()), union);

        for input in &inputs {
            for block in &blocks {
                let piece = input.intersect(&RangeSet::from(*block));
                assert!(
                    piece.is_empty() || piece == RangeSet::from(*block),
                    "block {block} straddles {input}"
                );
            }
        }
    }

    #[test]
    fn display() {
        assert_eq!(set(&[('a', 'z'), ('0', '9')]).to_string(), "[0-9a-z]");
        assert_eq!(set(&[('-', '-'), (']', ']')]).to_string(), "[\\-\\]]");
        assert_eq!(set(&[('\n', '\n')]).to_string(), "[\\u{a}]");
    }
}
