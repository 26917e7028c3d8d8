//! Per-transaction display colors.

use std::collections::{HashMap, HashSet, VecDeque};

use anstyle::{Ansi256Color, Color};

/// Palette indices handed out, before removing reserved entries.
const PALETTE: std::ops::RangeInclusive<u8> = 1..=231;

/// Indices that render badly on common terminal themes.
pub const DEFAULT_RESERVED: [u8; 4] = [4, 16, 17, 18];

/// Grey used for transactions outside the highlight list.
pub const DEFAULT_MUTED: u8 = 237;

/// Hands out a stable color per transaction id.
///
/// The first sighting of an id takes the next entry of the pool; once the
/// pool runs dry it is refilled, so colors repeat only after every entry has
/// been used. An assignment never changes afterwards.
#[derive(Debug, Clone)]
pub struct ColorAllocator {
    reserved: HashSet<u8>,
    pool: VecDeque<u8>,
    assigned: HashMap<String, u8>,
    highlight: Option<HashSet<String>>,
    muted: u8,
}

impl Default for ColorAllocator {
    fn default() -> Self {
        Self::new(&DEFAULT_RESERVED, DEFAULT_MUTED)
    }
}

impl ColorAllocator {
    pub fn new(reserved: &[u8], muted: u8) -> Self {
        let reserved: HashSet<u8> = reserved.iter().copied().collect();
        let mut allocator = Self {
            reserved,
            pool: VecDeque::new(),
            assigned: HashMap::new(),
            highlight: None,
            muted,
        };
        allocator.refill();
        allocator
    }

    /// Only these transactions get palette colors; everything else is muted.
    pub fn with_highlight(mut self, transactions: HashSet<String>) -> Self {
        self.highlight = Some(transactions);
        self
    }

    /// Palette index of `transaction_id`, assigning one on first sight.
    pub fn index_for(&mut self, transaction_id: &str) -> u8 {
        if let Some(index) = self.assigned.get(transaction_id) {
            return *index;
        }

        let highlighted = self
            .highlight
            .as_ref()
            .is_none_or(|ids| ids.contains(transaction_id));
        let index = if highlighted { self.next() } else { self.muted };

        self.assigned.insert(transaction_id.to_string(), index);
        index
    }

    pub fn color_for(&mut self, transaction_id: &str) -> Color {
        Color::Ansi256(Ansi256Color(self.index_for(transaction_id)))
    }

    /// Assigned index, without assigning.
    pub fn get(&self, transaction_id: &str) -> Option<u8> {
        self.assigned.get(transaction_id).copied()
    }

    fn next(&mut self) -> u8 {
        if self.pool.is_empty() {
            self.refill();
        }
        // An entirely reserved palette degrades to the muted color
        self.pool.pop_front().unwrap_or(self.muted)
    }

    fn refill(&mut self) {
        self.pool = PALETTE.filter(|i| !self.reserved.contains(i)).collect();
    }
}
