//! Fixed-capacity slot table with per-slot list tags.
//!
//! Each slot carries a tag naming the list it belongs to (free, pending,
//! completed, ...) and a sequence number. Ordering inside a list is by
//! sequence, so "move to tail of list X" is a retag with a fresh sequence
//! and FIFO order needs no linked pointers.

/// Tagged slots with insertion-ordered lists.
pub struct TaggedSlots<S, const N: usize> {
    /// List membership per slot
    tags: [S; N],
    /// Ordering key per slot
    seqs: [u64; N],
    /// Next sequence number to hand out
    next_seq: u64,
}

impl<S: Copy + PartialEq, const N: usize> TaggedSlots<S, N> {
    /// Create a table with every slot in `initial`, ordered by index.
    #[must_use]
    pub const fn new(initial: S) -> Self {
        let mut seqs = [0u64; N];
        let mut i = 0;
        while i < N {
            seqs[i] = i as u64;
            i += 1;
        }
        Self {
            tags: [initial; N],
            seqs,
            next_seq: N as u64,
        }
    }

    /// Tag of slot `idx`
    #[inline(always)]
    pub fn tag(&self, idx: usize) -> S {
        self.tags[idx]
    }

    /// Move slot `idx` to the tail of list `tag`.
    #[inline]
    pub fn push_back(&mut self, idx: usize, tag: S) {
        self.tags[idx] = tag;
        self.seqs[idx] = self.next_seq;
        self.next_seq += 1;
    }

    /// Change the tag of slot `idx`, keeping its position.
    #[inline]
    pub fn retag(&mut self, idx: usize, tag: S) {
        self.tags[idx] = tag;
    }

    /// Number of slots in list `tag`
    pub fn count(&self, tag: S) -> usize {
        self.tags.iter().filter(|&&t| t == tag).count()
    }

    /// Head of list `tag`
    pub fn oldest(&self, tag: S) -> Option<usize> {
        self.after(tag, None)
    }

    /// `n`-th entry of list `tag`, counting from the head at zero.
    pub fn nth_oldest(&self, tag: S, n: usize) -> Option<usize> {
        let mut current = self.oldest(tag)?;
        for _ in 0..n {
            current = self.after(tag, Some(current))?;
        }
        Some(current)
    }

    /// Newest entry of list `tag` matching `pred`.
    pub fn find_newest<F>(&self, tag: S, pred: F) -> Option<usize>
    where
        F: Fn(usize) -> bool,
    {
        (0..N)
            .filter(|&i| self.tags[i] == tag && pred(i))
            .max_by_key(|&i| self.seqs[i])
    }

    /// Oldest entry of list `tag` matching `pred`.
    pub fn find_oldest<F>(&self, tag: S, pred: F) -> Option<usize>
    where
        F: Fn(usize) -> bool,
    {
        (0..N)
            .filter(|&i| self.tags[i] == tag && pred(i))
            .min_by_key(|&i| self.seqs[i])
    }

    /// Retag every member of `from` to `to`; returns how many moved.
    pub fn move_all(&mut self, from: S, to: S) -> usize {
        let mut moved = 0;
        while let Some(idx) = self.oldest(from) {
            self.push_back(idx, to);
            moved += 1;
        }
        moved
    }

    /// Entry of list `tag` following `prev` (or the head when `None`).
    fn after(&self, tag: S, prev: Option<usize>) -> Option<usize> {
        let floor = prev.map(|p| self.seqs[p]);
        (0..N)
            .filter(|&i| self.tags[i] == tag)
            .filter(|&i| floor.is_none_or(|f| self.seqs[i] > f))
            .min_by_key(|&i| self.seqs[i])
    }
}
