//! Fixed-capacity sliding window of bins
//!
//! A window of capacity `N` always holds exactly `N` committed bins plus one
//! in-progress bin. Readers iterate the committed bins oldest to newest and
//! never see the in-progress one; writers only touch the in-progress bin and
//! commit it with [`CircularWindow::advance`].
//!
//! # Example
//!
//! ```
//! use precondition::stats::window::CircularWindow;
//!
//! let mut window = CircularWindow::new(3, 0u64);
//! for count in [5, 6, 7, 8] {
//!     *window.current_mut() = count;
//!     window.advance();
//! }
//! let committed: Vec<u64> = window.iter().copied().collect();
//! assert_eq!(committed, vec![6, 7, 8]);
//! ```

/// Ring of `capacity + 1` slots; one of them is the in-progress bin
#[derive(Debug, Clone)]
pub struct CircularWindow<T> {
    slots: Vec<T>,
    current: usize,
    initial: T,
}

impl<T: Clone> CircularWindow<T> {
    /// Create a window of `capacity` committed bins, all set to `initial`
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize, initial: T) -> Self {
        assert!(capacity > 0, "Window capacity must be greater than 0");
        Self {
            slots: vec![initial.clone(); capacity + 1],
            current: 0,
            initial,
        }
    }

    /// Number of committed bins
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len() - 1
    }

    #[inline]
    pub fn current(&self) -> &T {
        &self.slots[self.current]
    }

    #[inline]
    pub fn current_mut(&mut self) -> &mut T {
        &mut self.slots[self.current]
    }

    /// Commit the in-progress bin and open a fresh one
    ///
    /// The oldest committed bin is evicted; the new in-progress bin starts at
    /// the initial value.
    #[inline]
    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.slots.len();
        self.slots[self.current] = self.initial.clone();
    }

    /// Set every bin, committed and in-progress, back to the initial value
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            *slot = self.initial.clone();
        }
    }

    /// Committed bins, oldest first
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            slots: &self.slots,
            position: self.current + 1,
            remaining: self.capacity(),
        }
    }
}

impl<'a, T: Clone> IntoIterator for &'a CircularWindow<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the committed bins of a [`CircularWindow`]
pub struct Iter<'a, T> {
    slots: &'a [T],
    position: usize,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let item = &self.slots[self.position % self.slots.len()];
        self.position += 1;
        self.remaining -= 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}
