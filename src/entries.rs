//! EntryVec: growable, default-initialized slot array backing the buckets.

/// Fixed-slot array that only grows. Newly added slots hold `T::default()`.
#[derive(Debug)]
pub(crate) struct EntryVec<T> {
    slots: Vec<T>,
    limit: usize,
}

impl<T: Default> EntryVec<T> {
    /// Create an empty store that never grows past `limit` slots.
    pub(crate) fn with_limit(limit: usize) -> Self {
        Self {
            slots: Vec::new(),
            limit,
        }
    }

    /// Grow to `new_count` slots (clamped to the limit) and return the
    /// resulting slot count. Returns the current count unchanged when the
    /// allocation fails or no growth is possible; never shrinks.
    pub(crate) fn resize(&mut self, new_count: usize) -> usize {
        let target = new_count.min(self.limit);
        let len = self.slots.len();
        if target <= len {
            return len;
        }
        if self.slots.try_reserve_exact(target - len).is_err() {
            return len;
        }
        self.slots.resize_with(target, T::default);
        target
    }

    #[inline]
    pub(crate) fn at(&self, index: usize) -> Option<&T> {
        self.slots.get(index)
    }

    #[inline]
    pub(crate) fn at_mut(&mut self, index: usize) -> Option<&mut T> {
        self.slots.get_mut(index)
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn iter(&self) -> core::slice::Iter<'_, T> {
        self.slots.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> core::slice::IterMut<'_, T> {
        self.slots.iter_mut()
    }
}
