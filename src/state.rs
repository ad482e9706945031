// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Per-scenario storage for stateful attributes.
//!
//! Instead of deep-cloning whole object graphs per "what-if" scenario, every
//! mutable attribute is stored as one value per scenario index.  All sibling
//! arrays of a network resize in lockstep through the scenario-lifecycle
//! hooks, so reading any array at the network's current scenario index never
//! goes out of bounds.

/// A fixed-meaning array holding one value of type `T` per scenario.
#[derive(Debug)]
pub(crate) struct StateArray<T> {
    values: Vec<T>,
}

impl<T> StateArray<T> {
    /// Creates an array with `size` slots, each produced by `factory`.
    pub(crate) fn new(size: usize, mut factory: impl FnMut() -> T) -> Self {
        let mut values = Vec::with_capacity(size);
        values.resize_with(size, &mut factory);
        Self { values }
    }

    /// Returns the value for the given scenario index.
    pub(crate) fn get(&self, index: usize) -> &T {
        &self.values[index]
    }

    /// Returns the mutable value for the given scenario index.
    pub(crate) fn get_mut(&mut self, index: usize) -> &mut T {
        &mut self.values[index]
    }

    /// Returns the number of scenario slots.
    pub(crate) fn size(&self) -> usize {
        self.values.len()
    }

    /// Appends `count` slots, each produced by `factory`.
    pub(crate) fn push(&mut self, count: usize, mut factory: impl FnMut() -> T) {
        self.values.resize_with(self.values.len() + count, &mut factory);
    }

    /// Drops the last `count` slots.
    pub(crate) fn pop(&mut self, count: usize) {
        self.values.truncate(self.values.len() - count);
    }

    /// Frees one interior slot for later reuse.  The stored value is kept in
    /// place until [`allocate`][Self::allocate] overwrites it; the caller is
    /// responsible for not reading a deleted index.
    pub(crate) fn delete(&mut self, index: usize) {
        assert!(index < self.values.len(), "Scenario index {index} not found");
    }

    /// Populates the given (previously freed) indices with values produced by
    /// `factory`.
    pub(crate) fn allocate(&mut self, indices: &[usize], mut factory: impl FnMut() -> T) {
        for &index in indices {
            self.values[index] = factory();
        }
    }
}

/// Objects holding per-scenario state, resized in lockstep by the network
/// whenever the scenario dimension changes.
pub(crate) trait MultiScenarioObject {
    /// Appends `count` scenario slots, initialized from `source_index`.
    fn extend_state_array_size(&mut self, init_size: usize, count: usize, source_index: usize);

    /// Drops the last `count` scenario slots.
    fn reduce_state_array_size(&mut self, count: usize);

    /// Frees one scenario slot for reuse.
    fn delete_state_array_element(&mut self, index: usize);

    /// Populates the given freed slots from `source_index`.
    fn allocate_state_array_element(&mut self, indices: &[usize], source_index: usize);
}
