// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Configuration for the heap and the VM.

/// Maximum call depth.
pub const FRAMES_MAX: usize = 64;

/// Maximum number of value-stack slots.
pub const STACK_MAX: usize = FRAMES_MAX * 256;

/// Configuration for the garbage collector.
#[derive(Debug, Clone, PartialEq)]
pub struct GcConfig {
    /// Bytes allocated before the first collection
    pub initial_threshold: usize,
    /// Multiplier applied to the live byte count after each collection;
    /// values below 1.0 act as 1.0
    pub growth_factor: f64,
    /// Lower bound for the recomputed threshold
    pub min_threshold: usize,
    /// Collect before every allocation
    pub stress: bool,
    /// Hard cap on accounted heap bytes; exceeding it is an out-of-memory error
    pub max_heap_bytes: Option<usize>,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            initial_threshold: 1024 * 1024, // 1MB
            growth_factor: 2.0,
            min_threshold: 1024 * 1024,
            stress: false,
            max_heap_bytes: None,
        }
    }
}

impl GcConfig {
    /// Sets the threshold used before the first collection.
    pub fn with_initial_threshold(mut self, bytes: usize) -> Self {
        self.initial_threshold = bytes;
        self
    }

    /// Sets the growth factor. Values below 1.0 are clamped to 1.0.
    pub fn with_growth_factor(mut self, factor: f64) -> Self {
        self.growth_factor = factor.max(1.0);
        self
    }

    /// Sets the threshold floor.
    pub fn with_min_threshold(mut self, bytes: usize) -> Self {
        self.min_threshold = bytes;
        self
    }

    /// Enables or disables collecting on every allocation.
    pub fn with_stress(mut self, stress: bool) -> Self {
        self.stress = stress;
        self
    }

    /// Caps the heap size.
    pub fn with_max_heap_bytes(mut self, bytes: usize) -> Self {
        self.max_heap_bytes = Some(bytes);
        self
    }
}

/// Configuration for a VM instance.
#[derive(Debug, Clone, PartialEq)]
pub struct VmConfig {
    /// Maximum call depth before `StackOverflow`
    pub max_frames: usize,
    /// Maximum value-stack height before `StackOverflow`
    pub max_stack: usize,
    /// Collector configuration
    pub gc: GcConfig,
    /// Install the built-in natives (`clock`) at construction
    pub register_builtins: bool,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_frames: FRAMES_MAX,
            max_stack: STACK_MAX,
            gc: GcConfig::default(),
            register_builtins: true,
        }
    }
}

impl VmConfig {
    /// Sets the maximum call depth.
    pub fn with_max_frames(mut self, frames: usize) -> Self {
        self.max_frames = frames;
        self
    }

    /// Sets the maximum value-stack height.
    pub fn with_max_stack(mut self, slots: usize) -> Self {
        self.max_stack = slots;
        self
    }

    /// Replaces the collector configuration.
    pub fn with_gc(mut self, gc: GcConfig) -> Self {
        self.gc = gc;
        self
    }

    /// Skips registering the built-in natives.
    pub fn without_builtins(mut self) -> Self {
        self.register_builtins = false;
        self
    }
}
