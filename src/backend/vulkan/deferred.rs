//! Deferred release of Vulkan objects.
//!
//! Commands recorded this frame execute after the CPU has moved on, so an
//! object referenced by them (a temporary staging buffer, a descriptor set)
//! cannot be destroyed when its owner lets go of it. It is parked in the queue
//! slot of the frame that released it and handed back once that frame's
//! submission is known to have completed.
//!
//! ```text
//!   release(obj) during frame N  ──►  slot[N % F]
//!   advance_frame() to frame N+F ──►  slot[N % F] drained and returned
//! ```

/// Frame-indexed queue of items awaiting destruction.
#[derive(Debug)]
pub struct DeferredReleaseQueue<T> {
    slots: Vec<Vec<T>>,
    current_frame: usize,
}

impl<T> DeferredReleaseQueue<T> {
    /// Create a queue for `frames_in_flight` concurrently executing frames.
    ///
    /// # Panics
    ///
    /// Panics if `frames_in_flight` is zero.
    pub fn new(frames_in_flight: usize) -> Self {
        assert!(frames_in_flight > 0, "at least one frame must be in flight");
        Self {
            slots: (0..frames_in_flight).map(|_| Vec::new()).collect(),
            current_frame: 0,
        }
    }

    /// Queue an item released during the current frame.
    pub fn release(&mut self, item: T) {
        let slot = self.current_frame % self.slots.len();
        self.slots[slot].push(item);
    }

    /// Move to the next frame and return the items whose frame has completed.
    ///
    /// Call after the submission of the current frame, once the fence of the
    /// oldest in-flight frame has been waited on.
    #[must_use = "returned items must be destroyed by the caller"]
    pub fn advance_frame(&mut self) -> Vec<T> {
        self.current_frame += 1;
        let slot = self.current_frame % self.slots.len();
        std::mem::take(&mut self.slots[slot])
    }

    /// Return every queued item regardless of frame. For shutdown, after the
    /// device went idle.
    #[must_use = "returned items must be destroyed by the caller"]
    pub fn drain_all(&mut self) -> Vec<T> {
        self.slots.iter_mut().flat_map(std::mem::take).collect()
    }

    /// Number of items waiting for their frame to complete.
    pub fn pending_count(&self) -> usize {
        self.slots.iter().map(Vec::len).sum()
    }

    /// Current frame number (monotonically increasing).
    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    /// Number of frames an item waits before being returned.
    pub fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }
}
