use super::core::TaskRuntime;

/// Default number of task slots allocated up front.
const DEFAULT_CAPACITY: usize = 64;

/// Builder for configuring and creating a [`TaskRuntime`].
///
/// # Examples
///
/// ```rust
/// use framestep::RuntimeBuilder;
///
/// let runtime = RuntimeBuilder::new()
///     .initial_capacity(16)
///     .auto_free(false)
///     .build();
/// assert!(runtime.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct RuntimeBuilder {
    /// Task slots allocated before the first task is scheduled.
    initial_capacity: usize,

    /// Default `auto_free` flag stamped on new handles.
    auto_free: bool,
}

impl RuntimeBuilder {
    /// Creates a builder with the default configuration: 64 preallocated
    /// slots, and handles recycled as soon as their task completes.
    pub fn new() -> Self {
        Self {
            initial_capacity: DEFAULT_CAPACITY,
            auto_free: true,
        }
    }

    /// Sets how many task slots are allocated up front.
    ///
    /// The pool still grows past this when needed.
    ///
    /// # Panics
    ///
    /// Panics if `n == 0`.
    pub fn initial_capacity(mut self, n: usize) -> Self {
        assert!(n > 0, "initial_capacity must be > 0");

        self.initial_capacity = n;
        self
    }

    /// Sets whether new handles are freed automatically on completion.
    ///
    /// With `false`, finished tasks keep their slot until
    /// [`TaskRuntime::free_task`] is called.
    pub fn auto_free(mut self, auto_free: bool) -> Self {
        self.auto_free = auto_free;
        self
    }

    /// Builds the runtime with the configured options.
    pub fn build(self) -> TaskRuntime {
        TaskRuntime::new(self.initial_capacity, self.auto_free)
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
