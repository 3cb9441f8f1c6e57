/// Settings supplied by the embedding application for every dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EndpointOptions {
    include_stack: bool,
}

impl EndpointOptions {
    /// Production settings: error bodies never carry trace data.
    pub fn new() -> Self {
        Self::default()
    }

    /// Development settings: serialized errors include their `stack`.
    pub fn development() -> Self {
        Self { include_stack: true }
    }

    pub fn with_include_stack(mut self, include_stack: bool) -> Self {
        self.include_stack = include_stack;
        self
    }

    #[inline]
    pub fn include_stack(&self) -> bool {
        self.include_stack
    }
}
