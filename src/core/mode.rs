//! Build mode: one-shot batch build vs. long-running serve.

/// How producers treat their caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    /// Short-lived process: always recompute, never retain buffers.
    Batch,
    /// Long-running process: memoize output until invalidated.
    Serve,
}

impl BuildMode {
    /// Whether `get_content()` may read from and populate caches.
    #[inline]
    pub const fn caches_output(self) -> bool {
        matches!(self, Self::Serve)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Batch => "build",
            Self::Serve => "serve",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_serve_caches() {
        assert!(BuildMode::Serve.caches_output());
        assert!(!BuildMode::Batch.caches_output());
    }
}
