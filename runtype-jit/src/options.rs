/// Knobs that shape the code a [`Runtime`](crate::Runtime) generates.
///
/// Options are fixed when the runtime is built; every function in its cache
/// was compiled with the same options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JitOptions {
    /// Deepest type graph walk before compilation fails with
    /// [`JitError::MaxDepthExceeded`](crate::JitError::MaxDepthExceeded).
    pub max_depth: usize,
    /// Unknown keys a single object may carry before the unknown-key
    /// operations fail with
    /// [`RuntimeError::TooManyUnknownKeys`](crate::RuntimeError::TooManyUnknownKeys).
    pub max_unknown_keys: usize,
    /// Known-key lists longer than this are hoisted into a set in the
    /// function's context code instead of being scanned inline.
    pub known_keys_set_threshold: usize,
    /// Treat unknown keys as type errors in `isType` and `typeErrors`.
    pub strict_unknown_keys: bool,
    /// Compile children whose code is a returning block into their own
    /// function instead of an inline invoked block.
    pub factor_return_blocks: bool,
}

impl Default for JitOptions {
    fn default() -> Self {
        Self {
            max_depth: 64,
            max_unknown_keys: 100,
            known_keys_set_threshold: 8,
            strict_unknown_keys: false,
            factor_return_blocks: true,
        }
    }
}

impl JitOptions {
    /// Set [`Self::max_depth`].
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set [`Self::max_unknown_keys`].
    pub fn with_max_unknown_keys(mut self, max_unknown_keys: usize) -> Self {
        self.max_unknown_keys = max_unknown_keys;
        self
    }

    /// Set [`Self::known_keys_set_threshold`].
    pub fn with_known_keys_set_threshold(mut self, threshold: usize) -> Self {
        self.known_keys_set_threshold = threshold;
        self
    }

    /// Set [`Self::strict_unknown_keys`].
    pub fn with_strict_unknown_keys(mut self, strict: bool) -> Self {
        self.strict_unknown_keys = strict;
        self
    }

    /// Set [`Self::factor_return_blocks`].
    pub fn with_factor_return_blocks(mut self, factor: bool) -> Self {
        self.factor_return_blocks = factor;
        self
    }
}
