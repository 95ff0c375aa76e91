//! Stack growth for the recursive parser and evaluator.
//!
//! Depth limits ([`crate::MAX_PARSE_DEPTH`], [`crate::MAX_EVAL_DEPTH`]) bound the
//! recursion; this module makes sure the host stack can actually hold that much, by
//! growing it on demand with `stacker`. Rendering and comparing values walks arrays
//! whose nesting was built at runtime and has no such limit, so it grows the stack too.

/// Minimum stack space to keep available (100KB red zone).
const RED_ZONE: usize = 100 * 1024;

/// Stack space to allocate when growing (1MB).
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Ensure sufficient stack space is available before executing `f`.
#[inline]
pub(crate) fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}
