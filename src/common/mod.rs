//! Common utilities shared across the runner

pub mod config;
pub mod error;
pub mod logging;
pub mod paths;

pub use error::{Error, Result};

/// Run `effect` against `value` and hand `value` back untouched.
///
/// Used where a pipeline needs a side effect (logging, printing) between two
/// value-producing steps; the effect only ever sees a shared reference, so it
/// cannot change what flows on.
pub fn tap<T>(value: T, effect: impl FnOnce(&T)) -> T {
    effect(&value);
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tap_returns_input_and_runs_effect() {
        let mut seen = 0;
        let out = tap(vec![1, 2, 3], |v| seen = v.len());
        assert_eq!(out, vec![1, 2, 3]);
        assert_eq!(seen, 3);
    }
}
