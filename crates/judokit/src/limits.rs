//! Resource limits for sandboxed stepping
//!
//! Untrusted scripts can recurse forever (`f() { f; }; f`) or loop over huge
//! lists. These limits keep a drain bounded.
//!
//! # Fail Points (enabled with `failpoints` feature)
//!
//! - `limits::tick_action` - Inject failures in action counting
//! - `limits::enter_scope` - Inject failures in scope depth tracking

#[cfg(feature = "failpoints")]
use fail::fail_point;

/// Resource limits for action execution
#[derive(Debug, Clone)]
pub struct ExecutionLimits {
    /// Maximum number of actions executed by one drain (fuel model)
    /// Default: 100,000
    pub max_actions: usize,

    /// Maximum nesting of function, subshell and substitution scopes
    /// Default: 100
    pub max_scope_depth: usize,

    /// Maximum values in a single `for` list
    /// Default: 10,000
    pub max_loop_iterations: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_actions: 100_000,
            max_scope_depth: 100,
            max_loop_iterations: 10_000,
        }
    }
}

impl ExecutionLimits {
    /// Create new limits with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum action count
    pub fn max_actions(mut self, count: usize) -> Self {
        self.max_actions = count;
        self
    }

    /// Set maximum scope depth
    pub fn max_scope_depth(mut self, depth: usize) -> Self {
        self.max_scope_depth = depth;
        self
    }

    /// Set maximum loop iterations
    pub fn max_loop_iterations(mut self, count: usize) -> Self {
        self.max_loop_iterations = count;
        self
    }

    /// Check a `for` list length against the loop limit.
    pub fn check_loop(&self, values: usize) -> Result<(), LimitExceeded> {
        if values > self.max_loop_iterations {
            return Err(LimitExceeded::MaxLoopIterations(self.max_loop_iterations));
        }
        Ok(())
    }

    /// Check that one more scope may be entered on top of `depth`.
    pub fn check_scope(&self, depth: usize) -> Result<(), LimitExceeded> {
        #[cfg(feature = "failpoints")]
        fail_point!("limits::enter_scope", |action| {
            match action.as_deref() {
                Some("skip_check") => {
                    // Simulate depth check being bypassed
                    return Ok(());
                }
                Some("force_overflow") => {
                    return Err(LimitExceeded::MaxScopeDepth(self.max_scope_depth));
                }
                _ => {}
            }
            Ok(())
        });

        if depth >= self.max_scope_depth {
            return Err(LimitExceeded::MaxScopeDepth(self.max_scope_depth));
        }
        Ok(())
    }
}

/// Execution counters for tracking resource usage of one drain
#[derive(Debug, Clone, Default)]
pub struct ExecutionCounters {
    /// Number of actions executed since the last reset
    pub actions: usize,
}

impl ExecutionCounters {
    /// Create new counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment action counter, returns error if limit exceeded
    pub fn tick_action(&mut self, limits: &ExecutionLimits) -> Result<(), LimitExceeded> {
        #[cfg(feature = "failpoints")]
        fail_point!("limits::tick_action", |action| {
            match action.as_deref() {
                Some("skip_increment") => {
                    // Simulate counter not incrementing (potential bypass)
                    return Ok(());
                }
                Some("corrupt_high") => {
                    // Simulate counter corruption to a high value
                    self.actions = limits.max_actions + 1;
                }
                _ => {}
            }
            Ok(())
        });

        self.actions += 1;
        if self.actions > limits.max_actions {
            return Err(LimitExceeded::MaxActions(limits.max_actions));
        }
        Ok(())
    }

    /// Reset counters (called when a new drain starts)
    pub fn reset(&mut self) {
        self.actions = 0;
    }
}

/// Error returned when a resource limit is exceeded
#[derive(Debug, Clone, thiserror::Error)]
pub enum LimitExceeded {
    #[error("maximum action count exceeded ({0})")]
    MaxActions(usize),

    #[error("maximum scope depth exceeded ({0})")]
    MaxScopeDepth(usize),

    #[error("maximum loop iterations exceeded ({0})")]
    MaxLoopIterations(usize),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = ExecutionLimits::default();
        assert_eq!(limits.max_actions, 100_000);
        assert_eq!(limits.max_scope_depth, 100);
        assert_eq!(limits.max_loop_iterations, 10_000);
    }

    #[test]
    fn test_builder_pattern() {
        let limits = ExecutionLimits::new()
            .max_actions(100)
            .max_scope_depth(10)
            .max_loop_iterations(50);

        assert_eq!(limits.max_actions, 100);
        assert_eq!(limits.max_scope_depth, 10);
        assert_eq!(limits.max_loop_iterations, 50);
    }

    #[test]
    fn test_action_counter() {
        let limits = ExecutionLimits::new().max_actions(5);
        let mut counters = ExecutionCounters::new();

        for _ in 0..5 {
            assert!(counters.tick_action(&limits).is_ok());
        }

        // 6th action should fail
        assert!(matches!(
            counters.tick_action(&limits),
            Err(LimitExceeded::MaxActions(5))
        ));

        counters.reset();
        assert!(counters.tick_action(&limits).is_ok());
    }

    #[test]
    fn test_scope_depth() {
        let limits = ExecutionLimits::new().max_scope_depth(2);
        assert!(limits.check_scope(0).is_ok());
        assert!(limits.check_scope(1).is_ok());
        assert!(matches!(
            limits.check_scope(2),
            Err(LimitExceeded::MaxScopeDepth(2))
        ));
    }

    #[test]
    fn test_loop_limit() {
        let limits = ExecutionLimits::new().max_loop_iterations(3);
        assert!(limits.check_loop(3).is_ok());
        assert!(matches!(
            limits.check_loop(4),
            Err(LimitExceeded::MaxLoopIterations(3))
        ));
    }
}
