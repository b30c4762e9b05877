//! Test utilities for arena-based testing.
//!
//! Tests build their ASTs in a [`test::TestContext`] arena and hand out
//! sessions that borrow from it, the same way an embedding front-end would.

#[cfg(test)]
pub mod test {
    use super::super::session::CompilationSession;
    use bumpalo::Bump;

    /// Test context that manages arena lifetime for tests.
    pub struct TestContext {
        arena: Bump,
    }

    impl TestContext {
        /// Create a new test context with default capacity.
        pub fn new() -> Self {
            let _ = env_logger::builder().is_test(true).try_init();
            Self { arena: Bump::new() }
        }

        /// Get a reference to the arena.
        pub fn arena(&self) -> &Bump {
            &self.arena
        }

        /// Create a compilation session using this context's arena.
        pub fn create_session(&self) -> CompilationSession<'_> {
            CompilationSession::new(&self.arena)
        }

        /// Get current memory usage.
        pub fn memory_used(&self) -> usize {
            self.arena.allocated_bytes()
        }

        /// Run a test with a session.
        pub fn with_session<F, R>(&self, f: F) -> R
        where
            F: FnOnce(&CompilationSession<'_>) -> R,
        {
            let session = self.create_session();
            f(&session)
        }
    }

    impl Default for TestContext {
        fn default() -> Self {
            Self::new()
        }
    }

    #[test]
    fn sessions_share_the_context_arena() {
        let ctx = TestContext::new();
        let before = ctx.memory_used();
        let used = ctx.with_session(|session| {
            session.arena().alloc_str("a_rather_long_function_name");
            session.arena().allocated_bytes()
        });
        assert!(used >= before + 27);
        assert_eq!(ctx.memory_used(), used);
    }
}
