//! Scope stack for composing several override guards into one lifetime

/// Owns entered guards and releases them in reverse order of entry.
///
/// A single [`HandlerGuard`](crate::target::HandlerGuard) already restores
/// on drop; `ScopeStack` covers the multi-target case where several
/// overrides must share one lifetime, typically one test body. Dropping the
/// stack, normally or during unwinding, releases every entered guard last
/// in, first out.
#[derive(Default)]
pub struct ScopeStack<'scope> {
    entered: Vec<Box<dyn Entered + 'scope>>,
}

// Object-safe erasure for arbitrary guard types; dropping the box runs the
// guard's own Drop.
trait Entered {}

impl<T> Entered for T {}

impl<'scope> ScopeStack<'scope> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `guard`; it is released when the stack drops.
    pub fn enter<G: 'scope>(&mut self, guard: G) {
        self.entered.push(Box::new(guard));
    }

    /// Number of guards currently held.
    pub fn len(&self) -> usize {
        self.entered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entered.is_empty()
    }
}

impl Drop for ScopeStack<'_> {
    fn drop(&mut self) {
        // Vec drops front to back; unwind the entries LIFO instead.
        while let Some(guard) = self.entered.pop() {
            drop(guard);
        }
    }
}
