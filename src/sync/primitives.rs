//! Critical-section protected interior mutability.

use core::cell::RefCell;

use critical_section::Mutex;

/// Cell whose contents are reachable only inside a critical section.
///
/// Combines `critical_section::Mutex` with `RefCell`, so thread-mode code
/// and interrupt handlers can share one value without data races.
pub struct CriticalSectionCell<T> {
    inner: Mutex<RefCell<T>>,
}

impl<T> CriticalSectionCell<T> {
    /// Create a cell (const, suitable for static initialization)
    pub const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(value)),
        }
    }

    /// Run `f` with exclusive access.
    ///
    /// Interrupts are masked for the duration of the closure.
    ///
    /// # Panics
    ///
    /// If called re-entrantly from inside `f`; use
    /// [`try_with`](Self::try_with) where that can happen.
    #[inline]
    pub fn with<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        critical_section::with(|cs| f(&mut self.inner.borrow_ref_mut(cs)))
    }

    /// Run `f` with exclusive access, or return `None` if the value is
    /// already borrowed further up the stack.
    #[inline]
    pub fn try_with<R, F>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&mut T) -> R,
    {
        critical_section::with(|cs| {
            self.inner
                .borrow(cs)
                .try_borrow_mut()
                .ok()
                .map(|mut value| f(&mut value))
        })
    }

    /// Run `f` with shared access
    ///
    /// # Panics
    ///
    /// If called from inside [`with`](Self::with) on the same cell.
    #[inline]
    pub fn with_ref<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        critical_section::with(|cs| f(&self.inner.borrow_ref(cs)))
    }

    /// Run `f` with shared access, or return `None` if the value is
    /// mutably borrowed further up the stack.
    #[inline]
    pub fn try_with_ref<R, F>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&T) -> R,
    {
        critical_section::with(|cs| {
            self.inner
                .borrow(cs)
                .try_borrow()
                .ok()
                .map(|value| f(&value))
        })
    }
}

// SAFETY: every access to the inner value happens inside a critical section.
unsafe impl<T: Send> Sync for CriticalSectionCell<T> {}
