//! Synchronization primitives for ISR-safe access.
//!
//! Low-level primitives shared by the channel engine, the deferred
//! completion pass and the streaming reader.

use core::cell::RefCell;
use core::task::Waker;
use critical_section::Mutex;

/// Cell providing interior mutability with critical section protection.
///
/// Combines `critical_section::Mutex` with `RefCell` for safe mutable access
/// from both normal code and interrupt handlers.
pub struct CriticalSectionCell<T> {
    inner: Mutex<RefCell<T>>,
}

impl<T> CriticalSectionCell<T> {
    /// Create a new cell (const, suitable for static initialization).
    pub const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(value)),
        }
    }

    /// Execute a closure with exclusive mutable access.
    ///
    /// Interrupts are disabled for the duration of the closure.
    #[inline]
    pub fn with<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        critical_section::with(|cs| {
            let mut value = self.inner.borrow_ref_mut(cs);
            f(&mut value)
        })
    }

    /// Try to execute a closure, returning `None` if already borrowed.
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

    /// Execute a closure with immutable access.
    #[inline]
    pub fn with_ref<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        critical_section::with(|cs| {
            let value = self.inner.borrow_ref(cs);
            f(&value)
        })
    }
}

// SAFETY: CriticalSectionCell uses critical sections to protect all access.
unsafe impl<T: Send> Sync for CriticalSectionCell<T> {}

/// Thread-safe, interrupt-safe storage for a single waker.
///
/// Register a waker from async poll, wake from interrupt handler.
pub struct AtomicWaker {
    waker: CriticalSectionCell<Option<Waker>>,
}

impl AtomicWaker {
    /// Create a new empty waker (const, suitable for static initialization).
    pub const fn new() -> Self {
        Self {
            waker: CriticalSectionCell::new(None),
        }
    }

    /// Register a waker to be woken later.
    pub fn register(&self, waker: &Waker) {
        self.waker.with(|slot| match slot {
            Some(existing) if existing.will_wake(waker) => {}
            _ => *slot = Some(waker.clone()),
        });
    }

    /// Wake the registered waker, if any (clears the stored waker).
    #[inline]
    pub fn wake(&self) {
        let waker = self.waker.with(Option::take);
        if let Some(w) = waker {
            w.wake();
        }
    }

    /// Check if a waker is currently registered.
    pub fn is_registered(&self) -> bool {
        self.waker.with_ref(Option::is_some)
    }
}

impl Default for AtomicWaker {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-capacity set of wakers, all woken together.
///
/// When every slot is taken, registering a new waker wakes and evicts the
/// current waiters; they re-register on their next poll.
pub struct WaitQueue<const N: usize> {
    wakers: CriticalSectionCell<[Option<Waker>; N]>,
}

impl<const N: usize> WaitQueue<N> {
    /// Create an empty queue.
    pub const fn new() -> Self {
        Self {
            wakers: CriticalSectionCell::new([const { None }; N]),
        }
    }

    /// Add `waker` unless an equivalent one is already queued.
    pub fn register(&self, waker: &Waker) {
        let evicted = self.wakers.with(|slots| {
            if slots.iter().flatten().any(|w| w.will_wake(waker)) {
                return None;
            }
            if let Some(slot) = slots.iter_mut().find(|slot| slot.is_none()) {
                *slot = Some(waker.clone());
                return None;
            }
            let evicted = core::mem::replace(slots, [const { None }; N]);
            slots[0] = Some(waker.clone());
            Some(evicted)
        });

        for w in evicted.into_iter().flatten().flatten() {
            w.wake();
        }
    }

    /// Wake and remove every queued waker; returns how many were woken.
    pub fn wake_all(&self) -> usize {
        let taken = self
            .wakers
            .with(|slots| core::mem::replace(slots, [const { None }; N]));
        let mut woken = 0;
        for w in taken.into_iter().flatten() {
            w.wake();
            woken += 1;
        }
        woken
    }

    /// Number of queued wakers
    pub fn len(&self) -> usize {
        self.wakers.with_ref(|slots| slots.iter().flatten().count())
    }

    /// True when nothing is queued
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<const N: usize> Default for WaitQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}
