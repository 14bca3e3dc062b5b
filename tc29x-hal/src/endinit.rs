//! Endinit configuration-write protection
//!
//! Safety-relevant registers of the module (clock control, dividers,
//! kernel reset) only accept writes while the endinit protection window
//! is open. The window has to be opened immediately before a register
//! group write and closed again right after it; leaving it open invites
//! stray writes from runaway code.
//!
//! [`SafetyWatchdog::with_config_write`] models the window as a scoped
//! resource: it hands the closure a [`ConfigWrite`] permit and restores
//! the protection on every exit path. The password handshake that opens
//! the window on real silicon is fixed by the hardware and not modeled
//! here.

/// Proof that the endinit protection window is currently open.
///
/// Only handed out by [`SafetyWatchdog::with_config_write`]. The
/// protected register writes in [`crate::psi5s::regs`] all require one.
pub struct ConfigWrite {
    _private: (),
}

/// Handle to the safety watchdog's endinit protection state.
pub struct SafetyWatchdog {
    endinit: bool,
}

struct Window<'a> {
    endinit: &'a mut bool,
}

impl Drop for Window<'_> {
    fn drop(&mut self) {
        *self.endinit = true;
    }
}

impl SafetyWatchdog {
    /// Creates the handle. The protection window starts out closed, which
    /// is the hardware reset state.
    pub const fn new() -> Self {
        SafetyWatchdog { endinit: true }
    }

    /// Whether protected registers currently reject writes.
    pub fn is_protected(&self) -> bool {
        self.endinit
    }

    /// Opens the protection window, runs `f` with a write permit, and
    /// closes the window again before returning.
    ///
    /// The closure runs inside a critical section so the open window is
    /// never held across a preemption, and the window is re-closed on
    /// every exit path out of the closure.
    pub fn with_config_write<R>(&mut self, f: impl FnOnce(&ConfigWrite) -> R) -> R {
        critical_section::with(|_| {
            self.endinit = false;
            let _window = Window {
                endinit: &mut self.endinit,
            };
            let permit = ConfigWrite { _private: () };
            f(&permit)
        })
    }
}

impl Default for SafetyWatchdog {
    fn default() -> Self {
        SafetyWatchdog::new()
    }
}
