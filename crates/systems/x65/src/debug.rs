//! Debugger instrumentation

/// Per-tick observer for an attached debugger.
///
/// When a hook is installed, `exec` checks `stopped` before every tick and
/// hands the resulting pin word to `on_tick` after it. Returning true from
/// `stopped` ends the current `exec` call early.
pub trait DebugHook {
    fn on_tick(&mut self, pins: u64);

    fn stopped(&self) -> bool;
}
