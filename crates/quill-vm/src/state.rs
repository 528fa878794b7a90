//! The VM's lifecycle state machine.

/// Where a [`crate::Vm`] sits in its lifecycle.
///
/// ```text
/// Ready ─execute(chunk)─▶ Running
/// Running ─fall off code / HALT─▶ Finished
/// Running ─runtime error / limit─▶ Error
/// Running ─host requests pause────▶ Paused
/// Paused  ─resume()────────────────▶ Running
/// Finished/Error ─terminal for resume(); execute() starts fresh─
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// No chunk has been executed yet.
    Ready,
    /// Actively dispatching instructions.
    Running,
    /// A native called `pause()`; `resume()` continues at the same `ip`.
    Paused,
    /// Execution reached `HALT` or returned from the outermost frame.
    Finished,
    /// A runtime error or resource-limit violation stopped execution.
    Error,
}
