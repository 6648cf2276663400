/// Time source interface
use core::time::Duration;

/// Monotonic time source used to timestamp samples and pace register sequences
pub trait Clock {
    /// Time elapsed since the clock's origin
    fn now(&self) -> Duration;

    /// Block for the given duration
    ///
    /// Simulated clocks advance their own time instead of sleeping.
    fn delay(&self, duration: Duration);
}
