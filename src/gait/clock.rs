//! Monotonic time source used to pace the continuous gait.
use fugit::TimerInstantU64;

/// Microsecond instant.
pub type Instant = TimerInstantU64<1_000_000>;

/// Something that can tell the current monotonic time.
pub trait Clock {
    fn now(&self) -> Instant;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Instant {
        (**self).now()
    }
}
