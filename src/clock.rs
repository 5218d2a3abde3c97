use std::sync::OnceLock;
use std::time::{Duration, Instant};

fn epoch() -> Instant {
	static EPOCH: OnceLock<Instant> = OnceLock::new();
	*EPOCH.get_or_init(Instant::now)
}

/// A coarse monotonic timestamp, cheap enough to read on every `touch` and to store in an
/// `AtomicU64` without a lock.
///
/// Represented as nanoseconds since a process-local epoch (the first time any [`Moment`] is
/// created) rather than wrapping [`Instant`] directly, since `Instant` itself has no stable
/// integer representation suitable for lock-free storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Moment(u64);

impl Moment {
	pub fn now() -> Self {
		Self(epoch().elapsed().as_nanos() as u64)
	}

	pub fn as_nanos_since_epoch(self) -> u64 {
		self.0
	}

	pub fn from_nanos_since_epoch(nanos: u64) -> Self {
		Self(nanos)
	}

	pub fn elapsed(self) -> Duration {
		Duration::from_nanos(Self::now().0.saturating_sub(self.0))
	}
}

/// Zero-sized accessor for the process's monotonic clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct Clock;

impl Clock {
	pub fn now(&self) -> Moment {
		Moment::now()
	}
}
