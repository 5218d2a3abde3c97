use std::time::Duration;

/// Immutable knob bag carried by a [`Computed`](crate::Computed).
///
/// Mutable only while the node is still `Computing` (there is no setter exposed after that
/// point; a fresh [`Computed`] is built with the options it will keep for its lifetime).
#[derive(Debug, Clone, Copy, Default)]
pub struct ComputedOptions {
	auto_invalidate_time: Option<Duration>,
	error_auto_invalidate_time: Option<Duration>,
}

impl ComputedOptions {
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets the timeout after which a successful result auto-invalidates. `None` disables it.
	pub fn with_auto_invalidate_time(mut self, timeout: Option<Duration>) -> Self {
		self.auto_invalidate_time = timeout;
		self
	}

	/// Sets the timeout after which an error result auto-invalidates. `None` disables it.
	pub fn with_error_auto_invalidate_time(mut self, timeout: Option<Duration>) -> Self {
		self.error_auto_invalidate_time = timeout;
		self
	}

	pub fn auto_invalidate_time(&self) -> Option<Duration> {
		self.auto_invalidate_time
	}

	pub fn error_auto_invalidate_time(&self) -> Option<Duration> {
		self.error_auto_invalidate_time
	}
}
