use std::sync::Arc;

use parking_lot::Mutex;

use crate::function::AnyComputed;

/// Bitset of flags read by [`update`](crate::Computed::update) and forwarded untouched to
/// `Function::invoke`.
///
/// A hand-rolled newtype over `u8` rather than a flags crate, matching the teacher's own
/// preference for small bespoke types over a dependency for something this size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CallFlags(u8);

impl CallFlags {
	pub const NONE: Self = Self(0);
	/// Causes `update` to record every computed it touches into the context's capture slot.
	pub const CAPTURE: Self = Self(1 << 0);
	/// Causes `update` to invalidate the node as a side effect, after any dependency edge has
	/// been installed.
	pub const INVALIDATE: Self = Self(1 << 1);
	/// Reserved: forwarded to `Function::invoke` untouched, not interpreted by the core.
	pub const GET_EXISTING: Self = Self(1 << 2);

	pub const fn contains(self, flag: Self) -> bool {
		self.0 & flag.0 == flag.0
	}

	pub const fn union(self, other: Self) -> Self {
		Self(self.0 | other.0)
	}
}

impl core::ops::BitOr for CallFlags {
	type Output = Self;

	fn bitor(self, rhs: Self) -> Self {
		self.union(rhs)
	}
}

/// Ambient per-call context threaded (explicitly or implicitly, via the current-context slot)
/// through `update`/`use_value`.
pub struct ComputeContext {
	call_flags: CallFlags,
	captured: Mutex<Vec<Arc<dyn AnyComputed>>>,
}

impl ComputeContext {
	pub fn new(call_flags: CallFlags) -> Arc<Self> {
		Arc::new(Self {
			call_flags,
			captured: Mutex::new(Vec::new()),
		})
	}

	pub fn call_flags(&self) -> CallFlags {
		self.call_flags
	}

	/// Records `computed` into this context's capture slot, if [`CallFlags::CAPTURE`] is set.
	pub fn try_capture_value(&self, computed: Arc<dyn AnyComputed>) {
		if self.call_flags.contains(CallFlags::CAPTURE) {
			self.captured.lock().push(computed);
		}
	}

	/// Snapshots everything captured so far.
	pub fn captured(&self) -> Vec<Arc<dyn AnyComputed>> {
		self.captured.lock().clone()
	}

	/// Installs `self` as the ambient current context for the remainder of the caller's scope,
	/// restoring whatever was ambient before on every exit path (normal return, early return, or
	/// panic).
	pub fn use_scoped(self: &Arc<Self>) -> ContextScope {
		let previous = crate::current::swap_context(Some(self.clone()));
		ContextScope { previous }
	}
}

/// RAII guard restoring the previous ambient [`ComputeContext`] on drop.
pub struct ContextScope {
	previous: Option<Arc<ComputeContext>>,
}

impl Drop for ContextScope {
	fn drop(&mut self) {
		crate::current::swap_context(self.previous.take());
	}
}
