use core::sync::atomic::{AtomicU64, Ordering};

static NEXT_LTAG: AtomicU64 = AtomicU64::new(1);

/// An opaque version tag distinguishing one incarnation of computing `(function, input)` from
/// its successors.
///
/// Two [`Computed`](crate::Computed)s for the same input can coexist transiently (an old,
/// invalidated one and a fresh one being computed); the `LTag` is what makes it possible to tell
/// them apart when resolving a `usedBy` entry back to a live node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LTag(u64);

impl LTag {
	/// Mints a fresh tag, distinct from every other tag minted so far in this process.
	pub fn next() -> Self {
		Self(NEXT_LTAG.fetch_add(1, Ordering::Relaxed))
	}
}
