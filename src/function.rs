use core::any::{Any, TypeId};
use core::fmt::Debug;
use core::hash::{Hash, Hasher};
use std::sync::Arc;

use futures_lite::future::Boxed as BoxedFuture;

use crate::cancel::CancelToken;
use crate::clock::Moment;
use crate::context::ComputeContext;
use crate::ltag::LTag;

/// State a [`Computed`](crate::Computed) can be observed in from outside its own type, via the
/// object-safe [`AnyComputed`] facet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
	Computing,
	Consistent,
	Invalidated,
}

/// The object-safe facet of a [`Computed<TIn, TOut, TErr>`](crate::Computed), used to cross
/// type-erasure boundaries in the `used`/`usedBy` edge sets: a node's dependencies and
/// dependents can each have an arbitrary, unrelated `(TIn, TOut, TErr)` triple of their own.
pub trait AnyComputed: Send + Sync {
	fn state(&self) -> NodeState;

	/// Transitions this node to `Invalidated` if it isn't already, cascading to its dependents.
	/// Returns `true` iff this call caused the transition.
	fn invalidate(&self) -> bool;

	fn touch(&self);

	fn last_access_time(&self) -> Moment;

	/// The identity pair under which this node is recorded in its dependencies' `usedBy` sets.
	fn dependent_key(&self) -> DependentKey;

	/// Registers `dependent` as depending on `self`, keyed by `dependent_key`.
	///
	/// Panics with [`WrongState`](crate::error::WrongState) if `self` is still `Computing`. If
	/// `self` is already `Invalidated`, immediately invalidates `dependent` instead of recording
	/// the edge (it would be stale the instant it was added).
	fn add_used_by(&self, dependent_key: DependentKey, dependent: Arc<dyn AnyComputed>);

	/// Removes a previously-registered dependent edge, if present. Always legal.
	fn remove_used_by(&self, dependent_key: &DependentKey);

	/// Records `dependency` in this node's own forward `used` set. Only ever called on a node
	/// that is itself `Computing`, as the second half of installing a dependency edge.
	fn record_used(&self, dependency: Arc<dyn AnyComputed>);
}

/// Object-safe structural identity for a `TIn`, used as the key half of a [`DependentKey`].
///
/// Blanket-implemented for any ordinary key type; implementors of [`ComputedInput`] get this for
/// free.
pub trait KeyIdentity: Debug + Send + Sync {
	fn eq_key(&self, other: &dyn KeyIdentity) -> bool;
	fn hash_key(&self, state: &mut dyn Hasher);
	fn as_any(&self) -> &dyn Any;
}

struct HasherMut<'a>(&'a mut dyn Hasher);

impl Hasher for HasherMut<'_> {
	fn finish(&self) -> u64 {
		self.0.finish()
	}

	fn write(&mut self, bytes: &[u8]) {
		self.0.write(bytes)
	}
}

impl<T: Eq + Hash + Debug + Send + Sync + 'static> KeyIdentity for T {
	fn eq_key(&self, other: &dyn KeyIdentity) -> bool {
		match other.as_any().downcast_ref::<T>() {
			Some(other) => self == other,
			None => false,
		}
	}

	fn hash_key(&self, state: &mut dyn Hasher) {
		TypeId::of::<T>().hash(&mut HasherMut(state));
		self.hash(&mut HasherMut(state));
	}

	fn as_any(&self) -> &dyn Any {
		self
	}
}

/// The input side of a [`Computed`](crate::Computed): carries identity and, through
/// [`try_get_cached_computed`](Self::try_get_cached_computed), the lookup half of the external
/// cache contract. The computation half lives in [`Function`], required only where a fresh
/// value might actually need producing.
pub trait ComputedInput: KeyIdentity {
	/// Looks up a still-live computed for `self` carrying the given [`LTag`], if the external
	/// cache still holds one. A miss is not an error — callers treat it as "already gone".
	fn try_get_cached_computed(&self, ltag: LTag) -> Option<Arc<dyn AnyComputed>>;
}

/// The computation side of a [`ComputedInput`]: produces or reuses a consistent
/// [`Computed<Self, Self::Output, Self::Error>`](crate::Computed) for `self`.
///
/// This is the "Function registry" collaborator the core depends on but does not implement:
/// deduplicating concurrent requests for the same input, deciding what "fresh" means, and
/// actually running user code all belong to whoever implements this trait.
pub trait Function: ComputedInput + Sized {
	type Output: Send + Sync + 'static;
	type Error: Send + Sync + 'static;

	/// Produces (or reuses) a consistent computed for `self`, installing `used_by` as a
	/// dependent of the result if given.
	fn invoke(
		self: &Arc<Self>,
		used_by: Option<DependentKey>,
		ctx: Option<Arc<ComputeContext>>,
		cancel: CancelToken,
	) -> BoxedFuture<Arc<crate::Computed<Self, Self::Output, Self::Error>>>;
}

/// The identity pair `(input, ltag)` stored in a node's `usedBy` set: enough to resolve back to
/// a live dependent through [`ComputedInput::try_get_cached_computed`], without the reverse edge
/// itself holding a strong reference that would keep the dependent alive.
#[derive(Clone)]
pub struct DependentKey {
	pub(crate) input: Arc<dyn ComputedInput>,
	pub(crate) ltag: LTag,
}

impl DependentKey {
	pub fn new(input: Arc<dyn ComputedInput>, ltag: LTag) -> Self {
		Self { input, ltag }
	}

	pub fn resolve(&self) -> Option<Arc<dyn AnyComputed>> {
		self.input.try_get_cached_computed(self.ltag)
	}
}

impl PartialEq for DependentKey {
	fn eq(&self, other: &Self) -> bool {
		self.ltag == other.ltag && self.input.eq_key(&*other.input)
	}
}

impl Eq for DependentKey {}

impl Hash for DependentKey {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.ltag.hash(state);
		self.input.hash_key(state);
	}
}

impl Debug for DependentKey {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("DependentKey")
			.field("input", &self.input)
			.field("ltag", &self.ltag)
			.finish()
	}
}
