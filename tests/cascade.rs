//! Exercises the invalidation cascade (P4-P6) by wiring `used`/`usedBy` edges directly through
//! the object-safe `AnyComputed` facet, the way a `Function` implementor's `invoke` would.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

use computed_core::{AnyComputed, CResult, Computed, ComputedInput, ComputedOptions, LTag, NodeState};

struct Key {
	name: &'static str,
	slot: Mutex<Option<(LTag, Arc<dyn AnyComputed>)>>,
}

impl Key {
	fn new(name: &'static str) -> Arc<Self> {
		Arc::new(Self {
			name,
			slot: Mutex::new(None),
		})
	}

	fn publish(&self, node: &Arc<Computed<Key, i64, String>>) {
		*self.slot.lock().unwrap() = Some((node.ltag(), node.clone()));
	}
}

impl fmt::Debug for Key {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Key").field("name", &self.name).finish()
	}
}

impl PartialEq for Key {
	fn eq(&self, other: &Self) -> bool {
		self.name == other.name
	}
}

impl Eq for Key {}

impl Hash for Key {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.name.hash(state);
	}
}

impl ComputedInput for Key {
	fn try_get_cached_computed(&self, ltag: LTag) -> Option<Arc<dyn AnyComputed>> {
		let slot = self.slot.lock().unwrap();
		match &*slot {
			Some((tag, node)) if *tag == ltag => Some(node.clone()),
			_ => None,
		}
	}
}

/// Wires `dependent` as depending on `dependency`. Per the edge-installation contract,
/// `dependency` must already be `Consistent` (or `Invalidated`); `dependent` must still be
/// `Computing`.
fn wire(dependency: &Arc<Computed<Key, i64, String>>, dependent: &Arc<Computed<Key, i64, String>>) {
	let dependent_erased: Arc<dyn AnyComputed> = dependent.clone();
	let dependency_erased: Arc<dyn AnyComputed> = dependency.clone();
	dependency_erased.add_used_by(dependent_erased.dependent_key(), dependent_erased.clone());
	dependent_erased.record_used(dependency_erased);
}

#[test]
fn invalidating_a_dependency_cascades_to_its_dependent() {
	let a_key = Key::new("a");
	let b_key = Key::new("b");

	let a = Computed::new_computing(a_key.clone(), ComputedOptions::new());
	a.set_output(CResult::Value(1));
	a_key.publish(&a);

	let b = Computed::new_computing(b_key.clone(), ComputedOptions::new());
	wire(&a, &b);
	b.set_output(CResult::Value(2));
	b_key.publish(&b);

	assert!(a.invalidate());
	assert_eq!(b.state(), NodeState::Invalidated);
}

#[test]
fn invalidation_is_a_multi_level_chain() {
	let a_key = Key::new("a");
	let b_key = Key::new("b");
	let c_key = Key::new("c");

	let a = Computed::new_computing(a_key.clone(), ComputedOptions::new());
	a.set_output(CResult::Value(1));
	a_key.publish(&a);

	let b = Computed::new_computing(b_key.clone(), ComputedOptions::new());
	wire(&a, &b);
	b.set_output(CResult::Value(2));
	b_key.publish(&b);

	let c = Computed::new_computing(c_key.clone(), ComputedOptions::new());
	wire(&b, &c);
	c.set_output(CResult::Value(3));
	c_key.publish(&c);

	a.invalidate();
	assert_eq!(b.state(), NodeState::Invalidated);
	assert_eq!(c.state(), NodeState::Invalidated);
}

#[test]
fn invalidation_skips_dependents_the_cache_has_already_dropped() {
	let a_key = Key::new("a");
	let b_key = Key::new("b");

	let a = Computed::new_computing(a_key.clone(), ComputedOptions::new());
	a.set_output(CResult::Value(1));
	a_key.publish(&a);

	let b = Computed::new_computing(b_key.clone(), ComputedOptions::new());
	wire(&a, &b);
	b.set_output(CResult::Value(2));
	// b_key is deliberately never published: try_get_cached_computed will miss.

	// Must not panic even though the reverse edge can no longer be resolved.
	assert!(a.invalidate());
}

#[test]
fn panicking_handler_does_not_stop_the_cascade() {
	let a_key = Key::new("a");
	let b_key = Key::new("b");

	let a = Computed::new_computing(a_key.clone(), ComputedOptions::new());
	a.set_output(CResult::Value(1));
	a_key.publish(&a);

	let b = Computed::new_computing(b_key.clone(), ComputedOptions::new());
	wire(&a, &b);
	b.set_output(CResult::Value(2));
	b_key.publish(&b);

	a.on_invalidate(|| panic!("handler blows up"));
	assert!(a.invalidate());
	assert_eq!(b.state(), NodeState::Invalidated);
}

#[test]
fn invalidation_clears_the_reverse_edge_on_the_dependency() {
	let a_key = Key::new("a");
	let b_key = Key::new("b");

	let a = Computed::new_computing(a_key.clone(), ComputedOptions::new());
	a.set_output(CResult::Value(1));
	a_key.publish(&a);

	let b = Computed::new_computing(b_key.clone(), ComputedOptions::new());
	wire(&a, &b);
	b.set_output(CResult::Value(2));
	b_key.publish(&b);

	// Invalidating the dependent first must remove its entry from `a`'s usedBy set; a later,
	// independent invalidation of `a` must still succeed and not try to reach `b` again.
	b.invalidate();
	assert!(a.invalidate());
}
