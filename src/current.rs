//! The thread-local "current computation" and "current context" slots used to capture
//! dependency edges implicitly during a nested computation, mirroring the push/pop-with-assert
//! discipline `isoprenoid::runtime` keeps on its own `context_stack`.

use std::cell::RefCell;
use std::sync::Arc;

use crate::context::ComputeContext;
use crate::function::AnyComputed;

thread_local! {
	static COMPUTATION_STACK: RefCell<Vec<Arc<dyn AnyComputed>>> = const { RefCell::new(Vec::new()) };
	static CURRENT_CONTEXT: RefCell<Option<Arc<ComputeContext>>> = const { RefCell::new(None) };
}

/// The computed currently being built on this thread, if any.
pub fn current_computation() -> Option<Arc<dyn AnyComputed>> {
	COMPUTATION_STACK.with(|stack| stack.borrow().last().cloned())
}

/// RAII guard pushing `node` as the current computation for its lifetime.
pub struct ComputationGuard {
	_private: (),
}

/// Pushes `node` onto the current-computation stack; the returned guard pops it again on drop,
/// including on an unwinding panic, so nested computations compose correctly regardless of how
/// an inner one exits.
pub fn enter_computation(node: Arc<dyn AnyComputed>) -> ComputationGuard {
	COMPUTATION_STACK.with(|stack| stack.borrow_mut().push(node));
	ComputationGuard { _private: () }
}

impl Drop for ComputationGuard {
	fn drop(&mut self) {
		COMPUTATION_STACK.with(|stack| {
			let popped = stack.borrow_mut().pop();
			debug_assert!(popped.is_some(), "computation stack underflow");
		});
	}
}

pub(crate) fn current_context() -> Option<Arc<ComputeContext>> {
	CURRENT_CONTEXT.with(|cell| cell.borrow().clone())
}

pub(crate) fn swap_context(
	new: Option<Arc<ComputeContext>>,
) -> Option<Arc<ComputeContext>> {
	CURRENT_CONTEXT.with(|cell| cell.replace(new))
}
