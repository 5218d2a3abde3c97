//! The central node type: lifecycle, bidirectional dependency edges, the invalidation cascade
//! and the auto-invalidate timer, grounded on `isoprenoid::runtime`'s lock-snapshot-release-notify
//! shape and `pantsbuild-pants`'s `graph::entry::Entry` node layout.

use core::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};
use std::time::Duration;

use event_listener::Event;
use parking_lot::Mutex;

use crate::cancel::CancelToken;
use crate::clock::Moment;
use crate::context::{CallFlags, ComputeContext};
use crate::current;
use crate::error::WrongState;
use crate::function::{AnyComputed, ComputedInput, DependentKey, Function, NodeState};
use crate::ltag::LTag;
use crate::options::ComputedOptions;
use crate::result::{CResult, Freezable};

const COMPUTING: u8 = 0;
const CONSISTENT: u8 = 1;
const INVALIDATED: u8 = 2;

struct Inner<TOut, TErr> {
	output: Option<CResult<TOut, TErr>>,
	used: HashMap<DependentKey, Arc<dyn AnyComputed>>,
	used_by: HashSet<DependentKey>,
	invalidated_handlers: Vec<Box<dyn FnOnce() + Send>>,
	invalidate_on_set_output: bool,
	timer_cancel: Option<Arc<Event>>,
}

/// A memoized function result for one `(function, input)` pair, with a lifecycle
/// (`Computing → Consistent → Invalidated`) and bidirectional dependency edges to the other
/// computeds it used, and that used it.
pub struct Computed<TIn, TOut, TErr>
where
	TIn: ComputedInput + 'static,
	TOut: Freezable + Clone + Send + Sync + 'static,
	TErr: Clone + Send + Sync + 'static,
{
	input: Arc<TIn>,
	ltag: LTag,
	options: ComputedOptions,
	state: AtomicU8,
	last_access_time: AtomicU64,
	inner: Mutex<Inner<TOut, TErr>>,
}

impl<TIn, TOut, TErr> Computed<TIn, TOut, TErr>
where
	TIn: ComputedInput + 'static,
	TOut: Freezable + Clone + Send + Sync + 'static,
	TErr: Clone + Send + Sync + 'static,
{
	/// Creates a blank node in state `Computing`, to be filled in by a caller via
	/// [`set_output`](Self::set_output)/[`try_set_output`](Self::try_set_output).
	pub fn new_computing(input: Arc<TIn>, options: ComputedOptions) -> Arc<Self> {
		Arc::new(Self {
			input,
			ltag: LTag::next(),
			options,
			state: AtomicU8::new(COMPUTING),
			last_access_time: AtomicU64::new(Moment::now().as_nanos_since_epoch()),
			inner: Mutex::new(Inner {
				output: None,
				used: HashMap::new(),
				used_by: HashSet::new(),
				invalidated_handlers: Vec::new(),
				invalidate_on_set_output: false,
				timer_cancel: None,
			}),
		})
	}

	/// Creates a node that is immediately `Consistent` (or `Invalidated`, if `output` is later
	/// invalidated before anyone observes it) with the given output already set.
	pub fn new_with_output(
		input: Arc<TIn>,
		options: ComputedOptions,
		output: CResult<TOut, TErr>,
	) -> Arc<Self> {
		let node = Self::new_computing(input, options);
		node.set_output(output);
		node
	}

	pub fn ltag(&self) -> LTag {
		self.ltag
	}

	pub fn input(&self) -> &Arc<TIn> {
		&self.input
	}

	pub fn options(&self) -> ComputedOptions {
		self.options
	}

	fn node_state(&self) -> NodeState {
		match self.state.load(Ordering::Acquire) {
			COMPUTING => NodeState::Computing,
			CONSISTENT => NodeState::Consistent,
			INVALIDATED => NodeState::Invalidated,
			other => unreachable!("invalid node state byte {other}"),
		}
	}

	/// Reads the output, panicking if this node hasn't left `Computing` yet.
	pub fn output(&self) -> Result<TOut, TErr> {
		match self.try_output() {
			Some(result) => result,
			None => std::panic::panic_any(WrongState::new("output read while still Computing")),
		}
	}

	/// Reads the output, returning `None` instead of panicking if this node hasn't left
	/// `Computing` yet.
	pub fn try_output(&self) -> Option<Result<TOut, TErr>> {
		let inner = self.inner.lock();
		inner.output.clone().map(CResult::into_result)
	}

	/// Like [`try_set_output`](Self::try_set_output), but panics instead of returning `false`.
	pub fn set_output(self: &Arc<Self>, output: CResult<TOut, TErr>) {
		if !self.try_set_output(output) {
			std::panic::panic_any(WrongState::new("set_output called while not Computing"));
		}
	}

	/// Publishes `output`, transitioning `Computing → Consistent` (or, if [`invalidate`] was
	/// called while still computing, straight through to `Invalidated`). Returns `false` without
	/// effect if this node has already left `Computing`.
	///
	/// [`invalidate`]: Self::invalidate
	pub fn try_set_output(self: &Arc<Self>, output: CResult<TOut, TErr>) -> bool {
		if let CResult::Value(value) = &output {
			value.freeze();
		}
		let is_error = output.has_error();

		enum Next {
			Consistent,
			Invalidated(
				HashMap<DependentKey, Arc<dyn AnyComputed>>,
				Vec<Box<dyn FnOnce() + Send>>,
			),
		}

		let next = {
			let mut inner = self.inner.lock();
			if self.node_state() != NodeState::Computing {
				return false;
			}
			let invalidate_now = inner.invalidate_on_set_output;
			inner.invalidate_on_set_output = false;
			inner.output = Some(output);
			if invalidate_now {
				self.state.store(INVALIDATED, Ordering::Release);
				let used = std::mem::take(&mut inner.used);
				let handlers = std::mem::take(&mut inner.invalidated_handlers);
				Next::Invalidated(used, handlers)
			} else {
				self.state.store(CONSISTENT, Ordering::Release);
				Next::Consistent
			}
		};

		match next {
			Next::Invalidated(used, handlers) => {
				self.finish_invalidation(used, HashSet::new(), handlers, None);
			}
			Next::Consistent => {
				let timeout = if is_error {
					self.options.error_auto_invalidate_time()
				} else {
					self.options.auto_invalidate_time()
				};
				if let Some(duration) = timeout {
					self.arm_auto_invalidate_timer(duration);
				}
			}
		}
		true
	}

	/// Registers `handler` to run exactly once, the first time this node is invalidated. If the
	/// node is already `Invalidated`, runs `handler` synchronously instead.
	pub fn on_invalidate(&self, handler: impl FnOnce() + Send + 'static) {
		let mut inner = self.inner.lock();
		if self.node_state() == NodeState::Invalidated {
			drop(inner);
			handler();
		} else {
			inner.invalidated_handlers.push(Box::new(handler));
		}
	}

	fn arm_auto_invalidate_timer(self: &Arc<Self>, duration: Duration) {
		let event = Arc::new(Event::new());
		self.inner.lock().timer_cancel = Some(event.clone());
		let weak: Weak<Self> = Arc::downgrade(self);
		std::thread::spawn(move || {
			let listener = event.listen();
			if listener.wait_timeout(duration) {
				// notified: some other path already invalidated this node.
				return;
			}
			if let Some(node) = weak.upgrade() {
				node.invalidate();
			}
		});
	}

	fn finish_invalidation(
		&self,
		used: HashMap<DependentKey, Arc<dyn AnyComputed>>,
		used_by: HashSet<DependentKey>,
		handlers: Vec<Box<dyn FnOnce() + Send>>,
		timer_cancel: Option<Arc<Event>>,
	) {
		let own_key = self.dependent_key();
		for (_, dependency) in used {
			dependency.remove_used_by(&own_key);
		}
		for handler in handlers {
			if std::panic::catch_unwind(std::panic::AssertUnwindSafe(handler)).is_err() {
				log::debug!("invalidation handler panicked; cascade continues");
			}
		}
		if let Some(event) = timer_cancel {
			event.notify(usize::MAX);
		}
		if !used_by.is_empty() {
			log::debug!("invalidating node with {} dependents", used_by.len());
		}
		for key in used_by {
			if let Some(dependent) = key.resolve() {
				log::trace!("cascading invalidation to dependent");
				dependent.invalidate();
			}
		}
	}

	/// Either reuses this node (registering a dependency edge onto the current computation, if
	/// any) or, if it isn't `Consistent`, delegates to `Function::invoke` to obtain a fresh one.
	pub async fn update(
		self: &Arc<Self>,
		add_dependency: bool,
		ctx: Option<Arc<ComputeContext>>,
		cancel: CancelToken,
	) -> Arc<Self>
	where
		TIn: Function<Output = TOut, Error = TErr>,
	{
		let used_by = if add_dependency {
			current::current_computation()
		} else {
			None
		};

		if self.node_state() != NodeState::Consistent {
			let dependent_key = used_by.as_ref().map(|dependent| dependent.dependent_key());
			return self.input.invoke(dependent_key, ctx, cancel).await;
		}

		let effective_ctx = ctx.or_else(current::current_context);
		let _scope = effective_ctx.as_ref().map(|ctx| ctx.use_scoped());

		if let Some(ctx) = &effective_ctx {
			if ctx.call_flags().contains(CallFlags::INVALIDATE) {
				self.invalidate();
			}
		}

		if let Some(dependent) = &used_by {
			let erased: Arc<dyn AnyComputed> = self.clone();
			install_used_edge(dependent, erased);
		}

		if let Some(ctx) = &effective_ctx {
			let erased: Arc<dyn AnyComputed> = self.clone();
			ctx.try_capture_value(erased);
		}

		self.clone()
	}

	/// Resolves to this node's value (or error), always trying to register a dependency edge
	/// onto the current computation first.
	pub async fn use_value(
		self: &Arc<Self>,
		ctx: Option<Arc<ComputeContext>>,
		cancel: CancelToken,
	) -> Result<TOut, TErr>
	where
		TIn: Function<Output = TOut, Error = TErr>,
	{
		let node = self.update(true, ctx, cancel).await;
		node.touch();
		node.output()
	}
}

/// Installs a `used`/`usedBy` edge pair between an already-erased dependent (`B`, currently
/// `Computing`) and dependency (`A`). Lock order: `B` is only ever read (never locked across the
/// call into `A`), so deadlock is impossible as long as every edge installation goes through
/// this function.
pub(crate) fn install_used_edge(dependent: &Arc<dyn AnyComputed>, dependency: Arc<dyn AnyComputed>) {
	match dependent.state() {
		NodeState::Consistent => {
			std::panic::panic_any(WrongState::new(
				"a dependency edge can't be added once the dependent is Consistent",
			));
		}
		NodeState::Invalidated => {
			// Late edge onto an already-dead computation: drop it.
		}
		NodeState::Computing => {
			let dependent_key = dependent.dependent_key();
			dependency.add_used_by(dependent_key, dependent.clone());
			dependent.record_used(dependency);
		}
	}
}

impl<TIn, TOut, TErr> AnyComputed for Computed<TIn, TOut, TErr>
where
	TIn: ComputedInput + 'static,
	TOut: Freezable + Clone + Send + Sync + 'static,
	TErr: Clone + Send + Sync + 'static,
{
	fn state(&self) -> NodeState {
		self.node_state()
	}

	fn invalidate(&self) -> bool {
		if self.node_state() == NodeState::Invalidated {
			return false;
		}
		let snapshot = {
			let mut inner = self.inner.lock();
			match self.node_state() {
				NodeState::Invalidated => None,
				NodeState::Computing => {
					inner.invalidate_on_set_output = true;
					return true;
				}
				NodeState::Consistent => {
					self.state.store(INVALIDATED, Ordering::Release);
					let used = std::mem::take(&mut inner.used);
					let used_by = std::mem::take(&mut inner.used_by);
					let handlers = std::mem::take(&mut inner.invalidated_handlers);
					let timer_cancel = inner.timer_cancel.take();
					Some((used, used_by, handlers, timer_cancel))
				}
			}
		};
		match snapshot {
			None => false,
			Some((used, used_by, handlers, timer_cancel)) => {
				self.finish_invalidation(used, used_by, handlers, timer_cancel);
				true
			}
		}
	}

	fn touch(&self) {
		self.last_access_time
			.store(Moment::now().as_nanos_since_epoch(), Ordering::Release);
	}

	fn last_access_time(&self) -> Moment {
		Moment::from_nanos_since_epoch(self.last_access_time.load(Ordering::Acquire))
	}

	fn dependent_key(&self) -> DependentKey {
		let erased: Arc<dyn ComputedInput> = self.input.clone();
		DependentKey::new(erased, self.ltag)
	}

	fn add_used_by(&self, dependent_key: DependentKey, dependent: Arc<dyn AnyComputed>) {
		let mut inner = self.inner.lock();
		match self.node_state() {
			NodeState::Computing => {
				drop(inner);
				std::panic::panic_any(WrongState::new(
					"add_used_by called while the dependency is still Computing",
				));
			}
			NodeState::Invalidated => {
				drop(inner);
				dependent.invalidate();
			}
			NodeState::Consistent => {
				inner.used_by.insert(dependent_key);
			}
		}
	}

	fn remove_used_by(&self, dependent_key: &DependentKey) {
		self.inner.lock().used_by.remove(dependent_key);
	}

	fn record_used(&self, dependency: Arc<dyn AnyComputed>) {
		let key = dependency.dependent_key();
		self.inner.lock().used.insert(key, dependency);
	}
}
