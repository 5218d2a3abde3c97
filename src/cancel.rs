use std::sync::{
	atomic::{AtomicBool, Ordering},
	Arc,
};

use event_listener::Event;

struct Shared {
	canceled: AtomicBool,
	event: Event,
}

/// Cooperative cancellation handle forwarded verbatim through [`update`](crate::Computed::update)
/// and [`use_value`](crate::Computed::use_value) into `Function::invoke`.
///
/// Cancellation here is advisory: the core never inspects it itself, it only carries it to the
/// out-of-scope `Function` implementor, which decides whether and how to honour it.
#[derive(Clone)]
pub struct CancelToken {
	shared: Arc<Shared>,
}

/// The other half of a [`CancelToken`], held by whoever may need to cancel an in-flight
/// operation.
pub struct CancelHandle {
	shared: Arc<Shared>,
}

/// Creates a fresh, not-yet-cancelled token/handle pair.
pub fn cancel_pair() -> (CancelToken, CancelHandle) {
	let shared = Arc::new(Shared {
		canceled: AtomicBool::new(false),
		event: Event::new(),
	});
	(
		CancelToken {
			shared: shared.clone(),
		},
		CancelHandle { shared },
	)
}

impl CancelToken {
	/// A token that can never be cancelled, for call sites with nothing to cancel.
	pub fn never() -> Self {
		cancel_pair().0
	}

	/// Non-blocking check: has [`CancelHandle::cancel`] been called yet?
	pub fn is_canceled(&self) -> bool {
		self.shared.canceled.load(Ordering::Acquire)
	}

	/// Suspends until [`CancelHandle::cancel`] is called, returning immediately if it already
	/// has been.
	pub async fn cancelled(&self) {
		if self.is_canceled() {
			return;
		}
		let listener = self.shared.event.listen();
		if self.is_canceled() {
			return;
		}
		listener.await;
	}
}

impl CancelHandle {
	/// Marks the token cancelled and wakes every current and future listener.
	pub fn cancel(&self) {
		self.shared.canceled.store(true, Ordering::Release);
		self.shared.event.notify(usize::MAX);
	}
}
