#![warn(
	clippy::all,
	clippy::pedantic,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::nursery,
	clippy::unwrap_used,
	unused_qualifications,
	rust_2018_idioms,
	trivial_casts,
	trivial_numeric_casts,
	unused_allocation,
	clippy::unnecessary_cast,
	clippy::cast_lossless,
	clippy::cast_possible_truncation,
	clippy::cast_possible_wrap,
	clippy::cast_precision_loss,
	clippy::cast_sign_loss,
	clippy::dbg_macro,
	clippy::deprecated_cfg_attr,
	clippy::separated_literal_suffix,
	deprecated
)]
#![forbid(deprecated_in_future)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

//! Long-lived tasks bound to a cancellable execution scope.
//!
//! An [`ExecutionScope`] owns a root cancellation token. Every actor spawned into the scope
//! receives a [`Stopper`] derived from that token, so cancelling the scope asks all of them to
//! stop at their next checkpoint. [`ExecutionScope::cancel_and_wait`] then joins every actor,
//! aborting those that don't finish within the configured stop timeout.

use std::{
	collections::HashMap,
	fmt,
	future::{Future, IntoFuture},
	hash::Hash,
	marker::PhantomData,
	panic::AssertUnwindSafe,
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc,
	},
	time::Duration,
};

use futures::FutureExt;
use tokio::{spawn, sync::Mutex, task::JoinHandle, time::timeout};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{debug, error, instrument, warn};

const ONE_MINUTE: Duration = Duration::from_secs(60);

pub trait ActorId: Hash + Eq + Send + Sync + Clone + fmt::Debug + fmt::Display + 'static {}

impl<T: Hash + Eq + Send + Sync + Clone + fmt::Debug + fmt::Display + 'static> ActorId for T {}

pub trait Actor<Id: ActorId>: Send + 'static {
	fn identifier(&self) -> Id;

	fn run(&mut self, stop: Stopper) -> impl Future<Output = ()> + Send;
}

mod sealed {
	pub trait Sealed {}
}

#[async_trait::async_trait]
pub trait DynActor<Id: ActorId>: Send + sealed::Sealed + 'static {
	async fn run(&mut self, stop: Stopper);
}

pub trait IntoActor<Id: ActorId>: Send {
	fn into_actor(self) -> (Id, Box<dyn DynActor<Id>>);
}

struct AnyActor<Id: ActorId, A: Actor<Id>> {
	actor: A,
	_marker: PhantomData<fn() -> Id>,
}

impl<Id: ActorId, A: Actor<Id>> sealed::Sealed for AnyActor<Id, A> {}

#[async_trait::async_trait]
impl<Id: ActorId, A: Actor<Id>> DynActor<Id> for AnyActor<Id, A> {
	async fn run(&mut self, stop: Stopper) {
		self.actor.run(stop).await;
	}
}

impl<Id: ActorId, A: Actor<Id>> IntoActor<Id> for A {
	fn into_actor(self) -> (Id, Box<dyn DynActor<Id>>) {
		(
			self.identifier(),
			Box::new(AnyActor {
				actor: self,
				_marker: PhantomData,
			}),
		)
	}
}

struct ActorHandler {
	handle: JoinHandle<()>,
	is_running: Arc<AtomicBool>,
}

/// Holds every actor started during one leadership term.
///
/// The scope is single use: once cancelled it refuses new actors, a new term builds a new scope.
pub struct ExecutionScope<Id: ActorId> {
	root: CancellationToken,
	stop_timeout: Duration,
	actors_map: Mutex<HashMap<Id, ActorHandler>>,
}

impl<Id: ActorId> ExecutionScope<Id> {
	#[must_use]
	pub fn new() -> Self {
		Self::with_stop_timeout(ONE_MINUTE)
	}

	#[must_use]
	pub fn with_stop_timeout(stop_timeout: Duration) -> Self {
		Self {
			root: CancellationToken::new(),
			stop_timeout,
			actors_map: Mutex::default(),
		}
	}

	/// Spawns the actor on the tokio runtime, returns `false` if the scope is already
	/// cancelled or an actor with the same identifier is still running.
	#[instrument(skip_all)]
	pub async fn spawn(&self, actor: impl IntoActor<Id>) -> bool {
		let (identifier, mut actor) = actor.into_actor();

		if self.root.is_cancelled() {
			warn!(actor = %identifier, "Execution scope already cancelled, refusing new actor");
			return false;
		}

		let mut actors_map = self.actors_map.lock().await;
		if let Some(existing) = actors_map.get(&identifier) {
			if existing.is_running.load(Ordering::Acquire) {
				warn!(actor = %identifier, "Actor already running!");
				return false;
			}
		}

		let is_running = Arc::new(AtomicBool::new(true));
		let stopper = Stopper(self.root.child_token());

		let handle = spawn({
			let is_running = Arc::clone(&is_running);
			let identifier = identifier.clone();

			async move {
				if AssertUnwindSafe(actor.run(stopper))
					.catch_unwind()
					.await
					.is_err()
				{
					error!(actor = %identifier, "Actor unexpectedly panicked");
				}

				is_running.store(false, Ordering::Release);
				debug!(actor = %identifier, "Actor finished");
			}
		});

		actors_map.insert(identifier, ActorHandler { handle, is_running });

		true
	}

	/// A token that fires when this scope is cancelled, for work that isn't an actor.
	#[must_use]
	pub fn child_token(&self) -> CancellationToken {
		self.root.child_token()
	}

	#[must_use]
	pub fn is_cancelled(&self) -> bool {
		self.root.is_cancelled()
	}

	/// Signals every actor to stop and joins them, aborting stragglers after the stop timeout.
	#[instrument(skip(self))]
	pub async fn cancel_and_wait(&self) {
		self.root.cancel();

		let actors = self.actors_map.lock().await.drain().collect::<Vec<_>>();

		for (identifier, actor) in actors {
			wait_stop_or_abort(&identifier, actor.handle, self.stop_timeout).await;
			actor.is_running.store(false, Ordering::Release);
		}
	}

	pub async fn get_state(&self) -> Vec<(String, bool)> {
		self.actors_map
			.lock()
			.await
			.iter()
			.map(|(identifier, actor)| {
				(
					identifier.to_string(),
					actor.is_running.load(Ordering::Relaxed),
				)
			})
			.collect()
	}
}

impl<Id: ActorId> Default for ExecutionScope<Id> {
	fn default() -> Self {
		Self::new()
	}
}

impl<Id: ActorId> Drop for ExecutionScope<Id> {
	fn drop(&mut self) {
		self.root.cancel();
	}
}

pub struct Stopper(CancellationToken);

impl Stopper {
	#[must_use]
	pub fn check_stop(&self) -> bool {
		self.0.is_cancelled()
	}

	#[must_use]
	pub fn token(&self) -> &CancellationToken {
		&self.0
	}
}

impl<'stopper> IntoFuture for &'stopper Stopper {
	type Output = ();
	type IntoFuture = WaitForCancellationFuture<'stopper>;

	fn into_future(self) -> Self::IntoFuture {
		self.0.cancelled()
	}
}

async fn wait_stop_or_abort<Id: ActorId>(
	identifier: &Id,
	handle: JoinHandle<()>,
	stop_timeout: Duration,
) {
	let abort_handle = handle.abort_handle();

	match timeout(stop_timeout, handle).await {
		Ok(Ok(())) => {}
		Ok(Err(e)) => {
			// Panics are caught inside the task, so this is a cancelled join.
			warn!(actor = %identifier, ?e, "Actor task ended abnormally");
		}
		Err(_) => {
			error!(
				actor = %identifier,
				"Actor failed to gracefully stop in the allotted time, will force abortion"
			);
			abort_handle.abort();
		}
	}
}
