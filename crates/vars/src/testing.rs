//! Test doubles and helpers shared by unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::context::UpdateContext;
use crate::error::VariableError;
use crate::set::SchedulerEvent;
use crate::variants::{MultiValueConfig, MultiValueVariable, OptionSource, VariableOption};

const WAIT: Duration = Duration::from_secs(2);

pub(crate) fn init_tracing() {
	let _ = tracing_subscriber::fmt().with_test_writer().with_max_level(tracing::Level::TRACE).try_init();
}

/// One parked fetch of a [`ScriptedSource`].
pub(crate) struct Fetch {
	pub query: String,
	reply: oneshot::Sender<Result<Vec<VariableOption>, VariableError>>,
}

impl Fetch {
	pub fn respond(self, values: &[&str]) {
		let _ = self.reply.send(Ok(values.iter().map(|v| VariableOption::plain(*v)).collect()));
	}

	pub fn respond_options(self, options: Vec<VariableOption>) {
		let _ = self.reply.send(Ok(options));
	}

	pub fn fail(self, message: &str) {
		let _ = self.reply.send(Err(VariableError::Source(message.to_string())));
	}

	/// Answers as a source that gave up on the request itself.
	pub fn abandon(self) {
		let _ = self.reply.send(Err(VariableError::Cancelled));
	}
}

/// Option source that parks every fetch until the test answers it.
pub(crate) struct ScriptedSource {
	fetches: mpsc::UnboundedSender<Fetch>,
	cancels: AtomicUsize,
}

/// Receiving end of a [`ScriptedSource`].
pub(crate) struct Fetches {
	rx: mpsc::UnboundedReceiver<Fetch>,
}

impl ScriptedSource {
	pub fn new() -> (Arc<Self>, Fetches) {
		let (tx, rx) = mpsc::unbounded_channel();
		let source = Arc::new(Self {
			fetches: tx,
			cancels: AtomicUsize::new(0),
		});
		(source, Fetches { rx })
	}

	pub fn cancels(&self) -> usize {
		self.cancels.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl OptionSource for ScriptedSource {
	async fn options(&self, query: &str, _ctx: &UpdateContext) -> Result<Vec<VariableOption>, VariableError> {
		let (reply, rx) = oneshot::channel();
		let fetch = Fetch {
			query: query.to_string(),
			reply,
		};
		if self.fetches.send(fetch).is_err() {
			return Err(VariableError::Cancelled);
		}
		rx.await.unwrap_or(Err(VariableError::Cancelled))
	}

	fn cancel(&self) {
		self.cancels.fetch_add(1, Ordering::SeqCst);
	}
}

impl Fetches {
	pub async fn next(&mut self) -> Fetch {
		tokio::time::timeout(WAIT, self.rx.recv())
			.await
			.expect("timed out waiting for a fetch")
			.expect("source dropped")
	}

	/// Asserts that no fetch arrives within a short grace period.
	pub async fn assert_idle(&mut self) {
		if let Ok(Some(fetch)) = tokio::time::timeout(Duration::from_millis(50), self.rx.recv()).await {
			panic!("unexpected fetch for query {:?}", fetch.query);
		}
	}
}

/// Single-select variable over a fresh scripted source.
pub(crate) fn scripted(name: &str, query: &str) -> (Arc<MultiValueVariable>, Arc<ScriptedSource>, Fetches) {
	scripted_with(name, query, MultiValueConfig::default())
}

pub(crate) fn scripted_with(name: &str, query: &str, config: MultiValueConfig) -> (Arc<MultiValueVariable>, Arc<ScriptedSource>, Fetches) {
	let (source, fetches) = ScriptedSource::new();
	let variable = Arc::new(MultiValueVariable::with_source(name, query, source.clone(), config));
	(variable, source, fetches)
}

/// Waits for the first event matching `pred`, returning it.
pub(crate) async fn wait_for(rx: &mut broadcast::Receiver<SchedulerEvent>, pred: impl Fn(&SchedulerEvent) -> bool) -> SchedulerEvent {
	tokio::time::timeout(WAIT, async {
		loop {
			match rx.recv().await {
				Ok(event) if pred(&event) => return event,
				Ok(_) => {}
				Err(broadcast::error::RecvError::Lagged(_)) => {}
				Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
			}
		}
	})
	.await
	.expect("timed out waiting for scheduler event")
}

/// Drains events already buffered in `rx`.
pub(crate) fn drain(rx: &mut broadcast::Receiver<SchedulerEvent>) -> Vec<SchedulerEvent> {
	let mut out = Vec::new();
	while let Ok(event) = rx.try_recv() {
		out.push(event);
	}
	out
}

/// Collects events up to and including the next [`SchedulerEvent::Idle`].
pub(crate) async fn until_idle(rx: &mut broadcast::Receiver<SchedulerEvent>) -> Vec<SchedulerEvent> {
	tokio::time::timeout(WAIT, async {
		let mut out = Vec::new();
		loop {
			match rx.recv().await {
				Ok(SchedulerEvent::Idle) => {
					out.push(SchedulerEvent::Idle);
					return out;
				}
				Ok(event) => out.push(event),
				Err(broadcast::error::RecvError::Lagged(_)) => {}
				Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
			}
		}
	})
	.await
	.expect("timed out waiting for idle")
}
