//! Injection point just before a reply is decoded.
//!
//! Production connections run without a hook. Tests install a [`SyncPoint`]
//! through [`Dialer::decode_hook`](crate::Dialer::decode_hook) to pause a
//! round trip after its request is on the wire and before its reply is read.

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::sync::oneshot;

#[async_trait]
pub trait DecodeHook: Send + Sync {
	/// Called by the round-trip task after the request has been flushed.
	async fn before_decode(&self);
}

/// One-shot rendezvous with a round-trip task.
#[derive(Debug, Default)]
pub struct SyncPoint {
	armed: Mutex<Option<oneshot::Sender<Paused>>>,
}

/// A round trip held at the decode hook. It continues when this handle is
/// resumed or dropped.
#[derive(Debug)]
pub struct Paused {
	resume: oneshot::Sender<()>,
}

impl Paused {
	pub fn resume(self) {
		let _ = self.resume.send(());
	}
}

impl SyncPoint {
	pub fn new() -> Self {
		Self::default()
	}

	/// Arm the point for the next round trip that reaches it.
	///
	/// Re-arming replaces an earlier, unused arming.
	pub async fn arm(&self) -> oneshot::Receiver<Paused> {
		let (tx, rx) = oneshot::channel();
		*self.armed.lock().await = Some(tx);
		rx
	}
}

#[async_trait]
impl DecodeHook for SyncPoint {
	async fn before_decode(&self) {
		let Some(notify) = self.armed.lock().await.take() else {
			return;
		};
		let (resume, resumed) = oneshot::channel();
		if notify.send(Paused { resume }).is_err() {
			return;
		}
		let _ = resumed.await;
	}
}
