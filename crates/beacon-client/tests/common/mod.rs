//! Shared fixtures for hub integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use beacon_client::{Subscription, StopReason};
use beacon_core::{AccountId, Notification, NotificationKind};
use beacon_stream::{EventSource, NotificationStream, StreamError, StreamResult};
use futures::StreamExt;
use futures::channel::mpsc;
use parking_lot::Mutex;

pub const TIMEOUT: Duration = Duration::from_secs(5);

pub type Feed = mpsc::UnboundedSender<Result<Notification, StreamError>>;

enum Response {
    Fail(StreamError),
    Live(mpsc::UnboundedReceiver<Result<Notification, StreamError>>),
}

/// Event source driven by the test: queue failures or live feeds, then push
/// notifications through the returned [`Feed`]. Once the queue is empty,
/// every open succeeds with a stream that never yields.
#[derive(Default)]
pub struct FakeSource {
    responses: Mutex<VecDeque<Response>>,
    opens: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_live(&self) -> Feed {
        let (tx, rx) = mpsc::unbounded();
        self.responses.lock().push_back(Response::Live(rx));
        tx
    }

    pub fn push_fail(&self, err: StreamError) {
        self.responses.lock().push_back(Response::Fail(err));
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventSource for FakeSource {
    async fn open(&self, _account: &AccountId) -> StreamResult<NotificationStream> {
        let _ = self.opens.fetch_add(1, Ordering::SeqCst);
        let next = self.responses.lock().pop_front();
        match next {
            Some(Response::Fail(err)) => Err(err),
            Some(Response::Live(rx)) => Ok(rx.boxed()),
            None => Ok(futures::stream::pending().boxed()),
        }
    }
}

pub fn note(kind: NotificationKind, message: &str) -> Notification {
    Notification::new(kind, "title", message)
}

pub async fn within<F: Future>(fut: F) -> F::Output {
    tokio::time::timeout(TIMEOUT, fut).await.expect("timed out")
}

pub async fn wait_connected(sub: &Subscription, value: bool) {
    let mut rx = sub.connectivity();
    let _ = within(rx.wait_for(|c| *c == value))
        .await
        .expect("connectivity sender dropped");
}

pub async fn wait_until<F: Fn() -> bool>(check: F) {
    within(async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
}

pub async fn stopped(sub: &mut Subscription) -> Option<StopReason> {
    within(sub.stopped()).await
}
