//! S3: router start/stop idempotency against a mock registrar.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use pubsub_router_base::metrics::RouterMetrics;
use pubsub_router_base::registrar::{IncomingStream, Receipt, Registrar, Topology};
use pubsub_router_base::{PeerId, PubsubRouter, RouterConfig, RouterCore, RouterError};

struct MockRegistrar {
    handle_calls: AtomicUsize,
    register_calls: AtomicUsize,
    unregister_calls: AtomicUsize,
}

impl MockRegistrar {
    fn new() -> Self {
        Self {
            handle_calls: AtomicUsize::new(0),
            register_calls: AtomicUsize::new(0),
            unregister_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Registrar for MockRegistrar {
    async fn handle(&self, _multicodecs: Vec<String>, _handler: Arc<dyn Fn(IncomingStream) + Send + Sync>) {
        self.handle_calls.fetch_add(1, Ordering::SeqCst);
    }

    async fn register(&self, _topology: Arc<dyn Topology>) -> Receipt {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        Receipt(42)
    }

    async fn unregister(&self, _receipt: Receipt) {
        self.unregister_calls.fetch_add(1, Ordering::SeqCst);
    }
}

struct EmptyRouter {
    core: Arc<RouterCore>,
}

#[async_trait]
impl PubsubRouter for EmptyRouter {
    fn core(&self) -> &Arc<RouterCore> {
        &self.core
    }
}

fn build_router(registrar: Arc<MockRegistrar>) -> (Arc<RouterCore>, Arc<dyn PubsubRouter>) {
    let config = RouterConfig::new(
        "lifecycle-test",
        vec!["/pubsub/1.0.0".into()],
        PeerId::generate_ed25519(),
        registrar,
        true,
        true,
    )
    .unwrap();
    let core = RouterCore::new(config, Arc::new(RouterMetrics::new().unwrap()));
    let router: Arc<dyn PubsubRouter> = Arc::new(EmptyRouter { core: Arc::clone(&core) });
    (core, router)
}

#[tokio::test]
async fn start_then_stop_invokes_registrar_exactly_once_each() {
    let registrar = Arc::new(MockRegistrar::new());
    let (core, router) = build_router(Arc::clone(&registrar));

    core.start(Arc::clone(&router)).await.unwrap();
    assert_eq!(registrar.handle_calls.load(Ordering::SeqCst), 1);
    assert_eq!(registrar.register_calls.load(Ordering::SeqCst), 1);

    core.stop().await.unwrap();
    assert_eq!(registrar.unregister_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn second_start_before_stop_does_not_reinvoke_registrar() {
    let registrar = Arc::new(MockRegistrar::new());
    let (core, router) = build_router(Arc::clone(&registrar));

    core.start(Arc::clone(&router)).await.unwrap();
    core.start(Arc::clone(&router)).await.unwrap();

    assert_eq!(registrar.handle_calls.load(Ordering::SeqCst), 1);
    assert_eq!(registrar.register_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn stop_without_prior_start_is_a_noop() {
    let registrar = Arc::new(MockRegistrar::new());
    let (core, _router) = build_router(Arc::clone(&registrar));

    core.stop().await.unwrap();
    assert_eq!(registrar.unregister_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn repeated_stop_is_idempotent() {
    let registrar = Arc::new(MockRegistrar::new());
    let (core, router) = build_router(Arc::clone(&registrar));

    core.start(router).await.unwrap();
    core.stop().await.unwrap();
    core.stop().await.unwrap();

    assert_eq!(registrar.unregister_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn get_subscribers_before_start_fails_not_started() {
    let registrar = Arc::new(MockRegistrar::new());
    let (core, _router) = build_router(registrar);

    assert!(matches!(core.get_subscribers("topic").await, Err(RouterError::NotStarted)));
}
