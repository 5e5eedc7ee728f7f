//! Verifies that `#[instrument]` annotations on `MemoryClusterStore`
//! produce one span per store operation.

#![allow(clippy::expect_used)]

use std::sync::{Arc, Mutex};

use credential_gc_store::{ClusterStore, ConfigRecord, MemoryClusterStore};
use tracing::Subscriber;
use tracing_subscriber::{layer::SubscriberExt, registry::LookupSpan};

#[derive(Clone, Default)]
struct SpanCollector {
    spans: Arc<Mutex<Vec<String>>>,
}

impl<S> tracing_subscriber::Layer<S> for SpanCollector
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(
        &self,
        _attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        if let Some(span) = ctx.span(id) {
            self.spans.lock().expect("lock poisoned").push(span.name().to_owned());
        }
    }
}

#[tokio::test]
async fn all_store_operations_produce_spans() {
    let collector = SpanCollector::default();
    let spans = Arc::clone(&collector.spans);

    let subscriber = tracing_subscriber::registry().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let store = MemoryClusterStore::new();
    let record = ConfigRecord::builder().namespace("kube-system").name("keys").build();

    store.create(&record).await.expect("create");
    let read = store.get("kube-system", "keys").await.expect("get").expect("exists");
    store.update(&read).await.expect("update");
    store.delete("kube-system", "keys").await.expect("delete");

    let recorded = spans.lock().expect("lock poisoned");
    for name in ["create", "get", "update", "delete"] {
        assert!(
            recorded.iter().any(|s| s == name),
            "missing span '{name}', recorded: {recorded:?}"
        );
    }
}
