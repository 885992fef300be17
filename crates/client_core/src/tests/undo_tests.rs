use super::*;
use std::sync::atomic::AtomicBool;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use shared::protocol::{ProductRecord, StatusPatch};

use crate::catalog::ProductStore;
use crate::transport::{FilePart, Response, Transport};

/// In-memory backend double: answers the product routes the store uses, with
/// a switch to make status patches fail.
struct FakeTransport {
    products: std::sync::Mutex<Vec<ProductRecord>>,
    fail_patch: AtomicBool,
}

impl FakeTransport {
    fn with_products(products: Vec<ProductRecord>) -> Arc<Self> {
        Arc::new(Self {
            products: std::sync::Mutex::new(products),
            fail_patch: AtomicBool::new(false),
        })
    }

    fn ok(body: String) -> Result<Response, StoreError> {
        Ok(Response { status: 200, body })
    }

    fn product_id_from(path: &str) -> Option<i64> {
        path.strip_prefix("/auth/products/")?.parse().ok()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get(&self, path: &str) -> Result<Response, StoreError> {
        if path != "/products" {
            return Ok(Response {
                status: 404,
                body: String::new(),
            });
        }
        let products = self.products.lock().expect("lock").clone();
        Self::ok(serde_json::to_string(&products).expect("serialize"))
    }

    async fn post(&self, _path: &str, _body: Value) -> Result<Response, StoreError> {
        unimplemented!("not exercised by undo tests")
    }

    async fn put(&self, _path: &str, _body: Value) -> Result<Response, StoreError> {
        unimplemented!("not exercised by undo tests")
    }

    async fn patch(&self, path: &str, body: Value) -> Result<Response, StoreError> {
        if self.fail_patch.load(Ordering::SeqCst) {
            return Ok(Response {
                status: 500,
                body: "{\"message\":\"backend unavailable\"}".to_string(),
            });
        }
        let Some(id) = Self::product_id_from(path) else {
            return Ok(Response {
                status: 404,
                body: String::new(),
            });
        };
        let patch: StatusPatch = serde_json::from_value(body).expect("status patch");
        let mut products = self.products.lock().expect("lock");
        let Some(record) = products.iter_mut().find(|p| p.id_product.0 == id) else {
            return Ok(Response {
                status: 404,
                body: "{\"message\":\"no such product\"}".to_string(),
            });
        };
        record.status = patch.status;
        record.updated_on = Some(Utc::now());
        Self::ok(serde_json::to_string(record).expect("serialize"))
    }

    async fn delete(&self, _path: &str) -> Result<Response, StoreError> {
        unimplemented!("not exercised by undo tests")
    }

    async fn post_multipart(
        &self,
        _path: &str,
        _parts: Vec<FilePart>,
    ) -> Result<Response, StoreError> {
        unimplemented!("not exercised by undo tests")
    }
}

fn record(id: i64, name: &str, status: ProductStatus) -> ProductRecord {
    ProductRecord {
        id_product: ProductId(id),
        name: name.to_string(),
        description: "a perfectly serviceable pastry".to_string(),
        price: 5.5,
        stock: 3,
        status,
        available: true,
        image_urls: Vec::new(),
        created_on: Some(Utc::now()),
        updated_on: None,
    }
}

async fn controller_with(
    products: Vec<ProductRecord>,
    window: Duration,
) -> (Arc<ProductStore>, Arc<UndoController>, Arc<FakeTransport>) {
    let transport = FakeTransport::with_products(products);
    let store = ProductStore::new(transport.clone());
    store.load_all().await.expect("load");
    let controller = UndoController::with_window(store.clone(), window);
    (store, controller, transport)
}

async fn next_event(events: &mut broadcast::Receiver<UndoEvent>) -> UndoEvent {
    tokio::time::timeout(Duration::from_secs(60), events.recv())
        .await
        .expect("event within window")
        .expect("channel open")
}

#[tokio::test(start_paused = true)]
async fn expiry_finalizes_without_touching_the_backend() {
    let (store, controller, _) = controller_with(
        vec![record(1, "Chocolate Cake", ProductStatus::Active)],
        Duration::from_secs(3),
    )
    .await;
    let mut events = controller.subscribe();

    let deleted = controller.delete(ProductId(1)).await.expect("delete");
    assert_eq!(deleted.status, ProductStatus::Deleted);
    assert!(store.list_visible().await.is_empty());
    assert_eq!(controller.pending_delete().await, Some(ProductId(1)));

    assert!(matches!(
        next_event(&mut events).await,
        UndoEvent::Armed { seconds: 3, .. }
    ));
    for expected in [2, 1, 0] {
        let UndoEvent::Tick { remaining, .. } = next_event(&mut events).await else {
            panic!("expected tick");
        };
        assert_eq!(remaining, expected);
    }
    assert!(matches!(
        next_event(&mut events).await,
        UndoEvent::Expired { id: ProductId(1) }
    ));

    assert_eq!(controller.pending_delete().await, None);
    // the product stays logically deleted; expiry makes no backend call
    let product = store.find_by_id(ProductId(1)).await.expect("present");
    assert_eq!(product.status, ProductStatus::Deleted);
}

#[tokio::test(start_paused = true)]
async fn cancel_restores_the_previous_status() {
    let (store, controller, _) = controller_with(
        vec![record(1, "Croissant", ProductStatus::Inactive)],
        Duration::from_secs(10),
    )
    .await;

    controller.delete(ProductId(1)).await.expect("delete");
    assert!(store.list_visible().await.is_empty());

    let restored = controller.cancel().await.expect("cancel").expect("pending");
    assert_eq!(restored.status, ProductStatus::Inactive);
    assert_eq!(store.list_visible().await.len(), 1);
    assert_eq!(controller.pending_delete().await, None);
}

#[tokio::test(start_paused = true)]
async fn rearming_abandons_the_first_delete_without_restoring_it() {
    let (store, controller, _) = controller_with(
        vec![
            record(1, "Chocolate Cake", ProductStatus::Active),
            record(2, "Croissant", ProductStatus::Active),
        ],
        Duration::from_secs(10),
    )
    .await;

    controller.delete(ProductId(1)).await.expect("delete first");
    controller.delete(ProductId(2)).await.expect("delete second");
    assert_eq!(controller.pending_delete().await, Some(ProductId(2)));

    // undo only reaches the second delete; the first stays deleted
    let restored = controller.cancel().await.expect("cancel").expect("pending");
    assert_eq!(restored.id, ProductId(2));

    let first = store.find_by_id(ProductId(1)).await.expect("present");
    assert_eq!(first.status, ProductStatus::Deleted);
    let second = store.find_by_id(ProductId(2)).await.expect("present");
    assert_eq!(second.status, ProductStatus::Active);
}

#[tokio::test(start_paused = true)]
async fn replaced_window_restarts_the_full_countdown() {
    let (_, controller, _) = controller_with(
        vec![
            record(1, "Chocolate Cake", ProductStatus::Active),
            record(2, "Croissant", ProductStatus::Active),
        ],
        Duration::from_secs(5),
    )
    .await;
    let mut events = controller.subscribe();

    controller.delete(ProductId(1)).await.expect("delete first");
    assert!(matches!(
        next_event(&mut events).await,
        UndoEvent::Armed { id: ProductId(1), seconds: 5 }
    ));
    let UndoEvent::Tick { id: ProductId(1), remaining: 4 } = next_event(&mut events).await else {
        panic!("expected first tick of first window");
    };

    controller.delete(ProductId(2)).await.expect("delete second");
    assert!(matches!(
        next_event(&mut events).await,
        UndoEvent::Armed { id: ProductId(2), seconds: 5 }
    ));

    // the fresh window counts all the way down and only then expires
    let mut remaining_seen = Vec::new();
    loop {
        match next_event(&mut events).await {
            UndoEvent::Tick {
                id: ProductId(2),
                remaining,
            } => remaining_seen.push(remaining),
            UndoEvent::Expired { id } => {
                assert_eq!(id, ProductId(2));
                break;
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert_eq!(remaining_seen, vec![4, 3, 2, 1, 0]);
}

#[tokio::test(start_paused = true)]
async fn cancel_without_a_pending_window_is_a_noop() {
    let (_, controller, _) = controller_with(
        vec![record(1, "Chocolate Cake", ProductStatus::Active)],
        Duration::from_secs(10),
    )
    .await;
    assert!(controller.cancel().await.expect("noop").is_none());
}

#[tokio::test(start_paused = true)]
async fn failed_restore_reports_and_leaves_the_product_deleted() {
    let (store, controller, transport) = controller_with(
        vec![record(1, "Chocolate Cake", ProductStatus::Active)],
        Duration::from_secs(10),
    )
    .await;
    let mut events = controller.subscribe();

    controller.delete(ProductId(1)).await.expect("delete");
    assert!(matches!(next_event(&mut events).await, UndoEvent::Armed { .. }));

    transport.fail_patch.store(true, Ordering::SeqCst);
    let err = controller.cancel().await.expect_err("restore must fail");
    assert!(matches!(err, StoreError::Fetch { status: Some(500), .. }));

    assert!(matches!(
        next_event(&mut events).await,
        UndoEvent::RestoreFailed { id: ProductId(1), .. }
    ));
    // window consumed either way, no retry
    assert_eq!(controller.pending_delete().await, None);
    let product = store.find_by_id(ProductId(1)).await.expect("present");
    assert_eq!(product.status, ProductStatus::Deleted);
}
