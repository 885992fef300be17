use std::sync::Arc;

use chrono::{DateTime, Utc};
use shared::{
    domain::{ProductId, ProductStatus},
    protocol::{
        ImageDeleteResponse, ImageUploadResponse, ProductPayload, ProductRecord, StatusPatch,
    },
};
use tokio::sync::{broadcast, Mutex};
use tracing::info;

use crate::{
    error::StoreError,
    transport::{FilePart, Transport},
};

pub const NAME_MIN_LEN: usize = 2;
pub const NAME_MAX_LEN: usize = 100;
pub const DESCRIPTION_MIN_LEN: usize = 10;
pub const DESCRIPTION_MAX_LEN: usize = 500;
pub const MIN_PRICE: f64 = 0.01;
pub const MAX_PRICE: f64 = 9999.99;
pub const MAX_STOCK: u32 = 9999;

/// One catalog item, normalized from the backend's wire shape.
///
/// A product whose status is `Deleted` stays in the store; it is only
/// filtered from visible listings so the delete can still be undone.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub stock: u32,
    pub status: ProductStatus,
    pub available: bool,
    /// Insertion order is display order.
    pub image_urls: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Product {
    /// Main image: the first entry in display order, if any.
    pub fn image_url(&self) -> Option<&str> {
        self.image_urls.first().map(String::as_str)
    }

    fn from_record(record: ProductRecord) -> Self {
        Self {
            id: record.id_product,
            name: record.name,
            description: record.description,
            price: record.price,
            stock: record.stock,
            status: record.status,
            available: record.available,
            image_urls: record.image_urls,
            created_at: record.created_on,
            updated_at: record.updated_on,
        }
    }
}

/// User input for create and full update. Never stored as-is: the entity the
/// store keeps is always the server-confirmed shape.
#[derive(Debug, Clone)]
pub struct ProductDraft {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub stock: u32,
    pub status: ProductStatus,
    pub available: bool,
}

impl ProductDraft {
    fn to_payload(&self) -> ProductPayload {
        ProductPayload {
            name: self.name.trim().to_string(),
            description: self.description.trim().to_string(),
            price: self.price,
            stock: self.stock,
            status: self.status,
            available: self.available,
        }
    }
}

/// Field-level validation, applied before any network call. Returns one
/// message per offending field; empty means the draft is acceptable.
pub fn validate_draft(draft: &ProductDraft) -> Vec<String> {
    let mut errors = Vec::new();

    let name = draft.name.trim();
    if name.is_empty() {
        errors.push("product name is required".to_string());
    } else {
        let len = name.chars().count();
        if !(NAME_MIN_LEN..=NAME_MAX_LEN).contains(&len) {
            errors.push(format!(
                "product name must be between {NAME_MIN_LEN} and {NAME_MAX_LEN} characters"
            ));
        }
    }

    let description = draft.description.trim();
    if description.is_empty() {
        errors.push("product description is required".to_string());
    } else {
        let len = description.chars().count();
        if !(DESCRIPTION_MIN_LEN..=DESCRIPTION_MAX_LEN).contains(&len) {
            errors.push(format!(
                "product description must be between {DESCRIPTION_MIN_LEN} and {DESCRIPTION_MAX_LEN} characters"
            ));
        }
    }

    if !draft.price.is_finite() || !(MIN_PRICE..=MAX_PRICE).contains(&draft.price) {
        errors.push(format!(
            "price must be between {MIN_PRICE} and {MAX_PRICE}"
        ));
    }

    if draft.stock > MAX_STOCK {
        errors.push(format!("stock must be at most {MAX_STOCK}"));
    }

    errors
}

#[derive(Debug, Clone)]
pub enum CatalogEvent {
    Loaded { count: usize },
    Created(ProductId),
    Updated(ProductId),
    StatusChanged { id: ProductId, status: ProductStatus },
    ImagesChanged(ProductId),
}

/// Authoritative in-memory reflection of backend product state for the
/// current session.
///
/// Every mutation is pessimistic: local state changes only after the backend
/// acknowledges, and the confirmed server shape replaces any local guess. A
/// failed operation leaves local state exactly as it was.
pub struct ProductStore {
    transport: Arc<dyn Transport>,
    products: Mutex<Vec<Product>>,
    events: broadcast::Sender<CatalogEvent>,
}

impl ProductStore {
    pub fn new(transport: Arc<dyn Transport>) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            transport,
            products: Mutex::new(Vec::new()),
            events,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CatalogEvent> {
        self.events.subscribe()
    }

    /// Fetches the full catalog and replaces the local collection wholesale.
    /// On failure the previous local state is kept untouched.
    pub async fn load_all(&self) -> Result<Vec<Product>, StoreError> {
        let response = self.transport.get("/products").await?;
        if !response.is_success() {
            return Err(StoreError::rejected(&response));
        }
        let records: Vec<ProductRecord> = response.json()?;
        let fresh: Vec<Product> = records.into_iter().map(Product::from_record).collect();

        *self.products.lock().await = fresh.clone();
        let _ = self.events.send(CatalogEvent::Loaded { count: fresh.len() });
        info!(count = fresh.len(), "catalog loaded");
        Ok(fresh)
    }

    pub async fn create(&self, draft: &ProductDraft) -> Result<Product, StoreError> {
        let errors = validate_draft(draft);
        if !errors.is_empty() {
            return Err(StoreError::Validation(errors));
        }

        let body = serde_json::to_value(draft.to_payload()).map_err(StoreError::network)?;
        let response = self.transport.post("/auth/products", body).await?;
        if !response.is_success() {
            return Err(StoreError::rejected(&response));
        }
        let product = Product::from_record(response.json()?);

        self.products.lock().await.push(product.clone());
        let _ = self.events.send(CatalogEvent::Created(product.id));
        info!(id = %product.id, name = %product.name, "product created");
        Ok(product)
    }

    pub async fn update(&self, id: ProductId, draft: &ProductDraft) -> Result<Product, StoreError> {
        let errors = validate_draft(draft);
        if !errors.is_empty() {
            return Err(StoreError::Validation(errors));
        }
        self.find_by_id(id).await.ok_or(StoreError::NotFound(id.0))?;

        let body = serde_json::to_value(draft.to_payload()).map_err(StoreError::network)?;
        let response = self
            .transport
            .put(&format!("/auth/products/{id}"), body)
            .await?;
        if !response.is_success() {
            return Err(StoreError::rejected(&response));
        }
        let product = Product::from_record(response.json()?);

        self.replace(product.clone()).await;
        let _ = self.events.send(CatalogEvent::Updated(id));
        info!(id = %id, "product updated");
        Ok(product)
    }

    /// Status transition restricted to the `status` field. A product already
    /// in `new_status` is returned unchanged with no network call.
    ///
    /// The `Deleted` transition is not reachable from here: logical delete
    /// has its own entry point (`soft_delete`) so the undo window can be
    /// armed around it.
    pub async fn set_status(
        &self,
        id: ProductId,
        new_status: ProductStatus,
    ) -> Result<Product, StoreError> {
        if new_status == ProductStatus::Deleted {
            return Err(StoreError::Validation(vec![
                "logical delete must go through soft_delete".to_string(),
            ]));
        }
        let current = self.find_by_id(id).await.ok_or(StoreError::NotFound(id.0))?;
        if current.status == new_status {
            return Ok(current);
        }
        self.patch_status(id, new_status).await
    }

    /// Logical delete. Returns the deleted product together with the status
    /// it held before, so the caller can arm an undo window.
    pub async fn soft_delete(
        &self,
        id: ProductId,
    ) -> Result<(Product, ProductStatus), StoreError> {
        let current = self.find_by_id(id).await.ok_or(StoreError::NotFound(id.0))?;
        let previous_status = current.status;
        let product = self.patch_status(id, ProductStatus::Deleted).await?;
        Ok((product, previous_status))
    }

    /// Reverses a logical delete by putting the product back to the status it
    /// held before the delete.
    pub async fn restore(
        &self,
        id: ProductId,
        previous_status: ProductStatus,
    ) -> Result<Product, StoreError> {
        self.find_by_id(id).await.ok_or(StoreError::NotFound(id.0))?;
        self.patch_status(id, previous_status).await
    }

    async fn patch_status(
        &self,
        id: ProductId,
        status: ProductStatus,
    ) -> Result<Product, StoreError> {
        let body = serde_json::to_value(StatusPatch { status }).map_err(StoreError::network)?;
        let response = self
            .transport
            .patch(&format!("/auth/products/{id}"), body)
            .await?;
        if !response.is_success() {
            return Err(StoreError::rejected(&response));
        }
        let product = Product::from_record(response.json()?);

        self.replace(product.clone()).await;
        let _ = self.events.send(CatalogEvent::StatusChanged {
            id,
            status: product.status,
        });
        info!(id = %id, status = %product.status, "product status changed");
        Ok(product)
    }

    /// All products except logically deleted ones, in fetch/insertion order.
    pub async fn list_visible(&self) -> Vec<Product> {
        self.products
            .lock()
            .await
            .iter()
            .filter(|p| p.status != ProductStatus::Deleted)
            .cloned()
            .collect()
    }

    /// The whole collection, deleted entries included.
    pub async fn list_all(&self) -> Vec<Product> {
        self.products.lock().await.clone()
    }

    pub async fn find_by_id(&self, id: ProductId) -> Option<Product> {
        self.products
            .lock()
            .await
            .iter()
            .find(|p| p.id == id)
            .cloned()
    }

    /// Uploads images and appends the confirmed URLs. The backend returns the
    /// resulting URL list rather than a full record, so the entity is patched
    /// in place and `updated_at` is stamped locally.
    pub async fn add_images(
        &self,
        id: ProductId,
        parts: Vec<FilePart>,
    ) -> Result<Product, StoreError> {
        let current = self.find_by_id(id).await.ok_or(StoreError::NotFound(id.0))?;
        if parts.is_empty() {
            return Ok(current);
        }

        let response = self
            .transport
            .post_multipart(&format!("/auth/products/{id}/images"), parts)
            .await?;
        if !response.is_success() {
            return Err(StoreError::rejected(&response));
        }
        let upload: ImageUploadResponse = response.json()?;

        let product = self
            .patch_images(id, upload.all_images)
            .await
            .ok_or(StoreError::NotFound(id.0))?;
        info!(id = %id, count = product.image_urls.len(), "product images added");
        Ok(product)
    }

    /// Removes a single image by URL and adopts the backend's confirmed
    /// remaining list.
    pub async fn remove_image(
        &self,
        id: ProductId,
        image_url: &str,
    ) -> Result<Product, StoreError> {
        self.find_by_id(id).await.ok_or(StoreError::NotFound(id.0))?;

        let encoded: String = url::form_urlencoded::byte_serialize(image_url.as_bytes()).collect();
        let response = self
            .transport
            .delete(&format!("/auth/products/{id}/images?imageUrl={encoded}"))
            .await?;
        if !response.is_success() {
            return Err(StoreError::rejected(&response));
        }
        let deleted: ImageDeleteResponse = response.json()?;

        let product = self
            .patch_images(id, deleted.remaining_images)
            .await
            .ok_or(StoreError::NotFound(id.0))?;
        info!(id = %id, "product image removed");
        Ok(product)
    }

    async fn replace(&self, product: Product) {
        let mut products = self.products.lock().await;
        match products.iter_mut().find(|p| p.id == product.id) {
            Some(slot) => *slot = product,
            None => products.push(product),
        }
    }

    async fn patch_images(&self, id: ProductId, image_urls: Vec<String>) -> Option<Product> {
        let mut products = self.products.lock().await;
        let slot = products.iter_mut().find(|p| p.id == id)?;
        slot.image_urls = image_urls;
        slot.updated_at = Some(Utc::now());
        let product = slot.clone();
        drop(products);
        let _ = self.events.send(CatalogEvent::ImagesChanged(id));
        Some(product)
    }
}

#[cfg(test)]
#[path = "tests/catalog_tests.rs"]
mod tests;
