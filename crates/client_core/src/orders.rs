use std::sync::Arc;

use chrono::{DateTime, Utc};
use shared::{
    domain::{OrderId, OrderItemId, OrderStatus, ProductId, UserId},
    protocol::{OrderItemRecord, OrderRecord, OrderStatsRecord, OrderStatusPatch, PaidPatch},
};
use tokio::sync::{broadcast, Mutex};
use tracing::info;

use crate::{error::StoreError, transport::Transport};

#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub product_id: Option<ProductId>,
    pub name: String,
    pub quantity: u32,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: OrderId,
    pub customer: String,
    pub items: Vec<OrderItem>,
    pub total: f64,
    pub status: OrderStatus,
    pub date: Option<DateTime<Utc>>,
    pub delivery_date: Option<DateTime<Utc>>,
    pub note: String,
    pub user_id: Option<UserId>,
    pub paid: bool,
    pub phone: String,
}

impl Order {
    fn from_record(record: OrderRecord) -> Self {
        let items = normalize_items(record.order_items, record.total_price);
        Self {
            id: record.id_order,
            customer: record.user_name,
            items,
            total: record.total_price,
            status: record.status,
            date: record.created_on,
            delivery_date: record.delivery_date,
            note: record.note.unwrap_or_default(),
            user_id: record.id_user,
            paid: record.paid,
            phone: record.phone.unwrap_or_default(),
        }
    }

    /// Short line-item summary for list views.
    pub fn items_summary(&self) -> String {
        match self.items.as_slice() {
            [] => "no items".to_string(),
            [only] => format!("{} ({})", only.name, only.quantity),
            items => format!("{} items", items.len()),
        }
    }
}

/// The backend sometimes serves items without per-unit prices; in that case
/// each unit gets an approximation derived from the order total.
fn normalize_items(records: Vec<OrderItemRecord>, order_total: f64) -> Vec<OrderItem> {
    let total_quantity: u32 = records.iter().map(|i| i.quantity.unwrap_or(1)).sum();
    records
        .into_iter()
        .map(|item| {
            let quantity = item.quantity.unwrap_or(1);
            let mut price = item.price.unwrap_or(0.0);
            if price == 0.0 && order_total > 0.0 && total_quantity > 0 {
                price = order_total / f64::from(total_quantity);
            }
            OrderItem {
                id: item.id_order_item,
                product_id: item.id_product,
                name: item
                    .name
                    .unwrap_or_else(|| "unknown product".to_string()),
                quantity,
                price,
            }
        })
        .collect()
}

#[derive(Debug, Clone)]
pub enum OrderEvent {
    Loaded { count: usize },
    StatusChanged { id: OrderId, status: OrderStatus },
    PaidChanged { id: OrderId, paid: bool },
    Removed(OrderId),
}

/// In-memory reflection of customer orders, same pessimistic contract as the
/// product store: local state is only touched after the backend confirms.
pub struct OrderBook {
    transport: Arc<dyn Transport>,
    orders: Mutex<Vec<Order>>,
    events: broadcast::Sender<OrderEvent>,
}

impl OrderBook {
    pub fn new(transport: Arc<dyn Transport>) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            transport,
            orders: Mutex::new(Vec::new()),
            events,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrderEvent> {
        self.events.subscribe()
    }

    pub async fn load_all(&self) -> Result<Vec<Order>, StoreError> {
        let response = self.transport.get("/auth/orders").await?;
        if !response.is_success() {
            return Err(StoreError::rejected(&response));
        }
        let records: Vec<OrderRecord> = response.json()?;
        let fresh: Vec<Order> = records.into_iter().map(Order::from_record).collect();

        *self.orders.lock().await = fresh.clone();
        let _ = self.events.send(OrderEvent::Loaded { count: fresh.len() });
        info!(count = fresh.len(), "orders loaded");
        Ok(fresh)
    }

    pub async fn list(&self) -> Vec<Order> {
        self.orders.lock().await.clone()
    }

    pub async fn find_by_id(&self, id: OrderId) -> Option<Order> {
        self.orders.lock().await.iter().find(|o| o.id == id).cloned()
    }

    /// Moves an order through the status taxonomy. An order already in
    /// `status` is a local no-op with no network call.
    pub async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, StoreError> {
        let current = self.find_by_id(id).await.ok_or(StoreError::NotFound(id.0))?;
        if current.status == status {
            return Ok(current);
        }

        let body = serde_json::to_value(OrderStatusPatch { status }).map_err(StoreError::network)?;
        let response = self
            .transport
            .patch(&format!("/auth/orders/{id}"), body)
            .await?;
        if !response.is_success() {
            return Err(StoreError::rejected(&response));
        }
        let order = Order::from_record(response.json()?);

        self.replace(order.clone()).await;
        let _ = self.events.send(OrderEvent::StatusChanged {
            id,
            status: order.status,
        });
        info!(id = %id, status = %order.status, "order status updated");
        Ok(order)
    }

    pub async fn set_paid(&self, id: OrderId, paid: bool) -> Result<Order, StoreError> {
        self.find_by_id(id).await.ok_or(StoreError::NotFound(id.0))?;

        let body = serde_json::to_value(PaidPatch { paid }).map_err(StoreError::network)?;
        let response = self
            .transport
            .patch(&format!("/auth/orders/{id}"), body)
            .await?;
        if !response.is_success() {
            return Err(StoreError::rejected(&response));
        }
        let order = Order::from_record(response.json()?);

        self.replace(order.clone()).await;
        let _ = self.events.send(OrderEvent::PaidChanged {
            id,
            paid: order.paid,
        });
        info!(id = %id, paid = order.paid, "order paid flag updated");
        Ok(order)
    }

    /// Orders are removed outright, unlike products: there is no logical
    /// delete or undo window on this side of the dashboard.
    pub async fn delete(&self, id: OrderId) -> Result<(), StoreError> {
        self.find_by_id(id).await.ok_or(StoreError::NotFound(id.0))?;

        let response = self.transport.delete(&format!("/auth/orders/{id}")).await?;
        if !response.is_success() {
            return Err(StoreError::rejected(&response));
        }

        self.orders.lock().await.retain(|o| o.id != id);
        let _ = self.events.send(OrderEvent::Removed(id));
        info!(id = %id, "order deleted");
        Ok(())
    }

    pub async fn stats(&self) -> Result<OrderStatsRecord, StoreError> {
        let response = self.transport.get("/auth/orders/stats").await?;
        if !response.is_success() {
            return Err(StoreError::rejected(&response));
        }
        response.json()
    }

    async fn replace(&self, order: Order) {
        let mut orders = self.orders.lock().await;
        match orders.iter_mut().find(|o| o.id == order.id) {
            Some(slot) => *slot = order,
            None => orders.push(order),
        }
    }
}

#[cfg(test)]
#[path = "tests/orders_tests.rs"]
mod tests;
