// SPDX-License-Identifier: MIT OR Apache-2.0

use std::convert::Infallible;

use permit_core::{Id, OrderOfPayment};

use crate::memory::MemoryStore;
use crate::orders::OrderOfPaymentStore;

impl OrderOfPaymentStore for MemoryStore {
    type Error = Infallible;

    async fn insert_order(&self, order: &OrderOfPayment) -> Result<bool, Self::Error> {
        let mut store = self.write_store().await;
        let taken = store.orders.values().any(|existing| {
            existing.id == order.id || existing.application_id == order.application_id
        });
        if taken {
            return Ok(false);
        }
        store.orders.insert(order.id, order.clone());
        Ok(true)
    }

    async fn get_order(&self, id: &Id) -> Result<Option<OrderOfPayment>, Self::Error> {
        Ok(self.read_store().orders.get(id).cloned())
    }

    async fn get_order_for_application(
        &self,
        application_id: &Id,
    ) -> Result<Option<OrderOfPayment>, Self::Error> {
        Ok(self
            .read_store()
            .orders
            .values()
            .find(|order| &order.application_id == application_id)
            .cloned())
    }

    async fn update_order(&self, order: &OrderOfPayment) -> Result<bool, Self::Error> {
        let mut store = self.write_store().await;
        match store.orders.get_mut(&order.id) {
            Some(stored) => {
                *stored = order.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
