// SPDX-License-Identifier: MIT OR Apache-2.0

use std::error::Error;

use permit_core::{Id, OrderOfPayment};

/// Interface for storing Orders of Payment.
///
/// Every application has at most one Order of Payment.
pub trait OrderOfPaymentStore {
    type Error: Error;

    /// Insert an order.
    ///
    /// Returns `false` when the linked application already has an order, nothing is written in
    /// that case.
    fn insert_order(
        &self,
        order: &OrderOfPayment,
    ) -> impl Future<Output = Result<bool, Self::Error>>;

    fn get_order(
        &self,
        id: &Id,
    ) -> impl Future<Output = Result<Option<OrderOfPayment>, Self::Error>>;

    /// Get the order of an application.
    fn get_order_for_application(
        &self,
        application_id: &Id,
    ) -> impl Future<Output = Result<Option<OrderOfPayment>, Self::Error>>;

    /// Overwrite an existing order. Returns `false` if it was not found.
    fn update_order(
        &self,
        order: &OrderOfPayment,
    ) -> impl Future<Output = Result<bool, Self::Error>>;
}
