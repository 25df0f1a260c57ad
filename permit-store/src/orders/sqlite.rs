// SPDX-License-Identifier: MIT OR Apache-2.0

use permit_core::{Id, OrderOfPayment};
use sqlx::{FromRow, query, query_as};

use crate::orders::OrderOfPaymentStore;
use crate::sqlite::{SqliteError, SqliteStore, decode, encode};

impl<'a> OrderOfPaymentStore for SqliteStore<'a> {
    type Error = SqliteError;

    async fn insert_order(&self, order: &OrderOfPayment) -> Result<bool, Self::Error> {
        let record = encode("order of payment", order)?;
        let result = self
            .tx(async |tx| {
                // Ignore insertion when the application already has an order (UNIQUE
                // constraint).
                query(
                    "
                    INSERT OR IGNORE
                    INTO
                        orders_of_payment_v1 (
                            id,
                            application_id,
                            status,
                            record
                        )
                    VALUES
                        (?, ?, ?, ?)
                    ",
                )
                .bind(order.id.to_hex())
                .bind(order.application_id.to_hex())
                .bind(order.status.to_string())
                .bind(record)
                .execute(&mut **tx)
                .await
                .map_err(SqliteError::Sqlite)
            })
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_order(&self, id: &Id) -> Result<Option<OrderOfPayment>, Self::Error> {
        let result = self
            .read(async |connection| {
                query_as::<_, RecordRow>(
                    "
                    SELECT
                        record
                    FROM
                        orders_of_payment_v1
                    WHERE
                        id = ?
                    ",
                )
                .bind(id.to_hex())
                .fetch_optional(&mut *connection)
                .await
                .map_err(SqliteError::Sqlite)
            })
            .await?;

        result
            .map(|row| decode("order of payment", &row.record))
            .transpose()
    }

    async fn get_order_for_application(
        &self,
        application_id: &Id,
    ) -> Result<Option<OrderOfPayment>, Self::Error> {
        let result = self
            .read(async |connection| {
                query_as::<_, RecordRow>(
                    "
                    SELECT
                        record
                    FROM
                        orders_of_payment_v1
                    WHERE
                        application_id = ?
                    ",
                )
                .bind(application_id.to_hex())
                .fetch_optional(&mut *connection)
                .await
                .map_err(SqliteError::Sqlite)
            })
            .await?;

        result
            .map(|row| decode("order of payment", &row.record))
            .transpose()
    }

    async fn update_order(&self, order: &OrderOfPayment) -> Result<bool, Self::Error> {
        let record = encode("order of payment", order)?;
        let result = self
            .tx(async |tx| {
                query(
                    "
                    UPDATE
                        orders_of_payment_v1
                    SET
                        status = ?,
                        record = ?
                    WHERE
                        id = ?
                    ",
                )
                .bind(order.status.to_string())
                .bind(record)
                .bind(order.id.to_hex())
                .execute(&mut **tx)
                .await
                .map_err(SqliteError::Sqlite)
            })
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, FromRow)]
struct RecordRow {
    record: Vec<u8>,
}
