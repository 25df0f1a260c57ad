// SPDX-License-Identifier: MIT OR Apache-2.0

use permit_core::{Id, Inspection};
use sqlx::{FromRow, query, query_as};

use crate::inspections::InspectionStore;
use crate::sqlite::{SqliteError, SqliteStore, decode, encode};

impl<'a> InspectionStore for SqliteStore<'a> {
    type Error = SqliteError;

    async fn insert_inspection(&self, inspection: &Inspection) -> Result<bool, Self::Error> {
        let record = encode("inspection", inspection)?;
        let result = self
            .tx(async |tx| {
                query(
                    "
                    INSERT OR IGNORE
                    INTO
                        inspections_v1 (
                            id,
                            permit_id,
                            status,
                            created_at,
                            record
                        )
                    VALUES
                        (?, ?, ?, ?, ?)
                    ",
                )
                .bind(inspection.id.to_hex())
                .bind(inspection.permit_id.to_hex())
                .bind(inspection.status.to_string())
                .bind(inspection.created_at as i64)
                .bind(record)
                .execute(&mut **tx)
                .await
                .map_err(SqliteError::Sqlite)
            })
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_inspection(&self, id: &Id) -> Result<Option<Inspection>, Self::Error> {
        let result = self
            .read(async |connection| {
                query_as::<_, InspectionRow>(
                    "
                    SELECT
                        record
                    FROM
                        inspections_v1
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

        match result {
            Some(row) => Ok(Some(row.try_into()?)),
            None => Ok(None),
        }
    }

    async fn get_inspections_for_application(
        &self,
        permit_id: &Id,
    ) -> Result<Vec<Inspection>, Self::Error> {
        let rows = self
            .read(async |connection| {
                query_as::<_, InspectionRow>(
                    "
                    SELECT
                        record
                    FROM
                        inspections_v1
                    WHERE
                        permit_id = ?
                    ORDER BY
                        created_at, id
                    ",
                )
                .bind(permit_id.to_hex())
                .fetch_all(&mut *connection)
                .await
                .map_err(SqliteError::Sqlite)
            })
            .await?;

        rows.into_iter().map(Inspection::try_from).collect()
    }

    async fn update_inspection(&self, inspection: &Inspection) -> Result<bool, Self::Error> {
        let record = encode("inspection", inspection)?;
        let result = self
            .tx(async |tx| {
                query(
                    "
                    UPDATE
                        inspections_v1
                    SET
                        status = ?,
                        record = ?
                    WHERE
                        id = ?
                    ",
                )
                .bind(inspection.status.to_string())
                .bind(record)
                .bind(inspection.id.to_hex())
                .execute(&mut **tx)
                .await
                .map_err(SqliteError::Sqlite)
            })
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Inspection as it is stored in the SQLite database.
#[derive(Debug, FromRow)]
struct InspectionRow {
    record: Vec<u8>,
}

impl TryFrom<InspectionRow> for Inspection {
    type Error = SqliteError;

    fn try_from(row: InspectionRow) -> Result<Self, Self::Error> {
        decode("inspection", &row.record)
    }
}
