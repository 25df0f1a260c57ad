// SPDX-License-Identifier: MIT OR Apache-2.0

use permit_core::{Application, Id, Predicate, Stage};
use sqlx::{FromRow, QueryBuilder, Sqlite, query, query_as};

use crate::applications::ApplicationStore;
use crate::sqlite::{SqliteError, SqliteStore, decode, encode};

impl<'a> ApplicationStore for SqliteStore<'a> {
    type Error = SqliteError;

    async fn insert_application(&self, application: &Application) -> Result<bool, Self::Error> {
        let record = encode("application", application)?;
        let result = self
            .tx(async |tx| {
                query(
                    "
                    INSERT OR IGNORE
                    INTO
                        applications_v1 (
                            id,
                            application_number,
                            application_type,
                            user_id,
                            status,
                            current_stage,
                            record
                        )
                    VALUES
                        (?, ?, ?, ?, ?, ?, ?)
                    ",
                )
                .bind(application.id.to_hex())
                .bind(application.application_number.as_str())
                .bind(application.application_type.as_str())
                .bind(application.user_id.as_str())
                .bind(application.status.as_str())
                .bind(application.current_stage.as_str())
                .bind(record)
                .execute(&mut **tx)
                .await
                .map_err(SqliteError::Sqlite)
            })
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_application(&self, id: &Id) -> Result<Option<Application>, Self::Error> {
        let result = self
            .read(async |connection| {
                query_as::<_, ApplicationRow>(
                    "
                    SELECT
                        record
                    FROM
                        applications_v1
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

    async fn update_application(
        &self,
        application: &Application,
        expected_stage: Stage,
    ) -> Result<bool, Self::Error> {
        let record = encode("application", application)?;
        let result = self
            .tx(async |tx| {
                query(
                    "
                    UPDATE
                        applications_v1
                    SET
                        status = ?,
                        current_stage = ?,
                        record = ?
                    WHERE
                        id = ?
                        AND current_stage = ?
                    ",
                )
                .bind(application.status.as_str())
                .bind(application.current_stage.as_str())
                .bind(record)
                .bind(application.id.to_hex())
                .bind(expected_stage.as_str())
                .execute(&mut **tx)
                .await
                .map_err(SqliteError::Sqlite)
            })
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_application(&self, id: &Id) -> Result<bool, Self::Error> {
        let result = self
            .tx(async |tx| {
                query(
                    "
                    DELETE FROM
                        applications_v1
                    WHERE
                        id = ?
                    ",
                )
                .bind(id.to_hex())
                .execute(&mut **tx)
                .await
                .map_err(SqliteError::Sqlite)
            })
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn query_applications(
        &self,
        predicate: &Predicate,
    ) -> Result<Vec<Application>, Self::Error> {
        let rows = self
            .read(async |connection| {
                // Stage, status and owner are indexed columns, flags are checked after decoding.
                let mut builder: QueryBuilder<Sqlite> =
                    QueryBuilder::new("SELECT record FROM applications_v1 WHERE 1 = 1");
                if let Some(status) = predicate.status {
                    builder.push(" AND status = ").push_bind(status.as_str());
                }
                if let Some(stage) = predicate.stage {
                    builder
                        .push(" AND current_stage = ")
                        .push_bind(stage.as_str());
                }
                if let Some(owner) = &predicate.owner {
                    builder.push(" AND user_id = ").push_bind(owner.as_str());
                }

                builder
                    .build_query_as::<ApplicationRow>()
                    .fetch_all(&mut *connection)
                    .await
                    .map_err(SqliteError::Sqlite)
            })
            .await?;

        let mut applications = Vec::with_capacity(rows.len());
        for row in rows {
            let application: Application = row.try_into()?;
            if predicate.matches(&application) {
                applications.push(application);
            }
        }
        Ok(applications)
    }

    async fn next_sequence_number(&self, scope: &str) -> Result<u64, Self::Error> {
        let value: (i64,) = self
            .tx(async |tx| {
                query_as(
                    "
                    INSERT INTO
                        sequences_v1 (scope, value)
                    VALUES
                        (?, 1)
                    ON CONFLICT (scope) DO UPDATE SET
                        value = value + 1
                    RETURNING
                        value
                    ",
                )
                .bind(scope)
                .fetch_one(&mut **tx)
                .await
                .map_err(SqliteError::Sqlite)
            })
            .await?;
        Ok(value.0 as u64)
    }
}

/// Application as it is stored in the SQLite database.
#[derive(Debug, FromRow)]
struct ApplicationRow {
    record: Vec<u8>,
}

impl TryFrom<ApplicationRow> for Application {
    type Error = SqliteError;

    fn try_from(row: ApplicationRow) -> Result<Self, Self::Error> {
        decode("application", &row.record)
    }
}
