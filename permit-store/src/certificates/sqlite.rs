// SPDX-License-Identifier: MIT OR Apache-2.0

use permit_core::{Certificate, Id};
use sqlx::{FromRow, query, query_as};

use crate::certificates::CertificateStore;
use crate::sqlite::{SqliteError, SqliteStore, decode, encode};

impl<'a> CertificateStore for SqliteStore<'a> {
    type Error = SqliteError;

    async fn insert_certificate(&self, certificate: &Certificate) -> Result<bool, Self::Error> {
        let record = encode("certificate", certificate)?;
        let result = self
            .tx(async |tx| {
                // Ignore insertion when the application already has a certificate (UNIQUE
                // constraint).
                query(
                    "
                    INSERT OR IGNORE
                    INTO
                        certificates_v1 (
                            id,
                            application_id,
                            status,
                            record
                        )
                    VALUES
                        (?, ?, ?, ?)
                    ",
                )
                .bind(certificate.id.to_hex())
                .bind(certificate.application_id.to_hex())
                .bind(certificate.status.to_string())
                .bind(record)
                .execute(&mut **tx)
                .await
                .map_err(SqliteError::Sqlite)
            })
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_certificate(&self, id: &Id) -> Result<Option<Certificate>, Self::Error> {
        let result = self
            .read(async |connection| {
                query_as::<_, RecordRow>(
                    "
                    SELECT
                        record
                    FROM
                        certificates_v1
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
            .map(|row| decode("certificate", &row.record))
            .transpose()
    }

    async fn get_certificate_for_application(
        &self,
        application_id: &Id,
    ) -> Result<Option<Certificate>, Self::Error> {
        let result = self
            .read(async |connection| {
                query_as::<_, RecordRow>(
                    "
                    SELECT
                        record
                    FROM
                        certificates_v1
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
            .map(|row| decode("certificate", &row.record))
            .transpose()
    }

    async fn update_certificate(&self, certificate: &Certificate) -> Result<bool, Self::Error> {
        let record = encode("certificate", certificate)?;
        let result = self
            .tx(async |tx| {
                query(
                    "
                    UPDATE
                        certificates_v1
                    SET
                        status = ?,
                        record = ?
                    WHERE
                        id = ?
                    ",
                )
                .bind(certificate.status.to_string())
                .bind(record)
                .bind(certificate.id.to_hex())
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
