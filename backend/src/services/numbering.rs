//! Document numbering backed by the `document_sequences` table

use shared::numbering::{format_document_number, DocumentKind};
use sqlx::PgConnection;

use crate::error::AppResult;

/// Allocate the next number for `kind` in `year`.
///
/// Runs on the caller's connection so the counter advances only if the creating
/// transaction commits; concurrent creators serialize on the sequence row.
pub async fn next_document_number(
    conn: &mut PgConnection,
    kind: DocumentKind,
    year: i32,
) -> AppResult<String> {
    let sequence = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO document_sequences (prefix, year, last_value)
        VALUES ($1, $2, 1)
        ON CONFLICT (prefix, year)
        DO UPDATE SET last_value = document_sequences.last_value + 1
        RETURNING last_value
        "#,
    )
    .bind(kind.prefix())
    .bind(year)
    .fetch_one(&mut *conn)
    .await?;

    Ok(format_document_number(kind, year, sequence))
}
