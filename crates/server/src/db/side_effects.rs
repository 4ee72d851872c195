//! At-most-once side-effect claims.

use sqlx::PgConnection;

use aquacycle_core::effect::SideEffectKey;

use super::RepositoryError;

/// Claim `key` in the caller's transaction.
///
/// Returns `false` if the effect was already claimed; the caller must then
/// skip it. A claim rolled back with its transaction can be taken again.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn claim(conn: &mut PgConnection, key: &SideEffectKey) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        r"
        INSERT INTO side_effects (entity_type, entity_id, effect)
        VALUES ($1, $2, $3)
        ON CONFLICT DO NOTHING
        ",
    )
    .bind(key.entity_type)
    .bind(key.entity_id)
    .bind(key.effect)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}
