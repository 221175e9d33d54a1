//! # Operator Resolution
//!
//! Every sale records the operator who rang it up.
//!
//! ```text
//! authenticated operator id ──► must be a known user
//!        │ none
//!        ▼
//! FallbackToFirstUser ──► oldest user in the system (warns)
//! Require             ──► ValidationError
//! ```

use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::warn;

use super::{SettlementError, SettlementResult};
use crate::repository::settings::SettingsRepository;
use paws_core::ValidationError;

/// How a sale without an authenticated operator is attributed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorPolicy {
    /// Attribute the sale to the first user in the system.
    #[default]
    FallbackToFirstUser,
    /// Reject the sale.
    Require,
}

impl OperatorPolicy {
    /// Resolves the operator ID for a sale.
    pub async fn resolve(
        &self,
        conn: &mut SqliteConnection,
        authenticated: Option<&str>,
    ) -> SettlementResult<String> {
        if let Some(id) = authenticated.map(str::trim).filter(|id| !id.is_empty()) {
            if SettingsRepository::user_exists(conn, id).await? {
                return Ok(id.to_string());
            }
            return Err(SettlementError::Validation(ValidationError::InvalidFormat {
                field: "operator".to_string(),
                reason: format!("unknown user {}", id),
            }));
        }

        match self {
            OperatorPolicy::Require => Err(ValidationError::required("operator").into()),
            OperatorPolicy::FallbackToFirstUser => {
                let id = SettingsRepository::first_user_id(conn).await?.ok_or_else(|| {
                    SettlementError::Validation(ValidationError::InvalidFormat {
                        field: "operator".to_string(),
                        reason: "no system user exists".to_string(),
                    })
                })?;
                warn!(user_id = %id, "No authenticated operator, attributing sale to first user");
                Ok(id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_db;

    #[tokio::test]
    async fn test_fallback_uses_first_user() {
        let db = test_db().await;
        let first = db.settings().insert_user("Owner").await.unwrap();
        db.settings().insert_user("Cashier").await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let id = OperatorPolicy::FallbackToFirstUser.resolve(&mut conn, None).await.unwrap();
        assert_eq!(id, first);
    }

    #[tokio::test]
    async fn test_no_users_is_validation_error() {
        let db = test_db().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let result = OperatorPolicy::FallbackToFirstUser.resolve(&mut conn, None).await;
        assert!(matches!(result, Err(SettlementError::Validation(_))));
    }

    #[tokio::test]
    async fn test_require_rejects_anonymous() {
        let db = test_db().await;
        let user = db.settings().insert_user("Owner").await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        let result = OperatorPolicy::Require.resolve(&mut conn, None).await;
        assert!(matches!(result, Err(SettlementError::Validation(_))));

        let id = OperatorPolicy::Require.resolve(&mut conn, Some(&user)).await.unwrap();
        assert_eq!(id, user);
    }

    #[tokio::test]
    async fn test_unknown_operator_is_rejected() {
        let db = test_db().await;
        db.settings().insert_user("Owner").await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        let result = OperatorPolicy::FallbackToFirstUser
            .resolve(&mut conn, Some("ghost"))
            .await;
        assert!(matches!(result, Err(SettlementError::Validation(_))));
    }
}
