//! # Settings Repository
//!
//! The single business-settings row, keyed by [`SETTINGS_ID`].

use tracing::debug;

use crate::coordinator::Coordinator;
use crate::error::{DbError, DbResult};
use crate::schema::Collection;
use warung_core::validation::validate_required;
use warung_core::{Settings, SettingsPatch, SETTINGS_ID};

const SELECT_SETTINGS: &str =
    "SELECT id, business_name, address, logo_url, theme, currency FROM settings WHERE id = ?";

#[derive(Debug, Clone)]
pub struct SettingsRepository {
    coordinator: Coordinator,
}

impl SettingsRepository {
    pub fn new(coordinator: Coordinator) -> Self {
        SettingsRepository { coordinator }
    }

    /// The settings row, `None` if the database was created unseeded.
    pub async fn find(&self) -> DbResult<Option<Settings>> {
        let settings = sqlx::query_as::<_, Settings>(SELECT_SETTINGS)
            .bind(SETTINGS_ID)
            .fetch_optional(self.coordinator.pool())
            .await?;
        Ok(settings)
    }

    pub async fn get(&self) -> DbResult<Settings> {
        self.find()
            .await?
            .ok_or_else(|| DbError::not_found("Settings", SETTINGS_ID))
    }

    /// Applies a partial update to the settings row.
    pub async fn update(&self, patch: &SettingsPatch) -> DbResult<Settings> {
        if let Some(name) = &patch.business_name {
            validate_required("businessName", name)?;
        }
        debug!("Updating settings");

        let mut uow = self.coordinator.begin(&[Collection::Settings]).await?;
        let current = sqlx::query_as::<_, Settings>(SELECT_SETTINGS)
            .bind(SETTINGS_ID)
            .fetch_optional(&mut *uow)
            .await?
            .ok_or_else(|| DbError::not_found("Settings", SETTINGS_ID))?;

        let logo_url = match &patch.logo_url {
            Some(logo) => logo.clone(),
            None => current.logo_url,
        };

        sqlx::query(
            r#"
            UPDATE settings SET
                business_name = ?,
                address = ?,
                logo_url = ?,
                theme = ?
            WHERE id = ?
            "#,
        )
        .bind(patch.business_name.as_deref().map(str::trim).unwrap_or(&current.business_name))
        .bind(patch.address.as_deref().unwrap_or(&current.address))
        .bind(logo_url)
        .bind(patch.theme.unwrap_or(current.theme))
        .bind(SETTINGS_ID)
        .execute(&mut *uow)
        .await?;

        let updated = sqlx::query_as::<_, Settings>(SELECT_SETTINGS)
            .bind(SETTINGS_ID)
            .fetch_one(&mut *uow)
            .await?;
        uow.commit().await?;

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use crate::pool::{Database, DbConfig};
    use warung_core::{SettingsPatch, Theme};

    #[tokio::test]
    async fn test_settings_update() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let seeded = db.settings().get().await.unwrap();
        assert_eq!(seeded.business_name, "Warung Kita");
        assert_eq!(seeded.currency, "IDR");
        assert_eq!(seeded.logo_url, None);

        let updated = db
            .settings()
            .update(&SettingsPatch {
                theme: Some(Theme::Dark),
                logo_url: Some(Some("data:image/png;base64,AAAA".to_string())),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(updated.theme, Theme::Dark);
        assert_eq!(updated.business_name, "Warung Kita");
        assert!(updated.logo_url.is_some());

        let cleared = db
            .settings()
            .update(&SettingsPatch {
                logo_url: Some(None),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(cleared.logo_url, None);
        assert_eq!(cleared.theme, Theme::Dark);
    }

    #[tokio::test]
    async fn test_unseeded_database_has_no_settings() {
        let db = Database::new(DbConfig::in_memory().seed_on_create(false))
            .await
            .unwrap();
        assert!(db.settings().find().await.unwrap().is_none());
    }
}
