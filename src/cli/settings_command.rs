use std::path::Path;

use anyhow::{bail, Result};
use clap::Subcommand;
use tracing::info;

use crate::{
    daemon::settings::{Settings, SettingsStorage},
    utils::dir::settings_path,
};

#[derive(Subcommand, Debug)]
pub enum AppsCommand {
    #[command(about = "Show tracked apps")]
    List,
    #[command(about = "Start tracking an app. The name should match its process name")]
    Add { name: String },
    #[command(about = "Stop tracking an app")]
    Remove { name: String },
}

/// Loads settings, applies `edit` and saves the result. The daemon notices the change on its next
/// maintenance pass.
pub async fn edit_settings(
    app_dir: &Path,
    edit: impl FnOnce(&mut Settings) -> Result<()>,
) -> Result<Settings> {
    let storage = SettingsStorage::new(settings_path(app_dir));
    let mut settings = storage.load().await;
    edit(&mut settings)?;
    storage.save(&settings).await?;
    info!("Saved settings {settings:?}");
    Ok(settings)
}

pub fn set_limit_hours(settings: &mut Settings, weekday: u32, hours: f64) -> Result<()> {
    if !hours.is_finite() || !(0.0..=24.0).contains(&hours) {
        bail!("Limit should be between 0 and 24 hours, got {hours}");
    }
    settings.set_limit(weekday, (hours * 3600.).round() as u64)
}

pub fn set_idle_threshold(settings: &mut Settings, seconds: u64) -> Result<()> {
    if seconds == 0 {
        bail!("Idle threshold should be at least one second");
    }
    settings.idle_threshold_seconds = seconds;
    Ok(())
}

pub async fn process_apps_command(app_dir: &Path, command: AppsCommand) -> Result<()> {
    let settings = match command {
        AppsCommand::List => SettingsStorage::new(settings_path(app_dir)).load().await,
        AppsCommand::Add { name } => {
            edit_settings(app_dir, |settings| {
                if !settings.add_tracked_app(&name) {
                    bail!("{name} is already tracked");
                }
                Ok(())
            })
            .await?
        }
        AppsCommand::Remove { name } => {
            edit_settings(app_dir, |settings| {
                if !settings.remove_tracked_app(&name) {
                    bail!("{name} isn't tracked");
                }
                Ok(())
            })
            .await?
        }
    };
    if settings.tracked_apps.is_empty() {
        println!("No apps are tracked");
    }
    for app in &settings.tracked_apps {
        println!("{app}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::Weekday;
    use tempfile::tempdir;

    use crate::daemon::settings::{Settings, SettingsStorage};

    use super::{edit_settings, set_idle_threshold, set_limit_hours};

    #[test]
    fn limit_in_hours() -> Result<()> {
        let mut settings = Settings::default();
        set_limit_hours(&mut settings, 2, 1.5)?;
        assert_eq!(settings.limit_for_weekday(Weekday::Mon), 5400);

        assert!(set_limit_hours(&mut settings, 2, -1.).is_err());
        assert!(set_limit_hours(&mut settings, 2, 25.).is_err());
        assert!(set_limit_hours(&mut settings, 2, f64::NAN).is_err());
        assert!(set_limit_hours(&mut settings, 9, 1.).is_err());
        Ok(())
    }

    #[test]
    fn idle_threshold_must_be_positive() {
        let mut settings = Settings::default();
        assert!(set_idle_threshold(&mut settings, 0).is_err());
        assert!(set_idle_threshold(&mut settings, 60).is_ok());
        assert_eq!(settings.idle_threshold_seconds, 60);
    }

    #[tokio::test]
    async fn edits_are_saved() -> Result<()> {
        let dir = tempdir()?;

        edit_settings(dir.path(), |settings| set_idle_threshold(settings, 90)).await?;

        let stored = SettingsStorage::new(dir.path().join("settings.json"))
            .load()
            .await;
        assert_eq!(stored.idle_threshold_seconds, 90);
        Ok(())
    }

    #[tokio::test]
    async fn failed_edit_saves_nothing() -> Result<()> {
        let dir = tempdir()?;

        let result = edit_settings(dir.path(), |settings| set_idle_threshold(settings, 0)).await;

        assert!(result.is_err());
        assert!(!dir.path().join("settings.json").exists());
        Ok(())
    }
}
