use anyhow::{Context, Result};

use lctrace::metadata::UserSettings;

use super::SettingsCommand;

/// Show or edit the persisted user settings
pub fn run(command: SettingsCommand) -> Result<()> {
    let mut settings = UserSettings::load_default().context("Failed to load user settings")?;

    match command {
        SettingsCommand::Show => {
            show(&settings);
            return Ok(());
        }
        SettingsCommand::SetFlow { name, flow_rate } => {
            settings.set_flow_rate(&name, flow_rate)?;
            println!("{} -> {} mL/min", name, flow_rate);
        }
        SettingsCommand::DeleteFlow { name } => {
            let removed = settings.delete_flow_rate(&name)?;
            println!("Removed {} ({} mL/min)", name, removed);
        }
        SettingsCommand::SetCv { column_volume } => {
            settings.set_default_column_volume(Some(column_volume))?;
            println!("Default column volume: {} mL", column_volume);
        }
        SettingsCommand::ClearCv => {
            settings.set_default_column_volume(None)?;
            println!("Default column volume cleared");
        }
    }

    settings.save().context("Failed to save user settings")
}

fn show(settings: &UserSettings) {
    if let Some(path) = settings.path() {
        println!("Settings file: {}", path.display());
    }
    println!();
    println!("Flow rates:");
    if settings.flow_rates().is_empty() {
        println!("  (none)");
    }
    for (name, flow_rate) in settings.flow_rates() {
        println!("  {:<30} {} mL/min", name, flow_rate);
    }
    println!();
    match settings.default_column_volume() {
        Some(cv) => println!("Default column volume: {} mL", cv),
        None => println!("Default column volume: (unset)"),
    }
}
