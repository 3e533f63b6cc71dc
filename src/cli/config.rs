use crate::error::Result;
use crate::settings::{load_settings, save_settings, settings_path};

pub fn show() -> Result<()> {
    let settings = load_settings();
    println!("Settings:        {}", settings_path().display());
    println!("Default year:    {}", settings.default_year);
    println!("Summary marker:  {}", settings.summary_marker);
    Ok(())
}

pub fn set(year: Option<i32>, marker: Option<String>) -> Result<()> {
    let mut settings = load_settings();
    if let Some(year) = year {
        settings.default_year = year;
    }
    if let Some(marker) = marker {
        settings.summary_marker = marker;
    }
    save_settings(&settings)?;
    println!("Saved {}", settings_path().display());
    Ok(())
}
