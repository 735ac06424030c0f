//! Experiment files in TOML. The top-level table is an `ExperimentSettings` record; every
//! omitted key keeps the reference-experiment default.
//!
//! ```toml
//! particle_count_left = 200
//! particle_count_right = 0
//! g = -9.8
//! duration = 2
//! ```

use std::path::Path;

use crate::core::ExperimentSettings;
use crate::error::{Error, Result};

/// Parse settings from TOML text.
pub fn parse_settings(text: &str) -> Result<ExperimentSettings> {
    toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
}

/// Read and parse a settings file.
pub fn load_settings(path: impl AsRef<Path>) -> Result<ExperimentSettings> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let settings = parse_settings(&text)?;
    tracing::debug!(path = %path.display(), "loaded experiment settings");
    Ok(settings)
}

/// Render settings as TOML.
pub fn to_toml(settings: &ExperimentSettings) -> Result<String> {
    toml::to_string_pretty(settings).map_err(|e| Error::Config(e.to_string()))
}

/// Settings as a flat `name -> value` table, one entry per field.
pub fn to_table(settings: &ExperimentSettings) -> Result<toml::Table> {
    match toml::Value::try_from(settings).map_err(|e| Error::Config(e.to_string()))? {
        toml::Value::Table(table) => Ok(table),
        other => Err(Error::Config(format!(
            "settings serialized to a {} instead of a table",
            other.type_str()
        ))),
    }
}

/// Replace individual fields of `base` by name.
///
/// Errors:
/// - `Error::Config` for an unknown field name or a value of the wrong type.
pub fn apply_overrides<I>(base: &ExperimentSettings, overrides: I) -> Result<ExperimentSettings>
where
    I: IntoIterator<Item = (String, toml::Value)>,
{
    let mut table = to_table(base)?;
    for (key, value) in overrides {
        table.insert(key, value);
    }
    toml::Value::Table(table)
        .try_into()
        .map_err(|e: toml::de::Error| Error::Config(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn omitted_keys_take_defaults() -> Result<()> {
        let s = parse_settings("particle_count_left = 7\nseed = -3\n")?;
        assert_eq!(s.particle_count_left(), 7);
        assert_eq!(s.seed(), -3);
        assert_eq!(s.particle_count_right(), 50);
        assert_eq!(s.box_width(), 100.0);
        Ok(())
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = parse_settings("particle_count_middle = 7\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn toml_round_trip() -> Result<()> {
        let s = ExperimentSettings::builder()
            .particle_count(3, 9)
            .g(-1.5)
            .hole(30.0, 4.0)
            .build();
        let text = to_toml(&s)?;
        assert_eq!(parse_settings(&text)?, s);
        Ok(())
    }

    #[test]
    fn overrides_replace_named_fields() -> Result<()> {
        let base = ExperimentSettings::default();
        let s = apply_overrides(
            &base,
            [
                ("seed".to_string(), toml::Value::Integer(12)),
                ("g".to_string(), toml::Value::Float(-2.5)),
                ("box_width".to_string(), toml::Value::Integer(80)),
            ],
        )?;
        assert_eq!(s.seed(), 12);
        assert_eq!(s.g(), -2.5);
        assert_eq!(s.box_width(), 80.0);
        assert_eq!(s.fps(), base.fps());

        let err = apply_overrides(&base, [("colour".to_string(), toml::Value::Integer(1))]);
        assert!(matches!(err, Err(Error::Config(_))));
        Ok(())
    }

    #[test]
    fn table_has_one_entry_per_field() -> Result<()> {
        let table = to_table(&ExperimentSettings::default())?;
        assert_eq!(table.len(), 18);
        assert_eq!(table.get("fps"), Some(&toml::Value::Integer(30)));
        Ok(())
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_settings("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
