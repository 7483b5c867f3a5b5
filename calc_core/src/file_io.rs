//! # File I/O Module
//!
//! Reading input bags and settings from disk.
//!
//! - **Input files** hold a single JSON object of raw field values, exactly
//!   what a form would submit: `{ "loanAmount": 400000, "propertyValue": "500000" }`
//! - **Settings files** hold a (possibly partial) [`Settings`] object; missing
//!   keys take their defaults
//! - **Atomic saves**: settings are written to a `.tmp` file, synced, then
//!   renamed over the target
//!
//! ## Example
//!
//! ```rust,no_run
//! use calc_core::file_io::{load_raw_inputs, load_settings};
//! use std::path::Path;
//!
//! let settings = load_settings(Some(Path::new("calc-settings.json")))?;
//! let inputs = load_raw_inputs(Path::new("inputs.json"))?;
//! # Ok::<(), calc_core::errors::CalcError>(())
//! ```

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use crate::errors::{CalcError, CalcResult};
use crate::settings::Settings;
use crate::values::RawInputs;

fn read_json(path: &Path) -> CalcResult<serde_json::Value> {
    let mut file = File::open(path).map_err(|e| CalcError::file_error("open", path.display().to_string(), e.to_string()))?;

    let mut contents = String::new();
    file.read_to_string(&mut contents)
        .map_err(|e| CalcError::file_error("read", path.display().to_string(), e.to_string()))?;

    serde_json::from_str(&contents).map_err(|e| CalcError::SerializationError {
        reason: format!("Invalid JSON in {}: {}", path.display(), e),
    })
}

/// Load a raw input bag from a JSON object file.
///
/// # Returns
///
/// * `Ok(RawInputs)` - the object's entries, values untouched
/// * `Err(CalcError::SerializationError)` - invalid JSON, or not an object
/// * `Err(CalcError::FileError)` - I/O error
pub fn load_raw_inputs(path: &Path) -> CalcResult<RawInputs> {
    let json = read_json(path)?;
    RawInputs::from_json(json).map_err(|e| CalcError::SerializationError {
        reason: format!("{}: {}", path.display(), e),
    })
}

/// Load settings, falling back to defaults when no path is given.
///
/// The loaded settings are validated before they are returned.
pub fn load_settings(path: Option<&Path>) -> CalcResult<Settings> {
    let Some(path) = path else {
        return Ok(Settings::default());
    };

    let settings: Settings = serde_json::from_value(read_json(path)?).map_err(|e| CalcError::SerializationError {
        reason: format!("Invalid settings in {}: {}", path.display(), e),
    })?;
    settings.validate()?;
    tracing::debug!(path = %path.display(), "loaded settings");
    Ok(settings)
}

/// Save settings to a file with atomic write semantics.
pub fn save_settings(settings: &Settings, path: &Path) -> CalcResult<()> {
    let json = serde_json::to_string_pretty(settings)?;

    let tmp_path = path.with_extension("json.tmp");

    let mut tmp_file = File::create(&tmp_path)
        .map_err(|e| CalcError::file_error("create temp file", tmp_path.display().to_string(), e.to_string()))?;

    tmp_file
        .write_all(json.as_bytes())
        .map_err(|e| CalcError::file_error("write temp file", tmp_path.display().to_string(), e.to_string()))?;

    tmp_file
        .sync_all()
        .map_err(|e| CalcError::file_error("sync temp file", tmp_path.display().to_string(), e.to_string()))?;

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        CalcError::file_error("rename to final", path.display().to_string(), e.to_string())
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env::temp_dir;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        temp_dir().join(format!("calc_core_test_{}_{}.json", name, std::process::id()))
    }

    #[test]
    fn test_load_raw_inputs() {
        let path = temp_path("inputs");
        fs::write(&path, r#"{ "loanAmount": 400000, "propertyValue": "500000", "note": null }"#).unwrap();

        let inputs = load_raw_inputs(&path).unwrap();
        assert_eq!(inputs.len(), 3);
        assert_eq!(inputs.get("propertyValue"), Some(&serde_json::json!("500000")));

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_inputs_must_be_an_object() {
        let path = temp_path("array");
        fs::write(&path, "[1, 2, 3]").unwrap();
        assert!(matches!(
            load_raw_inputs(&path),
            Err(CalcError::SerializationError { .. })
        ));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_missing_file() {
        let err = load_raw_inputs(Path::new("/nonexistent/inputs.json")).unwrap_err();
        assert_eq!(err.error_code(), "FILE_ERROR");
    }

    #[test]
    fn test_settings_default_without_path() {
        assert_eq!(load_settings(None).unwrap(), Settings::default());
    }

    #[test]
    fn test_settings_roundtrip() {
        let path = temp_path("settings");
        let mut settings = Settings::default();
        settings.dscr.default_requirement = 1.35;
        settings.escrow.refund_threshold = 25.0;

        save_settings(&settings, &path).unwrap();
        assert!(!path.with_extension("json.tmp").exists());

        let loaded = load_settings(Some(&path)).unwrap();
        assert_eq!(loaded, settings);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let path = temp_path("bad_settings");
        fs::write(&path, r#"{ "dscr": { "defaultRequirement": -1 } }"#).unwrap();
        let err = load_settings(Some(&path)).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_INPUT");
        let _ = fs::remove_file(&path);
    }
}
