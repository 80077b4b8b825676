use std::{
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::{anyhow, Context, Result};
use serde_json::{Map, Value};
use shared::domain::Theme;

/// Key under which the theme flag is stored.
pub const DARK_MODE_KEY: &str = "darkMode";

/// Durable storage for the single client-side preference: the theme.
pub trait PreferenceStore: Send + Sync {
    fn load_theme(&self) -> Result<Option<Theme>>;
    fn save_theme(&self, theme: Theme) -> Result<()>;
}

/// JSON object on disk, e.g. `{"darkMode": true}`. Unknown keys are kept.
pub struct FilePreferenceStore {
    path: PathBuf,
}

impl FilePreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_object(&self) -> Result<Option<Map<String, Value>>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to read preferences '{}'", self.path.display())
                })
            }
        };
        let value: Value = serde_json::from_str(&raw)
            .with_context(|| format!("invalid preferences file '{}'", self.path.display()))?;
        match value {
            Value::Object(map) => Ok(Some(map)),
            _ => Err(anyhow!(
                "preferences file '{}' is not a JSON object",
                self.path.display()
            )),
        }
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn load_theme(&self) -> Result<Option<Theme>> {
        let Some(map) = self.read_object()? else {
            return Ok(None);
        };
        Ok(map
            .get(DARK_MODE_KEY)
            .and_then(Value::as_bool)
            .map(Theme::from_dark_mode))
    }

    fn save_theme(&self, theme: Theme) -> Result<()> {
        let mut map = self.read_object().ok().flatten().unwrap_or_default();
        map.insert(DARK_MODE_KEY.to_string(), Value::Bool(theme.is_dark()));

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!(
                    "failed to create preferences directory '{}'",
                    parent.display()
                )
            })?;
        }
        let serialized = serde_json::to_string_pretty(&Value::Object(map))?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("failed to write preferences '{}'", self.path.display()))
    }
}

#[derive(Default)]
pub struct MemoryPreferenceStore {
    theme: Mutex<Option<Theme>>,
}

impl MemoryPreferenceStore {
    pub fn with_theme(theme: Theme) -> Self {
        Self {
            theme: Mutex::new(Some(theme)),
        }
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn load_theme(&self) -> Result<Option<Theme>> {
        let guard = self
            .theme
            .lock()
            .map_err(|_| anyhow!("preference store lock poisoned"))?;
        Ok(*guard)
    }

    fn save_theme(&self, theme: Theme) -> Result<()> {
        let mut guard = self
            .theme
            .lock()
            .map_err(|_| anyhow!("preference store lock poisoned"))?;
        *guard = Some(theme);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_means_no_preference() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FilePreferenceStore::new(dir.path().join("prefs.json"));
        assert_eq!(store.load_theme().expect("load"), None);
    }

    #[test]
    fn saves_dark_mode_flag_and_keeps_other_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("prefs.json");
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(&path, r#"{"language":"it"}"#).expect("seed");

        let store = FilePreferenceStore::new(&path);
        store.save_theme(Theme::Dark).expect("save");
        assert_eq!(store.load_theme().expect("load"), Some(Theme::Dark));

        let raw: Value =
            serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("json");
        assert_eq!(raw["darkMode"], Value::Bool(true));
        assert_eq!(raw["language"], Value::String("it".to_string()));
    }

    #[test]
    fn creates_parent_directories_on_save() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("a").join("b").join("prefs.json");
        let store = FilePreferenceStore::new(&path);
        store.save_theme(Theme::Light).expect("save");
        assert_eq!(store.load_theme().expect("load"), Some(Theme::Light));
    }

    #[test]
    fn corrupt_file_is_an_error_but_can_be_overwritten() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("prefs.json");
        fs::write(&path, "not json").expect("seed");

        let store = FilePreferenceStore::new(&path);
        assert!(store.load_theme().is_err());
        store.save_theme(Theme::Dark).expect("save over corrupt file");
        assert_eq!(store.load_theme().expect("load"), Some(Theme::Dark));
    }
}
