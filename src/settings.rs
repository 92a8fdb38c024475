use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, RwLock};

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "pagenotes";
const CONFIG_ENV: &str = "PAGENOTES_CONFIG";

/// Replaced by the page number in the default note title.
pub const PAGE_PLACEHOLDER: &str = "$p$";

/// Whether a newly chosen document path is stored relative to the notes file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RelativePathPolicy {
    #[default]
    Ask,
    Always,
    Never,
}

impl RelativePathPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelativePathPolicy::Ask => "ask",
            RelativePathPolicy::Always => "always",
            RelativePathPolicy::Never => "never",
        }
    }
}

/// Which side of the screen the notes pane takes during a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NotesSide {
    Left,
    #[default]
    Right,
}

impl NotesSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotesSide::Left => "left",
            NotesSide::Right => "right",
        }
    }
}

/// Names of the two properties that tie the outline to a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyNames {
    pub pdf_file_property: String,
    pub note_page_property: String,
}

impl Default for PropertyNames {
    fn default() -> Self {
        Self {
            pdf_file_property: default_property_doc_file(),
            note_page_property: default_property_note_page(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default = "default_property_doc_file")]
    pub property_doc_file: String,

    #[serde(default = "default_property_note_page")]
    pub property_note_page: String,

    #[serde(default = "default_heading_title")]
    pub default_heading_title: String,

    #[serde(default)]
    pub relative_path_policy: RelativePathPolicy,

    #[serde(default = "default_notes_split_percent")]
    pub notes_split_percent: u16,

    #[serde(default)]
    pub notes_side: NotesSide,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_property_doc_file() -> String {
    "DOC_FILE".to_string()
}

fn default_property_note_page() -> String {
    "DOC_NOTE_PAGE".to_string()
}

fn default_heading_title() -> String {
    format!("Notes for page {PAGE_PLACEHOLDER}")
}

fn default_notes_split_percent() -> u16 {
    50
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            property_doc_file: default_property_doc_file(),
            property_note_page: default_property_note_page(),
            default_heading_title: default_heading_title(),
            relative_path_policy: RelativePathPolicy::default(),
            notes_split_percent: default_notes_split_percent(),
            notes_side: NotesSide::default(),
        }
    }
}

impl Settings {
    pub fn property_names(&self) -> PropertyNames {
        PropertyNames {
            pdf_file_property: self.property_doc_file.clone(),
            note_page_property: self.property_note_page.clone(),
        }
    }

    /// Title for a new note on `page`, from the configured template.
    pub fn heading_title(&self, page: usize) -> String {
        self.default_heading_title
            .replace(PAGE_PLACEHOLDER, &page.to_string())
    }

    fn sanitize(&mut self) {
        self.notes_split_percent = self.notes_split_percent.clamp(20, 80);
        if self.property_doc_file.trim().is_empty() {
            self.property_doc_file = default_property_doc_file();
        }
        if self.property_note_page.trim().is_empty() {
            self.property_note_page = default_property_note_page();
        }
    }
}

static SETTINGS: LazyLock<RwLock<Settings>> = LazyLock::new(|| RwLock::new(Settings::default()));

fn preferred_config_path() -> Option<PathBuf> {
    if let Ok(custom) = std::env::var(CONFIG_ENV) {
        return Some(PathBuf::from(custom));
    }
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

pub fn load_settings() {
    let Some(path) = preferred_config_path() else {
        warn!("Could not determine config directory, using default settings");
        return;
    };
    load_settings_from(&path);
}

/// Loads settings from `path`; a missing file is created with the defaults.
pub fn load_settings_from(path: &Path) {
    if !path.exists() {
        info!("Settings file not found, creating with defaults at {path:?}");
        if let Ok(settings) = SETTINGS.read() {
            save_settings_to_file(&settings, path);
        }
        return;
    }

    match fs::read_to_string(path) {
        Ok(content) => match serde_yaml::from_str::<Settings>(&content) {
            Ok(mut settings) => {
                debug!("Loaded settings from {path:?}");
                settings.sanitize();

                if settings.version < CURRENT_VERSION {
                    migrate_settings(&mut settings);
                    save_settings_to_file(&settings, path);
                }

                if let Ok(mut global) = SETTINGS.write() {
                    *global = settings;
                }
            }
            Err(e) => {
                error!("Failed to parse settings file {path:?}: {e}");
            }
        },
        Err(e) => {
            error!("Failed to read settings file {path:?}: {e}");
        }
    }
}

fn migrate_settings(settings: &mut Settings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );
    settings.version = CURRENT_VERSION;
}

fn save_settings_to_file(settings: &Settings, path: &Path) {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Failed to create config directory {parent:?}: {e}");
                return;
            }
        }
    }

    match fs::write(path, generate_settings_yaml(settings)) {
        Ok(()) => debug!("Saved settings to {path:?}"),
        Err(e) => error!("Failed to save settings to {path:?}: {e}"),
    }
}

fn generate_settings_yaml(settings: &Settings) -> String {
    let mut content = String::new();

    content.push_str(&format!("version: {}\n", settings.version));
    content.push('\n');
    content.push_str("# Property holding the annotated document's path on the session heading\n");
    content.push_str(&format!(
        "property_doc_file: \"{}\"\n",
        settings.property_doc_file
    ));
    content.push_str("# Property holding the page number on each note heading\n");
    content.push_str(&format!(
        "property_note_page: \"{}\"\n",
        settings.property_note_page
    ));
    content.push_str(&format!(
        "# Title of new notes; {PAGE_PLACEHOLDER} becomes the page number\n"
    ));
    content.push_str(&format!(
        "default_heading_title: \"{}\"\n",
        settings.default_heading_title.replace('"', "\\\"")
    ));
    content.push_str("# Store document paths relative to the notes file: ask, always, never\n");
    content.push_str(&format!(
        "relative_path_policy: {}\n",
        settings.relative_path_policy.as_str()
    ));
    content.push('\n');
    content.push_str("# Width of the notes pane in percent (20-80) and its side: left, right\n");
    content.push_str(&format!(
        "notes_split_percent: {}\n",
        settings.notes_split_percent
    ));
    content.push_str(&format!("notes_side: {}\n", settings.notes_side.as_str()));

    content
}

pub fn current() -> Settings {
    SETTINGS.read().map(|s| s.clone()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    fn reset() {
        if let Ok(mut settings) = SETTINGS.write() {
            *settings = Settings::default();
        }
    }

    #[test]
    fn test_heading_title_substitutes_page() {
        let settings = Settings {
            default_heading_title: "p. $p$ ($p$)".to_string(),
            ..Settings::default()
        };
        assert_eq!(settings.heading_title(12), "p. 12 (12)");
        assert_eq!(Settings::default().heading_title(3), "Notes for page 3");
    }

    #[test]
    #[serial]
    fn test_missing_file_is_created_with_defaults() {
        reset();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        load_settings_from(&path);

        let written = fs::read_to_string(&path).unwrap();
        let parsed: Settings = serde_yaml::from_str(&written).unwrap();
        assert_eq!(parsed.property_doc_file, "DOC_FILE");
        assert_eq!(parsed.property_note_page, "DOC_NOTE_PAGE");
        assert_eq!(parsed.default_heading_title, "Notes for page $p$");
        assert_eq!(parsed.relative_path_policy, RelativePathPolicy::Ask);
    }

    #[test]
    #[serial]
    fn test_load_custom_properties_and_clamp() {
        reset();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "version: 1\nproperty_doc_file: NOTER_DOCUMENT\nproperty_note_page: NOTER_PAGE\nnotes_split_percent: 95\nnotes_side: left\nrelative_path_policy: never\n",
        )
        .unwrap();

        load_settings_from(&path);

        let settings = current();
        let names = settings.property_names();
        assert_eq!(names.pdf_file_property, "NOTER_DOCUMENT");
        assert_eq!(names.note_page_property, "NOTER_PAGE");
        assert_eq!(settings.notes_split_percent, 80);
        assert_eq!(settings.notes_side, NotesSide::Left);
        assert_eq!(settings.relative_path_policy, RelativePathPolicy::Never);
        reset();
    }

    #[test]
    #[serial]
    fn test_outdated_version_is_migrated_and_rewritten() {
        reset();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "version: 0\ndefault_heading_title: \"Page $p$\"\n").unwrap();

        load_settings_from(&path);

        let parsed: Settings = serde_yaml::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.version, CURRENT_VERSION);
        assert_eq!(parsed.default_heading_title, "Page $p$");
        assert_eq!(current().heading_title(4), "Page 4");
        reset();
    }

    #[test]
    #[serial]
    fn test_unparseable_file_keeps_defaults() {
        reset();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "notes_split_percent: [not a number\n").unwrap();

        load_settings_from(&path);
        assert_eq!(current().notes_split_percent, 50);
    }
}
