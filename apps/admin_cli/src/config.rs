use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

#[derive(Debug)]
pub struct Settings {
    pub api_base_url: String,
    pub session_file: PathBuf,
    pub undo_window_seconds: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080".into(),
            session_file: PathBuf::from("./data/session.json"),
            undo_window_seconds: 10,
        }
    }
}

/// Settings come from `admin.toml` in the working directory, with `APP__*`
/// environment variables taking precedence over the file.
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("admin.toml") {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            if let Some(v) = file_cfg.get("api_base_url") {
                settings.api_base_url = v.clone();
            }
            if let Some(v) = file_cfg.get("session_file") {
                settings.session_file = PathBuf::from(v);
            }
            if let Some(v) = file_cfg.get("undo_window_seconds") {
                if let Ok(parsed) = v.parse::<u64>() {
                    settings.undo_window_seconds = parsed;
                }
            }
        }
    }

    if let Ok(v) = std::env::var("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }
    if let Ok(v) = std::env::var("APP__SESSION_FILE") {
        settings.session_file = PathBuf::from(v);
    }
    if let Ok(v) = std::env::var("APP__UNDO_WINDOW_SECONDS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.undo_window_seconds = parsed;
        }
    }

    settings
}
