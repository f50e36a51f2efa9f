//! Persistent application settings, stored as a plain `key=value` file in the
//! OS config directory.  Missing or corrupt files fall back to defaults, and
//! unknown keys are skipped, so old settings files never block startup.

use std::path::PathBuf;

/// Default caption-service model for text generation and translation.
pub const CAPTION_MODEL: &str = "gemini-2.5-flash";
/// Default caption-service model for image editing.
pub const EDIT_MODEL: &str = "gemini-2.5-flash-image";

pub struct AppSettings {
    /// True once the user has dismissed the first-run welcome dialog.
    /// Read once at startup, written once on dismissal.
    pub has_seen_welcome: bool,
    /// Caption-service API key.  The `MEMEFE_API_KEY` environment variable
    /// overrides the stored value at load time.
    pub api_key: String,
    /// Base URL of the gallery backend (upload + list endpoints).
    pub backend_url: String,
    /// URL of the local wallet signer bridge.
    pub signer_url: String,
    /// Fee receiver address for the finalize transfer.
    pub fee_receiver: String,
    /// Fee amount in SOL charged per finalized meme.
    pub fee_sol: f64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            has_seen_welcome: false,
            api_key: String::new(),
            backend_url: "http://127.0.0.1:3000".to_string(),
            signer_url: "http://127.0.0.1:8899".to_string(),
            fee_receiver: String::new(),
            fee_sol: 0.0001,
        }
    }
}

impl AppSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/memefe/memefe_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\MemeFE\memefe_settings.cfg
    /// On macOS:   ~/Library/Application Support/MemeFE/memefe_settings.cfg
    /// Fallback:   same directory as the executable.
    pub(crate) fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                    PathBuf::from(home).join(".config")
                })
                .join("memefe");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("memefe_settings.cfg"));
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA")
                .or_else(|_| std::env::var("USERPROFILE"))
                .unwrap_or_else(|_| {
                    std::env::current_exe()
                        .ok()
                        .and_then(|p| p.parent().map(|d| d.to_string_lossy().into_owned()))
                        .unwrap_or_default()
                });
            let config_dir = PathBuf::from(appdata).join("MemeFE");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("memefe_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
            let config_dir = PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("MemeFE");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("memefe_settings.cfg"));
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|d| d.join("memefe_settings.cfg")))
        }
    }

    /// Save settings to disk.
    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        let content = self.to_config_string();
        let _ = std::fs::write(path, content);
    }

    /// Load settings from disk (returns defaults if file missing or corrupt).
    /// `MEMEFE_API_KEY` in the environment overrides the stored API key.
    pub fn load() -> Self {
        let mut s = match Self::settings_path() {
            Some(path) => match std::fs::read_to_string(&path) {
                Ok(content) => Self::from_config_string(&content),
                Err(_) => Self::default(),
            },
            None => Self::default(),
        };
        if let Ok(key) = std::env::var("MEMEFE_API_KEY")
            && !key.is_empty()
        {
            s.api_key = key;
        }
        s
    }

    fn to_config_string(&self) -> String {
        format!(
            "has_seen_welcome={}\n\
             api_key={}\n\
             backend_url={}\n\
             signer_url={}\n\
             fee_receiver={}\n\
             fee_sol={}\n",
            self.has_seen_welcome,
            self.api_key,
            self.backend_url,
            self.signer_url,
            self.fee_receiver,
            self.fee_sol,
        )
    }

    fn from_config_string(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            match key {
                "has_seen_welcome" => s.has_seen_welcome = val == "true",
                "api_key" => s.api_key = val.to_string(),
                "backend_url" => s.backend_url = val.to_string(),
                "signer_url" => s.signer_url = val.to_string(),
                "fee_receiver" => s.fee_receiver = val.to_string(),
                "fee_sol" => s.fee_sol = val.parse().unwrap_or(0.0001),
                _ => {}
            }
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_round_trip() {
        let mut s = AppSettings::default();
        s.has_seen_welcome = true;
        s.api_key = "k-123".to_string();
        s.backend_url = "http://10.0.0.2:3000".to_string();
        s.fee_sol = 0.5;

        let parsed = AppSettings::from_config_string(&s.to_config_string());
        assert!(parsed.has_seen_welcome);
        assert_eq!(parsed.api_key, "k-123");
        assert_eq!(parsed.backend_url, "http://10.0.0.2:3000");
        assert_eq!(parsed.fee_sol, 0.5);
    }

    #[test]
    fn corrupt_lines_fall_back_to_defaults() {
        let parsed = AppSettings::from_config_string("garbage\nfee_sol=not-a-number\n");
        assert!(!parsed.has_seen_welcome);
        assert_eq!(parsed.fee_sol, 0.0001);
    }
}
