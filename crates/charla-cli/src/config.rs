//! Config file and setting resolution.
//!
//! The on-disk file only holds what the user wrote; [`Settings`] is the
//! merged result of flags, environment, file and defaults, resolved
//! once at startup so the rest of the program never reads the
//! environment.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use charla_client::ClientConfig;
use charla_session::SessionConfig;
use charla_tui::Theme;

/// Environment variable overriding the backend URL.
pub const BACKEND_ENV: &str = "CHARLA_BACKEND_URL";

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "CHARLA_CONFIG_PATH";

/// What the config file may contain. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Backend base URL.
    pub backend_url: Option<String>,
    /// Conversation id sent with every message.
    pub conversation_id: Option<String>,
    /// Seconds to wait for the backend to answer a request.
    pub request_timeout_secs: Option<u64>,
    /// Milliseconds between revealed reply characters.
    pub typing_delay_ms: Option<u64>,
    /// Whether to start the full-screen UI by default.
    pub tui: Option<bool>,
    /// Color theme, "dark" or "light".
    pub theme: Option<String>,
}

impl FileConfig {
    /// Where the config file lives. `CHARLA_CONFIG_PATH` wins over the
    /// platform config directory.
    pub fn path() -> PathBuf {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return PathBuf::from(path);
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("charla")
            .join("config.toml")
    }

    /// Load the file at the default location. A missing file is an
    /// empty config; an unreadable or unparsable one is reported on
    /// stderr and treated the same so a typo never blocks startup.
    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    pub fn load_from(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                eprintln!("Warning: failed to read {}: {e}", path.display());
                return Self::default();
            }
        };
        match toml::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: failed to parse {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Write the commented starter file unless one already exists.
    /// Returns the path either way.
    pub fn init() -> io::Result<PathBuf> {
        let path = Self::path();
        if path.exists() {
            return Ok(path);
        }
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&path, STARTER_CONFIG)?;
        Ok(path)
    }
}

/// Contents written by `--init-config`: the defaults, commented.
pub const STARTER_CONFIG: &str = r#"# charla configuration
# Lives at ~/.config/charla/config.toml (or %APPDATA%\charla on Windows);
# set CHARLA_CONFIG_PATH to keep it somewhere else.

# Backend base URL. The CHARLA_BACKEND_URL environment variable and the
# --backend-url flag both override this.
backend_url = "http://127.0.0.1:8000"

# Conversation id sent with every message.
conversation_id = "terminal-session"

# Seconds to wait for the backend to answer a request.
request_timeout_secs = 30

# Milliseconds between revealed reply characters. 0 shows replies as
# fast as they arrive.
typing_delay_ms = 15

# Start the full-screen UI. Set to false for plain stdin/stdout.
tui = true

# Color theme: "dark" or "light".
theme = "dark"
"#;

/// Command-line values that take precedence over everything else.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub backend_url: Option<String>,
    pub conversation_id: Option<String>,
    pub timeout_secs: Option<u64>,
    pub typing_delay_ms: Option<u64>,
    pub no_tui: bool,
    pub theme: Option<String>,
}

/// Effective settings: flag beats environment beats file beats default.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub backend_url: String,
    pub conversation_id: String,
    pub timeout: Duration,
    pub char_delay: Duration,
    pub tui: bool,
    pub theme: String,
}

impl Settings {
    /// Merge one layer at a time. `env_backend` is passed in rather
    /// than read here so resolution stays a pure function.
    pub fn resolve(flags: &Overrides, env_backend: Option<String>, file: &FileConfig) -> Self {
        let client_defaults = ClientConfig::default();
        let session_defaults = SessionConfig::default();

        Settings {
            backend_url: flags
                .backend_url
                .clone()
                .or(env_backend)
                .or_else(|| file.backend_url.clone())
                .unwrap_or(client_defaults.base_url),
            conversation_id: flags
                .conversation_id
                .clone()
                .or_else(|| file.conversation_id.clone())
                .unwrap_or(client_defaults.conversation_id),
            timeout: flags
                .timeout_secs
                .or(file.request_timeout_secs)
                .map(Duration::from_secs)
                .unwrap_or(client_defaults.timeout),
            char_delay: flags
                .typing_delay_ms
                .or(file.typing_delay_ms)
                .map(Duration::from_millis)
                .unwrap_or(session_defaults.char_delay),
            tui: !flags.no_tui && file.tui.unwrap_or(true),
            theme: flags
                .theme
                .clone()
                .or_else(|| file.theme.clone())
                .unwrap_or_else(|| "dark".to_string()),
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.backend_url.clone(),
            conversation_id: self.conversation_id.clone(),
            timeout: self.timeout,
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            char_delay: self.char_delay,
        }
    }

    pub fn theme(&self) -> Theme {
        Theme::from_name(&self.theme)
    }
}
