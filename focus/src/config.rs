use anyhow::{Context, Result};
use directories::ProjectDirs;
use ratatui::style::Color;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::engine::TimerSettings;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub timer: TimerConfig,
    pub storage: StorageConfig,
    pub ipc: IpcConfig,
    pub notifications: NotificationConfig,
    pub theme: Theme,
    pub icons: Icons,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct TimerConfig {
    pub default_minutes: u64,
    pub adjust_floor_minutes: u64,
    pub max_minutes: u64,
    pub persist_throttle_ms: i64,
    pub tick_millis: u64,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct StorageConfig {
    pub key: String,
    /// Namespaces the stored timer, e.g. per signed-in user.
    pub profile: Option<String>,
    /// Overrides the platform data directory.
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct IpcConfig {
    pub socket_path: PathBuf,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct NotificationConfig {
    pub desktop: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Theme {
    #[serde(deserialize_with = "hex_to_color")]
    pub background: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub foreground: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub black: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub red: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub green: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub yellow: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub blue: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub magenta: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub gray: Color,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Icons {
    pub timer: String,
    pub play: String,
    pub pause: String,
    pub stop: String,
    pub done: String,
    pub progress_filled: String,
    pub progress_empty: String,
    pub separator: String,
    pub header_left: String,
    pub header_right: String,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            default_minutes: 25,
            adjust_floor_minutes: 5,
            max_minutes: 120,
            persist_throttle_ms: 500,
            tick_millis: 1000,
        }
    }
}

impl TimerConfig {
    pub fn settings(&self) -> TimerSettings {
        let max_seconds = self.max_minutes.max(1) * 60;
        TimerSettings {
            default_seconds: (self.default_minutes * 60).min(max_seconds),
            adjust_floor_seconds: (self.adjust_floor_minutes * 60).min(max_seconds),
            max_seconds,
            persist_throttle_ms: self.persist_throttle_ms.max(0),
        }
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_millis.max(1))
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            key: "focus-timer".to_string(),
            profile: None,
            data_dir: None,
        }
    }
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(focus_ipc::DEFAULT_SOCKET_PATH),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self { desktop: true }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            background: Color::Rgb(9, 14, 19),
            foreground: Color::Rgb(197, 201, 199),
            black: Color::Rgb(13, 12, 12),
            red: Color::Rgb(228, 104, 118),
            green: Color::Rgb(138, 154, 123),
            yellow: Color::Rgb(196, 178, 138),
            blue: Color::Rgb(127, 180, 202),
            magenta: Color::Rgb(162, 146, 163),
            gray: Color::Rgb(164, 167, 164),
        }
    }
}

impl Default for Icons {
    fn default() -> Self {
        Self {
            timer: "◷".to_string(),
            play: "▶".to_string(),
            pause: "⏸".to_string(),
            stop: "■".to_string(),
            done: "✔".to_string(),
            progress_filled: "█".to_string(),
            progress_empty: "░".to_string(),
            separator: "│".to_string(),
            header_left: "⟪ ".to_string(),
            header_right: " ⟫".to_string(),
        }
    }
}

fn hex_to_color<'de, D>(deserializer: D) -> Result<Color, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = serde::Deserialize::deserialize(deserializer)?;
    if !s.starts_with('#') || s.len() != 7 || !s.is_ascii() {
        return Err(serde::de::Error::custom("invalid hex color format"));
    }
    let r = u8::from_str_radix(&s[1..3], 16).map_err(serde::de::Error::custom)?;
    let g = u8::from_str_radix(&s[3..5], 16).map_err(serde::de::Error::custom)?;
    let b = u8::from_str_radix(&s[5..7], 16).map_err(serde::de::Error::custom)?;
    Ok(Color::Rgb(r, g, b))
}

pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("com", "onboarding", "Focus")
        .map(|proj_dirs| proj_dirs.config_dir().join("focus.toml"))
}

/// Load `path`, or the default config file when `path` is `None`.
/// A missing default file means defaults; a missing explicit file is an error.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let (path, required) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => match default_config_path() {
            Some(path) => (path, false),
            None => return Ok(Config::default()),
        },
    };

    if !required && !path.exists() {
        return Ok(Config::default());
    }
    let config_str = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file at {:?}", path))?;
    parse_config(&config_str).with_context(|| format!("Failed to parse config file at {:?}", path))
}

pub fn parse_config(config_str: &str) -> Result<Config> {
    Ok(toml::from_str(config_str)?)
}
