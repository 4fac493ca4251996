use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub shell: ShellConfig,
    #[serde(default)]
    pub cluster: ClusterConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellConfig {
    /// Shell started for new shell tabs
    #[serde(default = "detect_default_shell")]
    pub program: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Executable used for "log into cluster" tabs
    #[serde(default = "default_login_command")]
    pub login_command: String,

    /// Shown on the status line when the login command is not installed
    #[serde(default = "default_install_hint")]
    pub install_hint: String,
}

fn default_login_command() -> String {
    "ocm-container".to_string()
}

fn default_install_hint() -> String {
    "https://github.com/openshift/ocm-container#installation".to_string()
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            program: detect_default_shell(),
        }
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            login_command: default_login_command(),
            install_hint: default_install_hint(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, falling back to
    /// built-in defaults when no config file exists yet.
    pub fn load_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_file(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents =
            fs::read_to_string(path.as_ref()).context("Failed to read config file")?;

        let config: Config =
            serde_yaml::from_str(&contents).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = serde_yaml::to_string(self).context("Failed to serialize config")?;

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        fs::write(path.as_ref(), contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Get default configuration path
    pub fn default_config_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Failed to get home directory")?;

        Ok(home.join(".opsdeck").join("config.yaml"))
    }
}

/// Detect the default shell for the current platform
fn detect_default_shell() -> String {
    #[cfg(windows)]
    {
        if which::which("pwsh").is_ok() {
            return "pwsh.exe".to_string();
        }

        if which::which("powershell").is_ok() {
            return "powershell.exe".to_string();
        }

        "cmd.exe".to_string()
    }

    #[cfg(not(windows))]
    {
        std::env::var("SHELL").unwrap_or_else(|_| "/bin/bash".to_string())
    }
}
