// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration file (JSON).
//!
//! The configuration file is the single persistent artifact: process
//! descriptors, sampler cadence, log settings, and notification
//! transports. Crash records and alert history live in memory only.

use pg_adapters::{
    DesktopSink, EmailConfig, EmailSink, NotifySink, SlackSink, WebhookSink,
};
use pg_core::{ConfigError, DependencyGraph, ProcessConfig};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

fn default_log_level() -> String {
    "info".to_string()
}

fn default_monitor_interval() -> f64 {
    10.0
}

fn default_log_rotate_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_log_rotate_keep() -> usize {
    5
}

fn default_cooldown_seconds() -> u64 {
    300
}

fn default_smtp_port() -> u16 {
    587
}

fn default_true() -> bool {
    true
}

/// Top-level daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Sampler tick cadence in seconds.
    #[serde(default = "default_monitor_interval")]
    pub monitor_interval: f64,

    /// Start every process (in dependency order) at daemon boot.
    #[serde(default)]
    pub auto_start_processes: bool,

    /// Per-process log directory; `<state_dir>/logs` when unset.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    #[serde(default = "default_log_rotate_bytes")]
    pub log_rotate_bytes: u64,

    #[serde(default = "default_log_rotate_keep")]
    pub log_rotate_keep: usize,

    #[serde(default)]
    pub processes: Vec<ProcessConfig>,

    #[serde(default)]
    pub notifications: NotificationsConfig,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            monitor_interval: default_monitor_interval(),
            auto_start_processes: false,
            log_dir: None,
            log_rotate_bytes: default_log_rotate_bytes(),
            log_rotate_keep: default_log_rotate_keep(),
            processes: Vec::new(),
            notifications: NotificationsConfig::default(),
        }
    }
}

/// Notification transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Alert dedup window.
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: u64,

    #[serde(default)]
    pub email_enabled: bool,
    #[serde(default)]
    pub email_smtp_server: String,
    #[serde(default = "default_smtp_port")]
    pub email_smtp_port: u16,
    #[serde(default)]
    pub email_smtp_username: String,
    #[serde(default)]
    pub email_smtp_password: String,
    #[serde(default = "default_true")]
    pub email_smtp_use_tls: bool,
    #[serde(default)]
    pub email_from: Option<String>,
    #[serde(default)]
    pub email_recipients: Vec<String>,

    #[serde(default)]
    pub webhook_enabled: bool,
    #[serde(default)]
    pub webhook_url: String,
    #[serde(default)]
    pub webhook_headers: HashMap<String, String>,

    #[serde(default)]
    pub slack_enabled: bool,
    #[serde(default)]
    pub slack_webhook_url: String,

    #[serde(default)]
    pub desktop_enabled: bool,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            cooldown_seconds: default_cooldown_seconds(),
            email_enabled: false,
            email_smtp_server: String::new(),
            email_smtp_port: default_smtp_port(),
            email_smtp_username: String::new(),
            email_smtp_password: String::new(),
            email_smtp_use_tls: true,
            email_from: None,
            email_recipients: Vec::new(),
            webhook_enabled: false,
            webhook_url: String::new(),
            webhook_headers: HashMap::new(),
            slack_enabled: false,
            slack_webhook_url: String::new(),
            desktop_enabled: false,
        }
    }
}

impl GuardConfig {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Invalid(format!("read {}: {e}", path.display())))?;
        let config: GuardConfig = serde_json::from_str(&contents)
            .map_err(|e| ConfigError::Invalid(format!("parse {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.monitor_interval).unwrap_or(Duration::from_secs(10))
    }

    /// Validate the whole file: field ranges, unique names, known
    /// dependencies, acyclic graph.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.monitor_interval.is_finite() || self.monitor_interval <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "monitor_interval must be positive (got {})",
                self.monitor_interval
            )));
        }
        if self.log_rotate_keep == 0 {
            return Err(ConfigError::Invalid(
                "log_rotate_keep must be at least 1".to_string(),
            ));
        }

        let mut names: HashSet<&str> = HashSet::new();
        for process in &self.processes {
            process.validate()?;
            if !names.insert(process.name.as_str()) {
                return Err(ConfigError::DuplicateName(process.name.clone()));
            }
        }
        for process in &self.processes {
            for dep in &process.depends_on {
                if !names.contains(dep.as_str()) {
                    return Err(ConfigError::UnknownDependency {
                        process: process.name.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }
        self.build_graph()?;
        Ok(())
    }

    /// Processes in registration order (dependencies first).
    pub fn processes_in_dependency_order(&self) -> Result<Vec<ProcessConfig>, ConfigError> {
        let graph = self.build_graph()?;
        let by_name: HashMap<&str, &ProcessConfig> = self
            .processes
            .iter()
            .map(|p| (p.name.as_str(), p))
            .collect();
        Ok(graph
            .topo_order()
            .into_iter()
            .filter_map(|name| by_name.get(name.as_str()).map(|p| (*p).clone()))
            .collect())
    }

    fn build_graph(&self) -> Result<DependencyGraph, ConfigError> {
        let mut graph = DependencyGraph::new();
        for process in &self.processes {
            graph.insert(&process.name, &process.depends_on)?;
        }
        Ok(graph)
    }
}

impl NotificationsConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_seconds)
    }

    /// Build the enabled sinks; a misconfigured sink is skipped with a
    /// warning rather than refusing daemon start.
    pub fn build_sinks(&self) -> Vec<Arc<dyn NotifySink>> {
        let mut sinks: Vec<Arc<dyn NotifySink>> = Vec::new();

        if self.email_enabled {
            let config = EmailConfig {
                server: self.email_smtp_server.clone(),
                port: self.email_smtp_port,
                username: self.email_smtp_username.clone(),
                password: self.email_smtp_password.clone(),
                use_tls: self.email_smtp_use_tls,
                from: self.email_from.clone(),
                recipients: self.email_recipients.clone(),
            };
            match EmailSink::new(config) {
                Ok(sink) => sinks.push(Arc::new(sink)),
                Err(e) => tracing::warn!(error = %e, "email sink disabled"),
            }
        }

        if self.webhook_enabled {
            match WebhookSink::new(self.webhook_url.clone(), &self.webhook_headers) {
                Ok(sink) => sinks.push(Arc::new(sink)),
                Err(e) => tracing::warn!(error = %e, "webhook sink disabled"),
            }
        }

        if self.slack_enabled {
            match SlackSink::new(self.slack_webhook_url.clone()) {
                Ok(sink) => sinks.push(Arc::new(sink)),
                Err(e) => tracing::warn!(error = %e, "slack sink disabled"),
            }
        }

        if self.desktop_enabled {
            sinks.push(Arc::new(DesktopSink::new()));
        }

        sinks
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
