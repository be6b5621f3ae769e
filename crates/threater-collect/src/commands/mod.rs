//! CLI command implementations
//!
//! Each subcommand has its own module; all of them receive a resolved
//! [`Context`].

pub mod check;
pub mod checkpoint;
pub mod collect;
pub mod health;
pub mod streams;

use crate::config::Settings;
use crate::error::{CollectError, Result};
use crate::streams::{find, StreamDescriptor};
use std::path::{Path, PathBuf};

/// Settings and locations shared by every command
#[derive(Debug, Clone)]
pub struct Context {
    pub settings: Settings,
    pub state_dir: PathBuf,
}

impl Context {
    pub fn load(config_path: Option<&Path>, state_dir: PathBuf) -> Result<Self> {
        Ok(Self {
            settings: Settings::load(config_path)?,
            state_dir,
        })
    }

    /// Descriptors whose group is switched on, in catalog order
    pub fn enabled_streams(&self) -> impl Iterator<Item = &'static StreamDescriptor> + '_ {
        crate::streams::CATALOG
            .iter()
            .filter(|d| self.settings.toggles.is_enabled(d.group))
    }
}

pub(crate) fn resolve_stream(name: &str) -> Result<&'static StreamDescriptor> {
    find(name).ok_or_else(|| CollectError::UnknownStream(name.to_string()))
}
