use std::path::{Path, PathBuf};

use crate::config::{OffsetConfig, CONFIG_FILE, HEALTH_OFFSET, MANA_OFFSET};
use crate::error::{Error, Result};
use crate::process::Process;
use crate::resolver::Attachment;

/// Caller-owned reading context.
///
/// Attaching is lazy: every read first tries to load the offsets file and attach to
/// the target until one attempt succeeds. After that the attachment is kept for
/// the lifetime of the context, even if the target process goes away.
pub struct Vitals {
    config_path: PathBuf,
    attachment: Option<Attachment<Process>>,
}

impl Default for Vitals {
    fn default() -> Self {
        Self::new()
    }
}

impl Vitals {
    /// Context reading `offsets.json` from the current working directory.
    pub fn new() -> Self {
        Self::with_config_path(CONFIG_FILE)
    }

    pub fn with_config_path<P: Into<PathBuf>>(config_path: P) -> Self {
        Vitals {
            config_path: config_path.into(),
            attachment: None,
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn is_attached(&self) -> bool {
        self.attachment.is_some()
    }

    /// Returns the attachment, trying to create it first if there is none yet.
    pub fn attach(&mut self) -> Result<&Attachment<Process>> {
        let attachment = match self.attachment.take() {
            Some(attachment) => attachment,
            None => connect(&self.config_path).map_err(|e| {
                warn!("not attached: {}", e);
                Error::NotAttached(Box::new(e))
            })?,
        };
        let attachment: &Attachment<Process> = self.attachment.insert(attachment);
        Ok(attachment)
    }

    pub fn read_named_value(&mut self, name: &str) -> Result<f32> {
        self.attach()?.read_named_value(name)
    }

    pub fn health(&mut self) -> Result<f32> {
        self.read_named_value(HEALTH_OFFSET)
    }

    pub fn mana(&mut self) -> Result<f32> {
        self.read_named_value(MANA_OFFSET)
    }
}

fn connect(config_path: &Path) -> Result<Attachment<Process>> {
    let config = OffsetConfig::load_from_path(config_path)?;
    Attachment::attach(config)
}
