//! Read live health and mana values out of another process.
//!
//! An `offsets.json` file names the target executable and a pointer chain: a root
//! pointer at a fixed distance from the main module, a list of hops, and the final
//! offset of each value. [`Vitals`] attaches lazily and walks the chain on every
//! read; [`ffi`] exposes the same reads as `get_hp` / `get_mp` C functions.

#[macro_use]
extern crate log;

pub mod config;
pub mod error;
pub mod ffi;
#[cfg(test)]
mod mock;
pub mod process;
pub mod reader;
pub mod resolver;

pub use config::{OffsetConfig, CONFIG_FILE, HEALTH_OFFSET, MANA_OFFSET};
pub use error::{Error, Result};
pub use process::{find_process, module_base, CopyAddress, Pid, Process};
pub use reader::Vitals;
pub use resolver::{resolve_pointer_chain, Attachment};
