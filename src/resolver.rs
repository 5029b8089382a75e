use crate::config::OffsetConfig;
use crate::error::Result;
use crate::process::{self, CopyAddress, Pid, Process};

/// Reads the pointer stored at `base`, then follows each hop in order: the next
/// pointer is read at `current + hop`.
pub fn resolve_pointer_chain<M>(memory: &M, base: usize, hops: &[usize]) -> Result<usize>
where
    M: CopyAddress + ?Sized,
{
    let root = memory.read_pointer(base)?;
    hops.iter()
        .try_fold(root, |current, &hop| memory.read_pointer(current.wrapping_add(hop)))
}

/// A memory source paired with the resolved base address of its pointer chain.
///
/// Only exists once the process was found, opened and its module located; the
/// base address is never recomputed afterwards.
pub struct Attachment<M = Process> {
    memory: M,
    base_address: usize,
    config: OffsetConfig,
}

impl Attachment<Process> {
    /// Find `config.process_name` among running processes and attach to it.
    pub fn attach(config: OffsetConfig) -> Result<Self> {
        let pid = process::find_process(&config.process_name)?;
        Self::attach_pid(pid, config)
    }

    /// Attach to a known process, skipping the name lookup.
    pub fn attach_pid(pid: Pid, config: OffsetConfig) -> Result<Self> {
        let process = Process::open(pid)?;
        let module_base = process.module_base()?;
        let base_address = module_base.wrapping_add(config.char_origin);
        info!(
            "attached to {} (pid {}): module base {:#x}, base address {:#x}",
            config.process_name, pid, module_base, base_address
        );
        Ok(Attachment::new(process, base_address, config))
    }
}

impl<M: CopyAddress> Attachment<M> {
    pub fn new(memory: M, base_address: usize, config: OffsetConfig) -> Self {
        Attachment {
            memory,
            base_address,
            config,
        }
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    pub fn base_address(&self) -> usize {
        self.base_address
    }

    pub fn config(&self) -> &OffsetConfig {
        &self.config
    }

    /// Walks the configured chain from the base address. Every call reads the
    /// chain afresh.
    pub fn resolve(&self) -> Result<usize> {
        resolve_pointer_chain(&self.memory, self.base_address, &self.config.char_base_offsets)
    }

    /// Address of the value registered under `name`.
    pub fn address_of(&self, name: &str) -> Result<usize> {
        let offset = self.config.named_offset(name)?;
        Ok(self.resolve()?.wrapping_add(offset))
    }

    /// Current float value registered under `name`.
    pub fn read_named_value(&self, name: &str) -> Result<f32> {
        let address = self.address_of(name)?;
        self.memory.read_f32(address)
    }
}
