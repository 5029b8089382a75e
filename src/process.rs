//! Target process discovery and raw memory access.
//!
//! Linux reads through `process_vm_readv` and walks `/proc`; Windows goes through
//! `OpenProcess`/`ReadProcessMemory` and ToolHelp snapshots.

use std::io;
use std::mem;

use crate::error::{Error, Result};

pub use self::platform::Pid;

/// Anything that can copy bytes out of a target address space.
pub trait CopyAddress {
    fn copy_address(&self, addr: usize, buf: &mut [u8]) -> io::Result<()>;

    /// Copies `length` bytes starting at `addr`.
    fn read_bytes(&self, addr: usize, length: usize) -> Result<Vec<u8>> {
        let mut copy = vec![0; length];
        copy_logged(self, addr, &mut copy)?;
        Ok(copy)
    }

    /// Reads one pointer-sized value in native byte order.
    fn read_pointer(&self, addr: usize) -> Result<usize> {
        let mut buf = [0u8; mem::size_of::<usize>()];
        copy_logged(self, addr, &mut buf)?;
        Ok(usize::from_ne_bytes(buf))
    }

    fn read_i32(&self, addr: usize) -> Result<i32> {
        let mut buf = [0u8; 4];
        copy_logged(self, addr, &mut buf)?;
        Ok(i32::from_ne_bytes(buf))
    }

    fn read_u32(&self, addr: usize) -> Result<u32> {
        let mut buf = [0u8; 4];
        copy_logged(self, addr, &mut buf)?;
        Ok(u32::from_ne_bytes(buf))
    }

    fn read_u64(&self, addr: usize) -> Result<u64> {
        let mut buf = [0u8; 8];
        copy_logged(self, addr, &mut buf)?;
        Ok(u64::from_ne_bytes(buf))
    }

    /// Reads an IEEE-754 single-precision float in native byte order.
    fn read_f32(&self, addr: usize) -> Result<f32> {
        let mut buf = [0u8; mem::size_of::<f32>()];
        copy_logged(self, addr, &mut buf)?;
        Ok(f32::from_ne_bytes(buf))
    }
}

fn copy_logged<T>(source: &T, addr: usize, buf: &mut [u8]) -> Result<()>
where
    T: CopyAddress + ?Sized,
{
    debug!("copy_address: addr: {:x} len: {}", addr, buf.len());

    source.copy_address(addr, buf).map_err(|e| {
        warn!("copy_address failed for {:x}: {:?}", addr, e);
        Error::MemoryReadFailed {
            address: addr,
            source: e,
        }
    })
}

/// An open handle to another process.
pub struct Process {
    pid: Pid,
    handle: platform::ProcessHandle,
}

impl Process {
    pub fn open(pid: Pid) -> Result<Process> {
        let handle = platform::open(pid).map_err(|source| Error::ProcessOpenFailed { pid, source })?;
        debug!("opened process {}", pid);
        Ok(Process { pid, handle })
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Whether the process is still running. Only reports; nothing reattaches.
    pub fn is_alive(&self) -> bool {
        platform::is_alive(self.handle)
    }

    /// Load address of the process's main executable image.
    pub fn module_base(&self) -> Result<usize> {
        module_base(self.pid)
    }
}

impl Drop for Process {
    fn drop(&mut self) {
        platform::close(self.handle);
    }
}

impl CopyAddress for Process {
    fn copy_address(&self, addr: usize, buf: &mut [u8]) -> io::Result<()> {
        platform::copy_address(self.handle, addr, buf)
    }
}

/// A running process as seen during enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: Pid,
    pub name: String,
    /// False when the name came from a fallback source and the process's
    /// image cannot be inspected.
    pub inspectable: bool,
}

/// Returns the first running process whose executable file name equals `name` exactly.
pub fn find_process(name: &str) -> Result<Pid> {
    match pick_process(&platform::processes()?, name) {
        Some(pid) => {
            debug!("found process {} with pid {}", name, pid);
            Ok(pid)
        }
        None => Err(Error::ProcessNotFound(name.to_string())),
    }
}

/// First inspectable match, else the first match of any kind.
fn pick_process(entries: &[ProcessEntry], name: &str) -> Option<Pid> {
    let mut matches = entries.iter().filter(|entry| entry.name == name);
    let first = matches.next()?;
    if first.inspectable {
        return Some(first.pid);
    }
    Some(
        matches
            .find(|entry| entry.inspectable)
            .unwrap_or(first)
            .pid,
    )
}

/// Load address of the main executable image of process `pid`.
pub fn module_base(pid: Pid) -> Result<usize> {
    platform::module_base(pid)?.ok_or(Error::ModuleNotFound(pid))
}

#[cfg(not(any(target_os = "linux", windows)))]
compile_error!("process-vitals only supports Linux and Windows targets");

#[cfg(target_os = "linux")]
mod platform {
    use libc::{c_void, iovec, pid_t, process_vm_readv};
    use std::fs;
    use std::io;
    use std::path::Path;

    use super::ProcessEntry;

    pub type Pid = pid_t;
    pub type ProcessHandle = pid_t;

    const DELETED_SUFFIX: &str = " (deleted)";

    pub fn open(pid: Pid) -> io::Result<ProcessHandle> {
        // process_vm_readv addresses the target by pid, so "opening" only checks it exists.
        fs::metadata(format!("/proc/{}", pid))?;
        Ok(pid)
    }

    pub fn close(_handle: ProcessHandle) {}

    pub fn is_alive(handle: ProcessHandle) -> bool {
        let signalable = unsafe { libc::kill(handle, 0) } == 0
            || io::Error::last_os_error().raw_os_error() == Some(libc::EPERM);
        // An exited child stays signalable until it is reaped.
        signalable && !is_zombie(handle)
    }

    fn is_zombie(pid: Pid) -> bool {
        fs::read_to_string(format!("/proc/{}/stat", pid))
            .ok()
            .and_then(|stat| {
                // The state follows the parenthesised command name, which may contain spaces.
                let rest = &stat[stat.rfind(')')? + 1..];
                rest.split_whitespace().next().map(|state| state == "Z")
            })
            .unwrap_or(false)
    }

    pub fn copy_address(handle: ProcessHandle, addr: usize, buf: &mut [u8]) -> io::Result<()> {
        if buf.is_empty() {
            return Ok(());
        }

        let local_iov = iovec {
            iov_base: buf.as_mut_ptr() as *mut c_void,
            iov_len: buf.len(),
        };
        let remote_iov = iovec {
            iov_base: addr as *mut c_void,
            iov_len: buf.len(),
        };
        let result = unsafe { process_vm_readv(handle, &local_iov, 1, &remote_iov, 1, 0) };
        if result == -1 {
            Err(io::Error::last_os_error())
        } else if result as usize != buf.len() {
            Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("partial read: {} of {} bytes", result, buf.len()),
            ))
        } else {
            Ok(())
        }
    }

    pub fn processes() -> io::Result<Vec<ProcessEntry>> {
        let mut found = Vec::new();
        for entry in fs::read_dir("/proc")? {
            let entry = entry?;
            let pid = match entry.file_name().to_str().and_then(|s| s.parse::<Pid>().ok()) {
                Some(pid) => pid,
                None => continue,
            };
            // Processes can exit between listing and lookup.
            if let Some(entry) = describe(pid) {
                found.push(entry);
            }
        }
        Ok(found)
    }

    fn describe(pid: Pid) -> Option<ProcessEntry> {
        if let Ok(exe) = fs::read_link(format!("/proc/{}/exe", pid)) {
            let name = exe.file_name()?.to_string_lossy().into_owned();
            let name = match name.strip_suffix(DELETED_SUFFIX) {
                Some(stripped) => stripped.to_string(),
                None => name,
            };
            return Some(ProcessEntry {
                pid,
                name,
                inspectable: true,
            });
        }
        // Without ptrace rights on the target the exe link is unreadable; comm is
        // world-readable but truncated to 15 bytes.
        fs::read_to_string(format!("/proc/{}/comm", pid))
            .ok()
            .map(|comm| ProcessEntry {
                pid,
                name: comm.trim_end_matches('\n').to_string(),
                inspectable: false,
            })
    }

    pub fn module_base(pid: Pid) -> io::Result<Option<usize>> {
        let exe = fs::read_link(format!("/proc/{}/exe", pid))?;
        let maps = fs::read_to_string(format!("/proc/{}/maps", pid))?;
        Ok(parse_module_base(&maps, &exe))
    }

    /// Lowest start address among the mappings backed by `exe`.
    pub(super) fn parse_module_base(maps: &str, exe: &Path) -> Option<usize> {
        maps.lines()
            .filter_map(|line| {
                let mut fields = line.split_whitespace();
                let range = fields.next()?;
                let path = fields.skip(4).collect::<Vec<_>>().join(" ");
                if Path::new(&path) != exe {
                    return None;
                }
                let start = range.split('-').next()?;
                usize::from_str_radix(start, 16).ok()
            })
            .min()
    }
}

#[cfg(windows)]
mod platform {
    use std::ffi::c_void;
    use std::io;
    use std::mem;

    use windows_sys::Win32::Foundation::{
        CloseHandle, FALSE, HANDLE, INVALID_HANDLE_VALUE, STILL_ACTIVE,
    };
    use windows_sys::Win32::System::Diagnostics::Debug::ReadProcessMemory;
    use windows_sys::Win32::System::Diagnostics::ToolHelp::{
        CreateToolhelp32Snapshot, Module32FirstW, Process32FirstW, Process32NextW, MODULEENTRY32W,
        PROCESSENTRY32W, TH32CS_SNAPMODULE, TH32CS_SNAPMODULE32, TH32CS_SNAPPROCESS,
    };
    use windows_sys::Win32::System::Threading::{
        GetExitCodeProcess, OpenProcess, PROCESS_ALL_ACCESS,
    };

    use super::ProcessEntry;

    pub type Pid = u32;
    pub type ProcessHandle = HANDLE;

    struct Snapshot(HANDLE);

    impl Snapshot {
        fn new(flags: u32, pid: Pid) -> io::Result<Snapshot> {
            let handle = unsafe { CreateToolhelp32Snapshot(flags, pid) };
            if handle == INVALID_HANDLE_VALUE {
                Err(io::Error::last_os_error())
            } else {
                Ok(Snapshot(handle))
            }
        }
    }

    impl Drop for Snapshot {
        fn drop(&mut self) {
            unsafe { CloseHandle(self.0) };
        }
    }

    fn wide_to_string(wide: &[u16]) -> String {
        let len = wide.iter().position(|&c| c == 0).unwrap_or(wide.len());
        String::from_utf16_lossy(&wide[..len])
    }

    pub fn open(pid: Pid) -> io::Result<ProcessHandle> {
        let handle = unsafe { OpenProcess(PROCESS_ALL_ACCESS, FALSE, pid) };
        if handle == 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(handle)
        }
    }

    pub fn close(handle: ProcessHandle) {
        unsafe { CloseHandle(handle) };
    }

    pub fn is_alive(handle: ProcessHandle) -> bool {
        let mut code = 0u32;
        let ok = unsafe { GetExitCodeProcess(handle, &mut code) } != FALSE;
        ok && code == STILL_ACTIVE as u32
    }

    pub fn copy_address(handle: ProcessHandle, addr: usize, buf: &mut [u8]) -> io::Result<()> {
        if buf.is_empty() {
            return Ok(());
        }

        let mut read = 0usize;
        let ok = unsafe {
            ReadProcessMemory(
                handle,
                addr as *const c_void,
                buf.as_mut_ptr() as *mut c_void,
                buf.len(),
                &mut read,
            )
        };
        if ok == FALSE {
            Err(io::Error::last_os_error())
        } else if read != buf.len() {
            Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("partial read: {} of {} bytes", read, buf.len()),
            ))
        } else {
            Ok(())
        }
    }

    pub fn processes() -> io::Result<Vec<ProcessEntry>> {
        let snapshot = Snapshot::new(TH32CS_SNAPPROCESS, 0)?;
        let mut entry: PROCESSENTRY32W = unsafe { mem::zeroed() };
        entry.dwSize = mem::size_of::<PROCESSENTRY32W>() as u32;

        let mut found = Vec::new();
        let mut more = unsafe { Process32FirstW(snapshot.0, &mut entry) } != FALSE;
        while more {
            found.push(ProcessEntry {
                pid: entry.th32ProcessID,
                name: wide_to_string(&entry.szExeFile),
                inspectable: true,
            });
            more = unsafe { Process32NextW(snapshot.0, &mut entry) } != FALSE;
        }
        Ok(found)
    }

    pub fn module_base(pid: Pid) -> io::Result<Option<usize>> {
        let snapshot = Snapshot::new(TH32CS_SNAPMODULE | TH32CS_SNAPMODULE32, pid)?;
        let mut entry: MODULEENTRY32W = unsafe { mem::zeroed() };
        entry.dwSize = mem::size_of::<MODULEENTRY32W>() as u32;

        // The first module in a module snapshot is the executable itself.
        if unsafe { Module32FirstW(snapshot.0, &mut entry) } == FALSE {
            return Ok(None);
        }
        Ok(Some(entry.modBaseAddr as usize))
    }
}
