// This fixture process is read by the tests in tests/attach.rs.
//
// It lays out `ROOT -> root node -> chain node -> character` in its own memory,
// prints a matching offsets document on one line, then applies `health <v>` /
// `mana <v>` commands from stdin until stdin is closed.
use std::env;
use std::error::Error;
use std::io::{self, BufRead, Write};
use std::mem;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use process_vitals::{module_base, Pid};

static ROOT: AtomicUsize = AtomicUsize::new(0);

const WORD: usize = mem::size_of::<usize>();
const FIRST_HOP: usize = WORD;
const SECOND_HOP: usize = WORD * 3;
const HEALTH: usize = 0x10;
const MANA: usize = 0x14;

fn main() -> Result<(), Box<dyn Error>> {
    let character: &'static [AtomicU32; 8] = Box::leak(Box::<[AtomicU32; 8]>::default());
    let chain_node: &'static [AtomicUsize; 4] = Box::leak(Box::<[AtomicUsize; 4]>::default());
    let root_node: &'static [AtomicUsize; 2] = Box::leak(Box::<[AtomicUsize; 2]>::default());

    character[HEALTH / 4].store(100.0f32.to_bits(), Ordering::SeqCst);
    character[MANA / 4].store(50.0f32.to_bits(), Ordering::SeqCst);
    chain_node[SECOND_HOP / WORD].store(character.as_ptr() as usize, Ordering::SeqCst);
    root_node[FIRST_HOP / WORD].store(chain_node.as_ptr() as usize, Ordering::SeqCst);
    ROOT.store(root_node.as_ptr() as usize, Ordering::SeqCst);

    let base = module_base(std::process::id() as Pid)?;
    let origin = &ROOT as *const AtomicUsize as usize - base;
    let exe = env::current_exe()?;
    let process_name = exe
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let offsets = serde_json::json!({
        "process_name": process_name,
        "offsets": {
            "char_origin": format!("{:#x}", origin),
            "char_base_offsets": [FIRST_HOP, SECOND_HOP],
            "health_offset": format!("{:#x}", HEALTH),
            "mana_offset": format!("{:#x}", MANA),
        }
    });

    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "{}", offsets)?;
    out.flush()?;

    for line in io::stdin().lock().lines() {
        let line = line?;
        let mut parts = line.split_whitespace();
        let slot = match parts.next() {
            Some("health") => HEALTH,
            Some("mana") => MANA,
            _ => continue,
        };
        let value: f32 = match parts.next().map(str::parse) {
            Some(Ok(value)) => value,
            _ => continue,
        };
        character[slot / 4].store(value.to_bits(), Ordering::SeqCst);
        writeln!(out, "ok")?;
        out.flush()?;
    }
    Ok(())
}
