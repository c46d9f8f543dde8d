//! Cooldown persistence between CLI runs
//!
//! The tracker lives in memory; the CLI saves it as JSON next to the ledger
//! so a claim made in one invocation still blocks the next.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tamra_vault::{CooldownEntry, CooldownTracker};

pub fn load(tracker: &CooldownTracker, path: &Path) -> Result<usize> {
    if !path.exists() {
        return Ok(0);
    }

    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading cooldowns from {}", path.display()))?;
    let entries: Vec<CooldownEntry> = serde_json::from_str(&contents)
        .with_context(|| format!("parsing cooldowns in {}", path.display()))?;
    let count = entries.len();
    tracker.load(entries);

    log::debug!("Loaded {} cooldown entries", count);
    Ok(count)
}

pub fn save(tracker: &CooldownTracker, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(&tracker.snapshot())?;

    // Write then rename so an interrupted save keeps the old file
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}
