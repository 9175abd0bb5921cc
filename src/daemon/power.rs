//! Operating state detection from the kernel power supply class

use std::fs;
use std::path::Path;
use tracing::debug;

use crate::constants::state;

/// `power_ac` if any mains supply is online, `power_bat` otherwise
pub fn detect_state(power_supply_dir: &Path) -> &'static str {
    let entries = match fs::read_dir(power_supply_dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(path = %power_supply_dir.display(), error = %e, "Cannot read power supplies, assuming AC");
            return state::POWER_AC;
        }
    };

    let mut saw_mains = false;
    for entry in entries.flatten() {
        let supply = entry.path();
        if read_attr(&supply, "type").as_deref() != Some("Mains") {
            continue;
        }
        saw_mains = true;
        if read_attr(&supply, "online").as_deref() == Some("1") {
            return state::POWER_AC;
        }
    }

    // Desktops without any mains entry are always on AC
    if saw_mains {
        state::POWER_BATTERY
    } else {
        state::POWER_AC
    }
}

fn read_attr(supply: &Path, attr: &str) -> Option<String> {
    fs::read_to_string(supply.join(attr))
        .ok()
        .map(|s| s.trim().to_string())
}
