//! Front-end commands driving the configuration service

use anyhow::{Context, Result, anyhow, bail};
use serde_json::{Map, Value};
use tracing::info;

use crate::commit::CommitChannel;
use crate::config::Profile;
use crate::sync::ConfigService;

pub fn status<C: CommitChannel>(service: &ConfigService<C>) {
    let settings = service.settings();
    println!("State assignments:");
    for (state_id, profile_name) in &settings.state_map {
        let marker = if service.profile_by_name(profile_name).is_some() {
            ""
        } else {
            "  (missing)"
        };
        println!("  {state_id:<16} {profile_name}{marker}");
    }
    println!("CPU control: {}", on_off(settings.cpu_settings_enabled));
    println!("Fan control: {}", on_off(settings.fan_control_enabled));
    if let Some(time) = &settings.shutdown_time {
        println!("Scheduled shutdown: {time}");
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled { "enabled" } else { "disabled" }
}

pub fn list<C: CommitChannel>(service: &ConfigService<C>) {
    for profile in service.all_profiles() {
        let kind = if service.is_default_profile(&profile.name) {
            "built-in"
        } else {
            "custom"
        };
        let description = profile.description.as_deref().unwrap_or_default();
        println!("{:<24} {:<9} {}", profile.name, kind, description);
    }
}

pub fn show<C: CommitChannel>(service: &ConfigService<C>, name: &str) -> Result<()> {
    let profile = service
        .profile_by_name(name)
        .ok_or_else(|| anyhow!("No profile named '{name}'"))?;
    let json = serde_json::to_string_pretty(&profile).context("Failed to serialize profile")?;
    println!("{json}");
    Ok(())
}

pub fn activate<C: CommitChannel>(service: &mut ConfigService<C>, profile: &str, state_id: &str) -> Result<()> {
    if service.profile_by_name(profile).is_none() {
        bail!("No profile named '{profile}'");
    }
    service
        .set_active_profile(profile, state_id)
        .with_context(|| format!("Failed to assign '{profile}' to state '{state_id}'"))?;
    println!("'{state_id}' now uses '{profile}'");
    Ok(())
}

pub fn copy<C: CommitChannel>(service: &mut ConfigService<C>, from: &str, to: &str) -> Result<()> {
    let copied = service
        .copy_profile(from, to)
        .with_context(|| format!("Failed to copy '{from}' to '{to}'"))?;
    if !copied {
        bail!("Cannot copy '{from}' to '{to}': source missing or target name taken");
    }
    println!("Copied '{from}' to '{to}'");
    Ok(())
}

pub fn delete<C: CommitChannel>(service: &mut ConfigService<C>, name: &str) -> Result<()> {
    let deleted = service
        .delete_custom_profile(name)
        .with_context(|| format!("Failed to delete '{name}'"))?;
    if !deleted {
        bail!("No custom profile named '{name}'");
    }
    let settings = service.settings();
    for (state_id, profile_name) in &settings.state_map {
        if profile_name == name {
            println!("Warning: state '{state_id}' still refers to '{name}'");
        }
    }
    println!("Deleted '{name}'");
    Ok(())
}

/// Apply `PATH=VALUE` assignments to a custom profile and commit the result
pub fn edit<C: CommitChannel>(service: &mut ConfigService<C>, name: &str, assignments: &[String]) -> Result<()> {
    if service.custom_profile_by_name(name).is_none() && service.is_default_profile(name) {
        bail!("'{name}' is a built-in profile, copy it to a custom profile first");
    }
    if !service.begin_edit(Some(name)) {
        bail!("No custom profile named '{name}'");
    }

    let profile = service
        .editing_profile_mut()
        .ok_or_else(|| anyhow!("Editing session for '{name}' vanished"))?;
    for assignment in assignments {
        apply_assignment(profile, assignment)?;
    }

    if !service.has_changes() {
        println!("No changes to '{name}'");
        service.begin_edit(None);
        return Ok(());
    }

    let saved = service
        .write_current_editing_profile()
        .with_context(|| format!("Failed to save '{name}'"))?;
    if !saved {
        bail!("Cannot save '{name}': the new name is empty or already taken");
    }
    println!("Saved '{name}'");
    Ok(())
}

/// Set a dotted field path (`fan.minimum_speed=80`) on a profile. The value
/// is parsed as JSON, falling back to a plain string; `null` unsets a field.
pub fn apply_assignment(profile: &mut Profile, assignment: &str) -> Result<()> {
    let (path, raw) = assignment
        .split_once('=')
        .ok_or_else(|| anyhow!("Expected PATH=VALUE, got '{assignment}'"))?;
    let path = path.trim();
    ensure_known_field(path)?;
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));

    let mut doc = serde_json::to_value(&*profile).context("Failed to serialize profile")?;
    set_path(&mut doc, path, value)?;
    *profile = serde_json::from_value(doc)
        .with_context(|| format!("Invalid value for '{path}': {raw}"))?;
    info!(field = %path, value = %raw, "Updated working copy");
    Ok(())
}

/// Fail unless `path` names a field of a fully populated profile
fn ensure_known_field(path: &str) -> Result<()> {
    let mut template = Profile::named("");
    template.fill_defaults();
    let mut current = serde_json::to_value(&template).context("Failed to serialize profile")?;
    for key in path.split('.') {
        current = match current {
            Value::Object(mut fields) if !key.is_empty() => fields
                .remove(key)
                .ok_or_else(|| anyhow!("Unknown profile field '{path}'"))?,
            _ => bail!("'{path}' does not name a profile field"),
        };
    }
    Ok(())
}

fn set_path(doc: &mut Value, path: &str, value: Value) -> Result<()> {
    let mut keys = path.split('.').peekable();
    let mut current = doc;
    while let Some(key) = keys.next() {
        if key.is_empty() {
            bail!("Invalid field path '{path}'");
        }
        let object = current
            .as_object_mut()
            .ok_or_else(|| anyhow!("'{path}' does not name a field"))?;
        if keys.peek().is_none() {
            if value.is_null() {
                object.remove(key);
            } else {
                object.insert(key.to_string(), value);
            }
            return Ok(());
        }
        current = object
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    bail!("Empty field path")
}
