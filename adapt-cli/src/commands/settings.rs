//! Settings inspection commands

use std::fmt::Write as _;
use std::path::Path;

use adapt_core::settings::{SETTINGS_EXTENSION, SettingsLayout, SettingsRegistry};
use adapt_plugin_api::TenantId;
use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use crate::config::ConfigLoader;

#[derive(Args)]
pub struct SettingsArgs {
    #[command(subcommand)]
    pub command: SettingsCommands,
}

#[derive(Subcommand)]
pub enum SettingsCommands {
    /// Show the settings overview, or one plugin's block
    Show {
        /// Plugin key
        key: Option<String>,

        /// Show the per-tenant settings of this tenant instead
        #[arg(long)]
        tenant: Option<TenantId>,
    },
}

pub fn run(args: SettingsArgs) -> Result<()> {
    let config = ConfigLoader::load()?;
    match args.command {
        SettingsCommands::Show { key, tenant } => {
            let output = match tenant {
                Some(tenant) => show_tenant(&config.data.dir, tenant, key.as_deref())?,
                None => show_global(&config.data.dir, key.as_deref())?,
            };
            print!("{output}");
            Ok(())
        }
    }
}

fn show_global(data_dir: &Path, key: Option<&str>) -> Result<String> {
    let registry = SettingsRegistry::load_dir(data_dir);

    if let Some(key) = key {
        let value = registry.global_value(key)?;
        return Ok(format!("{}\n", serde_json::to_string_pretty(&value)?));
    }

    let layout = registry.layout();
    let mut out = String::new();
    writeln!(out, "Settings file: {}", layout.global_file.display())?;
    writeln!(
        out,
        "Bot token:     {}",
        if registry.bot_token().is_some() {
            "set"
        } else {
            "not set"
        }
    )?;

    let keys = registry.global_keys();
    writeln!(out, "Plugins:       {}", keys.len())?;
    for key in keys {
        writeln!(out, "  {key}")?;
    }

    let tenants = tenant_entries(&layout.tenant_root)?;
    writeln!(out, "Tenants:       {}", tenants.len())?;
    for tenant in tenants {
        writeln!(out, "  {tenant}")?;
    }
    Ok(out)
}

fn show_tenant(data_dir: &Path, tenant: TenantId, key: Option<&str>) -> Result<String> {
    let layout = SettingsLayout::in_dir(data_dir);

    if let Some(key) = key {
        let path = layout.tenant_file(tenant, key);
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("No settings for '{key}' in tenant {tenant}"))?;
        let value: serde_json::Value = serde_json::from_str(&contents)
            .with_context(|| format!("Invalid JSON in {}", path.display()))?;
        return Ok(format!("{}\n", serde_json::to_string_pretty(&value)?));
    }

    let dir = layout.tenant_dir(tenant);
    let mut out = String::new();
    writeln!(out, "Tenant {tenant}: {}", dir.display())?;
    for key in tenant_entries(&dir)? {
        writeln!(out, "  {key}")?;
    }
    Ok(out)
}

/// Sorted entry names of a settings directory; settings files lose their extension
fn tenant_entries(dir: &Path) -> Result<Vec<String>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut names = Vec::new();
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        let name = if path.is_dir() {
            path.file_name()
        } else if path.extension().is_some_and(|ext| ext == SETTINGS_EXTENSION) {
            path.file_stem()
        } else {
            None
        };
        if let Some(name) = name {
            names.push(name.to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}
