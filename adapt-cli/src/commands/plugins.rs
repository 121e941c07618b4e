//! Plugin inspection commands

use adapt_core::plugins::{DiscoveredPlugin, PluginLoader, PluginState};
use anyhow::Result;
use clap::{Args, Subcommand};

use super::{STATUS_PLUGIN_KEY, STATUS_PLUGINS};
use crate::config::{AdaptConfig, ConfigLoader};

/// Plugin inspection arguments
#[derive(Args)]
pub struct PluginsArgs {
    #[command(subcommand)]
    pub command: PluginsCommands,
}

/// Plugin subcommands
#[derive(Subcommand)]
pub enum PluginsCommands {
    /// List built-in and installed plugins
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show plugin details
    Info {
        /// Plugin key, as shown by `adapt plugins list`
        key: String,
    },
}

/// Run plugins command
pub fn run(args: PluginsArgs) -> Result<()> {
    let config = ConfigLoader::load()?;
    let plugins = loader(&config).discover();

    match args.command {
        PluginsCommands::List { json } => list_plugins(&config, &plugins, json),
        PluginsCommands::Info { key } => show_plugin_info(&plugins, &key),
    }
}

fn loader(config: &AdaptConfig) -> PluginLoader {
    PluginLoader::new(&config.plugins.dir).with_built_in(STATUS_PLUGIN_KEY, STATUS_PLUGINS)
}

fn list_plugins(config: &AdaptConfig, plugins: &[DiscoveredPlugin], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(plugins)?);
        return Ok(());
    }

    if plugins.is_empty() {
        println!("No plugins found");
        println!();
        println!("Plugin directory: {}", config.plugins.dir.display());
        return Ok(());
    }

    for p in plugins {
        let status = match &p.state {
            PluginState::Loaded => "✓",
            PluginState::Failed { .. } => "✗",
        };

        let description = if p.descriptor.description.is_empty() {
            "No description"
        } else {
            &p.descriptor.description
        };

        println!(
            "{} {} v{}    {}",
            status, p.descriptor.key, p.descriptor.version, description
        );
    }

    Ok(())
}

fn show_plugin_info(plugins: &[DiscoveredPlugin], key: &str) -> Result<()> {
    let Some(p) = plugins.iter().find(|p| p.descriptor.key == key) else {
        println!("Plugin '{}' not found", key);
        println!();
        println!("Run 'adapt plugins list' to see all plugins.");
        return Ok(());
    };

    let d = &p.descriptor;
    println!("Key:         {}", d.key);
    println!("Name:        {}", d.name);
    println!("Version:     {}", d.version);
    println!(
        "Description: {}",
        if d.description.is_empty() {
            "No description"
        } else {
            &d.description
        }
    );
    println!("Source:      {}", p.source);

    match &p.state {
        PluginState::Loaded => println!("Status:      Loadable"),
        PluginState::Failed { error } => println!("Status:      Failed ({})", error),
    }

    Ok(())
}
