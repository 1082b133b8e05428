/*
 * This file is part of camrig.
 *
 * Copyright (C) 2025 camrig contributors
 *
 * camrig is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * camrig is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with camrig. If not, see <https://www.gnu.org/licenses/>.
 */

//! Command Line Interface
//!
//! Every command discovers devices first, then drives the configuration
//! lifecycle and match engine.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::debug;

use cr_core::{
    online_devices, render_config, ConfigFormat, ConfigLifecycle, DeviceDescriptor,
    DeviceDiscovery, InvalidOperation, LifecycleOptions, MatchEngine, Role,
};

use crate::config;

#[derive(Parser, Debug)]
#[command(name = "camrig")]
#[command(version)]
#[command(about = "camrig - Camera role binding for multi-camera rigs")]
#[command(long_about = "camrig - Camera role binding for multi-camera rigs

Keeps each logical camera slot (left, right) bound to the same physical
camera across reconnects, using the USB serial of every device.

EXAMPLES:
    camrig init                         Create a configuration from connected cameras
    camrig match                        Show how cameras map to roles right now
    camrig status                       Print the match state as JSON
    camrig swap left right              Fix physically swapped cables
    camrig bind left SN0042             Pin a camera to a role
    camrig --devices cams.json match    Use a device list instead of sysfs

ENVIRONMENT VARIABLES:
    CAMRIG_CONFIG=PATH     Configuration file location
    CAMRIG_LOG=debug       Log filter directive

FILES:
    ~/.config/camrig/rig.json           Rig configuration")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file (JSON, or YAML by extension)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Read online devices from a JSON/YAML list instead of sysfs
    #[arg(long, global = true)]
    pub devices: Option<PathBuf>,

    /// Do not pair leftover cameras with unmatched roles
    #[arg(long, global = true)]
    pub no_auto_bind: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a configuration from the connected cameras
    Init {
        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Print the configuration as JSON
    Show,

    /// Validate the configuration
    Validate {
        /// Also check assignments against the connected cameras
        #[arg(long)]
        runtime: bool,
    },

    /// List connected cameras
    Devices,

    /// Match cameras to roles and print a summary
    Match {
        /// Pair leftover cameras with unmatched roles
        #[arg(long)]
        auto: bool,
        /// Persist the result
        #[arg(long)]
        save: bool,
    },

    /// Print the match state as JSON
    Status,

    /// Bind a camera to a role
    Bind {
        /// Role name (left, right, left_camera, ...)
        role: String,
        /// Device id (USB serial)
        device: String,
    },

    /// Clear a role's camera
    Unbind {
        /// Role name
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        role: Option<String>,
        /// Clear every role
        #[arg(long)]
        all: bool,
    },

    /// Exchange the cameras of two roles
    Swap { role_a: String, role_b: String },

    /// Write the configuration to another file (format by extension)
    Export { path: PathBuf },
}

/// Run the parsed command line
pub fn run_cli(cli: &Cli) -> anyhow::Result<()> {
    let path = config::resolve_config_path(cli.config.as_deref());
    let discovery = config::discovery_for(cli.devices.as_deref())?;
    let options = LifecycleOptions {
        auto_bind: !cli.no_auto_bind,
        ..LifecycleOptions::default()
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    execute_command(&cli.command, &path, discovery.as_ref(), options, &mut out)
}

/// Run one command against a configuration path and device source
pub fn execute_command<W: Write>(
    cmd: &Commands,
    path: &Path,
    discovery: &dyn DeviceDiscovery,
    options: LifecycleOptions,
    out: &mut W,
) -> anyhow::Result<()> {
    debug!(command = ?cmd, path = ?path, "Running command");
    match cmd {
        Commands::Init { force } => cmd_init(path, discovery, options, *force, out),
        Commands::Show => cmd_show(path, options, out),
        Commands::Validate { runtime } => cmd_validate(path, discovery, options, *runtime, out),
        Commands::Devices => cmd_devices(discovery, out),
        Commands::Match { auto, save } => cmd_match(path, discovery, options, *auto, *save, out),
        Commands::Status => cmd_status(path, discovery, options, out),
        Commands::Bind { role, device } => {
            let role = parse_role(role)?;
            cmd_bind(path, discovery, options, role, device, out)
        }
        Commands::Unbind { role, all } => {
            if *all {
                cmd_edit(path, discovery, options, out, |engine| {
                    engine.unbind_all();
                    Ok(())
                })
            } else {
                let name = role.as_deref().unwrap_or_default();
                let role = parse_role(name)?;
                cmd_edit(path, discovery, options, out, |engine| engine.unbind(role))
            }
        }
        Commands::Swap { role_a, role_b } => {
            let a = parse_role(role_a)?;
            let b = parse_role(role_b)?;
            cmd_edit(path, discovery, options, out, |engine| engine.swap(a, b))
        }
        Commands::Export { path: target } => cmd_export(path, options, target, out),
    }
}

fn parse_role(name: &str) -> Result<Role, InvalidOperation> {
    name.parse::<Role>()
        .map_err(|_| InvalidOperation::UnknownRole(name.to_string()))
}

// ============================================================================
// Session Helpers
// ============================================================================

fn load(path: &Path, options: LifecycleOptions) -> anyhow::Result<ConfigLifecycle> {
    let mut lifecycle = ConfigLifecycle::new(options);
    match lifecycle.load(path, &[]) {
        Ok(_) => Ok(lifecycle),
        Err(e) if e.is_not_found() => {
            bail!("no configuration at {} (run `camrig init` first)", path.display())
        }
        Err(e) => Err(e).with_context(|| format!("failed to load {}", path.display())),
    }
}

/// Load, discover and reconcile
fn session(
    path: &Path,
    discovery: &dyn DeviceDiscovery,
    options: LifecycleOptions,
) -> anyhow::Result<ConfigLifecycle> {
    let mut lifecycle = load(path, options)?;
    let online = online_devices(discovery)?;
    lifecycle.reconcile(&online)?;
    Ok(lifecycle)
}

/// Promote the draft with runtime checks and write it back
fn commit(lifecycle: &mut ConfigLifecycle) -> anyhow::Result<PathBuf> {
    lifecycle.promote(true)?;
    Ok(lifecycle.save()?)
}

// ============================================================================
// Commands
// ============================================================================

fn cmd_init<W: Write>(
    path: &Path,
    discovery: &dyn DeviceDiscovery,
    options: LifecycleOptions,
    force: bool,
    out: &mut W,
) -> anyhow::Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }

    let online = online_devices(discovery)?;
    let mut lifecycle = ConfigLifecycle::new(options);
    lifecycle.create_default(&online)?;
    lifecycle.set_path(path);
    lifecycle.reconcile(&online)?;
    let saved = commit(&mut lifecycle)?;

    writeln!(out, "Created configuration at {}", saved.display())?;
    write!(out, "{}", lifecycle.match_engine()?.summary())?;
    Ok(())
}

fn cmd_show<W: Write>(path: &Path, options: LifecycleOptions, out: &mut W) -> anyhow::Result<()> {
    let lifecycle = load(path, options)?;
    let draft = lifecycle.draft().context("no configuration loaded")?;
    writeln!(out, "{}", render_config(draft, ConfigFormat::Json)?)?;
    Ok(())
}

fn cmd_validate<W: Write>(
    path: &Path,
    discovery: &dyn DeviceDiscovery,
    options: LifecycleOptions,
    runtime: bool,
    out: &mut W,
) -> anyhow::Result<()> {
    let mut lifecycle = if runtime {
        session(path, discovery, options)?
    } else {
        load(path, options)?
    };

    match lifecycle.promote(runtime) {
        Ok(()) => {
            writeln!(out, "Configuration is valid: {}", path.display())?;
            Ok(())
        }
        Err(e) => {
            if let Some(errors) = e.validation_errors() {
                writeln!(out, "Configuration is invalid: {}", path.display())?;
                for error in errors {
                    writeln!(out, "  - {}", error)?;
                }
            }
            Err(e.into())
        }
    }
}

fn cmd_devices<W: Write>(discovery: &dyn DeviceDiscovery, out: &mut W) -> anyhow::Result<()> {
    let devices: Vec<DeviceDescriptor> = online_devices(discovery)?;
    if devices.is_empty() {
        writeln!(out, "No cameras found")?;
        return Ok(());
    }

    writeln!(out, "Connected cameras ({}):", devices.len())?;
    for dev in &devices {
        match &dev.product_name {
            Some(name) => writeln!(out, "  {:<24} {}", dev.id, name)?,
            None => writeln!(out, "  {}", dev.id)?,
        }
    }
    Ok(())
}

fn cmd_match<W: Write>(
    path: &Path,
    discovery: &dyn DeviceDiscovery,
    options: LifecycleOptions,
    auto: bool,
    save: bool,
    out: &mut W,
) -> anyhow::Result<()> {
    let mut lifecycle = session(path, discovery, options)?;
    let mut engine = lifecycle.match_engine()?;

    if auto {
        let assigned = engine.auto_assign();
        debug!(assigned, "Auto-assigned leftover cameras");
        lifecycle.replace_bindings(engine.export_bindings())?;
    }
    write!(out, "{}", engine.summary())?;

    if save {
        let saved = commit(&mut lifecycle)?;
        writeln!(out, "Saved to {}", saved.display())?;
    }
    Ok(())
}

fn cmd_status<W: Write>(
    path: &Path,
    discovery: &dyn DeviceDiscovery,
    options: LifecycleOptions,
    out: &mut W,
) -> anyhow::Result<()> {
    let lifecycle = session(path, discovery, options)?;
    let engine = lifecycle.match_engine()?;
    writeln!(out, "{}", serde_json::to_string_pretty(&engine.snapshot())?)?;
    Ok(())
}

/// Reconcile, apply a manual operation, then persist
fn cmd_edit<W, F>(
    path: &Path,
    discovery: &dyn DeviceDiscovery,
    options: LifecycleOptions,
    out: &mut W,
    op: F,
) -> anyhow::Result<()>
where
    W: Write,
    F: FnOnce(&mut MatchEngine) -> Result<(), InvalidOperation>,
{
    let mut lifecycle = session(path, discovery, options)?;
    let mut engine = lifecycle.match_engine()?;

    op(&mut engine)?;

    lifecycle.replace_bindings(engine.export_bindings())?;
    finish_edit(&mut lifecycle, &engine, out)
}

/// Bind a device and drop it as the last active device of every other role
fn cmd_bind<W: Write>(
    path: &Path,
    discovery: &dyn DeviceDiscovery,
    options: LifecycleOptions,
    role: Role,
    device: &str,
    out: &mut W,
) -> anyhow::Result<()> {
    let mut lifecycle = session(path, discovery, options)?;
    let mut engine = lifecycle.match_engine()?;

    engine.bind(role, device)?;

    lifecycle.replace_bindings(engine.export_bindings())?;
    lifecycle.release_last_active(device, role)?;
    finish_edit(&mut lifecycle, &engine, out)
}

fn finish_edit<W: Write>(
    lifecycle: &mut ConfigLifecycle,
    engine: &MatchEngine,
    out: &mut W,
) -> anyhow::Result<()> {
    write!(out, "{}", engine.summary())?;
    if engine.validate_result(None).can_start {
        commit(lifecycle)?;
    } else {
        // Nothing bound: history is still worth keeping
        lifecycle.promote(false)?;
        lifecycle.save()?;
    }
    Ok(())
}

fn cmd_export<W: Write>(
    path: &Path,
    options: LifecycleOptions,
    target: &Path,
    out: &mut W,
) -> anyhow::Result<()> {
    let mut lifecycle = load(path, options)?;
    lifecycle.promote(false)?;
    lifecycle.save_as(target)?;
    writeln!(out, "Exported {} to {}", path.display(), target.display())?;
    Ok(())
}
