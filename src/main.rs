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

use std::process::ExitCode;

use camrig::{cli, config, logger};
use clap::Parser;

fn main() -> ExitCode {
    let cli_args = cli::Cli::parse();

    // Log level comes from the configuration file
    let path = config::resolve_config_path(cli_args.config.as_deref());
    let logging = config::logging_settings(&path);
    if let Err(e) = logger::init_logging(&logging, cli_args.verbose) {
        eprintln!("Warning: {:#}", e);
    }

    match cli::run_cli(&cli_args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
