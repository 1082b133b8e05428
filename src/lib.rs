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

//! camrig - Camera role binding for multi-camera rigs
//!
//! Front end over `cr-core`: command line parsing, logging setup and the
//! settings that decide where configuration and devices come from.

pub mod cli;
pub mod config;
pub mod logger;
