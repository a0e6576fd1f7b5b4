/*
Copyright 2023 Jakub Lewandowski

This file is part of AtmoRep Mosaic Post-processing (AMP).

AtmoRep Mosaic Post-processing (AMP) is a free software: you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation; either version 3 of the License, or
(at your option) any later version.

AtmoRep Mosaic Post-processing (AMP) is distributed in the hope that it will be useful,
but WITHOUT ANY WARRANTY; without even the implied warranty of
MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
GNU General Public License for more details.

You should have received a copy of the GNU General Public License
along with AtmoRep Mosaic Post-processing (AMP). If not, see https://www.gnu.org/licenses/.
*/

//! AtmoRep Mosaic Post-processing (AMP) is a tool for reading
//! the output archives of the AtmoRep weather forecasting model
//! and reassembling the patches stored in them into global fields.
//!
//! AtmoRep writes its predictions as a set of local patches,
//! each with its own coordinates. This program stitches them
//! together on a regular global grid, checks that no gridpoint
//! is left empty and saves the result as a Zarr store that can
//! be opened with xarray.

mod constants;
mod errors;
mod postproc;

use cap::Cap;
use env_logger::Env;
use log::{error, info};
use std::alloc;

#[cfg(not(feature = "double_precision"))]
type Float = f32;

#[cfg(feature = "double_precision")]
type Float = f64;

/// Global allocator used by the program.
///
/// The global mosaic and all patches must fit in memory at the same time.
/// Capping the allocator to the limit set by user in configuration file
/// gives an OOM error message instead of the process being killed.
#[global_allocator]
static ALLOCATOR: Cap<alloc::System> = Cap::new(alloc::System, usize::MAX);

/// The main program function.
/// Prepares the runtime environment and calls the [`postproc::main`].
///
/// The `env_logger` needs to be initiated before any log messages
/// are possible to occur.
fn main() {
    #[cfg(not(feature = "debug"))]
    let logger_env = Env::new().filter_or("ATMOREP_MOSAIC_LOG_LEVEL", "info");

    #[cfg(feature = "debug")]
    let logger_env = Env::new().filter_or("ATMOREP_MOSAIC_LOG_LEVEL", "debug");

    env_logger::Builder::from_env(logger_env)
        .format_timestamp_millis()
        .init();

    match postproc::main() {
        Ok(_) => info!("Post-processing finished. Check the output directory and log."),
        Err(err) => error!("Post-processing failed with error: {}", err),
    }
}
