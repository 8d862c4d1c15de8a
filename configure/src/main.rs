/*
 * Copyright 2020 Nikhil Marathe <nsm.nikhil@gmail.com>
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use std::ffi::OsString;

use ninja_configure::{run, Action, Options};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "\
Usage: configure [options]

Options:
        --basedir BASEDIR   The directory containing the top-level Build file
    -b, --board BOARD       The board to compile for ('list' shows all boards)
    -t, --target TARGET     The target to compile for ('list' shows all targets)
        --disable-debug     Disable debug and enable optimizations
        --extra-env-paths   Print the toolchain directories to add to PATH
    -h, --help              Show this message
";

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ninja_configure=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Returns `None` if only help was requested.
fn parse_args(raw: Vec<OsString>) -> Result<Option<Options>, pico_args::Error> {
    let mut args = pico_args::Arguments::from_vec(raw);
    if args.contains(["-h", "--help"]) {
        return Ok(None);
    }

    let mut options = Options::default();
    if let Some(basedir) = args.opt_value_from_str::<_, String>("--basedir")? {
        options.basedir = basedir.into();
    }
    match args.opt_value_from_str::<_, String>(["-b", "--board"])? {
        Some(board) if board == "list" => options.action = Action::ListBoards,
        board => options.board = board,
    }
    match args.opt_value_from_str::<_, String>(["-t", "--target"])? {
        Some(target) if target == "list" => options.action = Action::ListTargets,
        target => options.target = target,
    }
    options.debug = !args.contains("--disable-debug");
    if args.contains("--extra-env-paths") {
        options.action = Action::ExtraEnvPaths;
    }
    args.finish()?;
    Ok(Some(options))
}

fn main() -> anyhow::Result<()> {
    init_logging();

    let raw: Vec<OsString> = std::env::args_os().skip(1).collect();
    let mut options = match parse_args(raw.clone())? {
        Some(options) => options,
        None => {
            print!("{}", USAGE);
            return Ok(());
        }
    };
    options.configure_args = raw
        .iter()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect();
    if let Ok(exe) = std::env::current_exe() {
        let exe = exe.to_string_lossy().into_owned();
        options.generator = exe.clone();
        options.generator_files.push(exe);
    }

    run(options)
}
