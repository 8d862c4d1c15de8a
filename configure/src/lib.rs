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

//! Turns a tree of `Build` files describing rules, targets and boards into a `build.ninja` for
//! one board and target.

use anyhow::{self, Context};
use tracing::info;

pub mod config;
mod error;
mod eval;
pub mod loader;
pub mod registry;

pub use config::{Action, Configure, Options};
pub use error::ConfigError;
pub use loader::{DiscoveryError, DiskLoader, Loader};

pub fn list_boards(configure: &Configure) -> String {
    let mut out = String::from("Available boards:\n");
    for board in configure.boards() {
        out.push_str(&format!("  - {}\n", board.name));
    }
    out
}

/// Abstract targets can only be inherited from, so they are left out.
pub fn list_targets(configure: &Configure) -> String {
    let mut out = String::from("Available targets:\n");
    for target in configure.targets().filter(|t| !t.is_abstract) {
        out.push_str(&format!("  - {}\n", target.name));
    }
    out
}

pub fn run(options: Options) -> anyhow::Result<()> {
    let action = options.action;
    if action == Action::ExtraEnvPaths {
        println!("{}", options.extra_env_paths());
        return Ok(());
    }

    let basedir = options.basedir.clone();
    let mut loader = DiskLoader::new(&basedir);
    let mut configure = Configure::new(options);
    configure
        .parse(&mut loader)
        .with_context(|| format!("reading the configuration in {}", basedir.display()))?;

    match action {
        Action::ListBoards => print!("{}", list_boards(&configure)),
        Action::ListTargets => print!("{}", list_targets(&configure)),
        Action::Write | Action::ExtraEnvPaths => {
            let path = configure.write_build()?;
            info!(
                path = %path.display(),
                sources = configure.sources().len(),
                "configured"
            );
        }
    }
    Ok(())
}
