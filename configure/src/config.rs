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

use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Local};
use ninja_writer::{escape_path, BuildEdge, ScopeTree, Value};
use tracing::{debug, info};

use crate::{
    error::ConfigError,
    eval::Evaluator,
    loader::Loader,
    registry::{Board, Registry, Target},
};

/// The file every run starts evaluating, relative to the base directory.
pub const BUILD_FILE: &str = "Build";
pub const OUTPUT_FILE: &str = "build.ninja";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Write,
    ListBoards,
    ListTargets,
    ExtraEnvPaths,
}

#[derive(Debug, Clone)]
pub struct Options {
    pub basedir: PathBuf,
    /// Object files go below this directory, relative to the base directory.
    pub builddir: String,
    pub board: Option<String>,
    pub target: Option<String>,
    /// Value of the `debug` condition.
    pub debug: bool,
    pub action: Action,
    /// Command line of this run, passed again to the generator when ninja regenerates the build
    /// file. Rewritten by `regeneration_args` before it ends up in the output.
    pub configure_args: Vec<String>,
    /// Command that regenerates the build file.
    pub generator: String,
    /// Files that should trigger regeneration besides the `Build` files.
    pub generator_files: Vec<String>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            basedir: PathBuf::from("."),
            builddir: ".build".to_owned(),
            board: None,
            target: None,
            debug: true,
            action: Action::Write,
            configure_args: Vec::new(),
            generator: "configure".to_owned(),
            generator_files: Vec::new(),
        }
    }
}

impl Options {
    /// Toolchain directories to put on `PATH`, `:` separated.
    pub fn extra_env_paths(&self) -> String {
        let toolchain = self.basedir.join("Toolchain");
        format!(
            "{}:{}",
            toolchain.join("arm.toolchain").join("bin").display(),
            toolchain.join("arm-gcc.toolchain").join("bin").display()
        )
    }
}

/// Arguments for re-running the generator from inside the base directory, where ninja runs it.
///
/// `--basedir` becomes `.`, `$` is escaped for ninja and arguments the shell would split are
/// single quoted.
pub fn regeneration_args(args: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(args.len());
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--basedir" {
            out.push(arg.clone());
            if iter.next().is_some() {
                out.push(".".to_owned());
            }
        } else if arg.starts_with("--basedir=") {
            out.push("--basedir=.".to_owned());
        } else {
            out.push(shell_word(arg).replace('$', "$$"));
        }
    }
    out
}

fn shell_word(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c));
    if plain {
        arg.to_owned()
    } else {
        format!("'{}'", arg.replace('\'', "'\\''"))
    }
}

const BANNER_WIDTH: usize = 80;

fn banner_line(text: &str) -> String {
    format!("# {:<width$} #\n", text, width = BANNER_WIDTH - 4)
}

pub fn header(generated: &DateTime<Local>) -> String {
    let rule = "#".repeat(BANNER_WIDTH);
    let mut out = String::new();
    out.push_str(&rule);
    out.push('\n');
    out.push_str(&banner_line("ninja-configure"));
    out.push_str(&banner_line(""));
    out.push_str(&banner_line(&format!(
        "generated by configure on {}",
        generated.format("%a %b %e %H:%M:%S %Y")
    )));
    out.push_str(&banner_line("DO NOT EDIT THIS FILE."));
    out.push_str(&rule);
    out.push('\n');
    out
}

/// A whole configuration run: everything the `Build` files define, plus which board and target
/// ended up selected.
pub struct Configure {
    pub(crate) options: Options,
    pub(crate) tree: ScopeTree,
    pub(crate) targets: Registry<Target>,
    pub(crate) boards: Registry<Board>,
    /// Every `Build` file read, in evaluation order.
    pub(crate) sources: Vec<String>,
    selected_target: Option<String>,
    selected: bool,
    regenerates: bool,
}

impl Configure {
    pub fn new(options: Options) -> Configure {
        let mut tree = ScopeTree::new();
        let root = tree.root();
        tree.var(root, "configure_args", regeneration_args(&options.configure_args));
        tree.var(root, "builddir", vec![escape_path(&options.builddir)]);

        let rule = tree.rule(root, "configure");
        tree.var(rule, "command", vec![options.generator.as_str(), "$configure_args"]);
        tree.var(rule, "generator", vec!["1"]);
        tree.var(rule, "description", vec!["Reconfigure", "build"]);

        Configure {
            options,
            tree,
            targets: Registry::default(),
            boards: Registry::default(),
            sources: Vec::new(),
            selected_target: None,
            selected: false,
            regenerates: false,
        }
    }

    /// Evaluates the `Build` file in the base directory and everything it includes.
    pub fn parse(&mut self, loader: &mut dyn Loader) -> Result<(), ConfigError> {
        let root = self.tree.root();
        Evaluator::new(self, loader).eval_file(Path::new(BUILD_FILE), root)
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn tree(&self) -> &ScopeTree {
        &self.tree
    }

    pub fn boards(&self) -> impl Iterator<Item = &Board> {
        self.boards.iter()
    }

    pub fn targets(&self) -> impl Iterator<Item = &Target> {
        self.targets.iter()
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn selected_target(&self) -> Option<&str> {
        self.selected_target.as_deref()
    }

    /// Pulls the requested board into the output and settles which target to build.
    pub fn select_board(&mut self) -> Result<(), ConfigError> {
        let requested = self.options.board.clone().ok_or(ConfigError::MissingBoard)?;
        let board = self
            .boards
            .get(&requested)
            .cloned()
            .ok_or(ConfigError::UnknownBoard(requested))?;

        let target = match &self.options.target {
            Some(target) => {
                if !board.supports(target) {
                    return Err(ConfigError::UnsupportedTarget {
                        board: board.name,
                        target: target.clone(),
                    });
                }
                target.clone()
            }
            None => match board.targets.as_slice() {
                [only] => {
                    debug!(board = %board.name, name = %only, "using the only supported target");
                    only.clone()
                }
                _ => {
                    return Err(ConfigError::AmbiguousTarget {
                        supported: board.targets.join(", "),
                        board: board.name,
                    })
                }
            },
        };

        let root = self.tree.root();
        self.tree.extend_objects(root, board.scope);
        self.tree.add_child(root, board.scope);
        self.tree
            .var(root, "define", vec![format!("-DBOARD={}", board.name.to_uppercase())]);
        debug!(board = %board.name, "selected board");
        self.selected_target = Some(target);
        Ok(())
    }

    /// Pulls the selected target and all of its bases into the output, least derived first.
    pub fn select_target(&mut self) -> Result<(), ConfigError> {
        let requested = self
            .selected_target
            .clone()
            .or_else(|| self.options.target.clone())
            .ok_or(ConfigError::MissingTarget)?;
        let selected = self
            .targets
            .get(&requested)
            .cloned()
            .ok_or(ConfigError::UnknownTarget(requested))?;
        if selected.is_abstract {
            return Err(ConfigError::AbstractTarget(selected.name));
        }

        let root = self.tree.root();
        // Most derived first.
        let mut chain: Vec<Target> = Vec::new();
        let mut current = selected.clone();
        loop {
            if chain
                .iter()
                .any(|t| t.name.eq_ignore_ascii_case(&current.name))
            {
                return Err(ConfigError::InheritanceCycle {
                    target: selected.name,
                    via: current.name,
                });
            }
            self.tree.var(
                root,
                "define",
                vec![format!("-DTARGET_{}=1", current.name.to_uppercase())],
            );

            let next = match &current.base {
                None => None,
                Some(base) => Some(self.targets.get(base).cloned().ok_or_else(|| {
                    ConfigError::UnknownBase {
                        target: current.name.clone(),
                        base: base.clone(),
                    }
                })?),
            };
            chain.push(current);
            match next {
                Some(next) => current = next,
                None => break,
            }
        }

        self.tree.var(
            root,
            "define",
            vec![format!("-DTARGET={}", selected.name.to_uppercase())],
        );
        for target in chain.iter().rev() {
            debug!(name = %target.name, "adding target scope");
            self.tree.extend_objects(root, target.scope);
            self.tree.add_child(root, target.scope);
        }
        Ok(())
    }

    /// Adds the edge that lets ninja regenerate the build file and serializes everything.
    pub fn finish(&mut self) -> Result<String, ConfigError> {
        let root = self.tree.root();
        if !self.regenerates {
            let implicit: Vec<Value> = self
                .sources
                .iter()
                .chain(self.options.generator_files.iter())
                .map(|path| Value::from(escape_path(path)))
                .collect();
            self.tree.build(
                root,
                BuildEdge::new(vec![OUTPUT_FILE.into()], "configure", Vec::new())
                    .with_implicit(implicit),
            );
            self.regenerates = true;
        }

        let body = self.tree.to_ninja(root)?;
        Ok(format!("{}\n{}", header(&Local::now()), body))
    }

    /// Selects the board and target and returns the contents of the build file.
    pub fn generate(&mut self) -> Result<String, ConfigError> {
        if !self.selected {
            self.select_board()?;
            self.select_target()?;
            self.selected = true;
        }
        self.finish()
    }

    /// Like `generate`, but writes the result to `build.ninja` in the base directory. Nothing is
    /// written if generating fails.
    pub fn write_build(&mut self) -> Result<PathBuf, ConfigError> {
        let contents = self.generate()?;
        let path = self.options.basedir.join(OUTPUT_FILE);
        fs::write(&path, contents).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), "wrote build file");
        Ok(path)
    }
}
