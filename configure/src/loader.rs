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
    path::{Component, Path, PathBuf},
};

use globwalk::{FileType, GlobWalkerBuilder};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("failed to read {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid pattern '{pattern}'")]
    Pattern {
        pattern: String,
        #[source]
        source: globwalk::GlobError,
    },
    #[error("failed while searching for '{pattern}'")]
    Walk {
        pattern: String,
        #[source]
        source: globwalk::WalkError,
    },
    #[error("'{0}' points outside of the base directory")]
    OutsideBase(String),
}

/// Where `Build` files and source files come from.
///
/// Every path handed to or returned from a loader is relative to the base directory.
pub trait Loader {
    fn load(&mut self, path: &Path) -> Result<String, DiscoveryError>;

    /// Files below `dir` matching `pattern`, sorted.
    fn glob(&mut self, dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, DiscoveryError>;
}

/// Moves leading `./` and `../` components of `pattern` onto `dir`.
pub fn anchor(dir: &Path, pattern: &str) -> Result<(PathBuf, String), DiscoveryError> {
    let mut dir = dir.to_path_buf();
    let mut rest = pattern;
    loop {
        if let Some(stripped) = rest.strip_prefix("./") {
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix("../") {
            if !dir.pop() {
                return Err(DiscoveryError::OutsideBase(pattern.to_owned()));
            }
            rest = stripped;
        } else {
            break;
        }
    }
    Ok((dir, rest.to_owned()))
}

/// `path` with `/` separators, which is what ninja files use on every platform.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

pub struct DiskLoader {
    basedir: PathBuf,
}

impl DiskLoader {
    pub fn new<P: Into<PathBuf>>(basedir: P) -> DiskLoader {
        DiskLoader {
            basedir: basedir.into(),
        }
    }
}

impl Loader for DiskLoader {
    fn load(&mut self, path: &Path) -> Result<String, DiscoveryError> {
        let full = self.basedir.join(path);
        fs::read_to_string(&full).map_err(|source| DiscoveryError::Read { path: full, source })
    }

    fn glob(&mut self, dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, DiscoveryError> {
        let root = self.basedir.join(dir);
        if !root.is_dir() {
            return Ok(Vec::new());
        }

        let mut builder = GlobWalkerBuilder::new(&root, pattern).file_type(FileType::FILE);
        // `src/*.c` should not look at src/a/b/c/...
        if !pattern.contains("**") {
            let depth = pattern.split('/').filter(|c| !c.is_empty()).count();
            builder = builder.max_depth(depth);
        }
        let walker = builder.build().map_err(|source| DiscoveryError::Pattern {
            pattern: pattern.to_owned(),
            source,
        })?;

        let mut found = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|source| DiscoveryError::Walk {
                pattern: pattern.to_owned(),
                source,
            })?;
            if let Ok(relative) = entry.path().strip_prefix(&root) {
                found.push(dir.join(relative));
            }
        }
        found.sort();
        Ok(found)
    }
}
