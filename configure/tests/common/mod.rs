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
    collections::BTreeMap,
    io,
    path::{Path, PathBuf},
};

use ninja_configure::{loader::to_slash, Configure, DiscoveryError, Loader, Options};

/// Serves files from memory. Patterns support `*` and `?` within a single path component.
pub struct MemoryLoader {
    files: BTreeMap<PathBuf, String>,
}

impl MemoryLoader {
    pub fn new(files: &[(&str, &str)]) -> MemoryLoader {
        MemoryLoader {
            files: files
                .iter()
                .map(|(path, contents)| (PathBuf::from(path), contents.to_string()))
                .collect(),
        }
    }
}

fn wildcard(pattern: &[u8], text: &[u8]) -> bool {
    match (pattern.first().copied(), text.first().copied()) {
        (None, None) => true,
        (Some(b'*'), _) => {
            wildcard(&pattern[1..], text) || (!text.is_empty() && wildcard(pattern, &text[1..]))
        }
        (Some(b'?'), Some(_)) => wildcard(&pattern[1..], &text[1..]),
        (Some(p), Some(t)) if p == t => wildcard(&pattern[1..], &text[1..]),
        _ => false,
    }
}

fn matches(pattern: &str, path: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('/').collect();
    let path: Vec<&str> = path.split('/').collect();
    pattern.len() == path.len()
        && pattern
            .iter()
            .zip(path.iter())
            .all(|(p, s)| wildcard(p.as_bytes(), s.as_bytes()))
}

impl Loader for MemoryLoader {
    fn load(&mut self, path: &Path) -> Result<String, DiscoveryError> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| DiscoveryError::Read {
                path: path.to_owned(),
                source: io::Error::new(io::ErrorKind::NotFound, "not in memory"),
            })
    }

    fn glob(&mut self, dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, DiscoveryError> {
        Ok(self
            .files
            .keys()
            .filter(|path| {
                path.strip_prefix(dir)
                    .map(|rest| matches(pattern, &to_slash(rest)))
                    .unwrap_or(false)
            })
            .cloned()
            .collect())
    }
}

pub fn options(board: Option<&str>, target: Option<&str>) -> Options {
    Options {
        board: board.map(str::to_owned),
        target: target.map(str::to_owned),
        ..Options::default()
    }
}

pub fn configure(files: &[(&str, &str)], options: Options) -> Configure {
    let mut loader = MemoryLoader::new(files);
    let mut configure = Configure::new(options);
    configure.parse(&mut loader).unwrap();
    configure
}

/// Generated output without the banner, which has a timestamp in it.
pub fn generate(files: &[(&str, &str)], options: Options) -> String {
    let output = configure(files, options).generate().unwrap();
    strip_banner(&output)
}

pub fn strip_banner(output: &str) -> String {
    output
        .lines()
        .skip_while(|line| line.starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_owned()
}

pub fn build_lines(output: &str) -> Vec<&str> {
    output.lines().filter(|l| l.starts_with("build ")).collect()
}
