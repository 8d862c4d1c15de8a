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

use std::path::PathBuf;

use ninja_buildfile::ParseError;
use ninja_writer::WriterError;
use thiserror::Error;

use crate::loader::DiscoveryError;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("target '{0}' was already defined")]
    DuplicateTarget(String),
    #[error("board '{0}' was already defined")]
    DuplicateBoard(String),
    #[error("no board given, pass one with --board (or '--board list' to see them all)")]
    MissingBoard,
    #[error("no target given, pass one with --target")]
    MissingTarget,
    #[error("unknown board '{0}'")]
    UnknownBoard(String),
    #[error("unknown target '{0}'")]
    UnknownTarget(String),
    #[error("target '{target}' is based on unknown target '{base}'")]
    UnknownBase { target: String, base: String },
    #[error("please specify a target, board '{board}' supports: {supported}")]
    AmbiguousTarget { board: String, supported: String },
    #[error("board '{board}' does not support target '{target}'")]
    UnsupportedTarget { board: String, target: String },
    #[error("target '{0}' is abstract and can only be used as a base")]
    AbstractTarget(String),
    #[error("target '{target}' inherits from itself through '{via}'")]
    InheritanceCycle { target: String, via: String },
    #[error("'{0}' includes itself")]
    IncludeCycle(String),
    #[error("unknown condition '{0}', only 'debug' is supported")]
    UnknownCondition(String),
    #[error(transparent)]
    Writer(#[from] WriterError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error("failed to write {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
