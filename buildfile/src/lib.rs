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

//! Parser for `Build` files, the line oriented language describing rules, targets, boards and
//! source files.

pub mod ast;
pub mod lexer;
mod parser;

pub use ast::*;
pub use lexer::Position;
pub use parser::{ParseError, Parser};

/// Parses one `Build` file. `filename` is only used in error messages.
pub fn parse(input: &str, filename: Option<String>) -> Result<Buildfile, ParseError> {
    Parser::new(input, filename).parse()
}
