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

//! Builds ninja files out of a tree of scopes.
//!
//! A `ScopeTree` holds variables, rules and build edges. Nested scopes are folded into their
//! parent when written out, while rules and build edges keep a variable block of their own. A
//! variable set again below a scope that already set it is written as `name = $name ...`, so
//! ninja sees the concatenation instead of an overwrite.

use thiserror::Error;

mod emit;
pub mod format;
mod scope;
mod value;


pub use emit::{order_variables, references};
pub use scope::{BuildEdge, NodeId, NodeKind, RuleData, ScopeData, ScopeTree, Variables};
pub use value::{escape_path, LazyValue, ObjectList, Value};

#[derive(Error, Debug)]
pub enum WriterError {
    #[error("variable '{0}' is part of a reference cycle")]
    ReferenceCycle(String),
    #[error("could not infer rule for '{0}'")]
    RuleNotFound(String),
}
