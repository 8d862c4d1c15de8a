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

use std::{cell::RefCell, fmt, rc::Rc};

/// A computation that is only run when the file is written out.
///
/// Object lists are the main user: a link edge is usually declared long before every `file`
/// statement contributing to it has been evaluated, so it holds one of these instead of a copy.
#[derive(Clone)]
pub struct LazyValue(Rc<dyn Fn() -> Vec<String>>);

impl LazyValue {
    pub fn new<F>(f: F) -> LazyValue
    where
        F: Fn() -> Vec<String> + 'static,
    {
        LazyValue(Rc::new(f))
    }

    pub fn eval(&self) -> Vec<String> {
        (self.0)()
    }
}

impl fmt::Debug for LazyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LazyValue(..)")
    }
}

#[derive(Clone, Debug)]
pub enum Value {
    Literal(String),
    Lazy(LazyValue),
}

impl Value {
    /// Resolves into the final tokens. Literals are a single token, lazy values may expand to
    /// any number of them (including none).
    pub fn resolve(&self) -> Vec<String> {
        match self {
            Value::Literal(s) => vec![s.clone()],
            Value::Lazy(lazy) => lazy.eval(),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Literal(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Literal(s)
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::Literal(s.clone())
    }
}

impl From<LazyValue> for Value {
    fn from(lazy: LazyValue) -> Self {
        Value::Lazy(lazy)
    }
}

pub(crate) fn resolve_all(values: &[Value]) -> Vec<String> {
    values.iter().flat_map(Value::resolve).collect()
}

/// Object files accumulated by a scope. Shared so that a `LazyValue` can observe additions made
/// after it was handed out.
#[derive(Clone, Debug, Default)]
pub struct ObjectList(Rc<RefCell<Vec<String>>>);

impl ObjectList {
    pub fn push<S: Into<String>>(&self, path: S) {
        self.0.borrow_mut().push(path.into());
    }

    pub fn extend(&self, other: &ObjectList) {
        // Both handles may point at the same list.
        let copied = other.snapshot();
        self.0.borrow_mut().extend(copied);
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn lazy(&self) -> LazyValue {
        let list = self.0.clone();
        LazyValue::new(move || list.borrow().clone())
    }
}

/// Escapes a path for use as a build input or output. `$`, space and `:` are significant to ninja
/// in path lists.
pub fn escape_path(path: &str) -> String {
    let mut escaped = String::with_capacity(path.len());
    for ch in path.chars() {
        match ch {
            '$' | ' ' | ':' => {
                escaped.push('$');
                escaped.push(ch);
            }
            _ => escaped.push(ch),
        }
    }
    escaped
}
