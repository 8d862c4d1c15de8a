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

use indexmap::IndexMap;
use ninja_writer::NodeId;

#[derive(Debug, Clone)]
pub struct Target {
    pub name: String,
    pub base: Option<String>,
    pub is_abstract: bool,
    /// Not part of the output until the target is selected.
    pub scope: NodeId,
}

#[derive(Debug, Clone)]
pub struct Board {
    pub name: String,
    pub targets: Vec<String>,
    pub scope: NodeId,
}

impl Board {
    pub fn supports(&self, target: &str) -> bool {
        self.targets.iter().any(|t| t.eq_ignore_ascii_case(target))
    }
}

pub trait Named {
    fn name(&self) -> &str;
}

impl Named for Target {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for Board {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Definitions keyed by case-insensitive name, listed in definition order.
#[derive(Debug)]
pub struct Registry<T> {
    entries: IndexMap<String, T>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Registry {
            entries: IndexMap::new(),
        }
    }
}

impl<T: Named> Registry<T> {
    /// Hands `item` back if the name is taken.
    pub fn insert(&mut self, item: T) -> Result<(), T> {
        let key = item.name().to_lowercase();
        if self.entries.contains_key(&key) {
            return Err(item);
        }
        self.entries.insert(key, item);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.entries.get(&name.to_lowercase())
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut T> {
        self.entries.get_mut(&name.to_lowercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
