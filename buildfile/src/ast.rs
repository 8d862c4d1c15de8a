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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignMode {
    Append,
    Override,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub name: String,
    pub value: Vec<String>,
    pub mode: AssignMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDecl {
    pub name: String,
    pub base: Option<String>,
    pub is_abstract: bool,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildDecl {
    pub outputs: Vec<String>,
    pub rule: String,
    pub inputs: Vec<String>,
    pub implicit: Vec<String>,
    pub bindings: Vec<Assignment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Assign(Assignment),
    Rule {
        name: String,
        bindings: Vec<Assignment>,
    },
    Build(BuildDecl),
    DefaultRule {
        extension: String,
        rule: String,
    },
    File {
        patterns: Vec<String>,
        rule: Option<String>,
    },
    Target(TargetDecl),
    Board {
        name: String,
        body: Vec<Statement>,
    },
    Targets(Vec<String>),
    Scope(Vec<Statement>),
    Include(Vec<String>),
    If {
        flag: String,
        negated: bool,
        body: Vec<Statement>,
    },
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Buildfile {
    pub statements: Vec<Statement>,
}
