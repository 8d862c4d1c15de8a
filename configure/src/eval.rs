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

use std::path::{Path, PathBuf};

use ninja_buildfile::{self as buildfile, AssignMode, Assignment, BuildDecl, Statement, TargetDecl};
use ninja_writer::{escape_path, BuildEdge, NodeId, ScopeTree, Value};
use tracing::{debug, warn};

use crate::{
    config::Configure,
    error::ConfigError,
    loader::{anchor, to_slash, Loader},
    registry::{Board, Target},
};

/// Stands for the object list of the scope it appears in.
const OBJECTS: &str = "@objects";

const DEBUG_FLAG: &str = "debug";

/// Where a statement is being evaluated.
#[derive(Debug, Clone)]
struct Context {
    scope: NodeId,
    /// Directory of the current `Build` file, relative to the base directory.
    dir: PathBuf,
    /// Set while evaluating the body of a board.
    board: Option<String>,
}

fn values(tree: &ScopeTree, scope: NodeId, tokens: &[String]) -> Vec<Value> {
    tokens
        .iter()
        .map(|token| {
            if token == OBJECTS {
                Value::Lazy(tree.objects(scope))
            } else {
                Value::from(token)
            }
        })
        .collect()
}

/// `.c` for `src/main.c`, empty if there is no extension.
fn extension(source: &str) -> String {
    Path::new(source)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}

pub(crate) struct Evaluator<'c, 'l> {
    config: &'c mut Configure,
    loader: &'l mut dyn Loader,
    /// Files being evaluated, outermost first.
    including: Vec<PathBuf>,
}

impl<'c, 'l> Evaluator<'c, 'l> {
    pub(crate) fn new(config: &'c mut Configure, loader: &'l mut dyn Loader) -> Self {
        Evaluator {
            config,
            loader,
            including: Vec::new(),
        }
    }

    pub(crate) fn eval_file(&mut self, path: &Path, scope: NodeId) -> Result<(), ConfigError> {
        let name = to_slash(path);
        if self.including.iter().any(|p| p == path) {
            return Err(ConfigError::IncludeCycle(name));
        }
        debug!(file = %name, "evaluating");

        let input = self.loader.load(path)?;
        let file = buildfile::parse(&input, Some(name.clone()))?;
        if !self.config.sources.contains(&name) {
            self.config.sources.push(name);
        }

        let ctx = Context {
            scope,
            dir: path.parent().map(Path::to_path_buf).unwrap_or_default(),
            board: None,
        };
        self.including.push(path.to_path_buf());
        let result = self.eval_block(&file.statements, &ctx);
        self.including.pop();
        result
    }

    fn eval_block(&mut self, statements: &[Statement], ctx: &Context) -> Result<(), ConfigError> {
        for statement in statements {
            self.eval_statement(statement, ctx)?;
        }
        Ok(())
    }

    fn eval_statement(&mut self, statement: &Statement, ctx: &Context) -> Result<(), ConfigError> {
        match statement {
            Statement::Assign(assignment) => {
                self.assign(ctx.scope, ctx, assignment);
                Ok(())
            }
            Statement::Rule { name, bindings } => {
                let rule = self.config.tree.rule(ctx.scope, name.as_str());
                for binding in bindings {
                    self.assign(rule, ctx, binding);
                }
                Ok(())
            }
            Statement::Build(decl) => {
                self.build(decl, ctx);
                Ok(())
            }
            Statement::DefaultRule { extension, rule } => {
                self.config
                    .tree
                    .register_default_rule(ctx.scope, extension.as_str(), rule.as_str());
                Ok(())
            }
            Statement::File { patterns, rule } => self.files(patterns, rule.as_deref(), ctx),
            Statement::Target(decl) => self.target(decl, ctx),
            Statement::Board { name, body } => self.board(name, body, ctx),
            Statement::Targets(names) => {
                let board = ctx
                    .board
                    .as_deref()
                    .and_then(|board| self.config.boards.get_mut(board));
                match board {
                    Some(board) => board.targets.extend(names.iter().cloned()),
                    None => warn!(targets = ?names, "'targets' outside of a board, ignoring"),
                }
                Ok(())
            }
            Statement::Scope(body) => {
                let nested = self.config.tree.nested_scope(ctx.scope);
                let inner = Context {
                    scope: nested,
                    ..ctx.clone()
                };
                self.eval_block(body, &inner)?;
                self.config.tree.extend_objects(ctx.scope, nested);
                Ok(())
            }
            Statement::Include(patterns) => {
                for pattern in patterns {
                    let (dir, pattern) = anchor(&ctx.dir, pattern)?;
                    let files = self.loader.glob(&dir, &pattern)?;
                    if files.is_empty() {
                        warn!(pattern = %pattern, dir = %to_slash(&dir), "include matched nothing");
                    }
                    for file in files {
                        self.eval_file(&file, ctx.scope)?;
                    }
                }
                Ok(())
            }
            Statement::If {
                flag,
                negated,
                body,
            } => {
                if flag != DEBUG_FLAG {
                    return Err(ConfigError::UnknownCondition(flag.clone()));
                }
                if self.config.options.debug != *negated {
                    self.eval_block(body, ctx)?;
                }
                Ok(())
            }
        }
    }

    /// Sets a variable on `owner`. `@objects` refers to the objects of the enclosing scope, which
    /// for rule and build bindings is not `owner` itself.
    fn assign(&mut self, owner: NodeId, ctx: &Context, assignment: &Assignment) {
        let tree = &mut self.config.tree;
        let value = values(tree, ctx.scope, &assignment.value);
        tree.set_variable(
            owner,
            assignment.name.as_str(),
            value,
            assignment.mode == AssignMode::Override,
        );
    }

    fn build(&mut self, decl: &BuildDecl, ctx: &Context) {
        let tree = &mut self.config.tree;
        let mut edge = BuildEdge::new(
            values(tree, ctx.scope, &decl.outputs),
            decl.rule.as_str(),
            values(tree, ctx.scope, &decl.inputs),
        );
        if !decl.implicit.is_empty() {
            edge = edge.with_implicit(values(tree, ctx.scope, &decl.implicit));
        }
        let id = tree.build(ctx.scope, edge);
        for binding in &decl.bindings {
            self.assign(id, ctx, binding);
        }
    }

    /// Adds one compile edge per matching source and records the object it produces.
    fn files(&mut self, patterns: &[String], rule: Option<&str>, ctx: &Context) -> Result<(), ConfigError> {
        for pattern in patterns {
            let (dir, pattern) = anchor(&ctx.dir, pattern)?;
            let sources = self.loader.glob(&dir, &pattern)?;
            if sources.is_empty() {
                warn!(pattern = %pattern, dir = %to_slash(&dir), "pattern matched no files");
            }

            for source in sources {
                let source = to_slash(&source);
                let tree = &mut self.config.tree;
                let rule = match rule {
                    Some(rule) => rule.to_owned(),
                    None => tree
                        .resolve_rule_for_extension(ctx.scope, &extension(&source))?
                        .to_owned(),
                };
                let object = escape_path(&format!("{}/{}.o", self.config.options.builddir, source));
                debug!(source = %source, rule = %rule, "adding object");
                tree.build(
                    ctx.scope,
                    BuildEdge::new(vec![object.as_str().into()], rule, vec![escape_path(&source).into()]),
                );
                tree.push_object(ctx.scope, object);
            }
        }
        Ok(())
    }

    fn target(&mut self, decl: &TargetDecl, ctx: &Context) -> Result<(), ConfigError> {
        let root = self.config.tree.root();
        let scope = self.config.tree.detached_scope(root);
        let target = Target {
            name: decl.name.clone(),
            base: decl.base.clone(),
            is_abstract: decl.is_abstract,
            scope,
        };
        if self.config.targets.insert(target).is_err() {
            return Err(ConfigError::DuplicateTarget(decl.name.clone()));
        }
        debug!(name = %decl.name, base = ?decl.base, "defined target");

        let inner = Context {
            scope,
            dir: ctx.dir.clone(),
            board: None,
        };
        self.eval_block(&decl.body, &inner)
    }

    fn board(&mut self, name: &str, body: &[Statement], ctx: &Context) -> Result<(), ConfigError> {
        let root = self.config.tree.root();
        let scope = self.config.tree.detached_scope(root);
        let board = Board {
            name: name.to_owned(),
            targets: Vec::new(),
            scope,
        };
        if self.config.boards.insert(board).is_err() {
            return Err(ConfigError::DuplicateBoard(name.to_owned()));
        }
        debug!(board = %name, "defined board");

        let inner = Context {
            scope,
            dir: ctx.dir.clone(),
            board: Some(name.to_owned()),
        };
        self.eval_block(body, &inner)
    }
}
