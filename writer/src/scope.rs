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

use crate::{
    value::{LazyValue, ObjectList, Value},
    WriterError,
};

/// Handle to a node in a `ScopeTree`. Only meaningful for the tree that handed it out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Variable name to tokens, in the order variables were first assigned.
pub type Variables = IndexMap<String, Vec<Value>>;

#[derive(Debug, Default)]
pub struct ScopeData {
    pub(crate) children: Vec<NodeId>,
    ext_rules: IndexMap<String, String>,
    objects: ObjectList,
}

#[derive(Debug)]
pub struct RuleData {
    pub(crate) name: String,
}

#[derive(Debug)]
pub struct BuildEdge {
    pub(crate) outputs: Vec<Value>,
    pub(crate) rule: String,
    pub(crate) inputs: Vec<Value>,
    pub(crate) implicit: Option<Vec<Value>>,
}

impl BuildEdge {
    pub fn new<S: Into<String>>(outputs: Vec<Value>, rule: S, inputs: Vec<Value>) -> BuildEdge {
        BuildEdge {
            outputs,
            rule: rule.into(),
            inputs,
            implicit: None,
        }
    }

    pub fn with_implicit(mut self, implicit: Vec<Value>) -> BuildEdge {
        self.implicit = Some(implicit);
        self
    }

    pub fn rule(&self) -> &str {
        &self.rule
    }
}

#[derive(Debug)]
pub enum NodeKind {
    Scope(ScopeData),
    Rule(RuleData),
    Build(BuildEdge),
}

#[derive(Debug)]
pub(crate) struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) vars: Variables,
    pub(crate) kind: NodeKind,
}

/// Owns every scope, rule and build edge of a configuration.
///
/// Nodes refer to their parent by `NodeId`, which is only ever used to look things up. A node is
/// part of the emitted output once it shows up in some scope's child list; scopes can be created
/// detached and attached later (this is how targets and boards are only pulled in once they are
/// selected).
#[derive(Debug)]
pub struct ScopeTree {
    nodes: Vec<Node>,
}

impl Default for ScopeTree {
    fn default() -> Self {
        ScopeTree::new()
    }
}

impl ScopeTree {
    pub fn new() -> ScopeTree {
        ScopeTree {
            nodes: vec![Node {
                parent: None,
                vars: Variables::new(),
                kind: NodeKind::Scope(ScopeData::default()),
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    fn push(&mut self, parent: Option<NodeId>, kind: NodeKind) -> NodeId {
        self.nodes.push(Node {
            parent,
            vars: Variables::new(),
            kind,
        });
        NodeId(self.nodes.len() - 1)
    }

    pub(crate) fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    fn scope(&self, id: NodeId) -> &ScopeData {
        match &self.node(id).kind {
            NodeKind::Scope(data) => data,
            other => panic!("{:?} is not a scope: {:?}", id, other),
        }
    }

    fn scope_mut(&mut self, id: NodeId) -> &mut ScopeData {
        match &mut self.nodes[id.0].kind {
            NodeKind::Scope(data) => data,
            other => panic!("{:?} is not a scope: {:?}", id, other),
        }
    }

    /// Creates a scope whose lookups fall back to `parent`, without making it a child.
    pub fn detached_scope(&mut self, parent: NodeId) -> NodeId {
        self.push(Some(parent), NodeKind::Scope(ScopeData::default()))
    }

    /// Creates a scope nested at the current end of `parent`'s children.
    pub fn nested_scope(&mut self, parent: NodeId) -> NodeId {
        let id = self.detached_scope(parent);
        self.add_child(parent, id);
        id
    }

    pub fn add_child(&mut self, parent: NodeId, child: NodeId) {
        self.scope_mut(parent).children.push(child);
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.scope(id).children
    }

    pub fn rule<S: Into<String>>(&mut self, parent: NodeId, name: S) -> NodeId {
        let id = self.push(
            Some(parent),
            NodeKind::Rule(RuleData { name: name.into() }),
        );
        self.add_child(parent, id);
        id
    }

    pub fn build(&mut self, parent: NodeId, edge: BuildEdge) -> NodeId {
        let id = self.push(Some(parent), NodeKind::Build(edge));
        self.add_child(parent, id);
        id
    }

    /// Appends `values` to `name`, or replaces the existing tokens if `replace` is set.
    pub fn set_variable<N, V>(&mut self, id: NodeId, name: N, values: V, replace: bool)
    where
        N: Into<String>,
        V: IntoIterator,
        V::Item: Into<Value>,
    {
        let values = values.into_iter().map(Into::into);
        let tokens = self.nodes[id.0].vars.entry(name.into()).or_default();
        if replace {
            tokens.clear();
        }
        tokens.extend(values);
    }

    pub fn var<N, V>(&mut self, id: NodeId, name: N, values: V)
    where
        N: Into<String>,
        V: IntoIterator,
        V::Item: Into<Value>,
    {
        self.set_variable(id, name, values, false)
    }

    /// Only looks at `id` itself.
    pub fn variable(&self, id: NodeId, name: &str) -> Option<&[Value]> {
        self.node(id).vars.get(name).map(Vec::as_slice)
    }

    pub fn variables(&self, id: NodeId) -> &Variables {
        &self.node(id).vars
    }

    pub fn declares_in_ancestor(&self, id: NodeId, name: &str) -> bool {
        let mut current = self.parent(id);
        while let Some(ancestor) = current {
            if self.node(ancestor).vars.contains_key(name) {
                return true;
            }
            current = self.parent(ancestor);
        }
        false
    }

    pub fn register_default_rule<E, R>(&mut self, id: NodeId, extension: E, rule: R)
    where
        E: Into<String>,
        R: Into<String>,
    {
        self.scope_mut(id)
            .ext_rules
            .insert(extension.into(), rule.into());
    }

    pub fn resolve_rule_for_extension(&self, id: NodeId, extension: &str) -> Result<&str, WriterError> {
        let mut current = Some(id);
        while let Some(scope) = current {
            if let NodeKind::Scope(data) = &self.node(scope).kind {
                if let Some(rule) = data.ext_rules.get(extension) {
                    return Ok(rule.as_str());
                }
            }
            current = self.parent(scope);
        }
        Err(WriterError::RuleNotFound(extension.to_owned()))
    }

    pub fn object_list(&self, id: NodeId) -> &ObjectList {
        &self.scope(id).objects
    }

    /// A lazy handle to the objects of `id`, including ones added after this call.
    pub fn objects(&self, id: NodeId) -> LazyValue {
        self.object_list(id).lazy()
    }

    pub fn push_object<S: Into<String>>(&self, id: NodeId, path: S) {
        self.object_list(id).push(path);
    }

    pub fn extend_objects(&self, id: NodeId, from: NodeId) {
        self.object_list(id).extend(self.object_list(from));
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn literals(values: Option<&[Value]>) -> Option<Vec<String>> {
        values.map(crate::value::resolve_all)
    }

    #[test]
    fn append_then_override() {
        let mut tree = ScopeTree::new();
        let root = tree.root();
        tree.var(root, "cflags", vec!["-Wall"]);
        tree.var(root, "cflags", vec!["-Os", "-g"]);
        assert_eq!(
            literals(tree.variable(root, "cflags")),
            Some(vec!["-Wall".into(), "-Os".into(), "-g".into()])
        );
        tree.set_variable(root, "cflags", vec!["-O0"], true);
        assert_eq!(
            literals(tree.variable(root, "cflags")),
            Some(vec!["-O0".to_owned()])
        );
    }

    #[test]
    fn variable_ignores_ancestors() {
        let mut tree = ScopeTree::new();
        let root = tree.root();
        tree.var(root, "cflags", vec!["-Wall"]);
        let child = tree.nested_scope(root);
        let grandchild = tree.nested_scope(child);
        assert!(tree.variable(child, "cflags").is_none());
        assert!(tree.variable(grandchild, "cflags").is_none());
        assert!(tree.declares_in_ancestor(grandchild, "cflags"));
        assert!(!tree.declares_in_ancestor(root, "cflags"));
        assert!(!tree.declares_in_ancestor(grandchild, "ldflags"));
    }

    #[test]
    fn rules_and_builds_are_children() {
        let mut tree = ScopeTree::new();
        let root = tree.root();
        let rule = tree.rule(root, "cc");
        let nested = tree.nested_scope(root);
        let build = tree.build(nested, BuildEdge::new(vec!["a.o".into()], "cc", vec!["a.c".into()]));
        assert_eq!(tree.children(root), &[rule, nested]);
        assert_eq!(tree.children(nested), &[build]);
        assert_eq!(tree.parent(build), Some(nested));
    }

    #[test]
    fn detached_scopes_are_not_children() {
        let mut tree = ScopeTree::new();
        let root = tree.root();
        let detached = tree.detached_scope(root);
        assert!(tree.children(root).is_empty());
        tree.add_child(root, detached);
        assert_eq!(tree.children(root), &[detached]);
    }

    #[test]
    fn extension_rule_from_ancestor() {
        let mut tree = ScopeTree::new();
        let root = tree.root();
        tree.register_default_rule(root, ".c", "cc");
        let child = tree.nested_scope(root);
        let grandchild = tree.nested_scope(child);
        tree.register_default_rule(child, ".cc", "cxx");
        assert_eq!(tree.resolve_rule_for_extension(grandchild, ".c").unwrap(), "cc");
        assert_eq!(tree.resolve_rule_for_extension(grandchild, ".cc").unwrap(), "cxx");
        assert!(matches!(
            tree.resolve_rule_for_extension(root, ".cc"),
            Err(WriterError::RuleNotFound(ext)) if ext == ".cc"
        ));
    }

    #[test]
    fn local_extension_rule_shadows_parent() {
        let mut tree = ScopeTree::new();
        let root = tree.root();
        tree.register_default_rule(root, ".c", "cc");
        let child = tree.nested_scope(root);
        tree.register_default_rule(child, ".c", "cc_thumb");
        assert_eq!(tree.resolve_rule_for_extension(child, ".c").unwrap(), "cc_thumb");
        assert_eq!(tree.resolve_rule_for_extension(root, ".c").unwrap(), "cc");
    }

    #[test]
    fn objects_merge() {
        let mut tree = ScopeTree::new();
        let root = tree.root();
        let target = tree.detached_scope(root);
        let lazy = tree.objects(root);
        tree.push_object(target, ".build/a.c.o");
        tree.extend_objects(root, target);
        assert_eq!(lazy.eval(), vec![".build/a.c.o".to_owned()]);
    }
}
