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

use std::collections::HashMap;

use petgraph::{algo::toposort, graph::NodeIndex, visit::DfsPostOrder, Graph};

use crate::{
    format::format_line,
    scope::{BuildEdge, NodeId, NodeKind, ScopeTree, Variables},
    value::resolve_all,
    WriterError,
};

/// Names of variables referenced by `token`, as `$name` or `${name}`. `$$` and the other escapes
/// do not reference anything.
pub fn references(token: &str) -> Vec<&str> {
    let bytes = token.as_bytes();
    let mut refs = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'$' {
            i += 1;
            continue;
        }
        let start = i + 1;
        match bytes.get(start).copied() {
            Some(b'{') => {
                let end = bytes[start..]
                    .iter()
                    .position(|&b| b == b'}')
                    .map(|p| start + p);
                match end {
                    Some(end) => {
                        refs.push(&token[start + 1..end]);
                        i = end + 1;
                    }
                    None => break,
                }
            }
            Some(b) if is_simple_var_char(b) => {
                let len = bytes[start..]
                    .iter()
                    .take_while(|&&b| is_simple_var_char(b))
                    .count();
                refs.push(&token[start..start + len]);
                i = start + len;
            }
            // `$$`, `$ `, `$:` or a dangling `$`.
            _ => i = start + 1,
        }
    }
    refs
}

fn is_simple_var_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

type VarGraph<'a> = Graph<&'a str, ()>;

/// Orders `vars` so that every variable comes after the same-scope variables it references,
/// otherwise keeping declaration order. Returns indices into `vars`.
pub fn order_variables(vars: &[(String, Vec<String>)]) -> Result<Vec<usize>, WriterError> {
    let mut graph = VarGraph::new();
    let mut nodes: HashMap<&str, NodeIndex> = HashMap::with_capacity(vars.len());
    for (name, _) in vars {
        nodes.insert(name.as_str(), graph.add_node(name.as_str()));
    }

    for (name, tokens) in vars {
        let source = nodes[name.as_str()];
        for token in tokens {
            for reference in references(token) {
                // Referring to yourself means the inherited value, which is not an ordering
                // constraint inside this scope.
                if reference == name.as_str() {
                    continue;
                }
                if let Some(&target) = nodes.get(reference) {
                    graph.update_edge(source, target, ());
                }
            }
        }
    }

    if let Err(cycle) = toposort(&graph, None) {
        return Err(WriterError::ReferenceCycle(graph[cycle.node_id()].to_owned()));
    }

    let indices: HashMap<NodeIndex, usize> = vars
        .iter()
        .enumerate()
        .map(|(i, (name, _))| (nodes[name.as_str()], i))
        .collect();

    // Post-order visits referenced variables before their referencers. The visitor keeps its
    // finished set across move_to, so every variable is produced once.
    let mut order = Vec::with_capacity(vars.len());
    let mut visitor = DfsPostOrder::empty(&graph);
    for (name, _) in vars {
        visitor.move_to(nodes[name.as_str()]);
        while let Some(node) = visitor.next(&graph) {
            order.push(indices[&node]);
        }
    }
    Ok(order)
}

/// Answers whether a variable block builds on an inherited value.
///
/// Nested scopes are folded into the emission root, so for statements below it the flattened
/// variables count as declared above them, even when they came from a sibling scope.
struct Inherited<'a> {
    tree: &'a ScopeTree,
    root: NodeId,
    flattened: Option<&'a Variables>,
}

impl<'a> Inherited<'a> {
    fn contains(&self, name: &str) -> bool {
        self.flattened
            .map(|vars| vars.contains_key(name))
            .unwrap_or(false)
            || self.tree.declares_in_ancestor(self.root, name)
    }
}

fn write_variables(
    vars: &Variables,
    inherited: &Inherited,
    indent: usize,
    out: &mut String,
) -> Result<(), WriterError> {
    let resolved: Vec<(String, Vec<String>)> = vars
        .iter()
        .map(|(name, values)| (name.clone(), resolve_all(values)))
        .collect();

    for idx in order_variables(&resolved)? {
        let (name, tokens) = &resolved[idx];
        let mut parts = Vec::with_capacity(tokens.len() + 1);
        let reference = format!("${}", name);
        if inherited.contains(name) {
            parts.push(reference.as_str());
        }
        parts.extend(tokens.iter().map(String::as_str));
        let line = if parts.is_empty() {
            format!("{} =", name)
        } else {
            format!("{} = {}", name, parts.join(" "))
        };
        out.push_str(&format_line(&line, indent));
    }
    Ok(())
}

fn write_rule(
    tree: &ScopeTree,
    id: NodeId,
    name: &str,
    inherited: &Inherited,
    out: &mut String,
) -> Result<(), WriterError> {
    out.push_str(&format_line(&format!("rule {}", name), 0));
    write_variables(tree.variables(id), inherited, 1, out)?;
    out.push('\n');
    Ok(())
}

fn write_build(
    tree: &ScopeTree,
    id: NodeId,
    edge: &BuildEdge,
    inherited: &Inherited,
    out: &mut String,
) -> Result<(), WriterError> {
    // Lazy inputs are resolved here, after the whole tree is known.
    let mut line = format!(
        "build {}: {}",
        resolve_all(&edge.outputs).join(" "),
        edge.rule
    );
    let inputs = resolve_all(&edge.inputs);
    if !inputs.is_empty() {
        line.push(' ');
        line.push_str(&inputs.join(" "));
    }
    if let Some(implicit) = &edge.implicit {
        let implicit = resolve_all(implicit);
        if !implicit.is_empty() {
            line.push_str(" | ");
            line.push_str(&implicit.join(" "));
        }
    }
    out.push_str(&format_line(&line, 0));
    write_variables(tree.variables(id), inherited, 1, out)?;
    out.push('\n');
    Ok(())
}

/// Variables and statements of a scope after nested scopes have been folded in.
struct Flattened {
    vars: Variables,
    statements: Vec<NodeId>,
}

impl Flattened {
    fn merge(&mut self, vars: &Variables) {
        for (name, values) in vars {
            self.vars
                .entry(name.clone())
                .or_default()
                .extend(values.iter().cloned());
        }
    }
}

fn flatten(tree: &ScopeTree, scope: NodeId, into: &mut Flattened) {
    for &child in tree.children(scope) {
        match tree.kind(child) {
            NodeKind::Scope(_) => {
                into.merge(tree.variables(child));
                flatten(tree, child, into);
            }
            NodeKind::Rule(_) | NodeKind::Build(_) => into.statements.push(child),
        }
    }
}

impl ScopeTree {
    /// Serializes the subtree rooted at the scope `id`. Does not modify the tree, so calling this
    /// repeatedly gives the same output as long as nothing else changes.
    pub fn to_ninja(&self, id: NodeId) -> Result<String, WriterError> {
        let mut flat = Flattened {
            vars: self.variables(id).clone(),
            statements: Vec::new(),
        };
        flatten(self, id, &mut flat);

        let mut out = String::new();
        let above = Inherited {
            tree: self,
            root: id,
            flattened: None,
        };
        write_variables(&flat.vars, &above, 0, &mut out)?;
        out.push('\n');

        let below = Inherited {
            flattened: Some(&flat.vars),
            ..above
        };
        for &statement in &flat.statements {
            match self.kind(statement) {
                NodeKind::Rule(rule) => write_rule(self, statement, &rule.name, &below, &mut out)?,
                NodeKind::Build(edge) => write_build(self, statement, edge, &below, &mut out)?,
                NodeKind::Scope(_) => unreachable!("scopes are flattened"),
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod test {
    use insta::assert_snapshot;

    use super::*;
    use crate::value::ObjectList;

    fn vars(list: &[(&str, &[&str])]) -> Vec<(String, Vec<String>)> {
        list.iter()
            .map(|(n, t)| (n.to_string(), t.iter().map(|s| s.to_string()).collect()))
            .collect()
    }

    fn names(list: &[(String, Vec<String>)], order: &[usize]) -> Vec<String> {
        order.iter().map(|&i| list[i].0.clone()).collect()
    }

    #[test]
    fn references_found() {
        assert_eq!(references("$cflags"), vec!["cflags"]);
        assert_eq!(references("-I${root}/inc"), vec!["root"]);
        assert_eq!(references("$out.d"), vec!["out"]);
        assert_eq!(references("$$notavar"), Vec::<&str>::new());
        assert_eq!(references("a$ b$:c"), Vec::<&str>::new());
        assert_eq!(references("$a$b"), vec!["a", "b"]);
        assert_eq!(references("trailing$"), Vec::<&str>::new());
    }

    #[test]
    fn declared_order_kept() {
        let list = vars(&[("a", &["1"]), ("b", &["2"]), ("c", &["3"])]);
        let order = order_variables(&list).unwrap();
        assert_eq!(names(&list, &order), vec!["a", "b", "c"]);
    }

    #[test]
    fn referenced_first() {
        let list = vars(&[
            ("cflags", &["-Wall", "$arch_flags"]),
            ("ldflags", &["-nostdlib"]),
            ("arch_flags", &["-mthumb"]),
        ]);
        let order = order_variables(&list).unwrap();
        assert_eq!(names(&list, &order), vec!["arch_flags", "cflags", "ldflags"]);
    }

    #[test]
    fn transitive_references() {
        let list = vars(&[("a", &["$b"]), ("b", &["$c"]), ("c", &["x"])]);
        let order = order_variables(&list).unwrap();
        assert_eq!(names(&list, &order), vec!["c", "b", "a"]);
    }

    #[test]
    fn self_reference_is_fine() {
        let list = vars(&[("cflags", &["$cflags", "-O2"])]);
        assert_eq!(order_variables(&list).unwrap(), vec![0]);
    }

    #[test]
    fn cycle_is_an_error() {
        let list = vars(&[("a", &["$b"]), ("b", &["$a"])]);
        assert!(matches!(
            order_variables(&list),
            Err(WriterError::ReferenceCycle(_))
        ));
    }

    #[test]
    fn rule_emission() {
        let mut tree = ScopeTree::new();
        let root = tree.root();
        let rule = tree.rule(root, "cc");
        tree.var(rule, "depfile", vec!["$out.d"]);
        tree.var(rule, "command", vec!["clang", "-MMD", "-MF", "$out.d", "$cflags", "-c", "$in", "-o", "$out"]);
        tree.var(rule, "description", vec!["CC", "$in"]);
        let out = tree.to_ninja(root).unwrap();
        assert_snapshot!(out.trim(), @r###"
rule cc
  depfile = $out.d
  command = clang -MMD -MF $out.d $cflags -c $in -o $out
  description = CC $in
"###);
    }

    #[test]
    fn build_emission_with_implicit() {
        let mut tree = ScopeTree::new();
        let root = tree.root();
        tree.build(
            root,
            BuildEdge::new(vec!["build.ninja".into()], "configure", vec![])
                .with_implicit(vec!["Build".into(), "Boards/demo/Build".into()]),
        );
        let out = tree.to_ninja(root).unwrap();
        assert_eq!(out, "\nbuild build.ninja: configure | Build Boards/demo/Build\n\n");
    }

    #[test]
    fn lazy_inputs_resolved_at_emission() {
        let mut tree = ScopeTree::new();
        let root = tree.root();
        let objects = ObjectList::default();
        tree.build(
            root,
            BuildEdge::new(vec!["firmware.elf".into()], "ld", vec![objects.lazy().into()]),
        );
        objects.push("a.o");
        objects.push("b.o");
        let out = tree.to_ninja(root).unwrap();
        assert!(out.contains("build firmware.elf: ld a.o b.o\n"));
    }

    #[test]
    fn nested_scopes_are_flattened() {
        let mut tree = ScopeTree::new();
        let root = tree.root();
        tree.var(root, "cflags", vec!["-Wall"]);
        tree.rule(root, "cc");
        let nested = tree.nested_scope(root);
        tree.var(nested, "cflags", vec!["-Os"]);
        tree.var(nested, "define", vec!["-DBOARD=DEMO"]);
        let inner = tree.nested_scope(nested);
        tree.var(inner, "define", vec!["-DX=1"]);
        tree.build(inner, BuildEdge::new(vec!["a.o".into()], "cc", vec!["a.c".into()]));
        tree.build(root, BuildEdge::new(vec!["b.o".into()], "cc", vec!["b.c".into()]));

        let out = tree.to_ninja(root).unwrap();
        assert_eq!(
            out,
            "cflags = -Wall -Os\n\
             define = -DBOARD=DEMO -DX=1\n\
             \n\
             rule cc\n\
             \n\
             build a.o: cc a.c\n\
             \n\
             build b.o: cc b.c\n\
             \n"
        );
        // The tree itself was not touched.
        assert_eq!(tree.variable(root, "cflags").unwrap().len(), 1);
    }

    #[test]
    fn redeclared_variables_extend_ancestor() {
        let mut tree = ScopeTree::new();
        let root = tree.root();
        tree.var(root, "cflags", vec!["-Wall"]);
        let target = tree.nested_scope(root);
        let edge = tree.build(target, BuildEdge::new(vec!["a.o".into()], "cc", vec!["a.c".into()]));
        tree.var(edge, "cflags", vec!["-O0"]);
        tree.var(edge, "pool", vec!["console"]);
        let out = tree.to_ninja(root).unwrap();
        assert!(out.contains("build a.o: cc a.c\n  cflags = $cflags -O0\n  pool = console\n"));
    }

    #[test]
    fn sibling_scope_variables_are_inherited() {
        let mut tree = ScopeTree::new();
        let root = tree.root();
        let board = tree.nested_scope(root);
        tree.var(board, "cflags", vec!["-DBOARD_FLAG"]);
        let target = tree.nested_scope(root);
        let edge = tree.build(target, BuildEdge::new(vec!["x.o".into()], "cc", vec!["x.c".into()]));
        tree.var(edge, "cflags", vec!["-O0"]);
        let rule = tree.rule(root, "cc");
        tree.var(rule, "cflags", vec!["-g"]);

        let out = tree.to_ninja(root).unwrap();
        assert!(out.starts_with("cflags = -DBOARD_FLAG\n"), "{}", out);
        assert!(out.contains("build x.o: cc x.c\n  cflags = $cflags -O0\n"), "{}", out);
        assert!(out.contains("rule cc\n  cflags = $cflags -g\n"), "{}", out);
    }

    #[test]
    fn scope_above_emission_root_counts() {
        let mut tree = ScopeTree::new();
        let root = tree.root();
        tree.var(root, "cflags", vec!["-Wall"]);
        let nested = tree.nested_scope(root);
        tree.var(nested, "cflags", vec!["-Os"]);
        tree.var(nested, "ldflags", vec!["-nostdlib"]);
        let edge = tree.build(nested, BuildEdge::new(vec!["a.o".into()], "cc", vec!["a.c".into()]));
        tree.var(edge, "ldflags", vec!["-lc"]);
        tree.var(edge, "asflags", vec!["-g"]);

        let out = tree.to_ninja(nested).unwrap();
        assert!(out.starts_with("cflags = $cflags -Os\nldflags = -nostdlib\n"), "{}", out);
        assert!(out.contains("  ldflags = $ldflags -lc\n  asflags = -g\n"), "{}", out);
    }

    #[test]
    fn long_build_lines_wrap() {
        let mut tree = ScopeTree::new();
        let root = tree.root();
        let objects = ObjectList::default();
        tree.build(
            root,
            BuildEdge::new(vec!["firmware.elf".into()], "ld", vec![objects.lazy().into()])
                .with_implicit(vec!["link.ld".into()]),
        );
        let paths: Vec<String> = (0..20).map(|i| format!(".build/src/module{}.c.o", i)).collect();
        for path in &paths {
            objects.push(path.as_str());
        }

        let out = tree.to_ninja(root).unwrap();
        let lines: Vec<&str> = out.lines().filter(|l| !l.is_empty()).collect();
        assert!(lines.len() > 1);
        assert!(lines[0].starts_with("build firmware.elf: ld .build/src/module0.c.o"));
        for (i, line) in lines.iter().enumerate() {
            assert!(line.len() <= crate::format::WIDTH, "{:?}", line);
            if i + 1 < lines.len() {
                assert!(line.ends_with(" $"), "{:?}", line);
            }
            if i > 0 {
                assert!(line.starts_with("    ") && !line.starts_with("     "), "{:?}", line);
            }
        }
        let joined: String = lines
            .iter()
            .map(|l| l.trim_start().trim_end_matches('$'))
            .collect();
        assert_eq!(
            joined,
            format!("build firmware.elf: ld {} | link.ld", paths.join(" "))
        );
    }

    #[test]
    fn emission_is_idempotent() {
        let mut tree = ScopeTree::new();
        let root = tree.root();
        tree.var(root, "cflags", vec!["$arch", "-Wall"]);
        tree.var(root, "arch", vec!["-mthumb"]);
        let nested = tree.nested_scope(root);
        tree.var(nested, "cflags", vec!["-g"]);
        tree.rule(nested, "cc");
        let first = tree.to_ninja(root).unwrap();
        let second = tree.to_ninja(root).unwrap();
        assert_eq!(first, second);
        assert!(first.starts_with("arch = -mthumb\ncflags = $arch -Wall -g\n"));
    }

    #[test]
    fn cycle_aborts_emission() {
        let mut tree = ScopeTree::new();
        let root = tree.root();
        let rule = tree.rule(root, "cc");
        tree.var(rule, "a", vec!["$b"]);
        tree.var(rule, "b", vec!["$a"]);
        assert!(matches!(tree.to_ninja(root), Err(WriterError::ReferenceCycle(_))));
    }
}
