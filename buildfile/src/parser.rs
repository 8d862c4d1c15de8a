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

use std::fmt::{Display, Formatter};

use thiserror::Error;

use super::{
    ast::*,
    lexer::{Lexer, Line, Position, Word},
};

#[derive(Debug, Error)]
pub struct ParseError {
    position: Position,
    line: String,
    message: String,
}

impl ParseError {
    fn new<S: Into<String>>(msg: S, line: &Line, column: usize, lexer: &Lexer) -> ParseError {
        ParseError {
            position: lexer.position(line.number, column),
            line: line.text.to_owned(),
            message: msg.into(),
        }
    }

    fn at_word<S: Into<String>>(msg: S, line: &Line, word: &Word, lexer: &Lexer) -> ParseError {
        ParseError::new(msg, line, word.column, lexer)
    }

    fn at_end<S: Into<String>>(msg: S, line: &Line, lexer: &Lexer) -> ParseError {
        ParseError::new(msg, line, line.end_column(), lexer)
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{position}: {msg}\n{line}\n{indent}^ near here",
            position = self.position,
            msg = self.message,
            line = self.line,
            indent = " ".repeat(self.position.column.saturating_sub(1)),
        )
    }
}

/// What a block may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    TopLevel,
    Scope,
    Board,
    Bindings,
}

impl Context {
    fn is_config(self) -> bool {
        self != Context::Bindings
    }
}

const KEYWORDS: &[&str] = &[
    "abstract",
    "board",
    "build",
    "default_rule",
    "file",
    "if",
    "include",
    "rule",
    "scope",
    "target",
    "targets",
];

fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Splits words at the first unescaped `:`, which may stand alone or be attached to either
/// neighbour (`out.o: cc`, `alpha :base`).
fn split_colon(words: &[Word]) -> (Vec<String>, Option<Vec<String>>) {
    let mut before = Vec::new();
    let mut after: Option<Vec<String>> = None;
    for word in words {
        let text = word.text;
        if let Some(after) = after.as_mut() {
            after.push(text.to_owned());
        } else if text == ":" {
            after = Some(Vec::new());
        } else if text.ends_with(':') && !text.ends_with("$:") {
            before.push(text[..text.len() - 1].to_owned());
            after = Some(Vec::new());
        } else if text.starts_with(':') {
            after = Some(vec![text[1..].to_owned()]);
        } else {
            before.push(text.to_owned());
        }
    }
    (before, after)
}

pub struct Parser<'a> {
    lexer: Lexer<'a>,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str, source_name: Option<String>) -> Parser<'a> {
        Parser {
            lexer: Lexer::new(input, source_name),
        }
    }

    pub fn parse(mut self) -> Result<Buildfile, ParseError> {
        let statements = self.parse_block(Context::TopLevel, None)?;
        Ok(Buildfile { statements })
    }

    fn parse_block(
        &mut self,
        context: Context,
        opened_by: Option<&Line<'a>>,
    ) -> Result<Vec<Statement>, ParseError> {
        let mut statements = Vec::new();
        loop {
            let line = match self.lexer.next() {
                Some(line) => line,
                None => {
                    return match opened_by {
                        Some(open) => Err(ParseError::at_end(
                            "block is never closed, expected '}'",
                            open,
                            &self.lexer,
                        )),
                        None => Ok(statements),
                    };
                }
            };

            if line.is_block_end() {
                if opened_by.is_some() {
                    return Ok(statements);
                }
                return Err(ParseError::at_word(
                    "unexpected '}'",
                    &line,
                    &line.words[0],
                    &self.lexer,
                ));
            }

            statements.push(self.parse_statement(&line, context)?);
        }
    }

    /// Parses the body of a block if `line` opens one.
    fn optional_block(
        &mut self,
        line: &Line<'a>,
        context: Context,
    ) -> Result<Vec<Statement>, ParseError> {
        if line.opens_block() {
            self.parse_block(context, Some(line))
        } else {
            Ok(Vec::new())
        }
    }

    fn required_block(
        &mut self,
        line: &Line<'a>,
        context: Context,
    ) -> Result<Vec<Statement>, ParseError> {
        if !line.opens_block() {
            return Err(ParseError::at_end("expected '{'", line, &self.lexer));
        }
        self.parse_block(context, Some(line))
    }

    fn bindings(&mut self, line: &Line<'a>) -> Result<Vec<Assignment>, ParseError> {
        Ok(self
            .optional_block(line, Context::Bindings)?
            .into_iter()
            .map(|statement| match statement {
                Statement::Assign(assignment) => assignment,
                // The Bindings context only ever produces assignments.
                _ => unreachable!(),
            })
            .collect())
    }

    fn parse_statement(&mut self, line: &Line<'a>, context: Context) -> Result<Statement, ParseError> {
        let first = line.first();
        let assigns = line
            .words
            .get(1)
            .map(|w| w.text == "=" || w.text == ":=")
            .unwrap_or(false);

        if KEYWORDS.contains(&first) && !assigns {
            if !context.is_config() {
                return Err(ParseError::at_word(
                    format!("'{}' is not allowed here, expected a variable assignment", first),
                    line,
                    &line.words[0],
                    &self.lexer,
                ));
            }
            return self.parse_keyword(line, context);
        }

        self.parse_assignment(line)
    }

    fn parse_assignment(&self, line: &Line<'a>) -> Result<Statement, ParseError> {
        let text = line.text.trim_start();
        let indent = line.text.len() - text.len();
        let eq = match text.find('=') {
            Some(eq) => eq,
            None => {
                return Err(ParseError::at_word(
                    format!("expected a statement or assignment, got '{}'", line.first()),
                    line,
                    &line.words[0],
                    &self.lexer,
                ))
            }
        };

        let lhs = text[..eq].trim_end();
        let (name, mode) = match lhs.strip_suffix(':') {
            Some(name) => (name.trim_end(), AssignMode::Override),
            None => (lhs, AssignMode::Append),
        };
        if !is_identifier(name) {
            return Err(ParseError::new(
                format!("'{}' is not a valid variable name", name),
                line,
                line.text[..indent].chars().count() + 1,
                &self.lexer,
            ));
        }

        Ok(Statement::Assign(Assignment {
            name: name.to_owned(),
            value: text[eq + 1..].split_whitespace().map(str::to_owned).collect(),
            mode,
        }))
    }

    fn parse_keyword(&mut self, line: &Line<'a>, context: Context) -> Result<Statement, ParseError> {
        let mut words: &[Word] = &line.words[1..];
        if line.opens_block() {
            words = &words[..words.len() - 1];
        }
        let first = &line.words[0];

        match first.text {
            "rule" => {
                let name = self.single_name(line, words, "rule name")?;
                let bindings = self.bindings(line)?;
                Ok(Statement::Rule { name, bindings })
            }
            "build" => self.parse_build(line, words),
            "default_rule" => match words {
                [extension, rule] => Ok(Statement::DefaultRule {
                    extension: extension.text.to_owned(),
                    rule: rule.text.to_owned(),
                }),
                _ => Err(ParseError::at_word(
                    "expected 'default_rule <extension> <rule>'",
                    line,
                    first,
                    &self.lexer,
                )),
            },
            "file" => {
                let (patterns, rule) = split_colon(words);
                if patterns.is_empty() {
                    return Err(ParseError::at_end("expected a file pattern", line, &self.lexer));
                }
                let rule = match rule {
                    None => None,
                    Some(names) if names.len() == 1 => names.into_iter().next(),
                    Some(_) => {
                        return Err(ParseError::at_end(
                            "expected exactly one rule name after ':'",
                            line,
                            &self.lexer,
                        ))
                    }
                };
                Ok(Statement::File { patterns, rule })
            }
            "abstract" => match words.first() {
                Some(w) if w.text == "target" => self.parse_target(line, &words[1..], context, true),
                _ => Err(ParseError::at_end("expected 'target' after 'abstract'", line, &self.lexer)),
            },
            "target" => self.parse_target(line, words, context, false),
            "board" => {
                self.top_level_only(line, context)?;
                let name = self.single_name(line, words, "board name")?;
                let body = self.optional_block(line, Context::Board)?;
                Ok(Statement::Board { name, body })
            }
            "targets" => {
                if context != Context::Board {
                    return Err(ParseError::at_word(
                        "'targets' is only allowed inside a board",
                        line,
                        first,
                        &self.lexer,
                    ));
                }
                if words.is_empty() {
                    return Err(ParseError::at_end("expected target names", line, &self.lexer));
                }
                Ok(Statement::Targets(
                    words.iter().map(|w| w.text.to_owned()).collect(),
                ))
            }
            "scope" => {
                if !words.is_empty() {
                    return Err(ParseError::at_word("expected '{'", line, &words[0], &self.lexer));
                }
                let inner = if context == Context::Board {
                    Context::Board
                } else {
                    Context::Scope
                };
                Ok(Statement::Scope(self.required_block(line, inner)?))
            }
            "include" => {
                if words.is_empty() {
                    return Err(ParseError::at_end("expected a path to include", line, &self.lexer));
                }
                Ok(Statement::Include(
                    words.iter().map(|w| w.text.to_owned()).collect(),
                ))
            }
            "if" => {
                let flag = self.single_name(line, words, "condition")?;
                let (flag, negated) = match flag.strip_prefix('!') {
                    Some(flag) => (flag.to_owned(), true),
                    None => (flag, false),
                };
                let body = self.required_block(line, context)?;
                Ok(Statement::If {
                    flag,
                    negated,
                    body,
                })
            }
            _ => unreachable!("every keyword is handled"),
        }
    }

    fn top_level_only(&self, line: &Line<'a>, context: Context) -> Result<(), ParseError> {
        if context != Context::TopLevel {
            return Err(ParseError::at_word(
                format!("'{}' definitions must be at the top level", line.first()),
                line,
                &line.words[0],
                &self.lexer,
            ));
        }
        Ok(())
    }

    fn single_name(&self, line: &Line<'a>, words: &[Word], what: &str) -> Result<String, ParseError> {
        match words {
            [name] => Ok(name.text.to_owned()),
            [] => Err(ParseError::at_end(format!("expected {}", what), line, &self.lexer)),
            [_, extra, ..] => Err(ParseError::at_word(
                format!("unexpected '{}' after {}", extra.text, what),
                line,
                extra,
                &self.lexer,
            )),
        }
    }

    fn parse_target(
        &mut self,
        line: &Line<'a>,
        words: &[Word],
        context: Context,
        is_abstract: bool,
    ) -> Result<Statement, ParseError> {
        self.top_level_only(line, context)?;
        let (names, base) = split_colon(words);
        let name = match names.as_slice() {
            [name] => name.clone(),
            _ => return Err(ParseError::at_end("expected exactly one target name", line, &self.lexer)),
        };
        let base = match base {
            None => None,
            Some(base) if base.len() == 1 => base.into_iter().next(),
            Some(_) => {
                return Err(ParseError::at_end(
                    "expected exactly one base target after ':'",
                    line,
                    &self.lexer,
                ))
            }
        };
        let body = self.optional_block(line, Context::Scope)?;
        Ok(Statement::Target(TargetDecl {
            name,
            base,
            is_abstract,
            body,
        }))
    }

    fn parse_build(&mut self, line: &Line<'a>, words: &[Word]) -> Result<Statement, ParseError> {
        let (outputs, rest) = split_colon(words);
        if outputs.is_empty() {
            return Err(ParseError::at_end(
                "expected at least one output for build",
                line,
                &self.lexer,
            ));
        }
        let mut rest = match rest {
            Some(rest) if !rest.is_empty() => rest.into_iter(),
            Some(_) => return Err(ParseError::at_end("expected rule name", line, &self.lexer)),
            None => return Err(ParseError::at_end("expected ':' after outputs", line, &self.lexer)),
        };
        // Checked non-empty above.
        let rule = rest.next().unwrap_or_default();

        let mut inputs = Vec::new();
        let mut implicit = Vec::new();
        let mut seen_pipe = false;
        for word in rest {
            if word == "|" && !seen_pipe {
                seen_pipe = true;
            } else if seen_pipe {
                implicit.push(word);
            } else {
                inputs.push(word);
            }
        }

        let bindings = self.bindings(line)?;
        Ok(Statement::Build(BuildDecl {
            outputs,
            rule,
            inputs,
            implicit,
            bindings,
        }))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use insta::assert_snapshot;

    fn parse(input: &str) -> Result<Buildfile, ParseError> {
        Parser::new(input, None).parse()
    }

    fn assign(name: &str, value: &[&str], mode: AssignMode) -> Assignment {
        Assignment {
            name: name.to_owned(),
            value: value.iter().map(|v| v.to_string()).collect(),
            mode,
        }
    }

    #[test]
    fn assignments() {
        let file = parse("cflags = -Wall -Os\ncflags := -O0\nldflags=-nostdlib\ndefine = -DX=1\n").unwrap();
        assert_eq!(
            file.statements,
            vec![
                Statement::Assign(assign("cflags", &["-Wall", "-Os"], AssignMode::Append)),
                Statement::Assign(assign("cflags", &["-O0"], AssignMode::Override)),
                Statement::Assign(assign("ldflags", &["-nostdlib"], AssignMode::Append)),
                Statement::Assign(assign("define", &["-DX=1"], AssignMode::Append)),
            ]
        );
    }

    #[test]
    fn keyword_names_can_be_variables() {
        let file = parse("file = a.c\n").unwrap();
        assert_eq!(
            file.statements,
            vec![Statement::Assign(assign("file", &["a.c"], AssignMode::Append))]
        );
    }

    #[test]
    fn rule_block() {
        let file = parse(
            r#"
rule cc {
    depfile = $out.d
    command = clang -MMD -MF $out.d $cflags -c $in -o $out
}
default_rule .c cc
"#,
        )
        .unwrap();
        assert_eq!(
            file.statements,
            vec![
                Statement::Rule {
                    name: "cc".to_owned(),
                    bindings: vec![
                        assign("depfile", &["$out.d"], AssignMode::Append),
                        assign(
                            "command",
                            &["clang", "-MMD", "-MF", "$out.d", "$cflags", "-c", "$in", "-o", "$out"],
                            AssignMode::Append
                        ),
                    ],
                },
                Statement::DefaultRule {
                    extension: ".c".to_owned(),
                    rule: "cc".to_owned()
                },
            ]
        );
    }

    #[test]
    fn build_lines() {
        let none: &[&str] = &[];
        let cases: Vec<(&str, &[&str], &str, &[&str], &[&str])> = vec![
            ("build a.o: cc a.c", &["a.o"][..], "cc", &["a.c"][..], none),
            ("build a.o : cc a.c b.c", &["a.o"][..], "cc", &["a.c", "b.c"][..], none),
            (
                "build fw.elf fw.map: ld @objects | link.ld",
                &["fw.elf", "fw.map"][..],
                "ld",
                &["@objects"][..],
                &["link.ld"][..],
            ),
            (
                "build build.ninja: configure | Build",
                &["build.ninja"][..],
                "configure",
                none,
                &["Build"][..],
            ),
        ];
        for (input, outputs, rule, inputs, implicit) in cases {
            let file = parse(input).unwrap();
            match &file.statements[0] {
                Statement::Build(build) => {
                    assert_eq!(build.outputs, outputs);
                    assert_eq!(build.rule, rule);
                    assert_eq!(build.inputs, inputs);
                    assert_eq!(build.implicit, implicit);
                    assert!(build.bindings.is_empty());
                }
                other => panic!("Unexpected statement {:?}", other),
            }
        }
    }

    #[test]
    fn build_with_bindings() {
        let file = parse("build a.o: cc a.c {\n  cflags = -O0\n}\n").unwrap();
        match &file.statements[0] {
            Statement::Build(build) => {
                assert_eq!(build.bindings, vec![assign("cflags", &["-O0"], AssignMode::Append)])
            }
            other => panic!("Unexpected statement {:?}", other),
        }
    }

    #[test]
    fn targets_and_boards() {
        let file = parse(
            r#"
abstract target cortex_m0 {
    cflags = -mcpu=cortex-m0
}
target lpc1114: cortex_m0 {
    file src/*.c
    file startup.s : as
    scope {
        define = -DINNER
    }
    if !debug {
        cflags = -Os
    }
}
board demo {
    targets lpc1114 lpc1115
    file board.c
}
"#,
        )
        .unwrap();
        assert_eq!(file.statements.len(), 3);
        match &file.statements[0] {
            Statement::Target(t) => {
                assert_eq!(t.name, "cortex_m0");
                assert!(t.is_abstract);
                assert_eq!(t.base, None);
            }
            other => panic!("Unexpected statement {:?}", other),
        }
        match &file.statements[1] {
            Statement::Target(t) => {
                assert_eq!(t.name, "lpc1114");
                assert!(!t.is_abstract);
                assert_eq!(t.base.as_deref(), Some("cortex_m0"));
                assert_eq!(
                    t.body[1],
                    Statement::File {
                        patterns: vec!["startup.s".to_owned()],
                        rule: Some("as".to_owned())
                    }
                );
                assert!(matches!(&t.body[2], Statement::Scope(body) if body.len() == 1));
                assert!(matches!(&t.body[3], Statement::If { flag, negated: true, .. } if flag == "debug"));
            }
            other => panic!("Unexpected statement {:?}", other),
        }
        match &file.statements[2] {
            Statement::Board { name, body } => {
                assert_eq!(name, "demo");
                assert_eq!(
                    body[0],
                    Statement::Targets(vec!["lpc1114".to_owned(), "lpc1115".to_owned()])
                );
            }
            other => panic!("Unexpected statement {:?}", other),
        }
    }

    #[test]
    fn errors() {
        for (input, line, column) in &[
            ("}", 1, 1),
            ("rule cc {\n  command = gcc\n", 1, 10),
            ("rule cc {\n  build a: b\n}", 2, 3),
            ("target a {\n  target b {\n  }\n}", 2, 3),
            ("targets a b", 1, 1),
            ("build a.o cc a.c", 1, 17),
            ("build : cc", 1, 11),
            ("scope", 1, 6),
            ("what is this", 1, 1),
            ("bad name = 1", 1, 1),
        ] {
            let err = parse(input).expect_err(input);
            assert_eq!(err.position.line, *line, "{:?}: {}", input, err);
            assert_eq!(err.position.column, *column, "{:?}: {}", input, err);
        }
    }

    #[test]
    fn error_display() {
        let err = Parser::new("board demo {\n  targets\n}\n", Some("Boards/demo/Build".into()))
            .parse()
            .unwrap_err();
        assert_snapshot!(err.to_string(), @r###"
Boards/demo/Build:2:10: expected target names
  targets
         ^ near here
"###);
    }
}
