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

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub(crate) filename: Option<String>,
    pub(crate) line: usize,
    pub(crate) column: usize,
}

impl Position {
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn column(&self) -> usize {
        self.column
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match &self.filename {
            Some(name) => write!(f, "{}:{}:{}", name, self.line, self.column),
            None => write!(f, "line {}, column {}", self.line, self.column),
        }
    }
}

/// A whitespace separated word and the (1-based) column it starts at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Word<'a> {
    pub text: &'a str,
    pub column: usize,
}

/// One meaningful line of input. Blank lines and comments never make it out of the lexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line<'a> {
    pub number: usize,
    /// Without the trailing newline.
    pub text: &'a str,
    pub words: Vec<Word<'a>>,
}

impl<'a> Line<'a> {
    pub fn first(&self) -> &'a str {
        self.words[0].text
    }

    /// Column just past the last word, for "expected more" errors.
    pub fn end_column(&self) -> usize {
        self.text.trim_end().chars().count() + 1
    }

    pub fn opens_block(&self) -> bool {
        self.words.last().map(|w| w.text == "{").unwrap_or(false)
    }

    pub fn is_block_end(&self) -> bool {
        self.words.len() == 1 && self.words[0].text == "}"
    }
}

fn split_words(text: &str) -> Vec<Word> {
    let mut words = Vec::new();
    let mut start = None;
    // Columns count characters, offsets count bytes.
    let mut column = 0;
    let mut start_column = 0;
    for (offset, ch) in text.char_indices() {
        column += 1;
        if ch.is_whitespace() {
            if let Some(s) = start.take() {
                words.push(Word {
                    text: &text[s..offset],
                    column: start_column,
                });
            }
        } else if start.is_none() {
            start = Some(offset);
            start_column = column;
        }
    }
    if let Some(s) = start {
        words.push(Word {
            text: &text[s..],
            column: start_column,
        });
    }
    words
}

pub struct Lexer<'a> {
    lines: std::iter::Enumerate<std::str::Lines<'a>>,
    filename: Option<String>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str, filename: Option<String>) -> Lexer<'a> {
        Lexer {
            lines: input.lines().enumerate(),
            filename,
        }
    }

    pub fn position(&self, line: usize, column: usize) -> Position {
        Position {
            filename: self.filename.clone(),
            line,
            column,
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Line<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        for (idx, text) in &mut self.lines {
            let trimmed = text.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            return Some(Line {
                number: idx + 1,
                text,
                words: split_words(text),
            });
        }
        None
    }
}
