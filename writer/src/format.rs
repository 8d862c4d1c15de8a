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

pub const WIDTH: usize = 80;
const INDENT: &str = "  ";
const CONTINUATION_INDENT: &str = "    ";

/// A space is only a token boundary if it is not preceded by an odd run of `$`.
fn is_escaped_at(line: &[u8], idx: usize) -> bool {
    let dollars = line[..idx].iter().rev().take_while(|&&b| b == b'$').count();
    dollars % 2 == 1
}

fn is_break(line: &[u8], idx: usize) -> bool {
    line[idx] == b' ' && !is_escaped_at(line, idx)
}

/// Finds a space to break `line` at, preferring the last one at or before `budget`.
fn find_break(line: &str, budget: usize) -> Option<usize> {
    let bytes = line.as_bytes();
    if bytes.len() < 2 {
        return None;
    }
    // Breaking at 0 would leave an empty first line, breaking at the end leaves an empty
    // continuation.
    let last = bytes.len() - 2;
    let start = std::cmp::min(budget, last);
    if let Some(idx) = (1..=start).rev().find(|&idx| is_break(bytes, idx)) {
        return Some(idx);
    }
    (start + 1..=last).find(|&idx| is_break(bytes, idx))
}

/// Formats one logical line at `indent` levels, wrapping it to `WIDTH` columns using `$`
/// continuations. The result always ends with a newline.
pub fn format_line(line: &str, indent: usize) -> String {
    let mut prefix = INDENT.repeat(indent);
    let mut rest = line;
    let mut output = String::new();
    let mut continued = false;

    while prefix.len() + rest.len() > WIDTH {
        // Leave room for the trailing " $".
        let budget = WIDTH.saturating_sub(prefix.len() + 2);
        let idx = match find_break(rest, budget) {
            Some(idx) => idx,
            None => break,
        };
        output.push_str(&prefix);
        output.push_str(&rest[..=idx]);
        output.push_str("$\n");
        rest = &rest[idx + 1..];
        if !continued {
            prefix.push_str(CONTINUATION_INDENT);
            continued = true;
        }
    }

    output.push_str(&prefix);
    output.push_str(rest);
    output.push('\n');
    output
}
