use crate::error::PathSyntaxError;

use super::{Segment, Selector};

/// Compile a path expression into segments.
///
/// Accepts `$`-rooted expressions and bare ones (`a.b` is read as `$.a.b`).
pub(super) fn parse(expression: &str) -> Result<Vec<Segment>, PathSyntaxError> {
    let chars: Vec<char> = expression.trim().chars().collect();
    let err = |offset: usize, message: &str| PathSyntaxError {
        expression: expression.to_string(),
        offset,
        message: message.to_string(),
    };

    if chars.is_empty() {
        return Err(err(0, "path expression is empty"));
    }

    let mut segments = Vec::new();
    let mut pos = 0usize;

    if chars[0] == '$' {
        pos = 1;
    } else if chars[0] != '[' && chars[0] != '.' {
        // Bare leading name.
        let (name, next) = read_name(&chars, pos);
        if name.is_empty() {
            return Err(err(pos, "expected '$' or a field name"));
        }
        segments.push(Segment {
            selector: Selector::Name(name),
            descendant: false,
        });
        pos = next;
    }

    while pos < chars.len() {
        match chars[pos] {
            '.' => {
                let descendant = chars.get(pos + 1) == Some(&'.');
                pos += if descendant { 2 } else { 1 };
                match chars.get(pos) {
                    None => return Err(err(pos, "path ends after '.'")),
                    Some('*') => {
                        segments.push(Segment {
                            selector: Selector::Wildcard,
                            descendant,
                        });
                        pos += 1;
                    }
                    Some('[') if descendant => {
                        let (selector, next) = read_bracket(&chars, pos).map_err(|(o, m)| err(o, m))?;
                        segments.push(Segment {
                            selector,
                            descendant,
                        });
                        pos = next;
                    }
                    Some(_) => {
                        let (name, next) = read_name(&chars, pos);
                        if name.is_empty() {
                            return Err(err(pos, "expected a field name"));
                        }
                        segments.push(Segment {
                            selector: Selector::Name(name),
                            descendant,
                        });
                        pos = next;
                    }
                }
            }
            '[' => {
                let (selector, next) = read_bracket(&chars, pos).map_err(|(o, m)| err(o, m))?;
                segments.push(Segment {
                    selector,
                    descendant: false,
                });
                pos = next;
            }
            _ => return Err(err(pos, "expected '.' or '['")),
        }
    }

    Ok(segments)
}

fn is_name_char(c: char) -> bool {
    !c.is_whitespace()
        && !matches!(
            c,
            '.' | '[' | ']' | '\'' | '"' | '*' | '(' | ')' | '?' | '@' | ','
        )
}

fn read_name(chars: &[char], mut pos: usize) -> (String, usize) {
    let mut name = String::new();
    while pos < chars.len() && is_name_char(chars[pos]) {
        name.push(chars[pos]);
        pos += 1;
    }
    (name, pos)
}

/// Parse `[...]` starting at the opening bracket. Returns the selector and
/// the offset just past the closing bracket.
fn read_bracket(chars: &[char], start: usize) -> Result<(Selector, usize), (usize, &'static str)> {
    let mut pos = start + 1;
    skip_spaces(chars, &mut pos);

    let selector = match chars.get(pos) {
        None => return Err((pos, "unterminated '['")),
        Some('\'') | Some('"') => {
            let quote = chars[pos];
            pos += 1;
            let mut s = String::new();
            loop {
                match chars.get(pos) {
                    None => return Err((pos, "unterminated quoted name")),
                    Some(&c) if c == quote => {
                        pos += 1;
                        break;
                    }
                    Some('\\') => {
                        match chars.get(pos + 1) {
                            Some(&c) => s.push(c),
                            None => return Err((pos, "unterminated escape in quoted name")),
                        }
                        pos += 2;
                    }
                    Some(&c) => {
                        s.push(c);
                        pos += 1;
                    }
                }
            }
            Selector::Name(s)
        }
        Some('*') => {
            pos += 1;
            Selector::Wildcard
        }
        Some('?') => return Err((pos, "filter expressions are not supported")),
        Some(c) if c.is_ascii_digit() || *c == '-' => {
            let begin = pos;
            pos += 1;
            while pos < chars.len() && chars[pos].is_ascii_digit() {
                pos += 1;
            }
            let text: String = chars[begin..pos].iter().collect();
            let index = text
                .parse::<i64>()
                .map_err(|_| (begin, "invalid array index"))?;
            Selector::Index(index)
        }
        Some(_) => return Err((pos, "expected a quoted name, an index or '*'")),
    };

    skip_spaces(chars, &mut pos);
    match chars.get(pos) {
        Some(']') => Ok((selector, pos + 1)),
        Some(':') => Err((pos, "array slices are not supported")),
        Some(',') => Err((pos, "unions are not supported")),
        None => Err((pos, "unterminated '['")),
        Some(_) => Err((pos, "expected ']'")),
    }
}

fn skip_spaces(chars: &[char], pos: &mut usize) {
    while *pos < chars.len() && chars[*pos] == ' ' {
        *pos += 1;
    }
}
