//! Template parser.
//!
//! Recognizes elements with static attributes, literal text and `{{ }}`
//! interpolations. A `<` that does not open or close a tag is ordinary
//! text. Whitespace-only text spanning a line break is dropped so that
//! indented templates do not produce stray text nodes.

use super::ast::{Attribute, Element, Node, Root};
use super::CompileError;

/// Parse a template into its syntax tree.
pub fn parse(template: &str) -> Result<Root, CompileError> {
    if template.trim().is_empty() {
        return Err(CompileError::EmptyTemplate);
    }

    let mut parser = Parser {
        source: template,
        pos: 0,
    };
    let children = parser.parse_children(&mut Vec::new())?;
    Ok(Root { children })
}

struct Parser<'a> {
    source: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.source[self.pos..]
    }

    fn advance(&mut self, bytes: usize) {
        self.pos += bytes;
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        self.advance(rest.len() - rest.trim_start().len());
    }

    fn parse_children(&mut self, ancestors: &mut Vec<String>) -> Result<Vec<Node>, CompileError> {
        let mut nodes = Vec::new();

        loop {
            let rest = self.rest();
            if rest.is_empty() {
                break;
            }

            if closes_element(rest) {
                if ancestors.iter().rev().any(|tag| starts_with_end_tag(rest, tag)) {
                    break;
                }
                return Err(CompileError::UnexpectedEndTag {
                    tag: leading_name(&rest[2..]).to_string(),
                });
            }

            let node = if rest.starts_with("{{") {
                self.parse_interpolation()?
            } else if opens_element(rest) {
                self.parse_element(ancestors)?
            } else {
                let text = self.parse_text();
                if text.trim().is_empty() && text.contains('\n') {
                    continue;
                }
                Node::Text { content: text }
            };
            nodes.push(node);
        }

        Ok(nodes)
    }

    fn parse_element(&mut self, ancestors: &mut Vec<String>) -> Result<Node, CompileError> {
        self.advance(1);
        let tag = leading_name(self.rest()).to_string();
        self.advance(tag.len());

        let attrs = self.parse_attributes(&tag)?;

        if self.rest().starts_with("/>") {
            self.advance(2);
            return Ok(Node::Element(Element {
                tag,
                attrs,
                children: Vec::new(),
            }));
        }
        if !self.rest().starts_with('>') {
            return Err(CompileError::UnterminatedStartTag { tag });
        }
        self.advance(1);

        ancestors.push(tag.clone());
        let children = self.parse_children(ancestors)?;
        ancestors.pop();

        if !starts_with_end_tag(self.rest(), &tag) {
            return Err(CompileError::MissingEndTag { tag });
        }
        self.advance(2 + tag.len());
        self.skip_whitespace();
        if !self.rest().starts_with('>') {
            return Err(CompileError::MissingEndTag { tag });
        }
        self.advance(1);

        Ok(Node::Element(Element {
            tag,
            attrs,
            children,
        }))
    }

    fn parse_attributes(&mut self, tag: &str) -> Result<Vec<Attribute>, CompileError> {
        let mut attrs = Vec::new();

        loop {
            self.skip_whitespace();
            let rest = self.rest();
            if rest.is_empty() || rest.starts_with('>') || rest.starts_with("/>") {
                return Ok(attrs);
            }

            let name_len = rest
                .find(|c: char| c.is_whitespace() || matches!(c, '=' | '>' | '/'))
                .unwrap_or(rest.len());
            if name_len == 0 {
                // stray '=' or '/'
                return Err(CompileError::UnterminatedStartTag {
                    tag: tag.to_string(),
                });
            }
            let name = rest[..name_len].to_string();
            self.advance(name_len);

            self.skip_whitespace();
            let value = if self.rest().starts_with('=') {
                self.advance(1);
                self.skip_whitespace();
                self.parse_attribute_value(tag)?
            } else {
                String::new()
            };

            attrs.push(Attribute { name, value });
        }
    }

    fn parse_attribute_value(&mut self, tag: &str) -> Result<String, CompileError> {
        let rest = self.rest();
        match rest.chars().next() {
            Some(quote @ ('"' | '\'')) => {
                let body = &rest[1..];
                let end = body.find(quote).ok_or_else(|| CompileError::UnterminatedStartTag {
                    tag: tag.to_string(),
                })?;
                self.advance(end + 2);
                Ok(body[..end].to_string())
            }
            _ => {
                let end = rest
                    .find(|c: char| c.is_whitespace() || c == '>')
                    .unwrap_or(rest.len());
                self.advance(end);
                Ok(rest[..end].to_string())
            }
        }
    }

    fn parse_interpolation(&mut self) -> Result<Node, CompileError> {
        let offset = self.pos;
        let body = &self.rest()[2..];
        let close = body
            .find("}}")
            .ok_or(CompileError::UnterminatedInterpolation { offset })?;

        let expression = body[..close].trim().to_string();
        self.advance(2 + close + 2);
        Ok(Node::Interpolation { expression })
    }

    fn parse_text(&mut self) -> String {
        let rest = self.rest();
        // The first character is always consumed so a stray '<' makes progress.
        let end = rest
            .char_indices()
            .skip(1)
            .map(|(i, _)| i)
            .find(|&i| {
                let tail = &rest[i..];
                tail.starts_with("{{") || opens_element(tail) || closes_element(tail)
            })
            .unwrap_or(rest.len());

        self.advance(end);
        rest[..end].to_string()
    }
}

fn opens_element(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next() == Some('<') && chars.next().is_some_and(|c| c.is_ascii_alphabetic())
}

fn closes_element(s: &str) -> bool {
    s.starts_with("</") && s[2..].starts_with(|c: char| c.is_ascii_alphabetic())
}

fn starts_with_end_tag(s: &str, tag: &str) -> bool {
    closes_element(s) && leading_name(&s[2..]).eq_ignore_ascii_case(tag)
}

/// The tag name at the start of `s`: a letter followed by letters, digits
/// or dashes.
fn leading_name(s: &str) -> &str {
    let end = s
        .char_indices()
        .find(|&(i, c)| {
            if i == 0 {
                !c.is_ascii_alphabetic()
            } else {
                !(c.is_ascii_alphanumeric() || c == '-')
            }
        })
        .map_or(s.len(), |(i, _)| i);
    &s[..end]
}

// ---- Tests ----
