//! A small CSS selector engine for [`MemoryDocument`](crate::MemoryDocument).
//!
//! Supported: type and universal selectors, `#id`, `.class`, `[attr]`, `[attr=value]` with bare or
//! quoted values, compound selectors, the descendant and `>` combinators, and `,` lists. Anything
//! else is rejected the way a browser rejects an invalid selector.

use crate::{WatchError, WatchResult};

/// The view of an element the matcher needs.
pub(crate) trait SelectorElement: Clone {
    /// The lowercase tag name.
    fn local_name(&self) -> &str;

    fn attribute(&self, name: &str) -> Option<&str>;

    fn parent_element(&self) -> Option<Self>;
}

/// A parsed `,` separated selector list. Matches if any of its selectors does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SelectorList {
    selectors: Vec<ComplexSelector>,
}

impl SelectorList {
    pub(crate) fn parse(input: &str) -> WatchResult<Self> {
        Parser::new(input).parse_list()
    }

    pub(crate) fn matches<E: SelectorElement>(&self, element: &E) -> bool {
        self.selectors
            .iter()
            .any(|selector| selector.matches_from(selector.compounds.len() - 1, element))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

/// Compound selectors joined by combinators. `combinators[i]` sits between `compounds[i]` and
/// `compounds[i + 1]`, and there is always at least one compound.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ComplexSelector {
    compounds: Vec<Compound>,
    combinators: Vec<Combinator>,
}

impl ComplexSelector {
    fn matches_from<E: SelectorElement>(&self, index: usize, element: &E) -> bool {
        if !self.compounds[index].matches(element) {
            return false;
        }
        if index == 0 {
            return true;
        }

        match self.combinators[index - 1] {
            Combinator::Child => element
                .parent_element()
                .is_some_and(|parent| self.matches_from(index - 1, &parent)),
            Combinator::Descendant => {
                let mut ancestor = element.parent_element();
                while let Some(current) = ancestor {
                    if self.matches_from(index - 1, &current) {
                        return true;
                    }
                    ancestor = current.parent_element();
                }
                false
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attributes: Vec<AttributeSelector>,
    universal: bool,
}

impl Compound {
    fn is_empty(&self) -> bool {
        !self.universal
            && self.tag.is_none()
            && self.id.is_none()
            && self.classes.is_empty()
            && self.attributes.is_empty()
    }

    fn matches<E: SelectorElement>(&self, element: &E) -> bool {
        if let Some(tag) = &self.tag {
            if element.local_name() != tag {
                return false;
            }
        }

        if let Some(id) = &self.id {
            if element.attribute("id") != Some(id.as_str()) {
                return false;
            }
        }

        if !self.classes.is_empty() {
            let class_attr = element.attribute("class").unwrap_or_default();
            let has_all = self
                .classes
                .iter()
                .all(|class| class_attr.split_ascii_whitespace().any(|c| c == class));
            if !has_all {
                return false;
            }
        }

        self.attributes.iter().all(|attr| attr.matches(element))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttributeSelector {
    name: String,
    value: Option<String>,
}

impl AttributeSelector {
    fn matches<E: SelectorElement>(&self, element: &E) -> bool {
        match (element.attribute(&self.name), &self.value) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(actual), Some(expected)) => actual == expected,
        }
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn error(&self, reason: impl ToString) -> WatchError {
        WatchError::invalid_selector(self.input, reason)
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Skip whitespace, returning whether any was skipped.
    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_whitespace()) {
            self.pos += 1;
        }
        self.pos != start
    }

    fn parse_list(&mut self) -> WatchResult<SelectorList> {
        let mut selectors = Vec::new();
        loop {
            self.skip_whitespace();
            selectors.push(self.parse_complex()?);
            self.skip_whitespace();
            match self.bump() {
                None => break,
                Some(',') => continue,
                Some(c) => return Err(self.error(format!("unexpected `{c}`"))),
            }
        }
        Ok(SelectorList { selectors })
    }

    fn parse_complex(&mut self) -> WatchResult<ComplexSelector> {
        let mut compounds = vec![self.parse_compound()?];
        let mut combinators = Vec::new();

        loop {
            let had_space = self.skip_whitespace();
            let combinator = match self.peek() {
                Some('>') => {
                    self.bump();
                    self.skip_whitespace();
                    Combinator::Child
                }
                Some(',') | None => break,
                Some(_) if had_space => Combinator::Descendant,
                Some(c) => return Err(self.error(format!("unexpected `{c}`"))),
            };
            combinators.push(combinator);
            compounds.push(self.parse_compound()?);
        }

        Ok(ComplexSelector {
            compounds,
            combinators,
        })
    }

    fn parse_compound(&mut self) -> WatchResult<Compound> {
        let mut compound = Compound::default();

        match self.peek() {
            Some('*') => {
                self.bump();
                compound.universal = true;
            }
            Some(c) if is_ident_start(c) => {
                compound.tag = Some(self.parse_ident()?.to_ascii_lowercase());
            }
            _ => {}
        }

        loop {
            match self.peek() {
                Some('#') => {
                    self.bump();
                    let id = self.parse_ident()?;
                    if compound.id.as_ref().is_some_and(|existing| *existing != id) {
                        // `#a#b` is valid but can never match
                        compound.attributes.push(AttributeSelector {
                            name: "id".to_string(),
                            value: Some(id),
                        });
                    } else {
                        compound.id = Some(id);
                    }
                }
                Some('.') => {
                    self.bump();
                    compound.classes.push(self.parse_ident()?);
                }
                Some('[') => {
                    self.bump();
                    compound.attributes.push(self.parse_attribute()?);
                }
                _ => break,
            }
        }

        if compound.is_empty() {
            return Err(match self.peek() {
                Some(c) => self.error(format!("expected a selector, found `{c}`")),
                None => self.error("expected a selector"),
            });
        }

        Ok(compound)
    }

    fn parse_attribute(&mut self) -> WatchResult<AttributeSelector> {
        self.skip_whitespace();
        let name = self.parse_ident()?.to_ascii_lowercase();
        self.skip_whitespace();

        let value = match self.bump() {
            Some(']') => return Ok(AttributeSelector { name, value: None }),
            Some('=') => {
                self.skip_whitespace();
                let value = match self.peek() {
                    Some(quote @ ('"' | '\'')) => {
                        self.bump();
                        self.parse_string(quote)?
                    }
                    _ => self.parse_ident()?,
                };
                self.skip_whitespace();
                value
            }
            Some(c) => return Err(self.error(format!("unsupported attribute operator `{c}`"))),
            None => return Err(self.error("unterminated attribute selector")),
        };

        match self.bump() {
            Some(']') => Ok(AttributeSelector {
                name,
                value: Some(value),
            }),
            _ => Err(self.error("unterminated attribute selector")),
        }
    }

    fn parse_string(&mut self, quote: char) -> WatchResult<String> {
        let mut value = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => return Ok(value),
                Some('\\') => match self.bump() {
                    Some(escaped) => value.push(escaped),
                    None => return Err(self.error("unterminated string")),
                },
                Some(c) => value.push(c),
                None => return Err(self.error("unterminated string")),
            }
        }
    }

    fn parse_ident(&mut self) -> WatchResult<String> {
        let start = self.pos;

        // a leading hyphen must be followed by a name start, never a digit
        if self.peek() == Some('-') {
            self.bump();
        }
        match self.peek() {
            Some(c) if is_ident_start(c) || c == '-' => {}
            Some(c) => return Err(self.error(format!("expected an identifier, found `{c}`"))),
            None => return Err(self.error("expected an identifier")),
        }

        while self.peek().is_some_and(is_ident_char) {
            self.bump();
        }

        Ok(self.input[start..self.pos].to_string())
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || !c.is_ascii()
}

fn is_ident_char(c: char) -> bool {
    is_ident_start(c) || c.is_ascii_digit() || c == '-'
}
