//! CQL: the entity query language (§4.C).
//!
//! Grammar: `Q := name | CONTAINS(name,...) | EXACT(name,...) | !Q | Q & Q
//! | Q | Q | (Q)`. `&`, `|`, and `!` carry no intrinsic precedence —
//! expressions fold left to right unless parenthesized, and `!` binds only
//! to the term or parenthesized group immediately following it. A bare
//! `name` is shorthand for `CONTAINS(name)`.

use std::collections::BTreeSet;

use crate::component::{ComponentId, ComponentRegistry};
use crate::filter::Filter;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CqlError {
    #[error("unknown component `{0}`")]
    UnknownComponent(String),
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("unexpected token `{0}`")]
    UnexpectedToken(String),
    #[error("expected {0}")]
    Expected(&'static str),
    #[error("trailing input after expression")]
    TrailingInput,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Contains,
    Exact,
    Bang,
    And,
    Or,
    Comma,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, CqlError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '!' => {
                tokens.push(Token::Bang);
                i += 1;
            }
            '&' => {
                tokens.push(Token::And);
                i += 1;
            }
            '|' => {
                tokens.push(Token::Or);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            c if c.is_alphanumeric() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.as_str() {
                    "CONTAINS" => Token::Contains,
                    "EXACT" => Token::Exact,
                    _ => Token::Ident(word),
                });
            }
            other => return Err(CqlError::UnexpectedToken(other.to_string())),
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    registry: &'a ComponentRegistry,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn expect(&mut self, expected: &Token, what: &'static str) -> Result<(), CqlError> {
        match self.bump() {
            Some(ref t) if t == expected => Ok(()),
            Some(t) => Err(CqlError::UnexpectedToken(format!("{t:?}"))),
            None => Err(CqlError::Expected(what)),
        }
    }

    /// Left-to-right fold with no precedence between `&` and `|`.
    fn parse_expr(&mut self) -> Result<Filter, CqlError> {
        let mut filter = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(Token::And) => {
                    self.pos += 1;
                    let rhs = self.parse_primary()?;
                    filter = Filter::And(Box::new(filter), Box::new(rhs));
                }
                Some(Token::Or) => {
                    self.pos += 1;
                    let rhs = self.parse_primary()?;
                    filter = Filter::Or(Box::new(filter), Box::new(rhs));
                }
                _ => break,
            }
        }
        Ok(filter)
    }

    fn parse_primary(&mut self) -> Result<Filter, CqlError> {
        match self.bump() {
            Some(Token::Bang) => Ok(Filter::Not(Box::new(self.parse_primary()?))),
            Some(Token::LParen) => {
                let inner = self.parse_expr()?;
                self.expect(&Token::RParen, "`)`")?;
                Ok(inner)
            }
            Some(Token::Contains) => self.parse_call(true),
            Some(Token::Exact) => self.parse_call(false),
            Some(Token::Ident(name)) => Ok(Filter::contains([self.resolve(&name)?])),
            Some(other) => Err(CqlError::UnexpectedToken(format!("{other:?}"))),
            None => Err(CqlError::UnexpectedEof),
        }
    }

    fn parse_call(&mut self, contains: bool) -> Result<Filter, CqlError> {
        self.expect(&Token::LParen, "`(`")?;
        let mut ids: Vec<ComponentId> = Vec::new();
        loop {
            match self.bump() {
                Some(Token::Ident(name)) => ids.push(self.resolve(&name)?),
                Some(other) => return Err(CqlError::UnexpectedToken(format!("{other:?}"))),
                None => return Err(CqlError::UnexpectedEof),
            }
            match self.bump() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => break,
                Some(other) => return Err(CqlError::UnexpectedToken(format!("{other:?}"))),
                None => return Err(CqlError::UnexpectedEof),
            }
        }
        let set: BTreeSet<ComponentId> = ids.into_iter().collect();
        Ok(if contains { Filter::Contains(set) } else { Filter::Exact(set) })
    }

    fn resolve(&self, name: &str) -> Result<ComponentId, CqlError> {
        self.registry
            .id_by_name(name)
            .map_err(|_| CqlError::UnknownComponent(name.to_string()))
    }
}

/// Parse and resolve a CQL expression against a sealed registry.
pub fn parse(input: &str, registry: &ComponentRegistry) -> Result<Filter, CqlError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        registry,
    };
    let filter = parser.parse_expr()?;
    if parser.pos != tokens.len() {
        return Err(CqlError::TrailingInput);
    }
    Ok(filter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Alpha;
    impl Component for Alpha {
        fn type_name() -> &'static str {
            "Alpha"
        }
    }

    #[derive(Serialize, Deserialize)]
    struct Beta;
    impl Component for Beta {
        fn type_name() -> &'static str {
            "Beta"
        }
    }

    fn registry() -> ComponentRegistry {
        let mut reg = ComponentRegistry::new();
        reg.register::<Alpha>().unwrap();
        reg.register::<Beta>().unwrap();
        reg
    }

    #[test]
    fn bare_name_is_contains_shorthand() {
        let reg = registry();
        let filter = parse("Alpha", &reg).unwrap();
        assert!(matches!(filter, Filter::Contains(_)));
    }

    #[test]
    fn contains_and_exact_calls_parse() {
        let reg = registry();
        assert!(matches!(parse("CONTAINS(Alpha, Beta)", &reg).unwrap(), Filter::Contains(_)));
        assert!(matches!(parse("EXACT(Alpha)", &reg).unwrap(), Filter::Exact(_)));
    }

    #[test]
    fn left_to_right_fold_has_no_precedence() {
        let reg = registry();
        // `Alpha | Alpha & Beta` folds as `(Alpha | Alpha) & Beta`, not
        // `Alpha | (Alpha & Beta)`.
        let filter = parse("Alpha | Alpha & Beta", &reg).unwrap();
        match filter {
            Filter::And(lhs, _) => assert!(matches!(*lhs, Filter::Or(_, _))),
            _ => panic!("expected top-level And from left-to-right folding"),
        }
    }

    #[test]
    fn bang_binds_to_immediately_following_term() {
        let reg = registry();
        let filter = parse("!Alpha & Beta", &reg).unwrap();
        match filter {
            Filter::And(lhs, _) => assert!(matches!(*lhs, Filter::Not(_))),
            _ => panic!("expected And at top level"),
        }
    }

    #[test]
    fn parens_override_fold_order() {
        let reg = registry();
        let filter = parse("!(Alpha & Beta)", &reg).unwrap();
        assert!(matches!(filter, Filter::Not(_)));
    }

    #[test]
    fn unknown_component_name_is_an_error() {
        let reg = registry();
        assert!(matches!(parse("Nope", &reg), Err(CqlError::UnknownComponent(_))));
    }

    #[test]
    fn malformed_expression_is_an_error() {
        let reg = registry();
        assert!(parse("Alpha &", &reg).is_err());
        assert!(parse("(Alpha", &reg).is_err());
        assert!(parse("Alpha Beta", &reg).is_err());
    }
}
