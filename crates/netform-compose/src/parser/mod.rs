//! `.nf` template parser built on `nom`.
//!
//! Transforms raw template text into a validated [`Template`] through
//! lexing, parsing, and static analysis phases.

pub mod ast;
pub mod lexer;
pub mod validator;

use netform_common::error::{NetformError, Result};

use self::ast::{Block, Template, Value};
use self::lexer::Token;

/// Deepest nesting of maps and lists the parser accepts.
const MAX_NESTING: usize = 32;

/// Cursor into a token stream for recursive-descent parsing.
struct TokenCursor<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
}

impl<'a> TokenCursor<'a> {
    const fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&Token> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expect_key(&mut self) -> Result<String> {
        match self.advance() {
            Some(Token::Identifier(s) | Token::StringLiteral(s)) => Ok(s.clone()),
            other => Err(parse_err(format!("expected attribute name, got {other:?}"))),
        }
    }

    fn expect_token(&mut self, expected: &Token) -> Result<()> {
        match self.advance() {
            Some(tok) if tok == expected => Ok(()),
            other => Err(parse_err(format!("expected {expected:?}, got {other:?}"))),
        }
    }

    const fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn enter(&mut self) -> Result<()> {
        if self.depth >= MAX_NESTING {
            return Err(parse_err(format!(
                "nesting deeper than {MAX_NESTING} levels"
            )));
        }
        self.depth += 1;
        Ok(())
    }

    const fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}

const fn parse_err(message: String) -> NetformError {
    NetformError::Config { message }
}

fn skip_optional_comma(cursor: &mut TokenCursor<'_>) {
    if cursor.peek() == Some(&Token::Comma) {
        let _ = cursor.advance();
    }
}

/// Parses a `.nf` template from its source text.
///
/// # Errors
///
/// Returns an error if the input contains syntax errors or fails validation.
pub fn parse_template(input: &str) -> Result<Template> {
    let template = parse_syntax(input)?;
    validator::validate(&template)?;
    Ok(template)
}

/// Parses source text into a template without structural validation.
pub(crate) fn parse_syntax(input: &str) -> Result<Template> {
    tracing::info!("parsing .nf input");
    let tokens = lexer::tokenize(input)?;
    let mut cursor = TokenCursor::new(&tokens);
    let attributes = parse_block_body(&mut cursor, None)?;
    Ok(Template { attributes })
}

/// Parses `key = value` entries until `terminator` (or end of input when `None`).
fn parse_block_body(cursor: &mut TokenCursor<'_>, terminator: Option<&Token>) -> Result<Block> {
    let mut block = Block::new();

    loop {
        match (cursor.peek(), terminator) {
            (None, None) => break,
            (None, Some(_)) => {
                return Err(parse_err("unexpected end of input inside block".into()));
            }
            (Some(tok), Some(term)) if tok == term => break,
            _ => {}
        }

        let key = cursor.expect_key()?;
        let value = match cursor.peek() {
            Some(Token::BraceOpen) => parse_map(cursor)?,
            _ => {
                cursor.expect_token(&Token::Equals)?;
                parse_value(cursor)?
            }
        };
        if block.insert(key.clone(), value).is_some() {
            return Err(parse_err(format!("duplicate key: \"{key}\"")));
        }
        skip_optional_comma(cursor);
    }

    Ok(block)
}

fn parse_value(cursor: &mut TokenCursor<'_>) -> Result<Value> {
    match cursor.peek() {
        Some(Token::BraceOpen) => parse_map(cursor),
        Some(Token::BracketOpen) => parse_list(cursor),
        _ => match cursor.advance() {
            Some(Token::StringLiteral(s)) => Ok(Value::String(s.clone())),
            Some(Token::Integer(n)) => Ok(Value::Integer(*n)),
            Some(Token::True) => Ok(Value::Bool(true)),
            Some(Token::False) => Ok(Value::Bool(false)),
            other => Err(parse_err(format!("expected a value, got {other:?}"))),
        },
    }
}

fn parse_map(cursor: &mut TokenCursor<'_>) -> Result<Value> {
    cursor.expect_token(&Token::BraceOpen)?;
    cursor.enter()?;
    let block = parse_block_body(cursor, Some(&Token::BraceClose))?;
    cursor.expect_token(&Token::BraceClose)?;
    cursor.leave();
    Ok(Value::Map(block))
}

fn parse_list(cursor: &mut TokenCursor<'_>) -> Result<Value> {
    cursor.expect_token(&Token::BracketOpen)?;
    cursor.enter()?;
    let mut items = Vec::new();

    while cursor.peek() != Some(&Token::BracketClose) {
        if cursor.at_end() {
            return Err(parse_err("unexpected end of input inside list".into()));
        }
        items.push(parse_value(cursor)?);
        skip_optional_comma(cursor);
    }

    cursor.expect_token(&Token::BracketClose)?;
    cursor.leave();
    Ok(Value::List(items))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(v: &str) -> Value {
        Value::String(v.into())
    }

    #[test]
    fn parse_minimal_template() {
        let t = parse_template(r#"environment = "dev""#).expect("should parse");
        assert_eq!(t.attributes.get("environment"), Some(&text("dev")));
    }

    #[test]
    fn parse_scalars() {
        let input = r#"environment = "dev"
network_name = "dev-vpc"
subnets = {
    a = { region = "us-central1", ip_cidr_range = "10.0.1.0/24", private_ip_google_access = false }
}"#;
        let t = parse_template(input).expect("should parse");
        let subnets = t.attributes["subnets"].as_map().expect("map");
        let a = subnets["a"].as_map().expect("map");
        assert_eq!(a["region"], text("us-central1"));
        assert_eq!(a["private_ip_google_access"], Value::Bool(false));
    }

    #[test]
    fn parse_block_shorthand_equals_assignment() {
        let shorthand = parse_template(
            r#"environment = "dev"
backend { bucket = "b" prefix = "p" }"#,
        )
        .expect("should parse");
        let assigned = parse_template(
            r#"environment = "dev"
backend = { bucket = "b", prefix = "p" }"#,
        )
        .expect("should parse");
        assert_eq!(shorthand, assigned);
    }

    #[test]
    fn parse_list_of_maps() {
        let input = r#"environment = "dev"
firewall_rules = {
    web = {
        direction = "INGRESS"
        priority  = 1000
        ranges    = ["0.0.0.0/0"]
        allow     = [
            { protocol = "tcp", ports = ["80", "443"] },
            { protocol = "icmp" },
        ]
    }
}"#;
        let t = parse_template(input).expect("should parse");
        let web = t.attributes["firewall_rules"].as_map().expect("map")["web"]
            .as_map()
            .expect("map");
        assert_eq!(web["priority"], Value::Integer(1000));
        match &web["allow"] {
            Value::List(items) => assert_eq!(items.len(), 2),
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn parse_quoted_keys() {
        let input = r#"environment = "dev"
routes = { "egress.internet" = { dest_range = "0.0.0.0/0", priority = 1000, next_hop_gateway = "default-internet-gateway" } }"#;
        let t = parse_template(input).expect("should parse");
        let routes = t.attributes["routes"].as_map().expect("map");
        assert!(routes.contains_key("egress.internet"));
    }

    #[test]
    fn parse_error_duplicate_key() {
        let input = r#"environment = "dev"
subnets = {
    a = { region = "r", ip_cidr_range = "10.0.0.0/24" }
    a = { region = "r", ip_cidr_range = "10.0.1.0/24" }
}"#;
        let err = parse_template(input).unwrap_err();
        assert!(err.to_string().contains("duplicate key"), "got: {err}");
    }

    #[test]
    fn parse_error_missing_brace() {
        let input = r#"environment = "dev"
subnets = {
    a = { region = "r" }
"#;
        assert!(parse_template(input).is_err());
    }

    #[test]
    fn parse_error_missing_value() {
        assert!(parse_template("environment =").is_err());
        assert!(parse_template("environment = = \"x\"").is_err());
    }

    #[test]
    fn parse_error_unterminated_list() {
        assert!(parse_template("environment = \"dev\"\nx = [\"a\"").is_err());
    }

    #[test]
    fn parse_error_excessive_nesting() {
        let deep = format!("environment = \"dev\"\nx = {}{}", "[".repeat(10_000), "]".repeat(10_000));
        let err = parse_template(&deep).unwrap_err();
        assert!(matches!(err, NetformError::Config { .. }));
        assert!(err.to_string().contains("nesting"), "got: {err}");
    }

    #[test]
    fn parse_accepts_moderate_nesting() {
        let tokens = lexer::tokenize("[[[[\"a\"]]]]").expect("lex");
        let mut cursor = TokenCursor::new(&tokens);
        assert!(matches!(parse_value(&mut cursor), Ok(Value::List(_))));
        assert_eq!(cursor.depth, 0);
    }
}
