//! Tokenization of `.nf` template text using `nom`.
//!
//! Produces a stream of [`Token`]s from raw input for the parser to consume.
//! Whitespace, `#` comments, and `//` comments are discarded between tokens.

use netform_common::error::{NetformError, Result};
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit1, multispace1, not_line_ending},
    combinator::value,
    multi::many0,
    sequence::preceded,
};

/// A token in the `.nf` language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Boolean literal `true`.
    True,
    /// Boolean literal `false`.
    False,
    /// A bare identifier (attribute or map key).
    Identifier(String),
    /// A double-quoted string literal.
    StringLiteral(String),
    /// A non-negative integer literal.
    Integer(i64),
    /// `{` opening brace.
    BraceOpen,
    /// `}` closing brace.
    BraceClose,
    /// `[` opening bracket.
    BracketOpen,
    /// `]` closing bracket.
    BracketClose,
    /// `=` assignment.
    Equals,
    /// `,` comma separator.
    Comma,
}

/// Skippable items: whitespace or line comments.
fn skip_trivia(input: &str) -> IResult<&str, ()> {
    let slash_comment = value((), preceded(tag("//"), not_line_ending));
    let hash_comment = value((), preceded(char('#'), not_line_ending));
    let ws = value((), multispace1);
    let (input, _) = many0(alt((ws, slash_comment, hash_comment))).parse(input)?;
    Ok((input, ()))
}

/// Parses a double-quoted string literal with basic escape support.
fn string_literal(input: &str) -> IResult<&str, Token> {
    let (input, _) = char('"')(input)?;
    let mut result = String::new();
    let mut chars = input.char_indices();
    loop {
        match chars.next() {
            Some((idx, '"')) => {
                let remaining = &input[idx + 1..];
                return Ok((remaining, Token::StringLiteral(result)));
            }
            Some((_, '\\')) => match chars.next() {
                Some((_, 'n')) => result.push('\n'),
                Some((_, 't')) => result.push('\t'),
                Some((_, '\\')) => result.push('\\'),
                Some((_, '"')) => result.push('"'),
                Some((_, c)) => {
                    result.push('\\');
                    result.push(c);
                }
                None => {
                    return Err(nom::Err::Failure(nom::error::Error::new(
                        input,
                        nom::error::ErrorKind::Char,
                    )));
                }
            },
            Some((_, c)) => result.push(c),
            None => {
                return Err(nom::Err::Failure(nom::error::Error::new(
                    input,
                    nom::error::ErrorKind::Char,
                )));
            }
        }
    }
}

/// Parses an integer literal (sequence of digits).
fn integer_literal(input: &str) -> IResult<&str, Token> {
    let (input, digits) = digit1(input)?;
    let val: i64 = digits.parse().map_err(|_| {
        nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit))
    })?;
    Ok((input, Token::Integer(val)))
}

const fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

const fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Parses an identifier or boolean literal.
fn identifier_or_keyword(input: &str) -> IResult<&str, Token> {
    let (input, first) = take_while1(is_ident_start)(input)?;
    let (input, rest) = take_while(is_ident_continue)(input)?;
    let word = format!("{first}{rest}");
    let token = match word.as_str() {
        "true" => Token::True,
        "false" => Token::False,
        _ => Token::Identifier(word),
    };
    Ok((input, token))
}

/// Parses a symbol token.
fn symbol(input: &str) -> IResult<&str, Token> {
    alt((
        value(Token::BraceOpen, char('{')),
        value(Token::BraceClose, char('}')),
        value(Token::BracketOpen, char('[')),
        value(Token::BracketClose, char(']')),
        value(Token::Equals, char('=')),
        value(Token::Comma, char(',')),
    ))
    .parse(input)
}

/// Parses a single token (after trivia has been skipped).
fn single_token(input: &str) -> IResult<&str, Token> {
    alt((
        string_literal,
        symbol,
        integer_literal,
        identifier_or_keyword,
    ))
    .parse(input)
}

/// Tokenizes a `.nf` source string into a vector of tokens.
///
/// # Errors
///
/// Returns an error if the input contains characters that cannot be tokenized.
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut remaining = input;

    loop {
        let (rest, ()) = skip_trivia(remaining).map_err(|e| NetformError::Config {
            message: format!("lexer error skipping whitespace: {e}"),
        })?;
        remaining = rest;

        if remaining.is_empty() {
            break;
        }

        let (rest, token) = single_token(remaining).map_err(|e| NetformError::Config {
            message: format!(
                "unexpected character at: \"{}\" ({e})",
                remaining.chars().take(20).collect::<String>()
            ),
        })?;
        tokens.push(token);
        remaining = rest;
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_booleans() {
        let tokens = tokenize("true false").expect("should tokenize");
        assert_eq!(tokens, vec![Token::True, Token::False]);
    }

    #[test]
    fn tokenize_symbols() {
        let tokens = tokenize("{ } [ ] = ,").expect("should tokenize");
        assert_eq!(
            tokens,
            vec![
                Token::BraceOpen,
                Token::BraceClose,
                Token::BracketOpen,
                Token::BracketClose,
                Token::Equals,
                Token::Comma,
            ]
        );
    }

    #[test]
    fn tokenize_cidr_string() {
        let tokens = tokenize(r#""10.0.1.0/24""#).expect("should tokenize");
        assert_eq!(tokens, vec![Token::StringLiteral("10.0.1.0/24".into())]);
    }

    #[test]
    fn tokenize_string_with_escapes() {
        let tokens = tokenize(r#""line\nnew\ttab\\slash\"quote""#).expect("should tokenize");
        assert_eq!(
            tokens,
            vec![Token::StringLiteral("line\nnew\ttab\\slash\"quote".into())]
        );
    }

    #[test]
    fn tokenize_integer() {
        let tokens = tokenize("1000 65535").expect("should tokenize");
        assert_eq!(tokens, vec![Token::Integer(1000), Token::Integer(65535)]);
    }

    #[test]
    fn tokenize_hyphenated_identifier() {
        let tokens = tokenize("allow-ssh private_ip_google_access").expect("should tokenize");
        assert_eq!(
            tokens,
            vec![
                Token::Identifier("allow-ssh".into()),
                Token::Identifier("private_ip_google_access".into()),
            ]
        );
    }

    #[test]
    fn tokenize_skips_both_comment_styles() {
        let input = "# header\nproject_id = \"p\" // trailing\n";
        let tokens = tokenize(input).expect("should tokenize");
        assert_eq!(
            tokens,
            vec![
                Token::Identifier("project_id".into()),
                Token::Equals,
                Token::StringLiteral("p".into()),
            ]
        );
    }

    #[test]
    fn tokenize_empty_input() {
        let tokens = tokenize("").expect("should tokenize");
        assert!(tokens.is_empty());
    }

    #[test]
    fn tokenize_only_comments() {
        let tokens = tokenize("// just a comment\n# another one").expect("should tokenize");
        assert!(tokens.is_empty());
    }

    #[test]
    fn tokenize_unterminated_string_fails() {
        assert!(tokenize(r#"region = "us-central1"#).is_err());
    }

    #[test]
    fn tokenize_error_on_invalid_char() {
        assert!(tokenize("priority = -5").is_err());
        assert!(tokenize("name = @vpc").is_err());
    }
}
