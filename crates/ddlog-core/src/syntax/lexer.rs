//! DDlog lexer.
//!
//! Produces a flat token stream with byte spans. Comments and whitespace are
//! dropped. The lexer never fails: characters it cannot classify become
//! [`TokenKind::Unknown`] tokens and the parser turns them into error nodes.

use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifier or keyword (keywords are matched by text in the parser).
    Ident,
    /// Type variable such as `'A`.
    TypeVar,
    Number,
    String,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Lt,
    Gt,
    Comma,
    Colon,
    /// `::`
    PathSep,
    /// `:-`
    Turnstile,
    /// `->`
    Arrow,
    Semi,
    /// `.` inside an expression.
    Dot,
    /// `.` followed by whitespace, a comment or end of input: ends a rule.
    TerminalDot,
    Eq,
    Pipe,
    Amp,
    Hash,
    /// Any other operator character.
    Op,
    /// Unterminated literal or unclassifiable input.
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Range<usize>,
}

impl Token {
    pub fn text<'s>(&self, source: &'s str) -> &'s str {
        &source[self.span.clone()]
    }
}

/// Tokenizes DDlog source.
pub fn tokenize(source: &str) -> Vec<Token> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some((start, ch)) = chars.next() {
        let kind = match ch {
            c if c.is_whitespace() => continue,

            '/' if bytes.get(start + 1) == Some(&b'/') => {
                while let Some(&(_, c)) = chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    chars.next();
                }
                continue;
            }

            '/' if bytes.get(start + 1) == Some(&b'*') => {
                chars.next();
                let mut prev = '\0';
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        closed = true;
                        break;
                    }
                    prev = c;
                }
                if closed {
                    continue;
                }
                TokenKind::Unknown
            }

            c if c.is_alphabetic() || c == '_' => {
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' {
                        chars.next();
                    } else {
                        break;
                    }
                }
                TokenKind::Ident
            }

            '\'' => {
                let mut consumed = false;
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' {
                        chars.next();
                        consumed = true;
                    } else {
                        break;
                    }
                }
                if consumed {
                    TokenKind::TypeVar
                } else {
                    TokenKind::Unknown
                }
            }

            c if c.is_ascii_digit() => {
                lex_number(source, &mut chars);
                TokenKind::Number
            }

            '"' => lex_quoted(&mut chars),

            '$' if bytes.get(start + 1) == Some(&b'"') => {
                chars.next();
                lex_quoted(&mut chars)
            }

            '[' if bytes.get(start + 1) == Some(&b'|') => {
                chars.next();
                let mut prev = '\0';
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    if prev == '|' && c == ']' {
                        closed = true;
                        break;
                    }
                    prev = c;
                }
                if closed {
                    TokenKind::String
                } else {
                    TokenKind::Unknown
                }
            }

            ':' => match chars.peek() {
                Some(&(_, ':')) => {
                    chars.next();
                    TokenKind::PathSep
                }
                Some(&(_, '-')) => {
                    chars.next();
                    TokenKind::Turnstile
                }
                _ => TokenKind::Colon,
            },

            '-' if bytes.get(start + 1) == Some(&b'>') => {
                chars.next();
                TokenKind::Arrow
            }

            '.' => match chars.peek() {
                None => TokenKind::TerminalDot,
                Some(&(_, c)) if c.is_whitespace() => TokenKind::TerminalDot,
                Some(&(idx, '/')) if matches!(bytes.get(idx + 1), Some(b'/' | b'*')) => {
                    TokenKind::TerminalDot
                }
                _ => TokenKind::Dot,
            },

            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '<' => TokenKind::Lt,
            '>' => TokenKind::Gt,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semi,
            '=' => TokenKind::Eq,
            '|' => TokenKind::Pipe,
            '&' => TokenKind::Amp,
            '#' => TokenKind::Hash,
            c if c.is_ascii_punctuation() => TokenKind::Op,
            _ => TokenKind::Unknown,
        };

        let end = chars.peek().map_or(source.len(), |&(idx, _)| idx);
        tokens.push(Token {
            kind,
            span: start..end,
        });
    }

    tokens
}

/// Decimal, float, and width-prefixed literals (`32'd5`, `8'hff`, `64'sd-1` is
/// lexed as `64'sd` `-` `1`, which the parser only ever skips).
fn lex_number(source: &str, chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>) {
    let bytes = source.as_bytes();
    while let Some(&(idx, c)) = chars.peek() {
        let continues = c.is_ascii_alphanumeric()
            || c == '_'
            || c == '\''
            || (c == '.' && bytes.get(idx + 1).is_some_and(u8::is_ascii_digit));
        if !continues {
            break;
        }
        chars.next();
    }
}

fn lex_quoted(chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>) -> TokenKind {
    let mut escaped = false;
    for (_, c) in chars.by_ref() {
        match c {
            '\\' if !escaped => escaped = true,
            '"' if !escaped => return TokenKind::String,
            _ => escaped = false,
        }
    }
    TokenKind::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_import_tokens() {
        let source = "import std::vec as v";
        let tokens = tokenize(source);
        let texts: Vec<_> = tokens.iter().map(|t| t.text(source)).collect();
        assert_eq!(texts, vec!["import", "std", "::", "vec", "as", "v"]);
        assert_eq!(tokens[1].kind, TokenKind::Ident);
        assert_eq!(tokens[2].kind, TokenKind::PathSep);
    }

    #[test]
    fn test_rule_terminal_dot() {
        assert_eq!(
            kinds("R(x) :- S(x)."),
            vec![
                TokenKind::Ident,
                TokenKind::LParen,
                TokenKind::Ident,
                TokenKind::RParen,
                TokenKind::Turnstile,
                TokenKind::Ident,
                TokenKind::LParen,
                TokenKind::Ident,
                TokenKind::RParen,
                TokenKind::TerminalDot,
            ]
        );
    }

    #[test]
    fn test_field_access_dot_is_not_terminal() {
        let k = kinds("x.y.");
        assert_eq!(
            k,
            vec![
                TokenKind::Ident,
                TokenKind::Dot,
                TokenKind::Ident,
                TokenKind::TerminalDot
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        let source = "// line\nrelation /* block */ R()";
        let texts: Vec<_> = tokenize(source)
            .iter()
            .map(|t| t.text(source).to_string())
            .collect();
        assert_eq!(texts, vec!["relation", "R", "(", ")"]);
    }

    #[test]
    fn test_dot_before_comment_is_terminal() {
        assert_eq!(
            kinds("R(1).// fact"),
            vec![
                TokenKind::Ident,
                TokenKind::LParen,
                TokenKind::Number,
                TokenKind::RParen,
                TokenKind::TerminalDot
            ]
        );
    }

    #[test]
    fn test_numbers_and_strings() {
        let source = r#"32'd5 1.5 "a\"b" [|raw|]"#;
        let tokens = tokenize(source);
        let texts: Vec<_> = tokens.iter().map(|t| t.text(source)).collect();
        assert_eq!(texts, vec!["32'd5", "1.5", r#""a\"b""#, "[|raw|]"]);
        assert_eq!(tokens[2].kind, TokenKind::String);
        assert_eq!(tokens[3].kind, TokenKind::String);
    }

    #[test]
    fn test_unterminated_string_is_unknown() {
        let tokens = tokenize("\"abc");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Unknown);
        assert_eq!(tokens[0].span, 0..4);
    }

    #[test]
    fn test_type_var() {
        assert_eq!(
            kinds("Vec<'A>"),
            vec![
                TokenKind::Ident,
                TokenKind::Lt,
                TokenKind::TypeVar,
                TokenKind::Gt
            ]
        );
    }
}
