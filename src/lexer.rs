use logos::Logos;
use std::ops::Range;

/// Tokens shared by the normalizer and the evaluator.
///
/// String literals accept both plain `"..."` quotes and the typographic
/// `“...”` quotes the block editor inserts.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum Token {
    #[token("true")]
    True,
    #[token("false")]
    False,

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Identifier(String),

    #[regex(r"[0-9]+\.[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    DoubleLiteral(f64),

    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    IntLiteral(i64),

    #[regex(r#""[^"]*""#, |lex| unquote(lex.slice()))]
    #[regex(r"“[^”]*”", |lex| unquote(lex.slice()))]
    StringLiteral(String),

    // Arithmetic
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,

    #[token("++")]
    PlusPlus,
    #[token("--")]
    MinusMinus,

    #[token("=")]
    Assign,
    #[token("+=")]
    PlusAssign,
    #[token("-=")]
    MinusAssign,
    #[token("*=")]
    StarAssign,
    #[token("/=")]
    SlashAssign,
    #[token("%=")]
    PercentAssign,

    // Comparison
    #[token("==")]
    Equal,
    #[token("!=")]
    NotEqual,
    #[token("<")]
    Less,
    #[token(">")]
    Greater,
    #[token("<=")]
    LessEqual,
    #[token(">=")]
    GreaterEqual,

    // Logical
    #[token("&&")]
    And,
    #[token("||")]
    Or,

    // Reference marker for by-name arguments
    #[token("&")]
    Ampersand,

    // Delimiters
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,
    #[token("->")]
    Arrow,
}

fn unquote(slice: &str) -> String {
    slice
        .trim_start_matches(['"', '“'])
        .trim_end_matches(['"', '”'])
        .to_string()
}

impl Token {
    /// Binary operators the evaluator understands.
    pub fn is_operator(&self) -> bool {
        matches!(
            self,
            Token::Plus
                | Token::Minus
                | Token::Star
                | Token::Slash
                | Token::Percent
                | Token::Equal
                | Token::NotEqual
                | Token::Less
                | Token::Greater
                | Token::LessEqual
                | Token::GreaterEqual
                | Token::And
                | Token::Or
        )
    }

    /// `++ -- += -= *= /= %=` and plain `=`.
    pub fn is_assignment(&self) -> bool {
        matches!(
            self,
            Token::Assign
                | Token::PlusPlus
                | Token::MinusMinus
                | Token::PlusAssign
                | Token::MinusAssign
                | Token::StarAssign
                | Token::SlashAssign
                | Token::PercentAssign
        )
    }
}

/// A token together with its byte range in the source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub span: Range<usize>,
}

/// Lex `source` completely. On failure returns the offending slice.
pub fn tokenize(source: &str) -> Result<Vec<Spanned>, String> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        match result {
            Ok(token) => tokens.push(Spanned {
                token,
                span: lexer.span(),
            }),
            Err(()) => return Err(lexer.slice().to_string()),
        }
    }
    Ok(tokens)
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::Identifier(s) => write!(f, "{}", s),
            Token::DoubleLiteral(n) => write!(f, "{}", n),
            Token::IntLiteral(n) => write!(f, "{}", n),
            Token::StringLiteral(s) => write!(f, "\"{}\"", s),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Percent => write!(f, "%"),
            Token::PlusPlus => write!(f, "++"),
            Token::MinusMinus => write!(f, "--"),
            Token::Assign => write!(f, "="),
            Token::PlusAssign => write!(f, "+="),
            Token::MinusAssign => write!(f, "-="),
            Token::StarAssign => write!(f, "*="),
            Token::SlashAssign => write!(f, "/="),
            Token::PercentAssign => write!(f, "%="),
            Token::Equal => write!(f, "=="),
            Token::NotEqual => write!(f, "!="),
            Token::Less => write!(f, "<"),
            Token::Greater => write!(f, ">"),
            Token::LessEqual => write!(f, "<="),
            Token::GreaterEqual => write!(f, ">="),
            Token::And => write!(f, "&&"),
            Token::Or => write!(f, "||"),
            Token::Ampersand => write!(f, "&"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::Comma => write!(f, ","),
            Token::Semicolon => write!(f, ";"),
            Token::Colon => write!(f, ":"),
            Token::Arrow => write!(f, "->"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn multi_character_operators_win_over_single() {
        assert_eq!(
            kinds("a<=b==c&&d||e!=f>=g"),
            vec![
                Token::Identifier("a".into()),
                Token::LessEqual,
                Token::Identifier("b".into()),
                Token::Equal,
                Token::Identifier("c".into()),
                Token::And,
                Token::Identifier("d".into()),
                Token::Or,
                Token::Identifier("e".into()),
                Token::NotEqual,
                Token::Identifier("f".into()),
                Token::GreaterEqual,
                Token::Identifier("g".into()),
            ]
        );
    }

    #[test]
    fn both_quote_styles_are_string_literals() {
        assert_eq!(
            kinds("\"plain\" “curly, with comma”"),
            vec![
                Token::StringLiteral("plain".into()),
                Token::StringLiteral("curly, with comma".into()),
            ]
        );
    }

    #[test]
    fn spans_cover_source_slices() {
        let tokens = tokenize("count += 10").unwrap();
        assert_eq!(tokens[0].span, 0..5);
        assert_eq!(tokens[1].token, Token::PlusAssign);
        assert_eq!(tokens[2].span, 9..11);
    }

    #[test]
    fn stray_characters_are_reported() {
        assert_eq!(tokenize("1 @ 2"), Err("@".to_string()));
        assert_eq!(tokenize("a | b"), Err("|".to_string()));
    }
}
