use tracing::trace;

use crate::diagnostics::{Diagnostic, DiagnosticKind, SourceLocation, SourceSpan};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Let,
    Const,
    Function,
    Return,
    If,
    Else,
    While,
    For,
    Switch,
    Case,
    Default,
    Break,
    Continue,
    Try,
    Catch,
    Throw,
    New,
    This,
    Global,
    Null,
    True,
    False,
    Undefined,
}

impl Keyword {
    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::Let => "let",
            Keyword::Const => "const",
            Keyword::Function => "function",
            Keyword::Return => "return",
            Keyword::If => "if",
            Keyword::Else => "else",
            Keyword::While => "while",
            Keyword::For => "for",
            Keyword::Switch => "switch",
            Keyword::Case => "case",
            Keyword::Default => "default",
            Keyword::Break => "break",
            Keyword::Continue => "continue",
            Keyword::Try => "try",
            Keyword::Catch => "catch",
            Keyword::Throw => "throw",
            Keyword::New => "new",
            Keyword::This => "this",
            Keyword::Global => "global",
            Keyword::Null => "null",
            Keyword::True => "true",
            Keyword::False => "false",
            Keyword::Undefined => "undefined",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    Number,
    String,
    Keyword(Keyword),
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Colon,
    Semicolon,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    PlusPlus,
    MinusMinus,
    Bang,
    Tilde,
    BangEqual,
    EqualEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    DoubleAmpersand,
    DoublePipe,
    Invalid,
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub span: SourceSpan,
}

pub struct Lexer<'a> {
    source: &'a str,
    chars: std::str::CharIndices<'a>,
    current: usize,
    line: usize,
    column: usize,
    peeked: Option<(usize, char)>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices(),
            current: 0,
            line: 0,
            column: 0,
            peeked: None,
        }
    }

    fn location(&self) -> SourceLocation {
        SourceLocation::new(self.line, self.column, self.current)
    }

    fn bump(&mut self) -> Option<(usize, char)> {
        let next = match self.peeked.take() {
            Some(pair) => Some(pair),
            None => self.chars.next(),
        };
        let (idx, ch) = next?;
        self.current = idx + ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        Some((idx, ch))
    }

    fn peek(&mut self) -> Option<(usize, char)> {
        if self.peeked.is_none() {
            self.peeked = self.chars.next();
        }
        self.peeked
    }

    fn peek_second(&mut self) -> Option<char> {
        self.peek()?;
        self.chars.clone().next().map(|(_, ch)| ch)
    }

    fn match_next(&mut self, expected: char) -> bool {
        match self.peek() {
            Some((_, ch)) if ch == expected => {
                self.bump();
                true
            }
            _ => false,
        }
    }

    fn consume_while<F>(&mut self, mut predicate: F)
    where
        F: FnMut(char) -> bool,
    {
        while let Some((_, ch)) = self.peek() {
            if !predicate(ch) {
                break;
            }
            self.bump();
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            self.consume_while(char::is_whitespace);
            match (self.peek(), self.peek_second()) {
                (Some((_, '/')), Some('/')) => self.consume_while(|ch| ch != '\n'),
                _ => break,
            }
        }
    }

    fn token(&self, kind: TokenKind, start: SourceLocation) -> Token {
        Token {
            kind,
            lexeme: self.source[start.offset..self.current].to_string(),
            span: SourceSpan::new(start, self.current - start.offset),
        }
    }

    fn identifier_or_keyword(&mut self, start: SourceLocation) -> Token {
        self.consume_while(|ch| ch.is_ascii_alphanumeric() || ch == '_');
        let mut token = self.token(TokenKind::Identifier, start);
        if let Some(keyword) = keyword_for(&token.lexeme) {
            token.kind = TokenKind::Keyword(keyword);
        }
        token
    }

    fn number_literal(&mut self, start: SourceLocation, first: char) -> Token {
        if first == '0' && matches!(self.peek(), Some((_, 'x' | 'X'))) {
            self.bump();
            self.consume_while(|ch| ch.is_ascii_hexdigit());
        } else {
            self.consume_while(|ch| ch.is_ascii_digit());
        }
        self.token(TokenKind::Number, start)
    }

    /// String bodies are taken verbatim; there are no escape sequences.
    fn string_literal(&mut self, start: SourceLocation, quote: char) -> Result<Token, Diagnostic> {
        let body_start = self.current;
        while let Some((idx, ch)) = self.bump() {
            if ch == quote {
                return Ok(Token {
                    kind: TokenKind::String,
                    lexeme: self.source[body_start..idx].to_string(),
                    span: SourceSpan::new(start, self.current - start.offset),
                });
            }
        }
        Err(
            Diagnostic::new(DiagnosticKind::Lexer, "Unterminated string literal")
                .with_span(SourceSpan::new(start, self.current - start.offset)),
        )
    }

    fn operator(&mut self, start: SourceLocation, ch: char) -> Token {
        let kind = match ch {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            ':' => TokenKind::Colon,
            ';' => TokenKind::Semicolon,
            '~' => TokenKind::Tilde,
            '+' => {
                if self.match_next('+') {
                    TokenKind::PlusPlus
                } else if self.match_next('=') {
                    TokenKind::PlusAssign
                } else {
                    TokenKind::Plus
                }
            }
            '-' => {
                if self.match_next('-') {
                    TokenKind::MinusMinus
                } else if self.match_next('=') {
                    TokenKind::MinusAssign
                } else {
                    TokenKind::Minus
                }
            }
            '*' => {
                if self.match_next('=') {
                    TokenKind::StarAssign
                } else {
                    TokenKind::Star
                }
            }
            '/' => {
                if self.match_next('=') {
                    TokenKind::SlashAssign
                } else {
                    TokenKind::Slash
                }
            }
            '%' => {
                if self.match_next('=') {
                    TokenKind::PercentAssign
                } else {
                    TokenKind::Percent
                }
            }
            '=' => {
                if self.match_next('=') {
                    TokenKind::EqualEqual
                } else {
                    TokenKind::Assign
                }
            }
            '!' => {
                if self.match_next('=') {
                    TokenKind::BangEqual
                } else {
                    TokenKind::Bang
                }
            }
            '<' => {
                if self.match_next('=') {
                    TokenKind::LessEqual
                } else {
                    TokenKind::Less
                }
            }
            '>' => {
                if self.match_next('=') {
                    TokenKind::GreaterEqual
                } else {
                    TokenKind::Greater
                }
            }
            '&' => {
                if self.match_next('&') {
                    TokenKind::DoubleAmpersand
                } else {
                    TokenKind::Invalid
                }
            }
            '|' => {
                if self.match_next('|') {
                    TokenKind::DoublePipe
                } else {
                    TokenKind::Invalid
                }
            }
            _ => TokenKind::Invalid,
        };
        self.token(kind, start)
    }

    /// Scans the whole input. Unrecognized characters become `Invalid` tokens and
    /// scanning continues; only an unterminated string literal is fatal.
    pub fn tokenize(mut self) -> Result<Vec<Token>, Diagnostic> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            let start = self.location();
            let Some((_, ch)) = self.bump() else {
                tokens.push(self.token(TokenKind::Eof, start));
                break;
            };

            let token = match ch {
                'a'..='z' | 'A'..='Z' | '_' => self.identifier_or_keyword(start),
                '0'..='9' => self.number_literal(start, ch),
                '"' | '\'' => self.string_literal(start, ch)?,
                _ => self.operator(start, ch),
            };
            if token.kind == TokenKind::Invalid {
                trace!(lexeme = %token.lexeme, location = %start, "invalid character");
            }
            tokens.push(token);
        }
        Ok(tokens)
    }
}

fn keyword_for(ident: &str) -> Option<Keyword> {
    use self::Keyword as Kw;
    let keyword = match ident {
        "let" => Kw::Let,
        "const" => Kw::Const,
        "function" => Kw::Function,
        "return" => Kw::Return,
        "if" => Kw::If,
        "else" => Kw::Else,
        "while" => Kw::While,
        "for" => Kw::For,
        "switch" => Kw::Switch,
        "case" => Kw::Case,
        "default" => Kw::Default,
        "break" => Kw::Break,
        "continue" => Kw::Continue,
        "try" => Kw::Try,
        "catch" => Kw::Catch,
        "throw" => Kw::Throw,
        "new" => Kw::New,
        "this" => Kw::This,
        "global" => Kw::Global,
        "null" => Kw::Null,
        "true" => Kw::True,
        "false" => Kw::False,
        "undefined" => Kw::Undefined,
        _ => return None,
    };
    Some(keyword)
}
