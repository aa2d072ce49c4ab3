use crate::error::scan_error;
use crate::token::{Token, TokenType, KEYWORDS};

/// Turns source text into a token stream ending in a single `Eof` token.
/// Lexical errors are reported as they are found and recorded in
/// `had_error`; scanning always continues so later errors surface too.
pub struct Scanner {
    source: Vec<char>,
    tokens: Vec<Token>,
    start: usize,
    current: usize,
    line: i32,
    pub had_error: bool,
}

impl Scanner {
    pub fn new(source: String) -> Self {
        Self {
            source: source.chars().collect(),
            tokens: Vec::new(),
            start: 0,
            current: 0,
            line: 1,
            had_error: false,
        }
    }

    pub fn scan_tokens(&mut self) -> &Vec<Token> {
        while !self.is_at_end() {
            self.start = self.current;
            self.scan_token();
        }

        self.tokens.push(Token::new(TokenType::Eof, "", self.line));
        &self.tokens
    }

    fn scan_token(&mut self) {
        let c = self.advance();
        match c {
            '(' => self.add_token(TokenType::LeftParen),
            ')' => self.add_token(TokenType::RightParen),
            '{' => self.add_token(TokenType::LeftBrace),
            '}' => self.add_token(TokenType::RightBrace),
            ',' => self.add_token(TokenType::Comma),
            '.' => self.add_token(TokenType::Dot),
            '-' => self.add_token(TokenType::Minus),
            '+' => self.add_token(TokenType::Plus),
            ';' => self.add_token(TokenType::Semicolon),
            '*' => self.add_token(TokenType::Star),

            '!' => {
                let token = if self.match_next('=') {
                    TokenType::BangEqual
                } else {
                    TokenType::Bang
                };
                self.add_token(token);
            }
            '=' => {
                let token = if self.match_next('=') {
                    TokenType::EqualEqual
                } else {
                    TokenType::Equal
                };
                self.add_token(token);
            }
            '<' => {
                let token = if self.match_next('=') {
                    TokenType::LessEqual
                } else {
                    TokenType::Less
                };
                self.add_token(token);
            }
            '>' => {
                let token = if self.match_next('=') {
                    TokenType::GreaterEqual
                } else {
                    TokenType::Greater
                };
                self.add_token(token);
            }

            '/' => {
                if self.match_next('/') {
                    // A comment runs to the end of the line.
                    while self.peek() != '\n' && !self.is_at_end() {
                        self.advance();
                    }
                } else {
                    self.add_token(TokenType::Slash);
                }
            }

            ' ' | '\t' | '\r' => (),

            '\n' => self.line += 1,

            '"' => self.string(),

            c => {
                if c.is_ascii_digit() {
                    self.number();
                } else if c.is_alphabetic() || c == '_' {
                    self.identifier();
                } else {
                    self.error("Unexpected character.");
                }
            }
        }
    }

    fn string(&mut self) {
        while self.peek() != '"' && !self.is_at_end() {
            if self.peek() == '\n' {
                self.line += 1;
            }
            self.advance();
        }

        if self.is_at_end() {
            self.error("Unterminated string.");
            return;
        }

        // The closing quote.
        self.advance();

        // The literal drops the surrounding quotes; the lexeme keeps them.
        let literal = self.lexeme(self.start + 1, self.current - 1);
        self.add_token(TokenType::String { literal });
    }

    fn number(&mut self) {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        // A fractional part needs a digit after the dot; `123.` stays an
        // integer followed by a Dot token.
        if self.peek() == '.' && self.peek_next().is_ascii_digit() {
            self.advance();

            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        let literal: f64 = self
            .lexeme(self.start, self.current)
            .parse()
            .expect("scanner only admits digit sequences");
        self.add_token(TokenType::Number { literal });
    }

    fn identifier(&mut self) {
        while self.peek().is_alphanumeric() || self.peek() == '_' {
            self.advance();
        }

        let text = self.lexeme(self.start, self.current);
        let token_type = KEYWORDS
            .get(text.as_str())
            .cloned()
            .unwrap_or(TokenType::Identifier);
        self.add_token(token_type);
    }

    fn add_token(&mut self, token_type: TokenType) {
        let text = self.lexeme(self.start, self.current);
        self.tokens.push(Token::new(token_type, &text, self.line));
    }

    fn lexeme(&self, start: usize, end: usize) -> String {
        self.source[start..end].iter().collect()
    }

    fn advance(&mut self) -> char {
        let c = self.source[self.current];
        self.current += 1;
        c
    }

    // Like advance, but never consumes.
    fn peek(&self) -> char {
        self.source.get(self.current).copied().unwrap_or('\0')
    }

    fn peek_next(&self) -> char {
        self.source.get(self.current + 1).copied().unwrap_or('\0')
    }

    // Consumes the current character only if it is the one expected.
    fn match_next(&mut self, expected: char) -> bool {
        if self.peek() != expected || self.is_at_end() {
            return false;
        }

        self.current += 1;
        true
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn error(&mut self, message: &str) {
        scan_error(self.line, message);
        self.had_error = true;
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn scan(source: &str) -> (Vec<TokenType>, bool) {
        let mut scanner = Scanner::new(source.to_string());
        scanner.scan_tokens();
        let types = scanner
            .tokens
            .iter()
            .map(|token| token.token_type.clone())
            .collect();
        (types, scanner.had_error)
    }

    #[test]
    fn scans_operators_and_punctuation() {
        let (types, had_error) = scan("(){};,+-*/ != == <= >= ! = < > .");
        assert!(!had_error);
        assert_eq!(
            types,
            vec![
                TokenType::LeftParen,
                TokenType::RightParen,
                TokenType::LeftBrace,
                TokenType::RightBrace,
                TokenType::Semicolon,
                TokenType::Comma,
                TokenType::Plus,
                TokenType::Minus,
                TokenType::Star,
                TokenType::Slash,
                TokenType::BangEqual,
                TokenType::EqualEqual,
                TokenType::LessEqual,
                TokenType::GreaterEqual,
                TokenType::Bang,
                TokenType::Equal,
                TokenType::Less,
                TokenType::Greater,
                TokenType::Dot,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn scans_literals_and_keywords() {
        let (types, had_error) = scan("var answer = 42.5; print \"hi\";");
        assert!(!had_error);
        assert_eq!(
            types,
            vec![
                TokenType::Var,
                TokenType::Identifier,
                TokenType::Equal,
                TokenType::Number { literal: 42.5 },
                TokenType::Semicolon,
                TokenType::Print,
                TokenType::String {
                    literal: "hi".to_string()
                },
                TokenType::Semicolon,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn comments_and_newlines_are_skipped() {
        let mut scanner = Scanner::new("// nothing here\n1".to_string());
        let tokens = scanner.scan_tokens();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].token_type, TokenType::Number { literal: 1.0 });
        assert_eq!(tokens[0].line, 2);
    }

    #[test]
    fn unexpected_character_sets_error_flag() {
        let (types, had_error) = scan("1 @ 2");
        assert!(had_error);
        // Scanning keeps going past the bad character.
        assert_eq!(
            types,
            vec![
                TokenType::Number { literal: 1.0 },
                TokenType::Number { literal: 2.0 },
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn unterminated_string_sets_error_flag() {
        let (types, had_error) = scan("\"oops");
        assert!(had_error);
        assert_eq!(types, vec![TokenType::Eof]);
    }
}
