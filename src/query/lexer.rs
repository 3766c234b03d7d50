//! Tokenizer for query expressions.

use super::QueryError;

#[derive(Debug, Clone, PartialEq)]
pub enum Lexeme {
    Number(f64),
    String(String),
    /// Field name, either bare (`name`) or backtick-quoted (`` `user-name` ``).
    Name(String),
    /// `$` alone (empty name) or `$name`.
    Variable(String),

    Dot,
    Comma,
    Colon,
    Question,
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Ampersand,

    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,

    Eof,
}

impl Lexeme {
    /// Binding power for binary operators; 0 means "not a binary operator".
    pub fn precedence(&self) -> u8 {
        match self {
            Lexeme::Name(n) if n == "or" => 1,
            Lexeme::Name(n) if n == "and" => 2,
            Lexeme::Equal
            | Lexeme::NotEqual
            | Lexeme::LessThan
            | Lexeme::LessEqual
            | Lexeme::GreaterThan
            | Lexeme::GreaterEqual => 3,
            Lexeme::Ampersand => 4,
            Lexeme::Plus | Lexeme::Minus => 5,
            Lexeme::Star | Lexeme::Slash | Lexeme::Percent => 6,
            _ => 0,
        }
    }
}

pub struct Lexer<'a> {
    input: &'a str,
    chars: Vec<char>,
    position: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.chars().collect(),
            position: 0,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<(Lexeme, usize)>, QueryError> {
        let mut out = Vec::with_capacity((self.input.len() / 4).max(4));
        loop {
            self.skip_whitespace();
            let start = self.position;
            let lexeme = self.next_lexeme()?;
            let done = lexeme == Lexeme::Eof;
            out.push((lexeme, start));
            if done {
                return Ok(out);
            }
        }
    }

    fn next_lexeme(&mut self) -> Result<Lexeme, QueryError> {
        let Some(ch) = self.current() else {
            return Ok(Lexeme::Eof);
        };

        let simple = match ch {
            '.' => Some(Lexeme::Dot),
            ',' => Some(Lexeme::Comma),
            ':' => Some(Lexeme::Colon),
            '?' => Some(Lexeme::Question),
            '(' => Some(Lexeme::LeftParen),
            ')' => Some(Lexeme::RightParen),
            '[' => Some(Lexeme::LeftBracket),
            ']' => Some(Lexeme::RightBracket),
            '{' => Some(Lexeme::LeftBrace),
            '}' => Some(Lexeme::RightBrace),
            '+' => Some(Lexeme::Plus),
            '-' => Some(Lexeme::Minus),
            '*' => Some(Lexeme::Star),
            '/' => Some(Lexeme::Slash),
            '%' => Some(Lexeme::Percent),
            '&' => Some(Lexeme::Ampersand),
            _ => None,
        };
        if let Some(lexeme) = simple {
            self.advance();
            return Ok(lexeme);
        }

        match ch {
            '=' => {
                self.advance();
                if self.current() == Some('=') {
                    self.advance();
                }
                Ok(Lexeme::Equal)
            }
            '!' if self.peek() == Some('=') => {
                self.advance();
                self.advance();
                Ok(Lexeme::NotEqual)
            }
            '<' => {
                self.advance();
                if self.current() == Some('=') {
                    self.advance();
                    return Ok(Lexeme::LessEqual);
                }
                Ok(Lexeme::LessThan)
            }
            '>' => {
                self.advance();
                if self.current() == Some('=') {
                    self.advance();
                    return Ok(Lexeme::GreaterEqual);
                }
                Ok(Lexeme::GreaterThan)
            }
            '"' | '\'' => self.read_string(ch),
            '`' => self.read_quoted_name(),
            '$' => {
                self.advance();
                Ok(Lexeme::Variable(self.read_word()))
            }
            c if c.is_ascii_digit() => self.read_number(),
            c if is_name_start(c) => Ok(Lexeme::Name(self.read_word())),
            other => Err(self.error(format!("unexpected character '{}'", other))),
        }
    }

    fn read_string(&mut self, quote: char) -> Result<Lexeme, QueryError> {
        self.advance();
        let mut out = String::new();
        loop {
            match self.current() {
                None => return Err(self.error("unterminated string")),
                Some(c) if c == quote => {
                    self.advance();
                    return Ok(Lexeme::String(out));
                }
                Some('\\') => {
                    self.advance();
                    let escaped = match self.current() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some(c) => c,
                        None => return Err(self.error("unterminated escape")),
                    };
                    out.push(escaped);
                    self.advance();
                }
                Some(c) => {
                    out.push(c);
                    self.advance();
                }
            }
        }
    }

    fn read_quoted_name(&mut self) -> Result<Lexeme, QueryError> {
        self.advance();
        let mut out = String::new();
        loop {
            match self.current() {
                None => return Err(self.error("unterminated quoted name")),
                Some('`') => {
                    self.advance();
                    return Ok(Lexeme::Name(out));
                }
                Some(c) => {
                    out.push(c);
                    self.advance();
                }
            }
        }
    }

    fn read_number(&mut self) -> Result<Lexeme, QueryError> {
        let start = self.position;
        while self.current().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        if self.current() == Some('.') && self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            while self.current().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }
        let text: String = self.chars[start..self.position].iter().collect();
        text.parse()
            .map(Lexeme::Number)
            .map_err(|_| self.error(format!("invalid number '{}'", text)))
    }

    fn read_word(&mut self) -> String {
        let start = self.position;
        while self.current().is_some_and(is_name_char) {
            self.advance();
        }
        self.chars[start..self.position].iter().collect()
    }

    fn skip_whitespace(&mut self) {
        while self.current().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    fn current(&self) -> Option<char> {
        self.chars.get(self.position).copied()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.position + 1).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn error(&self, message: impl Into<String>) -> QueryError {
        QueryError::Syntax {
            position: self.position,
            message: message.into(),
        }
    }
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(input: &str) -> Vec<Lexeme> {
        Lexer::new(input)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|(l, _)| l)
            .collect()
    }

    #[test]
    fn test_paths_and_functions() {
        assert_eq!(
            lex("$ref('env:#HOME').a[0]"),
            vec![
                Lexeme::Variable("ref".into()),
                Lexeme::LeftParen,
                Lexeme::String("env:#HOME".into()),
                Lexeme::RightParen,
                Lexeme::Dot,
                Lexeme::Name("a".into()),
                Lexeme::LeftBracket,
                Lexeme::Number(0.0),
                Lexeme::RightBracket,
                Lexeme::Eof,
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            lex("a >= 1.5 & `user-name` != \"x\""),
            vec![
                Lexeme::Name("a".into()),
                Lexeme::GreaterEqual,
                Lexeme::Number(1.5),
                Lexeme::Ampersand,
                Lexeme::Name("user-name".into()),
                Lexeme::NotEqual,
                Lexeme::String("x".into()),
                Lexeme::Eof,
            ]
        );
    }

    #[test]
    fn test_unterminated_string() {
        assert!(Lexer::new("'abc").tokenize().is_err());
    }
}
