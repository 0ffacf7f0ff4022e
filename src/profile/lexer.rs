//! Tokenizer for meson cross-file values

/// A token of the value language
#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Str(String),
    Ident(String),
    Int(i64),
    LBracket,
    RBracket,
    LParen,
    RParen,
    Comma,
    Plus,
    Slash,
    Eof,
}

pub struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src: src.as_bytes(),
            pos: 0,
        }
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.src.get(self.pos).copied()?;
        self.pos += 1;
        Some(b)
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn skip_ws_and_comments(&mut self) {
        loop {
            while matches!(self.peek(), Some(b) if (b as char).is_whitespace()) {
                self.bump();
            }
            // comment runs to end of line
            if self.peek() == Some(b'#') {
                while let Some(b) = self.peek() {
                    if b == b'\n' {
                        break;
                    }
                    self.bump();
                }
                continue;
            }
            break;
        }
    }

    /// Produce the next token, or a message describing why the input is invalid
    pub fn next_tok(&mut self) -> Result<Tok, String> {
        self.skip_ws_and_comments();
        let Some(b) = self.bump() else {
            return Ok(Tok::Eof);
        };

        match b {
            b'[' => Ok(Tok::LBracket),
            b']' => Ok(Tok::RBracket),
            b'(' => Ok(Tok::LParen),
            b')' => Ok(Tok::RParen),
            b',' => Ok(Tok::Comma),
            b'+' => Ok(Tok::Plus),
            b'/' => Ok(Tok::Slash),
            b'\'' => self.string(),
            b'"' => Err("double-quoted strings are not allowed, use single quotes".to_string()),
            b if b.is_ascii_digit() || b == b'-' => self.int(b),
            b if b.is_ascii_alphabetic() || b == b'_' => Ok(self.ident(b)),
            other => Err(format!("unexpected character '{}'", other as char)),
        }
    }

    fn string(&mut self) -> Result<Tok, String> {
        let mut buf = Vec::new();
        loop {
            match self.bump() {
                None | Some(b'\n') => return Err("unterminated string literal".to_string()),
                Some(b'\'') => break,
                Some(b'\\') => match self.bump() {
                    Some(b'\'') => buf.push(b'\''),
                    Some(b'\\') => buf.push(b'\\'),
                    Some(b'n') => buf.push(b'\n'),
                    Some(b't') => buf.push(b'\t'),
                    Some(other) => {
                        // unknown escapes are kept verbatim
                        buf.push(b'\\');
                        buf.push(other);
                    }
                    None => return Err("unterminated string literal".to_string()),
                },
                Some(b) => buf.push(b),
            }
        }
        String::from_utf8(buf)
            .map(Tok::Str)
            .map_err(|e| format!("invalid utf-8 in string literal: {}", e))
    }

    fn int(&mut self, first: u8) -> Result<Tok, String> {
        let start = self.pos - 1;
        while matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
            self.bump();
        }
        let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap_or_default();
        if first == b'-' && text.len() == 1 {
            return Err("unexpected character '-'".to_string());
        }
        text.parse::<i64>()
            .map(Tok::Int)
            .map_err(|e| format!("invalid integer '{}': {}", text, e))
    }

    fn ident(&mut self, _first: u8) -> Tok {
        let start = self.pos - 1;
        while matches!(self.peek(), Some(b) if b.is_ascii_alphanumeric() || b == b'_') {
            self.bump();
        }
        Tok::Ident(String::from_utf8_lossy(&self.src[start..self.pos]).into_owned())
    }
}
