//! Scans an input string (ledger or manifest) character by character.

use std::path::Path;

#[derive(Debug)]
pub struct ParseError {
    pub msg: String,
    pub ofs: usize,
}
pub type ParseResult<T> = Result<T, ParseError>;

/// Cursor over a text buffer.  Reading past the end yields '\0', which
/// callers treat as end of input.
pub struct Scanner<'a> {
    buf: &'a str,
    pub ofs: usize,
    pub line: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(buf: &'a str) -> Self {
        Scanner {
            buf,
            ofs: 0,
            line: 1,
        }
    }

    pub fn slice(&self, start: usize, end: usize) -> &'a str {
        &self.buf[start..end]
    }
    pub fn at_end(&self) -> bool {
        self.ofs >= self.buf.len()
    }
    pub fn peek(&self) -> char {
        self.buf[self.ofs..].chars().next().unwrap_or('\0')
    }
    pub fn next(&mut self) {
        match self.buf[self.ofs..].chars().next() {
            None => panic!("scanned past end"),
            Some(c) => {
                if c == '\n' {
                    self.line += 1;
                }
                self.ofs += c.len_utf8();
            }
        }
    }
    pub fn read(&mut self) -> char {
        let c = self.peek();
        if c != '\0' {
            self.next();
        }
        c
    }
    pub fn skip(&mut self, ch: char) -> bool {
        if self.peek() == ch && !self.at_end() {
            self.next();
            return true;
        }
        false
    }

    pub fn skip_spaces(&mut self) {
        while self.skip(' ') {}
    }

    /// Skips a "\n" or "\r\n" line ending; also accepts end of input.
    pub fn skip_newline(&mut self) -> bool {
        self.skip('\r');
        self.skip('\n') || self.at_end()
    }

    /// Reads up to (not including) the next line ending.
    pub fn read_line(&mut self) -> &'a str {
        let start = self.ofs;
        while !self.at_end() && self.peek() != '\n' {
            self.next();
        }
        self.slice(start, self.ofs).trim_end_matches('\r')
    }

    pub fn expect(&mut self, ch: char) -> ParseResult<()> {
        let r = self.peek();
        if r != ch || self.at_end() {
            return self.parse_error(format!("expected {:?}, got {:?}", ch, r));
        }
        self.next();
        Ok(())
    }

    pub fn parse_error<T, S: Into<String>>(&self, msg: S) -> ParseResult<T> {
        Err(ParseError {
            msg: msg.into(),
            ofs: self.ofs,
        })
    }

    /// Line number (1-based) of a byte offset.
    pub fn line_of(&self, ofs: usize) -> usize {
        let ofs = ofs.min(self.buf.len());
        1 + self.buf[..ofs].matches('\n').count()
    }

    pub fn format_parse_error(&self, filename: &Path, err: &ParseError) -> String {
        let line_number = self.line_of(err.ofs);
        let line_start = self.buf[..err.ofs.min(self.buf.len())]
            .rfind('\n')
            .map(|i| i + 1)
            .unwrap_or(0);
        let line = self.buf[line_start..].lines().next().unwrap_or("");

        let prefix = format!("{}:{}: ", filename.display(), line_number);
        let mut msg = format!("parse error: {}\n{}", err.msg, prefix);
        let mut context = line;
        let mut col = err.ofs.saturating_sub(line_start);
        if col > 40 && context.is_char_boundary(col - 20) {
            // Trim beginning of line to fit it on screen.
            msg.push_str("...");
            context = &context[col - 20..];
            col = 3 + 20;
        }
        match context.char_indices().nth(40) {
            Some((end, _)) => {
                msg.push_str(&context[..end]);
                msg.push_str("...");
            }
            None => msg.push_str(context),
        }
        msg.push('\n');
        msg.push_str(&" ".repeat(prefix.len() + col));
        msg.push_str("^\n");
        msg
    }
}
