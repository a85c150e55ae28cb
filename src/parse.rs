//! Parser for drakefile manifests.
//!
//! ```text
//! # comment
//! build out.o: in.c
//!   command = cc -c $in -o $out
//!   scan = includes
//! default out.o
//! include lib
//! ```

use crate::scanner::{ParseError, ParseResult, Scanner};
use std::path::Path;

#[derive(Debug, PartialEq)]
pub struct Build<'a> {
    /// Line number of the `build` keyword.
    pub line: usize,
    pub outs: Vec<&'a str>,
    pub ins: Vec<&'a str>,
    pub vars: Vec<(&'a str, &'a str)>,
}

#[derive(Debug, PartialEq)]
pub enum Statement<'a> {
    Build(Build<'a>),
    Default(Vec<&'a str>),
    /// A subdirectory whose drakefile is read with paths relative to it.
    Include(&'a str),
}

pub struct Parser<'a> {
    scanner: Scanner<'a>,
}

impl<'a> Parser<'a> {
    pub fn new(buf: &'a str) -> Parser<'a> {
        Parser {
            scanner: Scanner::new(buf),
        }
    }

    pub fn format_parse_error(&self, filename: &Path, err: &ParseError) -> String {
        self.scanner.format_parse_error(filename, err)
    }

    /// Reads the next statement, or None at end of input.
    pub fn read(&mut self) -> ParseResult<Option<Statement<'a>>> {
        loop {
            if self.scanner.at_end() {
                return Ok(None);
            }
            match self.scanner.peek() {
                '#' => {
                    self.scanner.read_line();
                    self.scanner.skip_newline();
                }
                '\r' | '\n' => {
                    self.scanner.skip_newline();
                }
                ' ' => {
                    self.scanner.skip_spaces();
                    if !self.scanner.skip_newline() {
                        return self.scanner.parse_error("unexpected indent");
                    }
                }
                _ => {
                    let ident = self.read_ident();
                    return match ident {
                        "build" => Ok(Some(Statement::Build(self.read_build()?))),
                        "default" => Ok(Some(Statement::Default(self.read_default()?))),
                        "include" => Ok(Some(Statement::Include(self.read_include()?))),
                        "" => self.scanner.parse_error("expected statement"),
                        _ => self
                            .scanner
                            .parse_error(format!("unexpected statement {:?}", ident)),
                    };
                }
            }
        }
    }

    fn read_ident(&mut self) -> &'a str {
        let start = self.scanner.ofs;
        while matches!(self.scanner.peek(), 'a'..='z' | 'A'..='Z' | '0'..='9' | '_') {
            self.scanner.next();
        }
        self.scanner.slice(start, self.scanner.ofs)
    }

    fn read_path(&mut self) -> Option<&'a str> {
        self.scanner.skip_spaces();
        let start = self.scanner.ofs;
        while !matches!(self.scanner.peek(), '\0' | ' ' | ':' | '\r' | '\n') {
            self.scanner.next();
        }
        let end = self.scanner.ofs;
        if end == start {
            return None;
        }
        Some(self.scanner.slice(start, end))
    }

    fn expect_newline(&mut self) -> ParseResult<()> {
        self.scanner.skip_spaces();
        if !self.scanner.skip_newline() {
            return self.scanner.parse_error("expected newline");
        }
        Ok(())
    }

    fn read_paths(&mut self) -> Vec<&'a str> {
        let mut paths = Vec::new();
        while let Some(path) = self.read_path() {
            paths.push(path);
        }
        paths
    }

    fn read_build(&mut self) -> ParseResult<Build<'a>> {
        let line = self.scanner.line;
        let outs = self.read_paths();
        if outs.is_empty() {
            return self.scanner.parse_error("expected output path");
        }
        self.scanner.skip_spaces();
        self.scanner.expect(':')?;
        let ins = self.read_paths();
        self.expect_newline()?;

        let mut vars = Vec::new();
        while self.scanner.peek() == ' ' {
            self.scanner.skip_spaces();
            if self.scanner.skip_newline() {
                continue;
            }
            let key = self.read_ident();
            if key.is_empty() {
                return self.scanner.parse_error("expected variable name");
            }
            self.scanner.skip_spaces();
            self.scanner.expect('=')?;
            self.scanner.skip_spaces();
            let value = self.scanner.read_line().trim_end();
            self.scanner.skip_newline();
            vars.push((key, value));
        }

        Ok(Build {
            line,
            outs,
            ins,
            vars,
        })
    }

    fn read_include(&mut self) -> ParseResult<&'a str> {
        let dir = match self.read_path() {
            Some(dir) => dir,
            None => return self.scanner.parse_error("expected directory"),
        };
        self.expect_newline()?;
        Ok(dir)
    }

    fn read_default(&mut self) -> ParseResult<Vec<&'a str>> {
        let paths = self.read_paths();
        if paths.is_empty() {
            return self.scanner.parse_error("expected path");
        }
        self.expect_newline()?;
        Ok(paths)
    }
}
