use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::path::Path;
use std::str::FromStr;

use crate::error::MdError;
use crate::error::Result;

/// A line- and token-oriented reader for the plain-text input files. It
/// tracks the file name and current line number so that every validation
/// failure can point at the offending line.
pub struct LineReader<R> {
    reader: R,
    name: String,
    line_no: usize,
    tokens: Vec<String>,
    next_token: usize,
}

impl LineReader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let name = path.as_ref().display().to_string();
        let file = File::open(path.as_ref()).map_err(|source| MdError::io(source, &name))?;
        Ok(Self::new(BufReader::new(file), name))
    }
}

impl<R: BufRead> LineReader<R> {
    pub fn new(reader: R, name: impl Into<String>) -> Self {
        Self {
            reader,
            name: name.into(),
            line_no: 0,
            tokens: Vec::new(),
            next_token: 0,
        }
    }

    fn location(&self) -> String {
        format!("\"{}\", line {}", self.name, self.line_no)
    }

    /// Advances to the next line and splits it into whitespace-separated
    /// tokens. Returns false at end of file.
    pub fn next_line(&mut self) -> Result<bool> {
        let mut line = String::new();
        let n = self
            .reader
            .read_line(&mut line)
            .map_err(|source| MdError::io(source, &self.name))?;
        if n == 0 {
            self.tokens.clear();
            self.next_token = 0;
            return Ok(false);
        }
        self.line_no += 1;
        self.tokens = line.split_whitespace().map(|t| t.to_owned()).collect();
        self.next_token = 0;
        Ok(true)
    }

    fn next_token(&mut self) -> Option<&str> {
        let token = self.tokens.get(self.next_token)?;
        self.next_token += 1;
        Some(token)
    }

    /// Consumes one token and checks that it is the expected keyword.
    pub fn keyword(&mut self, expected: &str) -> Result<()> {
        let found = self.next_token().unwrap_or("").to_owned();
        if found != expected {
            return Err(MdError::data(format!(
                "Keyword \"{}\" was expected, but \"{}\" was found at {}",
                expected,
                found,
                self.location()
            )));
        }
        Ok(())
    }

    fn parse<T: FromStr>(&mut self, what: &str, label: &str) -> Result<T> {
        let location = self.location();
        let token = self.next_token().unwrap_or("");
        token.parse().map_err(|_| {
            MdError::data(format!(
                "{} for {} was expected at {}",
                what, label, location
            ))
        })
    }

    pub fn read_f64(&mut self, label: &str) -> Result<f64> {
        self.parse("floating point value", label)
    }

    pub fn read_i32(&mut self, label: &str) -> Result<i32> {
        self.parse("integer value", label)
    }

    pub fn read_string(&mut self, label: &str) -> Result<String> {
        let location = self.location();
        match self.next_token() {
            Some(token) => Ok(token.to_owned()),
            None => Err(MdError::data(format!(
                "string for {} was expected at {}",
                label, location
            ))),
        }
    }

    fn labeled_line(&mut self, label: &str) -> Result<()> {
        if !self.next_line()? {
            return Err(MdError::data(format!(
                "Keyword \"{}\" was expected, but end of file was found at {}",
                label,
                self.location()
            )));
        }
        self.keyword(label)
    }

    pub fn labeled_string_line(&mut self, label: &str) -> Result<String> {
        self.labeled_line(label)?;
        self.read_string(label)
    }

    pub fn labeled_f64_line(&mut self, label: &str) -> Result<f64> {
        self.labeled_line(label)?;
        self.read_f64(label)
    }

    pub fn labeled_i32_line(&mut self, label: &str) -> Result<i32> {
        self.labeled_line(label)?;
        self.read_i32(label)
    }
}
