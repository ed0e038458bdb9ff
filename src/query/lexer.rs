//! SQL tokenizer
//!
//! Splits query text into words, numbers, string literals and punctuation.
//! `-- line` and `/* block */` comments are skipped. Every token records its
//! byte offset so parse errors can quote the offending fragment.

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Keyword or identifier
    Word,
    /// Backtick-quoted identifier, never a keyword
    QuotedIdent,
    Number,
    /// String literal, quotes removed and escapes resolved
    String,
    Symbol,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub offset: usize,
}

impl Token {
    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Word && self.text.eq_ignore_ascii_case(keyword)
    }

    pub fn is_symbol(&self, symbol: &str) -> bool {
        self.kind == TokenKind::Symbol && self.text == symbol
    }

    /// Word or quoted identifier
    pub fn is_identifier(&self) -> bool {
        matches!(self.kind, TokenKind::Word | TokenKind::QuotedIdent)
    }
}

const TWO_CHAR_SYMBOLS: [&str; 5] = ["<=", ">=", "!=", "<>", "||"];
const ONE_CHAR_SYMBOLS: &str = "(),.;*+-/=<>%";

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn fragment(&self, start: usize) -> String {
        self.input[start..].chars().take(24).collect()
    }

    fn skip_whitespace(&mut self) -> Result<()> {
        loop {
            let rest = self.rest();
            if let Some(c) = rest.chars().next().filter(|c| c.is_whitespace()) {
                self.pos += c.len_utf8();
            } else if rest.starts_with("--") {
                self.pos += rest.find('\n').unwrap_or(rest.len());
            } else if rest.starts_with("/*") {
                match rest.find("*/") {
                    Some(end) => self.pos += end + 2,
                    None => return Err(Error::syntax("注释未闭合", self.fragment(self.pos))),
                }
            } else {
                return Ok(());
            }
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>> {
        self.skip_whitespace()?;
        let start = self.pos;
        let c = match self.peek_char() {
            Some(c) => c,
            None => return Ok(None),
        };

        let (kind, text) = if c.is_alphabetic() || c == '_' {
            (TokenKind::Word, self.scan_word())
        } else if c.is_ascii_digit()
            || (c == '.' && self.rest()[1..].starts_with(|n: char| n.is_ascii_digit()))
        {
            (TokenKind::Number, self.scan_number())
        } else if c == '\'' || c == '"' {
            (TokenKind::String, self.scan_string(c)?)
        } else if c == '`' {
            (TokenKind::QuotedIdent, self.scan_quoted_ident()?)
        } else if let Some(sym) = TWO_CHAR_SYMBOLS.iter().find(|s| self.rest().starts_with(*s)) {
            self.pos += 2;
            (TokenKind::Symbol, sym.to_string())
        } else if ONE_CHAR_SYMBOLS.contains(c) {
            self.pos += 1;
            (TokenKind::Symbol, c.to_string())
        } else {
            return Err(Error::syntax(
                format!("无法识别的字符 '{}'", c),
                self.fragment(start),
            ));
        };

        Ok(Some(Token {
            kind,
            text,
            offset: start,
        }))
    }

    fn scan_word(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek_char() {
            if c.is_alphanumeric() || c == '_' {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        self.input[start..self.pos].to_string()
    }

    fn scan_number(&mut self) -> String {
        let start = self.pos;
        let mut seen_dot = false;
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                self.pos += 1;
            } else if c == '.' && !seen_dot {
                // `1.` followed by a letter is not a decimal point
                let after = self.rest()[1..].chars().next();
                if after.map_or(false, |a| a.is_alphabetic() || a == '_') {
                    break;
                }
                seen_dot = true;
                self.pos += 1;
            } else if c == 'e' || c == 'E' {
                let after = &self.rest()[1..];
                let exp = after.strip_prefix(['+', '-']).unwrap_or(after);
                if !exp.starts_with(|d: char| d.is_ascii_digit()) {
                    break;
                }
                self.pos += 1 + (after.len() - exp.len());
                while self.peek_char().map_or(false, |d| d.is_ascii_digit()) {
                    self.pos += 1;
                }
                break;
            } else {
                break;
            }
        }
        let mut text = self.input[start..self.pos].to_string();
        // `1.` is not a valid SPARQL number
        if text.ends_with('.') {
            text.push('0');
        }
        text
    }

    fn scan_string(&mut self, quote: char) -> Result<String> {
        let start = self.pos;
        self.pos += 1;
        let mut result = String::new();
        while let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
            if c == quote {
                // doubled quote is an escaped quote
                if self.peek_char() == Some(quote) {
                    self.pos += 1;
                    result.push(quote);
                    continue;
                }
                return Ok(result);
            } else if c == '\\' {
                if let Some(escaped) = self.peek_char() {
                    self.pos += escaped.len_utf8();
                    match escaped {
                        'n' => result.push('\n'),
                        't' => result.push('\t'),
                        'r' => result.push('\r'),
                        _ => result.push(escaped),
                    }
                }
            } else {
                result.push(c);
            }
        }
        Err(Error::syntax("字符串未闭合", self.fragment(start)))
    }

    fn scan_quoted_ident(&mut self) -> Result<String> {
        let start = self.pos;
        self.pos += 1;
        match self.rest().find('`') {
            Some(end) => {
                let ident = self.rest()[..end].to_string();
                self.pos += end + 1;
                Ok(ident)
            }
            None => Err(Error::syntax("标识符未闭合", self.fragment(start))),
        }
    }
}

/// Tokenize a full query text.
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token()? {
        tokens.push(token);
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(input: &str) -> Vec<String> {
        tokenize(input).unwrap().into_iter().map(|t| t.text).collect()
    }

    #[test]
    fn test_basic_tokens() {
        assert_eq!(
            texts("SELECT c.name FROM client c WHERE age >= 18"),
            vec!["SELECT", "c", ".", "name", "FROM", "client", "c", "WHERE", "age", ">=", "18"]
        );
    }

    #[test]
    fn test_numbers_and_member_access() {
        let tokens = tokenize("price * 1.5 + t.x - 2e3").unwrap();
        assert_eq!(tokens[2].kind, TokenKind::Number);
        assert_eq!(tokens[2].text, "1.5");
        assert_eq!(tokens[4].text, "t");
        assert_eq!(tokens[5].text, ".");
        assert_eq!(tokens[8].text, "2e3");
    }

    #[test]
    fn test_strings_and_escapes() {
        let tokens = tokenize(r#"'O''Brien' "say \"hi\"" 'a\nb'"#).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::String);
        assert_eq!(tokens[0].text, "O'Brien");
        assert_eq!(tokens[1].text, "say \"hi\"");
        assert_eq!(tokens[2].text, "a\nb");
    }

    #[test]
    fn test_comments_skipped() {
        assert_eq!(
            texts("SELECT name -- trailing\nFROM /* block */ client"),
            vec!["SELECT", "name", "FROM", "client"]
        );
    }

    #[test]
    fn test_unclosed_comment_is_error() {
        match tokenize("SELECT a FROM t /* oops") {
            Err(Error::Syntax { fragment, .. }) => assert_eq!(fragment, "/* oops"),
            other => panic!("Expected Syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_trailing_dot_number_normalized() {
        let tokens = tokenize("a = 1. AND b = 2.5").unwrap();
        assert_eq!(tokens[2].kind, TokenKind::Number);
        assert_eq!(tokens[2].text, "1.0");
        assert_eq!(tokens[6].text, "2.5");
    }

    #[test]
    fn test_quoted_identifier_is_not_keyword() {
        let tokens = tokenize("SELECT `order` FROM t").unwrap();
        assert_eq!(tokens[1].kind, TokenKind::QuotedIdent);
        assert!(!tokens[1].is_keyword("order"));
    }

    #[test]
    fn test_unclosed_string_reports_fragment() {
        match tokenize("SELECT 'abc") {
            Err(Error::Syntax { fragment, .. }) => assert_eq!(fragment, "'abc"),
            other => panic!("Expected syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_offsets() {
        let tokens = tokenize("a  <> 'x'").unwrap();
        assert_eq!(tokens[1].offset, 3);
        assert_eq!(tokens[1].text, "<>");
        assert_eq!(tokens[2].offset, 6);
    }
}
