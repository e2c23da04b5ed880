//! FILENAME: core/parser/src/lexer.rs
//! PURPOSE: Scans a raw expression string and produces a stream of Tokens.
//! CONTEXT: This is the first stage of the parsing pipeline. It handles
//! whitespace skipping, number parsing, string literals, bracketed column
//! aliases, keywords, and multi-character operators like <= and &&.
//!
//! SUPPORTED OPERATORS:
//! - Single char: + - * / ^ & ( ) , = < > ! @
//! - Multi char: <= >= <> == != && ||
//! - Keywords (case-insensitive): TRUE FALSE AND OR NOT
//! - Strings: "double" or 'single' quoted, doubled quote or backslash escapes
//! - Bracketed aliases: [First Name], with ]] as an escaped bracket

use crate::token::Token;
use std::iter::Peekable;
use std::str::Chars;

pub struct Lexer<'a> {
    input: Peekable<Chars<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer {
            input: input.chars().peekable(),
        }
    }

    /// Advances the lexer and returns the next token.
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        match self.input.next() {
            Some('+') => Token::Plus,
            Some('-') => Token::Minus,
            Some('*') => Token::Asterisk,
            Some('/') => Token::Slash,
            Some('^') => Token::Caret,
            Some('(') => Token::LParen,
            Some(')') => Token::RParen,
            Some(',') => Token::Comma,
            Some('@') => Token::At,

            // & is concatenation, && is a boolean AND
            Some('&') => self.read_ampersand_operator(),

            // || is a boolean OR; a lone pipe is not part of the grammar
            Some('|') => self.read_pipe_operator(),

            // = and ==
            Some('=') => self.read_equals_operator(),

            // ! and !=
            Some('!') => self.read_bang_operator(),

            // Handle < and potentially <= or <>
            Some('<') => self.read_less_than_operator(),

            // Handle > and potentially >=
            Some('>') => self.read_greater_than_operator(),

            Some(quote @ ('"' | '\'')) => self.read_string(quote),

            Some('[') => self.read_bracket_identifier(),

            // Handle Numbers (starts with digit or dot)
            Some(ch) if ch.is_ascii_digit() || ch == '.' => self.read_number(ch),

            // Handle Identifiers (starts with letter)
            Some(ch) if is_letter(ch) => self.read_identifier(ch),

            // End of input
            None => Token::EOF,

            // Unknown character
            Some(ch) => Token::Illegal(ch),
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(&ch) = self.input.peek() {
            if !ch.is_whitespace() {
                break;
            }
            self.input.next();
        }
    }

    fn read_ampersand_operator(&mut self) -> Token {
        if self.input.peek() == Some(&'&') {
            self.input.next();
            Token::And
        } else {
            Token::Ampersand
        }
    }

    fn read_pipe_operator(&mut self) -> Token {
        if self.input.peek() == Some(&'|') {
            self.input.next();
            Token::Or
        } else {
            Token::Illegal('|')
        }
    }

    fn read_equals_operator(&mut self) -> Token {
        if self.input.peek() == Some(&'=') {
            self.input.next();
        }
        Token::Equals
    }

    fn read_bang_operator(&mut self) -> Token {
        if self.input.peek() == Some(&'=') {
            self.input.next();
            Token::NotEqual
        } else {
            Token::Not
        }
    }

    /// Handles operators starting with '<': <, <=, <>
    fn read_less_than_operator(&mut self) -> Token {
        match self.input.peek() {
            Some('=') => {
                self.input.next();
                Token::LessEqual
            }
            Some('>') => {
                self.input.next();
                Token::NotEqual
            }
            _ => Token::LessThan,
        }
    }

    /// Handles operators starting with '>': >, >=
    fn read_greater_than_operator(&mut self) -> Token {
        match self.input.peek() {
            Some('=') => {
                self.input.next();
                Token::GreaterEqual
            }
            _ => Token::GreaterThan,
        }
    }

    /// Reads a string literal delimited by `quote`.
    /// A doubled quote or a backslash escapes the next character.
    fn read_string(&mut self, quote: char) -> Token {
        let mut result = String::new();
        while let Some(ch) = self.input.next() {
            if ch == '\\' {
                match self.input.next() {
                    Some('n') => result.push('\n'),
                    Some('t') => result.push('\t'),
                    Some(escaped) => result.push(escaped),
                    None => break,
                }
            } else if ch == quote {
                if self.input.peek() == Some(&quote) {
                    result.push(quote);
                    self.input.next();
                } else {
                    return Token::String(result);
                }
            } else {
                result.push(ch);
            }
        }
        // If we hit EOF without closing quote, return what we have.
        Token::String(result)
    }

    /// Reads a bracketed column alias: [Unit Price]
    fn read_bracket_identifier(&mut self) -> Token {
        let mut result = String::new();
        while let Some(ch) = self.input.next() {
            if ch == ']' {
                if self.input.peek() == Some(&']') {
                    result.push(']');
                    self.input.next();
                } else {
                    return Token::BracketIdentifier(result);
                }
            } else {
                result.push(ch);
            }
        }
        // Unterminated bracket: an alias cannot end the input
        Token::Illegal('[')
    }

    fn read_number(&mut self, first_char: char) -> Token {
        let mut number_str = String::from(first_char);
        let mut has_dot = first_char == '.';

        while let Some(&ch) = self.input.peek() {
            if ch.is_ascii_digit() {
                number_str.push(ch);
                self.input.next();
            } else if ch == '.' && !has_dot {
                has_dot = true;
                number_str.push(ch);
                self.input.next();
            } else {
                break;
            }
        }

        if let Ok(n) = number_str.parse::<f64>() {
            Token::Number(n)
        } else {
            // Fallback if parsing fails (e.g. just ".")
            Token::Illegal(first_char)
        }
    }

    fn read_identifier(&mut self, first_char: char) -> Token {
        let mut ident = String::from(first_char);

        while let Some(&ch) = self.input.peek() {
            if is_letter(ch) || ch.is_ascii_digit() {
                ident.push(ch);
                self.input.next();
            } else {
                break;
            }
        }

        // Keywords are case-insensitive; aliases keep their case.
        match ident.to_uppercase().as_str() {
            "TRUE" => Token::Boolean(true),
            "FALSE" => Token::Boolean(false),
            "AND" => Token::And,
            "OR" => Token::Or,
            "NOT" => Token::Not,
            _ => Token::Identifier(ident),
        }
    }
}

/// Returns true if `ch` can start an identifier.
/// Column aliases may use any alphabetic character and underscore.
fn is_letter(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_'
}
