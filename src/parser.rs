//! The lenient recursive-descent parser: text in, document tree out, no
//! errors. Malformed or unterminated containers collapse to
//! [`JsonValue::Null`]; callers null-check instead of handling failures.

use crate::lexer::{Scanner, Token};
use crate::value::{JsonArray, JsonObject, JsonValue};

/// Parses JSON text into a document tree.
///
/// Never fails. A malformed token sequence yields [`JsonValue::Null`] for
/// the affected container (and thus possibly for the whole document), and
/// mangled literals degrade silently: an unterminated string truncates, an
/// unparseable number becomes zero.
#[must_use]
pub fn parse(text: &str) -> JsonValue {
    // The scanner is owned by this call and released on every exit path
    // when the parser drops.
    Parser {
        scanner: Scanner::new(text),
    }
    .parse_value()
}

struct Parser<'a> {
    scanner: Scanner<'a>,
}

impl Parser<'_> {
    fn parse_value(&mut self) -> JsonValue {
        let token = self.scanner.next_token();
        self.parse_by_token(token)
    }

    fn parse_by_token(&mut self, token: Token) -> JsonValue {
        match token {
            Token::String => JsonValue::Text(self.parse_string()),
            Token::Number => self.parse_number(),
            Token::ObjectOpen => self.parse_object(),
            Token::ArrayOpen => self.parse_array(),
            Token::True => JsonValue::Bool(true),
            Token::False => JsonValue::Bool(false),
            _ => JsonValue::Null,
        }
    }

    /// Object ::= "{" { "," | STRING ":" Value } "}"
    ///
    /// Commas are treated as "skip", which tolerates leading and doubled
    /// commas as a side effect; the quirk is kept. Anything that is not a
    /// string key, or a key without its colon, aborts the whole object to
    /// null.
    fn parse_object(&mut self) -> JsonValue {
        let object = JsonObject::new();
        // Opening brace was classified, not consumed.
        self.scanner.advance();
        loop {
            match self.scanner.next_token() {
                Token::None => return JsonValue::Null,
                Token::Comma => continue,
                Token::ObjectClose => return JsonValue::Object(object),
                Token::String => {
                    let key = self.parse_string();
                    if self.scanner.next_token() != Token::Colon {
                        return JsonValue::Null;
                    }
                    // The colon was classified, not consumed.
                    self.scanner.advance();
                    object.set(&key, self.parse_value());
                }
                _ => return JsonValue::Null,
            }
        }
    }

    /// Array ::= "[" { "," | Value } "]"
    fn parse_array(&mut self) -> JsonValue {
        let array = JsonArray::new();
        self.scanner.advance();
        loop {
            let token = self.scanner.next_token();
            match token {
                Token::None => return JsonValue::Null,
                Token::Comma => continue,
                Token::ArrayClose => return JsonValue::Array(array),
                _ => array.push(self.parse_by_token(token)),
            }
        }
    }

    /// Reads a string literal after its opening quote, translating the
    /// escape set. Text accumulates as UTF-16 code units so `\uXXXX`
    /// surrogate pairs recombine; a lone surrogate degrades to U+FFFD.
    /// End of input or a malformed `\u` escape truncates silently.
    fn parse_string(&mut self) -> String {
        let mut units: Vec<u16> = Vec::new();
        // Opening quote.
        self.scanner.advance();
        'scan: loop {
            let Some(c) = self.scanner.advance() else {
                break;
            };
            match c {
                '"' => break,
                '\\' => {
                    let Some(escape) = self.scanner.advance() else {
                        break;
                    };
                    match escape {
                        '"' | '\\' | '/' => units.push(escape as u16),
                        'b' => units.push(0x08),
                        'f' => units.push(0x0c),
                        'n' => units.push(u16::from(b'\n')),
                        'r' => units.push(u16::from(b'\r')),
                        't' => units.push(u16::from(b'\t')),
                        'u' => {
                            let mut code: u16 = 0;
                            for _ in 0..4 {
                                let digit =
                                    self.scanner.advance().and_then(|h| h.to_digit(16));
                                let Some(digit) = digit else {
                                    break 'scan;
                                };
                                code = (code << 4) | digit as u16;
                            }
                            units.push(code);
                        }
                        // Unrecognized escapes are dropped.
                        _ => {}
                    }
                }
                c => {
                    let mut buffer = [0u16; 2];
                    units.extend_from_slice(c.encode_utf16(&mut buffer));
                }
            }
        }
        String::from_utf16_lossy(&units)
    }

    /// Reads the maximal non-breaking run: a decimal point selects float
    /// parsing, otherwise integer. Failed parses silently yield zero.
    fn parse_number(&mut self) -> JsonValue {
        let word = self.scanner.next_word();
        if word.contains('.') {
            JsonValue::Float(word.parse().unwrap_or(0.0))
        } else {
            JsonValue::Int(word.parse().unwrap_or(0))
        }
    }
}
