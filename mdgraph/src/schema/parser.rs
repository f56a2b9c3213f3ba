use super::ast::{
    ConstValue, Definition, Directive, Document, EnumValue, FieldDefinition, SchemaDefinition,
    TypeDefinition, TypeKind, TypeRef,
};
use crate::error::{MdGraphError, Result};
use indexmap::IndexMap;
use std::path::Path;

/// A parsed SDL document plus the byte offset of the closing brace of every
/// braced type body, keyed by type name.
#[derive(Debug, Clone)]
pub struct ParsedTypeDefs {
    pub document: Document,
    pub body_ends: IndexMap<String, usize>,
}

/// Parse an SDL file.
pub fn parse_type_defs(path: &Path) -> Result<ParsedTypeDefs> {
    let content = std::fs::read_to_string(path)?;
    parse_type_defs_str(&content)
}

/// Parse SDL source text.
pub fn parse_type_defs_str(source: &str) -> Result<ParsedTypeDefs> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
        body_ends: IndexMap::new(),
    };
    let document = parser.parse_document()?;
    Ok(ParsedTypeDefs {
        document,
        body_ends: parser.body_ends,
    })
}

// ── Lexer ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Name(String),
    Punct(char),
    Str(String),
    Int(i64),
    Float(f64),
    Spread,
    Eof,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Name(name) => format!("name '{name}'"),
            Token::Punct(c) => format!("'{c}'"),
            Token::Str(_) => "string".to_string(),
            Token::Int(n) => format!("number {n}"),
            Token::Float(n) => format!("number {n}"),
            Token::Spread => "'...'".to_string(),
            Token::Eof => "end of input".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct Lexed {
    token: Token,
    start: usize,
}

struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

fn line_of(source: &str, offset: usize) -> usize {
    source[..offset.min(source.len())].matches('\n').count() + 1
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Lexer {
            source,
            bytes: source.as_bytes(),
            pos: 0,
        }
    }

    fn error(&self, offset: usize, message: &str) -> MdGraphError {
        MdGraphError::Schema(format!(
            "{message} at line {}",
            line_of(self.source, offset)
        ))
    }

    fn tokenize(mut self) -> Result<Vec<Lexed>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_ignored();
            let start = self.pos;
            let Some(&b) = self.bytes.get(self.pos) else {
                tokens.push(Lexed {
                    token: Token::Eof,
                    start,
                });
                return Ok(tokens);
            };
            let token = match b {
                b'!' | b'$' | b'&' | b'(' | b')' | b':' | b'=' | b'@' | b'[' | b']' | b'{'
                | b'|' | b'}' => {
                    self.pos += 1;
                    Token::Punct(b as char)
                }
                b'.' => {
                    if self.source[self.pos..].starts_with("...") {
                        self.pos += 3;
                        Token::Spread
                    } else {
                        return Err(self.error(start, "Unexpected '.'"));
                    }
                }
                b'"' => self.lex_string()?,
                b'-' | b'0'..=b'9' => self.lex_number()?,
                b'_' | b'a'..=b'z' | b'A'..=b'Z' => {
                    while let Some(&c) = self.bytes.get(self.pos) {
                        if c == b'_' || c.is_ascii_alphanumeric() {
                            self.pos += 1;
                        } else {
                            break;
                        }
                    }
                    Token::Name(self.source[start..self.pos].to_string())
                }
                _ => {
                    let c = self.source[start..].chars().next().unwrap_or('?');
                    return Err(self.error(start, &format!("Unexpected character '{c}'")));
                }
            };
            tokens.push(Lexed { token, start });
        }
    }

    fn skip_ignored(&mut self) {
        while let Some(&b) = self.bytes.get(self.pos) {
            match b {
                b' ' | b'\t' | b'\n' | b'\r' | b',' => self.pos += 1,
                b'#' => {
                    while let Some(&c) = self.bytes.get(self.pos) {
                        if c == b'\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                0xEF if self.source[self.pos..].starts_with('\u{feff}') => {
                    self.pos += '\u{feff}'.len_utf8();
                }
                _ => return,
            }
        }
    }

    fn lex_number(&mut self) -> Result<Token> {
        let start = self.pos;
        if self.bytes[self.pos] == b'-' {
            self.pos += 1;
        }
        let digits_start = self.pos;
        self.eat_digits();
        if self.pos == digits_start {
            return Err(self.error(start, "Invalid number"));
        }
        let mut is_float = false;
        if self.bytes.get(self.pos) == Some(&b'.') {
            is_float = true;
            self.pos += 1;
            self.eat_digits();
        }
        if matches!(self.bytes.get(self.pos), Some(b'e') | Some(b'E')) {
            is_float = true;
            self.pos += 1;
            if matches!(self.bytes.get(self.pos), Some(b'+') | Some(b'-')) {
                self.pos += 1;
            }
            self.eat_digits();
        }
        let text = &self.source[start..self.pos];
        if is_float {
            text.parse::<f64>()
                .map(Token::Float)
                .map_err(|_| self.error(start, &format!("Invalid number '{text}'")))
        } else {
            text.parse::<i64>()
                .map(Token::Int)
                .map_err(|_| self.error(start, &format!("Invalid number '{text}'")))
        }
    }

    fn eat_digits(&mut self) {
        while matches!(self.bytes.get(self.pos), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
    }

    fn lex_string(&mut self) -> Result<Token> {
        let start = self.pos;
        if self.source[self.pos..].starts_with("\"\"\"") {
            self.pos += 3;
            let mut raw = String::new();
            loop {
                let rest = &self.source[self.pos..];
                if rest.starts_with("\\\"\"\"") {
                    raw.push_str("\"\"\"");
                    self.pos += 4;
                } else if rest.starts_with("\"\"\"") {
                    self.pos += 3;
                    return Ok(Token::Str(block_string_value(&raw)));
                } else if let Some(c) = rest.chars().next() {
                    raw.push(c);
                    self.pos += c.len_utf8();
                } else {
                    return Err(self.error(start, "Unterminated block string"));
                }
            }
        }

        self.pos += 1;
        let mut value = String::new();
        loop {
            let Some(c) = self.source[self.pos..].chars().next() else {
                return Err(self.error(start, "Unterminated string"));
            };
            self.pos += c.len_utf8();
            match c {
                '"' => return Ok(Token::Str(value)),
                '\n' => return Err(self.error(start, "Unterminated string")),
                '\\' => {
                    let Some(escaped) = self.source[self.pos..].chars().next() else {
                        return Err(self.error(start, "Unterminated string"));
                    };
                    self.pos += escaped.len_utf8();
                    match escaped {
                        '"' => value.push('"'),
                        '\\' => value.push('\\'),
                        '/' => value.push('/'),
                        'b' => value.push('\u{8}'),
                        'f' => value.push('\u{c}'),
                        'n' => value.push('\n'),
                        'r' => value.push('\r'),
                        't' => value.push('\t'),
                        'u' => {
                            let hex = self.source.get(self.pos..self.pos + 4).unwrap_or("");
                            let decoded = u32::from_str_radix(hex, 16)
                                .ok()
                                .and_then(char::from_u32)
                                .ok_or_else(|| self.error(start, "Invalid unicode escape"))?;
                            value.push(decoded);
                            self.pos += 4;
                        }
                        other => {
                            return Err(
                                self.error(start, &format!("Invalid escape '\\{other}'"))
                            )
                        }
                    }
                }
                c => value.push(c),
            }
        }
    }
}

/// Block string value: common indentation removed, blank leading and
/// trailing lines dropped.
fn block_string_value(raw: &str) -> String {
    let lines: Vec<&str> = raw.lines().collect();
    let common_indent = lines
        .iter()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut out: Vec<String> = lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            if i == 0 {
                line.to_string()
            } else {
                line.get(common_indent..).unwrap_or("").to_string()
            }
        })
        .collect();

    while out.first().map(|l| l.trim().is_empty()).unwrap_or(false) {
        out.remove(0);
    }
    while out.last().map(|l| l.trim().is_empty()).unwrap_or(false) {
        out.pop();
    }
    out.join("\n")
}

// ── Parser ──────────────────────────────────────────────────────

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Lexed>,
    pos: usize,
    body_ends: IndexMap<String, usize>,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos].token
    }

    fn offset(&self) -> usize {
        self.tokens[self.pos].start
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].token.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn unexpected(&self) -> MdGraphError {
        MdGraphError::Schema(format!(
            "Unexpected {} at line {}",
            self.peek().describe(),
            line_of(self.source, self.offset())
        ))
    }

    fn is_punct(&self, c: char) -> bool {
        *self.peek() == Token::Punct(c)
    }

    fn eat_punct(&mut self, c: char) -> bool {
        if self.is_punct(c) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, c: char) -> Result<()> {
        if self.eat_punct(c) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn expect_name(&mut self) -> Result<String> {
        match self.peek() {
            Token::Name(_) => match self.advance() {
                Token::Name(name) => Ok(name),
                _ => unreachable!(),
            },
            _ => Err(self.unexpected()),
        }
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Token::Name(name) if name == keyword)
    }

    fn description(&mut self) -> Option<String> {
        if let Token::Str(_) = self.peek() {
            if let Token::Str(text) = self.advance() {
                return Some(text);
            }
        }
        None
    }

    fn parse_document(&mut self) -> Result<Document> {
        let mut definitions = Vec::new();
        while *self.peek() != Token::Eof {
            definitions.push(self.parse_definition()?);
        }
        Ok(Document { definitions })
    }

    fn parse_definition(&mut self) -> Result<Definition> {
        let description = self.description();
        let keyword = match self.peek() {
            Token::Name(name) => name.clone(),
            _ => return Err(self.unexpected()),
        };
        let kind = match keyword.as_str() {
            "schema" => {
                self.advance();
                return self.parse_schema_definition().map(Definition::Schema);
            }
            "type" => TypeKind::Object,
            "interface" => TypeKind::Interface,
            "input" => TypeKind::Input,
            "enum" => TypeKind::Enum,
            "scalar" => TypeKind::Scalar,
            "union" => TypeKind::Union,
            _ => return Err(self.unexpected()),
        };
        self.advance();

        let mut def = TypeDefinition::new(kind, self.expect_name()?);
        def.description = description;

        if matches!(kind, TypeKind::Object | TypeKind::Interface) && self.is_keyword("implements")
        {
            self.advance();
            self.eat_punct('&');
            def.interfaces.push(self.expect_name()?);
            while self.eat_punct('&') || matches!(self.peek(), Token::Name(_)) {
                if self.is_punct('{') {
                    break;
                }
                def.interfaces.push(self.expect_name()?);
            }
        }
        def.directives = self.parse_directives()?;

        match kind {
            TypeKind::Scalar => {}
            TypeKind::Union => {
                if self.eat_punct('=') {
                    self.eat_punct('|');
                    def.members.push(self.expect_name()?);
                    while self.eat_punct('|') {
                        def.members.push(self.expect_name()?);
                    }
                }
            }
            TypeKind::Enum => {
                if self.eat_punct('{') {
                    while !self.is_punct('}') {
                        let description = self.description();
                        let name = self.expect_name()?;
                        let directives = self.parse_directives()?;
                        def.values.push(EnumValue {
                            description,
                            name,
                            directives,
                        });
                    }
                    self.close_body(&def.name)?;
                }
            }
            TypeKind::Object | TypeKind::Interface | TypeKind::Input => {
                if self.eat_punct('{') {
                    while !self.is_punct('}') {
                        def.fields.push(self.parse_field(kind == TypeKind::Input)?);
                    }
                    self.close_body(&def.name)?;
                }
            }
        }

        Ok(Definition::Type(def))
    }

    /// Consume the closing brace of a type body and remember where it was.
    fn close_body(&mut self, type_name: &str) -> Result<()> {
        let offset = self.offset();
        self.expect_punct('}')?;
        if self.body_ends.insert(type_name.to_string(), offset).is_some() {
            return Err(MdGraphError::Schema(format!(
                "Type '{type_name}' is defined more than once"
            )));
        }
        Ok(())
    }

    fn parse_schema_definition(&mut self) -> Result<SchemaDefinition> {
        let directives = self.parse_directives()?;
        self.expect_punct('{')?;
        let mut operations = Vec::new();
        while !self.eat_punct('}') {
            let operation = self.expect_name()?;
            self.expect_punct(':')?;
            operations.push((operation, self.expect_name()?));
        }
        Ok(SchemaDefinition {
            directives,
            operations,
        })
    }

    fn parse_field(&mut self, is_input: bool) -> Result<FieldDefinition> {
        let description = self.description();
        let name = self.expect_name()?;
        let mut arguments = Vec::new();
        if !is_input && self.eat_punct('(') {
            while !self.eat_punct(')') {
                arguments.push(self.parse_field(true)?);
            }
        }
        self.expect_punct(':')?;
        let ty = self.parse_type_ref()?;
        let default_value = if is_input && self.eat_punct('=') {
            Some(self.parse_value()?)
        } else {
            None
        };
        let directives = self.parse_directives()?;
        Ok(FieldDefinition {
            description,
            name,
            arguments,
            ty,
            default_value,
            directives,
        })
    }

    fn parse_type_ref(&mut self) -> Result<TypeRef> {
        let ty = if self.eat_punct('[') {
            let inner = self.parse_type_ref()?;
            self.expect_punct(']')?;
            TypeRef::list_of(inner)
        } else {
            TypeRef::Named(self.expect_name()?)
        };
        if self.eat_punct('!') {
            Ok(TypeRef::non_null(ty))
        } else {
            Ok(ty)
        }
    }

    fn parse_directives(&mut self) -> Result<Vec<Directive>> {
        let mut directives = Vec::new();
        while self.eat_punct('@') {
            let name = self.expect_name()?;
            let mut arguments = Vec::new();
            if self.eat_punct('(') {
                while !self.eat_punct(')') {
                    let arg = self.expect_name()?;
                    self.expect_punct(':')?;
                    arguments.push((arg, self.parse_value()?));
                }
            }
            directives.push(Directive { name, arguments });
        }
        Ok(directives)
    }

    fn parse_value(&mut self) -> Result<ConstValue> {
        match self.peek().clone() {
            Token::Int(n) => {
                self.advance();
                Ok(ConstValue::Int(n))
            }
            Token::Float(n) => {
                self.advance();
                Ok(ConstValue::Float(n))
            }
            Token::Str(s) => {
                self.advance();
                Ok(ConstValue::String(s))
            }
            Token::Name(name) => {
                self.advance();
                Ok(match name.as_str() {
                    "true" => ConstValue::Boolean(true),
                    "false" => ConstValue::Boolean(false),
                    "null" => ConstValue::Null,
                    _ => ConstValue::Enum(name),
                })
            }
            Token::Punct('[') => {
                self.advance();
                let mut items = Vec::new();
                while !self.eat_punct(']') {
                    items.push(self.parse_value()?);
                }
                Ok(ConstValue::List(items))
            }
            Token::Punct('{') => {
                self.advance();
                let mut entries = Vec::new();
                while !self.eat_punct('}') {
                    let key = self.expect_name()?;
                    self.expect_punct(':')?;
                    entries.push((key, self.parse_value()?));
                }
                Ok(ConstValue::Object(entries))
            }
            _ => Err(self.unexpected()),
        }
    }
}
