//! Minimal single-file proto3 parser.
//!
//! Produces a standard `FileDescriptorProto` for the subset of the language
//! needed to describe unary RPC services: packages, messages (including
//! nesting, `repeated`, `map` and `oneof` fields), enums and services.
//! `import` statements are not supported and fail the parse.

use prost_types::{
    field_descriptor_proto, DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto,
    FieldDescriptorProto, FileDescriptorProto, MessageOptions, MethodDescriptorProto,
    ServiceDescriptorProto,
};

use crate::error::BridgeError;

/// File name given to the parsed descriptor (the real origin is tracked on
/// the `RawSchema`).
pub const SYNTHETIC_FILE_NAME: &str = "schema.proto";

/// Parse proto3 source text into a `FileDescriptorProto`.
pub fn parse_proto(source: &str) -> Result<FileDescriptorProto, BridgeError> {
    let tokens = tokenize(source);
    let mut parser = Parser { tokens, pos: 0 };
    let file = parser.parse_file()?;
    Ok(resolve_types(file))
}

// ===== Tokenizer =====

fn tokenize(source: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();
    let mut current = String::new();

    let flush = |current: &mut String, tokens: &mut Vec<String>| {
        if !current.is_empty() {
            tokens.push(std::mem::take(current));
        }
    };

    while let Some(ch) = chars.next() {
        match ch {
            '/' if chars.peek() == Some(&'/') => {
                flush(&mut current, &mut tokens);
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                flush(&mut current, &mut tokens);
                chars.next();
                let mut prev = ' ';
                for c in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
            }
            '"' | '\'' => {
                flush(&mut current, &mut tokens);
                let quote = ch;
                let mut literal = String::new();
                for c in chars.by_ref() {
                    if c == quote {
                        break;
                    }
                    literal.push(c);
                }
                tokens.push(literal);
            }
            '{' | '}' | ';' | '=' | '(' | ')' | '<' | '>' | ',' | '[' | ']' => {
                flush(&mut current, &mut tokens);
                tokens.push(ch.to_string());
            }
            c if c.is_whitespace() => flush(&mut current, &mut tokens),
            c => current.push(c),
        }
    }
    flush(&mut current, &mut tokens);
    tokens
}

// ===== Parser =====

struct Parser {
    tokens: Vec<String>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&str> {
        self.tokens.get(self.pos).map(String::as_str)
    }

    fn next(&mut self) -> Result<String, BridgeError> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| BridgeError::Fetch("unexpected end of .proto input".to_string()))?;
        self.pos += 1;
        Ok(token)
    }

    fn expect(&mut self, expected: &str) -> Result<(), BridgeError> {
        let token = self.next()?;
        if token != expected {
            return Err(BridgeError::Fetch(format!(
                "expected '{}' in .proto file, found '{}'",
                expected, token
            )));
        }
        Ok(())
    }

    fn skip_statement(&mut self) -> Result<(), BridgeError> {
        // Consume tokens up to and including the next ';', balancing braces.
        let mut depth = 0usize;
        loop {
            let token = self.next()?;
            match token.as_str() {
                "{" => depth += 1,
                "}" => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return Ok(());
                    }
                }
                ";" if depth == 0 => return Ok(()),
                _ => {}
            }
        }
    }

    fn parse_file(&mut self) -> Result<FileDescriptorProto, BridgeError> {
        let mut file = FileDescriptorProto {
            name: Some(SYNTHETIC_FILE_NAME.to_string()),
            syntax: Some("proto3".to_string()),
            ..Default::default()
        };

        loop {
            let Some(token) = self.peek().map(str::to_string) else {
                break;
            };
            match token.as_str() {
                "syntax" => {
                    self.next()?;
                    self.expect("=")?;
                    let syntax = self.next()?;
                    self.expect(";")?;
                    if syntax != "proto3" {
                        return Err(BridgeError::Fetch(format!(
                            "unsupported proto syntax '{}', only proto3 is supported",
                            syntax
                        )));
                    }
                }
                "package" => {
                    self.next()?;
                    file.package = Some(self.next()?);
                    self.expect(";")?;
                }
                "import" => {
                    return Err(BridgeError::Fetch(
                        "proto imports are not supported in single-file mode".to_string(),
                    ));
                }
                "option" => {
                    self.next()?;
                    self.skip_statement()?;
                }
                "message" => {
                    self.next()?;
                    let message = self.parse_message()?;
                    file.message_type.push(message);
                }
                "enum" => {
                    self.next()?;
                    file.enum_type.push(self.parse_enum()?);
                }
                "service" => {
                    self.next()?;
                    file.service.push(self.parse_service()?);
                }
                ";" => {
                    self.next()?;
                }
                other => {
                    return Err(BridgeError::Fetch(format!(
                        "unexpected token '{}' at top level of .proto file",
                        other
                    )));
                }
            }
        }
        Ok(file)
    }

    fn parse_message(&mut self) -> Result<DescriptorProto, BridgeError> {
        let name = self.next()?;
        self.expect("{")?;

        let mut message = DescriptorProto {
            name: Some(name),
            ..Default::default()
        };

        loop {
            let token = self
                .peek()
                .ok_or_else(|| BridgeError::Fetch("unterminated message body".to_string()))?
                .to_string();
            match token.as_str() {
                "}" => {
                    self.next()?;
                    break;
                }
                "message" => {
                    self.next()?;
                    let nested = self.parse_message()?;
                    message.nested_type.push(nested);
                }
                "enum" => {
                    self.next()?;
                    message.enum_type.push(self.parse_enum()?);
                }
                ";" => {
                    self.next()?;
                }
                "option" | "reserved" | "extensions" => {
                    self.next()?;
                    self.skip_statement()?;
                }
                "oneof" => {
                    // Members are flattened into plain optional fields.
                    self.next()?;
                    self.next()?; // oneof name
                    self.expect("{")?;
                    while self.peek() != Some("}") {
                        let field = self.parse_field(None)?;
                        message.field.push(field);
                    }
                    self.expect("}")?;
                }
                "map" => {
                    self.next()?;
                    let (field, entry) = self.parse_map_field()?;
                    message.field.push(field);
                    message.nested_type.push(entry);
                }
                "repeated" | "optional" => {
                    self.next()?;
                    let label = if token == "repeated" {
                        Some(field_descriptor_proto::Label::Repeated)
                    } else {
                        None
                    };
                    let field = self.parse_field(label)?;
                    message.field.push(field);
                }
                _ => {
                    let field = self.parse_field(None)?;
                    message.field.push(field);
                }
            }
        }
        Ok(message)
    }

    /// Parse `type name = number [options];` with the type token next.
    fn parse_field(
        &mut self,
        label: Option<field_descriptor_proto::Label>,
    ) -> Result<FieldDescriptorProto, BridgeError> {
        let type_token = self.next()?;
        let name = self.next()?;
        self.expect("=")?;
        let number = self.parse_field_number()?;
        self.finish_field_statement()?;

        let mut field = FieldDescriptorProto {
            name: Some(name.clone()),
            number: Some(number),
            json_name: Some(json_camel_case(&name)),
            label: Some(label.unwrap_or(field_descriptor_proto::Label::Optional) as i32),
            ..Default::default()
        };
        apply_field_type(&mut field, &type_token);
        Ok(field)
    }

    fn parse_map_field(
        &mut self,
    ) -> Result<(FieldDescriptorProto, DescriptorProto), BridgeError> {
        self.expect("<")?;
        let key_type = self.next()?;
        self.expect(",")?;
        let value_type = self.next()?;
        self.expect(">")?;
        let name = self.next()?;
        self.expect("=")?;
        let number = self.parse_field_number()?;
        self.finish_field_statement()?;

        let entry_name = format!("{}Entry", pascal_case(&name));

        let mut key_field = FieldDescriptorProto {
            name: Some("key".to_string()),
            json_name: Some("key".to_string()),
            number: Some(1),
            label: Some(field_descriptor_proto::Label::Optional as i32),
            ..Default::default()
        };
        apply_field_type(&mut key_field, &key_type);

        let mut value_field = FieldDescriptorProto {
            name: Some("value".to_string()),
            json_name: Some("value".to_string()),
            number: Some(2),
            label: Some(field_descriptor_proto::Label::Optional as i32),
            ..Default::default()
        };
        apply_field_type(&mut value_field, &value_type);

        let entry = DescriptorProto {
            name: Some(entry_name.clone()),
            field: vec![key_field, value_field],
            options: Some(MessageOptions {
                map_entry: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };

        let field = FieldDescriptorProto {
            name: Some(name.clone()),
            number: Some(number),
            json_name: Some(json_camel_case(&name)),
            label: Some(field_descriptor_proto::Label::Repeated as i32),
            r#type: Some(field_descriptor_proto::Type::Message as i32),
            // Resolved to a fully-qualified name in resolve_types.
            type_name: Some(entry_name),
            ..Default::default()
        };
        Ok((field, entry))
    }

    fn parse_field_number(&mut self) -> Result<i32, BridgeError> {
        let token = self.next()?;
        token
            .parse()
            .map_err(|_| BridgeError::Fetch(format!("invalid field number '{}'", token)))
    }

    /// Consume optional `[deprecated = true]` style options and the closing
    /// semicolon.
    fn finish_field_statement(&mut self) -> Result<(), BridgeError> {
        if self.peek() == Some("[") {
            while self.next()? != "]" {}
        }
        self.expect(";")
    }

    fn parse_enum(&mut self) -> Result<EnumDescriptorProto, BridgeError> {
        let name = self.next()?;
        self.expect("{")?;

        let mut proto = EnumDescriptorProto {
            name: Some(name),
            ..Default::default()
        };

        loop {
            let token = self.next()?;
            match token.as_str() {
                "}" => break,
                ";" => continue,
                "option" | "reserved" => self.skip_statement()?,
                value_name => {
                    self.expect("=")?;
                    let number = self.parse_field_number()?;
                    self.finish_field_statement()?;
                    proto.value.push(EnumValueDescriptorProto {
                        name: Some(value_name.to_string()),
                        number: Some(number),
                        ..Default::default()
                    });
                }
            }
        }
        Ok(proto)
    }

    fn parse_service(&mut self) -> Result<ServiceDescriptorProto, BridgeError> {
        let name = self.next()?;
        self.expect("{")?;

        let mut service = ServiceDescriptorProto {
            name: Some(name),
            ..Default::default()
        };

        loop {
            let token = self.next()?;
            match token.as_str() {
                "}" => break,
                ";" => continue,
                "option" => self.skip_statement()?,
                "rpc" => service.method.push(self.parse_rpc()?),
                other => {
                    return Err(BridgeError::Fetch(format!(
                        "unexpected token '{}' in service body",
                        other
                    )));
                }
            }
        }
        Ok(service)
    }

    fn parse_rpc(&mut self) -> Result<MethodDescriptorProto, BridgeError> {
        let name = self.next()?;

        self.expect("(")?;
        let mut client_streaming = false;
        let mut input_type = self.next()?;
        if input_type == "stream" {
            client_streaming = true;
            input_type = self.next()?;
        }
        self.expect(")")?;

        self.expect("returns")?;
        self.expect("(")?;
        let mut server_streaming = false;
        let mut output_type = self.next()?;
        if output_type == "stream" {
            server_streaming = true;
            output_type = self.next()?;
        }
        self.expect(")")?;

        // Either `;` or an options block `{ ... }`.
        match self.next()?.as_str() {
            ";" => {}
            "{" => {
                let mut depth = 1usize;
                while depth > 0 {
                    match self.next()?.as_str() {
                        "{" => depth += 1,
                        "}" => depth -= 1,
                        _ => {}
                    }
                }
            }
            other => {
                return Err(BridgeError::Fetch(format!(
                    "expected ';' or '{{' after rpc definition, found '{}'",
                    other
                )));
            }
        }

        Ok(MethodDescriptorProto {
            name: Some(name),
            input_type: Some(input_type),
            output_type: Some(output_type),
            client_streaming: Some(client_streaming),
            server_streaming: Some(server_streaming),
            ..Default::default()
        })
    }
}

// ===== Type resolution =====

fn scalar_type(token: &str) -> Option<field_descriptor_proto::Type> {
    use field_descriptor_proto::Type;
    let ty = match token {
        "double" => Type::Double,
        "float" => Type::Float,
        "int32" => Type::Int32,
        "int64" => Type::Int64,
        "uint32" => Type::Uint32,
        "uint64" => Type::Uint64,
        "sint32" => Type::Sint32,
        "sint64" => Type::Sint64,
        "fixed32" => Type::Fixed32,
        "fixed64" => Type::Fixed64,
        "sfixed32" => Type::Sfixed32,
        "sfixed64" => Type::Sfixed64,
        "bool" => Type::Bool,
        "string" => Type::String,
        "bytes" => Type::Bytes,
        _ => return None,
    };
    Some(ty)
}

fn apply_field_type(field: &mut FieldDescriptorProto, type_token: &str) {
    if let Some(ty) = scalar_type(type_token) {
        field.r#type = Some(ty as i32);
    } else {
        // Message or enum reference; the enum case is fixed up during
        // resolution once all declarations are known.
        field.r#type = Some(field_descriptor_proto::Type::Message as i32);
        field.type_name = Some(type_token.to_string());
    }
}

/// Rewrite relative `type_name` references to fully-qualified `.pkg.Name`
/// form and fix up enum references, now that all declarations are known.
fn resolve_types(mut file: FileDescriptorProto) -> FileDescriptorProto {
    let package = file.package.clone().unwrap_or_default();

    let mut messages = std::collections::HashSet::new();
    let mut enums = std::collections::HashSet::new();
    for message in &file.message_type {
        collect_names(message, &package, &mut messages, &mut enums);
    }
    for e in &file.enum_type {
        let fqn = qualified(&package, e.name());
        enums.insert(fqn);
    }

    let scope = package.clone();
    for message in &mut file.message_type {
        let message_scope = qualified(&scope, message.name());
        resolve_message(message, &package, &message_scope, &messages, &enums);
    }
    for service in &mut file.service {
        for method in &mut service.method {
            if let Some(input) = method.input_type.take() {
                method.input_type = Some(resolve_name(&input, &package, &scope, &messages, &enums).0);
            }
            if let Some(output) = method.output_type.take() {
                method.output_type =
                    Some(resolve_name(&output, &package, &scope, &messages, &enums).0);
            }
        }
    }
    file
}

fn collect_names(
    message: &DescriptorProto,
    scope: &str,
    messages: &mut std::collections::HashSet<String>,
    enums: &mut std::collections::HashSet<String>,
) {
    let fqn = qualified(scope, message.name());
    for nested in &message.nested_type {
        collect_names(nested, &fqn, messages, enums);
    }
    for e in &message.enum_type {
        enums.insert(qualified(&fqn, e.name()));
    }
    messages.insert(fqn);
}

fn resolve_message(
    message: &mut DescriptorProto,
    package: &str,
    scope: &str,
    messages: &std::collections::HashSet<String>,
    enums: &std::collections::HashSet<String>,
) {
    for field in &mut message.field {
        if let Some(type_name) = field.type_name.take() {
            let (resolved, is_enum) = resolve_name(&type_name, package, scope, messages, enums);
            if is_enum {
                field.r#type = Some(field_descriptor_proto::Type::Enum as i32);
            }
            field.type_name = Some(resolved);
        }
    }
    for nested in &mut message.nested_type {
        let nested_scope = qualified(scope, nested.name());
        resolve_message(nested, package, &nested_scope, messages, enums);
    }
}

/// Resolve a possibly-relative type reference. Lookup order: current scope,
/// then package root, then the name as written. Returns the leading-dot
/// fully-qualified name and whether it names an enum.
fn resolve_name(
    name: &str,
    package: &str,
    scope: &str,
    messages: &std::collections::HashSet<String>,
    enums: &std::collections::HashSet<String>,
) -> (String, bool) {
    let bare = name.trim_start_matches('.');
    let candidates = [qualified(scope, bare), qualified(package, bare), bare.to_string()];
    for candidate in &candidates {
        if messages.contains(candidate) {
            return (format!(".{}", candidate), false);
        }
        if enums.contains(candidate) {
            return (format!(".{}", candidate), true);
        }
    }
    // Unknown reference; keep it fully-qualified so the pool reports a
    // coherent error.
    (format!(".{}", qualified(package, bare)), false)
}

fn qualified(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", scope, name)
    }
}

fn pascal_case(name: &str) -> String {
    name.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// Protobuf JSON name: lowerCamelCase of the field name.
fn json_camel_case(name: &str) -> String {
    let pascal = pascal_case(name);
    let mut chars = pascal.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
