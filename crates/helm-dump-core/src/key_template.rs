//! Key templates.
//!
//! A rule's destination key is produced by a small template in Go
//! text/template syntax, e.g. `{{ resourceName . }}.replicas`, rendered with
//! the decoded manifest as the dot context. Only the subset useful for
//! naming keys is supported:
//!
//! | Syntax | Meaning |
//! |--------|---------|
//! | `.` / `$` | the manifest |
//! | `.metadata.name` / `$.metadata.name` | field chain |
//! | `"text"`, `` `text` ``, `42`, `true` | literals |
//! | `fn arg...` | function call |
//! | `a \| fn` | pipe: `a` becomes the last argument of `fn` |
//! | `{{-` / `-}}` | trim surrounding whitespace |
//! | `{{/* ... */}}` | comment |
//!
//! Functions: `resourceName OBJ` returns the `helm-dump/name` annotation of
//! the object or `"unknown"`.

use serde_json::Value;

use crate::error::{ExtractError, Result};
use crate::value_reader::{kind_name, render_value};

/// Annotation carrying the original resource name.
pub const NAME_ANNOTATION: &str = "helm-dump/name";

/// Fallback returned by `resourceName` when the annotation is absent.
pub const UNKNOWN_NAME: &str = "unknown";

const FUNCTIONS: &[&str] = &["resourceName"];

/// A parsed key template.
#[derive(Debug, Clone)]
pub struct KeyTemplate {
    source: String,
    pieces: Vec<Piece>,
}

#[derive(Debug, Clone)]
enum Piece {
    Text(String),
    Action(Vec<Command>),
}

#[derive(Debug, Clone)]
struct Command {
    operands: Vec<Operand>,
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Field(Vec<String>),
    Literal(Value),
    Function(String),
}

impl KeyTemplate {
    pub fn parse(source: &str) -> Result<Self> {
        let mut pieces = Vec::new();
        let mut rest = source;
        let mut trim_next_text = false;

        while let Some(open) = rest.find("{{") {
            let mut text = rest[..open].to_string();
            let after_open = &rest[open + 2..];
            let close = after_open.find("}}").ok_or_else(|| {
                ExtractError::template(format!("unclosed action in {:?}", source))
            })?;
            let mut body = &after_open[..close];

            if trim_next_text {
                text = text.trim_start().to_string();
            }
            if let Some(stripped) = body.strip_prefix('-') {
                if stripped.starts_with(char::is_whitespace) {
                    text = text.trim_end().to_string();
                    body = stripped;
                }
            }
            trim_next_text = false;
            if let Some(stripped) = body.strip_suffix('-') {
                if stripped.ends_with(char::is_whitespace) {
                    trim_next_text = true;
                    body = stripped;
                }
            }

            if !text.is_empty() {
                pieces.push(Piece::Text(text));
            }

            let body = body.trim();
            let is_comment = body.starts_with("/*") && body.ends_with("*/") && body.len() >= 4;
            if !is_comment {
                pieces.push(Piece::Action(parse_pipeline(body)?));
            }

            rest = &after_open[close + 2..];
        }

        let tail = if trim_next_text { rest.trim_start() } else { rest };
        if tail.contains("}}") {
            return Err(ExtractError::template(format!(
                "unexpected '}}}}' in {:?}",
                source
            )));
        }
        if !tail.is_empty() {
            pieces.push(Piece::Text(tail.to_string()));
        }

        Ok(Self {
            source: source.to_string(),
            pieces,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Render the template with `object` as the dot context.
    pub fn render(&self, object: &Value) -> Result<String> {
        let mut out = String::new();
        for piece in &self.pieces {
            match piece {
                Piece::Text(text) => out.push_str(text),
                Piece::Action(commands) => {
                    let mut piped: Option<Value> = None;
                    for command in commands {
                        piped = Some(eval_command(command, object, piped)?);
                    }
                    if let Some(value) = piped {
                        out.push_str(&render_value(&value));
                    }
                }
            }
        }
        Ok(out)
    }
}

/// `resourceName`: the original name recorded in the manifest's annotations.
pub fn resource_name(object: &Value) -> String {
    object
        .get("metadata")
        .and_then(|m| m.get("annotations"))
        .and_then(|a| a.get(NAME_ANNOTATION))
        .and_then(Value::as_str)
        .unwrap_or(UNKNOWN_NAME)
        .to_string()
}

fn parse_pipeline(body: &str) -> Result<Vec<Command>> {
    if body.is_empty() {
        return Err(ExtractError::template("empty action"));
    }
    let tokens = tokenize(body)?;
    let mut commands = Vec::new();
    let mut current = Vec::new();
    for token in tokens {
        match token {
            Token::Pipe => {
                if current.is_empty() {
                    return Err(ExtractError::template(format!("missing command in {:?}", body)));
                }
                commands.push(Command {
                    operands: std::mem::take(&mut current),
                });
            }
            Token::Operand(op) => current.push(op),
        }
    }
    if current.is_empty() {
        return Err(ExtractError::template(format!("missing command in {:?}", body)));
    }
    commands.push(Command { operands: current });

    for (i, command) in commands.iter().enumerate() {
        let first = &command.operands[0];
        if !matches!(first, Operand::Function(_)) && (command.operands.len() > 1 || i > 0) {
            return Err(ExtractError::template(format!(
                "can't give argument to non-function in {:?}",
                body
            )));
        }
        if command.operands[1..]
            .iter()
            .any(|op| matches!(op, Operand::Function(_)))
        {
            return Err(ExtractError::template(format!(
                "nested function calls need parentheses, which are not supported: {:?}",
                body
            )));
        }
    }
    Ok(commands)
}

enum Token {
    Pipe,
    Operand(Operand),
}

fn tokenize(body: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = body.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c == '|' {
            tokens.push(Token::Pipe);
            i += 1;
        } else if c == '"' {
            let mut s = String::new();
            i += 1;
            loop {
                match chars.get(i) {
                    None => return Err(ExtractError::template("unterminated string literal")),
                    Some('"') => break,
                    Some('\\') => {
                        let escaped = match chars.get(i + 1) {
                            Some('n') => '\n',
                            Some('t') => '\t',
                            Some(&other) => other,
                            None => return Err(ExtractError::template("dangling escape")),
                        };
                        s.push(escaped);
                        i += 2;
                    }
                    Some(&other) => {
                        s.push(other);
                        i += 1;
                    }
                }
            }
            i += 1;
            tokens.push(Token::Operand(Operand::Literal(Value::String(s))));
        } else if c == '`' {
            let start = i + 1;
            let end = chars[start..]
                .iter()
                .position(|&ch| ch == '`')
                .map(|p| start + p)
                .ok_or_else(|| ExtractError::template("unterminated raw string"))?;
            let s: String = chars[start..end].iter().collect();
            tokens.push(Token::Operand(Operand::Literal(Value::String(s))));
            i = end + 1;
        } else {
            let start = i;
            while i < chars.len() && !chars[i].is_whitespace() && chars[i] != '|' {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            tokens.push(Token::Operand(parse_word(&word)?));
        }
    }
    Ok(tokens)
}

fn parse_word(word: &str) -> Result<Operand> {
    if word == "." || word == "$" {
        return Ok(Operand::Field(Vec::new()));
    }
    if let Some(chain) = word.strip_prefix("$.").or_else(|| word.strip_prefix('.')) {
        let fields: Vec<String> = chain.split('.').map(str::to_string).collect();
        if fields.iter().any(|f| !is_identifier(f)) {
            return Err(ExtractError::template(format!("bad field chain {:?}", word)));
        }
        return Ok(Operand::Field(fields));
    }
    match word {
        "true" => return Ok(Operand::Literal(Value::Bool(true))),
        "false" => return Ok(Operand::Literal(Value::Bool(false))),
        _ => {}
    }
    if let Ok(n) = word.parse::<i64>() {
        return Ok(Operand::Literal(Value::from(n)));
    }
    if is_identifier(word) {
        if FUNCTIONS.contains(&word) {
            return Ok(Operand::Function(word.to_string()));
        }
        return Err(ExtractError::template(format!(
            "function {:?} not defined",
            word
        )));
    }
    Err(ExtractError::template(format!("unexpected {:?} in action", word)))
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

fn eval_command(command: &Command, object: &Value, piped: Option<Value>) -> Result<Value> {
    match &command.operands[0] {
        Operand::Function(name) => {
            let mut args = command.operands[1..]
                .iter()
                .map(|op| eval_operand(op, object))
                .collect::<Result<Vec<Value>>>()?;
            if let Some(value) = piped {
                args.push(value);
            }
            call(name, &args)
        }
        operand => eval_operand(operand, object),
    }
}

fn eval_operand(operand: &Operand, object: &Value) -> Result<Value> {
    match operand {
        Operand::Literal(value) => Ok(value.clone()),
        Operand::Field(chain) => {
            let mut current = object;
            for name in chain {
                current = match current {
                    Value::Object(map) => map.get(name).ok_or_else(|| {
                        ExtractError::template(format!("map has no entry for key {:?}", name))
                    })?,
                    other => {
                        return Err(ExtractError::template(format!(
                            "can't evaluate field {} in {}",
                            name,
                            kind_name(other)
                        )))
                    }
                };
            }
            Ok(current.clone())
        }
        Operand::Function(name) => Err(ExtractError::template(format!(
            "function {:?} used as a value",
            name
        ))),
    }
}

fn call(name: &str, args: &[Value]) -> Result<Value> {
    match name {
        "resourceName" => match args {
            [object] => Ok(Value::String(resource_name(object))),
            _ => Err(ExtractError::template(format!(
                "wrong number of args for resourceName: want 1 got {}",
                args.len()
            ))),
        },
        other => Err(ExtractError::template(format!(
            "function {:?} not defined",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object() -> Value {
        json!({
            "kind": "Deployment",
            "metadata": {
                "name": "nginx-abc",
                "annotations": { "helm-dump/name": "nginx" }
            }
        })
    }

    fn render(template: &str) -> Result<String> {
        KeyTemplate::parse(template)?.render(&object())
    }

    #[test]
    fn renders_resource_name() {
        assert_eq!(render("{{ resourceName . }}.replicas").unwrap(), "nginx.replicas");
        assert_eq!(render("{{ . | resourceName }}.replicas").unwrap(), "nginx.replicas");
    }

    #[test]
    fn resource_name_falls_back_to_unknown() {
        let template = KeyTemplate::parse("{{ resourceName . }}").unwrap();
        assert_eq!(template.render(&json!({"metadata": {}})).unwrap(), "unknown");
        assert_eq!(template.render(&json!({})).unwrap(), "unknown");
    }

    #[test]
    fn renders_field_chains_and_literals() {
        assert_eq!(render("{{ .metadata.name }}.image").unwrap(), "nginx-abc.image");
        assert_eq!(render("{{ $.kind }}").unwrap(), "Deployment");
        assert_eq!(render(r#"{{ "apps" }}.{{ `web` }}.{{ 3 }}"#).unwrap(), "apps.web.3");
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(render("global.replicas").unwrap(), "global.replicas");
    }

    #[test]
    fn trims_whitespace_and_skips_comments() {
        assert_eq!(
            render("a.  {{- /* note */ -}}  {{- .kind -}}  .b").unwrap(),
            "a.Deployment.b"
        );
    }

    #[test]
    fn reports_template_errors() {
        for template in [
            "{{ resourceName . ",
            "{{ lookup . }}",
            "{{ }}",
            "{{ .metadata.name .kind }}",
            "x }}",
            "{{ resourceName }}",
            "{{ .metadata.name.first }}",
            "{{ .missing }}",
        ] {
            let err = render(template).unwrap_err();
            assert!(
                matches!(err, ExtractError::Template(_)),
                "{:?} should fail, got {:?}",
                template,
                err
            );
        }
    }
}
