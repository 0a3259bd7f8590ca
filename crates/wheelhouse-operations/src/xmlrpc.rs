//! Minimal XML-RPC codec.
//!
//! Supports the value types legacy packaging clients send and expect: strings, integers,
//! booleans, doubles, nil, arrays and structs. Untyped `<value>` content is a string.

use std::collections::BTreeMap;

use quick_xml::{escape::escape, events::Event, Reader};

/// Fault code for bodies that are not a well-formed method call.
pub const FAULT_PARSE_ERROR: i32 = -32700;
/// Fault code for methods that are not routed.
pub const FAULT_UNKNOWN_METHOD: i32 = -32601;
/// Fault code for missing or mistyped parameters.
pub const FAULT_INVALID_PARAMS: i32 = -32602;
/// Fault code for registry failures while serving a call.
pub const FAULT_SERVER_ERROR: i32 = -32500;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Boolean(bool),
    Int(i64),
    Double(f64),
    String(String),
    Array(Vec<Value>),
    Struct(BTreeMap<String, Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(value) => Some(value),
            _ => None,
        }
    }

    /// Interprets the value as a flag, accepting the integer encoding older clients use.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(value) => Some(*value),
            Value::Int(value) => Some(*value != 0),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Value::Array(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Nil)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(members: BTreeMap<String, Value>) -> Self {
        Value::Struct(members)
    }
}

/// A decoded `<methodCall>`.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub method: String,
    pub params: Vec<Value>,
}

/// An XML-RPC fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub code: i32,
    pub message: String,
}

impl Fault {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(FAULT_PARSE_ERROR, message)
    }

    pub fn unknown_method(method: &str, available: &[&str]) -> Self {
        Self::new(
            FAULT_UNKNOWN_METHOD,
            format!(
                "method `{method}` is not supported; available: {}",
                available.join(", ")
            ),
        )
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(FAULT_INVALID_PARAMS, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(FAULT_SERVER_ERROR, message)
    }
}

#[derive(Debug, Default)]
struct Element {
    name: String,
    children: Vec<Element>,
    text: String,
}

impl Element {
    fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.name == name)
    }
}

fn parse_tree(xml: &str) -> Result<Element, Fault> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Element> = Vec::new();
    let mut root = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                stack.push(Element {
                    name: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
                    ..Default::default()
                });
            }
            Ok(Event::Empty(e)) => {
                let element = Element {
                    name: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
                    ..Default::default()
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => root = Some(element),
                }
            }
            Ok(Event::Text(e)) => {
                if let Some(current) = stack.last_mut() {
                    let text = e
                        .unescape()
                        .map_err(|err| Fault::parse_error(err.to_string()))?;
                    current.text.push_str(&text);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Ok(Event::End(_)) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| Fault::parse_error("unbalanced closing tag"))?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => root = Some(element),
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(Fault::parse_error(err.to_string())),
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(Fault::parse_error("unexpected end of document"));
    }
    root.ok_or_else(|| Fault::parse_error("empty document"))
}

fn decode_value(element: &Element) -> Result<Value, Fault> {
    let Some(typed) = element.children.first() else {
        return Ok(Value::String(element.text.clone()));
    };

    let text = typed.text.trim();
    match typed.name.as_str() {
        "string" => Ok(Value::String(typed.text.clone())),
        "int" | "i4" | "i8" => {
            text.parse()
                .map(Value::Int)
                .map_err(|_| Fault::parse_error(format!("invalid integer `{text}`")))
        }
        "boolean" => {
            match text {
                "1" => Ok(Value::Boolean(true)),
                "0" => Ok(Value::Boolean(false)),
                _ => Err(Fault::parse_error(format!("invalid boolean `{text}`"))),
            }
        }
        "double" => {
            text.parse()
                .map(Value::Double)
                .map_err(|_| Fault::parse_error(format!("invalid double `{text}`")))
        }
        "nil" => Ok(Value::Nil),
        "base64" | "dateTime.iso8601" => Ok(Value::String(text.to_string())),
        "array" => {
            let values = typed
                .child("data")
                .map(|data| {
                    data.children
                        .iter()
                        .map(decode_value)
                        .collect::<Result<Vec<_>, _>>()
                })
                .transpose()?
                .unwrap_or_default();
            Ok(Value::Array(values))
        }
        "struct" => {
            let mut members = BTreeMap::new();
            for member in typed.children.iter().filter(|child| child.name == "member") {
                let name = member
                    .child("name")
                    .map(|name| name.text.trim().to_string())
                    .ok_or_else(|| Fault::parse_error("struct member without name"))?;
                let value = member
                    .child("value")
                    .map(decode_value)
                    .transpose()?
                    .unwrap_or(Value::Nil);
                members.insert(name, value);
            }
            Ok(Value::Struct(members))
        }
        other => Err(Fault::parse_error(format!("unsupported value type `{other}`"))),
    }
}

/// Decodes a `<methodCall>` document.
pub fn parse_method_call(body: &[u8]) -> Result<MethodCall, Fault> {
    let xml = std::str::from_utf8(body).map_err(|_| Fault::parse_error("body is not UTF-8"))?;
    let root = parse_tree(xml)?;
    if root.name != "methodCall" {
        return Err(Fault::parse_error(format!(
            "expected methodCall, found {}",
            root.name
        )));
    }

    let method = root
        .child("methodName")
        .map(|name| name.text.trim().to_string())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| Fault::parse_error("missing methodName"))?;

    let params = match root.child("params") {
        Some(params) => {
            params
                .children
                .iter()
                .filter(|param| param.name == "param")
                .map(|param| {
                    param
                        .child("value")
                        .map(decode_value)
                        .unwrap_or(Ok(Value::Nil))
                })
                .collect::<Result<Vec<_>, _>>()?
        }
        None => Vec::new(),
    };

    Ok(MethodCall { method, params })
}

fn encode_value(value: &Value, out: &mut String) {
    out.push_str("<value>");
    match value {
        Value::Nil => out.push_str("<nil/>"),
        Value::Boolean(value) => {
            out.push_str(if *value {
                "<boolean>1</boolean>"
            } else {
                "<boolean>0</boolean>"
            })
        }
        Value::Int(value) => out.push_str(&format!("<int>{value}</int>")),
        Value::Double(value) => out.push_str(&format!("<double>{value}</double>")),
        Value::String(value) => {
            out.push_str("<string>");
            out.push_str(&escape(value.as_str()));
            out.push_str("</string>");
        }
        Value::Array(values) => {
            out.push_str("<array><data>");
            for value in values {
                encode_value(value, out);
            }
            out.push_str("</data></array>");
        }
        Value::Struct(members) => {
            out.push_str("<struct>");
            for (name, value) in members {
                out.push_str("<member><name>");
                out.push_str(&escape(name.as_str()));
                out.push_str("</name>");
                encode_value(value, out);
                out.push_str("</member>");
            }
            out.push_str("</struct>");
        }
    }
    out.push_str("</value>");
}

const XML_DECLARATION: &str = "<?xml version=\"1.0\"?>\n";

/// Encodes a successful `<methodResponse>` carrying `value`.
pub fn write_response(value: &Value) -> String {
    let mut out = String::from(XML_DECLARATION);
    out.push_str("<methodResponse><params><param>");
    encode_value(value, &mut out);
    out.push_str("</param></params></methodResponse>\n");
    out
}

/// Encodes a fault `<methodResponse>`.
pub fn write_fault(fault: &Fault) -> String {
    let members = BTreeMap::from([
        ("faultCode".to_string(), Value::Int(fault.code.into())),
        ("faultString".to_string(), Value::String(fault.message.clone())),
    ]);

    let mut out = String::from(XML_DECLARATION);
    out.push_str("<methodResponse><fault>");
    encode_value(&Value::Struct(members), &mut out);
    out.push_str("</fault></methodResponse>\n");
    out
}
