//! # Domain Values
//!
//! `Value` is what a command hands back to the caller once its reply parser
//! has run: a raw reply, or a reply reshaped into a boolean, float or map.

use bytes::Bytes;

use kvwire_common::{ClientError, ClientResult, ErrorReply, Reply};

/// Parsed command result.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Status(String),
    Int(i64),
    Bool(bool),
    Float(f64),
    Data(Bytes),
    Array(Vec<Value>),
    /// Field/value pairs in server order.
    Map(Vec<(Bytes, Value)>),
    /// Error reply returned as a value when the client does not raise.
    Error(ErrorReply),
}

impl Value {
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Value::Data(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            Value::Int(value) => Some(*value != 0),
            _ => None,
        }
    }

    pub fn as_error(&self) -> Option<&ErrorReply> {
        match self {
            Value::Error(err) => Some(err),
            _ => None,
        }
    }
}

impl From<Reply> for Value {
    fn from(reply: Reply) -> Self {
        match reply {
            Reply::Status(status) => Value::Status(status),
            Reply::Error(err) => Value::Error(err),
            Reply::Integer(value) => Value::Int(value),
            Reply::Bulk(data) => Value::Data(data),
            Reply::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            Reply::Nil => Value::Nil,
        }
    }
}

/// Reply-parsing hook attached to each command spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseParser {
    /// Pass the reply through unchanged.
    #[default]
    Raw,
    /// Integer replies become booleans (`:1` → true).
    Boolean,
    /// Bulk replies holding a decimal become floats.
    Float,
    /// Flat `[field, value, ...]` arrays become maps.
    Map,
}

impl ResponseParser {
    /// Converts `reply` for the command `id`.
    pub fn parse(self, id: &str, reply: Reply) -> ClientResult<Value> {
        match (self, reply) {
            (_, Reply::Error(err)) => Ok(Value::Error(err)),
            (ResponseParser::Raw, reply) => Ok(Value::from(reply)),
            (ResponseParser::Boolean, Reply::Integer(value)) => Ok(Value::Bool(value != 0)),
            (ResponseParser::Boolean, Reply::Status(_)) => Ok(Value::Bool(true)),
            (ResponseParser::Boolean, Reply::Nil) => Ok(Value::Bool(false)),
            (ResponseParser::Float, Reply::Bulk(data)) => std::str::from_utf8(&data)
                .ok()
                .and_then(|text| text.parse::<f64>().ok())
                .map(Value::Float)
                .ok_or_else(|| ClientError::UnexpectedResponse(id.to_string())),
            (ResponseParser::Float, Reply::Nil) => Ok(Value::Nil),
            (ResponseParser::Map, Reply::Array(items)) => parse_map(id, items),
            (ResponseParser::Map, Reply::Nil) => Ok(Value::Map(Vec::new())),
            _ => Err(ClientError::UnexpectedResponse(id.to_string())),
        }
    }
}

fn parse_map(id: &str, items: Vec<Reply>) -> ClientResult<Value> {
    if items.len() % 2 != 0 {
        return Err(ClientError::UnexpectedResponse(id.to_string()));
    }
    let mut pairs = Vec::with_capacity(items.len() / 2);
    let mut items = items.into_iter();
    while let (Some(field), Some(value)) = (items.next(), items.next()) {
        let field = match field {
            Reply::Bulk(data) => data,
            Reply::Status(text) => Bytes::from(text),
            _ => return Err(ClientError::UnexpectedResponse(id.to_string())),
        };
        pairs.push((field, Value::from(value)));
    }
    Ok(Value::Map(pairs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boolean_parser_maps_integers() {
        assert_eq!(ResponseParser::Boolean.parse("EXISTS", Reply::Integer(1)).unwrap(), Value::Bool(true));
        assert_eq!(ResponseParser::Boolean.parse("EXISTS", Reply::Integer(0)).unwrap(), Value::Bool(false));
    }

    #[test]
    fn float_parser_reads_decimal_bulk() {
        let value = ResponseParser::Float
            .parse("ZSCORE", Reply::Bulk(Bytes::from_static(b"1.5")))
            .unwrap();
        assert_eq!(value, Value::Float(1.5));
        assert!(ResponseParser::Float
            .parse("ZSCORE", Reply::Bulk(Bytes::from_static(b"nope")))
            .is_err());
    }

    #[test]
    fn map_parser_pairs_fields() {
        let reply = Reply::Array(vec![
            Reply::Bulk(Bytes::from_static(b"name")),
            Reply::Bulk(Bytes::from_static(b"ada")),
            Reply::Bulk(Bytes::from_static(b"age")),
            Reply::Bulk(Bytes::from_static(b"36")),
        ]);
        let value = ResponseParser::Map.parse("HGETALL", reply).unwrap();
        assert_eq!(
            value,
            Value::Map(vec![
                (Bytes::from_static(b"name"), Value::Data(Bytes::from_static(b"ada"))),
                (Bytes::from_static(b"age"), Value::Data(Bytes::from_static(b"36"))),
            ])
        );
    }

    #[test]
    fn map_parser_rejects_odd_arrays() {
        let reply = Reply::Array(vec![Reply::Bulk(Bytes::from_static(b"lonely"))]);
        assert!(matches!(
            ResponseParser::Map.parse("HGETALL", reply),
            Err(ClientError::UnexpectedResponse(_))
        ));
    }

    #[test]
    fn nested_errors_become_values() {
        let reply = Reply::Array(vec![Reply::Integer(1), Reply::Error(ErrorReply::new("ERR nope"))]);
        assert_eq!(
            Value::from(reply),
            Value::Array(vec![Value::Int(1), Value::Error(ErrorReply::new("ERR nope"))])
        );
    }
}
