use std::fmt;
use std::sync::Arc;

/// Opaque host value exposed to scripts (event payloads, entities, ...).
///
/// Scripts can only read named fields through member access and compare
/// objects by identity.
pub trait HostObject: Send + Sync + fmt::Debug {
    /// Short type label used in error messages.
    fn type_name(&self) -> &str;

    /// Read a named field. Missing fields read as `null`.
    fn field(&self, _name: &str) -> Option<Value> {
        None
    }

    /// Text used when the object is printed or concatenated.
    fn describe(&self) -> String {
        format!("<{}>", self.type_name())
    }
}

/// Dynamically typed script value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Absence of a value.
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating-point number.
    Float(f64),
    /// UTF-8 string.
    Str(String),
    /// Ordered list.
    List(Vec<Value>),
    /// Host-supplied object.
    Object(Arc<dyn HostObject>),
}

impl Value {
    /// Label of the value's dynamic type.
    pub fn type_name(&self) -> &str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Object(object) => object.type_name(),
        }
    }

    /// Whether the value is `null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Boolean payload, if any.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(flag) => Some(*flag),
            _ => None,
        }
    }

    /// Integer payload, if any.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(num) => Some(*num),
            _ => None,
        }
    }

    /// Numeric payload widened to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(num) => Some(*num as f64),
            Value::Float(num) => Some(*num),
            _ => None,
        }
    }

    /// Convenience accessor for string references.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(text) => Some(text),
            _ => None,
        }
    }

    /// Convert into JSON. Host objects are rendered with [`HostObject::describe`].
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(flag) => serde_json::Value::Bool(*flag),
            Value::Int(num) => serde_json::Value::from(*num),
            Value::Float(num) => serde_json::Number::from_f64(*num)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(text) => serde_json::Value::String(text.clone()),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Object(object) => serde_json::Value::String(object.describe()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                self.as_f64() == other.as_f64()
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(flag) => write!(f, "{}", flag),
            Value::Int(num) => write!(f, "{}", num),
            Value::Float(num) => write!(f, "{}", num),
            Value::Str(text) => write!(f, "{}", text),
            Value::List(items) => {
                write!(f, "[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Object(object) => write!(f, "{}", object.describe()),
        }
    }
}

impl From<bool> for Value {
    fn from(flag: bool) -> Self {
        Value::Bool(flag)
    }
}

impl From<i64> for Value {
    fn from(num: i64) -> Self {
        Value::Int(num)
    }
}

impl From<i32> for Value {
    fn from(num: i32) -> Self {
        Value::Int(num.into())
    }
}

impl From<f64> for Value {
    fn from(num: f64) -> Self {
        Value::Float(num)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Str(text.to_string())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::Str(text)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(flag) => Value::Bool(flag),
            serde_json::Value::Number(num) => match num.as_i64() {
                Some(int) => Value::Int(int),
                None => Value::Float(num.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(text) => Value::Str(text),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            // Scripts have no map type; keep the structure readable.
            serde_json::Value::Object(map) => Value::Str(serde_json::Value::Object(map).to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Lamp;

    impl HostObject for Lamp {
        fn type_name(&self) -> &str {
            "lamp"
        }
    }

    #[test]
    fn numbers_compare_across_representations() {
        assert_eq!(Value::Int(2), Value::Float(2.0));
        assert_ne!(Value::Int(2), Value::Str("2".into()));
    }

    #[test]
    fn objects_compare_by_identity() {
        let a: Arc<dyn HostObject> = Arc::new(Lamp);
        let b: Arc<dyn HostObject> = Arc::new(Lamp);
        assert_eq!(Value::Object(a.clone()), Value::Object(a));
        assert_ne!(
            Value::Object(b),
            Value::Object(Arc::new(Lamp) as Arc<dyn HostObject>)
        );
    }

    #[test]
    fn json_conversion_keeps_structure() {
        let json = serde_json::json!([1, 2.5, "x", null, true]);
        let value = Value::from(json.clone());
        assert_eq!(
            value,
            Value::List(vec![
                Value::Int(1),
                Value::Float(2.5),
                Value::Str("x".into()),
                Value::Null,
                Value::Bool(true),
            ])
        );
        assert_eq!(value.to_json(), json);
    }

    #[test]
    fn display_renders_lists() {
        let value = Value::List(vec![Value::Int(1), Value::Str("a".into())]);
        assert_eq!(value.to_string(), "[1, a]");
        assert_eq!(Value::Object(Arc::new(Lamp)).to_string(), "<lamp>");
    }
}
