use std::fmt;

use num_bigint::BigInt;

use crate::registry::MetadataError;

/// A positional value bound to a SQL statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Char(char),
    BigInt(BigInt),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Char(_) => "char",
            Value::BigInt(_) => "bigint",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            // Debug keeps the fractional part: 0.0 rather than 0
            Value::Float(v) => write!(f, "{:?}", v),
            Value::Text(v) => f.write_str(v),
            Value::Char(v) => write!(f, "{}", v),
            Value::BigInt(v) => write!(f, "{}", v),
        }
    }
}

macro_rules! int_values {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::Int(i64::from(v))
                }
            }
        )*
    };
}

/// Integers that may not fit an `i64` bind as `BigInt` when they overflow.
macro_rules! wide_int_values {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    i64::try_from(v).map_or_else(|_| Value::BigInt(BigInt::from(v)), Value::Int)
                }
            }
        )*
    };
}

/// Integer setters accept `Int` and `BigInt` values that fit the target width.
macro_rules! int_from_value {
    ($($ty:ty),*) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: Value) -> Result<Self, MetadataError> {
                    let out_of_range = |found| MetadataError::ValueType {
                        expected: stringify!($ty),
                        found,
                    };
                    match value {
                        Value::Int(v) => <$ty>::try_from(v).map_err(|_| out_of_range("int out of range")),
                        Value::BigInt(v) => {
                            <$ty>::try_from(&v).map_err(|_| out_of_range("bigint out of range"))
                        }
                        other => Err(MetadataError::ValueType {
                            expected: stringify!($ty),
                            found: other.kind(),
                        }),
                    }
                }
            }
        )*
    };
}

int_values!(i8, i16, i32, i64, u8, u16, u32);
wide_int_values!(isize, u64, usize);
int_from_value!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

/// Integers up to these magnitudes convert to the float type exactly.
const F64_EXACT_INT: u64 = 1 << f64::MANTISSA_DIGITS;
const F32_EXACT_INT: u64 = 1 << f32::MANTISSA_DIGITS;

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<char> for Value {
    fn from(v: char) -> Self {
        Value::Char(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<BigInt> for Value {
    fn from(v: BigInt) -> Self {
        Value::BigInt(v)
    }
}

impl<V: Into<Value>> From<Option<V>> for Value {
    fn from(v: Option<V>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Conversion from a bound [`Value`] back into a field type, used by setters.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, MetadataError>;
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, MetadataError> {
        Ok(value)
    }
}

/// `Int` values convert only when the float represents them exactly.
impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self, MetadataError> {
        match value {
            Value::Float(v) => Ok(v),
            Value::Int(v) if v.unsigned_abs() <= F64_EXACT_INT => Ok(v as f64),
            Value::Int(_) => Err(MetadataError::ValueType {
                expected: "f64",
                found: "int not exactly representable",
            }),
            other => Err(MetadataError::ValueType {
                expected: "f64",
                found: other.kind(),
            }),
        }
    }
}

/// `Float` values round to the nearest `f32` and fail when a finite value
/// overflows it. `Int` values convert only when represented exactly.
impl FromValue for f32 {
    fn from_value(value: Value) -> Result<Self, MetadataError> {
        match value {
            Value::Float(v) => {
                let narrowed = v as f32;
                if v.is_finite() && narrowed.is_infinite() {
                    return Err(MetadataError::ValueType {
                        expected: "f32",
                        found: "float out of range",
                    });
                }
                Ok(narrowed)
            }
            Value::Int(v) if v.unsigned_abs() <= F32_EXACT_INT => Ok(v as f32),
            Value::Int(_) => Err(MetadataError::ValueType {
                expected: "f32",
                found: "int not exactly representable",
            }),
            other => Err(MetadataError::ValueType {
                expected: "f32",
                found: other.kind(),
            }),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, MetadataError> {
        match value {
            Value::Bool(v) => Ok(v),
            other => Err(MetadataError::ValueType {
                expected: "bool",
                found: other.kind(),
            }),
        }
    }
}

impl FromValue for char {
    fn from_value(value: Value) -> Result<Self, MetadataError> {
        match value {
            Value::Char(v) => Ok(v),
            other => Err(MetadataError::ValueType {
                expected: "char",
                found: other.kind(),
            }),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, MetadataError> {
        match value {
            Value::Text(v) => Ok(v),
            Value::Char(v) => Ok(v.to_string()),
            other => Err(MetadataError::ValueType {
                expected: "String",
                found: other.kind(),
            }),
        }
    }
}

impl FromValue for BigInt {
    fn from_value(value: Value) -> Result<Self, MetadataError> {
        match value {
            Value::BigInt(v) => Ok(v),
            Value::Int(v) => Ok(BigInt::from(v)),
            other => Err(MetadataError::ValueType {
                expected: "BigInt",
                found: other.kind(),
            }),
        }
    }
}

impl<V: FromValue> FromValue for Option<V> {
    fn from_value(value: Value) -> Result<Self, MetadataError> {
        match value {
            Value::Null => Ok(None),
            other => V::from_value(other).map(Some),
        }
    }
}

/// SQL text under construction together with its positional parameters.
///
/// Owned by a single statement builder; nothing here validates or escapes
/// the text, callers bind every user-supplied value through [`SqlStatement::bind`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlStatement {
    sql: String,
    values: Vec<Value>,
}

impl SqlStatement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_sql(&mut self, fragment: &str) -> &mut Self {
        self.sql.push_str(fragment);
        self
    }

    pub fn bind(&mut self, value: impl Into<Value>) -> &mut Self {
        self.values.push(value.into());
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.sql, self.values)
    }
}

impl fmt::Display for SqlStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sql: {}\nvalues: [", self.sql)?;
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", value)?;
        }
        f.write_str("]")
    }
}
