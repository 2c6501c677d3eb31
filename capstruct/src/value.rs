//! Values passed into constructors and values read out of buffers.

use crate::reader::{ListReader, StructReader};

/// An owned value, supplied to a constructor or declared as a default in a
/// schema.
#[derive(Clone, Debug, PartialEq)]
pub enum Input {
    /// An explicitly absent pointer, or a null nullable value.
    Null,
    Void,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float32(f32),
    Float64(f64),
    /// An enumerant ordinal.
    Enum(u16),
    Text(String),
    Data(Vec<u8>),
    List(Vec<Input>),
    /// A struct or group value with named fields.
    Record(Args),
    /// A struct or group value with fields given in declaration order.
    Tuple(Vec<Input>),
}

impl Input {
    /// A short description of the shape of this value, used in error messages.
    pub fn description(&self) -> &'static str {
        match self {
            Input::Null => "null",
            Input::Void => "void",
            Input::Bool(_) => "bool",
            Input::Int(_) => "signed integer",
            Input::UInt(_) => "unsigned integer",
            Input::Float32(_) => "float32",
            Input::Float64(_) => "float64",
            Input::Enum(_) => "enumerant",
            Input::Text(_) => "text",
            Input::Data(_) => "data",
            Input::List(_) => "list",
            Input::Record(_) => "record",
            Input::Tuple(_) => "tuple",
        }
    }
}

macro_rules! input_from {
    ($($T:ty => $variant:ident as $As:ty),* $(,)?) => {
        $(impl From<$T> for Input {
            fn from(value: $T) -> Input {
                Input::$variant(<$As>::from(value))
            }
        })*
    };
}

input_from! {
    bool => Bool as bool,
    i8 => Int as i64,
    i16 => Int as i64,
    i32 => Int as i64,
    i64 => Int as i64,
    u8 => UInt as u64,
    u16 => UInt as u64,
    u32 => UInt as u64,
    u64 => UInt as u64,
    f32 => Float32 as f32,
    f64 => Float64 as f64,
    String => Text as String,
    Args => Record as Args,
}

impl From<&str> for Input {
    fn from(value: &str) -> Input {
        Input::Text(value.to_owned())
    }
}

impl<T: Into<Input>> From<Option<T>> for Input {
    fn from(value: Option<T>) -> Input {
        value.map_or(Input::Null, Into::into)
    }
}

/// Named constructor arguments.
///
/// An argument that is not present is *unset*, which is distinct from an
/// argument explicitly set to [`Input::Null`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Args {
    entries: Vec<(String, Input)>,
}

impl Args {
    pub fn new() -> Args {
        Args::default()
    }

    /// Add an argument, replacing any previous argument with the same name.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Input>) -> Args {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Input>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Input> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Input)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: Into<String>, V: Into<Input>> FromIterator<(N, V)> for Args {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Args {
        let mut args = Args::new();
        for (name, value) in iter {
            args.insert(name, value);
        }
        args
    }
}

/// One member of a union, selected explicitly.
#[derive(Clone, Debug, PartialEq)]
pub struct Variant {
    pub member: String,
    pub value: Input,
}

impl Variant {
    pub fn new(member: impl Into<String>, value: impl Into<Input>) -> Variant {
        Variant {
            member: member.into(),
            value: value.into(),
        }
    }
}

/// A value read in place from a buffer.
#[derive(Clone, Debug)]
pub enum Value<'a> {
    /// An absent pointer, or a nullable value whose flag is set.
    Null,
    Void,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float32(f32),
    Float64(f64),
    Enum(u16),
    Text(&'a str),
    Data(&'a [u8]),
    List(ListReader<'a>),
    /// A struct, or a group view into the enclosing struct.
    Struct(StructReader<'a>),
}

impl<'a> Value<'a> {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            Value::UInt(value) => i64::try_from(*value).ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UInt(value) => Some(*value),
            Value::Int(value) => u64::try_from(*value).ok(),
            Value::Enum(value) => Some(u64::from(*value)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float32(value) => Some(f64::from(*value)),
            Value::Float64(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&'a str> {
        match self {
            Value::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_data(&self) -> Option<&'a [u8]> {
        match self {
            Value::Data(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&ListReader<'a>> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructReader<'a>> {
        match self {
            Value::Struct(reader) => Some(reader),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_replaces_existing_argument() {
        let args = Args::new().with("x", 1i64).with("x", 2i64);
        assert_eq!(args.len(), 1);
        assert_eq!(args.get("x"), Some(&Input::Int(2)));
    }

    #[test]
    fn unset_is_distinct_from_null() {
        let args = Args::new().with("ptr", Input::Null);
        assert!(args.contains("ptr"));
        assert!(!args.contains("other"));
    }

    #[test]
    fn option_maps_none_to_null() {
        assert_eq!(Input::from(None::<i64>), Input::Null);
        assert_eq!(Input::from(Some(3u8)), Input::UInt(3));
    }
}
