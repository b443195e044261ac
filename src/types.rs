use serde::{Deserialize, Serialize};

/// Scalar element kinds a bound or a buffer element may carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarKind {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
}

impl ScalarKind {
    pub fn is_integral(&self) -> bool {
        !self.is_float()
    }

    pub fn is_float(&self) -> bool {
        matches!(self, ScalarKind::F32 | ScalarKind::F64)
    }

    pub fn display(&self) -> &'static str {
        match self {
            ScalarKind::I8 => "i8",
            ScalarKind::I16 => "i16",
            ScalarKind::I32 => "i32",
            ScalarKind::I64 => "i64",
            ScalarKind::U8 => "u8",
            ScalarKind::U16 => "u16",
            ScalarKind::U32 => "u32",
            ScalarKind::U64 => "u64",
            ScalarKind::F32 => "f32",
            ScalarKind::F64 => "f64",
        }
    }

    /// Bit pattern of the additive identity for this kind.
    ///
    /// Integers are stored as two's complement `i64`, floats as their IEEE bits.
    pub fn zero_bits(&self) -> u64 {
        match self {
            ScalarKind::F32 => 0.0f32.to_bits() as u64,
            ScalarKind::F64 => 0.0f64.to_bits(),
            _ => 0i64 as u64,
        }
    }

    /// Encode an integer into this kind's storage bits, wrapping to its width.
    pub fn encode_int(&self, value: i64) -> u64 {
        match self {
            ScalarKind::I8 => value as i8 as i64 as u64,
            ScalarKind::I16 => value as i16 as i64 as u64,
            ScalarKind::I32 => value as i32 as i64 as u64,
            ScalarKind::I64 => value as u64,
            ScalarKind::U8 => value as u8 as u64,
            ScalarKind::U16 => value as u16 as u64,
            ScalarKind::U32 => value as u32 as u64,
            ScalarKind::U64 => value as u64,
            ScalarKind::F32 => (value as f32).to_bits() as u64,
            ScalarKind::F64 => (value as f64).to_bits(),
        }
    }

    /// Encode a float into this kind's storage bits (truncating for integers).
    pub fn encode_float(&self, value: f64) -> u64 {
        match self {
            ScalarKind::F32 => (value as f32).to_bits() as u64,
            ScalarKind::F64 => value.to_bits(),
            _ => self.encode_int(value as i64),
        }
    }

    pub fn decode_int(&self, bits: u64) -> i64 {
        match self {
            ScalarKind::F32 => f32::from_bits(bits as u32) as i64,
            ScalarKind::F64 => f64::from_bits(bits) as i64,
            _ => bits as i64,
        }
    }

    pub fn decode_float(&self, bits: u64) -> f64 {
        match self {
            ScalarKind::F32 => f32::from_bits(bits as u32) as f64,
            ScalarKind::F64 => f64::from_bits(bits),
            ScalarKind::U64 => bits as f64,
            _ => bits as i64 as f64,
        }
    }
}

impl std::fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display())
    }
}

/// An integer literal tagged with its fixed-width representation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntValue {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
}

impl IntValue {
    pub fn kind(&self) -> ScalarKind {
        match self {
            IntValue::I8(_) => ScalarKind::I8,
            IntValue::I16(_) => ScalarKind::I16,
            IntValue::I32(_) => ScalarKind::I32,
            IntValue::I64(_) => ScalarKind::I64,
            IntValue::U8(_) => ScalarKind::U8,
            IntValue::U16(_) => ScalarKind::U16,
            IntValue::U32(_) => ScalarKind::U32,
            IntValue::U64(_) => ScalarKind::U64,
        }
    }

    /// Widen to `i64`. Only `u64` values above `i64::MAX` fail.
    pub fn to_i64(&self) -> Option<i64> {
        match *self {
            IntValue::I8(v) => Some(v as i64),
            IntValue::I16(v) => Some(v as i64),
            IntValue::I32(v) => Some(v as i64),
            IntValue::I64(v) => Some(v),
            IntValue::U8(v) => Some(v as i64),
            IntValue::U16(v) => Some(v as i64),
            IntValue::U32(v) => Some(v as i64),
            IntValue::U64(v) => i64::try_from(v).ok(),
        }
    }
}

impl std::fmt::Display for IntValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            IntValue::I8(v) => write!(f, "{}", v),
            IntValue::I16(v) => write!(f, "{}", v),
            IntValue::I32(v) => write!(f, "{}", v),
            IntValue::I64(v) => write!(f, "{}", v),
            IntValue::U8(v) => write!(f, "{}", v),
            IntValue::U16(v) => write!(f, "{}", v),
            IntValue::U32(v) => write!(f, "{}", v),
            IntValue::U64(v) => write!(f, "{}", v),
        }
    }
}

macro_rules! int_value_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$t> for IntValue {
                fn from(v: $t) -> Self {
                    IntValue::$variant(v)
                }
            }

            impl From<$t> for ScalarValue {
                fn from(v: $t) -> Self {
                    ScalarValue::Int(IntValue::$variant(v))
                }
            }
        )*
    };
}

int_value_from!(
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
);

/// A scalar kernel argument value.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum ScalarValue {
    Int(IntValue),
    Float(f64),
}

impl ScalarValue {
    pub fn kind(&self) -> ScalarKind {
        match self {
            ScalarValue::Int(v) => v.kind(),
            ScalarValue::Float(_) => ScalarKind::F64,
        }
    }
}

impl From<IntValue> for ScalarValue {
    fn from(v: IntValue) -> Self {
        ScalarValue::Int(v)
    }
}

impl From<f64> for ScalarValue {
    fn from(v: f64) -> Self {
        ScalarValue::Float(v)
    }
}
