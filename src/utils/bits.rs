//! Lossless serde encodings of floating point values.
//!
//! JSON has no representation for NaN or the infinities, and serializers write them as `null`.
//! Literal operands and oracle results are therefore exchanged as their raw IEEE 754 bit
//! patterns, which also keeps NaN payloads and the sign of zero.

/// `f32` as its `u32` bit pattern, for `#[serde(with = "crate::utils::bits::f32_bits")]`.
pub(crate) mod f32_bits {
    use serde::{Deserialize, Deserializer, Serializer};

    pub(crate) fn serialize<S: Serializer>(value: &f32, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(value.to_bits())
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f32, D::Error> {
        u32::deserialize(deserializer).map(f32::from_bits)
    }
}

/// `f64` as its `u64` bit pattern, for `#[serde(with = "crate::utils::bits::f64_bits")]`.
pub(crate) mod f64_bits {
    use serde::{Deserialize, Deserializer, Serializer};

    pub(crate) fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.to_bits())
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        u64::deserialize(deserializer).map(f64::from_bits)
    }
}
