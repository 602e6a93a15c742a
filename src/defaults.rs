//! Canonical blank values assigned to entity fields by
//! [`MetadataRegistry::reset_to_defaults`](crate::registry::MetadataRegistry::reset_to_defaults).
//!
//! Every field type registered on an [`EntitySchema`](crate::schema::EntitySchema)
//! must implement [`ColumnDefault`]. Numeric types reset to zero, `char` to a
//! space and `String` to a single space (not the empty string; existing callers
//! match on `" "` to detect a reset row). Types with no sensible blank value can
//! opt in with [`no_column_default!`](crate::no_column_default), which turns a
//! reset into a [`MetadataError::Construction`].

use num_bigint::BigInt;

use crate::registry::MetadataError;
use crate::schema::FieldKind;

pub const BLANK_TEXT: &str = " ";
pub const BLANK_CHAR: char = ' ';

pub trait ColumnDefault: Sized {
    const KIND: FieldKind = FieldKind::Other;

    fn column_default() -> Result<Self, MetadataError>;
}

macro_rules! integer_defaults {
    ($($ty:ty),*) => {
        $(
            impl ColumnDefault for $ty {
                const KIND: FieldKind = FieldKind::Integer { bits: <$ty>::BITS };

                fn column_default() -> Result<Self, MetadataError> {
                    Ok(0)
                }
            }
        )*
    };
}

integer_defaults!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl ColumnDefault for f32 {
    const KIND: FieldKind = FieldKind::Float { bits: 32 };

    fn column_default() -> Result<Self, MetadataError> {
        Ok(0.0)
    }
}

impl ColumnDefault for f64 {
    const KIND: FieldKind = FieldKind::Float { bits: 64 };

    fn column_default() -> Result<Self, MetadataError> {
        Ok(0.0)
    }
}

impl ColumnDefault for String {
    const KIND: FieldKind = FieldKind::Text;

    fn column_default() -> Result<Self, MetadataError> {
        Ok(BLANK_TEXT.to_string())
    }
}

impl ColumnDefault for char {
    const KIND: FieldKind = FieldKind::Char;

    fn column_default() -> Result<Self, MetadataError> {
        Ok(BLANK_CHAR)
    }
}

impl ColumnDefault for BigInt {
    const KIND: FieldKind = FieldKind::BigInt;

    fn column_default() -> Result<Self, MetadataError> {
        Ok(BigInt::from(0))
    }
}

impl ColumnDefault for bool {
    fn column_default() -> Result<Self, MetadataError> {
        Ok(false)
    }
}

impl<V> ColumnDefault for Option<V> {
    fn column_default() -> Result<Self, MetadataError> {
        Ok(None)
    }
}

impl<V> ColumnDefault for Vec<V> {
    fn column_default() -> Result<Self, MetadataError> {
        Ok(Vec::new())
    }
}

/// Implements [`ColumnDefault`] through the type's [`Default`] impl.
///
/// ```ignore
/// column_default_via_default!(Uuid, Address);
/// ```
#[macro_export]
macro_rules! column_default_via_default {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::defaults::ColumnDefault for $ty {
                fn column_default() -> ::std::result::Result<Self, $crate::registry::MetadataError> {
                    ::std::result::Result::Ok(<$ty as ::std::default::Default>::default())
                }
            }
        )+
    };
}

/// Implements [`ColumnDefault`] for types that cannot be blank-constructed.
/// Resetting an entity holding such a field fails with a construction error.
#[macro_export]
macro_rules! no_column_default {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::defaults::ColumnDefault for $ty {
                fn column_default() -> ::std::result::Result<Self, $crate::registry::MetadataError> {
                    ::std::result::Result::Err($crate::registry::MetadataError::Construction {
                        type_name: ::std::any::type_name::<$ty>(),
                        reason: "no default constructor".to_string(),
                    })
                }
            }
        )+
    };
}
