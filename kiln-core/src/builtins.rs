//! Built-in type names.
//!
//! The table is shared by every compilation unit. It is a `const`
//! slice, indexed once per process into a hash map; nothing mutates
//! it after start-up, so parallel compilations read it freely.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::types::{CWidth, IntWidth, Primitive};

/// A type name every unit can use without declaring it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinType {
    pub name: &'static str,
    pub primitive: Primitive,
}

const fn builtin(name: &'static str, primitive: Primitive) -> BuiltinType {
    BuiltinType { name, primitive }
}

const fn platform_int(width: CWidth) -> Primitive {
    Primitive::Int(IntWidth::Platform(width))
}

const fn platform_uint(width: CWidth) -> Primitive {
    Primitive::UInt(IntWidth::Platform(width))
}

pub const BUILTIN_TYPES: &[BuiltinType] = &[
    builtin("void", Primitive::Void),
    builtin("bool", Primitive::Bool),
    builtin("char", Primitive::Char),
    builtin("str", Primitive::Str),
    builtin("any", Primitive::Any),
    builtin("size", Primitive::Size),
    builtin("int", platform_int(CWidth::Int)),
    builtin("uint", platform_uint(CWidth::Int)),
    builtin("int8", Primitive::Int(IntWidth::Fixed(8))),
    builtin("int16", Primitive::Int(IntWidth::Fixed(16))),
    builtin("int32", Primitive::Int(IntWidth::Fixed(32))),
    builtin("int64", Primitive::Int(IntWidth::Fixed(64))),
    builtin("uint8", Primitive::UInt(IntWidth::Fixed(8))),
    builtin("uint16", Primitive::UInt(IntWidth::Fixed(16))),
    builtin("uint32", Primitive::UInt(IntWidth::Fixed(32))),
    builtin("uint64", Primitive::UInt(IntWidth::Fixed(64))),
    builtin("float", Primitive::Float),
    builtin("double", Primitive::Double),
    builtin("decimal", Primitive::Decimal),
    builtin("c_char", platform_int(CWidth::Char)),
    builtin("c_uchar", platform_uint(CWidth::Char)),
    builtin("c_short", platform_int(CWidth::Short)),
    builtin("c_ushort", platform_uint(CWidth::Short)),
    builtin("c_int", platform_int(CWidth::Int)),
    builtin("c_uint", platform_uint(CWidth::Int)),
    builtin("c_long", platform_int(CWidth::Long)),
    builtin("c_ulong", platform_uint(CWidth::Long)),
    builtin("c_longlong", platform_int(CWidth::LongLong)),
    builtin("c_ulonglong", platform_uint(CWidth::LongLong)),
];

fn builtin_index() -> &'static HashMap<&'static str, &'static BuiltinType> {
    static INDEX: OnceLock<HashMap<&'static str, &'static BuiltinType>> = OnceLock::new();
    INDEX.get_or_init(|| BUILTIN_TYPES.iter().map(|b| (b.name, b)).collect())
}

/// Look up a builtin type by its Kiln name.
pub fn find_builtin(name: &str) -> Option<&'static BuiltinType> {
    builtin_index().get(name).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_unique() {
        assert_eq!(builtin_index().len(), BUILTIN_TYPES.len());
    }

    #[test]
    fn int_is_platform_sized() {
        let int = find_builtin("int").expect("int builtin");
        assert_eq!(int.primitive, Primitive::INT);
        assert_eq!(int.primitive.to_string(), "@int{int_sz}");
        assert_eq!(
            find_builtin("c_ulong").map(|b| b.primitive.to_string()),
            Some("@uint{long_sz}".to_string())
        );
    }

    #[test]
    fn unknown_names_are_absent() {
        assert!(find_builtin("integer").is_none());
    }
}
