//! Resolved types.
//!
//! Integer widths are kept symbolic: `int` is "whatever C's `int` is",
//! rendered `@int{int_sz}`. Only the C emitter turns a width tag into
//! a concrete bit count, through its data model. Function types compare
//! structurally; [`match_signature`] reports the first position where
//! two signatures differ.

use std::fmt;

use crate::error::SignaturePosition;

/// C integer widths that depend on the target data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CWidth {
    Char,
    Short,
    Int,
    Long,
    LongLong,
}

impl CWidth {
    /// Size tag used in dumps.
    pub fn tag(self) -> &'static str {
        match self {
            CWidth::Char => "char_sz",
            CWidth::Short => "short_sz",
            CWidth::Int => "int_sz",
            CWidth::Long => "long_sz",
            CWidth::LongLong => "longlong_sz",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntWidth {
    Fixed(u8),
    Platform(CWidth),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Int(IntWidth),
    UInt(IntWidth),
    Float,
    Double,
    /// Extended precision float (`long double`).
    Decimal,
    Str,
    Char,
    Bool,
    Void,
    Size,
    Any,
}

impl Primitive {
    /// The type of plain integer literals and of `int`.
    pub const INT: Primitive = Primitive::Int(IntWidth::Platform(CWidth::Int));
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (name, width) = match self {
            Primitive::Int(width) => ("int", width),
            Primitive::UInt(width) => ("uint", width),
            Primitive::Float => return f.write_str("@float"),
            Primitive::Double => return f.write_str("@double"),
            Primitive::Decimal => return f.write_str("@decimal"),
            Primitive::Str => return f.write_str("@str"),
            Primitive::Char => return f.write_str("@char"),
            Primitive::Bool => return f.write_str("@bool"),
            Primitive::Void => return f.write_str("@void"),
            Primitive::Size => return f.write_str("@size"),
            Primitive::Any => return f.write_str("@any"),
        };
        match width {
            IntWidth::Fixed(bits) => write!(f, "@{name}{bits}"),
            IntWidth::Platform(width) => write!(f, "@{name}{{{}}}", width.tag()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Variadic {
    /// Untyped C variadic (`...`).
    C,
    /// `T...`: extra arguments of type `T`.
    Typed(Box<Type>),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionSig {
    pub ret: Box<Type>,
    pub params: Vec<Type>,
    pub variadic: Option<Variadic>,
}

impl FunctionSig {
    pub fn new(ret: Type, params: Vec<Type>, variadic: Option<Variadic>) -> Self {
        FunctionSig {
            ret: Box::new(ret),
            params,
            variadic,
        }
    }
}

impl fmt::Display for FunctionSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "func<{}(", self.ret)?;
        for (index, param) in self.params.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{param}")?;
        }
        match &self.variadic {
            None => {}
            Some(variadic) => {
                if !self.params.is_empty() {
                    f.write_str(", ")?;
                }
                match variadic {
                    Variadic::C => f.write_str("...")?,
                    Variadic::Typed(ty) => write!(f, "{ty}...")?,
                }
            }
        }
        f.write_str(")>")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Primitive(Primitive),
    Reference(Box<Type>),
    Array { elem: Box<Type>, length: Option<u64> },
    Function(FunctionSig),
}

impl Type {
    pub const fn primitive(p: Primitive) -> Type {
        Type::Primitive(p)
    }

    pub fn int() -> Type {
        Type::Primitive(Primitive::INT)
    }

    pub fn any() -> Type {
        Type::Primitive(Primitive::Any)
    }

    pub fn reference(inner: Type) -> Type {
        Type::Reference(Box::new(inner))
    }

    pub fn array(elem: Type, length: Option<u64>) -> Type {
        Type::Array {
            elem: Box::new(elem),
            length,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Primitive(Primitive::Void))
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Type::Primitive(Primitive::Any))
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Type::Reference(_))
    }

    /// Integers, floats, characters, booleans and sizes.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Type::Primitive(
                Primitive::Int(_)
                    | Primitive::UInt(_)
                    | Primitive::Float
                    | Primitive::Double
                    | Primitive::Decimal
                    | Primitive::Char
                    | Primitive::Bool
                    | Primitive::Size
            )
        )
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Type::Primitive(Primitive::Int(_) | Primitive::UInt(_) | Primitive::Char | Primitive::Size)
        )
    }

    pub fn is_floating(&self) -> bool {
        matches!(
            self,
            Type::Primitive(Primitive::Float | Primitive::Double | Primitive::Decimal)
        )
    }

    /// The referenced type, or `self` when not a reference.
    pub fn strip_reference(&self) -> &Type {
        match self {
            Type::Reference(inner) => inner.strip_reference(),
            other => other,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionSig> {
        match self.strip_reference() {
            Type::Function(sig) => Some(sig),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Primitive(p) => write!(f, "{p}"),
            Type::Reference(inner) => write!(f, "ref {inner}"),
            Type::Array { elem, length: Some(n) } => write!(f, "{elem}[{n}]"),
            Type::Array { elem, length: None } => write!(f, "{elem}[]"),
            Type::Function(sig) => write!(f, "{sig}"),
        }
    }
}

/// Compare a function against the `func<...>` type it is assigned to.
///
/// Parameters, `ref` qualifiers, array-ness and the return type must
/// match positionally; the first difference is reported.
pub fn match_signature(expected: &FunctionSig, found: &FunctionSig) -> Result<(), SignaturePosition> {
    if expected.params.len() != found.params.len() {
        return Err(SignaturePosition::Arity {
            expected: expected.params.len(),
            found: found.params.len(),
        });
    }
    for (index, (want, got)) in expected.params.iter().zip(&found.params).enumerate() {
        if !same_type(want, got) {
            return Err(SignaturePosition::Parameter(index));
        }
    }
    let variadic_matches = match (&expected.variadic, &found.variadic) {
        (None, None) | (Some(Variadic::C), Some(Variadic::C)) => true,
        (Some(Variadic::Typed(a)), Some(Variadic::Typed(b))) => same_type(a, b),
        _ => false,
    };
    if !variadic_matches {
        return Err(SignaturePosition::Variadic);
    }
    if !same_type(&expected.ret, &found.ret) {
        return Err(SignaturePosition::Return);
    }
    Ok(())
}

fn same_type(a: &Type, b: &Type) -> bool {
    match (a, b) {
        (Type::Function(x), Type::Function(y)) => match_signature(x, y).is_ok(),
        (Type::Reference(x), Type::Reference(y)) => same_type(x, y),
        (Type::Array { elem: x, length: lx }, Type::Array { elem: y, length: ly }) => {
            lx == ly && same_type(x, y)
        }
        _ => a == b,
    }
}

/// Why a value of one type cannot be stored into another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Incompatibility {
    Type,
    Signature(SignaturePosition),
}

/// Assignability of a non-literal value of type `found` into `expected`.
///
/// Numeric types convert freely like in C, `@any` accepts and produces
/// anything, references are read through and function values must
/// match structurally.
pub fn check_assignable(found: &Type, expected: &Type) -> Result<(), Incompatibility> {
    let expected = expected.strip_reference();
    let found = found.strip_reference();
    if expected.is_any() || found.is_any() {
        return Ok(());
    }
    match (found, expected) {
        (Type::Function(f), Type::Function(e)) => {
            match_signature(e, f).map_err(Incompatibility::Signature)
        }
        (Type::Array { elem: f, .. }, Type::Array { elem: e, .. }) => {
            if same_type(f, e) {
                Ok(())
            } else {
                Err(Incompatibility::Type)
            }
        }
        (Type::Primitive(Primitive::Str), Type::Primitive(Primitive::Str)) => Ok(()),
        (Type::Array { elem, .. }, Type::Primitive(Primitive::Str))
        | (Type::Primitive(Primitive::Str), Type::Array { elem, .. })
            if matches!(**elem, Type::Primitive(Primitive::Char)) =>
        {
            Ok(())
        }
        _ if found.is_numeric() && expected.is_numeric() => Ok(()),
        _ if found == expected => Ok(()),
        _ => Err(Incompatibility::Type),
    }
}

/// Assignability of a value passed or bound by reference. The callee
/// writes through the pointer, so the referenced types must agree
/// exactly; only array lengths may differ.
pub fn check_referent(found: &Type, expected: &Type) -> Result<(), Incompatibility> {
    let expected = expected.strip_reference();
    let found = found.strip_reference();
    if expected.is_any() || found.is_any() {
        return Ok(());
    }
    match (found, expected) {
        (Type::Function(f), Type::Function(e)) => {
            match_signature(e, f).map_err(Incompatibility::Signature)
        }
        (Type::Array { elem: f, .. }, Type::Array { elem: e, .. }) if same_type(f, e) => Ok(()),
        _ if same_type(found, expected) => Ok(()),
        _ => Err(Incompatibility::Type),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int32() -> Type {
        Type::Primitive(Primitive::Int(IntWidth::Fixed(32)))
    }

    #[test]
    fn renders_width_tags() {
        assert_eq!(Type::int().to_string(), "@int{int_sz}");
        assert_eq!(
            Type::Primitive(Primitive::UInt(IntWidth::Platform(CWidth::Long))).to_string(),
            "@uint{long_sz}"
        );
        assert_eq!(int32().to_string(), "@int32");
        assert_eq!(Type::reference(Type::array(int32(), Some(4))).to_string(), "ref @int32[4]");
    }

    #[test]
    fn renders_function_types() {
        let sig = FunctionSig::new(
            Type::Primitive(Primitive::Void),
            vec![Type::reference(Type::int())],
            Some(Variadic::C),
        );
        assert_eq!(sig.to_string(), "func<@void(ref @int{int_sz}, ...)>");
    }

    #[test]
    fn signature_mismatch_reports_first_parameter() {
        let expected = FunctionSig::new(Type::int(), vec![Type::int(), Type::int()], None);
        let found = FunctionSig::new(
            Type::Primitive(Primitive::Void),
            vec![Type::int(), Type::Primitive(Primitive::Str)],
            None,
        );
        assert_eq!(
            match_signature(&expected, &found),
            Err(SignaturePosition::Parameter(1))
        );
    }

    #[test]
    fn signature_distinguishes_reference_and_array() {
        let by_value = FunctionSig::new(Type::int(), vec![Type::int()], None);
        let by_ref = FunctionSig::new(Type::int(), vec![Type::reference(Type::int())], None);
        let by_array = FunctionSig::new(Type::int(), vec![Type::array(Type::int(), None)], None);
        assert_eq!(match_signature(&by_value, &by_ref), Err(SignaturePosition::Parameter(0)));
        assert_eq!(match_signature(&by_value, &by_array), Err(SignaturePosition::Parameter(0)));
        assert_eq!(match_signature(&by_ref, &by_ref.clone()), Ok(()));
    }

    #[test]
    fn signature_checks_arity_variadic_and_return() {
        let base = FunctionSig::new(Type::int(), vec![Type::int()], None);
        let more = FunctionSig::new(Type::int(), vec![Type::int(), Type::int()], None);
        let variadic = FunctionSig::new(Type::int(), vec![Type::int()], Some(Variadic::C));
        let other_ret = FunctionSig::new(int32(), vec![Type::int()], None);
        assert_eq!(
            match_signature(&base, &more),
            Err(SignaturePosition::Arity { expected: 1, found: 2 })
        );
        assert_eq!(match_signature(&base, &variadic), Err(SignaturePosition::Variadic));
        assert_eq!(match_signature(&base, &other_ret), Err(SignaturePosition::Return));
    }

    #[test]
    fn numeric_values_convert() {
        assert_eq!(check_assignable(&int32(), &Type::int()), Ok(()));
        assert_eq!(
            check_assignable(&Type::Primitive(Primitive::Str), &Type::int()),
            Err(Incompatibility::Type)
        );
        assert_eq!(check_assignable(&Type::reference(Type::int()), &int32()), Ok(()));
    }
}
