//! Type system for RapidBASIC semantic analysis.
//!
//! RapidBASIC has a compact type lattice: three numeric types, two string
//! representations (byte strings and, under `OPTION UNICODE`, codepoint
//! arrays), plus `Void` for SUBs and `Unknown` for not-yet-inferred slots.
//!
//! # Type Suffixes
//!
//! Variables declare their type via a name suffix:
//! - `$` STRING (name$) - UNICODE when Unicode mode is on
//! - `%` INTEGER (count%)
//! - `!` FLOAT (ratio!)
//! - `#` DOUBLE (pi#)
//!
//! Normalized long-form suffixes (`_STRING`, `_INT`, `_DOUBLE`) are also
//! recognized; the preprocessor rewrites some names into that shape.
//! Unsuffixed names default to FLOAT.

use std::fmt;

/// Internal type representation for semantic analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableType {
    /// Integer (`%`)
    Int,
    /// Single precision (`!` or default)
    Float,
    /// Double precision (`#`)
    Double,
    /// Byte string (`$`)
    String,
    /// Codepoint-array string (`$` under OPTION UNICODE)
    Unicode,
    /// No value (SUB return)
    Void,
    /// Not yet determined
    Unknown,
}

impl VariableType {
    /// Returns true for the numeric types.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            VariableType::Int | VariableType::Float | VariableType::Double
        )
    }

    /// Returns true for either string representation.
    pub fn is_string(&self) -> bool {
        matches!(self, VariableType::String | VariableType::Unicode)
    }
}

impl fmt::Display for VariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VariableType::Int => "INTEGER",
            VariableType::Float => "FLOAT",
            VariableType::Double => "DOUBLE",
            VariableType::String => "STRING",
            VariableType::Unicode => "UNICODE",
            VariableType::Void => "VOID",
            VariableType::Unknown => "UNKNOWN",
        };
        write!(f, "{}", name)
    }
}

/// The promoted type of a binary arithmetic operation.
///
/// String representations take precedence (Unicode over String), then the
/// numeric ladder Double > Float > Int. Symmetric in its arguments.
pub fn promote_types(left: VariableType, right: VariableType) -> VariableType {
    use VariableType as T;
    if left == T::Unicode || right == T::Unicode {
        return T::Unicode;
    }
    if left == T::String || right == T::String {
        return T::String;
    }
    if left == T::Double || right == T::Double {
        return T::Double;
    }
    if left == T::Float || right == T::Float {
        return T::Float;
    }
    if left == T::Int || right == T::Int {
        return T::Int;
    }
    T::Float
}

/// Infers a variable's type from its name suffix.
///
/// `unicode_mode` selects which string representation `$`-suffixed names
/// get. Unsuffixed names default to FLOAT, per BASIC tradition.
pub fn type_from_name(name: &str, unicode_mode: bool) -> VariableType {
    if name.is_empty() {
        return VariableType::Float;
    }

    let string_type = if unicode_mode {
        VariableType::Unicode
    } else {
        VariableType::String
    };

    // Normalized long-form suffixes first (A_STRING, B_INT, C_DOUBLE).
    if name.len() > 7 && name.ends_with("_STRING") {
        return string_type;
    }
    if name.len() > 4 && name.ends_with("_INT") {
        return VariableType::Int;
    }
    if name.len() > 7 && name.ends_with("_DOUBLE") {
        return VariableType::Double;
    }

    match name.chars().last() {
        Some('$') => string_type,
        Some('%') => VariableType::Int,
        Some('!') => VariableType::Float,
        Some('#') => VariableType::Double,
        _ => VariableType::Float,
    }
}

/// The single-character type suffix of a name, or `""` for default-typed
/// names. Carried on array opcodes for the code generator.
pub fn type_suffix_of(name: &str) -> &'static str {
    match name.chars().last() {
        Some('%') => "%",
        Some('#') => "#",
        Some('!') => "!",
        Some('$') => "$",
        Some('&') => "&",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_from_name_suffixes() {
        assert_eq!(type_from_name("name$", false), VariableType::String);
        assert_eq!(type_from_name("name$", true), VariableType::Unicode);
        assert_eq!(type_from_name("count%", false), VariableType::Int);
        assert_eq!(type_from_name("ratio!", false), VariableType::Float);
        assert_eq!(type_from_name("pi#", false), VariableType::Double);
        assert_eq!(type_from_name("x", false), VariableType::Float);
    }

    #[test]
    fn test_type_from_normalized_suffixes() {
        assert_eq!(type_from_name("A_STRING", false), VariableType::String);
        assert_eq!(type_from_name("B_INT", false), VariableType::Int);
        assert_eq!(type_from_name("C_DOUBLE", false), VariableType::Double);
        // Too short to carry the long suffix
        assert_eq!(type_from_name("_INT", false), VariableType::Float);
    }

    #[test]
    fn test_promotion_ladder() {
        use VariableType as T;
        assert_eq!(promote_types(T::Int, T::Float), T::Float);
        assert_eq!(promote_types(T::Float, T::Double), T::Double);
        assert_eq!(promote_types(T::Int, T::Int), T::Int);
        assert_eq!(promote_types(T::String, T::Int), T::String);
        assert_eq!(promote_types(T::String, T::Unicode), T::Unicode);
        assert_eq!(promote_types(T::Unknown, T::Unknown), T::Float);
    }

    #[test]
    fn test_promotion_commutes() {
        use VariableType as T;
        let all = [T::Int, T::Float, T::Double, T::String, T::Unicode];
        for &a in &all {
            for &b in &all {
                assert_eq!(promote_types(a, b), promote_types(b, a), "{a} + {b}");
            }
        }
    }

    #[test]
    fn test_type_suffix_of() {
        assert_eq!(type_suffix_of("A%"), "%");
        assert_eq!(type_suffix_of("S$"), "$");
        assert_eq!(type_suffix_of("X"), "");
    }
}
