//! Built-in function table.
//!
//! The core language ships a fixed set of math and string functions. The
//! analyzer uses this table to disambiguate `name(args)` shapes, check
//! argument counts, and infer return types. Host extensions come in through
//! the [`CommandRegistry`](crate::registry::CommandRegistry) instead.

use crate::semantic::types::VariableType;
use std::collections::HashMap;

/// Arity of a built-in function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgCount {
    /// Exactly this many arguments.
    Exact(usize),
    /// Argument count varies (RND, INSTR, MID$).
    Variadic,
}

/// The table of core built-in functions, keyed by uppercase name.
#[derive(Debug, Clone)]
pub struct BuiltinTable {
    functions: HashMap<&'static str, ArgCount>,
}

impl BuiltinTable {
    /// Builds the standard table.
    pub fn new() -> Self {
        let mut functions = HashMap::new();

        // Math functions (one argument, FLOAT result)
        for name in [
            "ABS", "SIN", "COS", "TAN", "ATN", "SQR", "INT", "SGN", "LOG", "EXP",
        ] {
            functions.insert(name, ArgCount::Exact(1));
        }
        // RND takes 0 or 1 arguments
        functions.insert("RND", ArgCount::Variadic);
        functions.insert("TIMER", ArgCount::Exact(0));
        functions.insert("MIN", ArgCount::Exact(2));
        functions.insert("MAX", ArgCount::Exact(2));

        // String functions
        functions.insert("LEN", ArgCount::Exact(1));
        functions.insert("ASC", ArgCount::Exact(1));
        functions.insert("CHR$", ArgCount::Exact(1));
        functions.insert("STR$", ArgCount::Exact(1));
        functions.insert("VAL", ArgCount::Exact(1));
        functions.insert("LEFT$", ArgCount::Exact(2));
        functions.insert("RIGHT$", ArgCount::Exact(2));
        functions.insert("MID$", ArgCount::Variadic); // (s$, start[, len])
        functions.insert("INSTR", ArgCount::Variadic); // ([start,] s$, find$)
        functions.insert("STRING$", ArgCount::Exact(2));
        functions.insert("SPACE$", ArgCount::Exact(1));
        functions.insert("LCASE$", ArgCount::Exact(1));
        functions.insert("UCASE$", ArgCount::Exact(1));
        functions.insert("LTRIM$", ArgCount::Exact(1));
        functions.insert("RTRIM$", ArgCount::Exact(1));
        functions.insert("TRIM$", ArgCount::Exact(1));
        functions.insert("REVERSE$", ArgCount::Exact(1));

        Self { functions }
    }

    /// Whether `name` is a core built-in.
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// The built-in's arity, if it exists.
    pub fn arg_count(&self, name: &str) -> Option<ArgCount> {
        self.functions.get(name).copied()
    }

    /// A built-in's return type. `$`-suffixed names return the active
    /// string representation; LEN and ASC return INTEGER; the rest FLOAT.
    pub fn return_type(&self, name: &str, unicode_mode: bool) -> VariableType {
        if !self.contains(name) {
            return VariableType::Unknown;
        }
        if name.ends_with('$') {
            return if unicode_mode {
                VariableType::Unicode
            } else {
                VariableType::String
            };
        }
        if name == "LEN" || name == "ASC" {
            return VariableType::Int;
        }
        VariableType::Float
    }
}

impl Default for BuiltinTable {
    fn default() -> Self {
        Self::new()
    }
}
