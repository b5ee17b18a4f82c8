//! Host command registry and event vocabulary.
//!
//! The engine that embeds the compiler can extend the language with extra
//! functions (graphics, sound, assets) and reacts to a fixed set of event
//! names (`ON KEYPRESSED CALL ...`). Rather than consulting process-wide
//! globals, the semantic analyzer takes a [`CommandRegistry`] at
//! construction, so two analyzers in one process can validate against two
//! different registries.

use crate::semantic::VariableType;
use std::collections::{HashMap, HashSet};

/// Return type of a registry-provided function, as declared by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryReturn {
    Int,
    Float,
    Text,
    /// Booleans surface as integers in BASIC.
    Bool,
    /// Command-only entries that produce no value.
    Void,
}

impl RegistryReturn {
    /// The semantic type this return maps to. String results follow the
    /// Unicode mode of the current compilation.
    pub fn variable_type(&self, unicode_mode: bool) -> VariableType {
        match self {
            RegistryReturn::Int | RegistryReturn::Bool => VariableType::Int,
            RegistryReturn::Float => VariableType::Float,
            RegistryReturn::Text => {
                if unicode_mode {
                    VariableType::Unicode
                } else {
                    VariableType::String
                }
            }
            RegistryReturn::Void => VariableType::Void,
        }
    }
}

/// One host-registered function.
#[derive(Debug, Clone)]
pub struct RegistryFunction {
    /// Function name as written in source (uppercase).
    pub name: String,
    /// Required argument count; `None` for variadic entries.
    pub arg_count: Option<usize>,
    /// Declared return type.
    pub returns: RegistryReturn,
}

/// The registry handed to the semantic analyzer: extension functions plus
/// the event-name vocabulary accepted by `ON <event>` statements.
#[derive(Debug, Clone)]
pub struct CommandRegistry {
    functions: HashMap<String, RegistryFunction>,
    events: HashSet<String>,
}

impl CommandRegistry {
    /// An empty registry: no extension functions, no events.
    pub fn empty() -> Self {
        Self {
            functions: HashMap::new(),
            events: HashSet::new(),
        }
    }

    /// Registers a host function. Later registrations win.
    pub fn register_function(
        &mut self,
        name: &str,
        arg_count: Option<usize>,
        returns: RegistryReturn,
    ) {
        let name = name.to_uppercase();
        self.functions.insert(
            name.clone(),
            RegistryFunction {
                name,
                arg_count,
                returns,
            },
        );
    }

    /// Adds an event name to the vocabulary.
    pub fn register_event(&mut self, name: &str) {
        self.events.insert(name.to_uppercase());
    }

    /// Looks up a registered function (case-insensitive).
    pub fn function(&self, name: &str) -> Option<&RegistryFunction> {
        self.functions.get(&name.to_uppercase())
    }

    /// Whether `name` is a known event (case-insensitive).
    pub fn is_valid_event(&self, name: &str) -> bool {
        self.events.contains(&name.to_uppercase())
    }

    /// All known event names, sorted.
    pub fn event_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.events.iter().cloned().collect();
        names.sort();
        names
    }
}

impl Default for CommandRegistry {
    /// The engine's standard vocabulary: keyboard, mouse, and joystick
    /// input events plus the timing and program events.
    fn default() -> Self {
        let mut reg = Self::empty();
        for event in [
            // Keyboard
            "KEYPRESSED",
            "KEY_UP",
            "KEY_DOWN",
            // Mouse
            "LEFT_MOUSE",
            "RIGHT_MOUSE",
            "MIDDLE_MOUSE",
            "MOUSE_MOVE",
            "MOUSE_WHEEL",
            // Joystick
            "FIRE_BUTTON",
            "FIRE2_BUTTON",
            "JOYSTICK_UP",
            "JOYSTICK_DOWN",
            "JOYSTICK_LEFT",
            "JOYSTICK_RIGHT",
            // Timing
            "TIMER",
            "FRAME",
            "SECOND",
            // Program
            "ERROR",
            "BREAK",
        ] {
            reg.register_event(event);
        }
        reg
    }
}
