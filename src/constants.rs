//! Indexed constant store shared between compile time and run time.
//!
//! Constants live in an append-only vector and are addressed by integer
//! index, so the generated code loads them with `LOAD_CONST <index>`
//! instead of a name lookup. The semantic analyzer populates the store
//! during constant folding; the runtime reads it back by index.
//!
//! Re-adding an existing name overwrites the value *in place*, keeping the
//! index stable for anything already compiled against it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A compile-time constant value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstantValue {
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit float.
    Float(f64),
    /// Owned string.
    Text(String),
}

impl ConstantValue {
    /// Whether the value is numeric (integer or float).
    pub fn is_numeric(&self) -> bool {
        matches!(self, ConstantValue::Integer(_) | ConstantValue::Float(_))
    }
}

impl From<i64> for ConstantValue {
    fn from(v: i64) -> Self {
        ConstantValue::Integer(v)
    }
}

impl From<f64> for ConstantValue {
    fn from(v: f64) -> Self {
        ConstantValue::Float(v)
    }
}

impl From<&str> for ConstantValue {
    fn from(v: &str) -> Self {
        ConstantValue::Text(v.to_string())
    }
}

impl From<String> for ConstantValue {
    fn from(v: String) -> Self {
        ConstantValue::Text(v)
    }
}

impl std::fmt::Display for ConstantValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstantValue::Integer(v) => write!(f, "{}", v),
            ConstantValue::Float(v) => write!(f, "{}", v),
            ConstantValue::Text(v) => write!(f, "{}", v),
        }
    }
}

/// The indexed constant store for one compilation unit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConstantsManager {
    /// Indexed storage.
    values: Vec<ConstantValue>,
    /// Name to index mapping.
    name_to_index: HashMap<String, usize>,
}

impl ConstantsManager {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            values: Vec::with_capacity(64),
            name_to_index: HashMap::new(),
        }
    }

    /// Adds a constant and returns its index.
    ///
    /// If the name already exists, the value at its index is overwritten
    /// and the existing index returned, so downstream references stay valid.
    pub fn add(&mut self, name: &str, value: impl Into<ConstantValue>) -> usize {
        let value = value.into();
        if let Some(&index) = self.name_to_index.get(name) {
            self.values[index] = value;
            return index;
        }
        let index = self.values.len();
        self.values.push(value);
        self.name_to_index.insert(name.to_string(), index);
        index
    }

    /// The value at `index`, or `None` when the index is out of range.
    pub fn get(&self, index: usize) -> Option<&ConstantValue> {
        self.values.get(index)
    }

    /// The value at `index` coerced to an integer.
    ///
    /// Floats truncate; text parses, yielding 0 when it is not a number.
    pub fn get_as_int(&self, index: usize) -> Option<i64> {
        Some(match self.get(index)? {
            ConstantValue::Integer(v) => *v,
            ConstantValue::Float(v) => *v as i64,
            ConstantValue::Text(s) => s.trim().parse().unwrap_or(0),
        })
    }

    /// The value at `index` coerced to a float.
    ///
    /// Integers widen; text parses, yielding 0.0 when it is not a number.
    pub fn get_as_float(&self, index: usize) -> Option<f64> {
        Some(match self.get(index)? {
            ConstantValue::Float(v) => *v,
            ConstantValue::Integer(v) => *v as f64,
            ConstantValue::Text(s) => s.trim().parse().unwrap_or(0.0),
        })
    }

    /// The value at `index` coerced to text via decimal rendering.
    pub fn get_as_text(&self, index: usize) -> Option<String> {
        Some(match self.get(index)? {
            ConstantValue::Text(s) => s.clone(),
            ConstantValue::Integer(v) => v.to_string(),
            ConstantValue::Float(v) => v.to_string(),
        })
    }

    /// Whether a constant with this name exists.
    pub fn has(&self, name: &str) -> bool {
        self.name_to_index.contains_key(name)
    }

    /// The index registered for `name`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    /// Number of constants in the store.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Removes every constant.
    pub fn clear(&mut self) {
        self.values.clear();
        self.name_to_index.clear();
    }

    /// Replaces this store's contents with a deep copy of `other`,
    /// preserving indices exactly. Used to restore a pre-populated
    /// baseline when an analyzer is reset between compilations.
    pub fn copy_from(&mut self, other: &ConstantsManager) {
        self.values = other.values.clone();
        self.name_to_index = other.name_to_index.clone();
    }

    /// All registered names, in no particular order.
    pub fn names(&self) -> Vec<String> {
        self.name_to_index.keys().cloned().collect()
    }

    /// Registers the engine-defined constants every program sees.
    pub fn add_predefined(&mut self) {
        // Mathematical constants
        self.add("PI", std::f64::consts::PI);
        self.add("E", std::f64::consts::E);
        self.add("SQRT2", std::f64::consts::SQRT_2);
        self.add("SQRT3", 1.732_050_807_568_877_3_f64);
        self.add("GOLDEN_RATIO", 1.618_033_988_749_895_f64);

        // Boolean constants
        self.add("TRUE", 1_i64);
        self.add("FALSE", 0_i64);

        // Display mode constants
        self.add("TEXT", 0_i64);
        self.add("LORES", 1_i64);
        self.add("MIDRES", 2_i64);
        self.add("HIRES", 3_i64);
        self.add("ULTRARES", 4_i64);

        // Color constants (24-bit RGB)
        self.add("BLACK", 0x000000_i64);
        self.add("WHITE", 0xFFFFFF_i64);
        self.add("RED", 0xFF0000_i64);
        self.add("GREEN", 0x00FF00_i64);
        self.add("BLUE", 0x0000FF_i64);
        self.add("YELLOW", 0xFFFF00_i64);
        self.add("CYAN", 0x00FFFF_i64);
        self.add("MAGENTA", 0xFF00FF_i64);

        // RGBA color constants (0xRRGGBBAA, SOLID_* fully opaque)
        self.add("SOLID_BLACK", 0x000000FF_i64);
        self.add("SOLID_WHITE", 0xFFFFFFFF_i64);
        self.add("SOLID_RED", 0xFF0000FF_i64);
        self.add("SOLID_GREEN", 0x00FF00FF_i64);
        self.add("SOLID_BLUE", 0x0000FFFF_i64);
        self.add("SOLID_YELLOW", 0xFFFF00FF_i64);
        self.add("SOLID_CYAN", 0x00FFFFFF_i64);
        self.add("SOLID_MAGENTA", 0xFF00FFFF_i64);
        self.add("CLEAR_BLACK", 0x00000000_i64);

        // C64 palette (0xAARRGGBB), used by the 16-color chunky features
        self.add("COLOUR_0", 0xFF000000_u32 as i64);
        self.add("COLOUR_1", 0xFFFFFFFF_u32 as i64);
        self.add("COLOUR_2", 0xFF880000_u32 as i64);
        self.add("COLOUR_3", 0xFFAAFFEE_u32 as i64);
        self.add("COLOUR_4", 0xFFCC44CC_u32 as i64);
        self.add("COLOUR_5", 0xFF00CC55_u32 as i64);
        self.add("COLOUR_6", 0xFF0000AA_u32 as i64);
        self.add("COLOUR_7", 0xFFEEEE77_u32 as i64);
        self.add("COLOUR_8", 0xFFDD8855_u32 as i64);
        self.add("COLOUR_9", 0xFF664400_u32 as i64);
        self.add("COLOUR_10", 0xFFFF7777_u32 as i64);
        self.add("COLOUR_11", 0xFF333333_u32 as i64);
        self.add("COLOUR_12", 0xFF777777_u32 as i64);
        self.add("COLOUR_13", 0xFFAAFF66_u32 as i64);
        self.add("COLOUR_14", 0xFF0088FF_u32 as i64);
        self.add("COLOUR_15", 0xFFBBBBBB_u32 as i64);

        // Voice waveform types
        self.add("WAVE_SILENCE", 0_i64);
        self.add("WAVE_SINE", 1_i64);
        self.add("WAVE_SQUARE", 2_i64);
        self.add("WAVE_SAWTOOTH", 3_i64);
        self.add("WAVE_TRIANGLE", 4_i64);
        self.add("WAVE_NOISE", 5_i64);
        self.add("WAVE_PULSE", 6_i64);
        self.add("WAVE_PHYSICAL", 7_i64);

        // Physical model types
        self.add("MODEL_PLUCKED_STRING", 0_i64);
        self.add("MODEL_STRUCK_BAR", 1_i64);
        self.add("MODEL_BLOWN_TUBE", 2_i64);
        self.add("MODEL_DRUMHEAD", 3_i64);
        self.add("MODEL_GLASS", 4_i64);

        // Filter types
        self.add("FILTER_NONE", 0_i64);
        self.add("FILTER_LOWPASS", 1_i64);
        self.add("FILTER_HIGHPASS", 2_i64);
        self.add("FILTER_BANDPASS", 3_i64);
        self.add("FILTER_NOTCH", 4_i64);

        // LFO waveform types
        self.add("LFO_SINE", 0_i64);
        self.add("LFO_TRIANGLE", 1_i64);
        self.add("LFO_SQUARE", 2_i64);
        self.add("LFO_SAWTOOTH", 3_i64);
        self.add("LFO_RANDOM", 4_i64);

        // Rectangle gradient modes
        self.add("ST_GRADIENT_SOLID", 0_i64);
        self.add("ST_GRADIENT_HORIZONTAL", 1_i64);
        self.add("ST_GRADIENT_VERTICAL", 2_i64);
        self.add("ST_GRADIENT_DIAGONAL_TL_BR", 3_i64);
        self.add("ST_GRADIENT_DIAGONAL_TR_BL", 4_i64);
        self.add("ST_GRADIENT_RADIAL", 5_i64);
        self.add("ST_GRADIENT_FOUR_CORNER", 6_i64);
        self.add("ST_GRADIENT_THREE_POINT", 7_i64);

        // Rectangle procedural pattern modes
        self.add("ST_PATTERN_OUTLINE", 100_i64);
        self.add("ST_PATTERN_DASHED_OUTLINE", 101_i64);
        self.add("ST_PATTERN_HORIZONTAL_STRIPES", 102_i64);
        self.add("ST_PATTERN_VERTICAL_STRIPES", 103_i64);
        self.add("ST_PATTERN_DIAGONAL_STRIPES", 104_i64);
        self.add("ST_PATTERN_CHECKERBOARD", 105_i64);
        self.add("ST_PATTERN_DOTS", 106_i64);
        self.add("ST_PATTERN_CROSSHATCH", 107_i64);
        self.add("ST_PATTERN_ROUNDED_CORNERS", 108_i64);
        self.add("ST_PATTERN_GRID", 109_i64);
    }
}
