//! Enumeration descriptors: integral values with stable symbolic names.
//!
//! Archives persist enumerations by name, so renumbering an element never
//! invalidates files written before the change.

use smallvec::SmallVec;

/// One (value, name) pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumerationElement {
    pub value: i32,
    pub name: String,
}

/// Ordered (value, symbolic name) pairs for one Rust enum.
#[derive(Clone, Debug, Default)]
pub struct Enumeration {
    name: String,
    elements: SmallVec<[EnumerationElement; 8]>,
    bitfield: bool,
}

impl Enumeration {
    /// Create an empty enumeration.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Create an empty bitfield enumeration; values combine as `A|B` on disk.
    pub fn bitfield(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bitfield: true,
            ..Self::default()
        }
    }

    /// Enumeration name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True for bitfield enumerations.
    pub fn is_bitfield(&self) -> bool {
        self.bitfield
    }

    /// Append an element. Later duplicates of a name replace the value.
    pub fn add_element(&mut self, value: i32, name: impl Into<String>) -> &mut Self {
        let name = name.into();
        match self.elements.iter_mut().find(|e| e.name == name) {
            Some(existing) => existing.value = value,
            None => self.elements.push(EnumerationElement { value, name }),
        }
        self
    }

    /// Elements in declaration order.
    pub fn elements(&self) -> &[EnumerationElement] {
        &self.elements
    }

    /// Look up the name of a value.
    pub fn name_of(&self, value: i32) -> Option<&str> {
        self.elements
            .iter()
            .find(|e| e.value == value)
            .map(|e| e.name.as_str())
    }

    /// Look up the value of a name.
    pub fn value_of(&self, name: &str) -> Option<i32> {
        self.elements.iter().find(|e| e.name == name).map(|e| e.value)
    }

    /// Symbolic form of a value as written to disk.
    ///
    /// Bitfields join every set element name with `|`; plain enumerations
    /// return `None` for values without a name.
    pub fn encode(&self, value: i32) -> Option<String> {
        if !self.bitfield {
            return self.name_of(value).map(str::to_owned);
        }
        let names: Vec<&str> = self
            .elements
            .iter()
            .filter(|e| e.value != 0 && value & e.value == e.value)
            .map(|e| e.name.as_str())
            .collect();
        if names.is_empty() {
            return Some(self.name_of(0).unwrap_or_default().to_owned());
        }
        Some(names.join("|"))
    }

    /// Integral value of a stored symbol.
    ///
    /// Plain enumerations also accept the decimal form written for values
    /// without a name, and return `None` for unknown names. Bitfields
    /// ignore unknown names.
    pub fn decode(&self, symbol: &str) -> Option<i32> {
        if !self.bitfield {
            return self.value_of(symbol).or_else(|| symbol.parse().ok());
        }
        Some(
            symbol
                .split('|')
                .filter(|s| !s.is_empty())
                .filter_map(|s| self.value_of(s))
                .fold(0, |acc, v| acc | v),
        )
    }
}

/// Rust enums that can back an enumeration field.
pub trait ReflectEnum: Copy + Send + Sync + 'static {
    /// Declare the (value, name) pairs.
    fn enumerate(enumeration: &mut Enumeration);

    /// Registered enumeration name.
    fn enumeration_name() -> &'static str;

    /// True when values combine as flags.
    fn is_bitfield() -> bool {
        false
    }

    /// Integral value.
    fn to_i32(self) -> i32;

    /// Rebuild from an integral value.
    fn from_i32(value: i32) -> Option<Self>;

    /// Build the descriptor for this enum.
    fn enumeration() -> Enumeration {
        let mut e = if Self::is_bitfield() {
            Enumeration::bitfield(Self::enumeration_name())
        } else {
            Enumeration::new(Self::enumeration_name())
        };
        Self::enumerate(&mut e);
        e
    }
}
