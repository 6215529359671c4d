//! Pulse, code, and library data model
//!
//! An infrared code is an alternating sequence of *marks* (carrier on) and
//! *spaces* (carrier off), each a duration in microseconds. A valid code
//! always starts with a mark. Every pulse carries its kind explicitly so
//! downstream code never has to reason about index parity.
//!
//! On disk a code is a flat JSON array of durations (mark first,
//! alternating), and a library is a JSON object mapping command names to
//! such arrays, the same layout earlier capture tooling produced, so
//! existing libraries load unchanged.

use std::collections::BTreeMap;

use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};

/// Whether a pulse drives the carrier or leaves the line silent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PulseKind {
    /// Carrier on (modulated burst)
    Mark,
    /// Carrier off (silence)
    Space,
}

impl PulseKind {
    /// Kind implied by a position in a mark-first alternating sequence.
    pub fn at(index: usize) -> Self {
        if index % 2 == 0 {
            PulseKind::Mark
        } else {
            PulseKind::Space
        }
    }

    /// The kind that must follow this one.
    pub fn opposite(self) -> Self {
        match self {
            PulseKind::Mark => PulseKind::Space,
            PulseKind::Space => PulseKind::Mark,
        }
    }
}

/// One pulse of an infrared code: a kind plus a duration in microseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pulse {
    pub kind: PulseKind,
    pub micros: f64,
}

impl Pulse {
    pub fn mark(micros: f64) -> Self {
        Self {
            kind: PulseKind::Mark,
            micros,
        }
    }

    pub fn space(micros: f64) -> Self {
        Self {
            kind: PulseKind::Space,
            micros,
        }
    }
}

/// An ordered mark-first alternating pulse sequence.
///
/// The alternation invariant is maintained by construction: pulses can only
/// enter a code through [`Code::from_gaps`] or deserialization, both of
/// which assign kinds by position.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Code {
    pulses: Vec<Pulse>,
}

impl Code {
    /// Build a code from raw inter-edge gaps, mark first.
    pub fn from_gaps(gaps: &[f64]) -> Self {
        let pulses = gaps
            .iter()
            .enumerate()
            .map(|(i, &micros)| Pulse {
                kind: PulseKind::at(i),
                micros,
            })
            .collect();
        Self { pulses }
    }

    pub fn len(&self) -> usize {
        self.pulses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pulses.is_empty()
    }

    pub fn pulses(&self) -> &[Pulse] {
        &self.pulses
    }

    /// Durations of all pulses of one kind, in code order.
    pub fn durations(&self, kind: PulseKind) -> Vec<f64> {
        self.pulses
            .iter()
            .filter(|p| p.kind == kind)
            .map(|p| p.micros)
            .collect()
    }

    /// Overwrite the durations of all pulses of one kind, in code order.
    ///
    /// # Panics
    ///
    /// Panics if `values` does not match the number of pulses of `kind`;
    /// normalization always writes back exactly what it read.
    pub fn set_durations(&mut self, kind: PulseKind, values: &[f64]) {
        let mut values = values.iter();
        for pulse in self.pulses.iter_mut().filter(|p| p.kind == kind) {
            pulse.micros = *values
                .next()
                .expect("duration count mismatch for pulse kind");
        }
        assert!(
            values.next().is_none(),
            "duration count mismatch for pulse kind"
        );
    }

    /// Total duration of the code in microseconds.
    pub fn total_micros(&self) -> f64 {
        self.pulses.iter().map(|p| p.micros).sum()
    }

    /// Count of distinct durations among pulses of one kind.
    pub fn distinct_durations(&self, kind: PulseKind) -> usize {
        let mut keys: Vec<u64> = self
            .pulses
            .iter()
            .filter(|p| p.kind == kind)
            .map(|p| (p.micros * 100.0).round() as u64)
            .collect();
        keys.sort_unstable();
        keys.dedup();
        keys.len()
    }
}

impl Serialize for Code {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.pulses.len()))?;
        for pulse in &self.pulses {
            seq.serialize_element(&pulse.micros)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for Code {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CodeVisitor;

        impl<'de> Visitor<'de> for CodeVisitor {
            type Value = Code;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a sequence of non-negative pulse durations")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Code, A::Error> {
                let mut gaps: Vec<f64> = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(micros) = seq.next_element::<f64>()? {
                    if micros < 0.0 {
                        return Err(de::Error::custom(format!(
                            "negative pulse duration: {micros}"
                        )));
                    }
                    gaps.push(micros);
                }
                Ok(Code::from_gaps(&gaps))
            }
        }

        deserializer.deserialize_seq(CodeVisitor)
    }
}

/// A code library: command name to canonical code, sorted by name.
///
/// Loaded from persisted storage (or empty if absent) at the start of a
/// recording session, mutated one entry per captured command, re-normalized
/// as a whole before being persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Library {
    codes: BTreeMap<String, Code>,
}

impl Library {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the code for a command.
    pub fn insert(&mut self, command: impl Into<String>, code: Code) {
        self.codes.insert(command.into(), code);
    }

    pub fn get(&self, command: &str) -> Option<&Code> {
        self.codes.get(command)
    }

    pub fn contains(&self, command: &str) -> bool {
        self.codes.contains_key(command)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Command names in sorted order.
    pub fn commands(&self) -> impl Iterator<Item = &str> {
        self.codes.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Code)> {
        self.codes.iter().map(|(name, code)| (name.as_str(), code))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Code)> {
        self.codes.iter_mut().map(|(name, code)| (name.as_str(), code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_gaps_alternates_mark_first() {
        let code = Code::from_gaps(&[9000.0, 4500.0, 600.0, 550.0]);
        assert_eq!(
            code.pulses(),
            &[
                Pulse::mark(9000.0),
                Pulse::space(4500.0),
                Pulse::mark(600.0),
                Pulse::space(550.0)
            ]
        );
        assert_eq!(code.total_micros(), 14_650.0);
    }

    #[test]
    fn test_durations_split_by_kind() {
        let code = Code::from_gaps(&[9000.0, 4500.0, 600.0, 550.0, 620.0]);
        assert_eq!(code.durations(PulseKind::Mark), vec![9000.0, 600.0, 620.0]);
        assert_eq!(code.durations(PulseKind::Space), vec![4500.0, 550.0]);
    }

    #[test]
    fn test_set_durations_preserves_order_and_alternation() {
        let mut code = Code::from_gaps(&[9000.0, 4500.0, 600.0, 550.0, 620.0]);
        code.set_durations(PulseKind::Mark, &[9000.0, 609.0, 609.0]);
        assert_eq!(
            code.durations(PulseKind::Mark),
            vec![9000.0, 609.0, 609.0]
        );
        // Spaces untouched
        assert_eq!(code.durations(PulseKind::Space), vec![4500.0, 550.0]);
        assert_eq!(code.len(), 5);
    }

    #[test]
    fn test_distinct_durations() {
        let code = Code::from_gaps(&[9000.0, 4500.0, 609.0, 550.0, 609.0, 1675.0, 609.0]);
        assert_eq!(code.distinct_durations(PulseKind::Mark), 2);
        assert_eq!(code.distinct_durations(PulseKind::Space), 3);
    }

    #[test]
    fn test_code_serializes_as_flat_array() {
        let code = Code::from_gaps(&[9000.0, 4500.0, 609.5]);
        let json = serde_json::to_string(&code).unwrap();
        assert_eq!(json, "[9000.0,4500.0,609.5]");
    }

    #[test]
    fn test_code_deserialize_round_trip() {
        let code = Code::from_gaps(&[9000.0, 4500.0, 609.0, 550.0]);
        let json = serde_json::to_string(&code).unwrap();
        let back: Code = serde_json::from_str(&json).unwrap();
        assert_eq!(back, code);
    }

    #[test]
    fn test_code_deserialize_rejects_negative_duration() {
        let result: Result<Code, _> = serde_json::from_str("[9000.0,-4500.0]");
        assert!(result.is_err());
    }

    #[test]
    fn test_library_sorted_keys_in_json() {
        let mut library = Library::new();
        library.insert("off", Code::from_gaps(&[100.0, 50.0]));
        library.insert("cool26", Code::from_gaps(&[200.0, 75.0]));
        let json = serde_json::to_string(&library).unwrap();
        let cool = json.find("cool26").unwrap();
        let off = json.find("off").unwrap();
        assert!(cool < off);
    }

    #[test]
    fn test_library_round_trip() {
        let mut library = Library::new();
        library.insert("heat22", Code::from_gaps(&[9000.0, 4500.0, 609.0]));
        let json = serde_json::to_string(&library).unwrap();
        let back: Library = serde_json::from_str(&json).unwrap();
        assert_eq!(back, library);
    }
}
