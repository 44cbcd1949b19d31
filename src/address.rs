//! Positional paths such as `tbl[1]/tr[4]/tc[2]/p[0]/r[3]`.
//!
//! Indices count elements in the traversal produced by the word-processing body walker,
//! after control wrappers have been unwrapped, not raw XML child positions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    Paragraph,
    Table,
    Row,
    Cell,
    Run,
}

impl StepKind {
    pub fn tag(self) -> &'static str {
        match self {
            StepKind::Paragraph => "p",
            StepKind::Table => "tbl",
            StepKind::Row => "tr",
            StepKind::Cell => "tc",
            StepKind::Run => "r",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "p" => StepKind::Paragraph,
            "tbl" => StepKind::Table,
            "tr" => StepKind::Row,
            "tc" => StepKind::Cell,
            "r" => StepKind::Run,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Step {
    pub kind: StepKind,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Address {
    steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressParseError(String);

impl fmt::Display for AddressParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed address step '{}'", self.0)
    }
}

impl std::error::Error for AddressParseError {}

impl Address {
    pub fn root() -> Self {
        Address { steps: Vec::new() }
    }

    pub fn child(&self, kind: StepKind, index: usize) -> Self {
        let mut steps = self.steps.clone();
        steps.push(Step { kind, index });
        Address { steps }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn last(&self) -> Option<Step> {
        self.steps.last().copied()
    }

    pub fn parent(&self) -> Option<Address> {
        let (_, rest) = self.steps.split_last()?;
        Some(Address {
            steps: rest.to_vec(),
        })
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{}[{}]", step.kind.tag(), step.index)?;
        }
        Ok(())
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Address::root());
        }
        let steps = s
            .split('/')
            .map(|part| {
                let bad = || AddressParseError(part.to_string());
                let (tag, rest) = part.split_once('[').ok_or_else(bad)?;
                let index = rest.strip_suffix(']').ok_or_else(bad)?;
                Ok(Step {
                    kind: StepKind::from_tag(tag).ok_or_else(bad)?,
                    index: index.parse().map_err(|_| bad())?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Address { steps })
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_formats_nested_path() {
        let addr: Address = "tbl[1]/tr[4]/tc[2]/p[0]/r[3]".parse().unwrap();
        assert_eq!(addr.steps().len(), 5);
        assert_eq!(
            addr.steps()[2],
            Step {
                kind: StepKind::Cell,
                index: 2
            }
        );
        assert_eq!(addr.to_string(), "tbl[1]/tr[4]/tc[2]/p[0]/r[3]");
    }

    #[test]
    fn rejects_unknown_kind_and_bad_index() {
        assert!("sect[0]".parse::<Address>().is_err());
        assert!("p[x]".parse::<Address>().is_err());
        assert!("p[1".parse::<Address>().is_err());
    }

    #[test]
    fn child_and_parent() {
        let cell = Address::root()
            .child(StepKind::Table, 0)
            .child(StepKind::Row, 1)
            .child(StepKind::Cell, 2);
        assert_eq!(cell.to_string(), "tbl[0]/tr[1]/tc[2]");
        assert_eq!(cell.parent().unwrap().to_string(), "tbl[0]/tr[1]");
        assert!(Address::root().parent().is_none());
    }

    #[test]
    fn serializes_as_string() {
        let addr: Address = "p[3]/r[0]".parse().unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"p[3]/r[0]\"");
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}
