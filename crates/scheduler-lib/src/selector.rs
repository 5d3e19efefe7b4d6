//! Selector expansion and specificity scoring

use crate::crd::WorkloadSelector;
use crate::models::{WorkloadKind, WILDCARD};
use std::fmt;
use std::str::FromStr;

/// Which selector dimensions were explicitly constrained.
///
/// Bits from most to least significant: namespace, kind, name, labels. A
/// higher value is a more specific selector and wins conflicts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Specificity(u8);

impl Specificity {
    pub const NAMESPACE: u8 = 0b1000;
    pub const KIND: u8 = 0b0100;
    pub const NAME: u8 = 0b0010;
    pub const LABELS: u8 = 0b0001;

    const MASK: u8 = 0b1111;

    pub fn from_bits(bits: u8) -> Self {
        Specificity(bits & Self::MASK)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    /// Score a selector before any defaults are applied
    pub fn of(selector: &WorkloadSelector) -> Self {
        let mut bits = 0;
        if !selector.namespaces.is_empty() {
            bits |= Self::NAMESPACE;
        }
        if !selector.kinds.is_empty() {
            bits |= Self::KIND;
        }
        if !selector.names.is_empty() {
            bits |= Self::NAME;
        }
        if !selector.labels.is_empty() {
            bits |= Self::LABELS;
        }
        Specificity(bits)
    }
}

impl fmt::Display for Specificity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04b}", self.0)
    }
}

impl FromStr for Specificity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 4 {
            return Err(format!("specificity must be 4 bits, got '{}'", s));
        }
        u8::from_str_radix(s, 2)
            .map(Specificity)
            .map_err(|_| format!("specificity must be a bit string, got '{}'", s))
    }
}

/// Concrete `(namespace, kind, name)` target produced by expansion
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Selection {
    pub namespace: String,
    pub kind: String,
    pub name: String,
}

/// Result of expanding one selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    pub specificity: Specificity,
    pub selections: Vec<Selection>,
}

/// Expand a selector into the cartesian product namespaces × kinds × names.
///
/// Empty namespaces and names become the wildcard; empty kinds become every
/// schedulable kind. Labels are not expanded; they travel with each record.
pub fn expand(selector: &WorkloadSelector) -> Expansion {
    let wildcard = || vec![WILDCARD.to_string()];

    let namespaces = if selector.namespaces.is_empty() {
        wildcard()
    } else {
        selector.namespaces.clone()
    };
    let kinds = if selector.kinds.is_empty() {
        WorkloadKind::ALL.iter().map(|k| k.to_string()).collect()
    } else {
        selector.kinds.clone()
    };
    let names = if selector.names.is_empty() {
        wildcard()
    } else {
        selector.names.clone()
    };

    let (kinds, names) = (&kinds, &names);
    let selections = namespaces
        .iter()
        .flat_map(|namespace| {
            kinds.iter().flat_map(move |kind| {
                names.iter().map(move |name| Selection {
                    namespace: namespace.clone(),
                    kind: kind.clone(),
                    name: name.clone(),
                })
            })
        })
        .collect();

    Expansion {
        specificity: Specificity::of(selector),
        selections,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_empty_selector_expands_to_default_kinds() {
        let expansion = expand(&WorkloadSelector::default());

        assert_eq!(expansion.specificity.to_string(), "0000");
        assert_eq!(
            expansion.selections,
            vec![
                Selection {
                    namespace: "*".into(),
                    kind: "deployment".into(),
                    name: "*".into()
                },
                Selection {
                    namespace: "*".into(),
                    kind: "statefulset".into(),
                    name: "*".into()
                },
            ]
        );
    }

    #[test]
    fn test_cartesian_product_in_selector_order() {
        let selector = WorkloadSelector {
            namespaces: strings(&["shop", "blog"]),
            kinds: strings(&["deployment"]),
            names: strings(&["web", "worker"]),
            labels: BTreeMap::new(),
        };

        let expansion = expand(&selector);
        let keys: Vec<String> = expansion
            .selections
            .iter()
            .map(|s| format!("{}/{}/{}", s.namespace, s.kind, s.name))
            .collect();

        assert_eq!(expansion.specificity.to_string(), "1110");
        assert_eq!(
            keys,
            vec![
                "shop/deployment/web",
                "shop/deployment/worker",
                "blog/deployment/web",
                "blog/deployment/worker",
            ]
        );
    }

    #[test]
    fn test_specificity_bits() {
        let labels_only = WorkloadSelector {
            labels: BTreeMap::from([("tier".to_string(), "batch".to_string())]),
            ..Default::default()
        };
        assert_eq!(Specificity::of(&labels_only).bits(), Specificity::LABELS);

        let everything = WorkloadSelector {
            namespaces: strings(&["a"]),
            kinds: strings(&["statefulset"]),
            names: strings(&["b"]),
            labels: BTreeMap::from([("k".to_string(), "v".to_string())]),
        };
        assert_eq!(Specificity::of(&everything).to_string(), "1111");
    }

    #[test]
    fn test_specificity_ordering_matches_bit_strings() {
        let mut scores: Vec<Specificity> = ["0110", "1000", "0001", "0111"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        scores.sort();

        let rendered: Vec<String> = scores.iter().map(|s| s.to_string()).collect();
        assert_eq!(rendered, vec!["0001", "0110", "0111", "1000"]);
    }

    #[test]
    fn test_specificity_parse_rejects_garbage() {
        assert!("012".parse::<Specificity>().is_err());
        assert!("0a10".parse::<Specificity>().is_err());
        assert_eq!(Specificity::from_bits(0xff).bits(), 0b1111);
    }
}
