use crate::types::{AttackerRow, AttackerStatus};
use ethers::types::Address;
use std::collections::{BTreeSet, HashSet};

/// Operator-configured attacker rules: suppression, multisender
/// anonymization and report-bucket expansion.
#[derive(Debug, Default)]
pub struct AttackerRegistry {
    rows: Vec<AttackerRow>,
    disabled: HashSet<(Option<Address>, Address)>,
    multisenders: HashSet<Address>,
}

impl AttackerRegistry {
    pub fn from_rows(rows: Vec<AttackerRow>) -> Self {
        let mut disabled = HashSet::new();
        let mut multisenders = HashSet::new();
        for row in &rows {
            if row.status == AttackerStatus::Disabled {
                disabled.insert((row.from, row.to));
            }
            if row.from.is_none() && row.status == AttackerStatus::Enabled {
                multisenders.insert(row.to);
            }
        }
        Self { rows, disabled, multisenders }
    }

    pub fn is_multisender(&self, to: &Address) -> bool {
        self.multisenders.contains(to)
    }

    /// The bundle sender key: anonymized to `None` for multisender
    /// recipients.
    pub fn bundle_sender(&self, from: Address, to: &Address) -> Option<Address> {
        if self.is_multisender(to) {
            None
        } else {
            Some(from)
        }
    }

    /// A pair is suppressed when it, or its anonymized form, is disabled.
    pub fn is_disabled(&self, from: Option<Address>, to: Address) -> bool {
        self.disabled.contains(&(from, to)) || self.disabled.contains(&(None, to))
    }

    /// EMA buckets an attack on `recipient` reports into: the wildcard, the
    /// recipient itself when a row asks for it, and `~`-prefixed exclusion
    /// buckets for every other recipient tracked with report level 2.
    pub fn report_buckets(&self, recipient: Address) -> Vec<String> {
        let mut buckets = vec!["*".to_string()];
        let mut exclusions = BTreeSet::new();
        let mut include_recipient = false;
        for row in &self.rows {
            if row.to == recipient {
                if row.report == 1 || row.report == 2 {
                    include_recipient = true;
                }
            } else if row.report == 2 {
                exclusions.insert(format!("~{:#x}", row.to));
            }
        }
        if include_recipient {
            buckets.push(format!("{recipient:#x}"));
        }
        buckets.extend(exclusions);
        buckets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(from: Option<&str>, to: &str, status: i64, report: i64) -> AttackerRow {
        AttackerRow {
            attacker_id: 0,
            from: from.map(|s| s.parse().unwrap()),
            to: to.parse().unwrap(),
            status: AttackerStatus::from_i64(status),
            note: None,
            report,
        }
    }

    const A: &str = "0x1000000000000000000000000000000000000001";
    const X: &str = "0x2000000000000000000000000000000000000002";
    const Y: &str = "0x3000000000000000000000000000000000000003";

    #[test]
    fn multisender_and_disabled_rules() {
        let registry = AttackerRegistry::from_rows(vec![
            row(None, X, 1, 0),
            row(Some(A), Y, -1, 0),
        ]);
        let a: Address = A.parse().unwrap();
        let x: Address = X.parse().unwrap();
        let y: Address = Y.parse().unwrap();

        assert!(registry.is_multisender(&x));
        assert_eq!(registry.bundle_sender(a, &x), None);
        assert_eq!(registry.bundle_sender(a, &y), Some(a));
        assert!(registry.is_disabled(Some(a), y));
        assert!(!registry.is_disabled(Some(a), x));
    }

    #[test]
    fn disabled_multisender_suppresses_all_senders() {
        let registry = AttackerRegistry::from_rows(vec![row(None, X, -1, 0)]);
        let a: Address = A.parse().unwrap();
        let x: Address = X.parse().unwrap();
        assert!(registry.is_disabled(Some(a), x));
        assert!(!registry.is_multisender(&x));
    }

    #[test]
    fn report_buckets_expand_and_never_collide() {
        let registry = AttackerRegistry::from_rows(vec![
            row(None, X, 1, 2),
            row(None, Y, 1, 2),
            row(None, A, 1, 1),
        ]);
        let x: Address = X.parse().unwrap();
        let buckets = registry.report_buckets(x);
        assert_eq!(buckets[0], "*");
        assert_eq!(buckets[1], X.to_lowercase());
        assert!(buckets.contains(&format!("~{}", Y.to_lowercase())));
        // report=1 rows do not produce exclusion buckets
        assert!(!buckets.iter().any(|b| b.contains(&A.to_lowercase()[2..])));
        // exclusion buckets are longer than any address literal
        assert!(buckets.iter().filter(|b| b.starts_with('~')).all(|b| b.len() > 42));
    }
}
