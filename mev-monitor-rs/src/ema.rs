use crate::types::EmaRow;
use std::collections::{BTreeMap, BTreeSet};

pub type EmaKey = (i64, String);

/// In-memory view of `t_attack_EMAs` for one block (or one recalc run).
/// Rows are loaded up front, updated in arrival order and only the touched
/// ones are flushed back.
#[derive(Debug, Default)]
pub struct EmaBook {
    rows: BTreeMap<EmaKey, EmaRow>,
    touched: BTreeSet<EmaKey>,
}

impl EmaBook {
    pub fn new(rows: impl IntoIterator<Item = (EmaKey, EmaRow)>) -> Self {
        Self { rows: rows.into_iter().collect(), touched: BTreeSet::new() }
    }

    /// Fold one observed bribe ratio into the (class, bucket) aggregate:
    /// `ema_new = alpha * ratio + (1 - alpha) * ema_old`, seeded with the
    /// first ratio.
    pub fn apply(&mut self, class_id: i64, bucket: &str, block_number: u64, ratio: f64, alpha: f64) {
        let key = (class_id, bucket.to_string());
        let row = self.rows.entry(key.clone()).or_insert(EmaRow {
            count_attacks: 1,
            last_block_number: None,
            last_bribes_ratio: None,
            bribes_ratio_ema: None,
        });
        match row.bribes_ratio_ema {
            None => row.bribes_ratio_ema = Some(ratio),
            Some(ema) => {
                row.bribes_ratio_ema = Some(ratio * alpha + ema * (1.0 - alpha));
                row.count_attacks += 1;
            }
        }
        row.last_block_number = Some(block_number);
        row.last_bribes_ratio = Some(ratio);
        self.touched.insert(key);
    }

    pub fn get(&self, class_id: i64, bucket: &str) -> Option<&EmaRow> {
        self.rows.get(&(class_id, bucket.to_string()))
    }

    /// Rows updated since the book was loaded, ready to be persisted.
    pub fn touched_rows(&self) -> impl Iterator<Item = (&EmaKey, &EmaRow)> {
        self.touched.iter().filter_map(|key| self.rows.get(key).map(|row| (key, row)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ema_recurrence_matches_the_reference_series() {
        let mut book = EmaBook::default();
        let alpha = 0.1;
        for (block, ratio) in [(1u64, 0.5), (2, 0.4), (3, 0.6)] {
            book.apply(7, "*", block, ratio, alpha);
        }
        let row = book.get(7, "*").unwrap();
        assert!((row.bribes_ratio_ema.unwrap() - 0.501).abs() < 1e-12);
        assert_eq!(row.count_attacks, 3);
        assert_eq!(row.last_block_number, Some(3));
        assert_eq!(row.last_bribes_ratio, Some(0.6));
    }

    #[test]
    fn first_sighting_seeds_the_average() {
        let mut book = EmaBook::default();
        book.apply(1, "*", 100, 0.42, 0.05);
        let row = book.get(1, "*").unwrap();
        assert_eq!(row.bribes_ratio_ema, Some(0.42));
        assert_eq!(row.count_attacks, 1);
    }

    #[test]
    fn preloaded_rows_continue_their_series() {
        let seed = EmaRow {
            count_attacks: 5,
            last_block_number: Some(90),
            last_bribes_ratio: Some(0.2),
            bribes_ratio_ema: Some(0.3),
        };
        let mut book = EmaBook::new([((1, "*".to_string()), seed)]);
        book.apply(1, "*", 100, 0.5, 0.1);
        let row = book.get(1, "*").unwrap();
        assert!((row.bribes_ratio_ema.unwrap() - (0.05 + 0.27)).abs() < 1e-12);
        assert_eq!(row.count_attacks, 6);
    }

    #[test]
    fn only_touched_rows_flush() {
        let untouched = EmaRow { count_attacks: 3, ..Default::default() };
        let mut book = EmaBook::new([((1, "*".to_string()), untouched)]);
        book.apply(2, "~0xdeadbeef", 100, 0.1, 0.1);
        let flushed: Vec<_> = book.touched_rows().map(|(key, _)| key.clone()).collect();
        assert_eq!(flushed, vec![(2, "~0xdeadbeef".to_string())]);
    }
}
