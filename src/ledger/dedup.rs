use std::collections::HashSet;

use crate::ledger::record::{NaturalKey, Record, StoredRow};

pub fn existing_keys(existing: &[StoredRow]) -> HashSet<NaturalKey> {
    existing.iter().map(StoredRow::key).collect()
}

/// Candidates whose (date, session) key is not in the table yet, in batch order.
///
/// Only the key is compared. A later candidate repeating a key already
/// accepted from the same batch is dropped too.
pub fn filter_new(existing: &[StoredRow], batch: &[Record]) -> Vec<Record> {
    let mut seen = existing_keys(existing);
    batch
        .iter()
        .filter(|record| seen.insert(record.key()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::record::Session;

    fn record(date: &str, session: Session, p1: &str) -> Record {
        Record {
            date: date.into(),
            p1: p1.into(),
            p2: "0".into(),
            p3: "0".into(),
            session,
        }
    }

    fn stored(date: &str, session: &str) -> StoredRow {
        StoredRow {
            date: date.into(),
            p1: "9".into(),
            p2: "9".into(),
            p3: "9".into(),
            session: session.into(),
        }
    }

    #[test]
    fn only_unseen_keys_are_accepted() {
        let existing = vec![stored("01/01/2025", "Mid")];
        let batch = vec![
            record("01/01/2025", Session::Mid, "1"),
            record("01/02/2025", Session::Eve, "2"),
        ];

        let accepted = filter_new(&existing, &batch);
        assert_eq!(accepted, vec![record("01/02/2025", Session::Eve, "2")]);
    }

    #[test]
    fn same_date_other_session_is_new() {
        let existing = vec![stored("01/01/2025", "Mid")];
        let batch = vec![record("01/01/2025", Session::Eve, "5")];
        assert_eq!(filter_new(&existing, &batch).len(), 1);
    }

    #[test]
    fn repeated_key_within_batch_keeps_first_and_order() {
        let batch = vec![
            record("01/03/2025", Session::Eve, "1"),
            record("01/03/2025", Session::Mid, "2"),
            record("01/03/2025", Session::Eve, "3"),
            record("01/02/2025", Session::Eve, "4"),
        ];
        let accepted = filter_new(&[], &batch);
        let p1s = accepted.iter().map(|r| r.p1.as_str()).collect::<Vec<_>>();
        assert_eq!(p1s, vec!["1", "2", "4"]);
    }
}
