//! Queue insertion policies
//!
//! Pure ordering logic: given the current order and the owner of a new item,
//! compute where the new item goes. No clocks, no randomness; the result
//! depends only on the scanned items' owners, lengths and balanced flags.

use std::collections::HashMap;

/// What the scheduler needs to know about a queued item
pub trait Schedulable {
    fn owner(&self) -> u32;
    /// Duration used as the service weight
    fn length(&self) -> u64;
    /// Items that are not balanced are skipped by weighted-fair accounting
    fn is_balanced(&self) -> bool;
}

/// Insertion policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Append at the end
    Fifo,
    /// Weighted fair queueing on cumulative queued duration per owner
    WeightedFair,
}

impl Policy {
    pub fn from_balancing(balancing: bool) -> Self {
        if balancing {
            Self::WeightedFair
        } else {
            Self::Fifo
        }
    }

    /// Index at which an item submitted by `owner` is inserted into `order`.
    pub fn insertion_index<T: Schedulable>(self, owner: u32, order: &[T]) -> usize {
        match self {
            Self::Fifo => order.len(),
            Self::WeightedFair => weighted_fair_index(owner, order),
        }
    }

    /// Insert `item` into `order` and return its index.
    pub fn insert<T: Schedulable>(self, item: T, order: &mut Vec<T>) -> usize {
        let index = self.insertion_index(item.owner(), order);
        order.insert(index, item);
        index
    }
}

/// Scan balanced items front to back, accumulating each owner's queued
/// duration. An owner's first appearance only seeds its total. At a later
/// item, the new item cuts in front of it when the new item's owner has
/// already been seen and has strictly less queued than that item's owner.
fn weighted_fair_index<T: Schedulable>(owner: u32, order: &[T]) -> usize {
    let mut served: HashMap<u32, u64> = HashMap::new();

    for (index, existing) in order.iter().enumerate() {
        if !existing.is_balanced() {
            continue;
        }

        let Some(&existing_total) = served.get(&existing.owner()) else {
            served.insert(existing.owner(), existing.length());
            continue;
        };

        if let Some(&own_total) = served.get(&owner) {
            if own_total < existing_total {
                return index;
            }
        }

        served.insert(existing.owner(), existing_total.saturating_add(existing.length()));
    }

    order.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Entry {
        name: &'static str,
        owner: u32,
        length: u64,
        balanced: bool,
    }

    impl Schedulable for Entry {
        fn owner(&self) -> u32 {
            self.owner
        }
        fn length(&self) -> u64 {
            self.length
        }
        fn is_balanced(&self) -> bool {
            self.balanced
        }
    }

    fn entry(name: &'static str, owner: u32, length: u64) -> Entry {
        Entry {
            name,
            owner,
            length,
            balanced: true,
        }
    }

    fn names(order: &[Entry]) -> Vec<&'static str> {
        order.iter().map(|e| e.name).collect()
    }

    #[test]
    fn test_empty_queue() {
        let order: Vec<Entry> = Vec::new();
        assert_eq!(Policy::Fifo.insertion_index(1, &order), 0);
        assert_eq!(Policy::WeightedFair.insertion_index(1, &order), 0);
    }

    #[test]
    fn test_fifo_always_appends() {
        let mut order = vec![entry("a1", 1, 100), entry("b1", 2, 50), entry("a2", 1, 100)];
        assert_eq!(Policy::Fifo.insert(entry("b2", 2, 50), &mut order), 3);
        assert_eq!(names(&order), vec!["a1", "b1", "a2", "b2"]);
    }

    #[test]
    fn test_base_scenario_order() {
        // A seeds owner 1; owner 2 has no total yet, so B is appended
        let mut order = vec![entry("A", 1, 100)];
        assert_eq!(Policy::WeightedFair.insert(entry("B", 2, 50), &mut order), 1);
        assert_eq!(names(&order), vec!["A", "B"]);

        // A and B only seed their owners; C is appended
        assert_eq!(Policy::WeightedFair.insert(entry("C", 1, 30), &mut order), 2);
        assert_eq!(names(&order), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_lighter_owner_cuts_the_line() {
        let mut order = vec![entry("a1", 1, 100), entry("b1", 2, 50), entry("a2", 1, 100)];
        assert_eq!(Policy::WeightedFair.insert(entry("b2", 2, 50), &mut order), 2);
        assert_eq!(names(&order), vec!["a1", "b1", "b2", "a2"]);
    }

    #[test]
    fn test_heavier_owner_does_not_cut() {
        let order = vec![entry("a1", 1, 50), entry("b1", 2, 100), entry("a2", 1, 50)];
        assert_eq!(Policy::WeightedFair.insertion_index(2, &order), 3);
    }

    #[test]
    fn test_equal_totals_do_not_cut() {
        let order = vec![entry("a1", 1, 100), entry("b1", 2, 100), entry("a2", 1, 100)];
        assert_eq!(Policy::WeightedFair.insertion_index(2, &order), 3);
    }

    #[test]
    fn test_same_owner_never_cuts_itself() {
        let order = vec![entry("a1", 1, 100), entry("a2", 1, 100), entry("a3", 1, 100)];
        assert_eq!(Policy::WeightedFair.insertion_index(1, &order), 3);
    }

    #[test]
    fn test_unbalanced_items_are_skipped() {
        let mut order = vec![entry("a1", 1, 100), entry("b1", 2, 50), entry("a2", 1, 100)];
        assert_eq!(Policy::WeightedFair.insertion_index(2, &order), 2);

        order[0].balanced = false;
        // a2 is now owner 1's first balanced appearance and only seeds it
        assert_eq!(Policy::WeightedFair.insertion_index(2, &order), 3);
    }

    #[test]
    fn test_accumulates_across_owners() {
        // owner 3 has 10 queued; owner 1 reaches 100 at a1 and gets cut at a2
        let order = vec![
            entry("c1", 3, 10),
            entry("a1", 1, 100),
            entry("b1", 2, 500),
            entry("a2", 1, 100),
            entry("b2", 2, 500),
        ];
        assert_eq!(Policy::WeightedFair.insertion_index(3, &order), 3);
    }

    #[test]
    fn test_is_deterministic() {
        let order = vec![
            entry("a1", 1, 240),
            entry("b1", 2, 60),
            entry("a2", 1, 180),
            entry("c1", 3, 300),
            entry("b2", 2, 90),
        ];
        let first = Policy::WeightedFair.insertion_index(2, &order);
        let second = Policy::WeightedFair.insertion_index(2, &order);
        assert_eq!(first, second);
        assert_eq!(first, 2);
    }
}
