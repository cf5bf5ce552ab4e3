//! Business rules applied to each polled batch.
//!
//! Rules only see the current batch: a seller whose cheaper listing arrives in a
//! later batch is not reconciled with a listing that was already forwarded.
use std::collections::HashMap;

use books_common::record::Record;

pub const DEFAULT_MIN_RATING: f64 = 1.0;

/// Keep listings whose seller is rated at least `min_rating`. A NaN rating never passes.
pub fn filter_by_seller_rating(records: Vec<Record>, min_rating: f64) -> Vec<Record> {
    records
        .into_iter()
        .filter(|record| record.seller_rating() >= min_rating)
        .collect()
}

/// Keep one listing per seller: the cheapest, and the first seen on a price tie.
/// Sellers come out in the order they were first seen.
pub fn retain_cheapest_per_seller(records: Vec<Record>) -> Vec<Record> {
    let mut cheapest: Vec<Record> = Vec::with_capacity(records.len());
    let mut slots: HashMap<String, usize> = HashMap::new();

    for record in records {
        match slots.get(record.seller_id()) {
            Some(&slot) => {
                if record.price() < cheapest[slot].price() {
                    cheapest[slot] = record;
                }
            }
            None => {
                slots.insert(record.seller_id().to_owned(), cheapest.len());
                cheapest.push(record);
            }
        }
    }

    cheapest
}

/// The listings of a batch that go downstream.
pub fn eligible_set(records: Vec<Record>, min_rating: f64) -> Vec<Record> {
    retain_cheapest_per_seller(filter_by_seller_rating(records, min_rating))
}
