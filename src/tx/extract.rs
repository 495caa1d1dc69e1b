//! Address extraction from normalized transactions.
//!
//! Pure, total functions: no I/O, no failure modes. Order matters — the
//! traversal's path determinism rests on neighbors being enumerated in
//! the transaction's declared positional order, so extraction preserves
//! first-occurrence order while dropping duplicates and unresolved refs.

use rustc_hash::FxHashSet;

use crate::tx::NormalizedTx;
use crate::types::Address;

/// Distinct input addresses in declared positional order.
#[must_use]
pub fn extract_input_addresses(tx: &NormalizedTx) -> Vec<Address> {
    dedup_ordered(tx.inputs.iter().filter_map(|i| i.address.as_ref()))
}

/// Distinct output addresses in declared positional order.
#[must_use]
pub fn extract_output_addresses(tx: &NormalizedTx) -> Vec<Address> {
    dedup_ordered(tx.outputs.iter().filter_map(|o| o.address.as_ref()))
}

fn dedup_ordered<'a>(addrs: impl Iterator<Item = &'a Address>) -> Vec<Address> {
    let mut seen: FxHashSet<&Address> = FxHashSet::default();
    let mut out = Vec::new();
    for addr in addrs {
        if !addr.is_empty() && seen.insert(addr) {
            out.push(addr.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx() -> NormalizedTx {
        NormalizedTx::new("t1", Some(100))
            .with_input(Some("in1".into()))
            .with_input(None)
            .with_input(Some("in2".into()))
            .with_input(Some("in1".into()))
            .with_output(Some("out1".into()), 500)
            .with_output(Some("out2".into()), 300)
            .with_output(None, 200)
            .with_output(Some("out1".into()), 100)
    }

    #[test]
    fn inputs_deduped_in_order() {
        assert_eq!(
            extract_input_addresses(&tx()),
            vec![Address::from("in1"), Address::from("in2")]
        );
    }

    #[test]
    fn outputs_deduped_in_order() {
        assert_eq!(
            extract_output_addresses(&tx()),
            vec![Address::from("out1"), Address::from("out2")]
        );
    }

    #[test]
    fn unresolved_refs_are_dropped() {
        let bare = NormalizedTx::new("t2", None).with_input(None).with_output(None, 1);
        assert!(extract_input_addresses(&bare).is_empty());
        assert!(extract_output_addresses(&bare).is_empty());
    }
}
