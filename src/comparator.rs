use std::cmp::Ordering;

use crate::item::{Key, KEY_SIZE};

/// A user-supplied total order over non-null keys.
///
/// Implementations only ever see the raw byte payload of two non-null keys; the tree wraps this
/// with null-key handling (null sorts as the minimum, and is equal only to itself) so that
/// `Comparator::compare` is never called with a null key on either side.
pub trait Comparator {
    fn compare(&self, a: &[u8; KEY_SIZE], b: &[u8; KEY_SIZE]) -> Ordering;
}

/// Compares two keys, short-circuiting on the null-key convention so `cmp`'s `compare` is only
/// ever invoked on two non-null keys.
#[inline]
pub(crate) fn compare_keys<C: Comparator>(cmp: &C, a: &Key, b: &Key) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => cmp.compare(a.bytes(), b.bytes()),
    }
}

/// Orders keys as signed 64-bit integers (see [`Key::from_i64`]).
#[derive(Clone, Copy, Debug, Default)]
pub struct I64Comparator;

impl Comparator for I64Comparator {
    #[inline]
    fn compare(&self, a: &[u8; KEY_SIZE], b: &[u8; KEY_SIZE]) -> Ordering {
        i64::from_be_bytes(*a).cmp(&i64::from_be_bytes(*b))
    }
}

/// Orders keys as 64-bit floats (see [`Key::from_f64`]), using [`f64::total_cmp`] so that every
/// bit pattern (including NaNs) participates in a total order.
#[derive(Clone, Copy, Debug, Default)]
pub struct F64Comparator;

impl Comparator for F64Comparator {
    #[inline]
    fn compare(&self, a: &[u8; KEY_SIZE], b: &[u8; KEY_SIZE]) -> Ordering {
        let a = f64::from_bits(u64::from_be_bytes(*a));
        let b = f64::from_bits(u64::from_be_bytes(*b));
        a.total_cmp(&b)
    }
}
