//! Low-level readers over yrs values.
//!
//! Shared accessors that tolerate missing keys and unexpected shapes:
//! a replicated document can always contain data written by an older or
//! newer peer, so readers default instead of failing.

use std::collections::HashMap;

use yrs::{Any, Array, ArrayRef, Map, MapRef, Out, ReadTxn};

use crate::value::CellValue;

pub(crate) fn out_string(out: Out) -> Option<String> {
    match out {
        Out::Any(Any::String(s)) => Some(s.to_string()),
        _ => None,
    }
}

pub(crate) fn any_f64(any: &Any) -> Option<f64> {
    match any {
        Any::Number(n) => Some(*n),
        Any::BigInt(i) => Some(*i as f64),
        _ => None,
    }
}

pub(crate) fn any_i64(any: &Any) -> Option<i64> {
    match any {
        Any::BigInt(i) => Some(*i),
        Any::Number(n) => Some(*n as i64),
        _ => None,
    }
}

/// String element of an ordered sequence, if present and a string.
pub(crate) fn string_at<T: ReadTxn>(txn: &T, array: &ArrayRef, index: u32) -> Option<String> {
    array.get(txn, index).and_then(out_string)
}

/// All string elements of an ordered sequence, in order.
pub(crate) fn array_strings<T: ReadTxn>(txn: &T, array: &ArrayRef) -> Vec<String> {
    (0..array.len(txn))
        .filter_map(|i| string_at(txn, array, i))
        .collect()
}

/// Current position of a string element, if present.
pub(crate) fn position_of<T: ReadTxn>(txn: &T, array: &ArrayRef, value: &str) -> Option<u32> {
    (0..array.len(txn)).find(|i| string_at(txn, array, *i).as_deref() == Some(value))
}

/// Nested shared map stored under `key`.
pub(crate) fn nested_map<T: ReadTxn>(txn: &T, map: &MapRef, key: &str) -> Option<MapRef> {
    match map.get(txn, key)? {
        Out::YMap(m) => Some(m),
        _ => None,
    }
}

pub(crate) fn map_string<T: ReadTxn>(txn: &T, map: &MapRef, key: &str) -> Option<String> {
    map.get(txn, key).and_then(out_string)
}

pub(crate) fn map_f64<T: ReadTxn>(txn: &T, map: &MapRef, key: &str) -> Option<f64> {
    match map.get(txn, key)? {
        Out::Any(any) => any_f64(&any),
        _ => None,
    }
}

pub(crate) fn map_i64<T: ReadTxn>(txn: &T, map: &MapRef, key: &str) -> Option<i64> {
    match map.get(txn, key)? {
        Out::Any(any) => any_i64(&any),
        _ => None,
    }
}

/// A name→value record, whether stored as a plain `Any` map or a shared map.
/// Legacy rows written by older peers can be either.
pub(crate) fn value_record<T: ReadTxn>(txn: &T, out: Out) -> HashMap<String, CellValue> {
    match out {
        Out::Any(Any::Map(entries)) => entries
            .iter()
            .map(|(k, v)| (k.clone(), CellValue::from_any(v)))
            .collect(),
        Out::YMap(map) => {
            let keys: Vec<String> = map.keys(txn).map(|k| k.to_string()).collect();
            keys.into_iter()
                .filter_map(|k| {
                    let value = map.get(txn, &k).map(|out| CellValue::from_out(&out))?;
                    Some((k, value))
                })
                .collect()
        }
        _ => HashMap::new(),
    }
}
