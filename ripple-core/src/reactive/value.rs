//! Dynamic values and reactive targets.
//!
//! Component state, props and template expressions all deal in [`Value`], a
//! small dynamically typed value. Composite data lives in a [`Target`]: a
//! shared, ordered record with a stable identity. Targets are plain data;
//! reads and writes only become observable when they go through a
//! [`Reactive`](super::Reactive) wrapper.
//!
//! # Identity
//!
//! Change detection uses [`Value::same`]. Primitives compare by value
//! (`NaN` equals `NaN`, `+0` differs from `-0`); targets, wrappers, refs and
//! handlers compare by identity.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use super::ref_cell::Ref;
use super::runtime::Runtime;
use super::wrapper::Reactive;

/// Property name of a target.
pub type Key = Arc<str>;

/// Unique identifier for a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetId(u64);

impl TargetId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// A shared composite value.
///
/// Cloning a target yields another handle to the same record. When the last
/// handle is dropped, the runtime forgets every dependency set recorded
/// against it.
#[derive(Clone)]
pub struct Target {
    inner: Arc<TargetInner>,
}

struct TargetInner {
    id: TargetId,
    fields: RwLock<IndexMap<Key, Value>>,
}

impl Drop for TargetInner {
    fn drop(&mut self) {
        Runtime::forget(self.id);
    }
}

impl Target {
    /// Create an empty target.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TargetInner {
                id: TargetId::next(),
                fields: RwLock::new(IndexMap::new()),
            }),
        }
    }

    /// Builder-style insert, for constructing literals.
    pub fn with(self, key: &str, value: impl Into<Value>) -> Self {
        self.insert_raw(key, value);
        self
    }

    pub fn id(&self) -> TargetId {
        self.inner.id
    }

    /// Read a field without tracking.
    pub fn get_raw(&self, key: &str) -> Option<Value> {
        self.inner.fields.read().get(key).cloned()
    }

    /// Write a field without triggering. Returns the previous value.
    pub fn insert_raw(&self, key: &str, value: impl Into<Value>) -> Option<Value> {
        self.inner.fields.write().insert(Key::from(key), value.into())
    }

    /// Remove a field without triggering. Returns the removed value.
    pub fn remove_raw(&self, key: &str) -> Option<Value> {
        self.inner.fields.write().shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.fields.read().contains_key(key)
    }

    /// Field names, in insertion order.
    pub fn keys_raw(&self) -> Vec<Key> {
        self.inner.fields.read().keys().cloned().collect()
    }

    /// Snapshot of every field, in insertion order.
    pub fn entries_raw(&self) -> Vec<(Key, Value)> {
        self.inner
            .fields
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.fields.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.fields.read().is_empty()
    }

    /// Whether both handles point at the same record.
    pub fn ptr_eq(&self, other: &Target) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for Target {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> FromIterator<(K, V)> for Target
where
    K: AsRef<str>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let target = Target::new();
        {
            let mut fields = target.inner.fields.write();
            for (key, value) in iter {
                fields.insert(Key::from(key.as_ref()), value.into());
            }
        }
        target
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("id", &self.inner.id.raw())
            .field("len", &self.len())
            .finish()
    }
}

/// A callable value: event listeners and emitted-event handlers.
#[derive(Clone)]
pub struct Handler(Arc<dyn Fn(&[Value]) -> Value + Send + Sync>);

impl Handler {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, args: &[Value]) -> Value {
        (self.0)(args)
    }

    pub fn ptr_eq(&self, other: &Handler) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Handler(..)")
    }
}

/// A dynamically typed value.
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Str(Arc<str>),
    /// A raw composite.
    Object(Target),
    /// A composite seen through a reactive wrapper.
    Proxy(Reactive),
    Ref(Ref),
    Handler(Handler),
}

impl Value {
    /// Identity comparison used for change detection.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => {
                if a.is_nan() && b.is_nan() {
                    true
                } else {
                    a == b && a.is_sign_negative() == b.is_sign_negative()
                }
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Proxy(a), Value::Proxy(b)) => a.same(b),
            (Value::Ref(a), Value::Ref(b)) => a.ptr_eq(b),
            (Value::Handler(a), Value::Handler(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Objects and wrapped objects.
    pub fn is_composite(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Proxy(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The underlying target of an object or wrapped object.
    pub fn as_target(&self) -> Option<Target> {
        match self {
            Value::Object(target) => Some(target.clone()),
            Value::Proxy(proxy) => Some(proxy.to_raw()),
            _ => None,
        }
    }

    pub fn as_proxy(&self) -> Option<&Reactive> {
        match self {
            Value::Proxy(proxy) => Some(proxy),
            _ => None,
        }
    }

    pub fn as_ref_cell(&self) -> Option<&Ref> {
        match self {
            Value::Ref(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_handler(&self) -> Option<&Handler> {
        match self {
            Value::Handler(h) => Some(h),
            _ => None,
        }
    }

    /// Strip a reactive wrapper, leaving the raw composite.
    pub fn into_raw(self) -> Value {
        match self {
            Value::Proxy(proxy) => Value::Object(proxy.to_raw()),
            other => other,
        }
    }

    /// Untracked JSON snapshot.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<Arc<str>> for Value {
    fn from(s: Arc<str>) -> Self {
        Value::Str(s)
    }
}

impl From<Target> for Value {
    fn from(target: Target) -> Self {
        Value::Object(target)
    }
}

impl From<Reactive> for Value {
    fn from(proxy: Reactive) -> Self {
        Value::Proxy(proxy)
    }
}

impl From<Ref> for Value {
    fn from(r: Ref) -> Self {
        Value::Ref(r)
    }
}

impl From<Handler> for Value {
    fn from(h: Handler) -> Self {
        Value::Handler(h)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Arrays become targets keyed by index.
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => Value::Object(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| (i.to_string(), Value::from(item)))
                    .collect(),
            ),
            serde_json::Value::Object(fields) => Value::Object(fields.into_iter().collect()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null | Value::Handler(_) => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => match integral(*n) {
                Some(i) => serializer.serialize_i64(i),
                None => serializer.serialize_f64(*n),
            },
            Value::Str(s) => serializer.serialize_str(s),
            Value::Object(target) => serialize_target(target, serializer),
            Value::Proxy(proxy) => serialize_target(&proxy.to_raw(), serializer),
            Value::Ref(r) => r.get_untracked().serialize(serializer),
        }
    }
}

fn serialize_target<S: Serializer>(target: &Target, serializer: S) -> Result<S::Ok, S::Error> {
    // Snapshot first so no lock is held while nested values serialize.
    let entries = target.entries_raw();
    let mut map = serializer.serialize_map(Some(entries.len()))?;
    for (key, value) in &entries {
        map.serialize_entry(key.as_ref(), value)?;
    }
    map.end()
}

fn integral(n: f64) -> Option<i64> {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        Some(n as i64)
    } else {
        None
    }
}

/// Render a value as template text.
///
/// Whole numbers print without a fractional part; composites print as
/// `[object Object]`; refs print their current value.
pub fn to_display_string(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            if n.is_nan() {
                "NaN".to_string()
            } else if n.is_infinite() {
                let text = if *n > 0.0 { "Infinity" } else { "-Infinity" };
                text.to_string()
            } else if let Some(i) = integral(*n) {
                i.to_string()
            } else {
                n.to_string()
            }
        }
        Value::Str(s) => s.to_string(),
        Value::Object(_) | Value::Proxy(_) => "[object Object]".to_string(),
        Value::Ref(r) => to_display_string(&r.get_untracked()),
        Value::Handler(_) => "function".to_string(),
    }
}

// ---- Tests ----

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn same_follows_object_is() {
        assert!(Value::Number(f64::NAN).same(&Value::Number(f64::NAN)));
        assert!(!Value::Number(0.0).same(&Value::Number(-0.0)));
        assert!(Value::from("a").same(&Value::from("a")));
        assert!(!Value::from(1).same(&Value::from("1")));
    }

    #[test]
    fn composites_compare_by_identity() {
        let a = Target::new().with("x", 1);
        let b = Target::new().with("x", 1);

        assert!(Value::from(a.clone()).same(&Value::from(a.clone())));
        assert!(!Value::from(a).same(&Value::from(b)));
    }

    #[test]
    fn display_strings() {
        assert_eq!(to_display_string(&Value::from(3)), "3");
        assert_eq!(to_display_string(&Value::from(2.5)), "2.5");
        assert_eq!(to_display_string(&Value::Number(-0.0)), "0");
        assert_eq!(to_display_string(&Value::Null), "null");
        assert_eq!(to_display_string(&Value::from(true)), "true");
        assert_eq!(to_display_string(&Value::from(Target::new())), "[object Object]");
        assert_eq!(to_display_string(&Value::from(Ref::new("hi"))), "hi");
    }

    #[test]
    fn json_conversion_keeps_field_order() {
        let value = Value::from(json!({ "b": 1, "a": [true, "x"], "c": null }));
        let target = value.as_target().unwrap();

        assert_eq!(
            target.keys_raw().iter().map(|k| k.as_ref()).collect::<Vec<_>>(),
            vec!["b", "a", "c"]
        );
        let list = target.get_raw("a").unwrap().as_target().unwrap();
        assert_eq!(list.get_raw("1").unwrap(), Value::from("x"));

        assert_eq!(value.to_json(), json!({ "b": 1, "a": { "0": true, "1": "x" }, "c": null }));
    }

    #[test]
    fn target_raw_access() {
        let target = Target::new();
        assert!(target.is_empty());

        assert!(target.insert_raw("a", 1).is_none());
        assert_eq!(target.insert_raw("a", 2), Some(Value::from(1)));
        assert!(target.contains_key("a"));
        assert_eq!(target.remove_raw("a"), Some(Value::from(2)));
        assert_eq!(target.len(), 0);
    }
}
