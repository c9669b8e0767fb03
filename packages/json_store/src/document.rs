//! The in-memory document and its optional cache mirror.
//!
//! Everything here is synchronous and lock-free; [`JsonDb`](crate::JsonDb)
//! wraps a [`DocumentStore`] in a mutex together with the dirty tracker and
//! takes care of events and flushing.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use jsondb_core_store::{accessor, kind_name, Document, Path};

use crate::{Error, Result};

/// One top-level key and its value, as returned by `all()`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Entry {
    pub key: String,
    pub data: Value,
}

/// A number to add to or subtract from a counter.
///
/// Integer arithmetic is kept as long as both sides are integers and the
/// result fits in an `i64`; anything else is computed as a float.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Amount {
    Int(i64),
    Float(f64),
}

impl Amount {
    fn negate(self) -> Amount {
        match self {
            Amount::Int(i) => match i.checked_neg() {
                Some(n) => Amount::Int(n),
                None => Amount::Float(-(i as f64)),
            },
            Amount::Float(f) => Amount::Float(-f),
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Amount::Int(i) => i as f64,
            Amount::Float(f) => f,
        }
    }

    fn checked_add(self, other: Amount) -> Amount {
        match (self, other) {
            (Amount::Int(a), Amount::Int(b)) => match a.checked_add(b) {
                Some(sum) => Amount::Int(sum),
                None => Amount::Float(a as f64 + b as f64),
            },
            (a, b) => Amount::Float(a.as_f64() + b.as_f64()),
        }
    }

    fn into_value(self) -> Option<Value> {
        match self {
            Amount::Int(i) => Some(Value::from(i)),
            Amount::Float(f) => Number::from_f64(f).map(Value::Number),
        }
    }
}

macro_rules! amount_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Amount {
            fn from(n: $t) -> Self {
                Amount::Int(i64::from(n))
            }
        })*
    };
}

amount_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for Amount {
    fn from(n: f32) -> Self {
        Amount::Float(f64::from(n))
    }
}

impl From<f64> for Amount {
    fn from(n: f64) -> Self {
        Amount::Float(n)
    }
}

/// `null`, `false`, `0` and `""`: values a counter treats as zero.
fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f == 0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

#[derive(Debug, Default)]
pub struct DocumentStore {
    document: Document,
    cache: Option<Document>,
}

impl DocumentStore {
    pub fn new(caching: bool) -> Self {
        Self::with_document(Document::new(), caching)
    }

    pub fn with_document(document: Document, caching: bool) -> Self {
        let cache = caching.then(|| document.clone());
        Self { document, cache }
    }

    pub fn caching(&self) -> bool {
        self.cache.is_some()
    }

    /// The authoritative document. Flushes serialize this, never the mirror.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Swap in a freshly loaded document; the mirror becomes a deep copy of it.
    pub fn replace(&mut self, document: Document) {
        if self.cache.is_some() {
            self.cache = Some(document.clone());
        }
        self.document = document;
    }

    fn reads(&self) -> &Document {
        self.cache.as_ref().unwrap_or(&self.document)
    }

    pub fn get(&self, path: &Path) -> Option<&Value> {
        accessor::resolve_for_read(self.reads(), path)
    }

    pub fn has(&self, path: &Path) -> bool {
        self.get(path).is_some()
    }

    pub fn set(&mut self, path: &Path, value: Value) -> Result<()> {
        match self.cache.as_mut() {
            Some(cache) => {
                accessor::resolve_for_write(&mut self.document, path, value.clone())?;
                if let Err(error) = accessor::resolve_for_write(cache, path, value) {
                    log::error!("Cache mirror diverged writing '{}': {}; rebuilding", path, error);
                    self.cache = Some(self.document.clone());
                }
            }
            None => accessor::resolve_for_write(&mut self.document, path, value)?,
        }
        Ok(())
    }

    /// Remove the value at `path`, returning it if there was one.
    pub fn delete(&mut self, path: &Path) -> Option<Value> {
        if let Some(cache) = self.cache.as_mut() {
            accessor::resolve_for_delete(cache, path);
        }
        accessor::resolve_for_delete(&mut self.document, path)
    }

    /// Add `amount` to the top-level `key`, returning the new value.
    ///
    /// An absent or falsy value counts as zero. Any other non-number is an
    /// error and nothing changes.
    pub fn add(&mut self, key: &str, amount: Amount) -> Result<Value> {
        let path = Path::top_level_key(key)?;
        let current = match self.document.get(key) {
            None => Amount::Int(0),
            Some(value) if is_falsy(value) => Amount::Int(0),
            Some(Value::Number(n)) => match n.as_i64() {
                Some(i) => Amount::Int(i),
                None => Amount::Float(n.as_f64().unwrap_or_default()),
            },
            Some(other) => {
                return Err(Error::NotANumber {
                    key: key.to_string(),
                    found: kind_name(other),
                })
            }
        };

        let value = current
            .checked_add(amount)
            .into_value()
            .ok_or_else(|| Error::NotANumber {
                key: key.to_string(),
                found: "non-finite number",
            })?;
        self.set(&path, value.clone())?;
        Ok(value)
    }

    pub fn subtract(&mut self, key: &str, amount: Amount) -> Result<Value> {
        self.add(key, amount.negate())
    }

    /// Append `element` to the sequence at `path`, returning the new length.
    ///
    /// An absent or falsy value starts a new sequence, as it does for `add`.
    pub fn push(&mut self, path: &Path, element: Value) -> Result<usize> {
        let mut items = match accessor::resolve_for_read(&self.document, path) {
            None => Vec::new(),
            Some(value) if is_falsy(value) => Vec::new(),
            Some(Value::Array(items)) => items.clone(),
            Some(other) => {
                return Err(Error::NotASequence {
                    key: path.to_string(),
                    found: kind_name(other),
                })
            }
        };
        items.push(element);
        let len = items.len();
        self.set(path, Value::Array(items))?;
        Ok(len)
    }

    /// Empty the document, returning the keys it held.
    pub fn clear(&mut self) -> Vec<String> {
        let keys = self.keys();
        self.document.clear();
        if let Some(cache) = self.cache.as_mut() {
            cache.clear();
        }
        keys
    }

    /// Every top-level entry in insertion order, read from the document itself.
    pub fn all(&self) -> Vec<Entry> {
        self.document
            .iter()
            .map(|(key, data)| Entry {
                key: key.clone(),
                data: data.clone(),
            })
            .collect()
    }

    pub fn keys(&self) -> Vec<String> {
        self.document.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.document.len()
    }

    pub fn is_empty(&self) -> bool {
        self.document.is_empty()
    }

    /// Whether the mirror matches the document. Always true without caching.
    #[cfg(test)]
    fn is_consistent(&self) -> bool {
        self.cache.as_ref().map_or(true, |cache| *cache == self.document)
    }
}
