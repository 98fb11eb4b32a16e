//! Function literals, regexes, host objects and the mutable string sibling.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use regex::{Regex, RegexBuilder};

use super::{hash, FunctionOrder, Value};
use crate::error::{ValueError, ValueResult};

/// A function literal: source text plus the values of its free variables.
///
/// Functions can be stored and moved through the codecs but have no order.
#[derive(Debug, Clone)]
pub struct FunctionValue {
    source: Arc<str>,
    captured: Arc<Vec<(Arc<str>, Value)>>,
}

impl FunctionValue {
    pub fn new<N: Into<Arc<str>>>(
        source: impl Into<Arc<str>>,
        captured: impl IntoIterator<Item = (N, Value)>,
    ) -> ValueResult<Self> {
        let mut captured: Vec<(Arc<str>, Value)> =
            captured.into_iter().map(|(n, v)| (n.into(), v)).collect();
        captured.sort_by(|a, b| a.0.cmp(&b.0));
        if let Some(dup) = captured.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(ValueError::DuplicateField(dup[0].0.to_string()));
        }
        Ok(FunctionValue {
            source: source.into(),
            captured: Arc::new(captured),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Captured variables sorted by name.
    pub fn captured(&self) -> &[(Arc<str>, Value)] {
        &self.captured
    }

    pub(crate) fn deep_copy(&self) -> Self {
        FunctionValue {
            source: Arc::from(&*self.source),
            captured: Arc::new(
                self.captured
                    .iter()
                    .map(|(n, v)| (Arc::from(&**n), v.deep_copy()))
                    .collect(),
            ),
        }
    }

    pub(super) fn structural_cmp(&self, other: &Self) -> ValueResult<Ordering> {
        let by_source = self.source.cmp(&other.source);
        if by_source != Ordering::Equal {
            return Ok(by_source);
        }
        for ((na, va), (nb, vb)) in self.captured.iter().zip(other.captured.iter()) {
            let ord = na.cmp(nb);
            if ord != Ordering::Equal {
                return Ok(ord);
            }
            let ord = va.compare_with(vb, FunctionOrder::Structural)?;
            if ord != Ordering::Equal {
                return Ok(ord);
            }
        }
        Ok(self.captured.len().cmp(&other.captured.len()))
    }

    pub(super) fn structural_hash(&self) -> ValueResult<i64> {
        let mut h = hash::hash_bytes(self.source.as_bytes());
        for (name, value) in self.captured.iter() {
            h = hash::combine(h, hash::hash_bytes(name.as_bytes()));
            h = hash::combine(h, value.hash_with(FunctionOrder::Structural)?);
        }
        Ok(h)
    }
}

/// A compiled regular expression.
///
/// Identity, order and hash use the pattern and flag text; the compiled form
/// is a cache.
#[derive(Clone)]
pub struct RegexValue {
    pattern: Arc<str>,
    flags: Arc<str>,
    compiled: Regex,
}

impl RegexValue {
    /// Accepted flags: `i` (case-insensitive), `m` (multi-line), `s` (dot
    /// matches newline), `x` (ignore whitespace), `g` (global; no effect on
    /// matching).
    pub fn new(pattern: &str, flags: &str) -> ValueResult<Self> {
        let mut builder = RegexBuilder::new(pattern);
        for flag in flags.chars() {
            match flag {
                'i' => builder.case_insensitive(true),
                'm' => builder.multi_line(true),
                's' => builder.dot_matches_new_line(true),
                'x' => builder.ignore_whitespace(true),
                'g' => &mut builder,
                other => {
                    return Err(ValueError::InvalidRegex(format!("unknown flag '{other}'")))
                }
            };
        }
        let compiled = builder
            .build()
            .map_err(|e| ValueError::InvalidRegex(e.to_string()))?;
        Ok(RegexValue {
            pattern: Arc::from(pattern),
            flags: Arc::from(flags),
            compiled,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn flags(&self) -> &str {
        &self.flags
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.compiled.is_match(text)
    }
}

impl fmt::Debug for RegexValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.pattern, self.flags)
    }
}

impl PartialEq for RegexValue {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern && self.flags == other.flags
    }
}

impl Eq for RegexValue {}

impl PartialOrd for RegexValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RegexValue {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.pattern.as_bytes(), self.flags.as_bytes())
            .cmp(&(other.pattern.as_bytes(), other.flags.as_bytes()))
    }
}

impl Hash for RegexValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.pattern.hash(state);
        self.flags.hash(state);
    }
}

/// Pair of offsets with `begin <= end`.
///
/// Ordered by `begin`, then `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpanValue {
    begin: i64,
    end: i64,
}

impl SpanValue {
    pub fn new(begin: i64, end: i64) -> ValueResult<Self> {
        if begin > end {
            return Err(ValueError::InvalidSpan { begin, end });
        }
        Ok(SpanValue { begin, end })
    }

    pub fn begin(&self) -> i64 {
        self.begin
    }

    pub fn end(&self) -> i64 {
        self.end
    }
}

/// An opaque host object: class name plus the host's serialized payload.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JavaObjectValue {
    class_name: Arc<str>,
    payload: Arc<[u8]>,
}

impl JavaObjectValue {
    pub fn new(class_name: impl Into<Arc<str>>, payload: impl Into<Arc<[u8]>>) -> Self {
        JavaObjectValue {
            class_name: class_name.into(),
            payload: payload.into(),
        }
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub(crate) fn deep_copy(&self) -> Self {
        JavaObjectValue {
            class_name: Arc::from(&*self.class_name),
            payload: Arc::from(&*self.payload),
        }
    }
}

/// Mutable sibling of `Value::String`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutableString {
    buf: String,
}

impl MutableString {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        MutableString {
            buf: String::with_capacity(capacity),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn push_str(&mut self, s: &str) {
        self.buf.push_str(s);
    }

    pub fn push(&mut self, c: char) {
        self.buf.push(c);
    }

    /// Replaces the contents, keeping the allocation.
    pub fn set(&mut self, s: &str) {
        self.buf.clear();
        self.buf.push_str(s);
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Immutable snapshot of the current contents.
    pub fn to_value(&self) -> Value {
        Value::string(&self.buf)
    }

    pub fn freeze(self) -> Value {
        Value::from(self.buf)
    }
}

impl From<&str> for MutableString {
    fn from(s: &str) -> Self {
        MutableString { buf: s.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regex_flags() {
        let re = RegexValue::new("^abc$", "i").unwrap();
        assert!(re.is_match("ABC"));
        assert!(RegexValue::new("a", "q").is_err());
        assert!(RegexValue::new("(", "").is_err());
    }

    #[test]
    fn test_span_bounds() {
        let span = SpanValue::new(-3, 7).unwrap();
        assert_eq!((span.begin(), span.end()), (-3, 7));
        assert!(SpanValue::new(4, 4).is_ok());
        assert_eq!(
            SpanValue::new(2, 1).unwrap_err(),
            ValueError::InvalidSpan { begin: 2, end: 1 }
        );
        assert!(SpanValue::new(1, 2).unwrap() < SpanValue::new(1, 3).unwrap());
    }

    #[test]
    fn test_regex_identity_ignores_compiled_form() {
        let a = RegexValue::new("a+", "g").unwrap();
        let b = RegexValue::new("a+", "g").unwrap();
        assert_eq!(a, b);
        assert!(RegexValue::new("a+", "").unwrap() < a);
    }

    #[test]
    fn test_function_captures_sorted_and_unique() {
        let f = FunctionValue::new("fn() y + x", [("y", Value::Long(2)), ("x", Value::Long(1))])
            .unwrap();
        let names: Vec<&str> = f.captured().iter().map(|(n, _)| &**n).collect();
        assert_eq!(names, vec!["x", "y"]);

        let err = FunctionValue::new("fn() x", [("x", Value::Null), ("x", Value::Null)]).unwrap_err();
        assert_eq!(err, ValueError::DuplicateField("x".into()));
    }

    #[test]
    fn test_mutable_string_freeze() {
        let mut s = MutableString::from("ab");
        s.push('c');
        s.push_str("de");
        assert_eq!(s.to_value(), Value::from("abcde"));
        s.set("x");
        assert_eq!(s.freeze(), Value::from("x"));
    }
}
