//! Topic keys.
//!
//! A topic is an opaque string. The three constructors fix its shape so the
//! event side and the subscribe side always agree:
//!
//! | Constructor | Key |
//! |-------------|-----|
//! | [`Topic::all`] | `ballot` |
//! | [`Topic::instance`] | `ballot__12` |
//! | [`Topic::group`] | `post__hashtag__rust` |
//!
//! Components are escaped (`%` → `%25`, `_` → `%5F`) so the only `_` left in
//! a key belongs to a separator. A pk such as `hashtag__rust` therefore never
//! produces the key of a group topic.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

const SEPARATOR: &str = "__";

fn escape(component: &str) -> Cow<'_, str> {
    if component.contains(['%', '_']) {
        Cow::Owned(component.replace('%', "%25").replace('_', "%5F"))
    } else {
        Cow::Borrowed(component)
    }
}

/// A subscription topic key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic(String);

impl Topic {
    /// Every change of `kind`.
    pub fn all(kind: &str) -> Self {
        Self(escape(kind).into_owned())
    }

    /// Changes of one `kind` instance.
    pub fn instance(kind: &str, pk: &str) -> Self {
        Self(format!("{}{SEPARATOR}{}", escape(kind), escape(pk)))
    }

    /// Changes of `kind` whose `field` group key equals `value`.
    pub fn group(kind: &str, field: &str, value: &str) -> Self {
        Self(format!(
            "{}{SEPARATOR}{}{SEPARATOR}{}",
            escape(kind),
            escape(field),
            escape(value)
        ))
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered, duplicate-free collection of topics.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TopicSet(Vec<Topic>);

impl TopicSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `topic` unless already present. Returns whether it was added.
    pub fn insert(&mut self, topic: Topic) -> bool {
        if self.0.contains(&topic) {
            return false;
        }
        self.0.push(topic);
        true
    }

    /// Whether `topic` is in the set.
    pub fn contains(&self, topic: &Topic) -> bool {
        self.0.contains(topic)
    }

    /// Number of topics.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Topic> {
        self.0.iter()
    }

    /// Consume into the underlying vector.
    pub fn into_vec(self) -> Vec<Topic> {
        self.0
    }
}

impl FromIterator<Topic> for TopicSet {
    fn from_iter<I: IntoIterator<Item = Topic>>(iter: I) -> Self {
        let mut set = Self::new();
        for topic in iter {
            let _ = set.insert(topic);
        }
        set
    }
}

impl IntoIterator for TopicSet {
    type Item = Topic;
    type IntoIter = std::vec::IntoIter<Topic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a TopicSet {
    type Item = &'a Topic;
    type IntoIter = std::slice::Iter<'a, Topic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
