//! The permission verb model.
//!
//! A grant on a collection is a [`PermissionSet`]: the set of [`Verb`]s a caller may
//! use against it. The empty set is special and means *every* verb is allowed, which
//! lets an unrestricted grant be written without a sentinel value.
//!
//! # Text form
//!
//! Sets are written as comma-joined verbs in canonical order (`GET,PUT`), or as the
//! literal `ALL` for a set that allows everything:
//!
//! ```ignore
//! use docguard_core::permission::{PermissionSet, Verb};
//!
//! let set = PermissionSet::parse("PUT,GET");
//! assert_eq!(set.to_string(), "GET,PUT");
//! assert!(set.contains(Verb::Get));
//! assert!(!set.contains(Verb::Delete));
//!
//! assert_eq!(PermissionSet::default().to_string(), "ALL");
//! ```

use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{self, SeqAccess, Visitor},
    ser::SerializeSeq,
};
use std::{collections::BTreeSet, convert::Infallible, fmt, str::FromStr};
use thiserror::Error;

const VERB_SEPARATOR: char = ',';
const ALL_VERBS: &str = "ALL";

/// An operation kind used as the unit of authorization.
///
/// The declaration order is the canonical order used when a set is written out:
/// `GET < POST < PUT < PATCH < DELETE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Verb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Verb {
    /// Every defined verb, in canonical order.
    pub const ALL: [Verb; 5] = [Verb::Get, Verb::Post, Verb::Put, Verb::Patch, Verb::Delete];

    /// Returns the wire spelling of this verb.
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Patch => "PATCH",
            Verb::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a token does not spell one of the defined verbs.
///
/// Verbs are case-sensitive: `get` is not `GET`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown verb '{0}'")]
pub struct UnknownVerb(pub String);

impl FromStr for Verb {
    type Err = UnknownVerb;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        Verb::ALL
            .into_iter()
            .find(|verb| verb.as_str() == token)
            .ok_or_else(|| UnknownVerb(token.to_string()))
    }
}

/// The set of verbs a caller is allowed to use on a collection.
///
/// A set is built once from a grant and only read afterwards. It has two states:
///
/// - **Unrestricted**: the set is empty, or holds every defined verb. Both allow
///   everything and both are written as `ALL`; callers cannot tell them apart
///   through [`contains`](Self::contains), [`Display`](fmt::Display) or `==`.
/// - **Restricted**: only the verbs literally present are allowed.
///
/// Tokens that are not valid verbs are kept as opaque members. They never match
/// [`contains`](Self::contains), but they do make the set non-empty, so a set made
/// only of malformed tokens allows nothing.
#[derive(Debug, Clone, Default)]
pub struct PermissionSet {
    verbs: BTreeSet<Verb>,
    opaque: BTreeSet<String>,
}

impl PermissionSet {
    /// Returns the unrestricted set.
    pub fn all() -> Self {
        Self::default()
    }

    /// Builds a set from an explicit list of verbs. Duplicates collapse.
    ///
    /// An empty list yields the unrestricted set.
    pub fn from_verbs(verbs: impl IntoIterator<Item = Verb>) -> Self {
        Self {
            verbs: verbs.into_iter().collect(),
            opaque: BTreeSet::new(),
        }
    }

    /// Parses the text form of a set.
    ///
    /// `ALL` yields the unrestricted set. Anything else is split on `,` and every
    /// piece becomes a member; spelling is not validated.
    pub fn parse(token: &str) -> Self {
        if token == ALL_VERBS {
            return Self::all();
        }

        Self::from_tokens(token.split(VERB_SEPARATOR))
    }

    fn from_tokens<S: AsRef<str>>(tokens: impl IntoIterator<Item = S>) -> Self {
        let mut set = Self::default();

        for token in tokens {
            set.insert_token(token.as_ref());
        }

        set
    }

    fn insert_token(&mut self, token: &str) {
        match token.parse::<Verb>() {
            Ok(verb) => {
                self.verbs.insert(verb);
            }
            Err(UnknownVerb(token)) => {
                self.opaque.insert(token);
            }
        }
    }

    /// Returns `true` if `verb` is allowed by this set.
    ///
    /// This is the only authorization primitive: an empty set allows every verb,
    /// otherwise the verb must be a member.
    pub fn contains(&self, verb: Verb) -> bool {
        self.is_empty() || self.verbs.contains(&verb)
    }

    /// Returns `true` if every defined verb is allowed.
    pub fn is_unrestricted(&self) -> bool {
        self.is_empty() || Verb::ALL.iter().all(|verb| self.verbs.contains(verb))
    }

    /// Returns `true` if the set has no members at all.
    pub fn is_empty(&self) -> bool {
        self.verbs.is_empty() && self.opaque.is_empty()
    }

    /// Number of members, malformed tokens included.
    pub fn len(&self) -> usize {
        self.verbs.len() + self.opaque.len()
    }

    /// Iterates the valid verbs in canonical order.
    pub fn verbs(&self) -> impl Iterator<Item = Verb> + '_ {
        self.verbs.iter().copied()
    }

    /// Iterates every member as written: verbs in canonical order, then malformed
    /// tokens in lexicographic order.
    fn tokens(&self) -> impl Iterator<Item = &str> + '_ {
        self.verbs
            .iter()
            .map(|verb| -> &str { verb.as_str() })
            .chain(self.opaque.iter().map(String::as_str))
    }
}

impl PartialEq for PermissionSet {
    fn eq(&self, other: &Self) -> bool {
        if self.is_unrestricted() || other.is_unrestricted() {
            return self.is_unrestricted() && other.is_unrestricted();
        }

        self.verbs == other.verbs && self.opaque == other.opaque
    }
}

impl Eq for PermissionSet {}

impl FromIterator<Verb> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Verb>>(iter: I) -> Self {
        Self::from_verbs(iter)
    }
}

impl FromStr for PermissionSet {
    type Err = Infallible;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(token))
    }
}

impl fmt::Display for PermissionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unrestricted() {
            return f.write_str(ALL_VERBS);
        }

        for (index, token) in self.tokens().enumerate() {
            if index > 0 {
                write!(f, "{VERB_SEPARATOR}")?;
            }
            f.write_str(token)?;
        }

        Ok(())
    }
}

/// Encodes the members as a list of strings in canonical order.
///
/// The empty set encodes as `[]` and the full set as all five verbs, which both
/// decode back to an unrestricted set.
impl Serialize for PermissionSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for token in self.tokens() {
            seq.serialize_element(token)?;
        }
        seq.end()
    }
}

/// Decodes either a list of verb tokens or the comma-joined text form.
///
/// The decoded set holds exactly the listed members. An `ALL` member makes the
/// whole set unrestricted, as it does in the text form.
impl<'de> Deserialize<'de> for PermissionSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(PermissionSetVisitor)
    }
}

struct PermissionSetVisitor;

impl<'de> Visitor<'de> for PermissionSetVisitor {
    type Value = PermissionSet;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a list of verbs or a comma-separated verb string")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
        Ok(PermissionSet::parse(value))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut set = PermissionSet::default();
        let mut unrestricted = false;

        while let Some(token) = seq.next_element::<String>()? {
            if token == ALL_VERBS {
                unrestricted = true;
            } else {
                set.insert_token(&token);
            }
        }

        Ok(if unrestricted { PermissionSet::all() } else { set })
    }
}
