use std::fmt;
use std::str::FromStr;

use super::glob::is_glob;
use crate::SpaceError;

pub const SEPARATOR: char = '/';

/// An absolute path into a space.
///
/// Stored in canonical form (`/a/b/c`). The root (`/`) can only be built with
/// [`Path::root`] or [`Path::parse_location`]; [`Path::parse`] rejects it
/// since no value can live there.
///
/// Components are kept verbatim. An escaped metacharacter makes a component
/// literal but the backslash stays part of the name: `/a\*` addresses the
/// node named `a\*`, never a node named `a*`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    text: String,
    pattern: bool,
}

impl Path {
    /// Parses path text.
    ///
    /// A single leading `/` is stripped, the rest is split on `/`. Empty input,
    /// bare `/`, doubled or trailing separators and unterminated `[` classes
    /// are rejected. `.` and `..` are plain names.
    pub fn parse(text: &str) -> Result<Self, SpaceError> {
        let body = text.strip_prefix(SEPARATOR).unwrap_or(text);
        if body.is_empty() {
            return Err(invalid(text, "empty path"));
        }

        let mut pattern = false;
        for component in body.split(SEPARATOR) {
            if component.is_empty() {
                return Err(invalid(text, "empty component"));
            }
            if is_glob(component) {
                if !classes_terminated(component) {
                    return Err(invalid(text, "unterminated character class"));
                }
                pattern = true;
            }
        }

        let mut canonical = String::with_capacity(body.len() + 1);
        canonical.push(SEPARATOR);
        canonical.push_str(body);
        Ok(Self {
            text: canonical,
            pattern,
        })
    }

    /// Like [`Path::parse`] but also accepts `/` as the root location.
    /// Used by operations that address a subtree rather than a value.
    pub fn parse_location(text: &str) -> Result<Self, SpaceError> {
        if text == "/" {
            return Ok(Self::root());
        }
        Self::parse(text)
    }

    /// Builds a path from components that already passed validation
    pub(crate) fn from_components(components: &[&str]) -> Self {
        if components.is_empty() {
            return Self::root();
        }
        let mut text = String::new();
        for component in components {
            text.push(SEPARATOR);
            text.push_str(component);
        }
        Self {
            text,
            pattern: components.iter().any(|c| is_glob(c)),
        }
    }

    pub fn root() -> Self {
        Self {
            text: SEPARATOR.to_string(),
            pattern: false,
        }
    }

    pub fn is_root(&self) -> bool {
        self.text.len() == 1
    }

    /// True if any component is a glob
    pub fn is_pattern(&self) -> bool {
        self.pattern
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Lazily yields the components. The iterator is `Clone`, so a walk
    /// can be restarted from any point.
    pub fn components(&self) -> Components<'_> {
        if self.is_root() {
            Components { inner: None }
        } else {
            Components {
                inner: Some(self.text[1..].split(SEPARATOR)),
            }
        }
    }

    pub fn depth(&self) -> usize {
        self.components().count()
    }

    /// Last component, `None` for the root
    pub fn name(&self) -> Option<&str> {
        if self.is_root() {
            return None;
        }
        self.text.rsplit(SEPARATOR).next()
    }

    pub fn parent(&self) -> Option<Path> {
        if self.is_root() {
            return None;
        }
        match self.text.rfind(SEPARATOR) {
            Some(0) => Some(Self::root()),
            Some(idx) => {
                let text = self.text[..idx].to_string();
                let pattern = text[1..].split(SEPARATOR).any(is_glob);
                Some(Self { text, pattern })
            }
            None => None,
        }
    }

    /// Appends one component. The name must not contain a separator.
    pub fn join(
        &self,
        name: &str,
    ) -> Result<Path, SpaceError> {
        if name.is_empty() {
            return Err(invalid(name, "empty component"));
        }
        if name.contains(SEPARATOR) {
            return Err(invalid(name, "component contains separator"));
        }
        let mut text = String::with_capacity(self.text.len() + name.len() + 1);
        if !self.is_root() {
            text.push_str(&self.text);
        }
        text.push(SEPARATOR);
        text.push_str(name);
        Self::parse(&text)
    }

    /// Appends a name taken from the tree, skipping validation
    pub(crate) fn child(
        &self,
        name: &str,
    ) -> Path {
        let mut text = String::with_capacity(self.text.len() + name.len() + 1);
        if !self.is_root() {
            text.push_str(&self.text);
        }
        text.push(SEPARATOR);
        text.push_str(name);
        Self {
            text,
            pattern: self.pattern || is_glob(name),
        }
    }

    /// Appends all components of `suffix` below `self`
    pub fn join_path(
        &self,
        suffix: &Path,
    ) -> Path {
        if self.is_root() {
            return suffix.clone();
        }
        if suffix.is_root() {
            return self.clone();
        }
        Self {
            text: format!("{}{}", self.text, suffix.text),
            pattern: self.pattern || suffix.pattern,
        }
    }

    /// Component-wise prefix test; the root is a prefix of everything.
    /// `/a` is a prefix of `/a/b` but not of `/ab`.
    pub fn starts_with(
        &self,
        prefix: &Path,
    ) -> bool {
        if prefix.is_root() {
            return true;
        }
        match self.text.strip_prefix(prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with(SEPARATOR),
            None => false,
        }
    }

    /// Longest leading run of literal components.
    ///
    /// Every concrete path a pattern can match lies below this prefix.
    /// Returns the root when the first component is already a glob.
    pub fn literal_prefix(&self) -> Path {
        if !self.pattern {
            return self.clone();
        }
        let mut prefix = Self::root();
        for component in self.components() {
            if is_glob(component) {
                break;
            }
            prefix = Self {
                text: if prefix.is_root() {
                    format!("{SEPARATOR}{component}")
                } else {
                    format!("{}{SEPARATOR}{component}", prefix.text)
                },
                pattern: false,
            };
        }
        prefix
    }
}

fn invalid(
    text: &str,
    reason: &'static str,
) -> SpaceError {
    SpaceError::InvalidPath {
        path: text.to_string(),
        reason,
    }
}

fn classes_terminated(component: &str) -> bool {
    let mut chars = component.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '[' => {
                if !chars.by_ref().any(|c| c == ']') {
                    return false;
                }
            }
            _ => {}
        }
    }
    true
}

/// Iterator over the components of a [`Path`]
#[derive(Clone, Debug)]
pub struct Components<'a> {
    inner: Option<std::str::Split<'a, char>>,
}

impl<'a> Iterator for Components<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.as_mut()?.next()
    }
}

impl fmt::Display for Path {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl fmt::Debug for Path {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "Path({})", self.text)
    }
}

impl FromStr for Path {
    type Err = SpaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Path::parse(s)
    }
}

impl TryFrom<&str> for Path {
    type Error = SpaceError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Path::parse(value)
    }
}

impl AsRef<str> for Path {
    fn as_ref(&self) -> &str {
        &self.text
    }
}
