/// Component that spans zero or more levels
pub const MULTI_LEVEL: &str = "**";

/// True if `name` contains an unescaped `*`, `?` or `[`.
///
/// ```
/// use pathspace::path::is_glob;
/// assert!(is_glob("item_*"));
/// assert!(!is_glob("item_\\*"));
/// ```
pub fn is_glob(name: &str) -> bool {
    let mut escaped = false;
    for c in name.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '*' | '?' | '[' => return true,
            _ => {}
        }
    }
    false
}

/// A single path component used as a matcher.
///
/// Supports `*` (any run, including empty), `?` (exactly one character),
/// `[abc]`, `[a-z]`, `[!x]` and backslash escapes. A component without
/// metacharacters only matches itself.
#[derive(Clone, Copy, Debug)]
pub struct GlobName<'a> {
    pattern: &'a str,
}

impl<'a> GlobName<'a> {
    pub fn new(pattern: &'a str) -> Self {
        Self { pattern }
    }

    pub fn as_str(&self) -> &'a str {
        self.pattern
    }

    pub fn is_glob(&self) -> bool {
        is_glob(self.pattern)
    }

    pub fn is_multi_level(&self) -> bool {
        self.pattern == MULTI_LEVEL
    }

    pub fn matches(
        &self,
        name: &str,
    ) -> bool {
        if !self.is_glob() {
            return self.pattern == name;
        }
        let pattern: Vec<char> = self.pattern.chars().collect();
        let name: Vec<char> = name.chars().collect();
        wildcard_match(&pattern, &name)
    }
}

/// Iterative wildcard match with single-star backtracking
fn wildcard_match(
    p: &[char],
    s: &[char],
) -> bool {
    let mut pi = 0;
    let mut si = 0;
    // (pattern index after the last `*`, input index it is anchored at)
    let mut star: Option<(usize, usize)> = None;

    while si < s.len() {
        let step = if pi < p.len() {
            match p[pi] {
                '*' => {
                    star = Some((pi + 1, si));
                    pi += 1;
                    continue;
                }
                '?' => Some(pi + 1),
                '[' => match match_class(p, pi, s[si]) {
                    Some((true, next)) => Some(next),
                    _ => None,
                },
                '\\' if pi + 1 < p.len() => (p[pi + 1] == s[si]).then_some(pi + 2),
                c => (c == s[si]).then_some(pi + 1),
            }
        } else {
            None
        };

        match (step, star) {
            (Some(next), _) => {
                pi = next;
                si += 1;
            }
            (None, Some((after_star, anchor))) => {
                pi = after_star;
                si = anchor + 1;
                star = Some((after_star, anchor + 1));
            }
            (None, None) => return false,
        }
    }

    p[pi..].iter().all(|&c| c == '*')
}

/// Evaluates the class starting at `p[start] == '['` against `c`.
/// Returns whether it matched and the index just past the closing `]`,
/// or `None` if the class is unterminated.
fn match_class(
    p: &[char],
    start: usize,
    c: char,
) -> Option<(bool, usize)> {
    let mut i = start + 1;
    let negate = matches!(p.get(i), Some('!') | Some('^'));
    if negate {
        i += 1;
    }

    let mut matched = false;
    while i < p.len() && p[i] != ']' {
        let mut lo = p[i];
        if lo == '\\' && i + 1 < p.len() {
            i += 1;
            lo = p[i];
        }
        if i + 2 < p.len() && p[i + 1] == '-' && p[i + 2] != ']' {
            let hi = p[i + 2];
            if lo <= c && c <= hi {
                matched = true;
            }
            i += 3;
        } else {
            if lo == c {
                matched = true;
            }
            i += 1;
        }
    }

    if i >= p.len() {
        return None;
    }
    Some((matched != negate, i + 1))
}
