use crate::path::Path;

/// Bounded set of path prefixes that are stale relative to the published
/// snapshot.
///
/// Roots never nest: marking a path already below a root is a no-op and
/// marking an ancestor absorbs the roots below it. Once more than `cap`
/// roots would be tracked the set collapses to `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirtyRoots {
    roots: Vec<Path>,
    cap: usize,
}

impl DirtyRoots {
    pub fn new(cap: usize) -> Self {
        Self {
            roots: Vec::new(),
            cap: cap.max(1),
        }
    }

    /// Marks `path` stale. A pattern marks its literal prefix, which covers
    /// every path it could match.
    pub fn mark(
        &mut self,
        path: &Path,
    ) {
        let root = path.literal_prefix();
        if root.is_root() {
            self.mark_all();
            return;
        }
        if self.covers(&root) {
            return;
        }
        self.roots.retain(|existing| !existing.starts_with(&root));
        self.roots.push(root);
        if self.roots.len() > self.cap {
            self.mark_all();
        }
    }

    pub fn mark_all(&mut self) {
        self.roots.clear();
        self.roots.push(Path::root());
    }

    /// `path` lies at or below some dirty root
    pub fn covers(
        &self,
        path: &Path,
    ) -> bool {
        self.roots.iter().any(|root| path.starts_with(root))
    }

    pub fn is_fully_dirty(&self) -> bool {
        self.roots.iter().any(Path::is_root)
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn roots(&self) -> &[Path] {
        &self.roots
    }

    pub fn clear(&mut self) {
        self.roots.clear();
    }
}
