//! Key paths shared by the evaluator's variable trace and the dependency
//! analyzer.

use std::fmt;

/// One segment of a key path: an attribute/object key or an array index.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathSeg {
    Name(String),
    Index(i64),
}

/// A path of projections rooted at an outer-scope variable, `a.b[0].c`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct KeyPath(pub Vec<PathSeg>);

impl KeyPath {
    pub fn root(name: impl Into<String>) -> Self {
        KeyPath(vec![PathSeg::Name(name.into())])
    }

    pub fn segments(&self) -> &[PathSeg] {
        &self.0
    }

    /// Name of the outer-scope variable this path starts at.
    pub fn root_name(&self) -> Option<&str> {
        match self.0.first() {
            Some(PathSeg::Name(name)) => Some(name),
            _ => None,
        }
    }

    pub fn child(&self, seg: PathSeg) -> KeyPath {
        let mut segments = self.0.clone();
        segments.push(seg);
        KeyPath(segments)
    }

    /// True when `self` and `other` address overlapping data: one is a
    /// prefix of the other.
    pub fn overlaps(&self, other: &KeyPath) -> bool {
        let len = self.0.len().min(other.0.len());
        self.0[..len] == other.0[..len]
    }
}

impl FromIterator<PathSeg> for KeyPath {
    fn from_iter<I: IntoIterator<Item = PathSeg>>(iter: I) -> Self {
        KeyPath(iter.into_iter().collect())
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.0.iter().enumerate() {
            match seg {
                PathSeg::Name(name) if i == 0 => write!(f, "{name}")?,
                PathSeg::Name(name) => write!(f, ".{name}")?,
                PathSeg::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(names: &[&str]) -> KeyPath {
        names
            .iter()
            .map(|name| PathSeg::Name(name.to_string()))
            .collect()
    }

    #[test]
    fn displays_dotted_paths() {
        let p = path(&["a", "b"]).child(PathSeg::Index(0)).child(PathSeg::Name("c".into()));
        assert_eq!(p.to_string(), "a.b[0].c");
    }

    #[test]
    fn overlap_is_mutual_prefix() {
        assert!(path(&["a"]).overlaps(&path(&["a", "b"])));
        assert!(path(&["a", "b"]).overlaps(&path(&["a"])));
        assert!(path(&["a", "b"]).overlaps(&path(&["a", "b"])));
        assert!(!path(&["a", "b"]).overlaps(&path(&["a", "c"])));
        assert!(!path(&["a"]).overlaps(&path(&["b"])));
    }
}
