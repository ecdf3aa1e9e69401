//! Two-level storage classification.

/// `(kind, group)` classification used to lay out object paths.
///
/// An empty group collapses the path to a single level.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FolderPath {
    pub kind: String,
    pub group: String,
}

impl FolderPath {
    pub fn new(kind: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            group: group.into(),
        }
    }

    /// Prefix this folder with a root segment: `root/kind/group` or `root/kind`.
    pub fn under(&self, root: &str) -> String {
        if self.group.is_empty() {
            format!("{}/{}", root, self.kind)
        } else {
            format!("{}/{}/{}", root, self.kind, self.group)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_under_two_levels() {
        let folder = FolderPath::new("member", "abc");
        assert_eq!(folder.under("json"), "json/member/abc");
    }

    #[test]
    fn test_under_empty_group_collapses() {
        let folder = FolderPath::new("files", "");
        assert_eq!(folder.under("json"), "json/files");
    }
}
