use serde::Serialize;
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::errors::{SearchError, SearchResult};

/// A node of the result tree.
///
/// The root node carries the absolute search root; every other node carries a single path
/// component. Children keep the order in which they were first inserted, and siblings
/// never share a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeNode {
    pub value: PathBuf,
    pub children: Vec<TreeNode>,
    pub expanded: bool,
}

impl TreeNode {
    fn new(value: PathBuf, expanded: bool) -> Self {
        Self {
            value,
            children: Vec::new(),
            expanded,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Text to show for this node
    pub fn label(&self) -> String {
        self.value.display().to_string()
    }

    /// Direct child with the given component, if any
    pub fn child(&self, name: impl AsRef<OsStr>) -> Option<&TreeNode> {
        let name = name.as_ref();
        self.children.iter().find(|c| c.value.as_os_str() == name)
    }

    pub fn set_expanded(&mut self, expanded: bool) {
        self.expanded = expanded;
    }

    /// Absolute paths of all leaves below this node, in pre-order.
    ///
    /// Called on the root this recovers the distinct shaped paths that have no further
    /// children. A root without children has no leaves.
    pub fn leaf_paths(&self) -> Vec<PathBuf> {
        let mut leaves = Vec::new();
        for child in &self.children {
            child.collect_leaves(&self.value, &mut leaves);
        }
        leaves
    }

    fn collect_leaves(&self, parent: &Path, leaves: &mut Vec<PathBuf>) {
        let path = parent.join(&self.value);
        if self.children.is_empty() {
            leaves.push(path);
            return;
        }
        for child in &self.children {
            child.collect_leaves(&path, leaves);
        }
    }

    /// Depth-first pre-order walk yielding `(depth, node)`, the root at depth 0
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            stack: vec![(0, self)],
        }
    }

    /// Number of nodes, the root included
    pub fn node_count(&self) -> usize {
        self.iter().count()
    }
}

/// Pre-order iterator over a [`TreeNode`], see [`TreeNode::iter`]
#[derive(Debug)]
pub struct Iter<'a> {
    stack: Vec<(usize, &'a TreeNode)>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (usize, &'a TreeNode);

    fn next(&mut self) -> Option<Self::Item> {
        let (depth, node) = self.stack.pop()?;
        self.stack
            .extend(node.children.iter().rev().map(|child| (depth + 1, child)));
        Some((depth, node))
    }
}

/// Builds a [`TreeNode`] one path at a time
#[derive(Debug, Clone)]
pub struct TreeBuilder {
    root: TreeNode,
}

impl TreeBuilder {
    /// Starts an empty tree; the root is expanded
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: TreeNode::new(root.into(), true),
        }
    }

    /// Adds `path`, creating any missing nodes below the root.
    ///
    /// `path` must lie under the root. A path equal to the root adds nothing.
    pub fn insert(&mut self, path: &Path) -> SearchResult<()> {
        let relative = path
            .strip_prefix(&self.root.value)
            .map_err(|_| SearchError::path_outside_root(path, &self.root.value))?;

        let mut components = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(name) => components.push(name),
                _ => return Err(SearchError::path_outside_root(path, &self.root.value)),
            }
        }

        let mut node = &mut self.root;
        for name in components {
            let index = match node.children.iter().position(|c| c.value.as_os_str() == name) {
                Some(index) => index,
                None => {
                    node.children.push(TreeNode::new(PathBuf::from(name), false));
                    node.children.len() - 1
                }
            };
            node = &mut node.children[index];
        }
        Ok(())
    }

    pub fn finish(self) -> TreeNode {
        self.root
    }
}

/// Shapes a flat list of paths under `root` into a tree.
///
/// Paths are inserted in the given order, so children appear in the order their first
/// descendant appears in `paths`.
pub fn shape<P: AsRef<Path>>(root: &Path, paths: &[P]) -> SearchResult<TreeNode> {
    debug!("Shaping {} paths under {}", paths.len(), root.display());
    let mut builder = TreeBuilder::new(root);
    for path in paths {
        builder.insert(path.as_ref())?;
    }
    Ok(builder.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    fn names(node: &TreeNode) -> Vec<String> {
        node.children.iter().map(TreeNode::label).collect()
    }

    #[test]
    fn test_single_file() {
        let root = Path::new("/r");
        let tree = shape(root, &["/r/a.log"]).unwrap();
        assert_eq!(tree.value, PathBuf::from("/r"));
        assert!(tree.expanded);
        assert_eq!(names(&tree), vec!["a.log"]);
        assert!(!tree.children[0].expanded);
        assert!(tree.children[0].is_leaf());
    }

    #[test]
    fn test_children_keep_first_insertion_order() {
        let root = Path::new("/r");
        let tree = shape(root, &["/r/x/y/a.log", "/r/x/b.log", "/r/z/c.log"]).unwrap();

        assert_eq!(names(&tree), vec!["x", "z"]);
        let x = tree.child("x").unwrap();
        assert_eq!(names(x), vec!["y", "b.log"]);
        assert_eq!(names(x.child("y").unwrap()), vec!["a.log"]);
        assert_eq!(names(tree.child("z").unwrap()), vec!["c.log"]);
    }

    #[test]
    fn test_duplicates_and_shared_prefixes() {
        let root = Path::new("/r");
        let tree = shape(root, &["/r/x/a.log", "/r/x/a.log", "/r/x/b.log", "/r/x"]).unwrap();
        assert_eq!(names(&tree), vec!["x"]);
        assert_eq!(names(&tree.children[0]), vec!["a.log", "b.log"]);
        assert_eq!(tree.node_count(), 4);
    }

    #[test]
    fn test_root_path_adds_nothing() {
        let root = Path::new("/r");
        let tree = shape(root, &["/r"]).unwrap();
        assert!(tree.is_leaf());
        assert!(tree.leaf_paths().is_empty());
    }

    #[test]
    fn test_path_outside_root() {
        let root = Path::new("/r");
        let err = shape(root, &["/other/a.log"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PathOutsideRoot);

        let err = shape(root, &["/r/../etc/passwd"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PathOutsideRoot);

        // A sibling directory that merely shares a name prefix is outside too
        let err = shape(root, &["/rr/a.log"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PathOutsideRoot);
    }

    #[test]
    fn test_leaf_paths_recover_input() {
        let root = Path::new("/r");
        let paths = vec![
            PathBuf::from("/r/x/y/a.log"),
            PathBuf::from("/r/x/b.log"),
            PathBuf::from("/r/z/c.log"),
        ];
        let tree = shape(root, &paths).unwrap();
        assert_eq!(tree.leaf_paths(), paths);
    }

    #[test]
    fn test_reshaping_is_idempotent() {
        let root = Path::new("/r");
        let paths = [
            "/r/z/c.log",
            "/r/x/y/a.log",
            "/r/z/c.log",
            "/r/x/b.log",
            "/r/a.log",
        ];
        let tree = shape(root, &paths).unwrap();
        let again = shape(root, &tree.leaf_paths()).unwrap();
        assert_eq!(again, tree);

        // Same set of paths, deduplicated
        let mut leaves = tree.leaf_paths();
        leaves.sort();
        let mut expected: Vec<PathBuf> = paths.iter().map(PathBuf::from).collect();
        expected.sort();
        expected.dedup();
        assert_eq!(leaves, expected);
    }

    #[test]
    fn test_iter_depths() {
        let root = Path::new("/r");
        let tree = shape(root, &["/r/x/a.log", "/r/b.log"]).unwrap();
        let walked: Vec<(usize, String)> = tree.iter().map(|(d, n)| (d, n.label())).collect();
        assert_eq!(
            walked,
            vec![
                (0, "/r".to_string()),
                (1, "x".to_string()),
                (2, "a.log".to_string()),
                (1, "b.log".to_string()),
            ]
        );
    }

    #[test]
    fn test_set_expanded() {
        let root = Path::new("/r");
        let mut tree = shape(root, &["/r/x/a.log"]).unwrap();
        tree.children[0].set_expanded(true);
        assert!(tree.children[0].expanded);
        tree.set_expanded(false);
        assert!(!tree.expanded);
    }

    #[test]
    fn test_tree_serializes_nested_children() {
        let tree = shape(Path::new("/r"), &["/r/x/a.log", "/r/b.log"]).unwrap();
        let value = serde_json::to_value(&tree).unwrap();

        assert_eq!(value["value"], "/r");
        assert_eq!(value["expanded"], true);
        let children = value["children"].as_array().unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0]["value"], "x");
        assert_eq!(children[0]["children"][0]["value"], "a.log");
        assert_eq!(children[0]["children"][0]["children"], serde_json::json!([]));
        assert_eq!(children[1]["value"], "b.log");
    }
}
