use serde::Serialize;
use std::fmt;

/// Progress of a running task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum Progress {
    /// Work is under way but its size is not known yet
    #[default]
    Indeterminate,
    /// `done` out of `total` units are finished
    Determinate { done: usize, total: usize },
}

impl Progress {
    pub fn determinate(done: usize, total: usize) -> Self {
        Self::Determinate { done, total }
    }

    /// Completed fraction in `0.0..=1.0`, if known. An empty batch counts as complete.
    pub fn fraction(&self) -> Option<f64> {
        match *self {
            Self::Indeterminate => None,
            Self::Determinate { total: 0, .. } => Some(1.0),
            Self::Determinate { done, total } => Some((done.min(total)) as f64 / total as f64),
        }
    }

    /// Whether moving from `previous` to `self` keeps progress non-decreasing.
    ///
    /// Indeterminate may turn determinate but never the reverse, and `done` never shrinks.
    pub fn follows(&self, previous: &Progress) -> bool {
        match (previous, self) {
            (Self::Indeterminate, _) => true,
            (Self::Determinate { .. }, Self::Indeterminate) => false,
            (Self::Determinate { done: before, .. }, Self::Determinate { done, .. }) => {
                done >= before
            }
        }
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Indeterminate => write!(f, "-/-"),
            Self::Determinate { done, total } => write!(f, "{}/{}", done, total),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction() {
        assert_eq!(Progress::Indeterminate.fraction(), None);
        assert_eq!(Progress::determinate(0, 0).fraction(), Some(1.0));
        assert_eq!(Progress::determinate(1, 4).fraction(), Some(0.25));
    }

    #[test]
    fn test_monotonic_transitions() {
        let start = Progress::Indeterminate;
        let one = Progress::determinate(1, 3);
        let two = Progress::determinate(2, 3);

        assert!(start.follows(&start));
        assert!(one.follows(&start));
        assert!(two.follows(&one));
        assert!(two.follows(&two));
        assert!(!one.follows(&two));
        assert!(!start.follows(&one));
    }

    #[test]
    fn test_display() {
        assert_eq!(Progress::Indeterminate.to_string(), "-/-");
        assert_eq!(Progress::determinate(3, 10).to_string(), "3/10");
    }
}
