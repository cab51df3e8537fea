//! Positional diff of ordered identifier lists.

/// Receives the edits that turn the old list into the new one.
pub trait ChildOps<T> {
    fn insert_child(&mut self, index: usize, child: &T);

    fn remove_child_at(&mut self, index: usize);
}

/// Remembers the last applied list and reports the inserts and removals
/// needed to reach each new one.
///
/// Matching runs are left alone; an entry missing from the new list is
/// removed, an entry missing from the old one is inserted. Because every
/// update is a full list this converges even when intermediate lists were
/// never seen.
#[derive(Debug, Clone)]
pub struct ChildMatch<T> {
    current: Vec<T>,
}

impl<T> Default for ChildMatch<T> {
    fn default() -> Self {
        Self { current: Vec::new() }
    }
}

impl<T: PartialEq + Clone> ChildMatch<T> {
    pub fn new() -> Self {
        Self { current: Vec::new() }
    }

    pub fn current(&self) -> &[T] {
        &self.current
    }

    pub fn apply(&mut self, new: &[T], ops: &mut impl ChildOps<T>) {
        let mut index = 0;
        while index < new.len() {
            let wanted = &new[index];
            if self.current.get(index) == Some(wanted) {
                index += 1;
                continue;
            }
            let later = self.current[index.min(self.current.len())..]
                .iter()
                .position(|c| c == wanted);
            match later {
                // Drop everything in front of it; the next pass matches.
                Some(skip) => {
                    for _ in 0..skip {
                        self.current.remove(index);
                        ops.remove_child_at(index);
                    }
                }
                None => {
                    self.current.insert(index, wanted.clone());
                    ops.insert_child(index, wanted);
                    index += 1;
                }
            }
        }
        while self.current.len() > new.len() {
            let last = self.current.len() - 1;
            self.current.pop();
            ops.remove_child_at(last);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    enum Op {
        Insert(usize, u32),
        Remove(usize),
    }

    #[derive(Default)]
    struct Recorder(Vec<Op>);

    impl ChildOps<u32> for Recorder {
        fn insert_child(&mut self, index: usize, child: &u32) {
            self.0.push(Op::Insert(index, *child));
        }

        fn remove_child_at(&mut self, index: usize) {
            self.0.push(Op::Remove(index));
        }
    }

    fn diff(matcher: &mut ChildMatch<u32>, new: &[u32]) -> Vec<Op> {
        let mut ops = Recorder::default();
        matcher.apply(new, &mut ops);
        assert_eq!(matcher.current(), new);
        ops.0
    }

    #[test]
    fn test_baseline_inserts_everything() {
        let mut m = ChildMatch::new();
        assert_eq!(
            diff(&mut m, &[1, 2, 3]),
            vec![Op::Insert(0, 1), Op::Insert(1, 2), Op::Insert(2, 3)]
        );
    }

    #[test]
    fn test_removal_in_the_middle() {
        let mut m = ChildMatch::new();
        diff(&mut m, &[1, 2, 3]);
        assert_eq!(diff(&mut m, &[1, 3]), vec![Op::Remove(1)]);
    }

    #[test]
    fn test_same_list_is_a_no_op() {
        let mut m = ChildMatch::new();
        diff(&mut m, &[1, 2]);
        assert!(diff(&mut m, &[1, 2]).is_empty());
    }

    #[test]
    fn test_missed_update_converges() {
        // [1, 2, 3] -> [1, 3, 4] -> [3, 4, 5] with the middle one lost.
        let mut m = ChildMatch::new();
        diff(&mut m, &[1, 2, 3]);
        assert_eq!(
            diff(&mut m, &[3, 4, 5]),
            vec![Op::Remove(0), Op::Remove(0), Op::Insert(1, 4), Op::Insert(2, 5)]
        );
    }

    #[test]
    fn test_reorder_and_truncate() {
        let mut m = ChildMatch::new();
        diff(&mut m, &[1, 2, 3]);
        assert_eq!(diff(&mut m, &[2, 1]), vec![Op::Remove(0), Op::Insert(1, 1), Op::Remove(2)]);
        assert_eq!(diff(&mut m, &[]), vec![Op::Remove(1), Op::Remove(0)]);
    }
}
