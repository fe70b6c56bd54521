//! Pairwise collision enable table and the collision-filter seam.

use crate::dynamics::object::PhysicsObject;
use crate::errors::{PhysicsError, Result};

/// Decides whether two objects may generate contacts.
///
/// The environment consults its filter while the engine builds contact pairs,
/// and again when [`Environment::recheck_collision_filter`] sweeps the existing
/// pairs after filtering-relevant state changed.
///
/// [`Environment::recheck_collision_filter`]: crate::Environment::recheck_collision_filter
pub trait CollisionFilter: Send + Sync {
    /// Returns `false` if contacts between `a` and `b` must be discarded.
    fn needs_collision(&self, a: &PhysicsObject, b: &PhysicsObject) -> bool;
}

/// A fixed-capacity symmetric table of which index pairs may collide.
///
/// Entry `i` is a single machine word whose bit `j` says whether `i` collides
/// with `j`, so the capacity is bounded by the word size.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollisionSet {
    words: Vec<u64>,
}

impl CollisionSet {
    /// Largest number of entries a set can hold.
    pub const MAX_ENTRIES: usize = u64::BITS as usize;

    /// Creates a set where no pair collides.
    pub fn new(max_entries: usize) -> Result<Self> {
        if max_entries > Self::MAX_ENTRIES {
            return Err(PhysicsError::CapacityExceeded {
                requested: max_entries,
                max: Self::MAX_ENTRIES,
            });
        }

        Ok(Self {
            words: vec![0; max_entries],
        })
    }

    /// Number of entries of this set.
    pub fn max_entries(&self) -> usize {
        self.words.len()
    }

    fn check(&self, index0: usize, index1: usize) -> Result<()> {
        for index in [index0, index1] {
            if index >= self.words.len() {
                return Err(PhysicsError::IndexOutOfRange {
                    index,
                    capacity: self.words.len(),
                });
            }
        }
        Ok(())
    }

    /// Allows `index0` and `index1` to collide with each other.
    pub fn enable_collisions(&mut self, index0: usize, index1: usize) -> Result<()> {
        self.check(index0, index1)?;
        self.words[index0] |= 1u64 << index1;
        self.words[index1] |= 1u64 << index0;
        Ok(())
    }

    /// Prevents `index0` and `index1` from colliding with each other.
    pub fn disable_collisions(&mut self, index0: usize, index1: usize) -> Result<()> {
        self.check(index0, index1)?;
        self.words[index0] &= !(1u64 << index1);
        self.words[index1] &= !(1u64 << index0);
        Ok(())
    }

    /// Whether `index0` and `index1` may collide.
    ///
    /// Indices outside the table are not filtered by it: the answer is `true`.
    pub fn should_collide(&self, index0: usize, index1: usize) -> bool {
        if let Err(err) = self.check(index0, index1) {
            tracing::warn!(%err, index0, index1, "collision set queried out of range");
            return true;
        }

        self.words[index0] & (1u64 << index1) != 0
    }
}

impl CollisionFilter for CollisionSet {
    /// Looks both objects up by their game index.
    fn needs_collision(&self, a: &PhysicsObject, b: &PhysicsObject) -> bool {
        self.should_collide(a.game_index() as usize, b.game_index() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_nothing_colliding() {
        let set = CollisionSet::new(8).unwrap();
        for i in 0..8 {
            for j in 0..8 {
                assert!(!set.should_collide(i, j));
            }
        }
    }

    #[test]
    fn enable_and_disable_are_symmetric() {
        let mut set = CollisionSet::new(16).unwrap();
        set.enable_collisions(3, 11).unwrap();
        assert!(set.should_collide(3, 11));
        assert!(set.should_collide(11, 3));
        assert!(!set.should_collide(3, 3));

        set.disable_collisions(11, 3).unwrap();
        assert!(!set.should_collide(3, 11));
        assert!(!set.should_collide(11, 3));
    }

    #[test]
    fn index_zero_is_valid() {
        let mut set = CollisionSet::new(4).unwrap();
        set.enable_collisions(0, 0).unwrap();
        assert!(set.should_collide(0, 0));
    }

    #[test]
    fn out_of_range_is_rejected_without_corruption() {
        let mut set = CollisionSet::new(4).unwrap();
        set.enable_collisions(1, 2).unwrap();
        let before = set.clone();

        assert_eq!(
            set.enable_collisions(1, 4),
            Err(PhysicsError::IndexOutOfRange {
                index: 4,
                capacity: 4
            })
        );
        assert!(set.disable_collisions(9, 2).is_err());
        assert_eq!(set, before);
        assert!(set.should_collide(1, 2));
        assert!(set.should_collide(1, 40));
    }

    #[test]
    fn full_word_capacity() {
        let mut set = CollisionSet::new(CollisionSet::MAX_ENTRIES).unwrap();
        set.enable_collisions(0, 63).unwrap();
        assert!(set.should_collide(63, 0));
        assert!(CollisionSet::new(65).is_err());
    }
}
