use serde::{Deserialize, Serialize};

/// An invertible mapping over dimension indices.
///
/// A permutation is given in one-line notation: position `i` of the input is
/// mapped to position `map[i]` of the output. Applied to a sequence it
/// produces `result[map[i]] = input[i]`.
///
/// # Examples
/// ```
/// use tilesparse::permutation::Permutation;
/// let perm = Permutation::new(vec![2, 0, 1]);
/// assert_eq!(perm.permute(&[10, 20, 30]), vec![20, 30, 10]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permutation {
    map: Vec<usize>,
}

impl Permutation {
    /// Constructs a permutation from its one-line notation.
    ///
    /// # Panics
    /// Panics if `map` is not a bijection over `0..map.len()`.
    pub fn new(map: Vec<usize>) -> Self {
        let mut seen = vec![false; map.len()];
        for &target in &map {
            assert!(
                target < map.len() && !seen[target],
                "permutation {map:?} is not a bijection over 0..{}",
                map.len()
            );
            seen[target] = true;
        }
        Self { map }
    }

    /// Constructs the identity permutation over `rank` dimensions.
    ///
    /// # Examples
    /// ```
    /// use tilesparse::permutation::Permutation;
    /// assert!(Permutation::identity(4).is_identity());
    /// ```
    pub fn identity(rank: usize) -> Self {
        Self {
            map: (0..rank).collect(),
        }
    }

    /// Returns the number of dimensions this permutation acts on.
    pub fn rank(&self) -> usize {
        self.map.len()
    }

    /// Returns the output position of input position `i`.
    pub fn map(&self, i: usize) -> usize {
        self.map[i]
    }

    /// Returns true if every position maps to itself.
    pub fn is_identity(&self) -> bool {
        self.map.iter().enumerate().all(|(i, &target)| i == target)
    }

    /// Returns the inverse permutation.
    ///
    /// # Examples
    /// ```
    /// use tilesparse::permutation::Permutation;
    /// let perm = Permutation::new(vec![1, 2, 0]);
    /// let inverse = perm.inverse();
    /// assert_eq!(inverse.permute(&perm.permute(&[5, 6, 7])), vec![5, 6, 7]);
    /// ```
    pub fn inverse(&self) -> Self {
        let mut map = vec![0; self.map.len()];
        for (i, &target) in self.map.iter().enumerate() {
            map[target] = i;
        }
        Self { map }
    }

    /// Applies the permutation to a sequence: `result[map[i]] = values[i]`.
    ///
    /// # Panics
    /// Panics if `values` does not have one entry per dimension.
    pub fn permute<T: Clone>(&self, values: &[T]) -> Vec<T> {
        assert_eq!(
            values.len(),
            self.map.len(),
            "permutation rank {} does not match sequence length {}",
            self.map.len(),
            values.len()
        );
        let mut result = values.to_vec();
        for (value, &target) in values.iter().zip(&self.map) {
            result[target] = value.clone();
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::Permutation;

    #[test]
    fn test_identity() {
        let perm = Permutation::identity(3);
        assert!(perm.is_identity());
        assert_eq!(perm.permute(&[1, 2, 3]), vec![1, 2, 3]);
    }

    #[test]
    fn test_permute_sequence() {
        let perm = Permutation::new(vec![2, 0, 1]);
        assert!(!perm.is_identity());
        assert_eq!(perm.permute(&["a", "b", "c"]), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_inverse_round_trip() {
        let perm = Permutation::new(vec![3, 1, 0, 2]);
        let inverse = perm.inverse();
        let values = [9, 8, 7, 6];
        assert_eq!(inverse.permute(&perm.permute(&values)), values.to_vec());
        assert!(Permutation::new(vec![0, 1, 2]).inverse().is_identity());
    }

    #[test]
    #[should_panic(expected = "not a bijection")]
    fn test_rejects_duplicate_targets() {
        Permutation::new(vec![0, 0, 1]);
    }

    #[test]
    #[should_panic(expected = "not a bijection")]
    fn test_rejects_out_of_range_targets() {
        Permutation::new(vec![0, 3]);
    }
}
