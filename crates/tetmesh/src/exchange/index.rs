/// The constant subtracted from every index of a file-set to make it 0-based.
///
/// TetGen numbers from either 0 or 1 and says so only implicitly, through the
/// id of the first node record. Every index in the companion `.ele` and
/// `.face` files must then be shifted by the same amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexShift(u8);

impl IndexShift {
    pub const ZERO: IndexShift = IndexShift(0);
    pub const ONE: IndexShift = IndexShift(1);

    /// Detect the shift from the id of the first record of the primary file,
    /// which must be `0` or `1`.
    pub fn detect(first_id: i64) -> Option<Self> {
        match first_id {
            0 => Some(Self::ZERO),
            1 => Some(Self::ONE),
            _ => None,
        }
    }

    pub fn amount(&self) -> usize {
        self.0 as usize
    }

    /// Normalize a raw index, returning `None` if the result would be
    /// negative or not below `bound`.
    pub fn apply(&self, raw: i64, bound: usize) -> Option<usize> {
        let shifted = usize::try_from(raw.checked_sub(i64::from(self.0))?).ok()?;
        (shifted < bound).then_some(shifted)
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn test_index_shift() {
        assert_eq!(IndexShift::detect(0), Some(IndexShift::ZERO));
        assert_eq!(IndexShift::detect(1), Some(IndexShift::ONE));
        assert_eq!(IndexShift::detect(2), None);
        assert_eq!(IndexShift::detect(-1), None);

        let one = IndexShift::ONE;
        assert_eq!(one.amount(), 1);
        assert_eq!(one.apply(1, 4), Some(0));
        assert_eq!(one.apply(4, 4), Some(3));
        assert_eq!(one.apply(5, 4), None);
        assert_eq!(one.apply(0, 4), None);

        let zero = IndexShift::ZERO;
        assert_eq!(zero.apply(0, 4), Some(0));
        assert_eq!(zero.apply(4, 4), None);
        assert_eq!(zero.apply(-1, 4), None);
    }
}
