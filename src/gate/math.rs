/// Bound `value` to `[lower, upper]`.
///
/// Callers must keep `lower <= upper`; debug builds assert it.
pub fn clamp<T: Ord>(value: T, lower: T, upper: T) -> T {
    debug_assert!(lower <= upper, "clamp called with lower > upper");
    if value > upper {
        return upper;
    }
    if value < lower {
        return lower;
    }
    value
}
