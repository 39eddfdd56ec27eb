//! Macros Utilities

#[macro_export]
/// Packs a setup data version into the integer used for comparisons.
///
/// `inno_version!(5, 3, 9)` is `0x05030900`; a fourth component fills the low byte.
macro_rules! inno_version {
    ($a:expr, $b:expr, $c:expr $(,)?) => {
        $crate::inno_version!($a, $b, $c, 0)
    };
    ($a:expr, $b:expr, $c:expr, $d:expr $(,)?) => {
        ((($a as u32) << 24) | (($b as u32) << 16) | (($c as u32) << 8) | ($d as u32))
    };
}

#[test]
fn test_inno_version_packing() {
    assert_eq!(inno_version!(5, 3, 9), 0x0503_0900);
    assert_eq!(inno_version!(3, 0, 6, 1), 0x0300_0601);
    assert!(inno_version!(4, 2, 3) < inno_version!(4, 2, 4));
}
