use proptest::prelude::*;
use rankcheck_core::fixed::{FRAC_BITS, FixedPoint, PAYLOAD_HEADER_BITS};

fn arb_non_negative() -> impl Strategy<Value = FixedPoint> {
    (0..=i32::MAX).prop_map(FixedPoint::from_bits)
}

fn arb_unit() -> impl Strategy<Value = FixedPoint> {
    (0..=(1_i32 << FRAC_BITS)).prop_map(FixedPoint::from_bits)
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(2000))]

    // Truncation
    #[test]
    fn truncation_never_increases(x in arb_non_negative(), k in 0_u32..8) {
        prop_assert!(x.truncate_low_bits(k) <= x);
    }

    #[test]
    fn truncation_is_exact_iff_low_bits_clear(x in arb_non_negative(), k in 0_u32..8) {
        let mask = (1_i32 << k) - 1;
        prop_assert_eq!(x.truncate_low_bits(k) == x, x.to_bits() & mask == 0);
    }

    #[test]
    fn lossy_encode_loses_at_most_header_bits(x in arb_non_negative()) {
        let lost = x.abs_diff_bits(x.lossy_encode());
        prop_assert!(lost < 1 << PAYLOAD_HEADER_BITS);
    }

    // Division
    #[test]
    fn div_int_truncates_toward_zero(x in arb_unit(), n in 1_u32..10_000) {
        let q = x.div_int(n).expect("non-zero divisor");
        let back = i64::from(q.to_bits()) * i64::from(n);
        prop_assert!(back <= i64::from(x.to_bits()));
        prop_assert!(i64::from(x.to_bits()) - back < i64::from(n));
    }

    // Multiplication
    #[test]
    fn mul_by_one_is_identity(x in arb_unit()) {
        prop_assert_eq!(x * FixedPoint::ONE, x);
    }

    #[test]
    fn mul_truncates_toward_negative_infinity(a in any::<i32>(), b in arb_unit()) {
        let a = FixedPoint::from_bits(a);
        let wide = i64::from(a.to_bits()) * i64::from(b.to_bits());
        let got = i64::from((a * b).to_bits()) << FRAC_BITS;
        prop_assert!(got <= wide);
        prop_assert!(wide - got < 1 << FRAC_BITS);
    }

    // Conversion
    #[test]
    fn from_f64_rounds_to_nearest(v in 0.0_f64..1.0) {
        let x = FixedPoint::from_f64(v).expect("in range");
        prop_assert!((x.to_f64() - v).abs() <= FixedPoint::EPSILON.to_f64() / 2.0);
    }

    #[test]
    fn addition_saturates(a in any::<i32>(), b in any::<i32>()) {
        let sum = FixedPoint::from_bits(a) + FixedPoint::from_bits(b);
        prop_assert_eq!(sum.to_bits(), a.saturating_add(b));
    }
}
