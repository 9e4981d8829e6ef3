//! Binary entropy and the description-length proxy used by context selection.

/// Binary entropy H(p) in bits. Zero at p = 0 and p = 1.
pub fn binary_entropy_bits(p: f64) -> f64 {
    if p.is_nan() {
        return f64::NAN;
    }
    if p <= 0.0 || p >= 1.0 {
        return 0.0;
    }
    -(p * p.log2() + (1.0 - p) * (1.0 - p).log2())
}

/// Expected number of bits to encode `total` bits of which `ones` are set,
/// under the empirical frequency: `total * H(ones / total)`.
///
/// A pure partition (all zeros or all ones) costs nothing.
pub fn partition_cost_bits(total: usize, ones: usize) -> f64 {
    debug_assert!(ones <= total, "ones={ones} exceeds total={total}");
    if ones == 0 || ones == total {
        return 0.0;
    }
    let p = ones as f64 / total as f64;
    total as f64 * binary_entropy_bits(p)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    #[test]
    fn entropy_known_values() {
        assert_eq!(binary_entropy_bits(0.5), 1.0);
        assert_eq!(binary_entropy_bits(0.0), 0.0);
        assert_eq!(binary_entropy_bits(1.0), 0.0);
        assert!(approx_eq(binary_entropy_bits(0.25), 0.811_278_124_459_132_9, 1e-12));
    }

    #[test]
    fn entropy_is_symmetric() {
        for p in [0.1, 0.2, 0.3, 0.45] {
            assert!(approx_eq(binary_entropy_bits(p), binary_entropy_bits(1.0 - p), 1e-12));
        }
    }

    #[test]
    fn pure_partitions_are_free() {
        assert_eq!(partition_cost_bits(0, 0), 0.0);
        assert_eq!(partition_cost_bits(7, 0), 0.0);
        assert_eq!(partition_cost_bits(7, 7), 0.0);
    }

    #[test]
    fn balanced_partition_costs_one_bit_each() {
        assert_eq!(partition_cost_bits(8, 4), 8.0);
        assert!(approx_eq(partition_cost_bits(4, 1), 4.0 * 0.811_278_124_459_132_9, 1e-12));
    }
}
