//! Human-readable byte sizes
//!
//! Two renderings exist: [`format_size`] for individual messages (`"50.0KB"`)
//! and [`format_total_size`] for bucket totals (`"50.0 KB"`). The spacing
//! differs on purpose and both forms are relied on by the index page.
//!
//! Values carry one decimal and are rounded half-to-even on the exact
//! quotient, so `256` bytes is `"0.2KB"` and `768` bytes is `"0.8KB"`.

const KIB: u64 = 1024;
const MIB: u64 = 1024 * 1024;

/// Size of a single message, without a space before the unit
pub fn format_size(size_bytes: u64) -> String {
    let (tenths, unit) = scaled_tenths(size_bytes);
    format!("{}.{}{}", tenths / 10, tenths % 10, unit)
}

/// Size of a bucket total, with a space before the unit
pub fn format_total_size(size_bytes: u64) -> String {
    let (tenths, unit) = scaled_tenths(size_bytes);
    format!("{}.{} {}", tenths / 10, tenths % 10, unit)
}

/// Pick the unit and return the value in tenths of that unit
fn scaled_tenths(size_bytes: u64) -> (u128, &'static str) {
    if size_bytes < MIB {
        (divide_round_half_even(size_bytes as u128 * 10, KIB as u128), "KB")
    } else {
        (divide_round_half_even(size_bytes as u128 * 10, MIB as u128), "MB")
    }
}

fn divide_round_half_even(numerator: u128, denominator: u128) -> u128 {
    let quotient = numerator / denominator;
    let remainder = numerator % denominator;
    match (remainder * 2).cmp(&denominator) {
        std::cmp::Ordering::Less => quotient,
        std::cmp::Ordering::Greater => quotient + 1,
        std::cmp::Ordering::Equal if quotient % 2 == 0 => quotient,
        std::cmp::Ordering::Equal => quotient + 1,
    }
}
