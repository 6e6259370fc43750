//! Prime delay lengths.
//!
//! Delay lines whose lengths share a common factor have coinciding comb
//! resonances, which build up into audible periodicity. Choosing every length
//! as a distinct prime keeps the lines' modal frequencies interleaved.

/// Trial division up to √n.
pub fn is_prime(n: u32) -> bool {
    if n < 2 {
        return false;
    }
    if n < 4 {
        return true;
    }
    if n % 2 == 0 {
        return false;
    }
    let n = n as u64;
    let mut k = 3u64;
    while k * k <= n {
        if n % k == 0 {
            return false;
        }
        k += 2;
    }
    true
}

/// Fill `out` with the smallest primes in `[low, high]`, ascending.
///
/// Returns how many were written. When the range holds fewer primes than
/// `out.len()`, the tail of `out` is left untouched.
pub fn find_primes_in_range(low: u32, high: u32, out: &mut [u32]) -> usize {
    let mut count = 0;
    if out.is_empty() || low > high {
        return 0;
    }
    for candidate in low..=high {
        if is_prime(candidate) {
            out[count] = candidate;
            count += 1;
            if count == out.len() {
                break;
            }
        }
    }
    count
}

/// Number of primes in `[low, high]`, stopping once `limit` are found.
pub fn count_primes_in_range(low: u32, high: u32, limit: usize) -> usize {
    if low > high {
        return 0;
    }
    (low..=high).filter(|&n| is_prime(n)).take(limit).count()
}

/// Convert a millisecond time to whole samples, truncating.
#[inline]
pub fn ms_to_samples(ms: f32, sample_rate: f32) -> u32 {
    (ms * sample_rate / 1000.0).max(0.0) as u32
}
