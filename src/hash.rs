//! String hashing used as the primary key in the code and status tables.

/// Hash a string with the standard sdbm algorithm.
///
/// Every code table in this crate is keyed by this value rather than by the
/// string itself; the tables are pre-hashed once at startup so lookups are a
/// single integer comparison. The handful of static strings involved makes
/// the collision probability negligible, so lookups do not re-compare the
/// full string.
pub fn sdbm(s: &str) -> u64 {
    let mut hash: u64 = 0;
    for &c in s.as_bytes() {
        hash = (c as u64)
            .wrapping_add(hash << 6)
            .wrapping_add(hash << 16)
            .wrapping_sub(hash);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_hashes_to_zero() {
        assert_eq!(sdbm(""), 0);
    }

    #[test]
    fn known_values() {
        assert_eq!(sdbm("a"), 97);
        assert_eq!(sdbm("ab"), 6_364_161);
    }

    #[test]
    fn receiver_codes_are_distinct() {
        let codes = [
            "PWR00", "PWR01", "ZPW00", "ZPW01", "PW300", "PW301", "AMT00",
            "AMT01", "SLI10", "SLI23", "SLZ7F", "SLZ80", "LMD86", "MEMLOCK",
            "MEMUNLK",
        ];
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                assert_ne!(sdbm(a), sdbm(b), "{a} collides with {b}");
            }
        }
    }
}
