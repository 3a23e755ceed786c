const FNV_OFFSET_BASIS_64: u64 = 0xCBF2_9CE4_8422_2325;
const FNV_PRIME_64: u64 = 1_099_511_628_211;

/// 64-bit FNV hash over the eight little-endian octets of `value`.
///
/// Used to scramble Zipfian ranks into key ids and to spread key ids in `hashed` insert order.
/// The mapping is deterministic across runs and platforms.
pub fn fnv_hash64(value: u64) -> u64 {
    value
        .to_le_bytes()
        .iter()
        .fold(FNV_OFFSET_BASIS_64, |hash, octet| {
            (hash ^ u64::from(*octet)).wrapping_mul(FNV_PRIME_64)
        })
}
