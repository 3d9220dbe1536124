//! Bloom-filter encoding of identifier fields for approximate matching
//! (spec §4.3).
//!
//! Each value is split into padded bigrams, then every bigram sets
//! `num_hash` bit positions derived from two independent keyed hashes:
//! `h1` from HMAC-SHA1, `h2` from HMAC-MD5, combined as the double-hashing
//! scheme `(h1 + i * h2) mod m` for `i in 0..num_hash`. The same secret key
//! must be used by both sides of a linkage for filters to be comparable.

use hmac::{Hmac, Mac};
use md5::Md5;
use sha1::Sha1;

use crate::bitset::Bitset;
use crate::config::Config;

type HmacSha1 = Hmac<Sha1>;
type HmacMd5 = Hmac<Md5>;

/// Splits `value` into 2-gram tokens, padded with a leading and trailing
/// space so the first and last characters participate in a bigram of their
/// own (spec §4.3). A missing value encodes as the single token `"0"`.
pub fn split_ngrams(value: Option<&str>, n: usize) -> Vec<String> {
    let value = match value {
        Some(v) if !v.is_empty() => v,
        _ => return vec!["0".to_string()],
    };
    let padded: Vec<char> = std::iter::once(' ').chain(value.chars()).chain(std::iter::once(' ')).collect();
    if padded.len() < n {
        return vec![padded.iter().collect()];
    }
    (0..=padded.len() - n).map(|i| padded[i..i + n].iter().collect()).collect()
}

fn double_hash(token: &str, secret_key: &str, bloom_size: usize) -> (u64, u64) {
    let mut h1 = HmacSha1::new_from_slice(secret_key.as_bytes()).expect("HMAC accepts any key length");
    h1.update(token.as_bytes());
    let digest1 = h1.finalize().into_bytes();

    let mut h2 = HmacMd5::new_from_slice(secret_key.as_bytes()).expect("HMAC accepts any key length");
    h2.update(token.as_bytes());
    let digest2 = h2.finalize().into_bytes();

    (bytes_to_modulus(&digest1, bloom_size), bytes_to_modulus(&digest2, bloom_size))
}

/// Reduces a hash digest to `0..modulus` by treating its leading bytes as a
/// big-endian unsigned integer, matching the source's `int(hexdigest, 16) %
/// size` (only the low bytes of a 160/128-bit digest ever matter for a
/// modulus in the low hundreds, so 8 bytes is ample precision).
fn bytes_to_modulus(digest: &[u8], modulus: usize) -> u64 {
    let mut acc: u128 = 0;
    for &b in digest {
        acc = (acc << 8 | b as u128) % modulus as u128;
    }
    acc as u64
}

/// Encodes a single field value into a Bloom filter using `cfg`'s
/// `bloom_size`, `num_hash`, and `secret_key`.
pub fn encode_bloom(value: Option<&str>, cfg: &Config) -> Bitset {
    let mut bits = Bitset::zeros(cfg.bloom_size);
    for token in split_ngrams(value, 2) {
        let (h1, h2) = double_hash(&token, &cfg.secret_key, cfg.bloom_size);
        for i in 0..cfg.num_hash as u64 {
            let pos = ((h1 + i * h2) % cfg.bloom_size as u64) as usize;
            bits.set(pos);
        }
    }
    bits
}

/// Derives the composite `address_1_num` field (`address_1` concatenated
/// with `street_number`) used in place of the two raw columns (spec §11).
pub fn derive_address_1_num(address_1: Option<&str>, street_number: Option<&str>) -> String {
    format!("{}{}", address_1.unwrap_or(""), street_number.unwrap_or(""))
}

/// Derives the composite `state_postcode` field (`state` concatenated with
/// `postcode`) used in place of the two raw columns (spec §11).
pub fn derive_state_postcode(state: Option<&str>, postcode: Option<&str>) -> String {
    format!("{}{}", state.unwrap_or(""), postcode.unwrap_or(""))
}

/// Encodes the six fixed identifier fields for one record into Bloom
/// filters (spec §4.3, §11).
pub fn encode_record_fields(
    given_name: Option<&str>,
    surname: Option<&str>,
    street_number: Option<&str>,
    address_1: Option<&str>,
    address_2: Option<&str>,
    suburb: Option<&str>,
    postcode: Option<&str>,
    state: Option<&str>,
    cfg: &Config,
) -> Vec<(String, Bitset)> {
    let address_1_num = derive_address_1_num(address_1, street_number);
    let state_postcode = derive_state_postcode(state, postcode);

    let fields: Vec<(&str, Option<&str>)> = vec![
        ("given_name", given_name),
        ("surname", surname),
        ("address_1_num", Some(address_1_num.as_str())),
        ("address_2", address_2),
        ("suburb", suburb),
        ("state_postcode", Some(state_postcode.as_str())),
    ];

    fields
        .into_iter()
        .map(|(name, value)| (name.to_string(), encode_bloom(value, cfg)))
        .collect()
}
