//! Known-answer and oracle tests for AES-128 CTR
//!
//! 1. **Key expansion**: FIPS-197 Appendix A.1 schedule, all 176 bytes
//! 2. **Keystream**: published-style vector for a fixed key/nonce
//! 3. **Oracle agreement**: the portable kernel matches RustCrypto `aes` +
//!    `ctr` (64-bit big-endian counter) for arbitrary inputs

use aes::cipher::{KeyIvInit, StreamCipher};
use ctrflow_crypto::{
    BLOCK_SIZE, Key, Nonce, SCHEDULE_SIZE, apply_keystream, expand, fill_keystream,
};
use proptest::prelude::*;

type Aes128Ctr64 = ctr::Ctr64BE<aes::Aes128>;

const FIPS_197_SCHEDULE: &str = concat!(
    "000102030405060708090a0b0c0d0e0f",
    "d6aa74fdd2af72fadaa678f1d6ab76fe",
    "b692cf0b643dbdf1be9bc5006830b3fe",
    "b6ff744ed2c2c9bf6c590cbf0469bf41",
    "47f7f7bc95353e03f96c32bcfd058dfd",
    "3caaa3e8a99f9deb50f3af57adf622aa",
    "5e390f7df7a69296a7553dc10aa31f6b",
    "14f9701ae35fe28c440adf4d4ea9c026",
    "47438735a41c65b9e016baf4aebf7ad2",
    "549932d1f08557681093ed9cbe2c974e",
    "13111d7fe3944a17f307a78b4d2b30c5",
);

fn oracle_keystream(key: &[u8; 16], nonce: &[u8; 8], start: u64, len: usize) -> Vec<u8> {
    let mut iv = [0u8; 16];
    iv[..8].copy_from_slice(nonce);
    iv[8..].copy_from_slice(&start.to_be_bytes());

    let mut cipher = Aes128Ctr64::new(key.into(), (&iv).into());
    let mut out = vec![0u8; len];
    cipher.apply_keystream(&mut out);
    out
}

#[test]
fn key_schedule_matches_fips_197() {
    let key = Key::from_hex("000102030405060708090a0b0c0d0e0f").unwrap();
    let schedule = expand(&key);

    let expected = hex::decode(FIPS_197_SCHEDULE).unwrap();
    assert_eq!(expected.len(), SCHEDULE_SIZE);
    assert_eq!(&schedule.as_bytes()[..], &expected[..]);
}

#[test]
fn keystream_for_fixed_key_and_nonce() {
    let key = Key::from_hex("00112233445566778899aabbccddeeff").unwrap();
    let nonce = Nonce::from_hex("0000000000000001").unwrap();
    let schedule = expand(&key);

    let mut keystream = vec![0u8; 3 * BLOCK_SIZE];
    fill_keystream(&schedule, &nonce, 0, &mut keystream).unwrap();

    let expected = hex::decode(concat!(
        "b8c09bdba7378ff2499cf18537901d0b",
        "75312ceef13588a50550d782e78fd6ac",
        "3212910fed22673447f40fe6f936fd86",
    ))
    .unwrap();
    assert_eq!(keystream, expected);
}

#[test]
fn forty_zero_bytes_encrypt_to_truncated_keystream() {
    let key = Key::from_hex("00112233445566778899aabbccddeeff").unwrap();
    let nonce = Nonce::from_hex("0000000000000001").unwrap();
    let schedule = expand(&key);

    let mut data = [0u8; 40];
    apply_keystream(&schedule, &nonce, 0, &mut data);

    let expected = oracle_keystream(key.as_bytes(), nonce.as_bytes(), 0, 40);
    assert_eq!(&data[..], &expected[..]);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_fill_matches_oracle(
        key in any::<[u8; 16]>(),
        nonce in any::<[u8; 8]>(),
        start in 0u64..(1 << 40),
        blocks in 0usize..24,
    ) {
        let schedule = expand(&Key::from_bytes(key));
        let nonce_value = Nonce::from_bytes(nonce);

        let mut ours = vec![0u8; blocks * BLOCK_SIZE];
        fill_keystream(&schedule, &nonce_value, start, &mut ours).unwrap();

        prop_assert_eq!(ours, oracle_keystream(&key, &nonce, start, blocks * BLOCK_SIZE));
    }

    #[test]
    fn prop_apply_matches_oracle_for_ragged_lengths(
        key in any::<[u8; 16]>(),
        nonce in any::<[u8; 8]>(),
        plaintext in prop::collection::vec(any::<u8>(), 0..300),
    ) {
        let schedule = expand(&Key::from_bytes(key));

        let mut ours = plaintext.clone();
        apply_keystream(&schedule, &Nonce::from_bytes(nonce), 0, &mut ours);

        let keystream = oracle_keystream(&key, &nonce, 0, plaintext.len());
        let theirs: Vec<u8> = plaintext.iter().zip(&keystream).map(|(p, k)| p ^ k).collect();

        prop_assert_eq!(ours, theirs);
    }

    #[test]
    fn prop_schedule_round_zero_is_key(key in any::<[u8; 16]>()) {
        let schedule = expand(&Key::from_bytes(key));
        prop_assert_eq!(schedule.round_key(0), &key);
    }
}
