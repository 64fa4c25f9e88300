//! Apache-flavor MD5-crypt (`$apr1$` / `$1$` htpasswd hashes)

use md5::{Digest, Md5};

const ITOA64: &[u8; 64] = b"./0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

// Output byte order of the final digest in the crypt encoding.
const SWAPS: [usize; 16] = [12, 6, 0, 13, 7, 1, 14, 8, 2, 15, 9, 3, 5, 10, 4, 11];

/// Hash `password` with the MD5-crypt algorithm.
///
/// `magic` selects the flavor (`"$1$"` for libc crypt, `"$apr1$"` for Apache
/// htpasswd); the result is the full `<magic><salt>$<hash>` string as stored
/// in an htpasswd file.
pub fn md5_crypt(password: &str, salt: &str, magic: &str) -> String {
    let pw = password.as_bytes();

    let mut outer = Md5::new();
    outer.update(pw);
    outer.update(magic.as_bytes());
    outer.update(salt.as_bytes());

    let mut inner = Md5::new();
    inner.update(pw);
    inner.update(salt.as_bytes());
    inner.update(pw);
    let mixin = inner.finalize();

    for i in 0..pw.len() {
        outer.update([mixin[i % 16]]);
    }

    let mut i = pw.len();
    while i != 0 {
        if i & 1 == 0 {
            outer.update(&pw[0..1]);
        } else {
            outer.update([0u8]);
        }
        i >>= 1;
    }

    let mut digest = outer.finalize();

    // 1000 stretching rounds, alternating the inputs per the algorithm.
    for round in 0..1000 {
        let mut ctx = Md5::new();
        if round & 1 == 0 {
            ctx.update(&digest);
        } else {
            ctx.update(pw);
        }
        if round % 3 != 0 {
            ctx.update(salt.as_bytes());
        }
        if round % 7 != 0 {
            ctx.update(pw);
        }
        if round & 1 == 0 {
            ctx.update(pw);
        } else {
            ctx.update(&digest);
        }
        digest = ctx.finalize();
    }

    let mut encoded = Vec::with_capacity(22);
    let mut v: u32 = 0;
    let mut bits: u32 = 0;
    for &idx in &SWAPS {
        v |= u32::from(digest[idx]) << bits;
        bits += 8;
        while bits > 6 {
            encoded.push(ITOA64[(v & 0x3f) as usize]);
            v >>= 6;
            bits -= 6;
        }
    }
    encoded.push(ITOA64[(v & 0x3f) as usize]);

    // ITOA64 is ASCII, so the encoding is valid UTF-8.
    format!("{magic}{salt}${}", String::from_utf8_lossy(&encoded))
}
