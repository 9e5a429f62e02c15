#![no_main]
use libfuzzer_sys::fuzz_target;

use blake2b_keyed::{Params, KEYBYTES, OUTBYTES, SALTBYTES};

// The first bytes of the fuzz input pick the parameters and a chunk size, the
// rest is the message. Hashing the message in chunks must match hashing it in
// one call.
fuzz_target!(|data: &[u8]| {
    if data.len() < 3 {
        return;
    }
    let hash_length = 1 + data[0] as usize % OUTBYTES;
    let key_length = data[1] as usize % (KEYBYTES + 1);
    let chunk = 1 + data[2] as usize;
    let rest = &data[3..];
    let (key, rest) = rest.split_at(key_length.min(rest.len()));
    let (salt, message) = if rest.len() >= SALTBYTES && data[2] & 1 == 1 {
        let (salt, message) = rest.split_at(SALTBYTES);
        (Some(salt), message)
    } else {
        (None, rest)
    };

    let mut params = Params::new();
    params.hash_length(hash_length).key(key);
    if let Some(salt) = salt {
        params.salt(salt);
    }
    let expected = params.hash(message).unwrap();

    let mut state = params.to_state().unwrap();
    for piece in message.chunks(chunk) {
        state.update(piece);
    }
    assert_eq!(expected, state.finalize().unwrap());

    for &b in message {
        state.update_byte(b);
    }
    assert_eq!(expected, state.finalize().unwrap());
});
