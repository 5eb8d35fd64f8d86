//! Password generation for the encryption side.
//!
//! Passwords are meant to travel in the fragment of a share link and to be
//! pasted into chats, so the alphabet is wide but printable, sampling is
//! rejection-based to stay uniform, and the final character is never one of
//! the bytes chat clients swallow as sentence punctuation.

/// The 73-symbol password alphabet.
pub const PASSWORD_ALPHABET: &[u8; 73] =
    b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ$-_.+!*'(),";

/// Default password length; ~6.2 bits of entropy per character.
pub const DEFAULT_PASSWORD_LENGTH: usize = 14;

// Largest multiple of the alphabet size below 256. Sampled bytes at or above
// this are discarded, otherwise the low residues would be more likely.
const REJECTION_LIMIT: u8 =
    ((u8::MAX as usize / PASSWORD_ALPHABET.len()) * PASSWORD_ALPHABET.len()) as u8;

// Characters a chat client or URL parser may strip off the end of a pasted
// link, silently truncating the password.
const FORBIDDEN_TAIL: &[u8] = b",.)";

/// Generate a uniformly random password of the given length.
///
/// Resamples the whole password if the final character is one a paste
/// context would misread as closing punctuation.
pub fn generate_password(length: usize) -> String {
    if length == 0 {
        return String::new();
    }
    loop {
        let candidate = sample_password(length);
        let last = candidate.as_bytes()[length - 1];
        if !FORBIDDEN_TAIL.contains(&last) {
            return candidate;
        }
    }
}

fn sample_password(length: usize) -> String {
    let mut output = String::with_capacity(length);
    let mut buf = [0u8; 64];
    while output.len() < length {
        getrandom::getrandom(&mut buf).expect("getrandom failed");
        for &byte in buf.iter() {
            if byte >= REJECTION_LIMIT {
                continue;
            }
            output.push(PASSWORD_ALPHABET[(byte % PASSWORD_ALPHABET.len() as u8) as usize] as char);
            if output.len() == length {
                break;
            }
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_requested_length() {
        for length in [1, 8, 14, 64] {
            assert_eq!(generate_password(length).len(), length);
        }
    }

    #[test]
    fn zero_length_is_empty() {
        assert_eq!(generate_password(0), "");
    }

    #[test]
    fn uses_only_the_alphabet() {
        let password = generate_password(256);
        for byte in password.bytes() {
            assert!(
                PASSWORD_ALPHABET.contains(&byte),
                "unexpected character {:?}",
                byte as char
            );
        }
    }

    #[test]
    fn never_ends_in_sentence_punctuation() {
        // The forbidden tail bytes make up ~4% of the alphabet, so 500
        // samples would be overwhelmingly likely to catch a violation.
        for _ in 0..500 {
            let password = generate_password(4);
            let last = *password.as_bytes().last().unwrap();
            assert!(!FORBIDDEN_TAIL.contains(&last), "password ended in {:?}", last as char);
        }
    }

    #[test]
    fn passwords_are_random() {
        assert_ne!(generate_password(14), generate_password(14));
    }

    #[test]
    fn rejection_limit_is_a_multiple_of_the_alphabet() {
        assert_eq!(REJECTION_LIMIT as usize % PASSWORD_ALPHABET.len(), 0);
        assert_eq!(REJECTION_LIMIT, 219);
    }
}
