use rand::{Rng, RngCore};

const LOCAL_PART_LENGTH: usize = 10;
const API_KEY_BYTES: usize = 16;

fn random_string(length: usize) -> String {
    // A character set that omits visually similar characters (e.g., 'i', 'l', 'o', '0', '1')
    // to improve readability and reduce user error.
    const CHARSET: &str = "abcdefghjkmnpqrstuvwxyz23456789";
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET.as_bytes()[idx] as char
        })
        .collect()
}

/// Generates a random lowercase address on `domain`.
pub fn generate_email_address(domain: &str) -> String {
    format!("{}@{}", random_string(LOCAL_PART_LENGTH), domain.to_lowercase())
}

/// Generates a mailbox API key: 16 random bytes, hex encoded.
pub fn generate_api_key() -> String {
    let mut bytes = [0u8; API_KEY_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
