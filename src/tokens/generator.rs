use rand::Rng;

/// Generate a random token identifier (16 bytes, hex encoded = 32 characters)
pub fn generate_token_id() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 16] = rng.gen();
    hex::encode(bytes)
}

/// Generate 16 random bytes for a password salt
pub fn generate_salt() -> [u8; 16] {
    rand::thread_rng().gen()
}
