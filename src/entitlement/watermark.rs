use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Zero-width space; invisible in typical rendering.
const MARKER: char = '\u{200B}';

const TOKEN_PREFIX: &str = "pm_";
const TOKEN_HEX_LEN: usize = 24;

/// Derive a fresh watermark token for a buyer. The digest mixes the buyer
/// identity with a random component so the token cannot be reconstructed
/// from the buyer id alone.
pub fn generate_token(buyer_id: Uuid) -> String {
    let nonce = Uuid::new_v4();

    let mut hasher = Sha256::new();
    hasher.update(buyer_id.as_bytes());
    hasher.update(nonce.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    format!("{}{}", TOKEN_PREFIX, &hash[..TOKEN_HEX_LEN])
}

/// Append the token to the content, wrapped in zero-width markers. The
/// token goes at the end exactly once and is never interleaved.
pub fn embed(content: &str, token: &str) -> String {
    format!("{}{}{}{}", content, MARKER, token, MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_has_opaque_fixed_shape() {
        let token = generate_token(Uuid::new_v4());
        assert!(token.starts_with(TOKEN_PREFIX));
        assert_eq!(token.len(), TOKEN_PREFIX.len() + TOKEN_HEX_LEN);
        assert!(token[TOKEN_PREFIX.len()..]
            .chars()
            .all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn token_not_derivable_from_buyer_alone() {
        // Same buyer, two issuances: the random component must differ
        let buyer = Uuid::new_v4();
        assert_ne!(generate_token(buyer), generate_token(buyer));
    }

    #[test]
    fn embed_appends_wrapped_token_once() {
        let marked = embed("SECRET", "pm_abc123");
        assert!(marked.starts_with("SECRET"));
        assert_eq!(marked, format!("SECRET\u{200B}pm_abc123\u{200B}"));
        assert_eq!(marked.matches("pm_abc123").count(), 1);
    }

    #[test]
    fn embed_keeps_content_bytes_intact() {
        let content = "line one\nline two";
        let marked = embed(content, "pm_t");
        assert_eq!(&marked[..content.len()], content);
    }
}
