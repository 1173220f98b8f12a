use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::{Map, Value};

use crate::error::CredentialError;

/// Decoded payload of a bearer credential.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Claims(Map<String, Value>);

impl Claims {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The `exp` claim in seconds since the epoch. `Ok(None)` when the claim is
    /// absent or null, an error when it is present but not a number.
    pub fn expiry(&self) -> Result<Option<i64>, CredentialError> {
        match self.0.get("exp") {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f.floor() as i64))
                .map(Some)
                .ok_or_else(|| CredentialError::Malformed(format!("exp out of range: {n}"))),
            Some(other) => Err(CredentialError::Malformed(format!(
                "exp is not a number: {other}"
            ))),
        }
    }

    /// Name to greet the user with: `email`, else `id`, else `sub`.
    pub fn display_name(&self) -> Option<&str> {
        ["email", "id", "sub"]
            .iter()
            .find_map(|key| self.0.get(*key).and_then(Value::as_str))
    }
}

/// Decodes the middle segment of `credential` into its claim set.
///
/// Both base64 alphabets are accepted, with or without padding. The segment must
/// decode to a JSON object.
pub fn decode_claims(credential: &str) -> Result<Claims, CredentialError> {
    let payload = credential
        .split('.')
        .nth(1)
        .filter(|segment| !segment.is_empty())
        .ok_or_else(|| CredentialError::Malformed("payload segment missing".to_string()))?;

    let bytes = decode_segment(payload)
        .map_err(|e| CredentialError::Malformed(format!("payload is not base64: {e}")))?;

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Ok(Claims(map)),
        Ok(other) => Err(CredentialError::Malformed(format!(
            "payload is not a JSON object: {other}"
        ))),
        Err(e) => Err(CredentialError::Malformed(format!(
            "payload is not JSON: {e}"
        ))),
    }
}

fn decode_segment(segment: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let normalized: String = segment
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            c => c,
        })
        .collect();
    URL_SAFE_NO_PAD.decode(normalized)
}

/// Builds an unsigned three-part credential around `claims`.
#[cfg(test)]
pub(crate) fn forge(claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.signature")
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use serde_json::json;

    #[test]
    fn decodes_claims_from_middle_segment() {
        let token = forge(&json!({"exp": 1_900_000_000, "email": "a@b.co"}));
        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims.expiry().unwrap(), Some(1_900_000_000));
        assert_eq!(claims.display_name(), Some("a@b.co"));
    }

    #[test]
    fn accepts_standard_alphabet() {
        let payload = STANDARD.encode(r#"{"id":"??>"}"#);
        assert!(payload.contains('/'));
        let claims = decode_claims(&format!("h.{payload}.s")).unwrap();
        assert_eq!(claims.display_name(), Some("??>"));
    }

    #[test]
    fn missing_or_empty_payload_is_malformed() {
        for token in ["", "onlyheader", "header..sig", "header."] {
            assert!(
                matches!(decode_claims(token), Err(CredentialError::Malformed(_))),
                "{token:?}"
            );
        }
    }

    #[test]
    fn garbage_payload_is_malformed() {
        assert!(matches!(
            decode_claims("h.!!!notbase64!!!.s"),
            Err(CredentialError::Malformed(_))
        ));
        let not_json = URL_SAFE_NO_PAD.encode("hello");
        assert!(matches!(
            decode_claims(&format!("h.{not_json}.s")),
            Err(CredentialError::Malformed(_))
        ));
        let not_object = URL_SAFE_NO_PAD.encode("[1,2]");
        assert!(matches!(
            decode_claims(&format!("h.{not_object}.s")),
            Err(CredentialError::Malformed(_))
        ));
    }

    #[test]
    fn non_numeric_expiry_is_rejected() {
        let claims = decode_claims(&forge(&json!({"exp": "tomorrow"}))).unwrap();
        assert!(claims.expiry().is_err());
        let claims = decode_claims(&forge(&json!({"exp": null}))).unwrap();
        assert_eq!(claims.expiry().unwrap(), None);
    }
}
