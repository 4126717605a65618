use anyhow::{Result, bail};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use sqlx::MySqlPool;
use tracing::error;

/// Recovered boot payload for one server, read back from the compute
/// database since the API of this era does not return it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserData {
    /// The user's part of a cloud-init MIME multipart.
    CloudInit(String),
    /// A verbatim payload; rendered with `user_data_format: RAW`.
    Raw(String),
}

const CFN_MARKER: &str = "filename=\"cfn-userdata\"";
const MIME_BOUNDARY: &str = "--==";

/// Decode a base64 `user_data` column value and classify it:
/// cloud-init multipart with an empty user part -> `None`;
/// multipart with a `cfn-userdata` payload -> `CloudInit`;
/// anything else non-empty -> `Raw`.
pub fn classify_user_data(encoded: &str) -> Result<Option<UserData>> {
    let encoded = encoded.trim();
    if encoded.is_empty() {
        return Ok(None);
    }

    let decoded_bytes = match BASE64.decode(encoded.as_bytes()) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("{:?}", e);
            bail!("Stored user_data is not valid base64")
        }
    };
    let decoded = String::from_utf8_lossy(&decoded_bytes).to_string();
    if decoded.is_empty() {
        return Ok(None);
    }

    if let Some((_, after_marker)) = decoded.split_once(CFN_MARKER) {
        let end = after_marker.find(MIME_BOUNDARY).unwrap_or(after_marker.len());
        let payload = after_marker[..end].trim();
        if payload.is_empty() {
            // base cloud-init plumbing only, nothing user-provided
            return Ok(None);
        }
        return Ok(Some(UserData::CloudInit(payload.to_string())));
    }

    Ok(Some(UserData::Raw(decoded)))
}

/// Look up one server's user_data in the compute database.
pub async fn fetch_user_data(pool: &MySqlPool, server_id: &str) -> Result<Option<UserData>> {
    let row: Option<(Option<String>,)> =
        match sqlx::query_as("SELECT user_data FROM instances WHERE uuid = ?")
            .bind(server_id)
            .fetch_optional(pool)
            .await
        {
            Ok(row) => row,
            Err(e) => {
                error!("{:?}", e);
                bail!("Failed querying user_data for server '{}'", server_id)
            }
        };

    match row {
        Some((Some(encoded),)) => classify_user_data(&encoded),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(raw: &str) -> String {
        BASE64.encode(raw.as_bytes())
    }

    #[test]
    fn empty_or_missing_payload_is_none() {
        assert_eq!(classify_user_data("").unwrap(), None);
        assert_eq!(classify_user_data(&encode("")).unwrap(), None);
    }

    #[test]
    fn multipart_without_a_user_part_is_none() {
        let multipart = format!(
            "Content-Type: multipart/mixed\n{}\n   \n--==BOUNDARY==--",
            CFN_MARKER
        );
        assert_eq!(classify_user_data(&encode(&multipart)).unwrap(), None);
    }

    #[test]
    fn multipart_user_part_is_extracted() {
        let multipart = format!(
            "Content-Type: multipart/mixed\n{}\n\n#!/bin/bash\necho hi\n\n--==BOUNDARY==--",
            CFN_MARKER
        );
        assert_eq!(
            classify_user_data(&encode(&multipart)).unwrap(),
            Some(UserData::CloudInit("#!/bin/bash\necho hi".to_string()))
        );
    }

    #[test]
    fn plain_payload_is_raw() {
        assert_eq!(
            classify_user_data(&encode("#cloud-config\npackages: [curl]\n")).unwrap(),
            Some(UserData::Raw("#cloud-config\npackages: [curl]\n".to_string()))
        );
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(classify_user_data("not-base64!!!").is_err());
    }
}
