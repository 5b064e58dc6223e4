use bincode::{Decode, Encode};
use thiserror::Error;

use crate::Comment;

pub const COMMENT_FILE_MAGIC: [u8; 4] = *b"NPCM";
pub const COMMENT_FILE_VERSION: u32 = 1;
const COMMENT_HEADER_LEN: usize = COMMENT_FILE_MAGIC.len() + std::mem::size_of::<u32>();

#[derive(Clone, Debug, Default, PartialEq, Encode, Decode)]
pub struct CommentFileData {
    pub comments: Vec<Comment>,
}

#[derive(Debug, Error)]
pub enum CommentFileError {
    #[error("not a comment file")]
    BadMagic,
    #[error("unsupported comment file version {0}")]
    UnsupportedVersion(u32),
    #[error("corrupt comment file: {0}")]
    Decode(#[from] bincode::error::DecodeError),
    #[error("failed to encode comment file: {0}")]
    Encode(#[from] bincode::error::EncodeError),
}

pub fn encode_comment_file(data: &CommentFileData) -> Result<Vec<u8>, CommentFileError> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&COMMENT_FILE_MAGIC);
    payload.extend_from_slice(&COMMENT_FILE_VERSION.to_le_bytes());
    let body = bincode::encode_to_vec(data, bincode::config::standard())?;
    payload.extend_from_slice(&body);
    Ok(payload)
}

pub fn decode_comment_file(payload: &[u8]) -> Result<CommentFileData, CommentFileError> {
    if !(payload.len() >= COMMENT_HEADER_LEN && payload.starts_with(&COMMENT_FILE_MAGIC)) {
        return Err(CommentFileError::BadMagic);
    }
    let mut version = [0u8; 4];
    version.copy_from_slice(&payload[COMMENT_FILE_MAGIC.len()..COMMENT_HEADER_LEN]);
    let version = u32::from_le_bytes(version);
    let body = &payload[COMMENT_HEADER_LEN..];
    match version {
        1 => {
            let (data, _) = bincode::decode_from_slice(body, bincode::config::standard())?;
            Ok(data)
        }
        _ => Err(CommentFileError::UnsupportedVersion(version)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn encoded_file_starts_with_header() {
        let data = CommentFileData {
            comments: vec![Comment {
                id: "a".into(),
                x: 1.5,
                y: 99.0,
                text: "note".into(),
                color: Some("#3b82f6".into()),
                resolved: Some(true),
                created_at: 42,
            }],
        };
        let bytes = encode_comment_file(&data).unwrap();
        assert_eq!(&bytes[..4], b"NPCM");
        assert_eq!(&bytes[4..8], &1u32.to_le_bytes());
        assert_eq!(decode_comment_file(&bytes).unwrap(), data);
    }

    #[test]
    fn rejects_foreign_and_future_files() {
        assert!(matches!(
            decode_comment_file(b"YBSS\x01\x00\x00\x00"),
            Err(CommentFileError::BadMagic)
        ));
        assert!(matches!(
            decode_comment_file(b"NP"),
            Err(CommentFileError::BadMagic)
        ));
        let mut future = COMMENT_FILE_MAGIC.to_vec();
        future.extend_from_slice(&7u32.to_le_bytes());
        assert!(matches!(
            decode_comment_file(&future),
            Err(CommentFileError::UnsupportedVersion(7))
        ));
    }

    #[test]
    fn truncated_body_is_a_decode_error() {
        let mut bytes = COMMENT_FILE_MAGIC.to_vec();
        bytes.extend_from_slice(&COMMENT_FILE_VERSION.to_le_bytes());
        bytes.push(5);
        assert!(matches!(
            decode_comment_file(&bytes),
            Err(CommentFileError::Decode(_))
        ));
    }
}
