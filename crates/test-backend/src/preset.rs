use ellen_chat_model::ErrorKind;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// One step of a preset reply body.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PresetChunk {
    /// Delivers raw bytes, which don't have to be valid UTF-8 on their own.
    #[serde(rename = "bytes")]
    Bytes(Vec<u8>),
    /// Fails the connection with the given message.
    #[serde(rename = "fail")]
    Fail(String),
    /// Reports the end of the body. Chunks after it are only delivered to
    /// callers that keep polling.
    #[serde(rename = "end")]
    End,
}

impl PresetChunk {
    /// Creates a chunk from text.
    #[inline]
    pub fn text<S: AsRef<str>>(text: S) -> Self {
        Self::Bytes(text.as_ref().as_bytes().to_vec())
    }

    /// Creates a chunk holding one complete event record for `token`.
    #[inline]
    pub fn token<S: AsRef<str>>(token: S) -> Self {
        let payload = json!({ "token": token.as_ref() });
        Self::text(format!("data: {payload}\n"))
    }
}

/// The preset reply of the chat backend to one request.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresetResponse {
    /// The conversation identifier to report in the response headers.
    pub conversation_id: Option<String>,
    /// The body, chunk by chunk.
    pub chunks: Vec<PresetChunk>,
    /// If set, the request is rejected before any body is produced.
    #[serde(skip)]
    pub rejection: Option<ErrorKind>,
}

impl PresetResponse {
    /// Creates a `PresetResponse` with the specified chunks.
    #[inline]
    pub fn with_chunks(chunks: impl Into<Vec<PresetChunk>>) -> Self {
        Self {
            conversation_id: None,
            chunks: chunks.into(),
            rejection: None,
        }
    }

    /// Creates a `PresetResponse` that streams each token in its own
    /// chunk.
    #[inline]
    pub fn with_tokens<S: AsRef<str>>(
        tokens: impl IntoIterator<Item = S>,
    ) -> Self {
        Self::with_chunks(
            tokens
                .into_iter()
                .map(PresetChunk::token)
                .collect::<Vec<_>>(),
        )
    }

    /// Creates a `PresetResponse` whose request fails with `kind`.
    #[inline]
    pub fn rejected(kind: ErrorKind) -> Self {
        Self {
            conversation_id: None,
            chunks: vec![],
            rejection: Some(kind),
        }
    }

    /// Sets the conversation identifier reported with the response.
    #[inline]
    pub fn with_conversation_id<S: Into<String>>(mut self, id: S) -> Self {
        self.conversation_id = Some(id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_deserialize() {
        let response = PresetResponse::with_chunks([
            PresetChunk::text("data: {\"token\":\"Hi\"}\n"),
            PresetChunk::Fail("connection reset".to_owned()),
            PresetChunk::End,
        ])
        .with_conversation_id("c-1");

        let serialized = serde_json::to_string(&response).unwrap();
        let deserialized: PresetResponse =
            serde_json::from_str(&serialized).unwrap();

        assert_eq!(response, deserialized);
    }

    #[test]
    fn test_token_chunk_is_valid_json() {
        let PresetChunk::Bytes(bytes) =
            PresetChunk::token("say \"hi\"\n\u{1}")
        else {
            unreachable!();
        };
        let line = String::from_utf8(bytes).unwrap();
        let payload = line
            .strip_prefix("data: ")
            .and_then(|line| line.strip_suffix('\n'))
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(payload).unwrap();
        assert_eq!(value["token"], "say \"hi\"\n\u{1}");
    }
}
