//! Publish/subscribe messaging: `pubsub/pub`, `pubsub/sub`, `pubsub/ls`,
//! `pubsub/peers`.
//!
//! Topics and payloads travel multibase-encoded (`u` prefix, unpadded
//! URL-safe base64). This module encodes topics on the way out and decodes
//! messages on the way in, so callers only see raw bytes and plain topics.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use futures::{StreamExt, TryStreamExt};
use protocol::PeerId;
use serde::Deserialize;
use transport::Attachment;

use crate::{null_as_default, Error, HttpApi, ResultStream};

/// Multibase prefix of unpadded URL-safe base64.
const MULTIBASE_BASE64URL: char = 'u';

/// One message received on a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubsubMessage {
    /// The peer that published the message.
    pub from: PeerId,
    /// The payload.
    pub data: Vec<u8>,
    /// Publisher-assigned sequence number.
    pub seqno: Vec<u8>,
    /// Topics the message was published to.
    pub topics: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMessage {
    from: PeerId,
    #[serde(default)]
    data: String,
    #[serde(default)]
    seqno: String,
    #[serde(rename = "topicIDs", default, deserialize_with = "null_as_default")]
    topic_ids: Vec<String>,
}

impl WireMessage {
    fn decode(self) -> Result<PubsubMessage, String> {
        let topics = self
            .topic_ids
            .iter()
            .map(String::as_str)
            .map(decode_topic)
            .collect::<Result<_, _>>()?;
        Ok(PubsubMessage {
            from: self.from,
            data: decode_multibase(&self.data)?,
            seqno: decode_multibase(&self.seqno)?,
            topics,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StringsOutput {
    #[serde(default, deserialize_with = "null_as_default")]
    strings: Vec<String>,
}

/// Publish/subscribe operations.
#[derive(Debug, Clone, Copy)]
pub struct PubsubApi<'a> {
    api: &'a HttpApi,
}

impl<'a> PubsubApi<'a> {
    pub(crate) fn new(api: &'a HttpApi) -> Self {
        Self { api }
    }

    /// Publishes the bytes of `data` to `topic`.
    pub async fn publish(&self, topic: &str, data: Attachment) -> Result<(), Error> {
        let request = self
            .api
            .request("pubsub/pub")
            .arg(encode_multibase(topic.as_bytes()))
            .attachment(data)
            .build();
        self.api.exec_discard(request).await
    }

    /// Subscribes to `topic`, streaming messages until the subscription is
    /// cancelled or the daemon closes it.
    pub async fn subscribe(&self, topic: &str) -> Result<ResultStream<PubsubMessage>, Error> {
        let request = self
            .api
            .request("pubsub/sub")
            .arg(encode_multibase(topic.as_bytes()))
            .build();
        let messages = self.api.stream::<WireMessage>(request).await?;
        Ok(messages
            .map_err(Error::from)
            .and_then(|message| async move {
                message
                    .decode()
                    .map_err(|detail| Error::unexpected("pubsub/sub", detail))
            })
            .boxed())
    }

    /// Lists the topics this node is subscribed to.
    pub async fn topics(&self) -> Result<Vec<String>, Error> {
        let output: StringsOutput = self.api.exec(self.api.request("pubsub/ls").build()).await?;
        output
            .strings
            .iter()
            .map(|topic| decode_topic(topic).map_err(|detail| Error::unexpected("pubsub/ls", detail)))
            .collect()
    }

    /// Lists the peers exchanging messages with this node, on `topic` only
    /// when given.
    pub async fn peers(&self, topic: Option<&str>) -> Result<Vec<PeerId>, Error> {
        let request = self
            .api
            .request("pubsub/peers")
            .args(topic.map(|topic| encode_multibase(topic.as_bytes())))
            .build();
        let output: StringsOutput = self.api.exec(request).await?;
        output
            .strings
            .into_iter()
            .map(|peer| {
                PeerId::new(peer).ok_or_else(|| Error::unexpected("pubsub/peers", "empty peer id"))
            })
            .collect()
    }
}

fn encode_multibase(raw: &[u8]) -> String {
    let mut encoded = String::from(MULTIBASE_BASE64URL);
    URL_SAFE_NO_PAD.encode_string(raw, &mut encoded);
    encoded
}

fn decode_multibase(text: &str) -> Result<Vec<u8>, String> {
    if text.is_empty() {
        return Ok(Vec::new());
    }
    let Some(payload) = text.strip_prefix(MULTIBASE_BASE64URL) else {
        return Err(format!("unsupported multibase encoding in '{text}'"));
    };
    URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|error| format!("invalid base64url payload: {error}"))
}

fn decode_topic(text: &str) -> Result<String, String> {
    String::from_utf8(decode_multibase(text)?).map_err(|error| format!("topic is not UTF-8: {error}"))
}
