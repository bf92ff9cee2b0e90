//! Encoder output fed back through the client decoder.

use bytes::Bytes;
use futures::{ stream, StreamExt };
use starguide::protocol::decoder::StreamDecoder;
use starguide::protocol::encoder::encode_reply;

async fn encode(image: Option<&str>, tokens: &[&str]) -> Vec<u8> {
    let tokens = stream::iter(tokens.iter().map(|t| Ok::<_, std::convert::Infallible>(t.to_string())));
    let chunks: Vec<Bytes> = encode_reply(image, tokens)
        .map(|item| item.unwrap())
        .collect().await;
    chunks.concat()
}

fn decode(chunks: &[&[u8]]) -> (Option<String>, String) {
    let mut decoder = StreamDecoder::new();
    let mut image = None;
    let mut text = String::new();
    let mut decoded: Vec<_> = chunks.iter().map(|c| decoder.push(c)).collect();
    decoded.push(decoder.finish());
    for chunk in decoded {
        if let Some(url) = chunk.image_url {
            assert!(image.is_none(), "image set twice");
            image = Some(url);
        }
        text.push_str(&chunk.text);
    }
    (image, text)
}

#[tokio::test]
async fn every_split_of_an_image_reply_decodes_the_same() {
    let body = encode(Some("https://cdn.example/x-wing.png"), &["Red ", "Five ", "standing by. ✈"]).await;

    let whole = decode(&[&body]);
    assert_eq!(whole.0.as_deref(), Some("https://cdn.example/x-wing.png"));
    assert_eq!(whole.1, "Red Five standing by. ✈");

    for first in 0..=body.len() {
        for second in first..=body.len() {
            let parts = [&body[..first], &body[first..second], &body[second..]];
            assert_eq!(decode(&parts), whole, "split at {} and {}", first, second);
        }
    }
}

#[tokio::test]
async fn text_only_reply_is_plain_concatenation() {
    let body = encode(None, &["It's a ", "", "trap!"]).await;
    assert_eq!(body, b"It's a trap!");

    let bytes: Vec<&[u8]> = body.chunks(1).collect();
    assert_eq!(decode(&bytes), (None, "It's a trap!".to_string()));
}

#[tokio::test]
async fn reply_mentioning_the_marker_later_is_untouched() {
    let body = encode(Some("http://x/a.png"), &["Then !IMAGE_URL!", "http://y/b.png!IMAGE_URL!\n\n ok"]).await;
    let (image, text) = decode(&[&body]);
    assert_eq!(image.as_deref(), Some("http://x/a.png"));
    assert_eq!(text, "Then !IMAGE_URL!http://y/b.png!IMAGE_URL!\n\n ok");
}
