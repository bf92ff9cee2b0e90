use bytes::Bytes;
use futures::{ future, Stream, StreamExt };

use super::encode_image_frame;

/// Frames one chat reply.
///
/// The image frame, when present, is the first item. Every non-empty token
/// then becomes its own body chunk, in arrival order, as soon as the upstream
/// yields it. The stream ends when `tokens` ends, or right after the first
/// upstream error has been passed on.
pub fn encode_reply<S, E>(
    image_url: Option<&str>,
    tokens: S
) -> impl Stream<Item = Result<Bytes, E>> + Send
    where S: Stream<Item = Result<String, E>> + Send, E: Send
{
    let frame = image_url.map(|url| Ok(Bytes::from(encode_image_frame(url))));

    let text = tokens
        .filter(|item| future::ready(!matches!(item, Ok(token) if token.is_empty())))
        .scan(false, |failed, item| {
            if *failed {
                return future::ready(None);
            }
            *failed = item.is_err();
            future::ready(Some(item.map(Bytes::from)))
        });

    futures::stream::iter(frame).chain(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    async fn collect(image: Option<&str>, tokens: Vec<Result<&str, &'static str>>) -> Vec<Result<String, &'static str>> {
        let tokens = stream::iter(tokens.into_iter().map(|t| t.map(str::to_string)));
        encode_reply(image, tokens)
            .map(|item| item.map(|b| String::from_utf8(b.to_vec()).unwrap()))
            .collect()
            .await
    }

    #[tokio::test]
    async fn frame_comes_first() {
        let out = collect(Some("http://x/a.png"), vec![Ok("Hel"), Ok("lo")]).await;
        assert_eq!(out, vec![
            Ok("!IMAGE_URL!http://x/a.png!IMAGE_URL!\n\n".to_string()),
            Ok("Hel".to_string()),
            Ok("lo".to_string())
        ]);
    }

    #[tokio::test]
    async fn text_only_without_image() {
        let out = collect(None, vec![Ok("a"), Ok(""), Ok("b")]).await;
        assert_eq!(out, vec![Ok("a".to_string()), Ok("b".to_string())]);
    }

    #[tokio::test]
    async fn stops_after_upstream_error() {
        let out = collect(None, vec![Ok("a"), Err("boom"), Ok("never")]).await;
        assert_eq!(out, vec![Ok("a".to_string()), Err("boom")]);
    }

    #[tokio::test]
    async fn empty_completion_with_image_is_just_the_frame() {
        let out = collect(Some("http://x/a.png"), vec![]).await;
        assert_eq!(out.len(), 1);
    }
}
