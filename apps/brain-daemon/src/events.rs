use command_pipeline::SpeechEvent;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tracing::debug;

/// One stdin line as a speech event: `~text` is a partial, `final: text`
/// or a plain line is a final. Blank lines are skipped.
pub fn parse_event(line: &str) -> Option<SpeechEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if let Some(partial) = line.strip_prefix('~') {
        let partial = partial.trim();
        return (!partial.is_empty()).then(|| SpeechEvent::Partial(partial.to_string()));
    }
    let text = line.strip_prefix("final:").map_or(line, str::trim);
    (!text.is_empty()).then(|| SpeechEvent::Final(text.to_string()))
}

/// Forward every event read from `input` until it ends or the receiver
/// goes away.
pub async fn forward_lines<R>(input: R, events: mpsc::Sender<SpeechEvent>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(input).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let Some(event) = parse_event(&line) else {
            continue;
        };
        debug!(?event, "speech event");
        if events.send(event).await.is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_prefixes_select_the_event_kind() {
        assert_eq!(
            parse_event("~pick up the"),
            Some(SpeechEvent::Partial("pick up the".into()))
        );
        assert_eq!(
            parse_event("final: pick up the cheese"),
            Some(SpeechEvent::Final("pick up the cheese".into()))
        );
        assert_eq!(
            parse_event("  go home "),
            Some(SpeechEvent::Final("go home".into()))
        );
        assert_eq!(parse_event("~   "), None);
        assert_eq!(parse_event(""), None);
    }

    #[tokio::test]
    async fn forwards_lines_in_order() {
        let input: &[u8] = b"~move left\n\nfinal: move left\n";
        let (tx, mut rx) = mpsc::channel(4);
        forward_lines(input, tx).await;
        assert_eq!(rx.recv().await, Some(SpeechEvent::Partial("move left".into())));
        assert_eq!(rx.recv().await, Some(SpeechEvent::Final("move left".into())));
        assert_eq!(rx.recv().await, None);
    }
}
