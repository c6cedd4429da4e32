//! Partial-transcript debouncing.
//!
//! Speech recognition streams partial transcripts before the final one. A
//! partial that goes quiet for [`DebounceConfig::quiet_ms`] is executed early;
//! a partial containing "and"/"then" waits for the final, bounded by
//! [`DebounceConfig::connector_deadline_ms`]. When the final arrives, only the
//! part not already executed is dispatched.
//!
//! [`Debouncer`] is a plain state machine driven by explicit instants, so it
//! can be tested without timers; [`Debouncer::run`] drives it from channels.

use crate::{DebounceConfig, EmergencyDetector, Origin};
use actuator_link::HaltHandle;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, warn};

const CONNECTORS: [&str; 2] = [" and ", " then "];

/// Endings that promise more words.
const INCOMPLETE_ENDINGS: [&str; 8] = [
    " and", " then", " and then", " to", " the", " a", " move", " go",
];

const DIRECTION_WORDS: [&str; 12] = [
    "right", "left", "up", "down", "forward", "forwards", "backward", "backwards", "back",
    "upward", "upwards", "downward",
];

/// Max words for a direction-final partial to be held ("move left" may
/// still grow into "move left 5 cm").
const SHORT_DIRECTION_WORDS: usize = 4;

const REMAINDER_PREFIXES: [&str; 5] = ["and then ", "and to the ", "and ", "then ", "to the "];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    Partial(String),
    Final(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchAction {
    Execute { text: String, origin: Origin },
    EmergencyStop { text: String, origin: Origin },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Timer {
    text: String,
    deadline: Instant,
}

pub struct Debouncer {
    config: DebounceConfig,
    detector: EmergencyDetector,
    halt: Option<HaltHandle>,
    last_partial: String,
    /// Text already dispatched from a partial of the current utterance.
    executed: String,
    quiet: Option<Timer>,
    connector: Option<Timer>,
}

fn has_connector(lower: &str) -> bool {
    CONNECTORS.iter().any(|c| lower.contains(c))
}

fn ends_incomplete(lower: &str) -> bool {
    INCOMPLETE_ENDINGS.iter().any(|e| lower.ends_with(e))
}

fn ends_with_short_direction(lower: &str) -> bool {
    let words: Vec<&str> = lower.split_whitespace().collect();
    words.len() <= SHORT_DIRECTION_WORDS
        && words
            .last()
            .map_or(false, |w| DIRECTION_WORDS.contains(w))
}

fn clean(text: &str) -> String {
    text.trim()
        .trim_end_matches(['.', '!', '?', ','])
        .trim()
        .to_lowercase()
}

fn strip_remainder_prefixes(mut rest: &str) -> &str {
    loop {
        rest = rest.trim_start_matches([',', ';', ':', '.', '-', ' ']);
        let stripped = REMAINDER_PREFIXES
            .iter()
            .find_map(|p| rest.strip_prefix(p))
            .map(str::trim_start);
        match stripped {
            Some(next) => rest = next,
            None => return rest,
        }
    }
}

impl Debouncer {
    pub fn new(config: DebounceConfig) -> Self {
        Self {
            config,
            detector: EmergencyDetector::default(),
            halt: None,
            last_partial: String::new(),
            executed: String::new(),
            quiet: None,
            connector: None,
        }
    }

    /// Trigger `halt` directly on an emergency keyword, ahead of the
    /// action consumer.
    pub fn with_halt(mut self, halt: HaltHandle) -> Self {
        self.halt = Some(halt);
        self
    }

    pub fn with_detector(mut self, detector: EmergencyDetector) -> Self {
        self.detector = detector;
        self
    }

    /// Earliest pending timer.
    pub fn next_deadline(&self) -> Option<Instant> {
        [&self.quiet, &self.connector]
            .into_iter()
            .flatten()
            .map(|t| t.deadline)
            .min()
    }

    pub fn is_idle(&self) -> bool {
        self.quiet.is_none() && self.connector.is_none()
    }

    fn reset(&mut self) {
        self.quiet = None;
        self.connector = None;
        self.last_partial.clear();
        self.executed.clear();
    }

    fn emergency(&mut self, text: &str, origin: Origin) -> Option<DispatchAction> {
        let keyword = self.detector.detect(text)?.to_string();
        self.reset();
        warn!(%text, %keyword, "emergency keyword heard");
        if let Some(halt) = self.halt.as_ref().filter(|h| !h.is_halted()) {
            if let Err(e) = halt.trigger() {
                error!(error = %e, "failed to write halt frame");
            }
        }
        Some(DispatchAction::EmergencyStop {
            text: text.to_string(),
            origin,
        })
    }

    pub fn on_partial(&mut self, text: &str, now: Instant) -> Vec<DispatchAction> {
        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }
        if let Some(action) = self.emergency(text, Origin::Partial) {
            return vec![action];
        }

        self.quiet = None;
        let lower = text.to_lowercase();
        if has_connector(&lower) {
            // The deadline runs from the first connector partial; later
            // partials only refresh the text.
            let deadline = self
                .connector
                .as_ref()
                .map_or(now + self.config.connector_deadline(), |t| t.deadline);
            self.connector = Some(Timer {
                text: text.to_string(),
                deadline,
            });
            self.last_partial = text.to_string();
            return Vec::new();
        }
        if ends_incomplete(&lower) || ends_with_short_direction(&lower) {
            debug!(%text, "partial looks unfinished, holding");
            self.last_partial = text.to_string();
            return Vec::new();
        }

        if text != self.last_partial
            && text.chars().count() >= self.config.min_len
            && text != self.executed
        {
            self.quiet = Some(Timer {
                text: text.to_string(),
                deadline: now + self.config.quiet(),
            });
        }
        self.last_partial = text.to_string();
        Vec::new()
    }

    /// Fire every timer due at `now`.
    pub fn on_deadline(&mut self, now: Instant) -> Vec<DispatchAction> {
        let mut actions = Vec::new();
        if self.quiet.as_ref().map_or(false, |t| t.deadline <= now) {
            if let Some(timer) = self.quiet.take() {
                actions.extend(self.fire_quiet(timer.text));
            }
        }
        if self.connector.as_ref().map_or(false, |t| t.deadline <= now) {
            if let Some(timer) = self.connector.take() {
                actions.extend(self.fire_connector(timer.text));
            }
        }
        actions
    }

    fn fire_quiet(&mut self, text: String) -> Option<DispatchAction> {
        let lower = text.to_lowercase();
        if has_connector(&self.last_partial.to_lowercase()) || has_connector(&lower) {
            return None;
        }
        let executed = self.executed.to_lowercase();
        // A growing partial is left for the final to reconcile.
        if !executed.is_empty() && (executed.contains(&lower) || lower.starts_with(&executed)) {
            debug!(%text, "already executed from an earlier partial");
            return None;
        }
        debug!(%text, "partial went quiet, executing");
        self.executed = text.clone();
        Some(DispatchAction::Execute {
            text,
            origin: Origin::Partial,
        })
    }

    fn fire_connector(&mut self, text: String) -> Option<DispatchAction> {
        if !self.executed.is_empty() || text.chars().count() < 3 {
            return None;
        }
        warn!(%text, "final transcript late, executing connector partial");
        self.executed = text.clone();
        Some(DispatchAction::Execute {
            text,
            origin: Origin::Connector,
        })
    }

    /// Reconcile the final transcript with what partials already ran.
    pub fn on_final(&mut self, text: &str) -> Vec<DispatchAction> {
        self.quiet = None;
        self.connector = None;
        let executed = std::mem::take(&mut self.executed);
        self.last_partial.clear();

        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }
        if let Some(action) = self.emergency(text, Origin::Final) {
            return vec![action];
        }

        if !executed.is_empty() {
            let done = clean(&executed);
            let full = clean(text);
            if let Some(rest) = full.strip_prefix(done.as_str()) {
                let rest = strip_remainder_prefixes(rest.trim());
                if rest.chars().count() < 2 {
                    debug!(%text, "final matches the executed partial");
                    return Vec::new();
                }
                return vec![DispatchAction::Execute {
                    text: rest.to_string(),
                    origin: Origin::Remainder,
                }];
            }
        }
        vec![DispatchAction::Execute {
            text: text.to_string(),
            origin: Origin::Final,
        }]
    }

    /// Fire whatever is still pending, as if every deadline had passed.
    pub fn flush(&mut self) -> Vec<DispatchAction> {
        let far = [&self.quiet, &self.connector]
            .into_iter()
            .flatten()
            .map(|t| t.deadline)
            .max();
        match far {
            Some(deadline) => self.on_deadline(deadline),
            None => Vec::new(),
        }
    }

    /// Drive the state machine until `events` closes, then flush.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<SpeechEvent>,
        actions: mpsc::Sender<DispatchAction>,
    ) {
        loop {
            let deadline = self.next_deadline();
            let batch = tokio::select! {
                event = events.recv() => match event {
                    Some(SpeechEvent::Partial(text)) => self.on_partial(&text, Instant::now()),
                    Some(SpeechEvent::Final(text)) => self.on_final(&text),
                    None => break,
                },
                _ = sleep_until(deadline) => self.on_deadline(Instant::now()),
            };
            for action in batch {
                if actions.send(action).await.is_err() {
                    return;
                }
            }
        }
        for action in self.flush() {
            if actions.send(action).await.is_err() {
                return;
            }
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actuator_link::MockLink;
    use std::time::Duration;

    fn execute(text: &str, origin: Origin) -> DispatchAction {
        DispatchAction::Execute {
            text: text.to_string(),
            origin,
        }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn quiet_partial_fires_once() {
        let mut d = Debouncer::new(DebounceConfig::default());
        let t0 = Instant::now();
        assert!(d.on_partial("pick up the cheese", t0).is_empty());
        assert!(d.on_deadline(t0 + ms(499)).is_empty());
        assert_eq!(
            d.on_deadline(t0 + ms(500)),
            vec![execute("pick up the cheese", Origin::Partial)]
        );
        // Repeating the same partial does not re-arm.
        assert!(d.on_partial("pick up the cheese", t0 + ms(600)).is_empty());
        assert!(d.is_idle());
        // The matching final dispatches nothing more.
        assert!(d.on_final("Pick up the cheese.").is_empty());
    }

    #[test]
    fn newer_partial_cancels_the_quiet_timer() {
        let mut d = Debouncer::new(DebounceConfig::default());
        let t0 = Instant::now();
        d.on_partial("pick up the cheese", t0);
        d.on_partial("pick up the cheese and", t0 + ms(300));
        assert!(d.is_idle());
        assert!(d.on_deadline(t0 + ms(900)).is_empty());
        assert_eq!(
            d.on_final("pick up the cheese and go home"),
            vec![execute("pick up the cheese and go home", Origin::Final)]
        );
    }

    #[test]
    fn unfinished_partials_are_held() {
        let mut d = Debouncer::new(DebounceConfig::default());
        let t0 = Instant::now();
        d.on_partial("move", t0);
        d.on_partial("move to the", t0);
        d.on_partial("move left", t0);
        assert!(d.is_idle());
        // Short text never arms the timer.
        d.on_partial("hi", t0);
        assert!(d.is_idle());
        d.on_partial("move left a lot more please", t0);
        assert!(!d.is_idle());
    }

    #[test]
    fn final_runs_only_the_remainder() {
        let mut d = Debouncer::new(DebounceConfig::default());
        let t0 = Instant::now();
        d.on_partial("pick up the cheese", t0);
        d.on_deadline(t0 + ms(500));
        assert_eq!(
            d.on_final("Pick up the cheese and then go home."),
            vec![execute("go home", Origin::Remainder)]
        );
        d.on_partial("pick up the cheese", t0);
        d.on_deadline(t0 + ms(500));
        assert_eq!(
            d.on_final("Pick up the cheese, then go home."),
            vec![execute("go home", Origin::Remainder)]
        );
        // State is reset for the next utterance.
        assert_eq!(
            d.on_final("go home"),
            vec![execute("go home", Origin::Final)]
        );
    }

    #[test]
    fn connector_partial_waits_for_the_deadline() {
        let mut d = Debouncer::new(DebounceConfig::default());
        let t0 = Instant::now();
        d.on_partial("move left and then", t0);
        d.on_partial("move left and then up", t0 + ms(800));
        assert_eq!(d.next_deadline(), Some(t0 + ms(2000)));
        assert!(d.on_deadline(t0 + ms(1999)).is_empty());
        assert_eq!(
            d.on_deadline(t0 + ms(2000)),
            vec![execute("move left and then up", Origin::Connector)]
        );
        assert!(d.on_final("move left and then up").is_empty());
    }

    #[test]
    fn emergency_preempts_everything() {
        let link = MockLink::new();
        let frames = link.frames();
        let halt = actuator_link::ActuatorLink::halt_handle(&link);
        let mut d = Debouncer::new(DebounceConfig::default()).with_halt(halt.clone());
        let t0 = Instant::now();
        d.on_partial("pick up the cheese", t0);
        assert_eq!(
            d.on_partial("pick up the cheese no stop", t0 + ms(100)),
            vec![DispatchAction::EmergencyStop {
                text: "pick up the cheese no stop".into(),
                origin: Origin::Partial
            }]
        );
        assert!(d.is_idle());
        assert!(halt.is_halted());
        assert!(frames.lock().last().map_or(false, |f| f.emergency_halt));
    }

    #[tokio::test(start_paused = true)]
    async fn run_loop_debounces_in_real_time() {
        let (event_tx, event_rx) = mpsc::channel(8);
        let (action_tx, mut action_rx) = mpsc::channel(8);
        let task = tokio::spawn(Debouncer::new(DebounceConfig::default()).run(event_rx, action_tx));

        event_tx
            .send(SpeechEvent::Partial("pick up the cheese".into()))
            .await
            .unwrap();
        tokio::time::sleep(ms(400)).await;
        assert!(action_rx.try_recv().is_err());
        tokio::time::sleep(ms(200)).await;
        assert_eq!(
            action_rx.recv().await,
            Some(execute("pick up the cheese", Origin::Partial))
        );

        event_tx
            .send(SpeechEvent::Final("pick up the cheese and go home".into()))
            .await
            .unwrap();
        assert_eq!(
            action_rx.recv().await,
            Some(execute("go home", Origin::Remainder))
        );

        event_tx
            .send(SpeechEvent::Partial("serve it and go home".into()))
            .await
            .unwrap();
        drop(event_tx);
        // Closing the stream flushes the pending connector partial.
        assert_eq!(
            action_rx.recv().await,
            Some(execute("serve it and go home", Origin::Connector))
        );
        assert_eq!(action_rx.recv().await, None);
        task.await.unwrap();
    }
}
