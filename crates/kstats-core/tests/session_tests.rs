//! Session-level tests: a scripted connector and a recording store
//! drive the real connection manager and dispatch loop.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::timeout;

use kstats_core::manager::{ConnectionManager, ReconnectPolicy};
use kstats_core::pseudonym;
use kstats_core::session::{ConnectError, Connector, RosterProvider, Session};
use kstats_types::events::{ChatAction, ChatEvent};
use kstats_types::models::{Channel, ConsentEntry, Digest, MessageRecord, ReferenceRecord};
use kstats_types::store::{Store, StoreError};

const SALT: &str = "session-test-salt";

#[derive(Default)]
struct RecordingStore {
    channels: Mutex<Vec<Channel>>,
    consent: Mutex<HashMap<String, String>>,
    messages: Mutex<Vec<MessageRecord>>,
    references: Mutex<Vec<ReferenceRecord>>,
}

impl RecordingStore {
    fn set_channels(&self, channels: Vec<Channel>) {
        *self.channels.lock().unwrap() = channels;
    }
}

impl Store for RecordingStore {
    fn list_channels(&self) -> Result<Vec<Channel>, StoreError> {
        Ok(self.channels.lock().unwrap().clone())
    }
    fn insert_consent(&self, entry: &ConsentEntry) -> Result<(), StoreError> {
        self.consent
            .lock()
            .unwrap()
            .insert(entry.digest.as_str().to_string(), entry.nick.clone());
        Ok(())
    }
    fn delete_consent(&self, digest: &Digest) -> Result<(), StoreError> {
        self.consent.lock().unwrap().remove(digest.as_str());
        Ok(())
    }
    fn insert_message(&self, record: &MessageRecord) -> Result<(), StoreError> {
        self.messages.lock().unwrap().push(record.clone());
        Ok(())
    }
    fn insert_reference(&self, record: &ReferenceRecord) -> Result<(), StoreError> {
        self.references.lock().unwrap().push(record.clone());
        Ok(())
    }
}

struct FixedRoster(HashMap<String, Vec<String>>);

impl RosterProvider for FixedRoster {
    fn roster(&self, channel: &str) -> Option<Vec<String>> {
        self.0.get(channel).cloned()
    }
}

enum ConnectOutcome {
    Fail,
    Establish(Session),
}

/// Pops one scripted outcome per connect attempt and records when each
/// attempt happened.
struct ScriptedConnector {
    script: VecDeque<ConnectOutcome>,
    attempts: Arc<Mutex<Vec<Instant>>>,
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&mut self) -> Result<Session, ConnectError> {
        self.attempts.lock().unwrap().push(Instant::now());
        match self.script.pop_front() {
            Some(ConnectOutcome::Establish(session)) => Ok(session),
            Some(ConnectOutcome::Fail) => Err(ConnectError(anyhow!("connection refused"))),
            None => Err(ConnectError(anyhow!("script exhausted"))),
        }
    }
}

fn make_session(
    nick: &str,
    rosters: HashMap<String, Vec<String>>,
) -> (Session, mpsc::Sender<ChatEvent>, mpsc::Receiver<ChatAction>) {
    let (event_tx, events) = mpsc::channel(64);
    let (actions, action_rx) = mpsc::channel(64);
    let session = Session {
        nick: nick.to_string(),
        events,
        actions,
        roster: Arc::new(FixedRoster(rosters)),
    };
    (session, event_tx, action_rx)
}

fn single_session_connector(session: Session) -> ScriptedConnector {
    ScriptedConnector {
        script: VecDeque::from([ConnectOutcome::Establish(session)]),
        attempts: Arc::new(Mutex::new(Vec::new())),
    }
}

async fn wait_until(mut predicate: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(20);
    while !predicate() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

async fn next_action(rx: &mut mpsc::Receiver<ChatAction>) -> ChatAction {
    timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("timed out waiting for an action")
        .expect("action channel closed")
}

#[tokio::test]
async fn channel_messages_produce_message_and_reference_records() {
    let store = Arc::new(RecordingStore::default());
    store.set_channels(vec![Channel {
        id: 7,
        name: "#stats".to_string(),
        salt: SALT.to_string(),
    }]);

    let rosters = HashMap::from([(
        "#stats".to_string(),
        vec!["alice".to_string(), "bob".to_string(), "carol".to_string()],
    )]);
    let (session, event_tx, mut action_rx) = make_session("statsbot", rosters);
    let manager = ConnectionManager::new(single_session_connector(session), store.clone());
    let run = tokio::spawn(manager.run());

    event_tx.send(ChatEvent::SessionEstablished).await.unwrap();
    let action = next_action(&mut action_rx).await;
    assert!(matches!(action, ChatAction::Join { ref channel } if channel == "#stats"));

    event_tx
        .send(ChatEvent::MessageReceived {
            target: "#stats".to_string(),
            source: "carol".to_string(),
            text: "hey alice and bob".to_string(),
        })
        .await
        .unwrap();

    wait_until(|| {
        store.messages.lock().unwrap().len() == 1 && store.references.lock().unwrap().len() == 2
    })
    .await;

    let carol = pseudonym::digest(SALT, "carol").unwrap();
    let alice = pseudonym::digest(SALT, "alice").unwrap();
    let bob = pseudonym::digest(SALT, "bob").unwrap();

    {
        let messages = store.messages.lock().unwrap();
        assert_eq!(messages[0].channel, 7);
        assert_eq!(messages[0].sender, carol);
        assert_eq!(messages[0].features.words, 4);
        assert!(!messages[0].features.question);

        let references = store.references.lock().unwrap();
        let targets: Vec<_> = references.iter().map(|r| r.target.clone()).collect();
        assert!(targets.contains(&alice));
        assert!(targets.contains(&bob));
        for reference in references.iter() {
            assert_eq!(reference.source, carol);
            assert_eq!(reference.channel, 7);
        }
    }

    event_tx
        .send(ChatEvent::SessionClosed { error: None })
        .await
        .unwrap();
    timeout(Duration::from_secs(10), run)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn direct_messages_drive_the_consent_subsystem() {
    let store = Arc::new(RecordingStore::default());
    store.set_channels(vec![Channel {
        id: 1,
        name: "#stats".to_string(),
        salt: SALT.to_string(),
    }]);

    let (session, event_tx, mut action_rx) = make_session("statsbot", HashMap::new());
    let manager = ConnectionManager::new(single_session_connector(session), store.clone());
    let run = tokio::spawn(manager.run());

    event_tx.send(ChatEvent::SessionEstablished).await.unwrap();
    let _join = next_action(&mut action_rx).await;

    let dm = |text: &str| ChatEvent::MessageReceived {
        target: "statsbot".to_string(),
        source: "carol".to_string(),
        text: text.to_string(),
    };

    event_tx.send(dm("OPT-IN #stats")).await.unwrap();
    match next_action(&mut action_rx).await {
        ChatAction::Reply { target, text } => {
            assert_eq!(target, "carol");
            assert_eq!(text, "Opt-In successful");
        }
        other => panic!("expected a reply, got {other:?}"),
    }
    let carol = pseudonym::digest(SALT, "carol").unwrap();
    assert!(store.consent.lock().unwrap().contains_key(carol.as_str()));

    // command matching is case-insensitive
    event_tx.send(dm("opt-out #stats")).await.unwrap();
    match next_action(&mut action_rx).await {
        ChatAction::Reply { text, .. } => assert_eq!(text, "Opt-Out successful"),
        other => panic!("expected a reply, got {other:?}"),
    }
    assert!(store.consent.lock().unwrap().is_empty());

    event_tx.send(dm("OPT-IN #nowhere")).await.unwrap();
    match next_action(&mut action_rx).await {
        ChatAction::Reply { text, .. } => assert_eq!(text, "Channel not found"),
        other => panic!("expected a reply, got {other:?}"),
    }
    assert!(store.consent.lock().unwrap().is_empty());
    assert!(store.messages.lock().unwrap().is_empty());
    assert!(store.references.lock().unwrap().is_empty());

    event_tx
        .send(ChatEvent::SessionClosed { error: None })
        .await
        .unwrap();
    timeout(Duration::from_secs(10), run)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn connect_failures_retry_on_the_fixed_delay() {
    let store = Arc::new(RecordingStore::default());
    let (session, event_tx, _action_rx) = make_session("statsbot", HashMap::new());
    // queue the graceful close before run() starts
    event_tx
        .send(ChatEvent::SessionClosed { error: None })
        .await
        .unwrap();

    let attempts = Arc::new(Mutex::new(Vec::new()));
    let connector = ScriptedConnector {
        script: VecDeque::from([
            ConnectOutcome::Fail,
            ConnectOutcome::Fail,
            ConnectOutcome::Fail,
            ConnectOutcome::Establish(session),
        ]),
        attempts: attempts.clone(),
    };

    let delay = Duration::from_millis(50);
    let manager =
        ConnectionManager::new(connector, store).with_policy(ReconnectPolicy { delay });

    let started = Instant::now();
    timeout(Duration::from_secs(10), manager.run())
        .await
        .expect("manager did not return")
        .expect("run() surfaced a failure");

    let attempts = attempts.lock().unwrap();
    assert_eq!(attempts.len(), 4);
    assert!(started.elapsed() >= delay * 3);
    for pair in attempts.windows(2) {
        assert!(pair[1].duration_since(pair[0]) >= delay);
    }
}

#[tokio::test]
async fn a_second_session_established_replaces_the_directory() {
    let store = Arc::new(RecordingStore::default());
    store.set_channels(vec![Channel {
        id: 1,
        name: "#old".to_string(),
        salt: SALT.to_string(),
    }]);

    let (session, event_tx, mut action_rx) = make_session("statsbot", HashMap::new());
    let manager = ConnectionManager::new(single_session_connector(session), store.clone());
    let run = tokio::spawn(manager.run());

    event_tx.send(ChatEvent::SessionEstablished).await.unwrap();
    match next_action(&mut action_rx).await {
        ChatAction::Join { channel } => assert_eq!(channel, "#old"),
        other => panic!("expected a join, got {other:?}"),
    }

    store.set_channels(vec![Channel {
        id: 2,
        name: "#new".to_string(),
        salt: SALT.to_string(),
    }]);
    event_tx.send(ChatEvent::SessionEstablished).await.unwrap();
    match next_action(&mut action_rx).await {
        ChatAction::Join { channel } => assert_eq!(channel, "#new"),
        other => panic!("expected a join, got {other:?}"),
    }

    // the dropped entry is gone: a message to it is ignored
    event_tx
        .send(ChatEvent::MessageReceived {
            target: "#old".to_string(),
            source: "carol".to_string(),
            text: "anyone here?".to_string(),
        })
        .await
        .unwrap();
    event_tx
        .send(ChatEvent::MessageReceived {
            target: "#new".to_string(),
            source: "carol".to_string(),
            text: "hello".to_string(),
        })
        .await
        .unwrap();

    wait_until(|| !store.messages.lock().unwrap().is_empty()).await;
    // give the ignored message time to (not) land
    tokio::time::sleep(Duration::from_millis(100)).await;

    let messages = store.messages.lock().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].channel, 2);
    drop(messages);

    event_tx
        .send(ChatEvent::SessionClosed { error: None })
        .await
        .unwrap();
    timeout(Duration::from_secs(10), run)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn a_dropped_session_reconnects_and_a_clean_close_does_not() {
    let store = Arc::new(RecordingStore::default());

    let (first, first_tx, _first_actions) = make_session("statsbot", HashMap::new());
    first_tx
        .send(ChatEvent::SessionClosed {
            error: Some("ping timeout".to_string()),
        })
        .await
        .unwrap();

    let (second, second_tx, _second_actions) = make_session("statsbot", HashMap::new());
    second_tx
        .send(ChatEvent::SessionClosed { error: None })
        .await
        .unwrap();

    let attempts = Arc::new(Mutex::new(Vec::new()));
    let connector = ScriptedConnector {
        script: VecDeque::from([
            ConnectOutcome::Establish(first),
            ConnectOutcome::Establish(second),
        ]),
        attempts: attempts.clone(),
    };

    let manager = ConnectionManager::new(connector, store).with_policy(ReconnectPolicy {
        delay: Duration::from_millis(10),
    });
    timeout(Duration::from_secs(10), manager.run())
        .await
        .expect("manager did not return")
        .expect("run() surfaced a failure");

    assert_eq!(attempts.lock().unwrap().len(), 2);
}
