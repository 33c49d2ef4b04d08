use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures_util::StreamExt;
use irc::client::prelude::{Capability, Client, Command, Config, Prefix, Response};
use irc::client::{ClientStream, Sender};
use irc::proto::Message;
use irc::proto::command::CapSubCommand;
use tokio::sync::mpsc;
use tracing::{info, warn};

use kstats_core::session::{ConnectError, Connector, RosterProvider, Session};
use kstats_types::events::{ChatAction, ChatEvent};

/// SASL numerics the registration flow reacts to. The `irc` crate
/// exposes them as responses; matched by code to cover the whole 902..=907
/// failure range uniformly.
const RPL_SASLSUCCESS: u16 = 903;

#[derive(Debug, Clone)]
pub struct SaslCredentials {
    pub account: String,
    pub password: String,
}

/// Connection settings for one network.
#[derive(Debug, Clone)]
pub struct IrcSettings {
    pub server: String,
    pub port: u16,
    pub secure: bool,
    pub nick: String,
    pub ident: String,
    pub realname: String,
    pub sasl: Option<SaslCredentials>,
}

/// Builds one fresh IRC client per connect attempt.
pub struct IrcConnector {
    settings: IrcSettings,
}

impl IrcConnector {
    pub fn new(settings: IrcSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Connector for IrcConnector {
    async fn connect(&mut self) -> Result<Session, ConnectError> {
        let config = Config {
            server: Some(self.settings.server.clone()),
            port: Some(self.settings.port),
            use_tls: Some(self.settings.secure),
            nickname: Some(self.settings.nick.clone()),
            username: Some(self.settings.ident.clone()),
            realname: Some(self.settings.realname.clone()),
            ..Config::default()
        };

        let mut client = Client::from_config(config)
            .await
            .map_err(|e| ConnectError(e.into()))?;

        if self.settings.sasl.is_some() {
            // identify() would end capability negotiation immediately,
            // so registration is sent by hand and CAP END is deferred
            // until the AUTHENTICATE exchange finishes.
            client
                .send_cap_req(&[Capability::Sasl])
                .map_err(|e| ConnectError(e.into()))?;
            client
                .send(Command::NICK(self.settings.nick.clone()))
                .map_err(|e| ConnectError(e.into()))?;
            client
                .send(Command::USER(
                    self.settings.ident.clone(),
                    "0".to_string(),
                    self.settings.realname.clone(),
                ))
                .map_err(|e| ConnectError(e.into()))?;
        } else {
            client.identify().map_err(|e| ConnectError(e.into()))?;
        }

        let stream = client.stream().map_err(|e| ConnectError(e.into()))?;
        let sender = client.sender();
        let nick = client.current_nickname().to_string();
        let client = Arc::new(client);

        let (event_tx, events) = mpsc::channel(256);
        let (actions, action_rx) = mpsc::channel(256);
        tokio::spawn(pump_events(
            stream,
            event_tx,
            sender.clone(),
            self.settings.sasl.clone(),
        ));
        tokio::spawn(pump_actions(action_rx, sender));

        Ok(Session {
            nick,
            events,
            actions,
            roster: Arc::new(IrcRoster { client }),
        })
    }
}

/// Roster snapshots from the client's channel user tracking. Returns
/// `None` until the client has seen the channel's user list.
struct IrcRoster {
    client: Arc<Client>,
}

impl RosterProvider for IrcRoster {
    fn roster(&self, channel: &str) -> Option<Vec<String>> {
        self.client.list_users(channel).map(|users| {
            users
                .into_iter()
                .map(|user| user.get_nickname().to_string())
                .collect()
        })
    }
}

/// Translate inbound IRC traffic into core events until the stream
/// ends. An errorless end of stream is a graceful close.
async fn pump_events(
    mut stream: ClientStream,
    events: mpsc::Sender<ChatEvent>,
    sender: Sender,
    sasl: Option<SaslCredentials>,
) {
    while let Some(result) = stream.next().await {
        let message = match result {
            Ok(message) => message,
            Err(error) => {
                let _ = events
                    .send(ChatEvent::SessionClosed {
                        error: Some(error.to_string()),
                    })
                    .await;
                return;
            }
        };

        if let Some(event) = translate(&message, &sender, sasl.as_ref()) {
            if events.send(event).await.is_err() {
                return;
            }
        }
    }

    let _ = events.send(ChatEvent::SessionClosed { error: None }).await;
}

fn translate(
    message: &Message,
    sender: &Sender,
    sasl: Option<&SaslCredentials>,
) -> Option<ChatEvent> {
    match &message.command {
        Command::Response(Response::RPL_WELCOME, _) => Some(ChatEvent::SessionEstablished),

        Command::PRIVMSG(target, text) => match &message.prefix {
            Some(Prefix::Nickname(nick, _, _)) => Some(ChatEvent::MessageReceived {
                target: target.clone(),
                source: nick.clone(),
                text: text.clone(),
            }),
            _ => None,
        },

        Command::CAP(_, CapSubCommand::ACK, _, _) if sasl.is_some() => {
            if let Err(error) = sender.send(Command::AUTHENTICATE("PLAIN".to_string())) {
                warn!(%error, "failed to start sasl authentication");
            }
            None
        }

        Command::AUTHENTICATE(challenge) if challenge == "+" => {
            if let Some(credentials) = sasl {
                let payload = format!(
                    "{0}\0{0}\0{1}",
                    credentials.account, credentials.password
                );
                if let Err(error) = sender.send(Command::AUTHENTICATE(BASE64.encode(payload))) {
                    warn!(%error, "failed to send sasl credentials");
                }
            }
            None
        }

        Command::Response(code, _) if sasl.is_some() && (902..=907).contains(&(*code as u16)) => {
            if *code as u16 == RPL_SASLSUCCESS {
                info!("sasl authentication succeeded");
            } else {
                warn!(code = *code as u16, "sasl authentication failed");
            }
            if let Err(error) = sender.send(Command::CAP(None, CapSubCommand::END, None, None)) {
                warn!(%error, "failed to end capability negotiation");
            }
            None
        }

        _ => None,
    }
}

/// Forward core actions to the wire until the action channel closes.
/// Send failures are logged; the session-level error surfaces through
/// the event stream instead.
async fn pump_actions(mut actions: mpsc::Receiver<ChatAction>, sender: Sender) {
    while let Some(action) = actions.recv().await {
        let result = match action {
            ChatAction::Join { channel } => sender.send_join(&channel),
            ChatAction::Reply { target, text } => sender.send_privmsg(&target, &text),
        };
        if let Err(error) = result {
            warn!(%error, "failed to send outbound command");
        }
    }
}
