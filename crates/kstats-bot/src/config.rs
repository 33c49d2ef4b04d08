use anyhow::{Context, Result};

use kstats_irc::{IrcSettings, SaslCredentials};

/// Process configuration, read once at startup from `KSTATS_*`
/// environment variables. A malformed value aborts before the core
/// starts.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub irc: IrcSettings,
    pub db_path: String,
}

impl BotConfig {
    pub fn from_env() -> Result<Self> {
        let nick = required("KSTATS_IRC_NICK")?;
        let port: u16 = optional("KSTATS_IRC_PORT", "6667")
            .parse()
            .context("KSTATS_IRC_PORT must be a port number")?;

        let sasl = if flag("KSTATS_IRC_SASL_ENABLED") {
            Some(SaslCredentials {
                account: required("KSTATS_IRC_SASL_ACCOUNT")?,
                password: required("KSTATS_IRC_SASL_PASSWORD")?,
            })
        } else {
            None
        };

        Ok(Self {
            irc: IrcSettings {
                server: required("KSTATS_IRC_SERVER")?,
                port,
                secure: flag("KSTATS_IRC_SECURE"),
                ident: optional("KSTATS_IRC_IDENT", &nick),
                realname: optional("KSTATS_IRC_REALNAME", &nick),
                nick,
                sasl,
            },
            db_path: optional("KSTATS_DB_PATH", "kstats.db"),
        })
    }
}

fn required(name: &str) -> Result<String> {
    std::env::var(name).with_context(|| format!("{name} is required"))
}

fn optional(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn flag(name: &str) -> bool {
    std::env::var(name).map(|v| v == "true").unwrap_or(false)
}
