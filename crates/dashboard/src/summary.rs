//! Figures derived from gateway payloads for the overview and list views.

use serde::Serialize;

use crate::{
    resources::DashboardData,
    types::{Channel, Session},
};

const TOP_SESSIONS: usize = 10;

const CONNECTED_WORDS: &[&str] = &["ok", "online", "connected", "ready", "running"];
const DISCONNECTED_WORDS: &[&str] = &["down", "offline", "error", "disconnected", "dead"];

const KNOWN_PLATFORMS: &[(&str, &str)] = &[
    ("whatsapp", "WhatsApp"),
    ("discord", "Discord"),
    ("telegram", "Telegram"),
    ("slack", "Slack"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelConnection {
    Connected,
    Disconnected,
    Unknown,
}

impl Channel {
    /// An explicit `connected` flag wins; otherwise guess from the words in
    /// `status`. Disconnected words are checked first, and words match
    /// whole, so "disconnected" and "broken" are not read as connected.
    pub fn connection(&self) -> ChannelConnection {
        if let Some(connected) = self.connected {
            return if connected {
                ChannelConnection::Connected
            } else {
                ChannelConnection::Disconnected
            };
        }
        let status = self.status.as_deref().unwrap_or_default().to_lowercase();
        let words: Vec<&str> = status
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        let has = |list: &[&str]| words.iter().any(|w| list.iter().any(|l| l == w));
        if has(DISCONNECTED_WORDS) {
            ChannelConnection::Disconnected
        } else if has(CONNECTED_WORDS) {
            ChannelConnection::Connected
        } else {
            ChannelConnection::Unknown
        }
    }

    /// First non-empty of platform, name, id.
    fn label(&self) -> Option<&str> {
        [&self.platform, &self.name, &self.id]
            .into_iter()
            .filter_map(|v| v.as_deref())
            .find(|v| !v.is_empty())
    }
}

/// Display name of a channel's platform.
pub fn normalize_platform(channel: &Channel) -> String {
    let Some(label) = channel.label() else {
        return "Unknown".to_string();
    };
    let lower = label.to_lowercase();
    KNOWN_PLATFORMS
        .iter()
        .find(|(needle, _)| lower.contains(needle))
        .map_or_else(|| label.to_string(), |(_, name)| (*name).to_string())
}

pub fn total_tokens<'a>(sessions: impl IntoIterator<Item = &'a Session>) -> u64 {
    sessions
        .into_iter()
        .fold(0, |acc: u64, s| acc.saturating_add(s.tokens()))
}

// ── Overview ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformCount {
    pub platform: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopSession {
    pub key: String,
    pub tokens: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DashboardSummary {
    pub session_count: usize,
    pub total_tokens: u64,
    pub channel_count: usize,
    pub connected_channels: usize,
    /// At least one channel reported something usable for `connection()`.
    pub status_known: bool,
    /// In order of first appearance.
    pub platforms: Vec<PlatformCount>,
    pub top_sessions: Vec<TopSession>,
    pub heartbeat: Option<String>,
}

impl DashboardSummary {
    pub fn from_data(data: &DashboardData) -> Self {
        let sessions = data
            .sessions
            .as_ref()
            .map(|s| s.sessions.as_slice())
            .unwrap_or_default();
        let channels = data
            .channels
            .as_ref()
            .map(|c| c.channels.as_slice())
            .unwrap_or_default();

        let connections: Vec<ChannelConnection> =
            channels.iter().map(Channel::connection).collect();

        let mut platforms: Vec<PlatformCount> = Vec::new();
        for channel in channels {
            let platform = normalize_platform(channel);
            match platforms.iter_mut().find(|p| p.platform == platform) {
                Some(entry) => entry.count += 1,
                None => platforms.push(PlatformCount { platform, count: 1 }),
            }
        }

        // Stable sort keeps gateway order among equal token counts.
        let mut ranked: Vec<&Session> = sessions.iter().collect();
        ranked.sort_by(|a, b| b.tokens().cmp(&a.tokens()));
        let top_sessions = ranked
            .into_iter()
            .take(TOP_SESSIONS)
            .map(|s| TopSession {
                key: s.key.clone(),
                tokens: s.tokens(),
            })
            .collect();

        Self {
            session_count: sessions.len(),
            total_tokens: total_tokens(sessions),
            channel_count: channels.len(),
            connected_channels: connections
                .iter()
                .filter(|c| **c == ChannelConnection::Connected)
                .count(),
            status_known: connections.iter().any(|c| *c != ChannelConnection::Unknown),
            platforms,
            top_sessions,
            heartbeat: data
                .status
                .as_ref()
                .and_then(|s| s.heartbeat())
                .map(str::to_string),
        }
    }

    /// Platforms with the most channels first.
    pub fn platforms_ranked(&self) -> Vec<&PlatformCount> {
        let mut ranked: Vec<&PlatformCount> = self.platforms.iter().collect();
        ranked.sort_by(|a, b| b.count.cmp(&a.count));
        ranked
    }
}

// ── Filters ──────────────────────────────────────────────────────────────────

/// Session list filters. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionFilter {
    /// Case-insensitive substring of key, model or channel.
    pub query: Option<String>,
    pub channel: Option<String>,
    pub model: Option<String>,
}

impl SessionFilter {
    pub fn matches(&self, session: &Session) -> bool {
        if let Some(query) = self.query.as_deref().filter(|q| !q.is_empty()) {
            let hay = format!(
                "{} {} {}",
                session.key,
                session.model.as_deref().unwrap_or_default(),
                session.channel.as_deref().unwrap_or_default()
            )
            .to_lowercase();
            if !hay.contains(&query.to_lowercase()) {
                return false;
            }
        }
        if let Some(channel) = &self.channel
            && session.channel.as_ref() != Some(channel)
        {
            return false;
        }
        if let Some(model) = &self.model
            && session.model.as_ref() != Some(model)
        {
            return false;
        }
        true
    }

    pub fn apply<'a>(&self, sessions: &'a [Session]) -> Vec<&'a Session> {
        sessions.iter().filter(|s| self.matches(s)).collect()
    }
}

/// Channels whose platform, status, name or id contains `query`
/// (case-insensitive).
pub fn filter_channels<'a>(channels: &'a [Channel], query: Option<&str>) -> Vec<&'a Channel> {
    let Some(query) = query.filter(|q| !q.is_empty()).map(str::to_lowercase) else {
        return channels.iter().collect();
    };
    channels
        .iter()
        .filter(|ch| {
            format!(
                "{} {} {} {}",
                normalize_platform(ch),
                ch.status.as_deref().unwrap_or_default(),
                ch.name.as_deref().unwrap_or_default(),
                ch.id.as_deref().unwrap_or_default()
            )
            .to_lowercase()
            .contains(&query)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::types::{ChannelsListResult, SessionStatusResult, SessionsListResult},
        serde_json::json,
    };

    fn channel(value: serde_json::Value) -> Channel {
        serde_json::from_value(value).unwrap()
    }

    fn session(key: &str, tokens: Option<u64>) -> Session {
        Session {
            key: key.to_string(),
            total_tokens: tokens,
            ..Session::default()
        }
    }

    #[test]
    fn connection_heuristic() {
        let cases = [
            (json!({ "connected": false, "status": "online" }), ChannelConnection::Disconnected),
            (json!({ "connected": true }), ChannelConnection::Connected),
            (json!({ "status": "Running" }), ChannelConnection::Connected),
            (json!({ "status": "disconnected" }), ChannelConnection::Disconnected),
            (json!({ "status": "broken" }), ChannelConnection::Unknown),
            (json!({ "status": "connected (error: retrying)" }), ChannelConnection::Disconnected),
            (json!({ "status": "OK" }), ChannelConnection::Connected),
            (json!({ "status": "ws-connected" }), ChannelConnection::Connected),
            (json!({ "status": "OFFLINE" }), ChannelConnection::Disconnected),
            (json!({ "status": "pairing" }), ChannelConnection::Unknown),
            (json!({}), ChannelConnection::Unknown),
        ];
        for (value, expected) in cases {
            assert_eq!(channel(value.clone()).connection(), expected, "{value}");
        }
    }

    #[test]
    fn platform_names() {
        assert_eq!(normalize_platform(&channel(json!({ "platform": "whatsapp-web" }))), "WhatsApp");
        assert_eq!(normalize_platform(&channel(json!({ "name": "My Discord Bot" }))), "Discord");
        assert_eq!(normalize_platform(&channel(json!({ "platform": "", "id": "tg:1" }))), "tg:1");
        assert_eq!(normalize_platform(&channel(json!({ "id": "telegram:1" }))), "Telegram");
        assert_eq!(normalize_platform(&channel(json!({ "platform": "Matrix" }))), "Matrix");
        assert_eq!(normalize_platform(&channel(json!({}))), "Unknown");
    }

    #[test]
    fn summary_of_full_dashboard() {
        let data = DashboardData {
            sessions: Some(SessionsListResult {
                sessions: (0..12)
                    .map(|i| session(&format!("s{i}"), Some(i * 10)))
                    .chain([session("none", None)])
                    .collect(),
                ..SessionsListResult::default()
            }),
            channels: Some(
                serde_json::from_value::<ChannelsListResult>(json!({
                    "channels": [
                        { "platform": "slack", "status": "ok" },
                        { "platform": "whatsapp", "connected": false },
                        { "platform": "Slack", "status": "weird" },
                    ],
                }))
                .unwrap(),
            ),
            status: Some(SessionStatusResult {
                status_text: Some("heartbeat ok".into()),
                ..SessionStatusResult::default()
            }),
        };

        let summary = DashboardSummary::from_data(&data);
        assert_eq!(summary.session_count, 13);
        assert_eq!(summary.total_tokens, (0..12).map(|i| i * 10).sum::<u64>());
        assert_eq!(summary.channel_count, 3);
        assert_eq!(summary.connected_channels, 1);
        assert!(summary.status_known);
        assert_eq!(
            summary.platforms,
            vec![
                PlatformCount { platform: "Slack".into(), count: 2 },
                PlatformCount { platform: "WhatsApp".into(), count: 1 },
            ]
        );
        assert_eq!(summary.top_sessions.len(), 10);
        assert_eq!(summary.top_sessions[0], TopSession { key: "s11".into(), tokens: 110 });
        assert_eq!(summary.top_sessions[9].key, "s2");
        assert_eq!(summary.heartbeat.as_deref(), Some("heartbeat ok"));
    }

    #[test]
    fn summary_of_empty_dashboard() {
        let summary = DashboardSummary::from_data(&DashboardData::default());
        assert_eq!(summary, DashboardSummary::default());
        assert!(!summary.status_known);
    }

    #[test]
    fn platforms_ranked_by_count() {
        let summary = DashboardSummary {
            platforms: vec![
                PlatformCount { platform: "Slack".into(), count: 1 },
                PlatformCount { platform: "Discord".into(), count: 3 },
            ],
            ..DashboardSummary::default()
        };
        let ranked: Vec<&str> = summary
            .platforms_ranked()
            .iter()
            .map(|p| p.platform.as_str())
            .collect();
        assert_eq!(ranked, ["Discord", "Slack"]);
    }

    #[test]
    fn session_filter() {
        let sessions = vec![
            Session {
                model: Some("opus".into()),
                channel: Some("slack".into()),
                ..session("main", Some(1))
            },
            Session {
                model: Some("haiku".into()),
                channel: Some("whatsapp".into()),
                ..session("cron:nightly", Some(2))
            },
        ];

        let by_query = SessionFilter {
            query: Some("OPUS".into()),
            ..SessionFilter::default()
        };
        assert_eq!(by_query.apply(&sessions).len(), 1);

        let by_channel = SessionFilter {
            channel: Some("whatsapp".into()),
            ..SessionFilter::default()
        };
        assert_eq!(by_channel.apply(&sessions)[0].key, "cron:nightly");

        let none = SessionFilter {
            model: Some("opus".into()),
            channel: Some("whatsapp".into()),
            ..SessionFilter::default()
        };
        assert!(none.apply(&sessions).is_empty());

        assert_eq!(SessionFilter::default().apply(&sessions).len(), 2);
        assert_eq!(total_tokens(by_channel.apply(&sessions)), 2);
    }

    #[test]
    fn channel_filter() {
        let channels = vec![
            channel(json!({ "id": "wa-1", "platform": "whatsapp", "status": "online" })),
            channel(json!({ "id": "dc-1", "name": "ops", "status": "down" })),
        ];
        assert_eq!(filter_channels(&channels, None).len(), 2);
        assert_eq!(filter_channels(&channels, Some("WhatsApp"))[0].id.as_deref(), Some("wa-1"));
        assert_eq!(filter_channels(&channels, Some("down")).len(), 1);
        assert!(filter_channels(&channels, Some("telegram")).is_empty());
    }
}
