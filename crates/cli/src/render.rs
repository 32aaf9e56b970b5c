//! Plain-text rendering of dashboard data.

use std::fmt::Write;

use clawboard_dashboard::{
    Channel, ChannelConnection, DashboardSummary, Session, normalize_platform, total_tokens,
};

const NONE: &str = "-";

/// `1234567` -> `1,234,567`.
pub fn thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Left-aligned columns; columns listed in `right` are right-aligned.
fn table(headers: &[&str], rows: &[Vec<String>], right: &[usize]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let line = |cells: Vec<&str>| {
        let mut out = String::new();
        for (i, cell) in cells.iter().enumerate() {
            if i > 0 {
                out.push_str("  ");
            }
            let pad = widths[i].saturating_sub(cell.chars().count());
            if right.contains(&i) {
                out.push_str(&" ".repeat(pad));
                out.push_str(cell);
            } else {
                out.push_str(cell);
                if i + 1 < cells.len() {
                    out.push_str(&" ".repeat(pad));
                }
            }
        }
        out.trim_end().to_string()
    };

    let mut out = line(headers.to_vec());
    for row in rows {
        out.push('\n');
        out.push_str(&line(row.iter().map(String::as_str).collect()));
    }
    out
}

pub fn summary(summary: &DashboardSummary) -> String {
    let channels = if summary.status_known {
        format!(
            "{} ({} connected)",
            summary.channel_count, summary.connected_channels
        )
    } else {
        format!("{} (status unknown)", summary.channel_count)
    };

    let mut out = String::new();
    let _ = writeln!(out, "Sessions      {}", summary.session_count);
    let _ = writeln!(out, "Total tokens  {}", thousands(summary.total_tokens));
    let _ = writeln!(out, "Channels      {channels}");
    let _ = writeln!(
        out,
        "Heartbeat     {}",
        summary
            .heartbeat
            .as_deref()
            .unwrap_or("session_status unavailable")
    );

    out.push_str("\nTop sessions by tokens\n");
    if summary.top_sessions.is_empty() {
        out.push_str("  (no sessions)\n");
    } else {
        let rows: Vec<Vec<String>> = summary
            .top_sessions
            .iter()
            .map(|s| vec![s.key.clone(), thousands(s.tokens)])
            .collect();
        for line in table(&["KEY", "TOKENS"], &rows, &[1]).lines() {
            let _ = writeln!(out, "  {line}");
        }
    }

    out.push_str("\nChannels by platform\n");
    if summary.platforms.is_empty() {
        out.push_str("  (no channels)\n");
    } else {
        let rows: Vec<Vec<String>> = summary
            .platforms_ranked()
            .iter()
            .map(|p| vec![p.platform.clone(), p.count.to_string()])
            .collect();
        for line in table(&["PLATFORM", "COUNT"], &rows, &[1]).lines() {
            let _ = writeln!(out, "  {line}");
        }
    }
    out
}

pub fn sessions(sessions: &[&Session]) -> String {
    let rows: Vec<Vec<String>> = sessions
        .iter()
        .map(|s| {
            vec![
                s.key.clone(),
                s.model.clone().unwrap_or_else(|| NONE.into()),
                s.channel.clone().unwrap_or_else(|| NONE.into()),
                thousands(s.tokens()),
                s.updated_at
                    .as_ref()
                    .map_or_else(|| NONE.into(), ToString::to_string),
            ]
        })
        .collect();

    let mut out = table(&["KEY", "MODEL", "CHANNEL", "TOKENS", "UPDATED"], &rows, &[3]);
    let _ = write!(
        out,
        "\n\n{} sessions, {} tokens",
        sessions.len(),
        thousands(total_tokens(sessions.iter().copied()))
    );
    out
}

pub fn channels(channels: &[&Channel]) -> String {
    let rows: Vec<Vec<String>> = channels
        .iter()
        .map(|ch| {
            let connected = match ch.connection() {
                ChannelConnection::Connected => "yes",
                ChannelConnection::Disconnected => "no",
                ChannelConnection::Unknown => "unknown",
            };
            vec![
                normalize_platform(ch),
                ch.id.clone().unwrap_or_else(|| NONE.into()),
                ch.status.clone().unwrap_or_else(|| "unknown".into()),
                connected.into(),
                ch.last_seen_at
                    .as_ref()
                    .map_or_else(|| NONE.into(), ToString::to_string),
            ]
        })
        .collect();

    let mut out = table(
        &["PLATFORM", "ID", "STATUS", "CONNECTED", "LAST SEEN"],
        &rows,
        &[],
    );
    let _ = write!(out, "\n\n{} channels", channels.len());
    out
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        clawboard_dashboard::{PlatformCount, TopSession},
        serde_json::json,
    };

    #[test]
    fn thousands_separators() {
        assert_eq!(thousands(0), "0");
        assert_eq!(thousands(999), "999");
        assert_eq!(thousands(1000), "1,000");
        assert_eq!(thousands(1_234_567), "1,234,567");
    }

    #[test]
    fn table_aligns_columns() {
        let rows = vec![
            vec!["main".to_string(), "5".to_string()],
            vec!["cron:nightly".to_string(), "1,200".to_string()],
        ];
        assert_eq!(
            table(&["KEY", "TOKENS"], &rows, &[1]),
            "KEY           TOKENS\nmain               5\ncron:nightly   1,200"
        );
    }

    #[test]
    fn summary_mentions_every_figure() {
        let out = summary(&DashboardSummary {
            session_count: 2,
            total_tokens: 12_500,
            channel_count: 3,
            connected_channels: 1,
            status_known: true,
            platforms: vec![PlatformCount {
                platform: "Slack".into(),
                count: 3,
            }],
            top_sessions: vec![TopSession {
                key: "main".into(),
                tokens: 12_000,
            }],
            heartbeat: None,
        });
        assert!(out.contains("Sessions      2"));
        assert!(out.contains("12,500"));
        assert!(out.contains("3 (1 connected)"));
        assert!(out.contains("session_status unavailable"));
        assert!(out.contains("main  12,000"));
        assert!(out.contains("Slack"));
    }

    #[test]
    fn empty_summary() {
        let out = summary(&DashboardSummary::default());
        assert!(out.contains("0 (status unknown)"));
        assert!(out.contains("(no sessions)"));
        assert!(out.contains("(no channels)"));
    }

    #[test]
    fn session_rows_use_placeholders() {
        let session: Session =
            serde_json::from_value(json!({ "key": "main", "totalTokens": 1500 })).unwrap();
        let out = sessions(&[&session]);
        let row = out.lines().nth(1).unwrap();
        assert!(row.starts_with("main"));
        assert!(row.contains("1,500"));
        assert!(row.ends_with('-'));
        assert!(out.ends_with("1 sessions, 1,500 tokens"));
    }

    #[test]
    fn channel_rows_show_connection() {
        let channel: Channel = serde_json::from_value(json!({
            "id": "wa-1",
            "platform": "whatsapp",
            "status": "online",
        }))
        .unwrap();
        let out = channels(&[&channel]);
        let row = out.lines().nth(1).unwrap();
        assert!(row.starts_with("WhatsApp"));
        assert!(row.contains("online"));
        assert!(row.contains("yes"));
    }
}
