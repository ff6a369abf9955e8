use serde_json::json;
use tidemark_common::Result;
use tidemark_db::MigrationStatus;

/// ANSI C `asctime` layout, e.g. `Mon Jan  2 15:04:05 2006`.
const APPLIED_AT_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

pub fn status(statuses: &[MigrationStatus], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(statuses)?);
    } else {
        for line in render_status(statuses) {
            println!("{line}");
        }
    }
    Ok(())
}

pub fn version(version: i64, json: bool) -> Result<()> {
    if json {
        println!("{}", json!({ "version": version }));
    } else {
        println!("tidemark: version {version}");
    }
    Ok(())
}

/// Report the versions a command touched, e.g. `applied` or `rolled back`.
pub fn versions(verb: &str, versions: &[i64], json: bool) -> Result<()> {
    if json {
        println!("{}", json!({ "action": verb, "versions": versions }));
    } else if versions.is_empty() {
        println!("tidemark: no migrations {verb}");
    } else {
        let list: Vec<String> = versions.iter().map(i64::to_string).collect();
        println!("tidemark: {verb} {}", list.join(", "));
    }
    Ok(())
}

fn render_status(statuses: &[MigrationStatus]) -> Vec<String> {
    let mut lines = vec![
        "    Applied At                  Migration".to_string(),
        "    =======================================".to_string(),
    ];
    lines.extend(statuses.iter().map(|s| {
        let applied_at = match s.applied_at {
            Some(ts) => ts.format(APPLIED_AT_FORMAT).to_string(),
            None => "Pending".to_string(),
        };
        format!("    {applied_at:<24} -- {}", s.source)
    }));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn renders_pending_and_applied_rows() {
        let statuses = vec![
            MigrationStatus {
                version: 1,
                source: "00001_init.sql".into(),
                applied_at: Some(Utc.with_ymd_and_hms(2006, 1, 2, 15, 4, 5).unwrap()),
            },
            MigrationStatus {
                version: 2,
                source: "00002_users.sql".into(),
                applied_at: None,
            },
        ];

        let lines = render_status(&statuses);
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[2], "    Mon Jan  2 15:04:05 2006 -- 00001_init.sql");
        assert_eq!(lines[3], "    Pending                  -- 00002_users.sql");
    }
}
