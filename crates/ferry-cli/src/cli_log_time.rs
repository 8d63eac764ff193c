//! Timezone-aware timestamp formatting for log output.

use std::fmt::Write as _;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use chrono::Utc;
use chrono_tz::Tz;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;

pub fn parse_log_timezone(name: &str) -> Result<Tz> {
    Tz::from_str(name.trim()).map_err(|_| anyhow!("unknown log timezone '{name}'"))
}

/// Formats log timestamps like `2025-09-15 23:22:45 +08:00` in a fixed zone.
pub struct ZonedLogTimer {
    timezone: Tz,
}

impl ZonedLogTimer {
    pub fn new(timezone: Tz) -> Self {
        Self { timezone }
    }
}

impl FormatTime for ZonedLogTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", zoned_timestamp(self.timezone))
    }
}

fn zoned_timestamp(timezone: Tz) -> String {
    Utc::now()
        .with_timezone(&timezone)
        .format("%Y-%m-%d %H:%M:%S %:z")
        .to_string()
}
