use std::io::Write;

use flexi_logger::{DeferredNow, style};
use log::Record;

/// `HH:MM:SS LEVEL message`, level coloured when the terminal supports it.
pub fn cli_format(
    w: &mut dyn Write,
    now: &mut DeferredNow,
    record: &Record,
) -> std::io::Result<()> {
    let level = record.level();
    write!(
        w,
        "{} {:<5} {}",
        now.format("%H:%M:%S"),
        style(level).paint(level.to_string()),
        record.args()
    )
}
