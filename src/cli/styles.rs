// (c) 2024 Ross Younger
//! Terminal output styling
//!
//! These are [`anstyle::Style`]s, which Display as their ANSI escape sequence.
//! Print them through `anstream`'s `println!` / `eprintln!` so they are stripped
//! when the output is not a terminal.

use anstyle::{AnsiColor, Color, Style};
use clap::builder::styling::Styles;

const fn fg(colour: AnsiColor) -> Style {
    Style::new().fg_color(Some(Color::Ansi(colour)))
}

/// Errors
pub const ERROR: Style = fg(AnsiColor::Red).bold();
/// Warnings
pub const WARNING: Style = fg(AnsiColor::Yellow).bold();
/// Field names, values and other things the user typed or can type
pub const INFO: Style = fg(AnsiColor::Cyan);
/// Section headings
pub(crate) const HEADER: Style = fg(AnsiColor::Yellow).underline();

/// Resets styling to default
pub use anstyle::Reset as RESET;

/// Help output styling. clap honours the `CLICOLOR` family of environment variables by itself.
pub(crate) const CLAP_STYLES: Styles = Styles::styled()
    .usage(HEADER)
    .header(HEADER)
    .literal(Style::new().bold())
    .invalid(WARNING)
    .error(ERROR)
    .valid(INFO.bold().underline())
    .placeholder(INFO);

#[cfg(test)]
mod test {
    use super::{ERROR, INFO, RESET};

    #[test]
    fn render() {
        let s = format!("{ERROR}Error:{RESET} {INFO}port{RESET}");
        assert!(s.starts_with("\x1b["));
        assert!(s.contains("Error:"));
        assert!(s.contains("port"));
    }
}
