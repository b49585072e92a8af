//! Colour-aware console formatting.
//!
//! Every line is rendered as `timestamp LEVEL target message`, with the level and
//! target tinted by severity. Access log events print the request line of their
//! `access` span followed by the response status, tinted green, yellow or red.

use splus_domain::constants::ACCESS_LOG_TARGET;
use std::fmt;
use std::path::Path;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, FormattedFields};
use tracing_subscriber::registry::LookupSpan;

const RESET: &str = "\x1b[0m";
const TIMESTAMP: &str = "\x1b[30;1m";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const ACCESS_SPAN: &str = "access";

/// How the console layer decides whether to emit ANSI colour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ColourMode {
    /// Detect from the terminal and environment.
    #[default]
    Auto,
    Always,
    Never,
}

/// The set of escape codes used by [`AccessFormatter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Palette {
    Plain,
    Basic,
    TrueColour,
}

impl Palette {
    /// Picks a palette for a stream.
    ///
    /// `env` looks up environment variables; `docker` reports whether the
    /// process runs inside a container (which often lacks a tty but renders colour).
    pub fn detect(is_tty: bool, docker: bool, env: impl Fn(&str) -> Option<String>) -> Self {
        if !supports_colour(is_tty, docker, &env) {
            return Self::Plain;
        }

        match env("COLORTERM").as_deref() {
            Some("truecolor" | "24bit") => Self::TrueColour,
            _ => Self::Basic,
        }
    }

    /// Resolves a [`ColourMode`] against stderr and the process environment.
    #[must_use]
    pub fn for_mode(mode: ColourMode) -> Self {
        use std::io::IsTerminal;

        let env = |key: &str| std::env::var(key).ok();
        match mode {
            ColourMode::Never => Self::Plain,
            ColourMode::Always => Self::detect(true, false, env),
            ColourMode::Auto => Self::detect(std::io::stderr().is_terminal(), is_docker(), env),
        }
    }

    /// Tint for a level. `TRACE` shares the `DEBUG` tint.
    #[must_use]
    pub fn level(self, level: Level) -> &'static str {
        let truecolour = match self {
            Self::Plain => return "",
            Self::Basic => false,
            Self::TrueColour => true,
        };

        if level == Level::INFO {
            if truecolour { "\x1b[38;2;100;55;215;1m" } else { "\x1b[34;1m" }
        } else if level == Level::WARN {
            if truecolour { "\x1b[38;2;204;189;51;1m" } else { "\x1b[33;1m" }
        } else if level == Level::ERROR {
            if truecolour { "\x1b[38;2;161;38;46m" } else { "\x1b[31m" }
        } else {
            "\x1b[40;1m"
        }
    }

    #[must_use]
    pub const fn status(self, status: u16) -> &'static str {
        match (self, status) {
            (Self::Plain, _) => "",
            (Self::TrueColour, 400..) => "\x1b[38;2;161;38;46m",
            (Self::TrueColour, 300..) => "\x1b[38;2;204;189;51;1m",
            (Self::TrueColour, _) => "\x1b[38;2;12;218;120;1m",
            (Self::Basic, 400..) => "\x1b[31m",
            (Self::Basic, 300..) => "\x1b[33m",
            (Self::Basic, _) => "\x1b[32m",
        }
    }

    const fn timestamp(self) -> &'static str {
        if matches!(self, Self::Plain) { "" } else { TIMESTAMP }
    }

    const fn reset(self) -> &'static str {
        if matches!(self, Self::Plain) { "" } else { RESET }
    }

    #[must_use]
    pub const fn is_coloured(self) -> bool {
        !matches!(self, Self::Plain)
    }
}

fn supports_colour(is_tty: bool, docker: bool, env: &impl Fn(&str) -> Option<String>) -> bool {
    // IDE consoles report their own tty state reliably.
    if env("PYCHARM_HOSTED").is_some() || env("TERM_PROGRAM").as_deref() == Some("vscode") {
        return is_tty;
    }

    if cfg!(windows) {
        return is_tty && (env("ANSICON").is_some() || env("WT_SESSION").is_some());
    }

    is_tty || docker
}

/// Best-effort container detection.
#[must_use]
pub fn is_docker() -> bool {
    if Path::new("/.dockerenv").exists() {
        return true;
    }

    std::fs::read_to_string("/proc/self/cgroup").is_ok_and(|cgroup| cgroup.contains("docker"))
}

/// Event formatter that highlights levels and access log status codes.
#[derive(Debug, Clone, Copy)]
pub struct AccessFormatter {
    palette: Palette,
}

impl AccessFormatter {
    #[must_use]
    pub const fn new(palette: Palette) -> Self {
        Self { palette }
    }

    #[must_use]
    pub const fn palette(&self) -> Palette {
        self.palette
    }
}

impl<S, N> FormatEvent<S, N> for AccessFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let palette = self.palette;
        let meta = event.metadata();
        let tint = palette.level(*meta.level());
        let reset = palette.reset();

        write!(
            writer,
            "{}{}{reset} {tint}{:<8}{reset} {tint}{}{reset} ",
            palette.timestamp(),
            chrono::Local::now().format(TIMESTAMP_FORMAT),
            meta.level().as_str(),
            meta.target(),
        )?;

        if meta.target() == ACCESS_LOG_TARGET {
            let mut access = AccessFields::default();
            event.record(&mut access);

            match request_line(ctx) {
                Some(line) => write!(writer, "{line}")?,
                None => write!(writer, "{}", access.message)?,
            }

            if let Some(status) = access.status {
                write!(writer, "{reset} {}{status}{reset}", palette.status(status))?;
            }
        } else {
            ctx.format_fields(writer.by_ref(), event)?;
        }

        writeln!(writer)
    }
}

/// The `request` field of the enclosing access span, as stored by the fmt layer.
fn request_line<S, N>(ctx: &FmtContext<'_, S, N>) -> Option<String>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    let span = ctx
        .event_scope()?
        .find(|span| span.metadata().target() == ACCESS_LOG_TARGET && span.name() == ACCESS_SPAN)?;
    let extensions = span.extensions();
    let fields = extensions.get::<FormattedFields<N>>()?;
    let fields = fields.as_str();

    Some(fields.strip_prefix("request=").unwrap_or(fields).to_owned())
}

#[derive(Debug, Default)]
struct AccessFields {
    message: String,
    status: Option<u16>,
}

impl Visit for AccessFields {
    fn record_u64(&mut self, field: &Field, value: u64) {
        if field.name() == "status" {
            self.status = u16::try_from(value).ok();
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        if field.name() == "status" {
            self.status = u16::try_from(value).ok();
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            value.clone_into(&mut self.message);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_no_tty_means_plain() {
        assert_eq!(Palette::detect(false, false, env_of(&[])), Palette::Plain);
    }

    #[test]
    #[cfg(not(windows))]
    fn test_tty_without_colorterm_is_basic() {
        assert_eq!(Palette::detect(true, false, env_of(&[])), Palette::Basic);
    }

    #[test]
    #[cfg(not(windows))]
    fn test_truecolor_terminal_gets_rgb() {
        let env = env_of(&[("COLORTERM", "truecolor")]);
        assert_eq!(Palette::detect(true, false, env), Palette::TrueColour);

        let env = env_of(&[("COLORTERM", "24bit")]);
        assert_eq!(Palette::detect(true, false, env), Palette::TrueColour);
    }

    #[test]
    #[cfg(not(windows))]
    fn test_docker_without_tty_is_coloured() {
        assert_eq!(Palette::detect(false, true, env_of(&[])), Palette::Basic);
    }

    #[test]
    fn test_ide_console_trusts_tty_only() {
        let env = env_of(&[("TERM_PROGRAM", "vscode")]);
        assert_eq!(Palette::detect(false, true, env), Palette::Plain);

        let env = env_of(&[("PYCHARM_HOSTED", "1")]);
        assert_eq!(Palette::detect(false, true, env), Palette::Plain);
    }

    #[test]
    fn test_status_tints() {
        assert_eq!(Palette::Basic.status(200), "\x1b[32m");
        assert_eq!(Palette::Basic.status(302), "\x1b[33m");
        assert_eq!(Palette::Basic.status(429), "\x1b[31m");
        assert_eq!(Palette::Basic.status(503), "\x1b[31m");
        assert_eq!(Palette::TrueColour.status(204), "\x1b[38;2;12;218;120;1m");
        assert_eq!(Palette::Plain.status(500), "");
    }

    #[test]
    fn test_level_tints_fall_back_to_debug() {
        assert_eq!(Palette::Basic.level(Level::TRACE), Palette::Basic.level(Level::DEBUG));
        assert_eq!(Palette::Plain.level(Level::ERROR), "");
        assert!(!Palette::Plain.is_coloured());
    }
}
