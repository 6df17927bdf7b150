//! Protocol commands: the closed verb vocabulary and its line encoding.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::{AppError, Result};

/// Every verb the renderer's CLI server understands.
///
/// Option verbs mirror [`OptionName`](crate::models::options::OptionName);
/// only the control verbs are documented individually.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    /// Reset all accumulated options to the renderer's defaults.
    Clear,
    InputPath,
    OutputPath,
    ColumnList,
    ColumnList2,
    Csv,
    HasHeader,
    XValue,
    NoXValue,
    Title,
    XTitle,
    YTitle,
    YTitle2,
    IgnoreMissing,
    IgnoreDup,
    DateFormat,
    DataPoints,
    DataPoints2,
    LineWeight,
    LineWeight2,
    MinY,
    MaxY,
    MinY2,
    MaxY2,
    ForceYRange,
    ForceYRange2,
    Height,
    Width,
    Bar,
    Bar2,
    DebugEcho,
    SeriesTitles,
    SeriesTitles2,
    Colours,
    /// Generate the chart from the accumulated options.
    Go,
    /// Set the renderer's idle self-shutdown interval, in seconds.
    Timeout,
    /// Terminate the server loop. Never acknowledged.
    Quit,
}

impl Verb {
    /// The whole vocabulary.
    pub const ALL: [Self; 37] = [
        Self::Clear,
        Self::InputPath,
        Self::OutputPath,
        Self::ColumnList,
        Self::ColumnList2,
        Self::Csv,
        Self::HasHeader,
        Self::XValue,
        Self::NoXValue,
        Self::Title,
        Self::XTitle,
        Self::YTitle,
        Self::YTitle2,
        Self::IgnoreMissing,
        Self::IgnoreDup,
        Self::DateFormat,
        Self::DataPoints,
        Self::DataPoints2,
        Self::LineWeight,
        Self::LineWeight2,
        Self::MinY,
        Self::MaxY,
        Self::MinY2,
        Self::MaxY2,
        Self::ForceYRange,
        Self::ForceYRange2,
        Self::Height,
        Self::Width,
        Self::Bar,
        Self::Bar2,
        Self::DebugEcho,
        Self::SeriesTitles,
        Self::SeriesTitles2,
        Self::Colours,
        Self::Go,
        Self::Timeout,
        Self::Quit,
    ];

    /// Wire spelling.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::InputPath => "inputpath",
            Self::OutputPath => "outputpath",
            Self::ColumnList => "columnlist",
            Self::ColumnList2 => "columnlist2",
            Self::Csv => "csv",
            Self::HasHeader => "hasheader",
            Self::XValue => "xvalue",
            Self::NoXValue => "noxvalue",
            Self::Title => "title",
            Self::XTitle => "xtitle",
            Self::YTitle => "ytitle",
            Self::YTitle2 => "ytitle2",
            Self::IgnoreMissing => "ignoremissing",
            Self::IgnoreDup => "ignoredup",
            Self::DateFormat => "dateformat",
            Self::DataPoints => "datapoints",
            Self::DataPoints2 => "datapoints2",
            Self::LineWeight => "lineweight",
            Self::LineWeight2 => "lineweight2",
            Self::MinY => "miny",
            Self::MaxY => "maxy",
            Self::MinY2 => "miny2",
            Self::MaxY2 => "maxy2",
            Self::ForceYRange => "forceyrange",
            Self::ForceYRange2 => "forceyrange2",
            Self::Height => "height",
            Self::Width => "width",
            Self::Bar => "bar",
            Self::Bar2 => "bar2",
            Self::DebugEcho => "debug-echo",
            Self::SeriesTitles => "seriestitles",
            Self::SeriesTitles2 => "seriestitles2",
            Self::Colours => "colours",
            Self::Go => "go",
            Self::Timeout => "timeout",
            Self::Quit => "quit",
        }
    }

    /// Whether the renderer answers this verb with a response line.
    #[must_use]
    pub fn expects_response(self) -> bool {
        self != Self::Quit
    }
}

impl Display for Verb {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = AppError;

    /// Case-insensitive, as the renderer lowercases incoming verbs.
    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|verb| verb.as_str() == lowered)
            .ok_or_else(|| AppError::Protocol(format!("Unrecognised command: {s}")))
    }
}

/// One protocol command: a verb and an optional argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    verb: Verb,
    arg: Option<String>,
}

impl Command {
    /// Command without an argument.
    #[must_use]
    pub fn new(verb: Verb) -> Self {
        Self { verb, arg: None }
    }

    /// Command with an argument.
    ///
    /// An empty argument is dropped, so the verb goes out alone.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `arg` contains a line break, which would
    /// split the command across two protocol lines.
    pub fn with_arg(verb: Verb, arg: impl Into<String>) -> Result<Self> {
        let arg = arg.into();
        if arg.contains(['\n', '\r']) {
            return Err(AppError::Config(format!(
                "argument for '{verb}' must be a single line"
            )));
        }
        let arg = (!arg.is_empty()).then_some(arg);
        Ok(Self { verb, arg })
    }

    /// The verb.
    #[must_use]
    pub fn verb(&self) -> Verb {
        self.verb
    }

    /// The argument, if any.
    #[must_use]
    pub fn arg(&self) -> Option<&str> {
        self.arg.as_deref()
    }

    /// Wire text, without the line terminator.
    #[must_use]
    pub fn to_line(&self) -> String {
        self.to_string()
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.arg {
            Some(arg) => write!(f, "{} {arg}", self.verb),
            None => write!(f, "{}", self.verb),
        }
    }
}
