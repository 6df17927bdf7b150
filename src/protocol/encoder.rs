//! Chart request encoding.
//!
//! Maps each [`OptionName`] to its verb and encoding strategy:
//!
//! | Kind            | Encoding                                       |
//! |-----------------|------------------------------------------------|
//! | text, integer   | `verb value`                                   |
//! | integer list    | `verb 0,1,2`                                   |
//! | text list       | `verb a,b,c`                                   |
//! | colour list     | `verb 0:red,1:#00ff00`                         |
//! | flag            | `verb` when true; nothing when false           |
//! | chart type      | `xvalue` / `noxvalue`; datetime is rejected    |
//!
//! The whole request is encoded up front so a bad option aborts the call
//! before anything reaches the renderer.

use crate::models::options::{ChartRequestOptions, ChartType, OptionName, OptionValue};
use crate::protocol::command::{Command, Verb};
use crate::{AppError, Result};

/// Encode one `generate_chart` call into its full command sequence.
///
/// The sequence is `clear` (when `clear_first`), one command per option that
/// produces output, in insertion order, then `go`.
///
/// # Errors
///
/// Returns `AppError::Config` for an unrecognized option name, a value that
/// fails coercion, the unsupported datetime chart type, or a multi-line
/// argument.
pub fn encode_chart_request(
    clear_first: bool,
    options: &ChartRequestOptions,
) -> Result<Vec<Command>> {
    let resolved = options.resolve()?;

    let mut commands = Vec::with_capacity(resolved.len() + 2);
    if clear_first {
        commands.push(Command::new(Verb::Clear));
    }
    for (name, value) in &resolved {
        if let Some(command) = encode_option(*name, value)? {
            commands.push(command);
        }
    }
    commands.push(Command::new(Verb::Go));
    Ok(commands)
}

/// Encode a single, already-coerced option.
///
/// Returns `Ok(None)` for a false flag, which is expressed by sending
/// nothing.
///
/// # Errors
///
/// Returns `AppError::Config` if `value` does not match the option's kind,
/// for [`ChartType::DateTime`], or for a multi-line argument.
pub fn encode_option(name: OptionName, value: &OptionValue) -> Result<Option<Command>> {
    match value {
        OptionValue::Flag(false) => Ok(None),
        OptionValue::Flag(true) => Ok(Some(Command::new(option_verb(name)?))),
        OptionValue::ChartType(chart_type) => encode_chart_type(*chart_type).map(Some),
        OptionValue::Text(text) => Command::with_arg(option_verb(name)?, text.as_str()).map(Some),
        OptionValue::Integer(n) => Command::with_arg(option_verb(name)?, n.to_string()).map(Some),
        OptionValue::IntegerList(items) => {
            Command::with_arg(option_verb(name)?, join(items.iter())).map(Some)
        }
        OptionValue::TextList(items) => {
            Command::with_arg(option_verb(name)?, join(items.iter())).map(Some)
        }
        OptionValue::Colours(overrides) => {
            let arg = join(
                overrides
                    .iter()
                    .map(|o| format!("{}:{}", o.index, o.colour)),
            );
            Command::with_arg(option_verb(name)?, arg).map(Some)
        }
    }
}

fn encode_chart_type(chart_type: ChartType) -> Result<Command> {
    match chart_type {
        ChartType::Value => Ok(Command::new(Verb::XValue)),
        ChartType::NoXValue => Ok(Command::new(Verb::NoXValue)),
        ChartType::DateTime => Err(AppError::Config(
            "chart type 'datetime' cannot be selected through the CLI server protocol".into(),
        )),
    }
}

/// Verb for every option except `chartType`, whose verb depends on the value.
fn option_verb(name: OptionName) -> Result<Verb> {
    let verb = match name {
        OptionName::InputPath => Verb::InputPath,
        OptionName::OutputPath => Verb::OutputPath,
        OptionName::ColumnList => Verb::ColumnList,
        OptionName::ColumnList2 => Verb::ColumnList2,
        OptionName::IsCsv => Verb::Csv,
        OptionName::HasHeader => Verb::HasHeader,
        OptionName::Title => Verb::Title,
        OptionName::XTitle => Verb::XTitle,
        OptionName::YTitle => Verb::YTitle,
        OptionName::YTitle2 => Verb::YTitle2,
        OptionName::IgnoreMissingColumns => Verb::IgnoreMissing,
        OptionName::IgnoreDuplicateValues => Verb::IgnoreDup,
        OptionName::DateFormat => Verb::DateFormat,
        OptionName::ShowDatapoints => Verb::DataPoints,
        OptionName::ShowDatapoints2 => Verb::DataPoints2,
        OptionName::LineWeight => Verb::LineWeight,
        OptionName::LineWeight2 => Verb::LineWeight2,
        OptionName::MinY => Verb::MinY,
        OptionName::MaxY => Verb::MaxY,
        OptionName::MinY2 => Verb::MinY2,
        OptionName::MaxY2 => Verb::MaxY2,
        OptionName::ForceYRange => Verb::ForceYRange,
        OptionName::ForceYRange2 => Verb::ForceYRange2,
        OptionName::Height => Verb::Height,
        OptionName::Width => Verb::Width,
        OptionName::IsBar => Verb::Bar,
        OptionName::IsBar2 => Verb::Bar2,
        OptionName::DebugEcho => Verb::DebugEcho,
        OptionName::SeriesTitles => Verb::SeriesTitles,
        OptionName::SeriesTitles2 => Verb::SeriesTitles2,
        OptionName::Colours => Verb::Colours,
        OptionName::ChartType => {
            return Err(AppError::Config(
                "chartType must be given as a chart type value".into(),
            ))
        }
    };
    Ok(verb)
}

fn join<T: ToString>(items: impl Iterator<Item = T>) -> String {
    items.map(|item| item.to_string()).collect::<Vec<_>>().join(",")
}
