use std::path::PathBuf;
use std::sync::Arc;

use configurator_core::{ConfigurationError, ConfigurationSession, GroupId, OptionId};

use crate::commands::catalog::load_for_command;
use crate::commands::CommandResult;

#[derive(Debug, Clone)]
pub struct ConfigureArgs {
    pub catalog: Option<PathBuf>,
    pub variant: String,
    pub quantity: u32,
    pub selections: Vec<String>,
    pub quote: bool,
}

pub fn run(args: ConfigureArgs) -> CommandResult {
    let selections = match parse_selections(&args.selections) {
        Ok(selections) => selections,
        Err(message) => return CommandResult::failure("configure", "invalid_argument", message, 7),
    };

    let loaded = match load_for_command("configure", args.catalog) {
        Ok(loaded) => loaded,
        Err(result) => return result,
    };

    let catalog = Arc::new(loaded.catalog);
    let mut session = match ConfigurationSession::start(catalog, args.variant.as_str()) {
        Ok(session) => session,
        Err(error) => return rejected(&error),
    };

    if args.quantity != 1 {
        if let Err(error) = session.set_quantity(args.quantity) {
            return rejected(&error);
        }
    }
    for (group, option) in selections {
        if let Err(error) = session.select(group, option) {
            return rejected(&error);
        }
    }

    if args.quote {
        return match session.quote_line() {
            Ok(draft) => CommandResult::success_with_details(
                "configure",
                format!(
                    "quote line for `{}` x{}: {} {}",
                    draft.variant_id, draft.quantity, draft.line_total, draft.currency
                ),
                &draft,
            ),
            Err(error) => rejected(&error),
        };
    }

    let snapshot = session.snapshot();
    let status = if snapshot.is_complete { "complete" } else { "incomplete" };
    CommandResult::success_with_details(
        "configure",
        format!(
            "`{}` x{} is {status}: total {} {}",
            snapshot.variant_id,
            snapshot.quantity,
            snapshot.pricing.total,
            snapshot.pricing.currency
        ),
        &snapshot,
    )
}

fn rejected(error: &ConfigurationError) -> CommandResult {
    CommandResult::failure("configure", error.code(), error.user_message(), 5)
}

fn parse_selections(raw: &[String]) -> Result<Vec<(GroupId, OptionId)>, String> {
    raw.iter()
        .map(|entry| {
            let (group, option) = entry
                .split_once('=')
                .map(|(group, option)| (group.trim(), option.trim()))
                .filter(|(group, option)| !group.is_empty() && !option.is_empty())
                .ok_or_else(|| format!("invalid --select `{entry}` (expected GROUP=OPTION)"))?;
            Ok((GroupId::from(group), OptionId::from(option)))
        })
        .collect()
}
