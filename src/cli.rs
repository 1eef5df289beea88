//! Command line interface.

use clap::{Parser, Subcommand};

use crate::jobs::ScopePolicy;
use crate::services::resolver::ResolverKind;

#[derive(Parser, Debug)]
#[command(
    name = "thumbnail-rebuilder",
    version,
    about = "Rebuild video thumbnails from the hosted video API",
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Rebuild thumbnails of every video record
    Rebuild {
        /// Which videos to rebuild
        #[arg(long, value_enum, default_value_t = ScopePolicy::MissingOnly)]
        scope: ScopePolicy,

        /// Image style of the derivative (defaults to the configured style)
        #[arg(long)]
        style: Option<String>,

        /// Where picture URLs come from
        #[arg(long, value_enum, default_value_t = ResolverKind::Api)]
        resolver: ResolverKind,

        /// Continue an interrupted batch with the options it was started with
        #[arg(long, value_name = "BATCH_ID", conflicts_with_all = ["scope", "style", "resolver"])]
        resume: Option<String>,
    },

    /// Rebuild the thumbnail of one video, whatever its current state
    Update {
        media_id: String,

        #[arg(long)]
        style: Option<String>,

        #[arg(long, value_enum, default_value_t = ResolverKind::Api)]
        resolver: ResolverKind,
    },

    /// Store the video API credentials
    Credentials {
        client_id: String,
        client_secret: String,
        api_token: String,
    },

    /// Set the image style used when a command names none
    DefaultStyle { name: String },

    /// List image styles, or add one
    Styles {
        #[command(subcommand)]
        action: Option<StylesAction>,
    },

    /// Show recent warnings and errors
    Logs {
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum StylesAction {
    /// Create or replace an image style
    Add {
        name: String,

        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        width: u32,

        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        height: u32,

        /// Scale and crop to the exact size instead of fitting inside it
        #[arg(long)]
        crop: bool,
    },
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use clap::error::ErrorKind;
    use pretty_assertions::assert_eq;

    use super::*;

    fn parse(line: &str) -> Result<Command, clap::Error> {
        let args = std::iter::once("thumbnail-rebuilder").chain(line.split_whitespace());
        Cli::try_parse_from(args).map(|cli| cli.command)
    }

    #[test]
    fn test_no_args_prints_help() {
        assert_matches!(
            parse(""),
            Err(e) if e.kind() == ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
        );
    }

    #[test]
    fn test_rebuild_defaults() {
        assert_eq!(
            parse("rebuild").unwrap(),
            Command::Rebuild {
                scope: ScopePolicy::MissingOnly,
                style: None,
                resolver: ResolverKind::Api,
                resume: None,
            }
        );
    }

    #[test]
    fn test_rebuild_options() {
        assert_eq!(
            parse("rebuild --scope all --style=large --resolver oembed").unwrap(),
            Command::Rebuild {
                scope: ScopePolicy::All,
                style: Some("large".to_string()),
                resolver: ResolverKind::OEmbed,
                resume: None,
            }
        );
        assert_matches!(
            parse("rebuild --scope missing_only").unwrap(),
            Command::Rebuild {
                scope: ScopePolicy::MissingOnly,
                ..
            }
        );
        assert!(parse("rebuild --scope everything").is_err());
        assert!(parse("rebuild --style").is_err());
    }

    #[test]
    fn test_resume() {
        assert_matches!(
            parse("rebuild --resume abc").unwrap(),
            Command::Rebuild { resume: Some(id), .. } if id == "abc"
        );
        assert_matches!(
            parse("rebuild --resume abc --scope all"),
            Err(e) if e.kind() == ErrorKind::ArgumentConflict
        );
    }

    #[test]
    fn test_update() {
        assert_eq!(
            parse("update m1 --style medium").unwrap(),
            Command::Update {
                media_id: "m1".to_string(),
                style: Some("medium".to_string()),
                resolver: ResolverKind::Api,
            }
        );
        assert!(parse("update").is_err());
    }

    #[test]
    fn test_credentials_need_three_values() {
        assert_matches!(parse("credentials a b c"), Ok(Command::Credentials { .. }));
        assert!(parse("credentials a b").is_err());
    }

    #[test]
    fn test_styles() {
        assert_eq!(parse("styles").unwrap(), Command::Styles { action: None });
        assert_eq!(
            parse("styles add wide 640 360 --crop").unwrap(),
            Command::Styles {
                action: Some(StylesAction::Add {
                    name: "wide".to_string(),
                    width: 640,
                    height: 360,
                    crop: true,
                }),
            }
        );
        assert!(parse("styles add wide 0 360").is_err());
        assert!(parse("styles remove wide").is_err());
    }

    #[test]
    fn test_default_style_is_kebab_case() {
        assert_eq!(
            parse("default-style large").unwrap(),
            Command::DefaultStyle {
                name: "large".to_string()
            }
        );
    }

    #[test]
    fn test_logs_limit() {
        assert_eq!(parse("logs").unwrap(), Command::Logs { limit: 50 });
        assert_eq!(parse("logs --limit 5").unwrap(), Command::Logs { limit: 5 });
        assert!(parse("logs --limit many").is_err());
    }

    #[test]
    fn test_unknown_command() {
        assert!(parse("serve").is_err());
    }
}
