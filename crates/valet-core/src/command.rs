use thiserror::Error;

/// File extension a unit manifest must carry before `--load` will touch it.
pub const MANIFEST_EXT: &str = "toml";

/// A parsed control command.
///
/// Any request or blade message whose text begins with `--` is a control
/// command of the form `--<verb>?<arg1>?<arg2>...`. Arguments are
/// `?`-delimited and trimmed of surrounding whitespace; verbs match
/// case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    /// `--kill`: respond, wipe the remote store, stop the service.
    Kill,
    /// `--load?<manifestPath>?<unitIdentifier>`: hot-load a unit.
    Load { manifest: String, unit: String },
    /// `--unload?<unitIdentifier>`: deregister a hot-loaded unit.
    Unload { unit: String },
    /// `--wipe`: wipe the remote store.
    Wipe,
    /// `--postblade?<name>?<token>`: track a blade; device channel only.
    PostBlade { name: String, token: String },
}

/// Why a `--` command failed to parse. The message is sent back to the
/// requester verbatim as an error response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandParseError {
    #[error("unknown command verb: {0}")]
    UnknownVerb(String),

    #[error("{verb} takes {expected} argument(s), got {got}")]
    Arity {
        verb: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("manifest path must end in .{MANIFEST_EXT}: {0}")]
    Extension(String),

    #[error("empty command")]
    Empty,
}

impl ControlCommand {
    /// Whether a piece of text is addressed to the command grammar at all.
    pub fn is_command(text: &str) -> bool {
        text.starts_with("--")
    }

    /// Parse `--<verb>?<args...>`. The caller is expected to have checked
    /// [`ControlCommand::is_command`]; a missing `--` prefix parses the
    /// same as if it were present.
    pub fn parse(text: &str) -> Result<Self, CommandParseError> {
        let body = text.trim().trim_start_matches("--");
        let mut parts = body
            .split('?')
            .map(str::trim)
            .filter(|p| !p.is_empty());

        let verb = match parts.next() {
            Some(v) => v.to_ascii_lowercase(),
            None => return Err(CommandParseError::Empty),
        };
        let args: Vec<&str> = parts.collect();

        match verb.as_str() {
            "kill" => {
                expect_arity("kill", &args, 0)?;
                Ok(ControlCommand::Kill)
            }
            "load" => {
                expect_arity("load", &args, 2)?;
                let manifest = args[0].to_string();
                if !manifest.ends_with(&format!(".{MANIFEST_EXT}")) {
                    return Err(CommandParseError::Extension(manifest));
                }
                Ok(ControlCommand::Load {
                    manifest,
                    unit: args[1].to_string(),
                })
            }
            "unload" => {
                expect_arity("unload", &args, 1)?;
                Ok(ControlCommand::Unload {
                    unit: args[0].to_string(),
                })
            }
            "wipe" => {
                expect_arity("wipe", &args, 0)?;
                Ok(ControlCommand::Wipe)
            }
            "postblade" => {
                expect_arity("postblade", &args, 2)?;
                Ok(ControlCommand::PostBlade {
                    name: args[0].to_string(),
                    token: args[1].to_string(),
                })
            }
            other => Err(CommandParseError::UnknownVerb(other.to_string())),
        }
    }
}

fn expect_arity(
    verb: &'static str,
    args: &[&str],
    expected: usize,
) -> Result<(), CommandParseError> {
    if args.len() != expected {
        return Err(CommandParseError::Arity {
            verb,
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_command_prefix() {
        assert!(ControlCommand::is_command("--wipe"));
        assert!(!ControlCommand::is_command("what's the weather"));
    }

    #[test]
    fn parses_bare_verbs() {
        assert_eq!(ControlCommand::parse("--kill").unwrap(), ControlCommand::Kill);
        assert_eq!(ControlCommand::parse("--wipe").unwrap(), ControlCommand::Wipe);
    }

    #[test]
    fn verb_is_case_insensitive() {
        assert_eq!(ControlCommand::parse("--WIPE").unwrap(), ControlCommand::Wipe);
        assert_eq!(ControlCommand::parse("--Kill").unwrap(), ControlCommand::Kill);
    }

    #[test]
    fn args_are_trimmed() {
        let cmd = ControlCommand::parse("--load? units/echo.toml ? echo ").unwrap();
        assert_eq!(
            cmd,
            ControlCommand::Load {
                manifest: "units/echo.toml".into(),
                unit: "echo".into(),
            }
        );
    }

    #[test]
    fn load_requires_manifest_extension() {
        let err = ControlCommand::parse("--load?unit.rs?echo").unwrap_err();
        assert!(matches!(err, CommandParseError::Extension(_)));
    }

    #[test]
    fn wrong_arity_is_rejected() {
        let err = ControlCommand::parse("--load?only-one.toml").unwrap_err();
        assert!(matches!(
            err,
            CommandParseError::Arity {
                verb: "load",
                expected: 2,
                got: 1
            }
        ));
        let err = ControlCommand::parse("--kill?extra").unwrap_err();
        assert!(matches!(err, CommandParseError::Arity { verb: "kill", .. }));
    }

    #[test]
    fn unknown_verb_is_rejected() {
        let err = ControlCommand::parse("--dance").unwrap_err();
        assert_eq!(err, CommandParseError::UnknownVerb("dance".into()));
    }

    #[test]
    fn postblade_carries_name_and_token() {
        let cmd = ControlCommand::parse("--postblade?kitchen?s3cret").unwrap();
        assert_eq!(
            cmd,
            ControlCommand::PostBlade {
                name: "kitchen".into(),
                token: "s3cret".into(),
            }
        );
    }
}
