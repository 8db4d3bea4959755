//! Groups a token sequence into commands (§4.4).

use crate::token::Token;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("mysh: syntax error: unexpected token")]
    EmptyCommand,
    #[error("mysh: syntax error: expected a word after redirection operator")]
    ExpectedWordAfterRedirect,
}

/// A command's redirection annotation (§3's Args record). `Pipe` means
/// "connect this command's stdout to the next command's stdin"; it carries
/// no file target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redirection {
    None,
    Out(String),
    Err(String),
    AppendOut(String),
    AppendErr(String),
    Pipe,
}

impl Redirection {
    pub fn is_pipe(&self) -> bool {
        matches!(self, Redirection::Pipe)
    }
}

/// One command: its argument vector and at most one redirection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub argv: Vec<String>,
    pub redirect: Redirection,
}

/// Groups tokens into commands. Pipe/Sequential/Background all terminate the
/// current command; only Pipe sets a redirection annotation (§4.4). An empty
/// command — no words accumulated before a separator, before end of input
/// following a `Pipe` (the only separator whose Args-record invariant, §3,
/// requires a following command), or before end of input following a lone
/// redirection with no argument words — is a syntax error. A trailing
/// `&`/`&&` with nothing after it is not an error: §3 only pins that
/// invariant to `Pipe`.
pub fn parse(tokens: Vec<Token>) -> Result<Vec<Command>, ParseError> {
    let mut commands = Vec::new();
    let mut argv: Vec<String> = Vec::new();
    let mut redirect = Redirection::None;
    let mut expects_command = false;
    let mut pending_started = false;
    let mut iter = tokens.into_iter();

    while let Some(token) = iter.next() {
        if token.is_redirect() {
            pending_started = true;
            set_redirect(&mut iter, &mut redirect, redirect_constructor(&token))?;
            continue;
        }

        if token.is_separator() {
            if argv.is_empty() {
                return Err(ParseError::EmptyCommand);
            }
            // A Pipe always annotates its command `Pipe` regardless of any
            // file redirection parsed earlier for it (the Open Question
            // decision in DESIGN.md: the last redirection-like token wins,
            // extended to cover Pipe too); Sequential/Background keep
            // whatever file redirection, if any, was already pending.
            let finished_redirect = if matches!(token, Token::Pipe) {
                redirect = Redirection::None;
                Redirection::Pipe
            } else {
                std::mem::replace(&mut redirect, Redirection::None)
            };
            commands.push(Command {
                argv: std::mem::take(&mut argv),
                redirect: finished_redirect,
            });
            // Only a pipe requires a following command (§3's Args-record
            // invariant); a trailing `&`/`&&` with nothing after it is not a
            // syntax error.
            expects_command = matches!(token, Token::Pipe);
            pending_started = false;
            continue;
        }

        match token {
            Token::Word(word) => {
                argv.push(word);
                pending_started = true;
                expects_command = false;
            }
            _ => unreachable!("token is neither a word, a redirect, nor a separator"),
        }
    }

    if !argv.is_empty() {
        commands.push(Command { argv, redirect });
    } else if expects_command || pending_started {
        return Err(ParseError::EmptyCommand);
    }

    Ok(commands)
}

/// Maps a redirect-operator token to the `Redirection` variant it
/// introduces. Panics on anything else; callers only reach this after
/// `Token::is_redirect` has already confirmed the token's shape.
fn redirect_constructor(token: &Token) -> fn(String) -> Redirection {
    match token {
        Token::RedirectOut => Redirection::Out,
        Token::RedirectErr => Redirection::Err,
        Token::AppendOut => Redirection::AppendOut,
        Token::AppendErr => Redirection::AppendErr,
        _ => unreachable!("redirect_constructor called with a non-redirect token"),
    }
}

fn set_redirect(
    iter: &mut impl Iterator<Item = Token>,
    redirect: &mut Redirection,
    variant: fn(String) -> Redirection,
) -> Result<(), ParseError> {
    match iter.next() {
        Some(Token::Word(file)) => {
            *redirect = variant(file);
            Ok(())
        }
        _ => Err(ParseError::ExpectedWordAfterRedirect),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn parse_line(line: &str) -> Vec<Command> {
        parse(tokenize(line).unwrap()).unwrap()
    }

    #[test]
    fn single_command() {
        let commands = parse_line("echo hello world");
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].argv, vec!["echo", "hello", "world"]);
        assert_eq!(commands[0].redirect, Redirection::None);
    }

    #[test]
    fn redirection_attaches_file_target() {
        let commands = parse_line("echo hi > out.txt");
        assert_eq!(commands[0].redirect, Redirection::Out("out.txt".into()));
    }

    #[test]
    fn last_redirection_wins() {
        let commands = parse_line("echo hi > a.txt > b.txt");
        assert_eq!(commands[0].redirect, Redirection::Out("b.txt".into()));
    }

    #[test]
    fn pipe_splits_commands_and_marks_redirect() {
        let commands = parse_line("echo a | echo b");
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].redirect, Redirection::Pipe);
        assert_eq!(commands[1].redirect, Redirection::None);
    }

    #[test]
    fn command_count_is_one_plus_separator_count() {
        let commands = parse_line("a | b && c & d");
        assert_eq!(commands.len(), 4);
    }

    #[test]
    fn empty_command_between_separators_is_an_error() {
        assert_eq!(parse_line_err("echo a ||"), ParseError::EmptyCommand);
        assert_eq!(parse_line_err("| echo a"), ParseError::EmptyCommand);
    }

    fn parse_line_err(line: &str) -> ParseError {
        parse(tokenize(line).unwrap()).unwrap_err()
    }

    #[test]
    fn trailing_pipe_with_no_following_command_is_an_error() {
        assert_eq!(parse_line_err("echo a |"), ParseError::EmptyCommand);
    }

    #[test]
    fn trailing_background_and_sequential_with_nothing_after_are_not_errors() {
        let commands = parse_line("sleep 5 &");
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].argv, vec!["sleep", "5"]);

        let commands = parse_line("echo a &&");
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].argv, vec!["echo", "a"]);
    }

    #[test]
    fn lone_redirection_with_no_argument_words_is_an_error() {
        assert_eq!(parse_line_err("> out"), ParseError::EmptyCommand);
    }

    #[test]
    fn redirect_without_following_word_is_an_error() {
        assert_eq!(
            parse_line_err("echo hi >"),
            ParseError::ExpectedWordAfterRedirect
        );
    }

    #[test]
    fn blank_line_yields_no_commands() {
        assert_eq!(parse(Vec::new()).unwrap(), Vec::new());
    }
}
