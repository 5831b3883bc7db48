use std::path::PathBuf;

use anyhow::Context;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite};
use tracing::{debug, error, info, warn};

use crate::exchange::{self, Status};
use crate::protocol::{Command, PacketStream};
use crate::report::Reporter;

const HELP: &str = "\
exit         - Exit the program.  Equivalent to EOF.
get filename - Copy remote file to local host.
help         - Print help summary.
ls           - List names of files on remote server.
put filename - Copy local file to remote host.
rm filename  - Remove file from remote server.
";

/// Words the operator may type, and the verb each one selects
const VERBS: [(&str, Command); 6] = [
    ("exit", Command::Exit),
    ("help", Command::Help),
    ("ls", Command::Ls),
    ("rm", Command::Rm),
    ("put", Command::Put),
    ("get", Command::Get),
];

pub fn lookup_verb(word: &str) -> Option<Command> {
    VERBS
        .iter()
        .find(|(name, _)| *name == word)
        .map(|(_, command)| *command)
}

/// One resolved operator line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request<'a> {
    Exit,
    Help,
    Ls,
    Rm(&'a str),
    Put(&'a str),
    Get(&'a str),
    Invalid,
}

/// Resolve a line into a request. Blank lines give `None`. A second word
/// after `ls`, `help` or `exit` is ignored.
pub fn parse_line(line: &str) -> Option<Request<'_>> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let (&word, args) = words.split_first()?;

    if words.len() > 2 {
        return Some(Request::Invalid);
    }
    let Some(verb) = lookup_verb(word) else {
        return Some(Request::Invalid);
    };

    let request = match (verb, args) {
        (Command::Exit, _) => Request::Exit,
        (Command::Help, _) => Request::Help,
        (Command::Ls, _) => Request::Ls,
        (Command::Rm, [name]) => Request::Rm(*name),
        (Command::Put, [name]) => Request::Put(*name),
        (Command::Get, [name]) => Request::Get(*name),
        _ => Request::Invalid,
    };
    Some(request)
}

/// What the session does after handling one line
#[derive(Debug)]
pub enum Outcome {
    Continue,
    Exit,
    Fatal(anyhow::Error),
}

/// Why the session ended
#[derive(Debug)]
pub enum SessionEnd {
    Exit,
    EndOfInput,
    Fatal(anyhow::Error),
}

/// Interactive session over one server connection.
///
/// Reads commands from `input` one line at a time, runs one exchange per
/// line and reports through `reporter`. Local files for `put` and `get`
/// are resolved against `local_dir`.
pub struct Session<S, I, R> {
    packets: PacketStream<S>,
    input: I,
    reporter: R,
    local_dir: PathBuf,
}

impl<S, I, R> Session<S, I, R>
where
    S: AsyncRead + AsyncWrite + Unpin,
    I: AsyncBufRead + Unpin,
    R: Reporter,
{
    pub fn new(packets: PacketStream<S>, input: I, reporter: R, local_dir: impl Into<PathBuf>) -> Self {
        Self {
            packets,
            input,
            reporter,
            local_dir: local_dir.into(),
        }
    }

    /// Run until `exit`, end of input or a fatal fault. The connection is
    /// shut down before returning, whichever way the session ends.
    pub async fn run(mut self) -> SessionEnd {
        let end = loop {
            let line = match self.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    info!("end of input");
                    break SessionEnd::EndOfInput;
                }
                Err(e) => break SessionEnd::Fatal(e),
            };

            match self.handle_line(&line).await {
                Outcome::Continue => {}
                Outcome::Exit => break SessionEnd::Exit,
                Outcome::Fatal(e) => break SessionEnd::Fatal(e),
            }
        };

        if let SessionEnd::Fatal(e) = &end {
            error!("session failed: {:#}", e);
            self.reporter.problem(&format!("{:#}", e));
        }
        if let Err(e) = self.packets.shutdown().await {
            warn!("closing connection: {}", e);
        }
        end
    }

    pub async fn handle_line(&mut self, line: &str) -> Outcome {
        debug!("command {}", line);
        let Some(request) = parse_line(line) else {
            return Outcome::Continue;
        };

        let dir = self.local_dir.as_path();
        let packets = &mut self.packets;
        let reporter = &mut self.reporter;
        let result = match request {
            Request::Exit => return Outcome::Exit,
            Request::Help => {
                reporter.output(HELP.as_bytes());
                return Outcome::Continue;
            }
            Request::Invalid => {
                reporter.problem(&format!("{}: invalid command", line));
                return Outcome::Continue;
            }
            Request::Ls => exchange::ls(packets, reporter).await,
            Request::Rm(name) => exchange::rm(packets, reporter, name).await,
            Request::Put(name) => exchange::put(packets, reporter, dir, name).await,
            Request::Get(name) => exchange::get(packets, reporter, dir, name).await,
        };

        match result {
            Ok(Status::ProtocolMismatch(reply)) => {
                debug!("protocol mismatch, server sent {}", reply);
                Outcome::Continue
            }
            Ok(Status::RemoteFailure { code }) => {
                debug!("server refused with error code {}", code);
                Outcome::Continue
            }
            Ok(status) => {
                debug!("exchange finished: {:?}", status);
                Outcome::Continue
            }
            Err(e) => Outcome::Fatal(anyhow::Error::new(e).context(line.trim().to_string())),
        }
    }

    async fn next_line(&mut self) -> anyhow::Result<Option<String>> {
        let mut buf = Vec::new();
        let n = self
            .input
            .read_until(b'\n', &mut buf)
            .await
            .context("reading command input")?;
        if n == 0 {
            return Ok(None);
        }
        let line = String::from_utf8_lossy(&buf);
        Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::constants::DEFAULT_MAX_PAYLOAD;
    use crate::protocol::{ProtocolError, TransportError};
    use crate::report::RecordingReporter;
    use crate::test_helpers::{encoded, spawn_stub_server};
    use pretty_assertions::assert_eq;
    use tokio_test::io::{Builder, Mock};

    fn session<'a>(
        mock: Mock,
        input: &'a [u8],
        reporter: &'a mut RecordingReporter,
    ) -> Session<Mock, &'a [u8], &'a mut RecordingReporter> {
        let packets = PacketStream::new(mock, DEFAULT_MAX_PAYLOAD, None);
        Session::new(packets, input, reporter, ".")
    }

    #[test]
    fn verb_table() {
        assert_eq!(lookup_verb("ls"), Some(Command::Ls));
        assert_eq!(lookup_verb("exit"), Some(Command::Exit));
        assert_eq!(lookup_verb("LS"), None);
        assert_eq!(lookup_verb("lsout"), None);
    }

    #[test]
    fn resolves_lines() {
        assert_eq!(parse_line("ls"), Some(Request::Ls));
        assert_eq!(parse_line("  get   notes.txt  "), Some(Request::Get("notes.txt")));
        assert_eq!(parse_line("put\ta.bin"), Some(Request::Put("a.bin")));
        assert_eq!(parse_line("rm x"), Some(Request::Rm("x")));
        assert_eq!(parse_line("help"), Some(Request::Help));
        assert_eq!(parse_line("exit"), Some(Request::Exit));
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("   "), None);
    }

    #[test]
    fn three_tokens_are_invalid_even_for_known_verbs() {
        assert_eq!(parse_line("get a b"), Some(Request::Invalid));
        assert_eq!(parse_line("ls -l now"), Some(Request::Invalid));
        assert_eq!(parse_line("nonsense a b c"), Some(Request::Invalid));
    }

    #[test]
    fn missing_filename_is_invalid() {
        assert_eq!(parse_line("rm"), Some(Request::Invalid));
        assert_eq!(parse_line("put"), Some(Request::Invalid));
        assert_eq!(parse_line("get"), Some(Request::Invalid));
        assert_eq!(parse_line("frobnicate"), Some(Request::Invalid));
        assert_eq!(parse_line("frobnicate x"), Some(Request::Invalid));
    }

    #[test]
    fn second_word_is_ignored_by_plain_verbs() {
        assert_eq!(parse_line("ls extra"), Some(Request::Ls));
        assert_eq!(parse_line("help me"), Some(Request::Help));
        assert_eq!(parse_line("exit now"), Some(Request::Exit));
    }

    #[tokio::test]
    async fn ls_scenario_prints_exact_listing() {
        let mock = Builder::new()
            .write(&encoded(Command::Ls, 0, ""))
            .read(&encoded(Command::Lsout, 11, ""))
            .read(b"a.txt\nb.txt")
            .build();
        let mut reporter = RecordingReporter::default();

        let end = session(mock, b"ls\n", &mut reporter).run().await;

        assert!(matches!(end, SessionEnd::EndOfInput));
        assert_eq!(reporter.output, b"a.txt\nb.txt");
        assert!(reporter.problems.is_empty());
    }

    #[tokio::test]
    async fn rm_of_missing_file_keeps_session_alive() {
        let mock = Builder::new()
            .write(&encoded(Command::Rm, 0, "missing.txt"))
            .read(&encoded(Command::Nak, 2, ""))
            .write(&encoded(Command::Ls, 0, ""))
            .read(&encoded(Command::Lsout, 0, ""))
            .build();
        let mut reporter = RecordingReporter::default();

        let end = session(mock, b"rm missing.txt\nls\n", &mut reporter).run().await;

        assert!(matches!(end, SessionEnd::EndOfInput));
        assert_eq!(reporter.problems.len(), 1);
        assert!(reporter.problems[0].starts_with("missing.txt: "));
        #[cfg(unix)]
        assert!(reporter.problems[0].to_lowercase().contains("no such file"));
    }

    #[tokio::test]
    async fn exit_stops_before_later_commands() {
        let mock = Builder::new().build();
        let mut reporter = RecordingReporter::default();

        let end = session(mock, b"exit\nls\n", &mut reporter).run().await;

        assert!(matches!(end, SessionEnd::Exit));
    }

    #[tokio::test]
    async fn local_verbs_and_bad_lines_never_touch_the_network() {
        let mock = Builder::new().build();
        let mut reporter = RecordingReporter::default();

        let end = session(mock, b"bogus\nget a b\n\nrm\nhelp\n", &mut reporter)
            .run()
            .await;

        assert!(matches!(end, SessionEnd::EndOfInput));
        assert_eq!(
            reporter.problems,
            vec![
                "bogus: invalid command",
                "get a b: invalid command",
                "rm: invalid command"
            ]
        );
        assert_eq!(reporter.output, HELP.as_bytes());
    }

    #[tokio::test]
    async fn mismatch_is_not_fatal() {
        let mock = Builder::new()
            .write(&encoded(Command::Ls, 0, ""))
            .read(&encoded(Command::Ack, 0, ""))
            .write(&encoded(Command::Rm, 0, "f"))
            .read(&encoded(Command::Ack, 0, ""))
            .build();
        let mut reporter = RecordingReporter::default();

        let end = session(mock, b"ls\nrm f\n", &mut reporter).run().await;

        assert!(matches!(end, SessionEnd::EndOfInput));
        assert_eq!(reporter.problems.len(), 1);
        assert_eq!(reporter.notices, vec!["f: successfully removed"]);
    }

    #[tokio::test]
    async fn transport_fault_ends_the_session() {
        let mock = Builder::new()
            .write(&encoded(Command::Ls, 0, ""))
            .read(&encoded(Command::Lsout, 0, "")[..10])
            .build();
        let mut reporter = RecordingReporter::default();

        let end = session(mock, b"ls\nls\n", &mut reporter).run().await;

        let SessionEnd::Fatal(e) = end else {
            panic!("expected a fatal end, got {end:?}");
        };
        let cause = e.downcast_ref::<ProtocolError>().unwrap();
        assert!(matches!(
            cause,
            ProtocolError::Transport(TransportError::PrematureEof {
                expected: 64,
                received: 10
            })
        ));
        assert_eq!(reporter.problems.len(), 1);
    }

    #[tokio::test]
    async fn full_session_against_stub_server() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("report.txt"), b"quarterly numbers\n").unwrap();

        let (stream, server) = spawn_stub_server(Default::default());
        let packets = PacketStream::new(stream, DEFAULT_MAX_PAYLOAD, None);
        let mut reporter = RecordingReporter::default();
        let input = b"put report.txt\nls\nrm report.txt\nget report.txt\nrm report.txt\nexit\n";

        let end = Session::new(packets, &input[..], &mut reporter, dir.path())
            .run()
            .await;

        assert!(matches!(end, SessionEnd::Exit));
        assert_eq!(reporter.output, b"report.txt\n");
        assert_eq!(
            reporter.notices,
            vec![
                "report.txt: successfully copied to server",
                "report.txt: successfully removed"
            ]
        );
        // get and the second rm both fail: the file is gone
        assert_eq!(reporter.problems.len(), 2);
        assert!(server.await.unwrap().is_empty());
    }
}
