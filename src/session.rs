use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::command::Command;
use crate::error::ChatError;
use crate::message::{self, Message, Speaker};
use crate::registry::{Notifier, Registration, Registry};
use crate::types::UserId;

/// Longest line a client may send, not counting the newline. Longer
/// input ends the session.
pub const MAX_LINE: usize = 8 * 1024;

/// What the read loop should do after a line has been handled.
#[derive(Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// One connected client.
///
/// A `Session` only exists while it is registered: `admit` is the single
/// way in, and consuming the session in `close` (or dropping it) is the
/// way out. There is no value that represents a closed session.
pub struct Session {
    registration: Registration,
    nick: Option<String>,
    outbound: Arc<dyn Notifier>,
}

impl Session {
    /// Allocate an identity and register with `registry`.
    ///
    /// On a full registry this fails with `ChatError::ServerFull` and
    /// nothing is sent to the client. Otherwise the welcome text is the
    /// first line this client receives.
    pub fn admit(registry: &Arc<Registry>, outbound: Arc<dyn Notifier>) -> Result<Self, ChatError> {
        let id = registry.next_id();
        let registration =
            registry.register_with_greeting(id, Arc::clone(&outbound), message::WELCOME)?;

        Ok(Session {
            registration,
            nick: None,
            outbound,
        })
    }

    pub fn id(&self) -> UserId {
        self.registration.id()
    }

    pub fn nick(&self) -> Option<&str> {
        self.nick.as_deref()
    }

    /// Handle one line read from the client.
    pub fn handle_line(&mut self, raw: &str) -> Flow {
        let line = raw.replace('\r', "");
        let line = line.trim();
        if line.is_empty() {
            return Flow::Continue;
        }

        if line.starts_with('/') {
            match Command::parse(line) {
                Ok(Command::Nick { name }) => self.rename(name),
                Ok(Command::Quit) => return Flow::Quit,
                Err(e) => {
                    tracing::debug!(user = %self.id(), error = ?e, "rejected command");
                    self.reply(&format!("{e}\n"));
                }
            }
            return Flow::Continue;
        }

        let text: String = Message {
            from: Speaker::new(self.id(), self.nick()),
            body: line,
        }
        .into();
        self.registration.registry().broadcast(&text, self.id());
        Flow::Continue
    }

    fn rename(&mut self, name: String) {
        let notice = message::rename_notice(self.id(), &name);
        tracing::info!(user = %self.id(), nick = %name, "nickname changed");
        self.nick = Some(name);
        self.registration.registry().broadcast(&notice, self.id());
    }

    /// Write directly to this client, bypassing the registry.
    fn reply(&self, text: &str) {
        if let Err(e) = self.outbound.deliver(Arc::from(text)) {
            tracing::warn!(user = %self.id(), error = %e, "reply failed");
        }
    }

    /// Read lines until end of stream, a read error, an over-long line,
    /// or `/quit`, then close.
    ///
    /// A trailing fragment without a newline at end of stream is dropped.
    pub async fn run<R>(mut self, mut reader: R) -> Result<(), ChatError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut buf = Vec::new();
        let limit = MAX_LINE as u64 + 1;
        let result = loop {
            buf.clear();
            match (&mut reader).take(limit).read_until(b'\n', &mut buf).await {
                Ok(0) => break Ok(()),
                Ok(_) if buf.ends_with(b"\n") => {
                    let line = String::from_utf8_lossy(&buf);
                    if self.handle_line(&line) == Flow::Quit {
                        break Ok(());
                    }
                }
                Ok(_) if buf.len() > MAX_LINE => break Err(ChatError::LineTooLong { max: MAX_LINE }),
                Ok(_) => break Ok(()),
                Err(e) => break Err(ChatError::from(e)),
            }
        };
        self.close();
        result
    }

    /// Leave the registry. The connection itself is released once the
    /// last outbound handle is gone.
    pub fn close(self) {
        tracing::info!(user = %self.id(), nick = ?self.nick, "client disconnected");
        // Dropping `self.registration` deregisters.
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use tokio::io::{AsyncRead, BufReader, ReadBuf};

    use super::*;
    use crate::registry::testing::Recorder;

    /// A connection that resets on every read.
    struct ResetReader;

    impl AsyncRead for ResetReader {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Poll::Ready(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            )))
        }
    }

    fn admit(registry: &Arc<Registry>) -> (Session, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let session = Session::admit(registry, recorder.clone()).unwrap();
        (session, recorder)
    }

    /// Lines received after the welcome text.
    fn after_welcome(recorder: &Recorder) -> Vec<String> {
        let lines = recorder.lines();
        assert_eq!(lines.first().map(String::as_str), Some(message::WELCOME));
        lines[1..].to_vec()
    }

    #[test]
    fn welcome_goes_to_new_client_only() {
        let registry = Arc::new(Registry::new(4));
        let (_a, a_rec) = admit(&registry);
        let (_b, b_rec) = admit(&registry);

        assert_eq!(a_rec.lines(), vec![message::WELCOME]);
        assert_eq!(b_rec.lines(), vec![message::WELCOME]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn rejected_client_gets_nothing() {
        let registry = Arc::new(Registry::new(1));
        let (_a, _) = admit(&registry);

        let recorder = Arc::new(Recorder::default());
        let result = Session::admit(&registry, recorder.clone());
        assert!(matches!(result, Err(ChatError::ServerFull { max: 1 })));
        assert!(recorder.lines().is_empty());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn rename_then_message() {
        let registry = Arc::new(Registry::new(4));
        let (mut a, a_rec) = admit(&registry);
        let (_b, b_rec) = admit(&registry);

        assert_eq!(a.handle_line("/nick X\r\n"), Flow::Continue);
        a.handle_line("hi\n");

        let expected = vec![
            format!("User {} is now known as X\n", a.id().get()),
            "X> hi\n".to_string(),
        ];
        assert_eq!(after_welcome(&a_rec), expected);
        assert_eq!(after_welcome(&b_rec), expected);
        assert_eq!(a.nick(), Some("X"));
    }

    #[test]
    fn anonymous_message_uses_identity() {
        let registry = Arc::new(Registry::new(16));
        for _ in 0..6 {
            registry.next_id();
        }
        let (mut s, rec) = admit(&registry);
        assert_eq!(s.id(), UserId::new(7));

        s.handle_line("hi\n");
        assert_eq!(after_welcome(&rec), vec!["user:7> hi\n"]);
    }

    #[test]
    fn nick_without_argument_is_private_usage_error() {
        let registry = Arc::new(Registry::new(4));
        let (mut a, a_rec) = admit(&registry);
        let (_b, b_rec) = admit(&registry);

        a.handle_line("/nick\n");

        assert_eq!(after_welcome(&a_rec), vec!["Usage: /nick <nickname>\n"]);
        assert!(after_welcome(&b_rec).is_empty());
        assert_eq!(a.nick(), None);
    }

    #[test]
    fn unknown_command_is_private() {
        let registry = Arc::new(Registry::new(4));
        let (mut a, a_rec) = admit(&registry);
        let (_b, b_rec) = admit(&registry);

        assert_eq!(a.handle_line("/frobnicate\n"), Flow::Continue);

        assert_eq!(after_welcome(&a_rec), vec!["Unsupported command\n"]);
        assert!(after_welcome(&b_rec).is_empty());
    }

    #[test]
    fn blank_lines_are_ignored() {
        let registry = Arc::new(Registry::new(4));
        let (mut a, a_rec) = admit(&registry);

        a.handle_line("\n");
        a.handle_line("  \r\n");

        assert!(after_welcome(&a_rec).is_empty());
    }

    #[test]
    fn quit_command_ends_loop() {
        let registry = Arc::new(Registry::new(4));
        let (mut a, _) = admit(&registry);
        assert_eq!(a.handle_line("/QUIT\n"), Flow::Quit);
    }

    #[test]
    fn closed_session_misses_later_broadcasts() {
        let registry = Arc::new(Registry::new(4));
        let (mut a, a_rec) = admit(&registry);
        let (b, b_rec) = admit(&registry);

        b.close();
        assert_eq!(registry.len(), 1);

        a.handle_line("anyone?\n");
        assert!(after_welcome(&b_rec).is_empty());
        assert_eq!(after_welcome(&a_rec).len(), 1);
    }

    #[tokio::test]
    async fn run_processes_lines_until_eof() {
        let registry = Arc::new(Registry::new(4));
        let (a, a_rec) = admit(&registry);
        let id = a.id();

        let input: &[u8] = b"/nick alice\nhello\npartial";
        a.run(input).await.unwrap();

        assert_eq!(
            after_welcome(&a_rec),
            vec![
                format!("User {} is now known as alice\n", id.get()),
                "alice> hello\n".to_string(),
            ]
        );
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn run_stops_at_quit() {
        let registry = Arc::new(Registry::new(4));
        let (a, a_rec) = admit(&registry);

        let input: &[u8] = b"/quit\nnever sent\n";
        a.run(input).await.unwrap();

        assert!(after_welcome(&a_rec).is_empty());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn read_error_ends_session() {
        let registry = Arc::new(Registry::new(4));
        let (a, a_rec) = admit(&registry);

        let input = BufReader::new((&b"hello\n"[..]).chain(ResetReader));
        let result = a.run(input).await;

        assert!(matches!(result, Err(ChatError::Network(_))));
        assert_eq!(after_welcome(&a_rec), vec!["user:1> hello\n"]);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn overlong_line_ends_session() {
        let registry = Arc::new(Registry::new(4));
        let (a, a_rec) = admit(&registry);

        let mut input = "ok\n".to_string();
        input.push_str(&"x".repeat(MAX_LINE + 1));
        input.push_str("\nnever seen\n");
        let result = a.run(input.as_bytes()).await;

        assert!(matches!(
            result,
            Err(ChatError::LineTooLong { max: MAX_LINE })
        ));
        assert_eq!(after_welcome(&a_rec), vec!["user:1> ok\n"]);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn line_at_limit_is_accepted() {
        let registry = Arc::new(Registry::new(4));
        let (a, a_rec) = admit(&registry);

        let body = "y".repeat(MAX_LINE);
        let input = format!("{body}\n");
        a.run(input.as_bytes()).await.unwrap();

        assert_eq!(after_welcome(&a_rec), vec![format!("user:1> {body}\n")]);
    }
}
