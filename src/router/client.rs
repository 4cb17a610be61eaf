use super::error::RouterError;
use super::protocol::{attribute, read_sentence, write_sentence, Record, Reply};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, BufStream};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, trace};

/// One authenticated RouterOS API connection.
///
/// Requests are strictly sequential: a command is written and its complete
/// reply is read before the next command may be sent.
pub struct ApiConnection<S> {
    stream: BufStream<S>,
    io_timeout: Duration,
}

impl ApiConnection<TcpStream> {
    pub async fn open(
        host: &str,
        port: u16,
        connect_timeout: Duration,
        io_timeout: Duration,
    ) -> Result<Self, RouterError> {
        debug!(host, port, "Opening RouterOS API connection");
        let stream = timeout(connect_timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| RouterError::Timeout(connect_timeout))??;
        stream.set_nodelay(true)?;
        Ok(Self::new(stream, io_timeout))
    }
}

impl<S> ApiConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S, io_timeout: Duration) -> Self {
        Self {
            stream: BufStream::new(stream),
            io_timeout,
        }
    }

    /// Plaintext login (RouterOS 6.43 and later).
    pub async fn login(&mut self, username: &str, password: &str) -> Result<(), RouterError> {
        let words = vec![
            "/login".to_string(),
            attribute("name", username),
            attribute("password", password),
        ];

        match self.run(&words).await {
            Ok(reply) => {
                if reply.done.contains_key("ret") {
                    return Err(RouterError::LegacyLogin);
                }
                Ok(())
            }
            Err(RouterError::Trap(message)) => Err(RouterError::LoginRejected(message)),
            Err(e) => Err(e),
        }
    }

    /// `<path>/print` with extra attributes, e.g. `stats` on `/queue/simple`.
    pub async fn print(&mut self, path: &str, args: &[(&str, &str)]) -> Result<Vec<Record>, RouterError> {
        self.call(path, "print", args).await
    }

    /// `<path>/<command>` and return the `!re` records.
    pub async fn call(
        &mut self,
        path: &str,
        command: &str,
        args: &[(&str, &str)],
    ) -> Result<Vec<Record>, RouterError> {
        let mut words = vec![format!("{}/{}", path.trim_end_matches('/'), command)];
        words.extend(args.iter().map(|(k, v)| attribute(k, v)));
        Ok(self.run(&words).await?.records)
    }

    async fn run(&mut self, words: &[String]) -> Result<CommandReply, RouterError> {
        let io_timeout = self.io_timeout;
        timeout(io_timeout, self.exchange(words))
            .await
            .map_err(|_| RouterError::Timeout(io_timeout))?
    }

    async fn exchange(&mut self, words: &[String]) -> Result<CommandReply, RouterError> {
        if let Some(command) = words.first() {
            trace!(command = %command, "Sending API command");
        }
        write_sentence(&mut self.stream, words).await?;

        let mut records = Vec::new();
        let mut trap = None;
        loop {
            let sentence = read_sentence(&mut self.stream).await?;
            match Reply::from_words(&sentence)? {
                Reply::Re(record) => records.push(record),
                // the router still sends !done after a !trap
                Reply::Trap(message) => trap = Some(message),
                Reply::Fatal(reason) => return Err(RouterError::Fatal(reason)),
                Reply::Done(done) => {
                    if let Some(message) = trap {
                        return Err(RouterError::Trap(message));
                    }
                    return Ok(CommandReply { records, done });
                }
            }
        }
    }
}

struct CommandReply {
    records: Vec<Record>,
    done: Record,
}
