//! Job attach protocol.
//!
//! After the daemon upgrades an attach request, the connection carries a
//! single handshake byte followed by length-prefixed frames in both
//! directions:
//!
//! ```text
//! handshake: 0 = attached | 1 = waiting for job start | 2 = error (+ frame body)
//! frame:     type:u8 | len:u32 (big endian) | payload
//! ```
//!
//! | Type | Direction | Payload |
//! |------|-----------|---------|
//! | 1 | client → daemon | stdin bytes |
//! | 2 | daemon → client | stdout bytes |
//! | 3 | daemon → client | stderr bytes |
//! | 4 | daemon → client | exit status, u32 BE |
//! | 5 | daemon → client | error message, UTF-8 |
//! | 6 | client → daemon | resize, height u16 BE + width u16 BE |
//! | 7 | client → daemon | signal number, i32 BE |
//! | 8 | client → daemon | stdin closed, empty |

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::{HostError, JobId};

const STATE_ATTACHED: u8 = 0;
const STATE_WAITING: u8 = 1;
const STATE_ERROR: u8 = 2;

/// Frame type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    /// Bytes for the job's stdin.
    Stdin = 1,
    /// Bytes the job wrote to stdout.
    Stdout = 2,
    /// Bytes the job wrote to stderr.
    Stderr = 3,
    /// The job exited.
    Exit = 4,
    /// The daemon aborted the attach.
    Error = 5,
    /// Terminal resize.
    Resize = 6,
    /// Signal delivery.
    Signal = 7,
    /// The client has no more stdin.
    CloseStdin = 8,
}

impl FrameType {
    fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            1 => Self::Stdin,
            2 => Self::Stdout,
            3 => Self::Stderr,
            4 => Self::Exit,
            5 => Self::Error,
            6 => Self::Resize,
            7 => Self::Signal,
            8 => Self::CloseStdin,
            _ => return None,
        })
    }
}

/// Largest frame payload accepted from the daemon.
pub const MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

/// Byte stream an attach runs over (an upgraded HTTP connection in production).
pub trait AttachIo: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> AttachIo for T {}

/// An attached session on one job.
pub struct AttachClient {
    job: JobId,
    io: Box<dyn AttachIo>,
    waiting: bool,
}

impl std::fmt::Debug for AttachClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachClient")
            .field("job", &self.job)
            .field("waiting", &self.waiting)
            .finish_non_exhaustive()
    }
}

impl AttachClient {
    /// Reads the handshake byte from a freshly upgraded connection.
    ///
    /// With `wait == false` a job that has not started yet fails with
    /// [`HostError::JobNotRunning`]. With `wait == true` the client is
    /// returned immediately and [`wait`](Self::wait) blocks for the start.
    pub async fn handshake(
        job: JobId,
        io: Box<dyn AttachIo>,
        wait: bool,
    ) -> Result<Self, HostError> {
        let mut client = Self {
            job,
            io,
            waiting: false,
        };
        match client.read_state().await? {
            STATE_ATTACHED => Ok(client),
            STATE_WAITING if wait => {
                debug!(job = %client.job, "job not started; waiting to attach");
                client.waiting = true;
                Ok(client)
            }
            STATE_WAITING => Err(HostError::JobNotRunning { job: client.job }),
            STATE_ERROR => Err(client.read_error().await),
            other => Err(HostError::transport(
                "attach handshake",
                format!("unexpected attach state {other}"),
            )),
        }
    }

    /// Returns the job this session is attached to.
    pub fn job_id(&self) -> &JobId {
        &self.job
    }

    /// Blocks until the job has started. Returns immediately if it already had.
    pub async fn wait(&mut self) -> Result<(), HostError> {
        if !self.waiting {
            return Ok(());
        }
        match self.read_state().await? {
            STATE_ATTACHED => {
                self.waiting = false;
                Ok(())
            }
            STATE_ERROR => Err(self.read_error().await),
            other => Err(HostError::transport(
                "attach wait",
                format!("unexpected attach state {other}"),
            )),
        }
    }

    /// Sends bytes to the job's stdin.
    pub async fn write_stdin(&mut self, data: &[u8]) -> Result<(), HostError> {
        self.write_frame(FrameType::Stdin, data).await
    }

    /// Signals that no more stdin will be sent.
    pub async fn close_stdin(&mut self) -> Result<(), HostError> {
        self.write_frame(FrameType::CloseStdin, &[]).await
    }

    /// Resizes the job's terminal.
    pub async fn resize(&mut self, height: u16, width: u16) -> Result<(), HostError> {
        let mut payload = [0u8; 4];
        payload[..2].copy_from_slice(&height.to_be_bytes());
        payload[2..].copy_from_slice(&width.to_be_bytes());
        self.write_frame(FrameType::Resize, &payload).await
    }

    /// Delivers a signal to the job's process.
    pub async fn signal(&mut self, signal: i32) -> Result<(), HostError> {
        self.write_frame(FrameType::Signal, &signal.to_be_bytes()).await
    }

    /// Copies job output into `stdout` / `stderr` until the job exits.
    ///
    /// Returns the job's exit status.
    pub async fn receive<O, E>(&mut self, stdout: &mut O, stderr: &mut E) -> Result<i32, HostError>
    where
        O: AsyncWrite + Unpin + ?Sized,
        E: AsyncWrite + Unpin + ?Sized,
    {
        self.wait().await?;
        loop {
            let (kind, payload) = self.read_frame().await?;
            match kind {
                FrameType::Stdout => stdout
                    .write_all(&payload)
                    .await
                    .map_err(|e| HostError::transport("attach stdout", e))?,
                FrameType::Stderr => stderr
                    .write_all(&payload)
                    .await
                    .map_err(|e| HostError::transport("attach stderr", e))?,
                FrameType::Exit => {
                    let bytes: [u8; 4] = payload.as_slice().try_into().map_err(|_| {
                        HostError::transport("attach exit", "exit frame must carry 4 bytes")
                    })?;
                    return Ok(u32::from_be_bytes(bytes) as i32);
                }
                FrameType::Error => {
                    return Err(HostError::Application {
                        status: 500,
                        message: String::from_utf8_lossy(&payload).into_owned(),
                    })
                }
                other => {
                    return Err(HostError::transport(
                        "attach receive",
                        format!("unexpected {other:?} frame from daemon"),
                    ))
                }
            }
        }
    }

    async fn read_state(&mut self) -> Result<u8, HostError> {
        self.io
            .read_u8()
            .await
            .map_err(|e| HostError::transport("attach handshake", e))
    }

    async fn read_error(&mut self) -> HostError {
        match self.read_frame().await {
            Ok((_, payload)) => HostError::Application {
                status: 500,
                message: String::from_utf8_lossy(&payload).into_owned(),
            },
            Err(err) => err,
        }
    }

    async fn read_frame(&mut self) -> Result<(FrameType, Vec<u8>), HostError> {
        let mut header = [0u8; 5];
        self.io
            .read_exact(&mut header)
            .await
            .map_err(|e| HostError::transport("attach read", e))?;
        let kind = FrameType::from_u8(header[0]).ok_or_else(|| {
            HostError::transport("attach read", format!("unknown frame type {}", header[0]))
        })?;
        let len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]);
        if len > MAX_FRAME_LEN {
            return Err(HostError::transport(
                "attach read",
                format!("frame of {len} bytes exceeds limit"),
            ));
        }
        let mut payload = vec![0u8; len as usize];
        self.io
            .read_exact(&mut payload)
            .await
            .map_err(|e| HostError::transport("attach read", e))?;
        Ok((kind, payload))
    }

    async fn write_frame(&mut self, kind: FrameType, payload: &[u8]) -> Result<(), HostError> {
        let len = u32::try_from(payload.len())
            .map_err(|_| HostError::transport("attach write", "frame too large"))?;
        let mut frame = Vec::with_capacity(5 + payload.len());
        frame.push(kind as u8);
        frame.extend_from_slice(&len.to_be_bytes());
        frame.extend_from_slice(payload);
        self.io
            .write_all(&frame)
            .await
            .map_err(|e| HostError::transport("attach write", e))?;
        self.io
            .flush()
            .await
            .map_err(|e| HostError::transport("attach write", e))
    }
}
