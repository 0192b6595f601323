//! The proxy: one game connection, serial client sessions.
//!
//! The game server is dialed once at startup and the bot lives as long as
//! that connection does. Terminal clients connect to the listen address one
//! at a time; each session tees the game stream to the client and routes
//! client keystrokes through the command capture layer. A client dropping
//! ends its session, the bot and its world carry on, and the next client
//! picks up where the last one left off. Losing the game connection is
//! fatal to the whole process.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

use warptty_core::scan::LineScanner;

use crate::bot::dispatch::Dispatcher;
use crate::bot::Bot;
use crate::paths;
use crate::world::listeners;
use crate::world::persist::Stores;

/// Write half of whichever client is connected right now, if any. The game
/// pump tees output here; a write failure detaches the client and the pump
/// keeps scanning.
type ClientSlot = Arc<Mutex<Option<OwnedWriteHalf>>>;

pub struct Proxy {
    game: String,
    listen: String,
    data_dir: PathBuf,
}

impl Proxy {
    pub fn new(game: String, listen: String, data_dir: PathBuf) -> Self {
        Self {
            game,
            listen,
            data_dir,
        }
    }

    /// Dial the game, start the bot, and serve client sessions until the
    /// game connection dies or the listener fails.
    pub async fn run(self) -> Result<()> {
        paths::ensure_data_dir(&self.data_dir)
            .with_context(|| format!("create data directory {:?}", self.data_dir))?;
        let stores = Stores::load(&self.data_dir)
            .await
            .context("load persistent stores")?;
        info!(dir = %self.data_dir.display(), "stores loaded");

        let game = TcpStream::connect(&self.game)
            .await
            .with_context(|| format!("connect to game server at {}", self.game))?;
        info!(game = %self.game, "connected to game server");
        let (game_read, game_write) = game.into_split();

        // Everything the bot sends to the game funnels through one channel,
        // so keystrokes and action output interleave at write granularity.
        let (game_tx, game_rx) = mpsc::unbounded_channel::<Vec<u8>>();

        let bot = Bot::new(stores, game_tx);
        listeners::spawn(&bot.broker, bot.world.clone(), bot.stores.clone());

        let client: ClientSlot = Arc::new(Mutex::new(None));
        let mut game_task = tokio::spawn(pump_game(
            game_read,
            Arc::clone(&bot.dispatcher),
            Arc::clone(&client),
        ));
        let mut writer_task = tokio::spawn(pump_keystrokes(game_rx, game_write));

        let listener = TcpListener::bind(&self.listen)
            .await
            .with_context(|| format!("listen on {}", self.listen))?;
        info!(listen = %self.listen, "waiting for a terminal client");

        tokio::select! {
            result = &mut game_task => {
                writer_task.abort();
                match result {
                    Ok(Ok(())) => anyhow::bail!("game server closed the connection"),
                    Ok(Err(err)) => Err(err.context("game connection lost")),
                    Err(err) => anyhow::bail!("game reader task died: {err}"),
                }
            }
            result = &mut writer_task => {
                game_task.abort();
                match result {
                    Ok(Ok(())) => anyhow::bail!("game writer stopped"),
                    Ok(Err(err)) => Err(err.context("game connection lost")),
                    Err(err) => anyhow::bail!("game writer task died: {err}"),
                }
            }
            result = serve_clients(listener, bot, client) => result,
        }
    }
}

/// Accept one client at a time. Each session installs the client's write
/// half for the game pump to tee into, then drives the command console off
/// the client's bytes until the client goes away.
async fn serve_clients(listener: TcpListener, bot: Bot, client: ClientSlot) -> Result<()> {
    loop {
        let (stream, addr) = listener
            .accept()
            .await
            .context("accept client connection")?;
        let session = Uuid::new_v4();
        info!(client = %addr, session = %session.simple(), "client connected");

        let (read_half, write_half) = stream.into_split();
        *client.lock().await = Some(write_half);

        let input = client_bytes(read_half);
        bot.console()
            .run(input)
            .instrument(info_span!("session", id = %session.simple()))
            .await;

        *client.lock().await = None;
        info!(client = %addr, "client disconnected");
    }
}

/// Read the game stream, tee it to the connected client, and feed every
/// byte through the line scanner into the dispatcher. Returns Ok on a clean
/// EOF from the game.
async fn pump_game(
    mut game: OwnedReadHalf,
    dispatcher: Arc<Mutex<Dispatcher>>,
    client: ClientSlot,
) -> Result<()> {
    let mut scanner = LineScanner::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = game.read(&mut buf).await.context("read from game")?;
        if n == 0 {
            return Ok(());
        }

        {
            let mut slot = client.lock().await;
            if let Some(writer) = slot.as_mut() {
                if let Err(err) = writer.write_all(&buf[..n]).await {
                    debug!(error = %err, "client write failed; detaching client");
                    *slot = None;
                }
            }
        }

        for &byte in &buf[..n] {
            if let Some(item) = scanner.feed(byte) {
                dispatcher.lock().await.handle(item).await;
            }
        }
    }
}

/// Drain the bot's outbound channel into the game socket.
async fn pump_keystrokes(
    mut game_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    mut game: OwnedWriteHalf,
) -> Result<()> {
    while let Some(bytes) = game_rx.recv().await {
        game.write_all(&bytes).await.context("write to game")?;
    }
    Ok(())
}

/// Turn a client read half into a byte channel for the console. The
/// feeder task ends quietly when the client hangs up or the console stops
/// listening.
fn client_bytes(mut read_half: OwnedReadHalf) -> mpsc::UnboundedReceiver<u8> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut buf = [0u8; 1024];
        loop {
            let n = match read_half.read(&mut buf).await {
                Ok(0) => return,
                Ok(n) => n,
                Err(err) => {
                    debug!(error = %err, "client read failed");
                    return;
                }
            };
            for &byte in &buf[..n] {
                if tx.send(byte).is_err() {
                    return;
                }
            }
        }
    });
    rx
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::{mpsc, Mutex};

    use super::{client_bytes, pump_game, pump_keystrokes, ClientSlot};
    use crate::bot::broker::Broker;
    use crate::bot::dispatch::Dispatcher;
    use crate::world::persist::Stores;
    use crate::world::World;

    async fn tcp_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let connect = TcpStream::connect(addr);
        let accept = listener.accept();
        let (a, b) = tokio::join!(connect, accept);
        (a.expect("connect"), b.expect("accept").0)
    }

    #[tokio::test]
    async fn test_client_bytes_delivers_stream() {
        let (mut ours, theirs) = tcp_pair().await;
        let mut rx = client_bytes(theirs.into_split().0);

        ours.write_all(b"abc").await.expect("write");
        drop(ours);

        let mut got = Vec::new();
        while let Some(byte) = rx.recv().await {
            got.push(byte);
        }
        assert_eq!(got, b"abc");
    }

    #[tokio::test]
    async fn test_pump_keystrokes_writes_until_channel_closes() {
        let (mut ours, theirs) = tcp_pair().await;
        let (tx, rx) = mpsc::unbounded_channel();
        let pump = tokio::spawn(pump_keystrokes(rx, theirs.into_split().1));

        tx.send(b"m100\r".to_vec()).expect("send");
        tx.send(b"x".to_vec()).expect("send");
        drop(tx);

        pump.await.expect("join").expect("pump");

        let mut got = Vec::new();
        ours.read_to_end(&mut got).await.expect("read");
        assert_eq!(got, b"m100\rx");
    }

    #[tokio::test]
    async fn test_pump_game_tees_to_client_and_survives_detach() {
        let dir = tempfile::tempdir().expect("tempdir");
        let stores = Stores::load(dir.path()).await.expect("stores");
        let world = World::new();
        let broker = Broker::new();
        let dispatcher = Arc::new(Mutex::new(Dispatcher::new(world, stores, broker)));

        let (mut game_ours, game_theirs) = tcp_pair().await;
        let (mut client_ours, client_theirs) = tcp_pair().await;

        let slot: ClientSlot = Arc::new(Mutex::new(Some(client_theirs.into_split().1)));
        let pump = tokio::spawn(pump_game(
            game_theirs.into_split().0,
            dispatcher,
            Arc::clone(&slot),
        ));

        game_ours.write_all(b"hello\r\n").await.expect("write");
        let mut tee = [0u8; 7];
        client_ours.read_exact(&mut tee).await.expect("read tee");
        assert_eq!(&tee, b"hello\r\n");

        // Drop the client; the pump detaches it on a failed write and keeps
        // consuming the game stream. The OS may buffer a write or two before
        // failing, so only the clean exit on game EOF is asserted.
        drop(client_ours);
        game_ours.write_all(b"after\r\n").await.expect("write");
        tokio::time::sleep(Duration::from_millis(50)).await;
        game_ours.write_all(b"more\r\n").await.expect("write");
        drop(game_ours);

        pump.await.expect("join").expect("pump");
    }
}
