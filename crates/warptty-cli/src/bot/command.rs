//! Operator command capture and dispatch.
//!
//! The terminal client's byte stream passes through here on its way to the
//! game. A backslash opens a capture buffer; the text up to the next CR or
//! LF is parsed as a bot command instead of being forwarded. Most commands
//! spawn a long-running action, during which further client bytes are
//! interpreted only as `x` (cancel) or `?` (show pending event waits).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use warptty_core::error::BotError;
use warptty_core::models::{Product, TwarpHop};

use crate::bot::actions;
use crate::bot::actuator::{Actuator, MoveOpts};
use crate::bot::dispatch::Dispatcher;
use crate::bot::parsers::{Category, CimWarpsParser};
use crate::world::persist::Stores;

type ActionFuture = Pin<Box<dyn Future<Output = Result<(), BotError>> + Send>>;

/// What became of one client byte.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    /// Pass the byte through to the game untouched.
    Forward(u8),
    /// The byte was consumed by the capture buffer.
    Captured,
    /// A terminator arrived; this is the text between the backslash and it.
    Command(String),
}

/// Accumulates commands typed as `\...<CR>` on the client stream.
///
/// A backslash starts or restarts capture, ESC abandons it, backspace
/// erases one byte. Bytes arriving outside a capture pass through.
#[derive(Debug, Default)]
struct Capture {
    buf: Vec<u8>,
}

impl Capture {
    fn push(&mut self, byte: u8) -> Input {
        match byte {
            b'\\' => {
                self.buf = vec![byte];
                Input::Captured
            }
            0x1b => {
                self.buf.clear();
                Input::Captured
            }
            0x08 => {
                self.buf.pop();
                Input::Captured
            }
            b'\r' | b'\n' if !self.buf.is_empty() => {
                let text = String::from_utf8_lossy(&self.buf[1..]).into_owned();
                self.buf.clear();
                Input::Command(text)
            }
            _ if self.buf.is_empty() => Input::Forward(byte),
            _ => {
                self.buf.push(byte);
                Input::Captured
            }
        }
    }
}

/// The operator side of a session: watches the client byte stream for
/// backslash commands and runs at most one action at a time.
pub struct Console {
    act: Actuator,
    stores: Stores,
    dispatcher: Arc<Mutex<Dispatcher>>,
    game_tx: mpsc::UnboundedSender<Vec<u8>>,
}

fn action<F>(name: &'static str, fut: F) -> Option<(&'static str, ActionFuture)>
where
    F: Future<Output = Result<(), BotError>> + Send + 'static,
{
    Some((name, Box::pin(fut)))
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(err) => warn!(error = %err, "failed to encode value as JSON"),
    }
}

impl Console {
    pub fn new(
        act: Actuator,
        stores: Stores,
        dispatcher: Arc<Mutex<Dispatcher>>,
        game_tx: mpsc::UnboundedSender<Vec<u8>>,
    ) -> Self {
        Self {
            act,
            stores,
            dispatcher,
            game_tx,
        }
    }

    /// Drive the session's input side until the client or the game goes
    /// away.
    pub async fn run(self, mut input: mpsc::UnboundedReceiver<u8>) {
        let mut capture = Capture::default();
        while let Some(byte) = input.recv().await {
            match capture.push(byte) {
                Input::Forward(byte) => {
                    if self.game_tx.send(vec![byte]).is_err() {
                        info!("game writer closed; ending input loop");
                        return;
                    }
                }
                Input::Captured => {}
                Input::Command(command) => {
                    info!(command = %command, "parsing command");
                    if let Some((name, fut)) = self.dispatch(&command).await {
                        self.run_action(name, fut, &mut input).await;
                    }
                }
            }
        }
        info!("client input stream ended");
    }

    /// Run one spawned action until it finishes, the operator cancels it,
    /// or the client disconnects. While it runs, client bytes are control
    /// input only, never game keystrokes.
    async fn run_action(
        &self,
        name: &'static str,
        fut: ActionFuture,
        input: &mut mpsc::UnboundedReceiver<u8>,
    ) {
        let span = info_span!("action", name, run = %Uuid::new_v4().simple());
        info!(parent: &span, "action started");
        let mut handle = tokio::spawn(fut.instrument(span.clone()));
        loop {
            tokio::select! {
                result = &mut handle => {
                    match result {
                        Ok(Ok(())) => info!(parent: &span, "action complete"),
                        Ok(Err(err)) => warn!(parent: &span, error = %err, "action failed"),
                        Err(err) => error!(parent: &span, error = %err, "action task died"),
                    }
                    return;
                }
                byte = input.recv() => {
                    let Some(byte) = byte else {
                        handle.abort();
                        info!(parent: &span, "client went away; action aborted");
                        return;
                    };
                    match byte {
                        b'x' => {
                            handle.abort();
                            info!(parent: &span, "cancelled action");
                            return;
                        }
                        b'?' => {
                            for (kind, id) in self.act.broker.waits() {
                                println!("waiting on kind: {:?}  id: {:?}", kind, id);
                            }
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    /// Turn a captured command into an action, or handle it inline.
    /// Malformed commands log a diagnostic and never reach the game.
    async fn dispatch(&self, command: &str) -> Option<(&'static str, ActionFuture)> {
        let head = command.chars().next()?;
        if !head.is_ascii() {
            warn!(command = %command, "unrecognized command");
            return None;
        }
        let rest = &command[1..];
        let act = self.act.clone();

        match head {
            'w' => {
                if rest.starts_with("ppt") {
                    return action("wppt", actions::pair_trade(act, self.stores.clone()));
                }
                if let Some(arg) = rest.strip_prefix("sst") {
                    match arg.parse::<u32>() {
                        Ok(ship) => {
                            return action(
                                "wsst",
                                actions::sell_steal(act, self.stores.clone(), ship),
                            );
                        }
                        Err(err) => warn!(error = %err, "bad ship id in wsst command"),
                    }
                    return None;
                }
            }
            'c' => {
                if rest.starts_with('w') {
                    // The CIM dump has no trigger line, so the parser must
                    // be armed before the request goes out.
                    self.dispatcher
                        .lock()
                        .await
                        .install(Category::CimWarps, Box::new(CimWarpsParser::new()));
                    act.cim_sector_update();
                    return None;
                }
            }
            'a' => {
                if rest.starts_with('u') {
                    return action("unsurround", actions::unsurround(act));
                }
                if let Some(arg) = rest.strip_prefix('s') {
                    match arg.parse::<i64>() {
                        Ok(figs) => return action("surround", actions::surround(act, figs)),
                        Err(err) => warn!(error = %err, "bad fighter count in surround command"),
                    }
                    return None;
                }
            }
            'p' => {
                if let Some(arg) = rest.strip_prefix('s') {
                    match parse_strip_args(arg) {
                        // Planet zero means bulk mode, which creates and
                        // destroys its own planets to strip.
                        Ok((0, to)) => return action("pstripbulk", actions::strip_bulk(act, to)),
                        Ok((from, to)) => {
                            return action("pstrip", async move {
                                act.strip_planet(from, to).await
                            });
                        }
                        Err(err) => warn!(error = %err, "bad pstrip args"),
                    }
                    return None;
                }
                if let Some(arg) = rest.strip_prefix('r') {
                    match parse_points(arg) {
                        Ok(points) => return action("proutetrade", actions::route_trade(act, points)),
                        Err(err) => warn!(error = %err, "bad route points"),
                    }
                    return None;
                }
                if let Some(arg) = rest.strip_prefix('w') {
                    match parse_points(arg) {
                        Ok(points) => return action("pwarpsell", actions::warp_sell(act, points)),
                        Err(err) => warn!(error = %err, "bad route points"),
                    }
                    return None;
                }
                if let Some(arg) = rest.strip_prefix('c') {
                    match parse_create_args(arg) {
                        Ok(classes) => return action("pcreate", actions::create_planets(act, classes)),
                        Err(err) => warn!(error = %err, "bad planet create args"),
                    }
                    return None;
                }
                if let Some(arg) = rest.strip_prefix("fd") {
                    match arg.parse::<i64>() {
                        Ok(figs) => return action("pfigdeploy", actions::fig_deploy(act, figs)),
                        Err(err) => warn!(error = %err, "bad fighter count in pfd command"),
                    }
                    return None;
                }
                if let Some(arg) = rest.strip_prefix('u') {
                    match parse_points(arg) {
                        Ok(points) => return action("pupgrade", actions::upgrade_route(act, points)),
                        Err(err) => warn!(error = %err, "bad route points"),
                    }
                    return None;
                }
                if rest.starts_with('b') {
                    return action("prebalance", async move {
                        act.rebalance_populations().await
                    });
                }
            }
            'd' => return action("pdrop", actions::planet_drop(act)),
            'n' => {
                let mut chars = rest.chars();
                let Some(code) = chars.next() else {
                    warn!(command = %command, "product code missing in negotiate command");
                    return None;
                };
                let Some(product) = Product::from_code(code) else {
                    warn!(code = %code, "unknown product code");
                    return None;
                };
                let planet = if chars.as_str().is_empty() {
                    // Zero means whatever planet we are landed on.
                    0
                } else {
                    match chars.as_str().parse::<u32>() {
                        Ok(planet) => planet,
                        Err(err) => {
                            warn!(error = %err, "bad planet id in negotiate command");
                            return None;
                        }
                    }
                };
                return action("ptrade", actions::planet_trade(act, planet, product));
            }
            'm' => {
                if let Some(arg) = rest.strip_prefix('f') {
                    match arg.parse::<u32>() {
                        Ok(dest) => {
                            // Fig-laying profile: claim territory on the way
                            // while keeping a reserve on board.
                            let opts = MoveOpts {
                                drop_figs: 1,
                                min_figs: 5000,
                                enemy_figs_max: 1000,
                                enemy_mines_max: 50,
                            };
                            return action("move", async move {
                                act.move_to(dest, opts, true).await
                            });
                        }
                        Err(err) => warn!(error = %err, "bad sector in move command"),
                    }
                    return None;
                }
                match rest.parse::<u32>() {
                    Ok(dest) => {
                        return action("move", async move {
                            act.move_to(dest, MoveOpts::default(), true).await
                        });
                    }
                    Err(err) => warn!(error = %err, "bad sector in move command"),
                }
                return None;
            }
            'e' => {
                match rest.parse::<u32>() {
                    Ok(start) => return action("explore", actions::explore(act, start)),
                    Err(err) => warn!(error = %err, "bad sector in explore command"),
                }
                return None;
            }
            'i' => {
                if rest.is_empty() {
                    print_json(&self.act.world.status().await);
                    return None;
                }
                if let Some(arg) = rest.strip_prefix('s') {
                    match arg.parse::<u32>() {
                        Ok(sector) => match self.act.world.sector(sector).await {
                            Some(sector) => print_json(&sector),
                            None => println!("Don't have info on sector {}", sector),
                        },
                        Err(err) => warn!(error = %err, "bad sector in inspect command"),
                    }
                    return None;
                }
                if let Some(arg) = rest.strip_prefix('p') {
                    match arg.parse::<u32>() {
                        Ok(planet) => match self.act.world.planet(planet).await {
                            Some(planet) => print_json(&planet),
                            None => println!("Don't have info on planet {}", planet),
                        },
                        Err(err) => warn!(error = %err, "bad planet in inspect command"),
                    }
                    return None;
                }
            }
            'r' => {
                if rest.is_empty() {
                    return action("rob", actions::rob_port(act));
                }
                if let Some(arg) = rest.strip_prefix('p') {
                    match arg.parse::<u32>() {
                        Ok(other) => return action("robpair", actions::rob_pair(act, other)),
                        Err(err) => warn!(error = %err, "bad sector in rob pair command"),
                    }
                    return None;
                }
            }
            's' => {
                if rest.is_empty() {
                    print_json(&self.act.world.settings().await);
                    return None;
                }
                if let Some(arg) = rest.strip_prefix('t') {
                    match parse_hops(arg) {
                        Ok(hops) => self.act.world.set_hops_to_stardock(hops).await,
                        Err(err) => warn!(error = %err, "bad stardock route"),
                    }
                    return None;
                }
            }
            'g' => {
                if rest.starts_with('s') {
                    return action("gotostardock", async move { act.go_to_stardock().await });
                }
            }
            _ => {}
        }
        warn!(command = %command, "unrecognized command");
        None
    }
}

fn parse_points(args: &str) -> Result<Vec<u32>, BotError> {
    args.split(',')
        .map(|part| {
            part.parse::<u32>()
                .map_err(|_| BotError::parse_failed(format!("bad sector {:?} in point list", part)))
        })
        .collect()
}

/// Planet-create args pair a count digit with a class letter, like `2L1O`.
/// A repeated class letter overrides the earlier count.
fn parse_create_args(args: &str) -> Result<Vec<(char, u32)>, BotError> {
    let chars: Vec<char> = args.chars().collect();
    if chars.len() % 2 != 0 {
        return Err(BotError::parse_failed(
            "must have an even number of args. Ex: 2L1O2H",
        ));
    }
    let mut classes: Vec<(char, u32)> = Vec::new();
    for pair in chars.chunks(2) {
        let count = pair[0]
            .to_digit(10)
            .ok_or_else(|| BotError::parse_failed(format!("bad planet count {:?}", pair[0])))?;
        match classes.iter_mut().find(|(class, _)| *class == pair[1]) {
            Some(entry) => entry.1 = count,
            None => classes.push((pair[1], count)),
        }
    }
    Ok(classes)
}

fn parse_strip_args(args: &str) -> Result<(u32, u32), BotError> {
    let parts: Vec<&str> = args.split(',').collect();
    if parts.len() != 2 {
        return Err(BotError::parse_failed(format!(
            "got {} args; need exactly 2",
            parts.len()
        )));
    }
    let from = parts[0]
        .parse::<u32>()
        .map_err(|_| BotError::parse_failed(format!("bad planet id {:?}", parts[0])))?;
    let to = parts[1]
        .parse::<u32>()
        .map_err(|_| BotError::parse_failed(format!("bad planet id {:?}", parts[1])))?;
    Ok((from, to))
}

/// A single argument clears the stored route; otherwise pairs of
/// `sector,planet` become the new route.
fn parse_hops(args: &str) -> Result<Vec<TwarpHop>, BotError> {
    let parts: Vec<&str> = args.split(',').collect();
    if parts.len() == 1 {
        return Ok(Vec::new());
    }
    if parts.len() % 2 != 0 {
        return Err(BotError::parse_failed(
            "did not get an even number of arguments",
        ));
    }
    let mut hops = Vec::new();
    for pair in parts.chunks(2) {
        let sector = pair[0].parse::<u32>().map_err(|_| {
            BotError::parse_failed(format!("bad sector {:?} in stardock route", pair[0]))
        })?;
        let planet = pair[1].parse::<u32>().map_err(|_| {
            BotError::parse_failed(format!("bad planet {:?} in stardock route", pair[1]))
        })?;
        hops.push(TwarpHop { sector, planet });
    }
    Ok(hops)
}
